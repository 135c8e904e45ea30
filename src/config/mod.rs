//! Configuration management module for subsync-cli.
//!
//! This module provides the configuration service system with dependency
//! injection support, mirroring the teacher repo's `ConfigService`
//! abstraction, scaled down to the five parameter groups this crate's
//! solver consumes (spec.md §3 / §6: `sync_params`, `rift_params`,
//! `phrase_params`, `ad_params`, `score_params`).
//!
//! # Architecture
//!
//! ```text
//! ConfigService (get_config / reload / save)
//!      ↓
//! validation (parameter sanity checks, regex compilability)
//! ```
//!
//! All configuration access should go through the [`ConfigService`] trait;
//! [`ProductionConfigService`] loads from `config.toml` + environment
//! variables, [`TestConfigService`]/[`TestConfigBuilder`] provide
//! in-memory, deterministic configuration for tests.

pub mod service;
pub mod test_service;
pub mod validation;

use serde::{Deserialize, Serialize};

pub use service::{ConfigService, ProductionConfigService};
pub use test_service::{TestConfigBuilder, TestConfigService};

/// Full configuration for the synchronization core.
///
/// Serializes to/from TOML. A partial file only overrides the fields it
/// names; everything else falls back to the documented defaults from
/// spec.md §3.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Thresholds and triggers governing the linear/rift solver decision.
    pub sync_params: SyncParams,
    /// Tuning parameters for piecewise rift segmentation.
    pub rift_params: RiftParams,
    /// Phrase-key construction thresholds for the correlator.
    pub phrase_params: PhraseParams,
    /// Ad-caption detection regex sets and proximity window.
    pub ad_params: AdParams,
    /// Download-ranking penalty weights; carried through unused by the
    /// solver (spec.md §9's "Open questions" note).
    pub score_params: ScoreParams,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            sync_params: SyncParams::default(),
            rift_params: RiftParams::default(),
            phrase_params: PhraseParams::default(),
            ad_params: AdParams::default(),
            score_params: ScoreParams::default(),
        }
    }
}

/// Thresholds governing whether and how the candidate is adjusted
/// (spec.md §3, `SyncParams` table).
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct SyncParams {
    /// Reject a fit if residual stdev exceeds this many ms.
    pub max_dev: i64,
    /// Reject a fit if `|intercept|` exceeds this many ms.
    pub max_offset: i64,
    /// Reject a fit if `|slope|*100` exceeds this percentage.
    pub max_rate: f64,
    /// Stdev improvement (ms) required to prefer an adjusted variant.
    pub min_deltadev: i64,
    /// Intercept improvement (ms) required to prefer an adjusted variant.
    pub min_deltaoffset: i64,
    /// Slope-percentage trigger threshold for attempting adjustment.
    pub min_rate: f64,
    /// Stdev (ms) trigger threshold for attempting adjustment.
    pub min_dev: i64,
    /// Intercept (ms) trigger threshold for attempting adjustment.
    pub min_offset: i64,
    /// Minimum matched points required to attempt adjustment.
    pub min_ref_pts: usize,
}

impl Default for SyncParams {
    fn default() -> Self {
        SyncParams {
            max_dev: 30_000,
            max_offset: 300_000,
            max_rate: 15.0,
            min_deltadev: 100,
            min_deltaoffset: 100,
            min_rate: 0.10,
            min_dev: 350,
            min_offset: 100,
            min_ref_pts: 100,
        }
    }
}

/// Tuning parameters for the piecewise rift search (spec.md §3).
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct RiftParams {
    /// Minimum points required on each side of a candidate split.
    pub min_pts: usize,
    /// Preferred points on each side of a candidate split, when available.
    pub pref_pts: usize,
    /// Divisor used to compute the border width excluded from splitting.
    pub border_div: usize,
    /// Maximum allowed deviation of either side's slope from nominal.
    pub max_slope_delta: f64,
    /// Maximum allowed slope difference between the two sides of a split.
    pub max_parallel_delta: f64,
    /// Minimum fraction of window stdev the joint fit must achieve.
    pub min_dev_frac: f64,
    /// Maximum fraction of window stdev either side may have.
    pub max_dev_frac: f64,
    /// Nominal minutes per trial segment used to size the search windows.
    pub trial_mins: f64,
    /// Minimum number of trial segments regardless of video length.
    pub min_trial_segs: usize,
}

impl Default for RiftParams {
    fn default() -> Self {
        RiftParams {
            min_pts: 10,
            pref_pts: 20,
            border_div: 6,
            max_slope_delta: 0.025,
            max_parallel_delta: 0.02,
            min_dev_frac: 0.80,
            max_dev_frac: 1.25,
            trial_mins: 12.0,
            min_trial_segs: 3,
        }
    }
}

/// Phrase-key construction thresholds for the correlator (spec.md §3).
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct PhraseParams {
    /// A phrase must contain at least one word at least this long.
    pub min_word_len: usize,
    /// A phrase's total string length must be at least this long.
    pub min_str_len: usize,
}

impl Default for PhraseParams {
    fn default() -> Self {
        PhraseParams {
            min_word_len: 5,
            min_str_len: 8,
        }
    }
}

/// Ad-caption detection regex sets and the start/end proximity window in
/// which "limited" patterns apply (spec.md §4.1).
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct AdParams {
    /// Seconds from the start/end of the track within which `limited_regexes`
    /// are considered.
    pub limit_s: i64,
    /// Patterns matched only near the start or end of the track.
    pub limited_regexes: Vec<String>,
    /// Patterns matched anywhere in the track.
    pub global_regexes: Vec<String>,
}

impl Default for AdParams {
    fn default() -> Self {
        AdParams {
            limit_s: 120,
            limited_regexes: vec![
                r"\.(com|net|org)\b".to_string(),
                r"\bair date\b".to_string(),
                r"\bArt Subs\b".to_string(),
                r"\bcaption".to_string(),
                r"\bsubtitle".to_string(),
                r"\bTVShow\b".to_string(),
                r"\bwww\.".to_string(),
            ],
            global_regexes: vec![
                r"\bopensubtitles\b".to_string(),
                r"\baddic7ed\b".to_string(),
                r"\bsync\b.*\b(fixed|corrected)\b".to_string(),
                r"\brate\b.*\bsubtitles\b".to_string(),
                r"\bsubtitles:".to_string(),
                r"\bsubtitles by\b".to_string(),
                r"\bsynchronized by\b".to_string(),
                r"\bcaption(ing|ed) by\b".to_string(),
            ],
        }
    }
}

/// Download-ranking penalty weights, out of the solver's scope
/// (spec.md §9: `code_option_score_lengths`) but carried through in the
/// ambient config so a future download-ranking collaborator can read it
/// from the same file.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ScoreParams {
    /// Whether to encode the penalty score into downloaded subtitle names.
    pub scored_names: bool,
    /// Starting penalty applied when matched points are too few.
    pub pts_min_penalty: i64,
    /// Maximum penalty applicable for too few matched points.
    pub pts_max_penalty: i64,
}

impl Default for ScoreParams {
    fn default() -> Self {
        ScoreParams {
            scored_names: true,
            pts_min_penalty: 50,
            pts_max_penalty: 0,
        }
    }
}
