//! Non-adjusting comparison between two caption lists (spec.md §4.6).
//!
//! Grounded in `LibSub/SubFixer.py`'s `Comparator`: repair and ad-purge
//! both lists, then walk them together matching captions by exact
//! clear-text equality within a bounded look-ahead window, collecting
//! offset/duration deltas and a regression summary, plus tail checks for
//! a subtitle track that ends suspiciously early or runs well past the
//! video's end.

use crate::core::caption::{AdPatternRegistry, CaptionList};
use crate::core::regression::{linear_regression, LinearModel};

/// A matched pair of captions with equal text, and their respective
/// timings, for offset/duration comparison.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aligned {
    pub left_idx: usize,
    pub right_idx: usize,
    pub offset_ms: i64,
    pub duration_delta_ms: i64,
}

/// Report produced by [`compare`].
#[derive(Debug, Clone)]
pub struct CompareReport {
    pub aligned: Vec<Aligned>,
    pub unmatched_left: usize,
    pub unmatched_right: usize,
    pub regression: Option<LinearModel>,
    /// True if the right track's last caption ends more than 5s before
    /// `video_end_ms`.
    pub ends_short: bool,
    /// True if the right track's last caption ends more than 180s after
    /// `video_end_ms`.
    pub ends_long: bool,
    /// Indices (into the right track) of captions that extend beyond
    /// `video_end_ms` at all.
    pub captions_beyond_video_end: Vec<usize>,
}

/// Repair and ad-purge both lists, then align `right` against `left` by
/// exact clear-text match within a look-ahead window sized to their count
/// difference, and summarize the result. `video_end_ms`, if known, drives
/// the tail checks.
pub fn compare(
    left: &CaptionList,
    right: &CaptionList,
    ad_registry: &AdPatternRegistry,
    video_end_ms: Option<i64>,
) -> CompareReport {
    let mut left = left.clone();
    let mut right = right.clone();
    left.repair();
    right.repair();
    left.detect_ads(ad_registry);
    left.purge_ads();
    right.detect_ads(ad_registry);
    right.purge_ads();

    let skip_max = (left.captions.len() as i64 - right.captions.len() as i64).unsigned_abs() as usize + 10;

    let mut aligned = Vec::new();
    let mut matched_right = vec![false; right.captions.len()];
    let mut left_cursor = 0usize;

    for (ridx, rcap) in right.captions.iter().enumerate() {
        let search_end = (left_cursor + skip_max).min(left.captions.len());
        let found = (left_cursor..search_end).find(|&lidx| left.captions[lidx].text() == rcap.text());
        if let Some(lidx) = found {
            aligned.push(Aligned {
                left_idx: lidx,
                right_idx: ridx,
                offset_ms: rcap.begin_ms - left.captions[lidx].begin_ms,
                duration_delta_ms: rcap.duration_ms() - left.captions[lidx].duration_ms(),
            });
            matched_right[ridx] = true;
            left_cursor = lidx + 1;
        }
    }

    let unmatched_left = left.captions.len().saturating_sub(aligned.len());
    let unmatched_right = matched_right.iter().filter(|m| !**m).count();

    let regression = if aligned.is_empty() {
        None
    } else {
        let points: Vec<(f64, f64)> = aligned
            .iter()
            .map(|a| (left.captions[a.left_idx].begin_ms as f64, right.captions[a.right_idx].begin_ms as f64))
            .collect();
        Some(linear_regression(&points))
    };

    let (ends_short, ends_long, captions_beyond_video_end) = match video_end_ms {
        Some(video_end_ms) => {
            let last_end = right.captions.last().map(|c| c.end_ms).unwrap_or(0);
            let beyond: Vec<usize> = right
                .captions
                .iter()
                .enumerate()
                .filter(|(_, c)| c.end_ms > video_end_ms)
                .map(|(idx, _)| idx)
                .collect();
            (
                video_end_ms - last_end > 5_000,
                last_end - video_end_ms > 180_000,
                beyond,
            )
        }
        None => (false, false, Vec::new()),
    };

    CompareReport {
        aligned,
        unmatched_left,
        unmatched_right,
        regression,
        ends_short,
        ends_long,
        captions_beyond_video_end,
    }
}
