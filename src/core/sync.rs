//! The synchronizer: ties caption repair, phrase correlation, regression,
//! and rift detection together and picks a winning correction (spec.md §4.5).
//!
//! Grounded in `LibSub/SubFixer.py`'s `Synchronizer.analyze`: fit an
//! unadjusted baseline, and if the candidate looks meaningfully offset or
//! drifting, try a single global linear correction and an independent
//! multi-segment rift correction, keeping whichever wins by a comfortable
//! margin over the previous best. A caller-supplied fallback candidate
//! (e.g. a previously accepted subtitle) is only displaced if the new
//! pick clears that same margin over it. Matches below `min_ref_pts`, or
//! a baseline fit already outside `max_dev`/`max_offset`/`max_rate`, end
//! analysis early with a failure string and the candidate left unadjusted.

use crate::config::{Config, SyncParams};
use crate::core::caption::{AdPatternRegistry, CaptionList};
use crate::core::phrase::{self, Match};
use crate::core::regression::{linear_regression, LinearModel};
use crate::core::rift::{self, Formula};

/// Result of [`Synchronizer::analyze`]: a human-readable decision line and
/// the candidate caption list the caller should use — adjusted, or
/// unchanged if analysis failed or chose not to adjust.
pub struct AnalysisOutcome {
    pub decision: String,
    pub captions: CaptionList,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Method {
    Unadjusted,
    Fallback,
    Linear,
    Rift,
}

#[derive(Clone)]
struct Variant {
    method: Method,
    captions: CaptionList,
    model: LinearModel,
    formulas: Vec<Formula>,
}

/// Ties the core subsystems together to analyze and, if warranted,
/// re-time a candidate subtitle against a reference.
pub struct Synchronizer<'a> {
    config: &'a Config,
    ad_registry: &'a AdPatternRegistry,
}

impl<'a> Synchronizer<'a> {
    pub fn new(config: &'a Config, ad_registry: &'a AdPatternRegistry) -> Self {
        Self {
            config,
            ad_registry,
        }
    }

    /// Repair and ad-purge both lists, correlate them, and decide whether
    /// the candidate should be adjusted and by how much.
    ///
    /// `fallback`, if given, is a previously accepted candidate; it is
    /// only displaced by the new analysis if the new pick clears the same
    /// "meaningfully better" margin used between internal variants.
    pub fn analyze(
        &self,
        candidate: &CaptionList,
        reference: &CaptionList,
        fallback: Option<&CaptionList>,
    ) -> AnalysisOutcome {
        let mut candidate = candidate.clone();
        let mut reference = reference.clone();
        candidate.repair();
        reference.repair();
        candidate.detect_ads(self.ad_registry);
        candidate.purge_ads();
        reference.detect_ads(self.ad_registry);
        reference.purge_ads();

        let params = &self.config.sync_params;
        let matches = phrase::correlate(&candidate, &reference, &self.config.phrase_params);

        if matches.len() < params.min_ref_pts {
            log::warn!(
                "insufficient matched points to synchronize: {} < min_ref_pts {}",
                matches.len(),
                params.min_ref_pts
            );
            return AnalysisOutcome {
                decision: format!("cannot compute linear regression [pts={}]", matches.len()),
                captions: candidate,
            };
        }

        let unadjusted_model = fit(&matches);
        if unadjusted_model.stdev > params.max_dev as f64
            || unadjusted_model.intercept.abs() > params.max_offset as f64
            || (unadjusted_model.slope * 100.0).abs() > params.max_rate
        {
            log::warn!(
                "unadjusted fit rejected: dev={:.0}ms offset={:.0}ms rate={:.2}%",
                unadjusted_model.stdev,
                unadjusted_model.intercept,
                unadjusted_model.slope * 100.0,
            );
            return AnalysisOutcome {
                decision: format!(
                    "fit out of bounds dev={:.0}ms offset={:.0}ms rate={:.2}% [pts={}]",
                    unadjusted_model.stdev,
                    unadjusted_model.intercept,
                    unadjusted_model.slope * 100.0,
                    matches.len()
                ),
                captions: candidate,
            };
        }

        let mut best = Variant {
            method: Method::Unadjusted,
            captions: candidate.clone(),
            model: unadjusted_model,
            formulas: Vec::new(),
        };

        let should_attempt = unadjusted_model.intercept.abs() >= params.min_offset as f64
            || (unadjusted_model.slope * 100.0).abs() >= params.min_rate;

        if should_attempt {
            let track_end_ms = candidate
                .captions
                .last()
                .map(|c| c.end_ms)
                .unwrap_or_default();

            let linear_formula = Formula {
                model: unadjusted_model,
                caption_from: 0,
                caption_to: candidate.captions.len(),
            };
            let linear_captions = apply_formulas(&candidate, std::slice::from_ref(&linear_formula));
            let linear_matches = phrase::correlate(&linear_captions, &reference, &self.config.phrase_params);
            let linear_variant = Variant {
                method: Method::Linear,
                model: fit(&linear_matches),
                captions: linear_captions,
                formulas: vec![linear_formula],
            };
            if is_better(&best.model, &linear_variant.model, 20.0, params) {
                best = linear_variant;
            }

            let rift_formulas =
                rift::detect_rifts(&matches, candidate.captions.len(), track_end_ms, &self.config.rift_params);
            let rift_captions = apply_formulas(&candidate, &rift_formulas);
            let rift_matches = phrase::correlate(&rift_captions, &reference, &self.config.phrase_params);
            let rift_variant = Variant {
                method: Method::Rift,
                model: fit(&rift_matches),
                captions: rift_captions,
                formulas: rift_formulas,
            };
            if is_better(&best.model, &rift_variant.model, params.min_deltadev as f64, params) {
                best = rift_variant;
            }
        }

        if let Some(fallback) = fallback {
            let fallback_matches = phrase::correlate(fallback, &reference, &self.config.phrase_params);
            let fallback_model = fit(&fallback_matches);
            if !is_better(&fallback_model, &best.model, 20.0, params) {
                best = Variant {
                    method: Method::Fallback,
                    model: fallback_model,
                    captions: fallback.clone(),
                    formulas: Vec::new(),
                };
            }
        }

        let decision = decision_string(&best);
        log::info!("{decision}");
        AnalysisOutcome {
            decision,
            captions: best.captions,
        }
    }
}

/// `b` is meaningfully better than `a` if its residual stdev is at least
/// `delta_dev` ms lower, or if its `|intercept|` improves by at least
/// `min_deltaoffset` ms.
fn is_better(a: &LinearModel, b: &LinearModel, delta_dev: f64, params: &SyncParams) -> bool {
    (a.stdev - b.stdev >= delta_dev) || (a.intercept.abs() - b.intercept.abs() >= params.min_deltaoffset as f64)
}

fn fit(matches: &[Match]) -> LinearModel {
    if matches.is_empty() {
        return LinearModel {
            slope: 0.0,
            intercept: 0.0,
            stdev: 0.0,
            r: 0.0,
            n: 0,
            squares_sum: 0.0,
            x_left: 0.0,
            x_right: 0.0,
            y_left: 0.0,
            y_right: 0.0,
        };
    }
    linear_regression(&matches.iter().map(Match::point).collect::<Vec<_>>())
}

/// Apply each formula to the candidate captions it covers. A caption
/// shifted entirely negative is dropped; one whose begin alone goes
/// negative is clamped to zero, mirroring [`CaptionList::delay`].
fn apply_formulas(candidate: &CaptionList, formulas: &[Formula]) -> CaptionList {
    let mut out = candidate.clone();
    let mut deletions = Vec::new();
    for (idx, caption) in out.captions.iter_mut().enumerate() {
        let Some(formula) = formulas
            .iter()
            .find(|f| idx >= f.caption_from && idx < f.caption_to)
        else {
            continue;
        };
        caption.begin_ms = formula.apply(caption.begin_ms);
        caption.end_ms = formula.apply(caption.end_ms);
        if caption.end_ms < 0 {
            deletions.push(idx);
        } else if caption.begin_ms < 0 {
            caption.begin_ms = 0;
        }
    }
    for &idx in deletions.iter().rev() {
        out.captions.remove(idx);
    }
    out
}

fn decision_string(variant: &Variant) -> String {
    let model = &variant.model;
    let pick = match variant.method {
        Method::Unadjusted => "KEEP unadjusted subs".to_string(),
        Method::Fallback => "KEEP fallback subs".to_string(),
        Method::Linear => "PICK linear adjusted subs".to_string(),
        Method::Rift => "PICK rift adjusted subs".to_string(),
    };
    let mut line = format!(
        "OK dev {:.2}s shift {:.2}s rate {:.2}% pts {} [{}",
        model.stdev / 1000.0,
        model.intercept / 1000.0,
        model.slope * 100.0,
        model.n,
        pick,
    );
    if variant.formulas.len() > 1 {
        let shifts: Vec<String> = variant
            .formulas
            .iter()
            .map(|f| format!("{}", f.model.intercept.round() as i64))
            .collect();
        line.push(' ');
        line.push_str(&shifts.join("/"));
        line.push_str("ms");
    }
    line.push(']');
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::core::caption::Caption;

    fn caption(leader: u32, begin_ms: i64, end_ms: i64, text: &str) -> Caption {
        Caption {
            leader,
            raw_leader: leader.to_string(),
            begin_ms,
            end_ms,
            lines: vec![text.to_string()],
        }
    }

    fn make_track(shift_ms: i64) -> (CaptionList, CaptionList) {
        let mut candidate_captions = Vec::new();
        let mut reference_captions = Vec::new();
        let phrases = [
            "good morning everyone welcome back",
            "today we discuss something different",
            "thanks for joining this conversation",
            "see you again next week",
        ];
        for (i, phrase) in phrases.iter().enumerate() {
            let begin = i as i64 * 5000;
            candidate_captions.push(caption(i as u32 + 1, begin, begin + 3000, phrase));
            reference_captions.push(caption(
                i as u32 + 1,
                begin + shift_ms,
                begin + shift_ms + 3000,
                phrase,
            ));
        }
        (
            CaptionList::from_captions(candidate_captions),
            CaptionList::from_captions(reference_captions),
        )
    }

    #[test]
    fn reports_insufficient_data_with_no_matches() {
        let config = Config::default();
        let registry = AdPatternRegistry::new(&config.ad_params).unwrap();
        let synchronizer = Synchronizer::new(&config, &registry);
        let candidate = CaptionList::from_captions(vec![caption(1, 0, 1000, "xzq")]);
        let reference = CaptionList::from_captions(vec![caption(1, 0, 1000, "zzq")]);
        let outcome = synchronizer.analyze(&candidate, &reference, None);
        assert!(outcome.decision.starts_with("cannot compute linear regression"));
        assert_eq!(outcome.captions.captions.len(), 1);
    }

    #[test]
    fn leaves_well_synced_candidate_unadjusted() {
        let mut config = Config::default();
        config.sync_params.min_ref_pts = 1;
        let registry = AdPatternRegistry::new(&config.ad_params).unwrap();
        let synchronizer = Synchronizer::new(&config, &registry);
        let (candidate, reference) = make_track(0);
        let outcome = synchronizer.analyze(&candidate, &reference, None);
        assert!(outcome.decision.contains("KEEP unadjusted subs"));
    }

    #[test]
    fn picks_linear_adjustment_for_constant_shift() {
        let mut config = Config::default();
        config.sync_params.min_ref_pts = 1;
        let registry = AdPatternRegistry::new(&config.ad_params).unwrap();
        let synchronizer = Synchronizer::new(&config, &registry);
        let (candidate, reference) = make_track(2000);
        let outcome = synchronizer.analyze(&candidate, &reference, None);
        assert!(outcome.decision.contains("PICK linear adjusted subs"));
        // the adjusted candidate should now begin close to the reference
        assert!((outcome.captions.captions[0].begin_ms - reference.captions[0].begin_ms).abs() < 50);
    }

    #[test]
    fn decision_string_reports_matched_point_count() {
        let mut config = Config::default();
        config.sync_params.min_ref_pts = 1;
        let registry = AdPatternRegistry::new(&config.ad_params).unwrap();
        let synchronizer = Synchronizer::new(&config, &registry);
        let (candidate, reference) = make_track(0);
        let outcome = synchronizer.analyze(&candidate, &reference, None);
        assert!(outcome.decision.contains("pts"));
        assert!(outcome.decision.starts_with("OK"));
    }
}
