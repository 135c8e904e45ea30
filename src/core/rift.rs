//! Piecewise segmentation search for abrupt offset breaks — "rifts" —
//! typically caused by inserted advertisement blocks (spec.md §4.4).
//!
//! Grounded in `LibSub/SubFixer.py`'s `RiftDetector`: a sliding window
//! scans the matched-point stream looking for a split into two halves
//! whose independent linear fits are both close to the nominal (global)
//! slope, tighter than the whole window's own fit, and mutually close to
//! parallel. Surviving splits become segment boundaries; each segment is
//! then refit independently and the boundary is placed in candidate
//! caption-index space so it can be applied caption-by-caption.
//!
//! The window is sized in *match count*, not wall-clock time: `section_len`
//! is `ceil(N / trial_segs)` matches, where `trial_segs` scales with the
//! track's length so a ten-minute clip and a two-hour movie both get a
//! sensible number of candidate windows.

use crate::config::RiftParams;
use crate::core::caption::hhmmss_str;
use crate::core::phrase::Match;
use crate::core::regression::{linear_regression, LinearModel};

/// A linear correction valid over one segment of the candidate timeline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Formula {
    pub model: LinearModel,
    /// First candidate caption index (inclusive) this formula applies to.
    pub caption_from: usize,
    /// Last candidate caption index (exclusive) this formula applies to.
    pub caption_to: usize,
}

impl Formula {
    /// Apply the fitted `delta = intercept + slope * t` correction to a
    /// candidate timestamp.
    pub fn apply(&self, t_ms: i64) -> i64 {
        t_ms + (self.model.intercept + self.model.slope * t_ms as f64).round() as i64
    }
}

struct BreakCandidate {
    index: usize,
    left: LinearModel,
    right: LinearModel,
}

/// Search `matches` (assumed already pruned) for rifts and return the
/// resulting list of per-segment [`Formula`]s, covering every candidate
/// caption index from `0` to `candidate_caption_count`.
///
/// Falls back to a single whole-track formula when there are too few
/// matches to search, or the track is too short to need more than one
/// trial segment.
pub fn detect_rifts(
    matches: &[Match],
    candidate_caption_count: usize,
    track_end_ms: i64,
    params: &RiftParams,
) -> Vec<Formula> {
    if matches.len() < params.min_pts * 2 || candidate_caption_count == 0 {
        return vec![whole_track_formula(matches, candidate_caption_count)];
    }

    let mut sorted: Vec<Match> = matches.to_vec();
    sorted.sort_by(|a, b| a.x_ms.cmp(&b.x_ms));

    let global = linear_regression(&sorted.iter().map(Match::point).collect::<Vec<_>>());
    let sign = if global.slope < 0.0 { -1.0 } else { 1.0 };
    let signed_points: Vec<(f64, f64)> = sorted
        .iter()
        .map(|m| (m.x_ms as f64, sign * m.delta_ms as f64))
        .collect();

    let n = sorted.len();
    let trial_segs = ((track_end_ms as f64 / (params.trial_mins * 60_000.0)).ceil() as usize + 1)
        .max(params.min_trial_segs);
    let section_len = ((n as f64 / trial_segs as f64).ceil() as usize).max(1);

    let mut rift_indices: Vec<usize> = Vec::new();
    let mut bot = 0usize;
    while n - bot >= (section_len / 2).max(1) {
        let top = (bot + section_len).min(n);
        if top <= bot + 1 {
            break;
        }
        let window = &signed_points[bot..top];
        let window_model = linear_regression(window);
        let window_span = (window.last().unwrap().1 - window.first().unwrap().1).abs();

        let advance = (section_len * params.border_div.saturating_sub(3)) / params.border_div;
        let mut next_bot = bot + advance.max(1);

        if window.len() >= params.min_pts * 2 && window_span >= 300.0 {
            if let Some(candidate) =
                best_break(&signed_points, bot, top, global.slope, window_model.stdev, params)
            {
                log::trace!(
                    "rift accepted at match {} (~{}), left slope {:.5} right slope {:.5}",
                    candidate.index,
                    hhmmss_str(signed_points[candidate.index].0 / 1000.0),
                    candidate.left.slope,
                    candidate.right.slope,
                );
                rift_indices.push(candidate.index);
                next_bot = next_bot.max(candidate.index + 1);
            }
        }
        bot = next_bot;
    }

    build_formulas(&sorted, &rift_indices, candidate_caption_count)
}

fn best_break(
    points: &[(f64, f64)],
    bot: usize,
    top: usize,
    nominal_slope: f64,
    window_stdev: f64,
    params: &RiftParams,
) -> Option<BreakCandidate> {
    let border = ((top - bot) as f64 / params.border_div as f64).ceil() as usize;
    let border = border.max(1);
    if bot + border >= top.saturating_sub(border) {
        return None;
    }

    let mut best: Option<(f64, BreakCandidate)> = None;

    for mid in (bot + border)..(top - border) {
        let left_start = mid.saturating_sub(params.pref_pts).max(bot);
        let left = &points[left_start..mid];
        let right_end = (mid + params.pref_pts).min(top);
        let right = &points[mid..right_end];
        if left.len() < params.min_pts || right.len() < params.min_pts {
            continue;
        }

        let left_model = linear_regression(left);
        let right_model = linear_regression(right);
        if (left_model.slope - nominal_slope).abs() > params.max_slope_delta {
            continue;
        }
        if (right_model.slope - nominal_slope).abs() > params.max_slope_delta {
            continue;
        }

        let joint_stdev =
            ((left_model.squares_sum + right_model.squares_sum) / (left.len() + right.len()) as f64)
                .sqrt();

        if joint_stdev >= params.min_dev_frac * window_stdev {
            continue;
        }
        if left_model.stdev > params.max_dev_frac * window_stdev
            || right_model.stdev > params.max_dev_frac * window_stdev
        {
            continue;
        }
        if (left_model.slope - right_model.slope).abs() > params.max_parallel_delta {
            continue;
        }

        if best.as_ref().is_none_or(|(best_rms, _)| joint_stdev < *best_rms) {
            best = Some((
                joint_stdev,
                BreakCandidate {
                    index: mid,
                    left: left_model,
                    right: right_model,
                },
            ));
        }
    }

    best.map(|(_, candidate)| candidate)
}

fn build_formulas(
    sorted_matches: &[Match],
    rift_indices: &[usize],
    candidate_caption_count: usize,
) -> Vec<Formula> {
    let mut bounds = vec![0usize];
    bounds.extend(rift_indices.iter().copied());
    bounds.push(sorted_matches.len());
    bounds.sort_unstable();
    bounds.dedup();

    let mut formulas = Vec::new();
    for window in bounds.windows(2) {
        let (seg_start, seg_end) = (window[0], window[1]);
        if seg_start == seg_end {
            continue;
        }
        let points: Vec<(f64, f64)> = sorted_matches[seg_start..seg_end]
            .iter()
            .map(Match::point)
            .collect();
        let model = linear_regression(&points);
        formulas.push((seg_start, seg_end, model));
    }

    let mut out = Vec::with_capacity(formulas.len());
    for (idx, (seg_start, seg_end, model)) in formulas.iter().enumerate() {
        let caption_from = if idx == 0 {
            0
        } else {
            boundary_caption_index(sorted_matches, formulas[idx - 1].1, *seg_start)
        };
        let caption_to = if idx + 1 == formulas.len() {
            candidate_caption_count
        } else {
            boundary_caption_index(sorted_matches, *seg_end, formulas[idx + 1].0)
        };
        out.push(Formula {
            model: *model,
            caption_from,
            caption_to,
        });
    }
    out
}

/// The split point between two segments, in candidate caption-index space:
/// the midpoint between the last match of the left segment and the first
/// match of the right segment.
fn boundary_caption_index(sorted_matches: &[Match], left_match_idx: usize, right_match_idx: usize) -> usize {
    let left_xpos = sorted_matches[left_match_idx.saturating_sub(1).min(sorted_matches.len() - 1)].xpos;
    let right_xpos = sorted_matches[right_match_idx.min(sorted_matches.len() - 1)].xpos;
    (left_xpos + right_xpos).div_ceil(2)
}

fn whole_track_formula(matches: &[Match], candidate_caption_count: usize) -> Formula {
    let model = if matches.is_empty() {
        LinearModel {
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
        }
    } else {
        linear_regression(&matches.iter().map(Match::point).collect::<Vec<_>>())
    };
    Formula {
        model,
        caption_from: 0,
        caption_to: candidate_caption_count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_match(xpos: usize, ypos: usize, x_ms: i64, delta_ms: i64) -> Match {
        Match {
            delta_ms,
            x_ms,
            y_ms: x_ms + delta_ms,
            xpos,
            ypos,
            xlen: 1,
            phrase_chars: 10,
        }
    }

    #[test]
    fn falls_back_to_single_formula_with_too_few_matches() {
        let matches: Vec<Match> = (0..5)
            .map(|i| make_match(i, i, i as i64 * 1000, 500))
            .collect();
        let params = RiftParams::default();
        let formulas = detect_rifts(&matches, 10, 60_000, &params);
        assert_eq!(formulas.len(), 1);
        assert_eq!(formulas[0].caption_from, 0);
        assert_eq!(formulas[0].caption_to, 10);
    }

    #[test]
    fn constant_delta_yields_single_flat_formula() {
        // 200 matches, perfectly constant 300ms delta across a 20-minute track.
        let matches: Vec<Match> = (0..200)
            .map(|i| make_match(i, i, i as i64 * 6000, 300))
            .collect();
        let params = RiftParams::default();
        let formulas = detect_rifts(&matches, 200, 1_200_000, &params);
        assert_eq!(formulas.len(), 1);
        assert!((formulas[0].model.intercept - 300.0).abs() < 5.0);
        assert!(formulas[0].model.slope.abs() < 0.01);
    }

    #[test]
    fn formula_apply_shifts_timestamp_by_fitted_offset() {
        let formula = Formula {
            model: LinearModel {
                slope: 0.0,
                intercept: 500.0,
                stdev: 0.0,
                r: 0.0,
                n: 1,
                squares_sum: 0.0,
                x_left: 0.0,
                x_right: 0.0,
                y_left: 500.0,
                y_right: 500.0,
            },
            caption_from: 0,
            caption_to: 1,
        };
        assert_eq!(formula.apply(10_000), 10_500);
    }
}
