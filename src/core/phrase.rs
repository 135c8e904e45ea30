//! Word extraction and phrase correlation between a candidate and a
//! reference caption list (spec.md §4.3).
//!
//! Grounded in `LibSub/SubFixer.py`'s `PhraseCorrelator`: captions are
//! turned into timestamped words by dividing their duration evenly among
//! tokens (clamped to a plausible speaking rate), consecutive words within
//! a caption are grouped into phrases, and a reference word sequence is
//! matched against the candidate's phrase index greedily, longest phrase
//! first. The raw match list is then pruned for monotonicity and OLS
//! outliers before being handed to the regression/rift stages.

use std::collections::{HashMap, HashSet};

use crate::config::PhraseParams;
use crate::core::caption::CaptionList;
use crate::core::regression::linear_regression;

/// Plausible spoken-word duration range, 100-160 words per minute. Not
/// user-configurable: these bound what a single extracted word's share of
/// a caption's duration can look like, independent of the phrase-indexing
/// thresholds in [`PhraseParams`].
const MIN_WORD_MS: f64 = 375.0;
const MAX_WORD_MS: f64 = 600.0;
/// Caption is rejected as untimeable outside `[MIN_WORD_MS/FUDGE, MAX_WORD_MS*FUDGE]`.
const FUDGE: f64 = 2.0;
/// Longest phrase considered when indexing or matching.
const MAX_PHRASE_WORDS: usize = 16;
/// Maximum gap in ms between consecutive words still considered phrase-adjacent.
const MAX_WORD_GAP_MS: i64 = 1000;
/// `xpos + ypos` beyond this is treated as too implausible a jump to trust.
const FAR_OUT_MAX: usize = 10;

/// A single timestamped word extracted from a caption.
#[derive(Debug, Clone, PartialEq)]
pub struct Word {
    pub text: String,
    pub time_ms: i64,
}

/// A matched phrase between the candidate and the reference.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Match {
    /// `reference_time_ms - candidate_time_ms`, spec.md §9's sign convention.
    pub delta_ms: i64,
    /// The owning candidate caption's `begin_ms` — the regression/rift
    /// stages fit against caption time, not word time, since
    /// `Formula::apply` is applied to caption begin/end timestamps.
    pub x_ms: i64,
    pub y_ms: i64,
    /// Candidate caption index the matched word came from.
    pub xpos: usize,
    /// Reference caption index the matched word came from.
    pub ypos: usize,
    /// Word count of the phrase this match belongs to.
    pub xlen: usize,
    /// Character length of the matched phrase text.
    pub phrase_chars: usize,
}

impl Match {
    /// `(candidate_time_ms, delta_ms)` — the point the regression/rift
    /// stages fit against, so a fitted slope near zero and intercept near
    /// zero both mean "already in sync".
    pub fn point(&self) -> (f64, f64) {
        (self.x_ms as f64, self.delta_ms as f64)
    }
}

#[derive(Debug, Clone, Copy)]
struct PhraseOccurrence {
    caption_idx: usize,
    word_idx: usize,
}

enum CandidateEntry {
    Unique(PhraseOccurrence),
    Ambiguous,
}

fn strip_directives(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut angle_depth = 0u32;
    let mut brace_depth = 0u32;
    for ch in text.chars() {
        match ch {
            '<' => angle_depth += 1,
            '>' if angle_depth > 0 => angle_depth -= 1,
            '{' => brace_depth += 1,
            '}' if brace_depth > 0 => brace_depth -= 1,
            _ if angle_depth == 0 && brace_depth == 0 => out.push(ch),
            _ => {}
        }
    }
    out
}

fn tokenize(text: &str) -> Vec<String> {
    text.split_whitespace()
        .map(|w| {
            w.trim_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase()
        })
        .filter(|w| !w.is_empty())
        .collect()
}

/// Extract timestamped words from a caption's text, or `None` if its
/// implied words-per-minute is too far outside plausible speech.
fn extract_words(begin_ms: i64, end_ms: i64, text: &str) -> Option<Vec<Word>> {
    let stripped = strip_directives(text);
    let tokens = tokenize(&stripped);
    if tokens.is_empty() {
        return None;
    }
    let duration = (end_ms - begin_ms).max(1) as f64;
    let ms_per_word_raw = duration / tokens.len() as f64;
    if ms_per_word_raw < MIN_WORD_MS / FUDGE || ms_per_word_raw > MAX_WORD_MS * FUDGE {
        return None;
    }
    let ms_per_word = ms_per_word_raw.clamp(MIN_WORD_MS, MAX_WORD_MS);
    Some(
        tokens
            .into_iter()
            .enumerate()
            .map(|(pos, text)| Word {
                text,
                time_ms: begin_ms + (pos as f64 * ms_per_word).round() as i64,
            })
            .collect(),
    )
}

/// Extract words for every caption in `list`. Captions rejected by
/// [`extract_words`] appear as `None` at their original index so caption
/// indices stay stable between the candidate and reference sides.
fn extract_all(list: &CaptionList) -> Vec<Option<Vec<Word>>> {
    list.captions
        .iter()
        .map(|c| extract_words(c.begin_ms, c.end_ms, &c.text()))
        .collect()
}

fn words_within_gap(words: &[Word], start: usize, len: usize) -> bool {
    for k in 1..len {
        if words[start + k].time_ms - words[start + k - 1].time_ms > MAX_WORD_GAP_MS {
            return false;
        }
    }
    true
}

fn index_candidate(
    words: &[Option<Vec<Word>>],
    params: &PhraseParams,
) -> HashMap<String, CandidateEntry> {
    let mut index: HashMap<String, CandidateEntry> = HashMap::new();
    for (caption_idx, maybe_words) in words.iter().enumerate() {
        let Some(words) = maybe_words else { continue };
        for start in 0..words.len() {
            let max_len = MAX_PHRASE_WORDS.min(words.len() - start);
            for len in 1..=max_len {
                if !words_within_gap(words, start, len) {
                    break;
                }
                let phrase = words[start..start + len]
                    .iter()
                    .map(|w| w.text.as_str())
                    .collect::<Vec<_>>()
                    .join(" ");
                if phrase.len() < params.min_str_len
                    || !words[start..start + len]
                        .iter()
                        .any(|w| w.text.len() >= params.min_word_len)
                {
                    continue;
                }
                index
                    .entry(phrase)
                    .and_modify(|e| *e = CandidateEntry::Ambiguous)
                    .or_insert(CandidateEntry::Unique(PhraseOccurrence {
                        caption_idx,
                        word_idx: start,
                    }));
            }
        }
    }
    index
}

/// Correlate `candidate` against `reference`: extract words from both,
/// index the candidate's phrases, then walk the reference word stream
/// greedily matching the longest indexable phrase at each position.
/// Returns the pruned match list.
pub fn correlate(candidate: &CaptionList, reference: &CaptionList, params: &PhraseParams) -> Vec<Match> {
    let candidate_words = extract_all(candidate);
    let reference_words = extract_all(reference);
    let index = index_candidate(&candidate_words, params);

    let mut matches = Vec::new();
    let mut matched_candidate_captions: HashSet<usize> = HashSet::new();

    for (yidx, maybe_ywords) in reference_words.iter().enumerate() {
        let Some(ywords) = maybe_ywords else { continue };
        let mut pos = 0usize;
        while pos < ywords.len() {
            let max_len = MAX_PHRASE_WORDS.min(ywords.len() - pos);
            let mut found: Option<(PhraseOccurrence, usize, usize)> = None; // (occ, len, phrase_chars)

            for len in (1..=max_len).rev() {
                if !words_within_gap(ywords, pos, len) {
                    continue;
                }
                let phrase = ywords[pos..pos + len]
                    .iter()
                    .map(|w| w.text.as_str())
                    .collect::<Vec<_>>()
                    .join(" ");
                if phrase.len() < params.min_str_len {
                    continue;
                }
                if let Some(CandidateEntry::Unique(occ)) = index.get(&phrase) {
                    found = Some((*occ, len, phrase.len()));
                    break;
                }
            }

            let Some((occ, len, phrase_chars)) = found else {
                pos += 1;
                continue;
            };

            if matched_candidate_captions.contains(&occ.caption_idx) {
                pos += 1;
                continue;
            }
            // spec.md §4.3: reject if the matched word sits implausibly
            // deep into both its candidate and reference captions - this
            // compares intra-caption word positions, not caption indices,
            // so it only ever fires on unusually long captions.
            if occ.word_idx + pos > FAR_OUT_MAX {
                pos += 1;
                continue;
            }

            let xwords = candidate_words[occ.caption_idx]
                .as_ref()
                .expect("phrase occurrences only reference captions with extracted words");
            let xbegin_ms = candidate.captions[occ.caption_idx].begin_ms;
            for k in 0..len {
                let xword = &xwords[occ.word_idx + k];
                let yword = &ywords[pos + k];
                matches.push(Match {
                    delta_ms: yword.time_ms - xword.time_ms,
                    x_ms: xbegin_ms,
                    y_ms: yword.time_ms,
                    xpos: occ.caption_idx,
                    ypos: yidx,
                    xlen: len,
                    phrase_chars,
                });
            }
            matched_candidate_captions.insert(occ.caption_idx);
            pos += len;
        }
    }

    let raw_count = matches.len();
    remove_nonmonotonic(&mut matches);
    remove_ols_outliers(&mut matches);
    select_best_match_per_caption(&mut matches);
    log::debug!(
        "phrase correlation: {raw_count} raw matches, {} survived outlier removal",
        matches.len()
    );
    matches
}

/// spec.md §4.3 stage 3: reduce a caption's surviving matches to at most
/// one, preferring the longest phrase of at least 30 characters if any
/// qualify, else the match minimizing `xpos + ypos`. Mirrors
/// `SubFixer.py:1118-1130`'s `mcap.matches = [closest_match]` reduction.
fn select_best_match_per_caption(matches: &mut Vec<Match>) {
    let mut by_caption: HashMap<usize, Vec<Match>> = HashMap::new();
    for m in matches.drain(..) {
        by_caption.entry(m.xpos).or_default().push(m);
    }
    let mut reduced: Vec<Match> = by_caption
        .into_values()
        .map(|group| {
            let long_phrases = group.iter().filter(|m| m.phrase_chars >= 30);
            long_phrases
                .max_by_key(|m| m.phrase_chars)
                .copied()
                .unwrap_or_else(|| {
                    *group
                        .iter()
                        .min_by_key(|m| m.xpos + m.ypos)
                        .expect("group is never empty")
                })
        })
        .collect();
    reduced.sort_by_key(|m| m.x_ms);
    *matches = reduced;
}

/// Drop matches whose candidate time falls outside the range bracketed by
/// nearby matches in reference order, at shrinking neighborhood widths.
/// A faithful generalization of the original's four fixed-distance passes.
fn remove_nonmonotonic(matches: &mut Vec<Match>) {
    matches.sort_by(|a, b| (a.ypos, a.x_ms).cmp(&(b.ypos, b.x_ms)));
    for distance in [5usize, 4, 3, 2] {
        if matches.len() <= distance {
            continue;
        }
        let mut keep = vec![true; matches.len()];
        for i in 0..matches.len() {
            let lo = i.saturating_sub(distance);
            let hi = (i + distance).min(matches.len() - 1);
            let mut neighbor_min = i64::MAX;
            let mut neighbor_max = i64::MIN;
            for (j, k) in keep.iter().enumerate().take(hi + 1).skip(lo) {
                if j == i || !k {
                    continue;
                }
                neighbor_min = neighbor_min.min(matches[j].x_ms);
                neighbor_max = neighbor_max.max(matches[j].x_ms);
            }
            if neighbor_min > neighbor_max {
                continue; // no live neighbors to compare against
            }
            let slack = MAX_WORD_GAP_MS * distance as i64;
            if matches[i].x_ms < neighbor_min - slack || matches[i].x_ms > neighbor_max + slack {
                keep[i] = false;
            }
        }
        let mut idx = 0;
        matches.retain(|_| {
            let k = keep[idx];
            idx += 1;
            k
        });
    }
}

/// Iteratively drop the match with the largest OLS residual while it
/// exceeds three standard deviations, refitting after each removal.
fn remove_ols_outliers(matches: &mut Vec<Match>) {
    loop {
        if matches.len() < 3 {
            return;
        }
        let points: Vec<(f64, f64)> = matches.iter().map(Match::point).collect();
        let model = linear_regression(&points);
        if model.stdev <= 0.0 {
            return;
        }
        let threshold = 3.0 * model.stdev;
        let mut worst_idx = None;
        let mut worst_residual = threshold;
        for (idx, &(x, y)) in points.iter().enumerate() {
            let residual = (y - model.eval(x)).abs();
            if residual > worst_residual {
                worst_residual = residual;
                worst_idx = Some(idx);
            }
        }
        match worst_idx {
            Some(idx) => {
                matches.remove(idx);
            }
            None => return,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
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

    #[test]
    fn extracts_words_with_even_spacing() {
        let words = extract_words(0, 2000, "the quick brown fox").unwrap();
        assert_eq!(words.len(), 4);
        assert_eq!(words[0].time_ms, 0);
        assert!(words[3].time_ms > words[0].time_ms);
    }

    #[test]
    fn rejects_caption_with_implausible_rate() {
        // 20 words in 500ms is far faster than any plausible speech rate.
        let text = (0..20)
            .map(|i| format!("word{i}"))
            .collect::<Vec<_>>()
            .join(" ");
        assert!(extract_words(0, 500, &text).is_none());
    }

    #[test]
    fn strips_angle_and_brace_directives() {
        let stripped = strip_directives("<i>hello</i> {\\an8}world");
        assert_eq!(stripped.trim(), "hello world");
    }

    #[test]
    fn correlate_matches_shared_distinctive_phrase() {
        let candidate = CaptionList::from_captions(vec![
            caption(1, 0, 3000, "good morning everyone welcome back"),
            caption(2, 4000, 7000, "today we discuss something unrelated"),
        ]);
        let reference = CaptionList::from_captions(vec![
            caption(1, 500, 3500, "good morning everyone welcome back"),
            caption(2, 4500, 7500, "today we discuss something unrelated"),
        ]);
        let params = PhraseParams::default();
        let matches = correlate(&candidate, &reference, &params);
        assert!(!matches.is_empty());
        for m in &matches {
            assert!((m.delta_ms - 500).abs() < 50);
        }
    }

    #[test]
    fn correlate_reduces_to_at_most_one_match_per_candidate_caption() {
        // A multi-word phrase spanning an entire caption produces one raw
        // match per word internally; spec.md §4.3 stage 3 must reduce
        // those back down to a single point per candidate caption.
        let candidate = CaptionList::from_captions(vec![caption(
            1,
            0,
            4000,
            "good morning everyone welcome back today",
        )]);
        let reference = CaptionList::from_captions(vec![caption(
            1,
            1000,
            5000,
            "good morning everyone welcome back today",
        )]);
        let params = PhraseParams::default();
        let matches = correlate(&candidate, &reference, &params);
        assert_eq!(matches.len(), 1);
    }

    #[test]
    fn correlate_match_x_ms_is_the_candidate_captions_begin_ms() {
        // The regression/rift stages fit against caption begin time, not
        // word time, since Formula::apply is applied to caption
        // begin/end timestamps.
        let candidate = CaptionList::from_captions(vec![caption(
            1,
            10_000,
            13_000,
            "good morning everyone welcome back",
        )]);
        let reference = CaptionList::from_captions(vec![caption(
            1,
            10_500,
            13_500,
            "good morning everyone welcome back",
        )]);
        let params = PhraseParams::default();
        let matches = correlate(&candidate, &reference, &params);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].x_ms, 10_000);
    }

    #[test]
    fn correlate_ignores_ambiguous_phrases() {
        let candidate = CaptionList::from_captions(vec![
            caption(1, 0, 2000, "thank you very much"),
            caption(2, 3000, 5000, "thank you very much"),
        ]);
        let reference = CaptionList::from_captions(vec![caption(1, 0, 2000, "thank you very much")]);
        let params = PhraseParams::default();
        let matches = correlate(&candidate, &reference, &params);
        // "thank you very much" is ambiguous in the candidate (two captions),
        // so no unique phrase match should be produced from it.
        assert!(matches.is_empty());
    }
}
