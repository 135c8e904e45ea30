//! SRT parsing, two-pass repair, ad detection/purge, and serialization
//! (spec.md §4.1).
//!
//! Grounded in `LibSub/SubFixer.py`'s `Caption`/`CaptionList` classes: the
//! forward repair pass flags misnumbered leaders, drops or clamps captions
//! with a negative `begin_ms`, and detects out-of-order captions; the
//! reverse pass extends short-duration captions and splits overlaps
//! proportionally to each caption's line count. Leaders are always
//! renumbered 1..N on the way out — they carry no authority on the way in.

use std::collections::HashMap;
use std::io::Write as _;
use std::path::Path;

use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};

use crate::config::AdParams;
use crate::error::SubSyncError;

/// Timestamp line: `HH:MM:SS,mmm --> HH:MM:SS,mmm`, tolerant of extra
/// whitespace around the arrow and of hour fields wider than two digits.
static TIMESTAMP_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(\d+):(\d{2}):(\d{2}),(\d{3})\s*-->\s*(\d+):(\d{2}):(\d{2}),(\d{3})",
    )
    .expect("static timestamp regex is valid")
});

/// Single-entry character-fix translation table: a broken-encoding
/// "pilcrow" musical-note marker becomes an actual eighth note. Structured
/// as a map so a future encoding fix can be added without touching the
/// call site.
static CHAR_FIXES: Lazy<HashMap<char, char>> = Lazy::new(|| HashMap::from([('¶', '♪')]));

/// A single subtitle caption.
#[derive(Debug, Clone, PartialEq)]
pub struct Caption {
    /// 1-based display index. Non-authoritative on input; always
    /// reassigned by [`CaptionList::renumber`] on repair, purge, and delay.
    pub leader: u32,
    /// The raw leader text as it appeared in the source file, used only to
    /// detect misnumbering during repair.
    pub raw_leader: String,
    /// Start time in milliseconds.
    pub begin_ms: i64,
    /// End time in milliseconds.
    pub end_ms: i64,
    /// Text lines, character-fixed, in original order.
    pub lines: Vec<String>,
}

impl Caption {
    /// Duration in milliseconds; may be zero or negative before repair.
    pub fn duration_ms(&self) -> i64 {
        self.end_ms - self.begin_ms
    }

    /// Text lines joined with `\n`, the unit ad regexes are matched against.
    pub fn text(&self) -> String {
        self.lines.join("\n")
    }

    /// Abbreviated one-line debug rendering: begin time plus up to
    /// `max_words` words of the caption's text, for trace-level log lines
    /// (rift application, anomaly reporting) where a full caption dump
    /// would be noise.
    pub fn mini_str(&self, max_words: usize) -> String {
        let words: Vec<&str> = self.text().split_whitespace().take(max_words).collect();
        format!("{} {}", format_timestamp(self.begin_ms), words.join(" "))
    }

    /// Debug rendering of this caption's time relative to whichever track
    /// boundary (start or end) it's closer to, signed so a caption near
    /// the end reads as a negative "from the end" offset.
    pub fn delta_str(&self, list: &CaptionList) -> String {
        let to_end_ms = list
            .captions
            .last()
            .map(|last| self.begin_ms - last.end_ms)
            .unwrap_or(self.begin_ms);
        let rel_ms = if self.begin_ms.abs() < to_end_ms.abs() {
            self.begin_ms
        } else {
            to_end_ms
        };
        format!("{}s {}", rel_ms as f64 / 1000.0, self.text())
    }
}

/// Compact `H:MM:SS`/`MM:SS` duration rendering (hours/leading zero elided),
/// used in trace logging where [`format_timestamp`]'s full
/// `HH:MM:SS,mmm` is more precision than needed.
pub fn hhmmss_str(seconds: f64) -> String {
    let total = seconds.round() as i64;
    let hrs = total / 3600;
    let mins = (total / 60) % 60;
    let secs = total % 60;
    if hrs != 0 {
        format!("{hrs}:{mins:02}:{secs:02}")
    } else {
        format!("{mins}:{secs:02}")
    }
}

/// Compiled ad-detection regex sets, built once from [`AdParams`] and held
/// for the lifetime of a run. The core never recompiles a pattern.
pub struct AdPatternRegistry {
    limited: Vec<Regex>,
    global: Vec<Regex>,
    limit_ms: i64,
}

impl AdPatternRegistry {
    /// Compile every pattern in `params`, case-insensitively. Fails on the
    /// first pattern that doesn't compile.
    pub fn new(params: &AdParams) -> crate::Result<Self> {
        let compile = |patterns: &[String]| -> crate::Result<Vec<Regex>> {
            patterns
                .iter()
                .map(|p| {
                    RegexBuilder::new(p)
                        .case_insensitive(true)
                        .build()
                        .map_err(|e| {
                            SubSyncError::config(format!(
                                "cannot compile ad pattern '{p}': {e}"
                            ))
                        })
                })
                .collect()
        };
        Ok(Self {
            limited: compile(&params.limited_regexes)?,
            global: compile(&params.global_regexes)?,
            limit_ms: params.limit_s * 1000,
        })
    }
}

/// A parsed, mutable list of captions, plus the anomaly log and counters
/// spec.md §4.1 asks `repair`/`purge_ads`/`delay` to accumulate.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CaptionList {
    pub captions: Vec<Caption>,
    /// Human-readable repair/delay anomalies, in the order encountered.
    pub anomalies: Vec<String>,
    /// `(pattern, caption_index)` pairs recorded by [`CaptionList::detect_ads`],
    /// consumed and cleared by [`CaptionList::purge_ads`].
    pub ads: Vec<(String, usize)>,
    pub misnum_cnt: usize,
    pub purge_ads_cnt: usize,
    pub fixed_char_cnt: usize,
    pub delay_cnt: usize,
}

impl CaptionList {
    /// Parse from raw bytes, decoding as UTF-8 with lossy replacement of
    /// invalid sequences (spec.md §9).
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let (text, _, _) = encoding_rs::UTF_8.decode(bytes);
        Self::from_str(&text)
    }

    /// Read and parse an SRT file from disk.
    pub fn from_path(path: &Path) -> crate::Result<Self> {
        let bytes = std::fs::read(path)?;
        Ok(Self::from_bytes(&bytes))
    }

    /// Parse from already-decoded text.
    pub fn from_str(text: &str) -> Self {
        let (captions, anomalies, fixed_char_cnt) = parse_blocks(text);
        CaptionList {
            captions,
            anomalies,
            ads: Vec::new(),
            misnum_cnt: 0,
            purge_ads_cnt: 0,
            fixed_char_cnt,
            delay_cnt: 0,
        }
    }

    /// Wrap an already-built caption vector, e.g. for fixture construction
    /// in tests or for a [`crate::core::sync::Synchronizer`] working copy.
    pub fn from_captions(captions: Vec<Caption>) -> Self {
        CaptionList {
            captions,
            ..Default::default()
        }
    }

    /// Two-pass repair: forward pass flags misnumbered leaders and
    /// negative-begin captions and detects out-of-order captions; if any
    /// were found, the list is stable-sorted by `begin_ms`. The reverse
    /// pass then extends short-duration captions and splits overlaps.
    /// Leaders are renumbered unconditionally at the end.
    pub fn repair(&mut self) {
        self.forward_pass();
        self.reverse_pass();
        self.renumber();
    }

    fn forward_pass(&mut self) {
        let mut deletions = Vec::new();
        let mut order_errs = 0usize;

        for idx in 0..self.captions.len() {
            if let Ok(n) = self.captions[idx].raw_leader.parse::<i64>() {
                if n != idx as i64 + 1 {
                    self.anomalies.push(format!(
                        "fix misnumbered: {} not {}",
                        n,
                        idx + 1
                    ));
                    self.misnum_cnt += 1;
                }
            }
            // A non-numeric leader is left unflagged: the original
            // implementation silently accepts it too.

            if self.captions[idx].begin_ms < 0 {
                if self.captions[idx].end_ms <= 0 {
                    self.anomalies
                        .push(format!("drop caption {idx}: begin and end both negative"));
                    deletions.push(idx);
                } else {
                    self.anomalies
                        .push(format!("clamp caption {idx}: negative begin_ms"));
                    self.captions[idx].begin_ms = 0;
                }
                continue;
            }

            if idx + 1 < self.captions.len()
                && self.captions[idx].begin_ms > self.captions[idx + 1].begin_ms
            {
                self.anomalies
                    .push(format!("out of order: caption {idx} begins after caption {}", idx + 1));
                order_errs += 1;
            }
        }

        for &idx in deletions.iter().rev() {
            self.captions.remove(idx);
        }

        if order_errs > 0 {
            self.captions.sort_by_key(|c| c.begin_ms);
        }
    }

    fn reverse_pass(&mut self) {
        let len = self.captions.len();
        for idx in (0..len).rev() {
            if self.captions[idx].duration_ms() <= 0 {
                if idx + 1 < len {
                    let next_begin = self.captions[idx + 1].begin_ms;
                    let gap = next_begin - self.captions[idx].end_ms;
                    if gap < 200 {
                        self.captions[idx].end_ms = next_begin + 1;
                    } else {
                        self.anomalies
                            .push(format!("extend short caption {idx}"));
                        self.captions[idx].end_ms =
                            self.captions[idx].begin_ms + gap.min(2000);
                    }
                } else {
                    self.anomalies
                        .push(format!("extend short caption {idx}"));
                    self.captions[idx].end_ms = self.captions[idx].begin_ms + 2000;
                }
            }

            if idx + 1 < len && self.captions[idx].end_ms > self.captions[idx + 1].begin_ms {
                self.anomalies.push(format!(
                    "split overlap between caption {idx} and caption {}",
                    idx + 1
                ));
                let begin = self.captions[idx].begin_ms;
                let next_end = self.captions[idx + 1].end_ms;
                let cur_end = self.captions[idx].end_ms;
                let duration = next_end.max(cur_end) - begin;
                let my_lines = self.captions[idx].lines.len();
                let next_lines = self.captions[idx + 1].lines.len();
                let tot_lines = (my_lines + next_lines).max(1);
                let duration1 =
                    (duration as f64 * my_lines as f64 / tot_lines as f64).round() as i64;
                let duration2 = duration - duration1;
                self.captions[idx].end_ms = begin + duration1;
                self.captions[idx + 1].begin_ms = self.captions[idx].end_ms;
                self.captions[idx + 1].end_ms = self.captions[idx + 1].begin_ms + duration2;
            }
        }
    }

    fn renumber(&mut self) {
        for (idx, caption) in self.captions.iter_mut().enumerate() {
            caption.leader = idx as u32 + 1;
        }
    }

    /// Detect ad captions against `registry`, recording `(pattern, index)`
    /// pairs in [`CaptionList::ads`]. Limited patterns are tried first for
    /// captions within `limit_s` seconds of the track's start or end;
    /// global patterns are tried everywhere a limited pattern didn't hit.
    pub fn detect_ads(&mut self, registry: &AdPatternRegistry) {
        if self.captions.is_empty() {
            return;
        }
        let save_from_ms = self.captions[0].begin_ms + registry.limit_ms;
        let save_to_ms = self.captions[self.captions.len() - 1].end_ms - registry.limit_ms;

        for (idx, caption) in self.captions.iter().enumerate() {
            let text = caption.text();
            let near_edge = caption.begin_ms <= save_from_ms || caption.begin_ms >= save_to_ms;

            let mut hit = None;
            if near_edge {
                hit = registry.limited.iter().find(|re| re.is_match(&text));
            }
            if hit.is_none() {
                hit = registry.global.iter().find(|re| re.is_match(&text));
            }
            if let Some(pattern) = hit {
                self.ads.push((pattern.as_str().to_string(), idx));
            }
        }
    }

    /// Remove every caption recorded in [`CaptionList::ads`], renumber, and
    /// clear the ad list so a repeated call is a no-op.
    pub fn purge_ads(&mut self) {
        if self.ads.is_empty() {
            return;
        }
        let mut indices: Vec<usize> = self.ads.iter().map(|(_, idx)| *idx).collect();
        indices.sort_unstable();
        indices.dedup();
        for &idx in indices.iter().rev() {
            self.captions.remove(idx);
        }
        self.purge_ads_cnt += indices.len();
        self.ads.clear();
        self.renumber();
    }

    /// Shift every caption's begin/end by `delay_ms` (may be negative).
    /// A caption whose shifted `end_ms` is still negative is dropped;
    /// one whose `begin_ms` goes negative but `end_ms` doesn't is clamped
    /// to zero. `delay_cnt` counts every caption actually shifted (dropped
    /// captions don't count).
    pub fn delay(&mut self, delay_ms: i64) {
        let mut deletions = Vec::new();
        for (idx, caption) in self.captions.iter_mut().enumerate() {
            caption.begin_ms += delay_ms;
            caption.end_ms += delay_ms;
            if caption.begin_ms < 0 {
                if caption.end_ms < 0 {
                    deletions.push(idx);
                    continue;
                }
                caption.begin_ms = 0;
            }
            self.delay_cnt += 1;
        }
        for &idx in deletions.iter().rev() {
            self.anomalies
                .push(format!("drop caption {idx}: delay pushed it entirely negative"));
            self.captions.remove(idx);
        }
    }

    /// Render as SRT text: 1-based leaders, captions separated by a blank
    /// line, no trailing blank line after the last caption.
    pub fn serialize(&self) -> String {
        let mut out = String::new();
        for (idx, caption) in self.captions.iter().enumerate() {
            if idx > 0 {
                out.push('\n');
            }
            out.push_str(&(idx + 1).to_string());
            out.push('\n');
            out.push_str(&format!(
                "{} --> {}\n",
                format_timestamp(caption.begin_ms),
                format_timestamp(caption.end_ms)
            ));
            for line in &caption.lines {
                out.push_str(line);
                out.push('\n');
            }
        }
        out
    }

    /// Serialize and write atomically: write to a sibling temp file, then
    /// rename over the destination.
    pub fn write_atomic(&self, path: &Path) -> std::io::Result<()> {
        let tmp_path = path.with_extension("srt.tmp");
        {
            let mut tmp = std::fs::File::create(&tmp_path)?;
            tmp.write_all(self.serialize().as_bytes())?;
        }
        std::fs::rename(&tmp_path, path)
    }
}

fn to_ms(h: &str, m: &str, s: &str, ms: &str) -> i64 {
    let h: i64 = h.parse().unwrap_or(0);
    let m: i64 = m.parse().unwrap_or(0);
    let s: i64 = s.parse().unwrap_or(0);
    let ms: i64 = ms.parse().unwrap_or(0);
    ms + 1000 * (s + 60 * (m + 60 * h))
}

fn format_timestamp(total_ms: i64) -> String {
    let total_ms = total_ms.max(0);
    let ms = total_ms % 1000;
    let total_s = total_ms / 1000;
    let s = total_s % 60;
    let total_m = total_s / 60;
    let m = total_m % 60;
    let h = total_m / 60;
    format!("{h:02}:{m:02}:{s:02},{ms:03}")
}

fn fix_chars(line: &str) -> (String, bool) {
    let mut changed = false;
    let fixed: String = line
        .chars()
        .map(|c| match CHAR_FIXES.get(&c) {
            Some(&replacement) => {
                changed = true;
                replacement
            }
            None => c,
        })
        .collect();
    (fixed, changed)
}

/// Parse SRT text into captions, following the original's forgiving
/// state machine: scan lines for a leader, then a timestamp line, then
/// text lines until a blank line or end of input.
fn parse_blocks(text: &str) -> (Vec<Caption>, Vec<String>, usize) {
    let mut lines: std::collections::VecDeque<&str> = text.lines().collect();
    let mut captions = Vec::new();
    let mut anomalies = Vec::new();
    let mut fixed_char_cnt = 0usize;

    while !lines.is_empty() {
        let mut raw_leader = String::new();
        let mut begin_ms: Option<i64> = None;
        let mut end_ms = 0i64;
        let mut body: Vec<String> = Vec::new();

        while let Some(raw) = lines.pop_front() {
            let line = raw.trim();
            if begin_ms.is_none() {
                if let Some(caps) = TIMESTAMP_RE.captures(line) {
                    begin_ms = Some(to_ms(&caps[1], &caps[2], &caps[3], &caps[4]));
                    end_ms = to_ms(&caps[5], &caps[6], &caps[7], &caps[8]);
                    body = Vec::new();
                } else {
                    raw_leader = line.to_string();
                }
            } else if !line.is_empty() {
                let (fixed, changed) = fix_chars(line);
                if changed {
                    fixed_char_cnt += 1;
                }
                body.push(fixed);
            } else if body.is_empty() {
                anomalies.push(format!("empty caption: {raw_leader}"));
                begin_ms = None;
            } else {
                break;
            }
        }

        if let Some(begin_ms) = begin_ms {
            if !body.is_empty() {
                captions.push(Caption {
                    leader: 0,
                    raw_leader,
                    begin_ms,
                    end_ms,
                    lines: body,
                });
            }
        }
    }

    (captions, anomalies, fixed_char_cnt)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_CAPTIONS: &str = "1\n00:00:01,000 --> 00:00:03,000\nHello\n\n2\n00:00:04,000 --> 00:00:06,000\nWorld\n";

    #[test]
    fn parses_two_simple_captions() {
        let list = CaptionList::from_str(TWO_CAPTIONS);
        assert_eq!(list.captions.len(), 2);
        assert_eq!(list.captions[0].begin_ms, 1000);
        assert_eq!(list.captions[0].end_ms, 3000);
        assert_eq!(list.captions[0].lines, vec!["Hello".to_string()]);
        assert_eq!(list.captions[1].lines, vec!["World".to_string()]);
    }

    #[test]
    fn tolerates_extra_blank_lines_between_blocks() {
        let text = "1\n00:00:01,000 --> 00:00:03,000\nHello\n\n\n2\n00:00:04,000 --> 00:00:06,000\nWorld\n";
        let list = CaptionList::from_str(text);
        assert_eq!(list.captions.len(), 2);
    }

    #[test]
    fn fixes_pilcrow_to_eighth_note() {
        let text = "1\n00:00:01,000 --> 00:00:03,000\n¶ music ¶\n";
        let list = CaptionList::from_str(text);
        assert_eq!(list.captions[0].lines[0], "♪ music ♪");
        assert_eq!(list.fixed_char_cnt, 1);
    }

    #[test]
    fn repair_renumbers_unconditionally() {
        let mut list = CaptionList::from_str(TWO_CAPTIONS);
        list.captions[0].raw_leader = "99".to_string();
        list.repair();
        assert_eq!(list.captions[0].leader, 1);
        assert_eq!(list.captions[1].leader, 2);
        assert_eq!(list.misnum_cnt, 1);
    }

    #[test]
    fn repair_sorts_out_of_order_captions() {
        let text = "1\n00:00:05,000 --> 00:00:06,000\nSecond\n\n2\n00:00:01,000 --> 00:00:02,000\nFirst\n";
        let mut list = CaptionList::from_str(text);
        list.repair();
        assert_eq!(list.captions[0].lines[0], "First");
        assert_eq!(list.captions[1].lines[0], "Second");
    }

    #[test]
    fn repair_drops_caption_with_negative_begin_and_end() {
        let mut captions = vec![
            Caption {
                leader: 1,
                raw_leader: "1".to_string(),
                begin_ms: -500,
                end_ms: -100,
                lines: vec!["gone".to_string()],
            },
            Caption {
                leader: 2,
                raw_leader: "2".to_string(),
                begin_ms: 1000,
                end_ms: 2000,
                lines: vec!["kept".to_string()],
            },
        ];
        captions.sort_by_key(|c| c.begin_ms);
        let mut list = CaptionList::from_captions(captions);
        list.repair();
        assert_eq!(list.captions.len(), 1);
        assert_eq!(list.captions[0].lines[0], "kept");
    }

    #[test]
    fn repair_clamps_negative_begin_when_end_positive() {
        let captions = vec![Caption {
            leader: 1,
            raw_leader: "1".to_string(),
            begin_ms: -200,
            end_ms: 1000,
            lines: vec!["clamped".to_string()],
        }];
        let mut list = CaptionList::from_captions(captions);
        list.repair();
        assert_eq!(list.captions[0].begin_ms, 0);
    }

    #[test]
    fn repair_splits_overlap_proportionally_to_line_count() {
        let captions = vec![
            Caption {
                leader: 1,
                raw_leader: "1".to_string(),
                begin_ms: 0,
                end_ms: 5000,
                lines: vec!["one".to_string(), "two".to_string()],
            },
            Caption {
                leader: 2,
                raw_leader: "2".to_string(),
                begin_ms: 3000,
                end_ms: 7000,
                lines: vec!["three".to_string(), "four".to_string()],
            },
        ];
        let mut list = CaptionList::from_captions(captions);
        list.repair();
        assert_eq!(list.captions[0].end_ms, 3500);
        assert_eq!(list.captions[1].begin_ms, 3500);
        assert_eq!(list.captions[1].end_ms, 7000);
    }

    #[test]
    fn detect_and_purge_ads_round_trip() {
        let text = "1\n00:00:01,000 --> 00:00:03,000\nHello\n\n2\n00:00:04,000 --> 00:00:06,000\nwww.opensubtitles.org\n\n3\n00:00:07,000 --> 00:00:09,000\nWorld\n";
        let mut list = CaptionList::from_str(text);
        let params = AdParams::default();
        let registry = AdPatternRegistry::new(&params).unwrap();
        list.detect_ads(&registry);
        assert_eq!(list.ads.len(), 1);
        assert_eq!(list.ads[0].1, 1);
        list.purge_ads();
        assert_eq!(list.captions.len(), 2);
        assert!(list.ads.is_empty());
        assert_eq!(list.captions[1].lines[0], "World");
        // repeated purge is a no-op
        list.purge_ads();
        assert_eq!(list.captions.len(), 2);
    }

    #[test]
    fn delay_shifts_and_drops_fully_negative_captions() {
        let captions = vec![
            Caption {
                leader: 1,
                raw_leader: "1".to_string(),
                begin_ms: 500,
                end_ms: 1000,
                lines: vec!["a".to_string()],
            },
            Caption {
                leader: 2,
                raw_leader: "2".to_string(),
                begin_ms: 2000,
                end_ms: 3000,
                lines: vec!["b".to_string()],
            },
        ];
        let mut list = CaptionList::from_captions(captions);
        list.delay(-1500);
        assert_eq!(list.captions.len(), 1);
        assert_eq!(list.captions[0].begin_ms, 0);
        assert_eq!(list.captions[0].end_ms, 1500);
    }

    #[test]
    fn serialize_round_trip_is_stable() {
        let list = CaptionList::from_str(TWO_CAPTIONS);
        let out = list.serialize();
        let reparsed = CaptionList::from_str(&out);
        assert_eq!(reparsed.captions.len(), 2);
        assert_eq!(reparsed.captions[0].begin_ms, 1000);
        assert_eq!(out.trim_end(), out); // no trailing blank line
    }

    #[test]
    fn mini_str_truncates_to_max_words() {
        let list = CaptionList::from_str(TWO_CAPTIONS);
        let rendered = list.captions[0].mini_str(1);
        assert!(rendered.contains("00:00:01,000"));
        assert_eq!(rendered.trim_end(), "00:00:01,000 Hello");
    }

    #[test]
    fn delta_str_picks_whichever_boundary_is_closer() {
        let list = CaptionList::from_str(TWO_CAPTIONS);
        // First caption (begin 1000ms) is closer to the track start than
        // to the end (which trails off at 6000ms), so its offset is
        // relative to zero, not to the last caption's end.
        assert!(list.captions[0].delta_str(&list).starts_with("1s"));
    }

    #[test]
    fn hhmmss_str_elides_leading_zero_hour() {
        assert_eq!(hhmmss_str(65.0), "1:05");
        assert_eq!(hhmmss_str(3665.0), "1:01:05");
    }
}
