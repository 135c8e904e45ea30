//! Pure path-building helpers for the cache filesystem layout consumed
//! (not owned) by the synchronizer — spec.md §6. No I/O: these only ever
//! construct [`PathBuf`]s from a video path's stem, for a collaborator
//! (not part of this crate) that actually populates the cache directory.

use std::path::{Path, PathBuf};

/// Lower wins: `FOREIGN` pre-empts everything, `AUTODEFER` is consulted last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum QuirkTag {
    Foreign,
    Ignore,
    Score,
    Internal,
    Autodefer,
}

impl QuirkTag {
    pub fn priority(self) -> u8 {
        match self {
            QuirkTag::Foreign => 0,
            QuirkTag::Ignore => 1,
            QuirkTag::Score => 2,
            QuirkTag::Internal => 3,
            QuirkTag::Autodefer => 4,
        }
    }

    fn tag_str(self) -> &'static str {
        match self {
            QuirkTag::Foreign => "FOREIGN",
            QuirkTag::Ignore => "IGNORE",
            QuirkTag::Score => "SCORE",
            QuirkTag::Internal => "INTERNAL",
            QuirkTag::Autodefer => "AUTODEFER",
        }
    }
}

fn stem_of(video_path: &Path) -> String {
    video_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Candidate SRT expected alongside the video: `{stem}.{lang}.srt`.
pub fn candidate_srt_path(video_path: &Path, lang: &str) -> PathBuf {
    video_path.with_file_name(format!("{}.{lang}.srt", stem_of(video_path)))
}

/// This video's cache directory: `{stem}.cache/`.
pub fn cache_dir(video_path: &Path) -> PathBuf {
    video_path.with_file_name(format!("{}.cache", stem_of(video_path)))
}

/// Speech-accurate reference SRT: `{stem}.cache/{stem}.REFERENCE.srt`.
pub fn reference_srt_path(video_path: &Path) -> PathBuf {
    cache_dir(video_path).join(format!("{}.REFERENCE.srt", stem_of(video_path)))
}

/// Lower-priority auto-generated reference: `{stem}.cache/{stem}.AUTOSUB.srt`.
pub fn autosub_srt_path(video_path: &Path) -> PathBuf {
    cache_dir(video_path).join(format!("{}.AUTOSUB.srt", stem_of(video_path)))
}

/// Internal subtitle track extraction artifact: `{stem}.cache/{stem}.EMBEDDED.srt`.
pub fn embedded_srt_path(video_path: &Path) -> PathBuf {
    cache_dir(video_path).join(format!("{}.EMBEDDED.srt", stem_of(video_path)))
}

/// Downloaded raw SRT: `{stem}.cache/{stem}.TORRENT.srt`.
pub fn torrent_srt_path(video_path: &Path) -> PathBuf {
    cache_dir(video_path).join(format!("{}.TORRENT.srt", stem_of(video_path)))
}

/// Quirk marker path: `{stem}.cache/quirk.{TAG}[.NN]`. `score` is the
/// optional two-digit score suffix for [`QuirkTag::Score`].
pub fn quirk_marker_path(video_path: &Path, tag: QuirkTag, score: Option<u8>) -> PathBuf {
    let name = match score {
        Some(score) => format!("quirk.{}.{:02}", tag.tag_str(), score.min(99)),
        None => format!("quirk.{}", tag.tag_str()),
    };
    cache_dir(video_path).join(name)
}
