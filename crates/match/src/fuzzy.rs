//! crates/match/src/fuzzy.rs
//!
//! Basis search among sibling files for `--fuzzy`.
//!
//! When a destination file does not exist the receiver may still hold a
//! similar one. A sibling with the same size and modification time is taken
//! outright; otherwise siblings are ranked by name similarity and size.

use std::ffi::OsStr;
use std::fs;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};

use logging::debug_log;

/// Score a candidate must reach to be used.
const MIN_FUZZY_SCORE: u32 = 10;

const EXTENSION_MATCH_BONUS: u32 = 50;
const PREFIX_MATCH_POINTS: u32 = 10;
const SUFFIX_MATCH_POINTS: u32 = 8;
/// Sizes within a factor of two of each other.
const SIZE_SIMILARITY_BONUS: u32 = 30;

/// A basis candidate picked by [`FuzzyMatcher::find_basis`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FuzzyMatch {
    /// Path of the candidate.
    pub path: PathBuf,
    /// Similarity score; `u32::MAX` for a size and mtime match.
    pub score: u32,
}

impl FuzzyMatch {
    /// Whether the candidate matched on size and mtime.
    #[must_use]
    pub const fn is_exact(&self) -> bool {
        self.score == u32::MAX
    }
}

/// Searches directories for a file resembling the one being transferred.
#[derive(Clone, Debug)]
pub struct FuzzyMatcher {
    min_score: u32,
    extra_dirs: Vec<PathBuf>,
}

impl Default for FuzzyMatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl FuzzyMatcher {
    /// Matcher searching only the destination directory.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            min_score: MIN_FUZZY_SCORE,
            extra_dirs: Vec::new(),
        }
    }

    /// Also search `dirs` after the destination directory (`-yy`).
    #[must_use]
    pub fn with_extra_dirs(mut self, dirs: Vec<PathBuf>) -> Self {
        self.extra_dirs = dirs;
        self
    }

    /// Overrides the minimum score.
    #[must_use]
    pub const fn with_min_score(mut self, score: u32) -> Self {
        self.min_score = score;
        self
    }

    /// Best basis for `name` among regular files in `dir` and the extra
    /// directories. A size and mtime match ends the search.
    #[must_use]
    pub fn find_basis(
        &self,
        name: &OsStr,
        dir: &Path,
        size: u64,
        mtime: i64,
    ) -> Option<FuzzyMatch> {
        let name = name.to_string_lossy();
        let mut best: Option<FuzzyMatch> = None;
        for search in std::iter::once(dir).chain(self.extra_dirs.iter().map(PathBuf::as_path)) {
            let Some(found) = self.search_directory(search, &name, size, mtime) else {
                continue;
            };
            if found.is_exact() {
                debug_log!(Fuzzy, 1, "fuzzy basis {} matches size and time", found.path.display());
                return Some(found);
            }
            if best.as_ref().is_none_or(|b| found.score > b.score) {
                best = Some(found);
            }
        }
        if let Some(found) = &best {
            debug_log!(Fuzzy, 1, "fuzzy basis {} (score {})", found.path.display(), found.score);
        }
        best
    }

    fn search_directory(
        &self,
        dir: &Path,
        name: &str,
        size: u64,
        mtime: i64,
    ) -> Option<FuzzyMatch> {
        let entries = fs::read_dir(dir).ok()?;
        let mut best: Option<FuzzyMatch> = None;

        for entry in entries.flatten() {
            let Ok(meta) = entry.metadata() else { continue };
            if !meta.is_file() {
                continue;
            }
            let file_name = entry.file_name();
            let candidate = file_name.to_string_lossy();
            if candidate == name {
                continue;
            }
            if meta.len() == size && meta.mtime() == mtime {
                return Some(FuzzyMatch {
                    path: entry.path(),
                    score: u32::MAX,
                });
            }
            let score = compute_similarity_score(name, &candidate, size, meta.len());
            debug_log!(Fuzzy, 2, "fuzzy candidate {candidate} scores {score}");
            if score >= self.min_score && best.as_ref().is_none_or(|b| score > b.score) {
                best = Some(FuzzyMatch {
                    path: entry.path(),
                    score,
                });
            }
        }
        best
    }
}

/// Similarity of two file names, with a bonus for comparable sizes.
///
/// Shared leading characters weigh most, then shared trailing characters
/// of the stem, then an identical extension.
#[must_use]
pub fn compute_similarity_score(
    target: &str,
    candidate: &str,
    target_size: u64,
    candidate_size: u64,
) -> u32 {
    let (target_stem, target_ext) = split_name_extension(target);
    let (candidate_stem, candidate_ext) = split_name_extension(candidate);

    let mut score = 0u32;
    if !target_ext.is_empty() && target_ext == candidate_ext {
        score += EXTENSION_MATCH_BONUS;
    }
    score += common_prefix_length(target_stem, candidate_stem) as u32 * PREFIX_MATCH_POINTS;
    score += common_suffix_length(target_stem, candidate_stem) as u32 * SUFFIX_MATCH_POINTS;

    if target_size > 0 && candidate_size > 0 {
        let (small, large) = if target_size < candidate_size {
            (target_size, candidate_size)
        } else {
            (candidate_size, target_size)
        };
        if small.saturating_mul(2) >= large {
            score += SIZE_SIMILARITY_BONUS;
        }
    }
    score
}

fn split_name_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(pos) if pos > 0 && pos < name.len() - 1 => (&name[..pos], &name[pos + 1..]),
        _ => (name, ""),
    }
}

fn common_prefix_length(a: &str, b: &str) -> usize {
    a.chars().zip(b.chars()).take_while(|(x, y)| x == y).count()
}

fn common_suffix_length(a: &str, b: &str) -> usize {
    a.chars()
        .rev()
        .zip(b.chars().rev())
        .take_while(|(x, y)| x == y)
        .count()
}
