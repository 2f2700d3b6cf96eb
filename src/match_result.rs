//! Match aggregation: collapses raw [`crate::verify::Match`] records into a
//! per-torrent, per-file report of which physical paths were confirmed.

use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::verify::Match;

/// All confirmed matches for one metainfo file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TorrentMatches {
    /// logical path (as declared inside the torrent) -> physical paths on
    /// disk confirmed to hold that file's content. Insertion order is
    /// preserved for reproducible reporting; duplicates are collapsed.
    pub files: BTreeMap<String, Vec<PathBuf>>,
}

impl TorrentMatches {
    fn record(&mut self, logical_path: String, physical_path: PathBuf) {
        let paths = self.files.entry(logical_path).or_default();
        if !paths.contains(&physical_path) {
            paths.push(physical_path);
        }
    }

    pub fn is_fully_matched(&self, declared_files: &[String]) -> bool {
        declared_files.iter().all(|f| {
            self.files
                .get(f)
                .map(|paths| !paths.is_empty())
                .unwrap_or(false)
        })
    }
}

/// Accumulates matches across every witness of every torrent processed in a
/// run.
#[derive(Debug, Default)]
pub struct MatchAggregator {
    by_torrent: BTreeMap<String, TorrentMatches>,
}

impl MatchAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_matches(&mut self, torrent_key: &str, matches: impl IntoIterator<Item = Match>) {
        let entry = self.by_torrent.entry(torrent_key.to_string()).or_default();
        for m in matches {
            entry.record(m.logical_path, m.physical_path);
        }
    }

    pub fn into_report(self) -> MatchReport {
        MatchReport {
            torrents: self.by_torrent,
        }
    }
}

/// The final, per-run output: every torrent that was processed, mapped to
/// the files within it that were matched on disk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchReport {
    pub torrents: BTreeMap<String, TorrentMatches>,
}
