//! The end-to-end pipeline: resolves inputs, decodes and validates
//! metainfo, extracts witnesses, builds the candidate index, verifies, and
//! aggregates matches.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::candidate::CandidateIndex;
use crate::error::Result;
use crate::inventory;
use crate::match_result::{MatchAggregator, MatchReport};
use crate::metainfo::Metainfo;
use crate::store::StagingStore;
use crate::verify::{MatcherWarning, Verifier};
use crate::witness;

pub struct EngineConfig {
    pub torrent_roots: Vec<PathBuf>,
    pub download_roots: Vec<PathBuf>,
    pub database: PathBuf,
    pub max_span_combinations: u64,
}

pub struct Engine {
    config: EngineConfig,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn run(&self) -> Result<(MatchReport, Vec<MatcherWarning>)> {
        let mut store = if self.config.database.as_os_str() == ":memory:" {
            StagingStore::open_in_memory()?
        } else {
            StagingStore::open(&self.config.database)?
        };

        let torrent_paths = self.resolve_torrent_paths()?;
        info!(count = torrent_paths.len(), "discovered torrent files");

        let mut candidate_entries = Vec::new();
        for root in &self.config.download_roots {
            candidate_entries.extend(inventory::discover_candidates(root)?);
        }
        let candidate_index = CandidateIndex::build(candidate_entries);
        info!(
            files = candidate_index.len(),
            sizes = candidate_index.distinct_sizes(),
            "built candidate index"
        );
        store.record_candidates(&candidate_index)?;

        let mut aggregator = MatchAggregator::new();
        let mut verifier = Verifier::new(&candidate_index)
            .with_max_span_combinations(self.config.max_span_combinations);

        for torrent_path in &torrent_paths {
            match self.process_one(torrent_path, &mut verifier, &mut store) {
                Ok((key, matches)) => aggregator.record_matches(&key, matches),
                Err(e) => warn!(path = %torrent_path.display(), error = %e, "skipping torrent"),
            }
        }

        let warnings = std::mem::take(&mut verifier.warnings);
        Ok((aggregator.into_report(), warnings))
    }

    fn resolve_torrent_paths(&self) -> Result<Vec<PathBuf>> {
        let mut paths = Vec::new();
        for root in &self.config.torrent_roots {
            paths.extend(inventory::discover_torrents(root)?);
        }
        Ok(paths)
    }

    fn process_one(
        &self,
        torrent_path: &Path,
        verifier: &mut Verifier,
        store: &mut StagingStore,
    ) -> Result<(String, Vec<crate::verify::Match>)> {
        let metainfo = Metainfo::from_file(torrent_path)?;
        info!(
            name = %metainfo.info.name,
            info_hash = %hex::encode(metainfo.info_hash),
            "decoded torrent"
        );
        let tables = witness::extract(&metainfo);
        let torrent_ref = store.record_torrent(torrent_path, &metainfo, &tables)?;

        let mut matches = verifier.verify_single_batch(&tables.single_file);
        for span in &tables.span {
            matches.extend(verifier.verify_span(span));
        }

        for computed in verifier.computed_hashes.drain(..) {
            store.record_downloaded_hash(
                &computed.path,
                computed.piece_length,
                computed.offset,
                &computed.hash,
            )?;
        }
        for confirmed in verifier.confirmed_span_members.drain(..) {
            store.record_span_match(
                torrent_ref,
                confirmed.piece_index,
                confirmed.order,
                &confirmed.path,
            )?;
        }

        let key = torrent_path.display().to_string();
        Ok((key, matches))
    }
}
