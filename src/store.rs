//! Optional SQL staging store, for persisting witnesses, candidates, and
//! matches between runs.
//!
//! Adapted from the original prototype's `sqlite3` schema (`torrentFile` /
//! `torrentFirstHashes` / `downloadedFile` / `downloadedFirstHashes`),
//! generalized here to also hold span witnesses. A `:memory:` path (the
//! default) gives an ephemeral store that lives only for the process; a
//! file path persists and lets a later run resume: every hash the verifier
//! computes is staged into `downloadedPieceHash`, and every confirmed span
//! member into `spanMatch`, via [`StagingStore::record_downloaded_hash`] and
//! [`StagingStore::record_span_match`].

use std::path::{Path, PathBuf};

use rusqlite::{params, Connection, OptionalExtension};

use crate::candidate::CandidateIndex;
use crate::error::Result;
use crate::metainfo::Metainfo;
use crate::witness::WitnessTables;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS torrentFile (
    id INTEGER PRIMARY KEY,
    path TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS singleFileWitness (
    torrentRef INTEGER NOT NULL REFERENCES torrentFile(id),
    logicalPath TEXT NOT NULL,
    pieceSize INTEGER NOT NULL,
    fileSize INTEGER NOT NULL,
    offset INTEGER NOT NULL,
    hash BLOB NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_singleFileWitness_size ON singleFileWitness (fileSize);

CREATE TABLE IF NOT EXISTS spanWitness (
    id INTEGER PRIMARY KEY,
    torrentRef INTEGER NOT NULL REFERENCES torrentFile(id),
    pieceIndex INTEGER NOT NULL,
    pieceSize INTEGER NOT NULL,
    hash BLOB NOT NULL
);
CREATE TABLE IF NOT EXISTS spanWitnessMember (
    spanRef INTEGER NOT NULL REFERENCES spanWitness(id),
    "order" INTEGER NOT NULL,
    fileSize INTEGER NOT NULL,
    logicalPath TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_spanWitnessMember_size ON spanWitnessMember (fileSize);

CREATE TABLE IF NOT EXISTS candidateFile (
    id INTEGER PRIMARY KEY,
    path TEXT NOT NULL UNIQUE,
    size INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_candidateFile_size ON candidateFile (size);

CREATE TABLE IF NOT EXISTS downloadedPieceHash (
    candidateRef INTEGER NOT NULL REFERENCES candidateFile(id),
    path TEXT NOT NULL,
    pieceSize INTEGER NOT NULL,
    offset INTEGER NOT NULL,
    hash BLOB NOT NULL
);
CREATE TABLE IF NOT EXISTS spanMatch (
    spanMemberRef INTEGER NOT NULL REFERENCES spanWitnessMember(rowid),
    candidateRef INTEGER NOT NULL REFERENCES candidateFile(id)
);
"#;

pub struct StagingStore {
    conn: Connection,
}

impl StagingStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path.as_ref())?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    /// Records a torrent and its witness tables. Returns the torrent's row
    /// id.
    pub fn record_torrent(
        &mut self,
        path: &Path,
        metainfo: &Metainfo,
        witnesses: &WitnessTables,
    ) -> Result<i64> {
        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT OR REPLACE INTO torrentFile (path, name) VALUES (?1, ?2)",
            params![path.to_string_lossy(), metainfo.info.name],
        )?;
        let torrent_ref = tx.last_insert_rowid();

        for w in &witnesses.single_file {
            tx.execute(
                "INSERT INTO singleFileWitness (torrentRef, logicalPath, pieceSize, fileSize, offset, hash)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    torrent_ref,
                    w.logical_path,
                    w.piece_length as i64,
                    w.file_length as i64,
                    w.offset_within_file as i64,
                    w.hash.as_slice(),
                ],
            )?;
        }

        for s in &witnesses.span {
            tx.execute(
                "INSERT INTO spanWitness (torrentRef, pieceIndex, pieceSize, hash) VALUES (?1, ?2, ?3, ?4)",
                params![torrent_ref, s.piece_index as i64, s.piece_length as i64, s.hash.as_slice()],
            )?;
            let span_ref = tx.last_insert_rowid();
            for (order, member) in s.members.iter().enumerate() {
                tx.execute(
                    "INSERT INTO spanWitnessMember (spanRef, \"order\", fileSize, logicalPath)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![span_ref, order as i64, member.len() as i64, member.logical_path],
                )?;
            }
        }

        tx.commit()?;
        Ok(torrent_ref)
    }

    pub fn record_candidates(&mut self, candidates: &CandidateIndex) -> Result<()> {
        let tx = self.conn.transaction()?;
        for (path, size) in candidates_iter(candidates) {
            tx.execute(
                "INSERT OR REPLACE INTO candidateFile (path, size) VALUES (?1, ?2)",
                params![path.to_string_lossy(), size as i64],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    pub fn single_file_witness_count(&self) -> Result<i64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM singleFileWitness", [], |row| row.get(0))?;
        Ok(count)
    }

    pub fn span_witness_count(&self) -> Result<i64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM spanWitness", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Stages a hash computed for a candidate file during verification, so a
    /// later resumed run against the same file path, offset, and piece size
    /// can skip re-hashing. A no-op if the path was never recorded as a
    /// candidate (e.g. it was removed from the downloads root between the
    /// candidate scan and verification).
    pub fn record_downloaded_hash(
        &mut self,
        path: &Path,
        piece_length: u64,
        offset: u64,
        hash: &[u8; 20],
    ) -> Result<()> {
        let candidate_ref = self.candidate_ref(path)?;
        let Some(candidate_ref) = candidate_ref else {
            return Ok(());
        };
        self.conn.execute(
            "INSERT INTO downloadedPieceHash (candidateRef, path, pieceSize, offset, hash)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                candidate_ref,
                path.to_string_lossy(),
                piece_length as i64,
                offset as i64,
                hash.as_slice(),
            ],
        )?;
        Ok(())
    }

    pub fn downloaded_piece_hash_count(&self) -> Result<i64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM downloadedPieceHash",
            [],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Records that `path` was confirmed as the `order`-th member of the
    /// span witness at `piece_index` within `torrent_ref`. A no-op if either
    /// the span member or the candidate row can't be found (stale data from
    /// a concurrent rescan).
    pub fn record_span_match(
        &mut self,
        torrent_ref: i64,
        piece_index: usize,
        order: usize,
        path: &Path,
    ) -> Result<()> {
        let span_member_ref: Option<i64> = self
            .conn
            .query_row(
                "SELECT sm.rowid FROM spanWitnessMember sm
                 JOIN spanWitness sw ON sm.spanRef = sw.id
                 WHERE sw.torrentRef = ?1 AND sw.pieceIndex = ?2 AND sm.\"order\" = ?3",
                params![torrent_ref, piece_index as i64, order as i64],
                |row| row.get(0),
            )
            .optional()?;
        let candidate_ref = self.candidate_ref(path)?;

        if let (Some(span_member_ref), Some(candidate_ref)) = (span_member_ref, candidate_ref) {
            self.conn.execute(
                "INSERT INTO spanMatch (spanMemberRef, candidateRef) VALUES (?1, ?2)",
                params![span_member_ref, candidate_ref],
            )?;
        }
        Ok(())
    }

    pub fn span_match_count(&self) -> Result<i64> {
        let count: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM spanMatch", [], |row| row.get(0))?;
        Ok(count)
    }

    fn candidate_ref(&self, path: &Path) -> Result<Option<i64>> {
        let candidate_ref = self
            .conn
            .query_row(
                "SELECT id FROM candidateFile WHERE path = ?1",
                params![path.to_string_lossy()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(candidate_ref)
    }
}

fn candidates_iter(index: &CandidateIndex) -> Vec<(PathBuf, u64)> {
    let mut out = Vec::new();
    for size in index.sizes() {
        for path in index.candidates_for_size(size) {
            out.push((path.clone(), size));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metainfo::Metainfo;
    use crate::witness;

    fn minimal_torrent() -> Vec<u8> {
        b"d8:announce9:localhost4:infod6:lengthi1000e4:name8:test.txt12:piece lengthi512e6:pieces20:12345678901234567890ee".to_vec()
    }

    #[test]
    fn schema_creation_is_idempotent() {
        let mut store = StagingStore::open_in_memory().unwrap();
        // Re-running the same schema batch must not error.
        store.conn.execute_batch(SCHEMA).unwrap();
    }

    #[test]
    fn records_and_counts_witnesses() {
        let metainfo = Metainfo::from_bytes(&minimal_torrent()).unwrap();
        let tables = witness::extract(&metainfo);

        let mut store = StagingStore::open_in_memory().unwrap();
        store
            .record_torrent(Path::new("/tmp/test.torrent"), &metainfo, &tables)
            .unwrap();

        assert_eq!(store.single_file_witness_count().unwrap(), 1);
        assert_eq!(store.span_witness_count().unwrap(), 0);
    }

    #[test]
    fn in_memory_store_round_trips_a_witness() {
        let metainfo = Metainfo::from_bytes(&minimal_torrent()).unwrap();
        let tables = witness::extract(&metainfo);
        let mut store = StagingStore::open_in_memory().unwrap();
        let torrent_ref = store
            .record_torrent(Path::new("/tmp/test.torrent"), &metainfo, &tables)
            .unwrap();
        assert!(torrent_ref > 0);
    }

    #[test]
    fn records_a_downloaded_piece_hash_against_a_known_candidate() {
        let mut store = StagingStore::open_in_memory().unwrap();
        let mut candidates = CandidateIndex::new();
        candidates.insert(PathBuf::from("/downloads/a.bin"), 1000);
        store.record_candidates(&candidates).unwrap();

        store
            .record_downloaded_hash(Path::new("/downloads/a.bin"), 512, 0, &[7u8; 20])
            .unwrap();

        assert_eq!(store.downloaded_piece_hash_count().unwrap(), 1);
    }

    #[test]
    fn skips_downloaded_hash_for_an_unknown_candidate() {
        let mut store = StagingStore::open_in_memory().unwrap();
        store
            .record_downloaded_hash(Path::new("/downloads/never-scanned.bin"), 512, 0, &[7u8; 20])
            .unwrap();
        assert_eq!(store.downloaded_piece_hash_count().unwrap(), 0);
    }

    #[test]
    fn records_a_span_match_against_its_witness_member_and_candidate() {
        let metainfo = Metainfo::from_bytes(&minimal_torrent()).unwrap();
        let tables = witness::extract(&metainfo);
        let mut store = StagingStore::open_in_memory().unwrap();
        let torrent_ref = store
            .record_torrent(Path::new("/tmp/test.torrent"), &metainfo, &tables)
            .unwrap();

        // Build a span witness/member directly since the minimal torrent
        // above is single-file and has none by construction.
        store
            .conn
            .execute(
                "INSERT INTO spanWitness (torrentRef, pieceIndex, pieceSize, hash) VALUES (?1, 0, 16, ?2)",
                params![torrent_ref, [0u8; 20].as_slice()],
            )
            .unwrap();
        let span_ref = store.conn.last_insert_rowid();
        store
            .conn
            .execute(
                "INSERT INTO spanWitnessMember (spanRef, \"order\", fileSize, logicalPath) VALUES (?1, 0, 10, 'a')",
                params![span_ref],
            )
            .unwrap();

        let mut candidates = CandidateIndex::new();
        candidates.insert(PathBuf::from("/downloads/a.bin"), 10);
        store.record_candidates(&candidates).unwrap();

        store
            .record_span_match(torrent_ref, 0, 0, Path::new("/downloads/a.bin"))
            .unwrap();
        assert_eq!(store.span_match_count().unwrap(), 1);
    }

    #[test]
    fn skips_span_match_when_no_such_span_member_exists() {
        let metainfo = Metainfo::from_bytes(&minimal_torrent()).unwrap();
        let tables = witness::extract(&metainfo);
        let mut store = StagingStore::open_in_memory().unwrap();
        let torrent_ref = store
            .record_torrent(Path::new("/tmp/test.torrent"), &metainfo, &tables)
            .unwrap();

        let mut candidates = CandidateIndex::new();
        candidates.insert(PathBuf::from("/downloads/a.bin"), 10);
        store.record_candidates(&candidates).unwrap();

        store
            .record_span_match(torrent_ref, 0, 0, Path::new("/downloads/a.bin"))
            .unwrap();
        assert_eq!(store.span_match_count().unwrap(), 0);
    }
}
