//! Torrent metainfo file (.torrent) parsing and validation.
//!
//! A .torrent file is a bencoded dictionary describing a piece-addressed
//! dataset: a tracker URL, file layout (name, length, and piece hashes), and
//! optional metadata (creation date, comments). This module turns the raw
//! [`crate::bencode::Value`] tree into a validated [`Metainfo`] that the rest
//! of the matcher can rely on without re-checking its invariants.

use std::fs;
use std::path::Path;

use sha1::{Digest, Sha1};

use crate::bencode::{self, Value};
use crate::error::{Error, Result};

const SHA1_HASH_SIZE_BYTES: usize = 20;

/// A parsed and validated .torrent file.
#[derive(Debug, Clone)]
pub struct Metainfo {
    /// SHA-1 of the canonically re-encoded `info` dictionary. Used only for
    /// staging-store identity and diagnostics, never for witness extraction.
    pub info_hash: [u8; 20],
    pub info: Info,
    pub announce: Option<String>,
    pub announce_list: Vec<Vec<String>>,
    pub creation_date: Option<i64>,
    pub comment: Option<String>,
    pub created_by: Option<String>,
}

/// The `info` dictionary: the only part of the metainfo the matcher pipeline
/// actually depends on.
#[derive(Debug, Clone)]
pub struct Info {
    pub name: String,
    pub piece_length: u64,
    pub pieces: Vec<[u8; 20]>,
    pub body: Body,
}

/// File layout: either a single file, or an ordered list of files whose
/// concatenation (in list order) is what the piece hashes address.
#[derive(Debug, Clone)]
pub enum Body {
    SingleFile { length: u64 },
    MultiFile { files: Vec<FileEntry> },
}

/// One entry in a multi-file torrent's file list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    /// Path components, e.g. `["subdir", "file.txt"]`. Kept as components
    /// rather than a joined string so comparisons are platform-independent;
    /// only reporting joins them (with `/`, BitTorrent's own convention).
    pub path: Vec<String>,
    pub length: u64,
}

impl FileEntry {
    pub fn logical_path(&self) -> String {
        self.path.join("/")
    }
}

impl Metainfo {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let bytes = fs::read(path).map_err(|source| Error::Io {
            path: path.as_ref().display().to_string(),
            source,
        })?;
        Self::from_bytes(&bytes)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let value = bencode::decode(bytes)?;
        Self::from_value(value)
    }

    fn from_value(value: Value) -> Result<Self> {
        let top = value.as_dict().ok_or(Error::WrongTorrentFile)?;
        let info_value = top.get(b"info".as_slice()).ok_or(Error::WrongTorrentFile)?;
        if info_value.as_dict().is_none() {
            return Err(Error::WrongTorrentFile);
        }

        let info_hash = {
            let info_bytes = info_value.encode();
            let mut hasher = Sha1::new();
            hasher.update(&info_bytes);
            hasher.finalize().into()
        };

        let info = Info::from_value(info_value)?;

        let announce = top
            .get(b"announce".as_slice())
            .and_then(Value::as_bytes)
            .map(lossy_string);
        let announce_list = top
            .get(b"announce-list".as_slice())
            .and_then(Value::as_list)
            .map(|tiers| {
                tiers
                    .iter()
                    .map(|tier| {
                        tier.as_list()
                            .into_iter()
                            .flatten()
                            .filter_map(Value::as_bytes)
                            .map(lossy_string)
                            .collect()
                    })
                    .collect()
            })
            .unwrap_or_default();
        let creation_date = top.get(b"creation date".as_slice()).and_then(Value::as_int);
        let comment = top
            .get(b"comment".as_slice())
            .and_then(Value::as_bytes)
            .map(lossy_string);
        let created_by = top
            .get(b"created by".as_slice())
            .and_then(Value::as_bytes)
            .map(lossy_string);

        Ok(Metainfo {
            info_hash,
            info,
            announce,
            announce_list,
            creation_date,
            comment,
            created_by,
        })
    }

    pub fn total_size(&self) -> u64 {
        match &self.info.body {
            Body::SingleFile { length } => *length,
            Body::MultiFile { files } => files.iter().map(|f| f.length).sum(),
        }
    }

    pub fn num_pieces(&self) -> usize {
        self.info.pieces.len()
    }

    pub fn all_trackers(&self) -> Vec<String> {
        let mut trackers: Vec<String> = self.announce.iter().cloned().collect();
        for tier in &self.announce_list {
            trackers.extend(tier.iter().cloned());
        }
        trackers.sort();
        trackers.dedup();
        trackers
    }
}

impl Info {
    fn from_value(value: &Value) -> Result<Self> {
        let dict = value.as_dict().expect("caller already checked this is a dict");

        let name = dict
            .get(b"name".as_slice())
            .and_then(Value::as_bytes)
            .map(lossy_string)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| invalid("name", "must be a non-empty string"))?;

        let piece_length = dict
            .get(b"piece length".as_slice())
            .and_then(Value::as_int)
            .filter(|&n| n > 0)
            .ok_or_else(|| invalid("piece length", "must be a positive integer"))?
            as u64;

        let pieces_bytes = dict
            .get(b"pieces".as_slice())
            .and_then(Value::as_bytes)
            .ok_or_else(|| invalid("pieces", "must be a byte string"))?;
        if pieces_bytes.len() % SHA1_HASH_SIZE_BYTES != 0 {
            return Err(invalid(
                "pieces",
                "byte length must be a multiple of 20 (SHA-1 digest size)",
            ));
        }
        let pieces: Vec<[u8; 20]> = pieces_bytes
            .chunks_exact(SHA1_HASH_SIZE_BYTES)
            .map(|chunk| {
                let mut hash = [0u8; SHA1_HASH_SIZE_BYTES];
                hash.copy_from_slice(chunk);
                hash
            })
            .collect();

        let length = dict.get(b"length".as_slice());
        let files = dict.get(b"files".as_slice());
        let body = match (length, files) {
            (Some(_), Some(_)) => {
                return Err(invalid(
                    "length/files",
                    "exactly one of 'length' or 'files' may be present, not both",
                ));
            }
            (Some(length_value), None) => {
                let length = length_value
                    .as_int()
                    .filter(|&n| n > 0)
                    .ok_or_else(|| invalid("length", "must be a positive integer"))?
                    as u64;
                Body::SingleFile { length }
            }
            (None, Some(files_value)) => {
                let entries = files_value
                    .as_list()
                    .ok_or_else(|| invalid("files", "must be a list"))?;
                let mut files = Vec::with_capacity(entries.len());
                for entry in entries {
                    files.push(FileEntry::from_value(entry)?);
                }
                Body::MultiFile { files }
            }
            (None, None) => {
                return Err(invalid(
                    "length/files",
                    "exactly one of 'length' or 'files' must be present",
                ));
            }
        };

        Ok(Info {
            name,
            piece_length,
            pieces,
            body,
        })
    }
}

impl FileEntry {
    fn from_value(value: &Value) -> Result<Self> {
        let dict = value
            .as_dict()
            .ok_or_else(|| invalid("files[]", "each file entry must be a dict"))?;

        let length = dict
            .get(b"length".as_slice())
            .and_then(Value::as_int)
            .filter(|&n| n > 0)
            .ok_or_else(|| invalid("files[].length", "must be a positive integer"))?
            as u64;

        let path_list = dict
            .get(b"path".as_slice())
            .and_then(Value::as_list)
            .filter(|l| !l.is_empty())
            .ok_or_else(|| invalid("files[].path", "must be a non-empty list"))?;

        let mut path = Vec::with_capacity(path_list.len());
        for component in path_list {
            let component = component
                .as_bytes()
                .map(lossy_string)
                .filter(|s| !s.is_empty())
                .ok_or_else(|| invalid("files[].path[]", "each component must be a non-empty string"))?;
            path.push(component);
        }

        Ok(FileEntry { path, length })
    }
}

fn invalid(field: &str, reason: &str) -> Error {
    Error::InvalidTorrent {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}

fn lossy_string(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_single_file_torrent() -> Vec<u8> {
        let torrent = "d8:announce9:localhost4:infod6:lengthi1000e4:name8:test.txt12:piece lengthi512e6:pieces20:12345678901234567890ee";
        torrent.as_bytes().to_vec()
    }

    #[test]
    fn parses_single_file_torrent() {
        let data = minimal_single_file_torrent();
        let metainfo = Metainfo::from_bytes(&data).unwrap();

        assert_eq!(metainfo.announce.as_deref(), Some("localhost"));
        assert_eq!(metainfo.info.name, "test.txt");
        assert_eq!(metainfo.total_size(), 1000);
        assert_eq!(metainfo.num_pieces(), 1);
    }

    #[test]
    fn info_hash_is_deterministic() {
        let data = minimal_single_file_torrent();
        let a = Metainfo::from_bytes(&data).unwrap();
        let b = Metainfo::from_bytes(&data).unwrap();
        assert_eq!(a.info_hash, b.info_hash);
    }

    #[test]
    fn rejects_piece_array_not_multiple_of_20() {
        let torrent_data = b"d8:announce9:localhost4:infod6:lengthi1000e4:name4:test12:piece lengthi512e6:pieces19:1234567890123456789ee";
        let result = Metainfo::from_bytes(torrent_data);
        assert!(matches!(result, Err(Error::InvalidTorrent { .. })));
    }

    #[test]
    fn rejects_missing_info() {
        let torrent_data = b"d8:announce9:localhostee";
        let result = Metainfo::from_bytes(torrent_data);
        assert!(matches!(result, Err(Error::WrongTorrentFile)));
    }

    #[test]
    fn rejects_both_length_and_files() {
        let torrent_data = b"d4:infod6:lengthi10e5:filesld6:lengthi1e4:pathl1:aeee4:name4:test12:piece lengthi512e6:pieces20:12345678901234567890ee";
        let result = Metainfo::from_bytes(torrent_data);
        assert!(matches!(result, Err(Error::InvalidTorrent { .. })));
    }

    #[test]
    fn multi_file_torrent_orders_entries() {
        let torrent_data = b"d4:infod5:filesld6:lengthi1000e4:pathl5:file1eed6:lengthi2000e4:pathl5:file2eee4:name7:testdir12:piece lengthi512e6:pieces60:123456789012345678901234567890123456789012345678901234567890ee";

        let metainfo = Metainfo::from_bytes(torrent_data).unwrap();
        assert_eq!(metainfo.total_size(), 3000);
        let Body::MultiFile { files } = &metainfo.info.body else {
            panic!("expected multi-file torrent");
        };
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].length, 1000);
        assert_eq!(files[1].length, 2000);
        assert_eq!(files[0].logical_path(), "file1");
    }

    #[test]
    fn all_trackers_deduplicates() {
        let torrent = "d8:announce9:tracker-113:announce-listll9:tracker-1el9:tracker-2el9:tracker-1ee4:infod6:lengthi1000e4:name4:test12:piece lengthi512e6:pieces20:12345678901234567890ee";
        let metainfo = Metainfo::from_bytes(torrent.as_bytes()).unwrap();
        let trackers = metainfo.all_trackers();
        assert_eq!(trackers.len(), 2);
    }
}
