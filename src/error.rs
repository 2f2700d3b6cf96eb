use thiserror::Error;

use crate::bencode::BencodeParse;

#[derive(Error, Debug)]
pub enum Error {
    /// CLI inputs reference non-existent paths, or a download root is not a
    /// directory. Fatal; aborts before any work.
    #[error("config error: {0}")]
    Config(String),

    /// The bencode stream itself is malformed. Per-metainfo; the offending
    /// file is skipped and the run continues.
    #[error("bencode parse error: {0}")]
    BencodeParse(#[from] BencodeParse),

    /// The top-level bencode value isn't a dict, or it has no `info` key.
    #[error("not a torrent file: missing top-level 'info' dictionary")]
    WrongTorrentFile,

    /// `info` is a dict but fails metainfo schema validation.
    #[error("invalid torrent, field '{field}': {reason}")]
    InvalidTorrent { field: String, reason: String },

    /// A candidate file could not be read. Per-candidate; logged, and the
    /// candidate is skipped for the current witness group only.
    #[error("io error reading '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// A candidate's size on disk no longer matches the inventory.
    #[error("truncated read: '{path}' is shorter than the inventoried size")]
    TruncatedRead { path: String },

    #[error("sqlite staging store error: {0}")]
    Store(#[from] rusqlite::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
