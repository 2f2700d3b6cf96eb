pub mod bencode;
pub mod candidate;
pub mod engine;
pub mod error;
pub mod inventory;
pub mod match_result;
pub mod metainfo;
pub mod report;
pub mod store;
pub mod verify;
pub mod witness;

pub use engine::{Engine, EngineConfig};
pub use error::{Error, Result};
pub use match_result::MatchReport;
pub use metainfo::Metainfo;
