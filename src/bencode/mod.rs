//! Bencode encoding and decoding
//!
//! Bencode is the encoding BitTorrent uses for metainfo files. It supports
//! four data types: byte strings, integers, lists, and dictionaries.
//!
//! Dictionary keys (and every byte string) are kept as raw bytes rather than
//! coerced to UTF-8 at parse time: the `info` dictionary of a real-world
//! torrent can contain filenames that aren't valid UTF-8, and fields like
//! `pieces` are themselves concatenated SHA-1 digests, not text.

mod decoder;
mod encoder;

use std::collections::BTreeMap;

pub use decoder::{decode, BencodeParse};

/// A decoded bencode value.
///
/// There is deliberately no `String` variant: every byte string (including
/// dictionary keys) stays a `Vec<u8>` all the way through decoding. UTF-8
/// interpretation is the Metainfo model's job, not the decoder's.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Int(i64),
    Bytes(Vec<u8>),
    List(Vec<Value>),
    Dict(BTreeMap<Vec<u8>, Value>),
}

impl Value {
    pub fn as_dict(&self) -> Option<&BTreeMap<Vec<u8>, Value>> {
        match self {
            Value::Dict(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(l) => Some(l),
            _ => None,
        }
    }

    /// Convenience lookup for dict values keyed by an ASCII field name.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_dict()?.get(key.as_bytes())
    }

    /// Re-encode this value into canonical bencode. `BTreeMap` iteration is
    /// already sorted by key, which is bencode's canonical dictionary order,
    /// so no extra sort step is needed.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        encoder::encode_into(self, &mut out);
        out
    }
}
