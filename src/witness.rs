//! Piece witness extraction.
//!
//! A torrent's piece hashes address the concatenation of every listed file,
//! in declared order, sliced into fixed-size windows. Most files in a
//! multi-file torrent therefore have no self-contained hash: a piece can
//! start in the middle of one file and end in the middle of the next. This
//! module walks that concatenation once and produces, for every file, the
//! minimal set of fingerprints ("witnesses") that let the verifier check a
//! standalone candidate file against the torrent without reading anything
//! else:
//!
//! - a [`SingleFileWitness`] for a file that contains at least one piece
//!   entirely within its own bytes, and
//! - a [`SpanWitness`] for a piece that straddles two or more consecutive
//!   files, which can only be verified by reading all of its member files
//!   together.

use crate::metainfo::{Body, FileEntry, Metainfo};

/// A fingerprint for a piece that lies entirely within one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SingleFileWitness {
    pub logical_path: String,
    pub file_length: u64,
    /// Byte count actually verified — equal to the torrent's declared piece
    /// length, except when this witness is for the final (possibly short)
    /// piece.
    pub piece_length: u64,
    pub offset_within_file: u64,
    pub hash: [u8; 20],
}

/// One file's contribution to a [`SpanWitness`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpanMember {
    pub logical_path: String,
    pub file_length: u64,
    pub start_in_file: u64,
    pub end_in_file: u64,
}

impl SpanMember {
    pub fn len(&self) -> u64 {
        self.end_in_file - self.start_in_file
    }
}

/// A fingerprint for a piece that crosses one or more file boundaries. It
/// only verifies collectively: every member must be present and correct for
/// the hash to match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpanWitness {
    pub piece_index: usize,
    pub piece_length: u64,
    pub hash: [u8; 20],
    pub members: Vec<SpanMember>,
}

#[derive(Debug, Clone, Default)]
pub struct WitnessTables {
    pub single_file: Vec<SingleFileWitness>,
    pub span: Vec<SpanWitness>,
}

/// The piece currently being accumulated across file boundaries.
struct OpenSpan {
    anchor: usize,
    members: Vec<SpanMember>,
    accumulated: u64,
}

pub fn extract(metainfo: &Metainfo) -> WitnessTables {
    match &metainfo.info.body {
        Body::SingleFile { length } => extract_single_file(metainfo, *length),
        Body::MultiFile { files } => {
            extract_multi_file(files, &metainfo.info.pieces, metainfo.info.piece_length)
        }
    }
}

fn extract_single_file(metainfo: &Metainfo, length: u64) -> WitnessTables {
    let mut tables = WitnessTables::default();
    if metainfo.info.pieces.is_empty() {
        return tables;
    }
    let piece_len = piece_len_at(
        metainfo.info.piece_length,
        length,
        metainfo.info.pieces.len(),
        0,
    );
    tables.single_file.push(SingleFileWitness {
        logical_path: metainfo.info.name.clone(),
        file_length: length,
        piece_length: piece_len,
        offset_within_file: 0,
        hash: metainfo.info.pieces[0],
    });
    tables
}

/// Byte length actually covered by piece `idx`: the declared piece length,
/// except for the final piece of the stream, which may be short.
fn piece_len_at(piece_length: u64, total_size: u64, num_pieces: usize, idx: usize) -> u64 {
    if idx + 1 == num_pieces {
        total_size - idx as u64 * piece_length
    } else {
        piece_length
    }
}

fn extract_multi_file(
    files: &[FileEntry],
    pieces: &[[u8; 20]],
    piece_length: u64,
) -> WitnessTables {
    let mut tables = WitnessTables::default();
    if pieces.is_empty() || piece_length == 0 {
        return tables;
    }
    let num_pieces = pieces.len();
    let total_size: u64 = files.iter().map(|f| f.length).sum();
    let piece_len = |idx: usize| piece_len_at(piece_length, total_size, num_pieces, idx);

    let mut pos: u64 = 0;
    let mut open_span: Option<OpenSpan> = None;

    for file in files {
        let l = file.length;
        if l == 0 {
            continue;
        }
        let logical_path = file.logical_path();
        let mut seg_offset: u64 = 0;

        // Step 1: if a piece is already open from earlier files, this file's
        // leading bytes must first help close it out.
        if let Some(span) = open_span.as_mut() {
            let needed = piece_len(span.anchor) - span.accumulated;
            let take = l.min(needed);
            span.members.push(SpanMember {
                logical_path: logical_path.clone(),
                file_length: l,
                start_in_file: 0,
                end_in_file: take,
            });
            span.accumulated += take;
            pos += take;
            seg_offset = take;

            if span.accumulated == piece_len(span.anchor) {
                let closed = open_span.take().unwrap();
                tables.span.push(SpanWitness {
                    piece_index: closed.anchor,
                    piece_length: piece_len(closed.anchor),
                    hash: pieces[closed.anchor],
                    members: closed.members,
                });
            } else {
                // The entire file went toward an still-incomplete piece.
                continue;
            }
        }

        // Step 2: process the remainder of this file, which now starts
        // piece-aligned.
        let remainder = l - seg_offset;
        if remainder == 0 {
            continue;
        }
        debug_assert_eq!(pos % piece_length, 0);
        let first_idx = (pos / piece_length) as usize;

        if remainder >= piece_len(first_idx) {
            // This file fully contains piece `first_idx`. At most one
            // SingleFileWitness is emitted per file — sufficient for
            // identification, more would be redundant cost — so any further
            // complete pieces contained later in this same file are simply
            // skipped rather than witnessed again.
            tables.single_file.push(SingleFileWitness {
                logical_path: logical_path.clone(),
                file_length: l,
                piece_length: piece_len(first_idx),
                offset_within_file: seg_offset,
                hash: pieces[first_idx],
            });

            let mut cursor = pos + piece_len(first_idx);
            let mut remaining_after = remainder - piece_len(first_idx);
            while remaining_after > 0 {
                let idx = (cursor / piece_length) as usize;
                let this_piece_len = piece_len(idx);
                if remaining_after >= this_piece_len {
                    // Another fully-contained interior piece: skip, per the
                    // one-witness-per-file cap above.
                    cursor += this_piece_len;
                    remaining_after -= this_piece_len;
                } else {
                    open_span = Some(OpenSpan {
                        anchor: idx,
                        members: vec![SpanMember {
                            logical_path: logical_path.clone(),
                            file_length: l,
                            start_in_file: l - remaining_after,
                            end_in_file: l,
                        }],
                        accumulated: remaining_after,
                    });
                    break;
                }
            }
            pos += remainder;
        } else {
            // Doesn't even complete its own first piece: open (or keep
            // building) a span.
            open_span = Some(OpenSpan {
                anchor: first_idx,
                members: vec![SpanMember {
                    logical_path: logical_path.clone(),
                    file_length: l,
                    start_in_file: seg_offset,
                    end_in_file: l,
                }],
                accumulated: remainder,
            });
            pos += remainder;
        }
    }

    tables
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metainfo::Metainfo;
    use sha1::{Digest, Sha1};

    fn sha1(data: &[u8]) -> [u8; 20] {
        let mut hasher = Sha1::new();
        hasher.update(data);
        hasher.finalize().into()
    }

    fn encode_files(files: &[(&str, u64)]) -> Vec<u8> {
        let mut out = String::from("l");
        for (name, len) in files {
            // d 6:length i<len>e 4:path l <len>:<name> e(list) e(dict)
            out.push_str(&format!("d6:lengthi{len}e4:pathl{}:{name}ee", name.len()));
        }
        out.push('e');
        out.into_bytes()
    }

    fn build_multi_file_torrent(piece_length: u64, files: &[(&str, Vec<u8>)]) -> (Vec<u8>, Vec<u8>) {
        let concatenated: Vec<u8> = files.iter().flat_map(|(_, data)| data.clone()).collect();
        let mut pieces = Vec::new();
        for chunk in concatenated.chunks(piece_length as usize) {
            pieces.extend_from_slice(&sha1(chunk));
        }
        let lengths: Vec<(&str, u64)> = files
            .iter()
            .map(|(name, data)| (*name, data.len() as u64))
            .collect();
        let files_section = encode_files(&lengths);
        let mut torrent = format!(
            "d4:infod5:files{}4:name7:testdir12:piece lengthi{}e6:pieces{}:",
            String::from_utf8(files_section.clone()).unwrap(),
            piece_length,
            pieces.len()
        )
        .into_bytes();
        torrent.extend_from_slice(&pieces);
        torrent.extend_from_slice(b"ee");
        (torrent, concatenated)
    }

    #[test]
    fn single_file_torrent_emits_one_witness() {
        let data = b"hello world, this is a test file!";
        let piece_length = 16u64;
        let mut pieces = Vec::new();
        for chunk in data.chunks(piece_length as usize) {
            pieces.extend_from_slice(&sha1(chunk));
        }
        let mut torrent = format!(
            "d4:infod6:lengthi{}e4:name4:book12:piece lengthi{}e6:pieces{}:",
            data.len(),
            piece_length,
            pieces.len()
        )
        .into_bytes();
        torrent.extend_from_slice(&pieces);
        torrent.extend_from_slice(b"ee");

        let metainfo = Metainfo::from_bytes(&torrent).unwrap();
        let tables = extract(&metainfo);
        assert_eq!(tables.single_file.len(), 1);
        assert!(tables.span.is_empty());
        assert_eq!(tables.single_file[0].offset_within_file, 0);
        assert_eq!(tables.single_file[0].hash, pieces[0..20].try_into().unwrap());
    }

    #[test]
    fn multi_file_all_aligned_yields_single_file_witnesses_only() {
        // S2: three 65536-byte files, 16384-byte pieces -> all 12 pieces aligned.
        let files: Vec<(&str, Vec<u8>)> = vec![
            ("a", vec![1u8; 65536]),
            ("b", vec![2u8; 65536]),
            ("c", vec![3u8; 65536]),
        ];
        let (torrent, _) = build_multi_file_torrent(16384, &files);
        let metainfo = Metainfo::from_bytes(&torrent).unwrap();
        let tables = extract(&metainfo);
        assert_eq!(tables.single_file.len(), 3);
        assert!(tables.span.is_empty());
        for w in &tables.single_file {
            assert_eq!(w.offset_within_file, 0);
            assert_eq!(w.piece_length, 16384);
        }
    }

    #[test]
    fn multi_file_spanning_piece() {
        // S3: A=10 bytes, B=10 bytes, piece length 16 -> piece 0 spans A+B,
        // piece 1 (4 bytes) lies entirely within B's tail.
        let files: Vec<(&str, Vec<u8>)> = vec![("a", vec![1u8; 10]), ("b", vec![2u8; 10])];
        let (torrent, _) = build_multi_file_torrent(16, &files);
        let metainfo = Metainfo::from_bytes(&torrent).unwrap();
        let tables = extract(&metainfo);

        assert_eq!(tables.span.len(), 1);
        let span = &tables.span[0];
        assert_eq!(span.piece_index, 0);
        assert_eq!(span.piece_length, 16);
        assert_eq!(span.members.len(), 2);
        assert_eq!(span.members[0].logical_path, "a");
        assert_eq!(span.members[0].len(), 10);
        assert_eq!(span.members[1].logical_path, "b");
        assert_eq!(span.members[1].len(), 6);

        // The final short piece lies entirely within b's tail -> single-file witness.
        assert_eq!(tables.single_file.len(), 1);
        let w = &tables.single_file[0];
        assert_eq!(w.logical_path, "b");
        assert_eq!(w.offset_within_file, 6);
        assert_eq!(w.piece_length, 4);
    }

    #[test]
    fn small_file_with_no_aligned_piece_is_span_only() {
        // Three files of 4 bytes each, piece length 16: first 16 bytes come
        // entirely from spanning files 1-4 (but there are only 3 files of 4
        // bytes -> 12 bytes total, one short final piece spanning all three).
        let files: Vec<(&str, Vec<u8>)> = vec![
            ("x", vec![9u8; 4]),
            ("y", vec![8u8; 4]),
            ("z", vec![7u8; 4]),
        ];
        let (torrent, _) = build_multi_file_torrent(16, &files);
        let metainfo = Metainfo::from_bytes(&torrent).unwrap();
        let tables = extract(&metainfo);
        assert!(tables.single_file.is_empty());
        assert_eq!(tables.span.len(), 1);
        assert_eq!(tables.span[0].members.len(), 3);
    }

    #[test]
    fn every_piece_index_is_witnessed_exactly_once_when_no_interior_redundancy() {
        let files: Vec<(&str, Vec<u8>)> = vec![("a", vec![1u8; 10]), ("b", vec![2u8; 10])];
        let (torrent, _) = build_multi_file_torrent(16, &files);
        let metainfo = Metainfo::from_bytes(&torrent).unwrap();
        let tables = extract(&metainfo);

        let mut witnessed = vec![false; metainfo.num_pieces()];
        for w in &tables.single_file {
            // Single-file torrents address piece 0 only; for multi-file we
            // can't recover the piece index directly from the witness, so
            // this check is scenario-specific (see span test above for the
            // general completeness argument).
            let _ = w;
        }
        for s in &tables.span {
            assert!(!witnessed[s.piece_index]);
            witnessed[s.piece_index] = true;
        }
        // piece 1 is witnessed by the single-file witness, checked in the
        // dedicated spanning-piece test above.
        assert!(witnessed[0]);
    }
}
