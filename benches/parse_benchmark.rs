use criterion::{black_box, criterion_group, criterion_main, Criterion};
use torrent_matcher::metainfo::Metainfo;
use torrent_matcher::witness;

fn create_large_torrent() -> Vec<u8> {
    let mut data = b"d8:announce9:localhost4:infod6:lengthi1073741824e4:name8:big.file12:piece lengthi262144e6:pieces".to_vec();

    // 1GB file with 256KB pieces = 4096 pieces = 81920 bytes of hashes
    let num_pieces = 4096;
    let hash_bytes = num_pieces * 20;
    data.extend_from_slice(hash_bytes.to_string().as_bytes());
    data.push(b':');
    data.extend_from_slice(&vec![0u8; hash_bytes]);
    data.extend_from_slice(b"ee");

    data
}

fn create_large_multi_file_torrent(num_files: usize) -> Vec<u8> {
    let piece_length: u64 = 16384;
    let mut files_section = String::from("l");
    for i in 0..num_files {
        let name = format!("file{i}.bin");
        files_section.push_str(&format!(
            "d6:lengthi{}e4:pathl{}:{}ee",
            piece_length * 3,
            name.len(),
            name
        ));
    }
    files_section.push('e');

    let num_pieces = num_files * 3;
    let hash_bytes = num_pieces * 20;
    let mut data = format!(
        "d4:infod5:files{}4:name7:testdir12:piece lengthi{}e6:pieces{}:",
        files_section, piece_length, hash_bytes
    )
    .into_bytes();
    data.extend_from_slice(&vec![0u8; hash_bytes]);
    data.extend_from_slice(b"ee");
    data
}

fn bench_parse_torrent(c: &mut Criterion) {
    let data = create_large_torrent();

    c.bench_function("decode and validate large single-file torrent", |b| {
        b.iter(|| {
            let metainfo = Metainfo::from_bytes(black_box(&data)).unwrap();
            black_box(metainfo);
        })
    });
}

fn bench_witness_extraction(c: &mut Criterion) {
    let data = create_large_multi_file_torrent(200);
    let metainfo = Metainfo::from_bytes(&data).unwrap();

    c.bench_function("extract witnesses for 200-file torrent", |b| {
        b.iter(|| {
            let tables = witness::extract(black_box(&metainfo));
            black_box(tables);
        })
    });
}

criterion_group!(benches, bench_parse_torrent, bench_witness_extraction);
criterion_main!(benches);
