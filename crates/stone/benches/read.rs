// SPDX-FileCopyrightText: Copyright © 2020-2024 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use stone::{
    Record, StoneHeader, StoneHeaderV1, StoneHeaderV1FileType, StonePayloadCompression, StonePayloadHeader,
    StonePayloadKind, StonePayloadMeta, StonePayloadMetaKind, StonePayloadMetaTag,
};
use xxhash_rust::xxh3::Xxh3;

/// Assembles an in-memory repository-index style archive with `num_records`
/// meta payload entries. No `.stone` fixture ships in this workspace, so the
/// benchmark builds its own input instead of reading one from disk.
fn assemble_archive(num_records: usize) -> Vec<u8> {
    let mut body = vec![];
    for i in 0..num_records {
        StonePayloadMeta {
            tag: StonePayloadMetaTag::Name,
            kind: StonePayloadMetaKind::String(format!("package-{i}")),
        }
        .encode(&mut body)
        .expect("encode record");
    }

    let mut hasher = Xxh3::new();
    hasher.update(&body);
    let checksum = (hasher.digest() as u64).to_be_bytes();

    let mut archive = vec![];
    StoneHeader::V1(StoneHeaderV1 {
        num_payloads: 1,
        file_type: StoneHeaderV1FileType::Repository,
    })
    .encode(&mut archive)
    .expect("encode header");

    StonePayloadHeader {
        stored_size: body.len() as u64,
        plain_size: body.len() as u64,
        checksum,
        num_records,
        version: 1,
        kind: StonePayloadKind::Meta,
        compression: StonePayloadCompression::None,
    }
    .encode(&mut archive)
    .expect("encode payload header");
    archive.extend_from_slice(&body);

    archive
}

fn read(bytes: &[u8]) {
    let mut reader = stone::read_bytes(bytes).unwrap();
    let payloads = reader.payloads().unwrap().collect::<Result<Vec<_>, _>>().unwrap();
    black_box(payloads);
}

fn criterion_benchmark(c: &mut Criterion) {
    let small = assemble_archive(16);
    let large = assemble_archive(4096);

    c.bench_function("read 16 meta records", |b| b.iter(|| read(black_box(&small))));
    c.bench_function("read 4096 meta records", |b| b.iter(|| read(black_box(&large))));
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
