//! # Crypto Hot Path Benchmark
//!
//! Every protocol message passes through `StreamCipher::process` and every
//! result frame through `fold_checksum`. Both run per connection, per cycle.
//!
//! Run with: `cargo bench --package warden_crypto`

#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use warden_crypto::{fold_checksum, KeyStream, StreamCipher};

/// Largest request the engine will ever emit.
const MAX_REQUEST: usize = 450;

fn bench_cipher_process(c: &mut Criterion) {
    let mut group = c.benchmark_group("stream_cipher_process");

    for size in [32, MAX_REQUEST, 4096] {
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            let mut cipher = StreamCipher::new(&[0x5Au8; 16]);
            let mut buffer = vec![0u8; size];
            b.iter(|| {
                cipher.process(black_box(&mut buffer));
            });
        });
    }

    group.finish();
}

fn bench_cipher_key_schedule(c: &mut Criterion) {
    c.bench_function("stream_cipher_prepare", |b| {
        let mut cipher = StreamCipher::new(&[0u8; 16]);
        b.iter(|| cipher.prepare(black_box(&[0xA5u8; 16])));
    });
}

fn bench_fold_checksum(c: &mut Criterion) {
    let payload = vec![0x42u8; MAX_REQUEST];
    c.bench_function("fold_checksum_450", |b| {
        b.iter(|| fold_checksum(black_box(&payload)));
    });
}

fn bench_session_key_derivation(c: &mut Criterion) {
    let secret = [0x17u8; 40];
    c.bench_function("keystream_session_keys", |b| {
        b.iter(|| {
            let mut stream = KeyStream::new(black_box(&secret));
            let input: [u8; 16] = stream.next_array();
            let output: [u8; 16] = stream.next_array();
            let seed: [u8; 16] = stream.next_array();
            black_box((input, output, seed))
        });
    });
}

criterion_group!(
    benches,
    bench_cipher_process,
    bench_cipher_key_schedule,
    bench_fold_checksum,
    bench_session_key_derivation
);
criterion_main!(benches);
