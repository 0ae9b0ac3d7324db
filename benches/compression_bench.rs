use criterion::{black_box, criterion_group, criterion_main, Criterion};
use h4mk::compressor::{CompressionEngine, RleEngine};
use h4mk::ratchet::{LivingState, RatchetParams};

fn bench_rle(c: &mut Criterion) {
    let engine = RleEngine;
    let repetitive = vec![0x42u8; 1024 * 1024];
    let mixed: Vec<u8> = (0..1024 * 1024).map(|i| (i % 251) as u8).collect();

    c.bench_function("rle_compress_1mb_repetitive", |b| {
        b.iter(|| engine.compress(black_box(&repetitive)).unwrap())
    });
    c.bench_function("rle_compress_1mb_mixed", |b| b.iter(|| engine.compress(black_box(&mixed)).unwrap()));

    let compressed = engine.compress(&repetitive).unwrap();
    c.bench_function("rle_decompress_1mb_repetitive", |b| {
        b.iter(|| engine.decompress(black_box(&compressed)).unwrap())
    });
}

fn bench_ratchet(c: &mut Criterion) {
    let secret = [0x5Cu8; 32];
    let payload = vec![0xABu8; 4096];

    c.bench_function("ratchet_encrypt_4kb", |b| {
        b.iter_batched(
            || LivingState::init_from_shared_secret(&secret, b"bench", RatchetParams::default()),
            |mut sender| sender.encrypt(black_box(&payload), b"").unwrap(),
            criterion::BatchSize::SmallInput,
        )
    });

    c.bench_function("ratchet_encrypt_decrypt_roundtrip_4kb", |b| {
        b.iter_batched(
            || {
                let sender = LivingState::init_from_shared_secret(&secret, b"bench", RatchetParams::default());
                let receiver = LivingState::init_peer_from_shared_secret(&secret, b"bench", RatchetParams::default());
                (sender, receiver)
            },
            |(mut sender, mut receiver)| {
                let (header, ct) = sender.encrypt(black_box(&payload), b"").unwrap();
                receiver.decrypt(&header, &ct, b"").unwrap()
            },
            criterion::BatchSize::SmallInput,
        )
    });
}

criterion_group!(benches, bench_rle, bench_ratchet);
criterion_main!(benches);
