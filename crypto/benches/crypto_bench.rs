use criterion::{black_box, criterion_group, criterion_main, Criterion};

use vox_types::{BlockHash, BlockPayload, Timestamp};

fn encrypt_vote_bench(c: &mut Criterion) {
    let key = vox_crypto::VoteKey::from_bytes([7u8; 32]);
    let plaintext = r#"{"poll_id":"p1","option_id":"opt-a","voter_id":"u1"}"#;

    c.bench_function("aes256gcm_encrypt_vote", |b| {
        b.iter(|| vox_crypto::encrypt(black_box(plaintext), &key).unwrap())
    });
}

fn decrypt_vote_bench(c: &mut Criterion) {
    let key = vox_crypto::VoteKey::from_bytes([7u8; 32]);
    let envelope = vox_crypto::encrypt("ballot:optionA", &key).unwrap();

    c.bench_function("aes256gcm_decrypt_vote", |b| {
        b.iter(|| vox_crypto::decrypt(black_box(&envelope), &key).unwrap())
    });
}

fn sha256_bench(c: &mut Criterion) {
    let data = [0xABu8; 256];

    c.bench_function("sha256_256B", |b| {
        b.iter(|| vox_crypto::sha256(black_box(&data)))
    });
}

fn sealing_hasher_bench(c: &mut Criterion) {
    let payload = BlockPayload::genesis();
    let hasher = vox_crypto::SealingHasher::new(
        1,
        Timestamp::from_millis(1_704_067_200_000),
        &payload,
        &BlockHash::new([1u8; 32]),
    );

    c.bench_function("block_hash_per_nonce", |b| {
        let mut nonce = 0u64;
        b.iter(|| {
            nonce += 1;
            hasher.hash_with_nonce(black_box(nonce))
        })
    });
}

criterion_group!(
    benches,
    encrypt_vote_bench,
    decrypt_vote_bench,
    sha256_bench,
    sealing_hasher_bench,
);
criterion_main!(benches);
