#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // 32 bytes of hash followed by one byte of difficulty.
    if data.len() < 33 {
        return;
    }
    let mut hash_bytes = [0u8; 32];
    hash_bytes.copy_from_slice(&data[..32]);
    let hash = vox_types::BlockHash::new(hash_bytes);

    let Ok(difficulty) = vox_types::Difficulty::new(u32::from(data[32]) % 80) else {
        return;
    };
    let met = vox_work::meets_difficulty(&hash, difficulty);
    assert_eq!(met, hash.leading_zero_digits() >= difficulty.digits());
});
