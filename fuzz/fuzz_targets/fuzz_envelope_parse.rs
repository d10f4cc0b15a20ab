#![no_main]

use libfuzzer_sys::fuzz_target;

const KEY: [u8; 32] = [0x5a; 32];

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    // Parsing and authenticated decryption must fail cleanly on junk.
    let key = vox_crypto::VoteKey::from_bytes(KEY);
    let _ = vox_crypto::decrypt_str(text, &key);
    let _ = text.parse::<vox_types::BlockHash>();
    let _ = text.parse::<vox_types::PayloadKind>();
});
