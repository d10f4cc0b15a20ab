#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Whatever a store hands back, validation reports a result, never panics.
    if let Ok(blocks) = serde_json::from_slice::<Vec<vox_types::Block>>(data) {
        let difficulty = vox_types::Difficulty::new(0).unwrap_or_default();
        let _ = vox_ledger::validate_chain(&blocks, difficulty);
    }
});
