#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Stored rows are JSON blocks and bincode vote records; neither decoder
    // may panic on a damaged row.
    if let Ok(block) = serde_json::from_slice::<vox_types::Block>(data) {
        let _ = block.payload.validate();
        let _ = block.payload.canonical_json();
        let _ = vox_crypto::block_hash(&block);
        let _ = vox_store::VoteRecord::for_block(&block);
    }
    let _ = bincode::deserialize::<vox_store::VoteRecord>(data);
    let _ = serde_json::from_slice::<vox_types::BlockPayload>(data);
});
