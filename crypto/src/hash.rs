//! SHA-256 hashing for blocks and vote commitments.
//!
//! Block preimage: `index ␟ iso_timestamp ␟ payload_json ␟ previous_hash ␟ nonce ␟`,
//! where `␟` is the ASCII unit separator (0x1F). serde_json escapes control
//! characters, so the separator never occurs inside a block field.
//!
//! Commitment fields are raw ids that may hold any byte, so each one is
//! framed by its big-endian `u64` length instead.

use sha2::{Digest, Sha256};
use vox_types::{
    Block, BlockHash, BlockPayload, OptionId, PollId, Timestamp, VoteCommitment, VoterId,
};

const FIELD_SEPARATOR: &[u8] = &[0x1f];
const COMMITMENT_DOMAIN: &[u8] = b"vox-vote-commitment";

/// Compute a SHA-256 digest of arbitrary data.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut output = [0u8; 32];
    output.copy_from_slice(&Sha256::digest(data));
    output
}

/// Lowercase hex SHA-256 digest.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(sha256(data))
}

/// Hash fields in order, each prefixed by its length.
fn sha256_fields(fields: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    for field in fields {
        hasher.update((field.len() as u64).to_be_bytes());
        hasher.update(field);
    }
    let mut output = [0u8; 32];
    output.copy_from_slice(&hasher.finalize());
    output
}

/// Hash the five block fields.
pub fn hash_block_fields(
    index: u64,
    timestamp: Timestamp,
    payload: &BlockPayload,
    previous_hash: &BlockHash,
    nonce: u64,
) -> BlockHash {
    SealingHasher::new(index, timestamp, payload, previous_hash).hash_with_nonce(nonce)
}

/// Recompute a block's hash from its stored fields (ignores `block.hash`).
pub fn block_hash(block: &Block) -> BlockHash {
    hash_block_fields(
        block.index,
        block.timestamp,
        &block.payload,
        &block.previous_hash,
        block.nonce,
    )
}

/// Block hasher with every field except the nonce already absorbed.
///
/// The nonce is the last preimage field, so the proof-of-work loop clones
/// this state instead of re-serializing the payload for every attempt.
#[derive(Clone)]
pub struct SealingHasher {
    prefix: Sha256,
}

impl SealingHasher {
    pub fn new(
        index: u64,
        timestamp: Timestamp,
        payload: &BlockPayload,
        previous_hash: &BlockHash,
    ) -> Self {
        let mut prefix = Sha256::new();
        for field in [
            index.to_string(),
            timestamp.to_iso8601(),
            payload.canonical_json(),
            previous_hash.to_string(),
        ] {
            prefix.update(field.as_bytes());
            prefix.update(FIELD_SEPARATOR);
        }
        Self { prefix }
    }

    pub fn for_block(block: &Block) -> Self {
        Self::new(
            block.index,
            block.timestamp,
            &block.payload,
            &block.previous_hash,
        )
    }

    pub fn hash_with_nonce(&self, nonce: u64) -> BlockHash {
        let mut hasher = self.prefix.clone();
        hasher.update(nonce.to_string().as_bytes());
        hasher.update(FIELD_SEPARATOR);
        let mut output = [0u8; 32];
        output.copy_from_slice(&hasher.finalize());
        BlockHash::new(output)
    }
}

/// Deterministic commitment to a ballot choice.
///
/// No time-varying input, so the same triple always yields the same
/// commitment and it can be recomputed for verification.
pub fn vote_commitment(poll_id: &PollId, voter_id: &VoterId, option_id: &OptionId) -> VoteCommitment {
    VoteCommitment::new(sha256_fields(&[
        COMMITMENT_DOMAIN,
        poll_id.as_str().as_bytes(),
        voter_id.as_str().as_bytes(),
        option_id.as_str().as_bytes(),
    ]))
}
