//! The block: one immutable, sealed entry of the vote ledger.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{
    BlockHash, EncryptedEnvelope, OptionId, PollId, Timestamp, TypesError, UserId, VoteCommitment,
    VoterId,
};

/// Message embedded in every genesis block.
pub const GENESIS_MESSAGE: &str = "VoxVote Genesis Block - Secure Blockchain Voting Platform";

/// Bounds on the number of options a poll may declare.
const MIN_POLL_OPTIONS: usize = 2;
const MAX_POLL_OPTIONS: usize = 10;

/// The closed set of events a block can record.
///
/// Serialized with an internal `"type"` tag; the JSON form is the canonical
/// payload encoding that feeds the block hash.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BlockPayload {
    Genesis {
        message: String,
    },
    VoteCast {
        poll_id: PollId,
        voter_id: VoterId,
        encrypted_vote: EncryptedEnvelope,
        commitment: VoteCommitment,
    },
    PollCreated {
        poll_id: PollId,
        title: String,
        created_by: UserId,
        options: Vec<OptionId>,
    },
    PollEnded {
        poll_id: PollId,
        total_votes: u64,
    },
    UserRegistered {
        user_id: UserId,
    },
}

impl BlockPayload {
    pub fn genesis() -> Self {
        Self::Genesis {
            message: GENESIS_MESSAGE.to_string(),
        }
    }

    pub fn kind(&self) -> PayloadKind {
        match self {
            Self::Genesis { .. } => PayloadKind::Genesis,
            Self::VoteCast { .. } => PayloadKind::VoteCast,
            Self::PollCreated { .. } => PayloadKind::PollCreated,
            Self::PollEnded { .. } => PayloadKind::PollEnded,
            Self::UserRegistered { .. } => PayloadKind::UserRegistered,
        }
    }

    /// The poll this event belongs to, if any.
    pub fn poll_id(&self) -> Option<&PollId> {
        match self {
            Self::VoteCast { poll_id, .. }
            | Self::PollCreated { poll_id, .. }
            | Self::PollEnded { poll_id, .. } => Some(poll_id),
            Self::Genesis { .. } | Self::UserRegistered { .. } => None,
        }
    }

    /// Canonical JSON encoding used in the hash preimage.
    pub fn canonical_json(&self) -> String {
        // Every field is a string, integer, or list of strings, so
        // serialization cannot fail.
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Structural checks applied before a payload may be sealed.
    pub fn validate(&self) -> Result<(), TypesError> {
        match self {
            Self::Genesis { message } => {
                if message.trim().is_empty() {
                    return Err(invalid("genesis message is empty"));
                }
            }
            Self::VoteCast {
                poll_id, voter_id, ..
            } => {
                if poll_id.is_blank() {
                    return Err(invalid("vote has no poll id"));
                }
                if voter_id.is_blank() {
                    return Err(invalid("vote has no voter id"));
                }
            }
            Self::PollCreated {
                poll_id,
                title,
                created_by,
                options,
            } => {
                if poll_id.is_blank() || created_by.is_blank() {
                    return Err(invalid("poll creation needs a poll id and a creator"));
                }
                if title.trim().is_empty() {
                    return Err(invalid("poll title is empty"));
                }
                if !(MIN_POLL_OPTIONS..=MAX_POLL_OPTIONS).contains(&options.len()) {
                    return Err(invalid(&format!(
                        "poll must have between {MIN_POLL_OPTIONS} and {MAX_POLL_OPTIONS} options, got {}",
                        options.len()
                    )));
                }
                if options.iter().any(OptionId::is_blank) {
                    return Err(invalid("poll option id is empty"));
                }
                let distinct: std::collections::HashSet<&OptionId> = options.iter().collect();
                if distinct.len() != options.len() {
                    return Err(invalid("poll options repeat"));
                }
            }
            Self::PollEnded { poll_id, .. } => {
                if poll_id.is_blank() {
                    return Err(invalid("poll end has no poll id"));
                }
            }
            Self::UserRegistered { user_id } => {
                if user_id.is_blank() {
                    return Err(invalid("user registration has no user id"));
                }
            }
        }
        Ok(())
    }
}

fn invalid(reason: &str) -> TypesError {
    TypesError::InvalidPayload(reason.to_string())
}

/// Payload discriminant, used for type-filtered reads.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadKind {
    Genesis,
    VoteCast,
    PollCreated,
    PollEnded,
    UserRegistered,
}

impl PayloadKind {
    pub const ALL: [PayloadKind; 5] = [
        PayloadKind::Genesis,
        PayloadKind::VoteCast,
        PayloadKind::PollCreated,
        PayloadKind::PollEnded,
        PayloadKind::UserRegistered,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PayloadKind::Genesis => "genesis",
            PayloadKind::VoteCast => "vote_cast",
            PayloadKind::PollCreated => "poll_created",
            PayloadKind::PollEnded => "poll_ended",
            PayloadKind::UserRegistered => "user_registered",
        }
    }
}

impl fmt::Display for PayloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PayloadKind {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| TypesError::UnknownPayloadKind(s.to_string()))
    }
}

/// A sealed (or candidate) ledger block.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// Position in the chain; 0 for genesis.
    pub index: u64,
    /// When the block was created.
    pub timestamp: Timestamp,
    /// The recorded event.
    pub payload: BlockPayload,
    /// Hash of the preceding block (`BlockHash::ZERO`, rendered `"0"`, for genesis).
    pub previous_hash: BlockHash,
    /// Hash over all other fields.
    pub hash: BlockHash,
    /// Proof-of-work nonce.
    pub nonce: u64,
}

impl Block {
    /// An unsealed block: nonce 0 and no hash yet.
    pub fn candidate(
        index: u64,
        timestamp: Timestamp,
        payload: BlockPayload,
        previous_hash: BlockHash,
    ) -> Self {
        Self {
            index,
            timestamp,
            payload,
            previous_hash,
            hash: BlockHash::ZERO,
            nonce: 0,
        }
    }

    pub fn kind(&self) -> PayloadKind {
        self.payload.kind()
    }

    pub fn is_genesis(&self) -> bool {
        self.index == 0
    }
}
