//! Append coordinator: the only path by which blocks enter the ledger.
//!
//! Every append runs on a blocking worker under a timeout. Vote submissions
//! additionally hold a per-`(poll, voter)` async lock for the whole
//! check-encrypt-append sequence, so two submissions for the same pair can
//! never both pass the cast check. The durable vote record written in the
//! same store transaction as the block backs that up across restarts.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use vox_crypto::{decrypt, encrypt, vote_commitment, VoteKey};
use vox_ledger::{Ledger, LedgerError};
use vox_store::VoteRecord;
use vox_types::{
    Block, BlockHash, BlockPayload, OptionId, PayloadKind, PollId, Timestamp, UserId,
    VoteCommitment, VoterId,
};
use vox_work::CancelFlag;

use crate::ledger_event::{EventBus, LedgerEvent};
use crate::metrics::LedgerMetrics;
use crate::NodeError;

type VoterKey = (PollId, VoterId);

/// A ballot that the calling layer has already authenticated and checked
/// for eligibility.
#[derive(Clone, Debug)]
pub struct VoteSubmission {
    pub poll_id: PollId,
    pub voter_id: VoterId,
    pub option_id: OptionId,
    /// Ballot content to encrypt, e.g. `"ballot:optionA"`.
    pub plaintext: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct VoteReceipt {
    pub block_hash: BlockHash,
    pub block_index: u64,
    pub commitment: VoteCommitment,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct VoteVerification {
    pub block_hash: BlockHash,
    pub block_index: u64,
    pub block_timestamp: Timestamp,
    pub commitment: VoteCommitment,
    pub chain_valid: bool,
}

pub struct AppendCoordinator {
    ledger: Arc<Ledger>,
    key: VoteKey,
    timeout: Duration,
    voter_locks: Mutex<HashMap<VoterKey, Arc<tokio::sync::Mutex<()>>>>,
    cast: RwLock<HashSet<VoterKey>>,
    metrics: Arc<LedgerMetrics>,
    events: Arc<EventBus>,
}

impl AppendCoordinator {
    /// Build a coordinator over an initialized ledger, seeding the cast index
    /// from the `VoteCast` blocks already on chain.
    pub fn new(
        ledger: Arc<Ledger>,
        key: VoteKey,
        timeout: Duration,
        metrics: Arc<LedgerMetrics>,
        events: Arc<EventBus>,
    ) -> Result<Self, NodeError> {
        let cast = cast_pairs(&ledger)?;
        tracing::debug!(votes = cast.len(), "rebuilt cast index");
        metrics.block_count.set(ledger.len() as i64);

        Ok(Self {
            ledger,
            key,
            timeout,
            voter_locks: Mutex::new(HashMap::new()),
            cast: RwLock::new(cast),
            metrics,
            events,
        })
    }

    pub fn ledger(&self) -> &Arc<Ledger> {
        &self.ledger
    }

    /// Re-derive the cast index from the published chain, after the chain
    /// was reloaded from the store. Returns the number of cast pairs.
    pub fn rebuild_cast_index(&self) -> Result<usize, NodeError> {
        // Built under the write lock so a vote published meanwhile is
        // either in the snapshot or inserted after the swap.
        let mut cast = self.cast.write();
        *cast = cast_pairs(&self.ledger)?;
        self.metrics.block_count.set(self.ledger.len() as i64);
        tracing::info!(votes = cast.len(), "rebuilt cast index");
        Ok(cast.len())
    }

    /// Encrypt and commit one ballot.
    ///
    /// Fails with [`NodeError::DuplicateVote`] if this voter already voted in
    /// this poll, and with [`NodeError::Timeout`] if the append could not
    /// finish in time; neither changes the ledger.
    pub async fn submit_vote(&self, submission: VoteSubmission) -> Result<VoteReceipt, NodeError> {
        let VoteSubmission {
            poll_id,
            voter_id,
            option_id,
            plaintext,
        } = submission;
        if poll_id.is_blank() || voter_id.is_blank() || option_id.is_blank() {
            return Err(NodeError::Validation(
                "vote needs a poll id, a voter id and an option id".into(),
            ));
        }

        let commitment = vote_commitment(&poll_id, &voter_id, &option_id);
        let pair: VoterKey = (poll_id, voter_id);
        let lock = self.voter_lock(&pair);
        let result = {
            let _guard = lock.lock().await;
            self.submit_locked(&pair, commitment, &plaintext).await
        };
        drop(lock);
        self.prune_voter_lock(&pair);
        result
    }

    async fn submit_locked(
        &self,
        pair: &VoterKey,
        commitment: VoteCommitment,
        plaintext: &str,
    ) -> Result<VoteReceipt, NodeError> {
        let (poll_id, voter_id) = pair;
        if self.cast.read().contains(pair) {
            return Err(self.reject_duplicate(pair));
        }

        let payload = BlockPayload::VoteCast {
            poll_id: poll_id.clone(),
            voter_id: voter_id.clone(),
            encrypted_vote: encrypt(plaintext, &self.key)?,
            commitment,
        };

        let block = match self
            .run_append(move |ledger, cancel| {
                ledger.append_vote(payload, cancel).map(|(block, _)| block)
            })
            .await
        {
            Ok(block) => block,
            Err(NodeError::DuplicateVote { .. }) => {
                // The store knew about a cast this index missed.
                self.cast.write().insert(pair.clone());
                return Err(self.reject_duplicate(pair));
            }
            Err(e) => return Err(e),
        };

        self.cast.write().insert(pair.clone());
        self.metrics.votes_cast.inc();
        self.events.emit(&LedgerEvent::VoteRecorded {
            poll_id: poll_id.clone(),
            block_hash: block.hash,
        });
        tracing::info!(%poll_id, index = block.index, hash = %block.hash, "vote recorded");

        Ok(VoteReceipt {
            block_hash: block.hash,
            block_index: block.index,
            commitment,
        })
    }

    pub async fn record_poll_created(
        &self,
        poll_id: PollId,
        title: String,
        created_by: UserId,
        options: Vec<OptionId>,
    ) -> Result<Block, NodeError> {
        let payload = BlockPayload::PollCreated {
            poll_id,
            title,
            created_by,
            options,
        };
        self.append_event(payload).await
    }

    /// Close a poll, recording how many ballots it received.
    pub async fn record_poll_ended(&self, poll_id: PollId) -> Result<Block, NodeError> {
        if poll_id.is_blank() {
            return Err(NodeError::Validation("poll end has no poll id".into()));
        }
        self.run_append(move |ledger, cancel| {
            let total_votes = ledger.votes_for_poll(&poll_id)?.len() as u64;
            ledger.append(
                BlockPayload::PollEnded {
                    poll_id,
                    total_votes,
                },
                cancel,
            )
        })
        .await
    }

    pub async fn record_user_registered(&self, user_id: UserId) -> Result<Block, NodeError> {
        self.append_event(BlockPayload::UserRegistered { user_id }).await
    }

    /// Whether (and where) a voter has voted in a poll.
    pub fn vote_status(
        &self,
        poll_id: &PollId,
        voter_id: &VoterId,
    ) -> Result<Option<VoteRecord>, NodeError> {
        Ok(self.ledger.vote_record(poll_id, voter_id)?)
    }

    /// Locate a voter's ballot on chain and report whether the chain holding
    /// it still validates.
    pub async fn verify_vote(
        &self,
        poll_id: &PollId,
        voter_id: &VoterId,
    ) -> Result<Option<VoteVerification>, NodeError> {
        let Some(record) = self.vote_status(poll_id, voter_id)? else {
            return Ok(None);
        };
        let block = self
            .ledger
            .get_by_hash(&record.block_hash)?
            .ok_or_else(|| NodeError::NotFound(format!("block {}", record.block_hash)))?;

        let ledger = Arc::clone(&self.ledger);
        let chain_valid = tokio::task::spawn_blocking(move || ledger.validate())
            .await
            .map_err(|e| NodeError::Worker(e.to_string()))??
            .is_valid();

        Ok(Some(VoteVerification {
            block_hash: block.hash,
            block_index: block.index,
            block_timestamp: block.timestamp,
            commitment: record.commitment,
            chain_valid,
        }))
    }

    /// Whether the recorded ballot commits to `option_id`.
    ///
    /// Recomputes the commitment; the encrypted ballot is not opened.
    pub fn confirms_choice(
        &self,
        poll_id: &PollId,
        voter_id: &VoterId,
        option_id: &OptionId,
    ) -> Result<bool, NodeError> {
        Ok(self
            .vote_status(poll_id, voter_id)?
            .is_some_and(|record| {
                record.commitment == vote_commitment(poll_id, voter_id, option_id)
            }))
    }

    /// Open the ballot in a `VoteCast` block with the service key.
    pub fn decrypt_vote(&self, block: &Block) -> Result<String, NodeError> {
        match &block.payload {
            BlockPayload::VoteCast { encrypted_vote, .. } => {
                Ok(decrypt(encrypted_vote, &self.key)?)
            }
            other => Err(NodeError::Validation(format!(
                "block {} is a {} block, not a vote",
                block.index,
                other.kind()
            ))),
        }
    }

    async fn append_event(&self, payload: BlockPayload) -> Result<Block, NodeError> {
        payload
            .validate()
            .map_err(|e| NodeError::Validation(e.to_string()))?;
        self.run_append(move |ledger, cancel| ledger.append(payload, cancel))
            .await
    }

    /// Run one append on a blocking worker, bounded by the timeout.
    ///
    /// On timeout the cancel flag is raised and the worker is awaited. If it
    /// had already committed, its block is returned; the ledger changed and
    /// reporting a timeout would be a lie.
    async fn run_append<F>(&self, op: F) -> Result<Block, NodeError>
    where
        F: FnOnce(&Ledger, &CancelFlag) -> Result<Block, LedgerError> + Send + 'static,
    {
        let ledger = Arc::clone(&self.ledger);
        let cancel = CancelFlag::new();
        let worker_cancel = cancel.clone();
        let started = Instant::now();

        let mut handle = tokio::task::spawn_blocking(move || op(&ledger, &worker_cancel));
        let joined = match tokio::time::timeout(self.timeout, &mut handle).await {
            Ok(joined) => joined,
            Err(_) => {
                cancel.cancel();
                match handle.await {
                    Ok(Err(LedgerError::Cancelled)) => {
                        self.metrics.append_timeouts.inc();
                        tracing::warn!(timeout = ?self.timeout, "append timed out, seal cancelled");
                        return Err(NodeError::Timeout(self.timeout));
                    }
                    other => {
                        tracing::debug!("append finished after the timeout fired");
                        other
                    }
                }
            }
        };
        self.metrics
            .append_time_ms
            .observe(started.elapsed().as_secs_f64() * 1000.0);

        let result = joined.map_err(|e| NodeError::Worker(e.to_string()))?;
        match result {
            Ok(block) => {
                self.metrics.blocks_appended.inc();
                self.metrics.block_count.set(self.ledger.len() as i64);
                self.events.emit(&LedgerEvent::BlockAppended {
                    index: block.index,
                    hash: block.hash,
                    kind: block.kind(),
                });
                Ok(block)
            }
            Err(LedgerError::DuplicateVote { poll_id, voter_id }) => {
                Err(NodeError::DuplicateVote { poll_id, voter_id })
            }
            Err(e) => {
                self.metrics.append_failures.inc();
                tracing::error!(error = %e, "append failed");
                Err(e.into())
            }
        }
    }

    fn reject_duplicate(&self, pair: &VoterKey) -> NodeError {
        let (poll_id, voter_id) = pair;
        self.metrics.duplicate_votes.inc();
        self.events.emit(&LedgerEvent::DuplicateRejected {
            poll_id: poll_id.clone(),
            voter_id: voter_id.clone(),
        });
        tracing::warn!(%poll_id, %voter_id, "rejected duplicate vote");
        NodeError::DuplicateVote {
            poll_id: poll_id.clone(),
            voter_id: voter_id.clone(),
        }
    }

    fn voter_lock(&self, pair: &VoterKey) -> Arc<tokio::sync::Mutex<()>> {
        Arc::clone(self.voter_locks.lock().entry(pair.clone()).or_default())
    }

    /// Drop the lock entry once no submission holds or awaits it.
    fn prune_voter_lock(&self, pair: &VoterKey) {
        let mut locks = self.voter_locks.lock();
        if locks
            .get(pair)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(pair);
        }
    }

    #[cfg(test)]
    fn tracked_locks(&self) -> usize {
        self.voter_locks.lock().len()
    }
}

/// Every `(poll, voter)` pair with a `VoteCast` block on the chain.
fn cast_pairs(ledger: &Ledger) -> Result<HashSet<VoterKey>, NodeError> {
    Ok(ledger
        .get_by_type(PayloadKind::VoteCast)?
        .into_iter()
        .filter_map(|block| match block.payload {
            BlockPayload::VoteCast {
                poll_id, voter_id, ..
            } => Some((poll_id, voter_id)),
            _ => None,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use vox_nullables::NullStore;
    use vox_store::BlockStore;
    use vox_types::Difficulty;

    fn coordinator_with(store: Arc<NullStore>, timeout: Duration) -> AppendCoordinator {
        let ledger = Arc::new(Ledger::new(store, Difficulty::new(1).unwrap()));
        ledger.initialize().unwrap();
        AppendCoordinator::new(
            ledger,
            VoteKey::from_bytes([0x11; 32]),
            timeout,
            Arc::new(LedgerMetrics::new().unwrap()),
            Arc::new(EventBus::new()),
        )
        .unwrap()
    }

    fn coordinator() -> AppendCoordinator {
        coordinator_with(Arc::new(NullStore::new()), Duration::from_secs(10))
    }

    fn ballot(poll: &str, voter: &str, option: &str) -> VoteSubmission {
        VoteSubmission {
            poll_id: poll.into(),
            voter_id: voter.into(),
            option_id: option.into(),
            plaintext: format!("ballot:{option}"),
        }
    }

    #[tokio::test]
    async fn vote_round_trips_through_the_chain() {
        let coordinator = coordinator();
        let receipt = coordinator
            .submit_vote(ballot("poll", "alice", "optionA"))
            .await
            .unwrap();
        assert_eq!(receipt.block_index, 1);
        assert_eq!(
            receipt.commitment,
            vote_commitment(&"poll".into(), &"alice".into(), &"optionA".into())
        );

        let block = coordinator
            .ledger()
            .get_by_hash(&receipt.block_hash)
            .unwrap()
            .unwrap();
        assert_eq!(coordinator.decrypt_vote(&block).unwrap(), "ballot:optionA");
        assert_eq!(coordinator.tracked_locks(), 0);
    }

    #[tokio::test]
    async fn second_vote_is_rejected() {
        let coordinator = coordinator();
        coordinator
            .submit_vote(ballot("poll", "alice", "optionA"))
            .await
            .unwrap();
        let err = coordinator
            .submit_vote(ballot("poll", "alice", "optionB"))
            .await
            .unwrap_err();
        assert!(matches!(err, NodeError::DuplicateVote { .. }));
        assert_eq!(coordinator.ledger().len(), 2);
        assert_eq!(coordinator.metrics.duplicate_votes.get(), 1);
    }

    #[tokio::test]
    async fn blank_ids_are_rejected_before_sealing() {
        let coordinator = coordinator();
        let err = coordinator
            .submit_vote(ballot("poll", " ", "optionA"))
            .await
            .unwrap_err();
        assert!(matches!(err, NodeError::Validation(_)));
        assert_eq!(coordinator.ledger().len(), 1);
    }

    #[tokio::test]
    async fn cast_index_is_rebuilt_from_chain() {
        let store = Arc::new(NullStore::new());
        let first = coordinator_with(store.clone(), Duration::from_secs(10));
        first
            .submit_vote(ballot("poll", "alice", "optionA"))
            .await
            .unwrap();

        let second = coordinator_with(store, Duration::from_secs(10));
        let err = second
            .submit_vote(ballot("poll", "alice", "optionA"))
            .await
            .unwrap_err();
        assert!(matches!(err, NodeError::DuplicateVote { .. }));
    }

    #[tokio::test]
    async fn persistence_failure_is_surfaced_and_retryable() {
        let store = Arc::new(NullStore::new());
        let coordinator = coordinator_with(store.clone(), Duration::from_secs(10));
        store.fail_next_write();
        let err = coordinator
            .submit_vote(ballot("poll", "alice", "optionA"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            NodeError::Ledger(LedgerError::Persistence(_))
        ));
        assert_eq!(coordinator.ledger().len(), 1);

        coordinator
            .submit_vote(ballot("poll", "alice", "optionA"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn append_committed_before_the_timeout_returns_its_receipt() {
        let store = Arc::new(NullStore::new());
        let coordinator = coordinator_with(store.clone(), Duration::from_millis(200));
        // Sealing at difficulty 1 is instant; the write outlasts the timeout.
        store.set_write_delay(Some(Duration::from_secs(1)));

        let receipt = coordinator
            .submit_vote(ballot("poll", "alice", "optionA"))
            .await
            .unwrap();
        assert_eq!(receipt.block_index, 1);
        assert_eq!(store.block_count().unwrap(), 2);
        assert_eq!(coordinator.metrics.append_timeouts.get(), 0);
        assert_eq!(coordinator.metrics.votes_cast.get(), 1);
        assert!(coordinator
            .cast
            .read()
            .contains(&("poll".into(), "alice".into())));
    }

    #[tokio::test]
    async fn ids_with_nul_bytes_are_distinct_voters() {
        let coordinator = coordinator();
        coordinator
            .submit_vote(ballot("a\0b", "c", "optionA"))
            .await
            .unwrap();
        coordinator
            .submit_vote(ballot("a", "b\0c", "optionA"))
            .await
            .unwrap();

        let record = coordinator
            .vote_status(&"a".into(), &"b\0c".into())
            .unwrap()
            .unwrap();
        assert_eq!(record.poll_id, PollId::from("a"));
        assert_eq!(record.voter_id, VoterId::from("b\0c"));
        assert_eq!(record.block_index, 2);
    }

    #[tokio::test]
    async fn rebuild_forgets_votes_dropped_from_the_store() {
        let store = Arc::new(NullStore::new());
        let coordinator = coordinator_with(store.clone(), Duration::from_secs(10));
        coordinator
            .submit_vote(ballot("poll", "alice", "optionA"))
            .await
            .unwrap();

        store.truncate(1);
        coordinator.ledger().reset_health().unwrap();
        assert_eq!(coordinator.rebuild_cast_index().unwrap(), 0);

        let receipt = coordinator
            .submit_vote(ballot("poll", "alice", "optionB"))
            .await
            .unwrap();
        assert_eq!(receipt.block_index, 1);
    }

    #[tokio::test]
    async fn decrypt_vote_refuses_other_kinds() {
        let coordinator = coordinator();
        let genesis = coordinator.ledger().genesis().unwrap();
        assert!(matches!(
            coordinator.decrypt_vote(&genesis),
            Err(NodeError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn confirms_choice_checks_commitment() {
        let coordinator = coordinator();
        coordinator
            .submit_vote(ballot("poll", "alice", "optionA"))
            .await
            .unwrap();
        let (poll, alice) = (PollId::from("poll"), VoterId::from("alice"));
        assert!(coordinator
            .confirms_choice(&poll, &alice, &"optionA".into())
            .unwrap());
        assert!(!coordinator
            .confirms_choice(&poll, &alice, &"optionB".into())
            .unwrap());
        assert!(!coordinator
            .confirms_choice(&poll, &"bob".into(), &"optionA".into())
            .unwrap());
    }
}
