//! Integration tests exercising the full vote pipeline:
//! submission → encryption → sealing → LMDB persistence → readback.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use vox_crypto::{vote_commitment, VoteKey};
use vox_ledger::{Ledger, LedgerHealth, ValidationResult};
use vox_node::{LedgerEvent, NodeConfig, NodeError, VoteLedgerService, VoteSubmission};
use vox_nullables::NullStore;
use vox_store::BlockStore;
use vox_types::{BlockHash, Difficulty, PayloadKind};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn test_config(dir: &tempfile::TempDir) -> NodeConfig {
    NodeConfig {
        data_dir: dir.path().join("ledger"),
        difficulty: Difficulty::new(1).unwrap(),
        vote_key: Some(VoteKey::from_bytes([0x24; 32]).to_hex()),
        map_size_mb: 16,
        ..NodeConfig::default()
    }
}

fn temp_service() -> (tempfile::TempDir, VoteLedgerService) {
    let dir = tempfile::tempdir().expect("temp dir");
    let service = VoteLedgerService::open(test_config(&dir)).expect("open service");
    (dir, service)
}

fn ballot(poll: &str, voter: &str, option: &str) -> VoteSubmission {
    VoteSubmission {
        poll_id: poll.into(),
        voter_id: voter.into(),
        option_id: option.into(),
        plaintext: format!("ballot:{option}"),
    }
}

// ---------------------------------------------------------------------------
// Double-cast prevention
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_duplicate_submissions_commit_exactly_once() {
    let (_dir, service) = temp_service();
    let service = Arc::new(service);

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let service = Arc::clone(&service);
            let option = if i % 2 == 0 { "optionA" } else { "optionB" };
            tokio::spawn(async move { service.submit_vote(ballot("poll-1", "alice", option)).await })
        })
        .collect();

    let mut successes = 0;
    let mut duplicates = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => successes += 1,
            Err(NodeError::DuplicateVote { .. }) => duplicates += 1,
            Err(e) => panic!("unexpected error: {e}"),
        }
    }

    assert_eq!(successes, 1);
    assert_eq!(duplicates, 7);
    assert_eq!(service.get_blocks_by_type(PayloadKind::VoteCast).unwrap().len(), 1);
    assert_eq!(service.ledger().len(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_votes_from_different_voters_all_land() {
    let (_dir, service) = temp_service();
    let service = Arc::new(service);

    let handles: Vec<_> = (0..10)
        .map(|i| {
            let service = Arc::clone(&service);
            tokio::spawn(async move {
                service
                    .submit_vote(ballot("poll-1", &format!("voter-{i}"), "optionA"))
                    .await
            })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(service.ledger().len(), 11);
    assert_eq!(service.validate_ledger().unwrap(), ValidationResult::Valid);
}

#[tokio::test]
async fn vote_stays_cast_across_restart() {
    let dir = tempfile::tempdir().unwrap();
    {
        let service = VoteLedgerService::open(test_config(&dir)).unwrap();
        service
            .submit_vote(ballot("poll-1", "alice", "optionA"))
            .await
            .unwrap();
        service.shutdown().unwrap();
    }

    let service = VoteLedgerService::open(test_config(&dir)).unwrap();
    let err = service
        .submit_vote(ballot("poll-1", "alice", "optionB"))
        .await
        .unwrap_err();
    assert!(matches!(err, NodeError::DuplicateVote { .. }));

    // Same key from config, so the old ballot still opens.
    let vote_block = &service.get_blocks_by_type(PayloadKind::VoteCast).unwrap()[0];
    assert_eq!(
        service.coordinator().decrypt_vote(vote_block).unwrap(),
        "ballot:optionA"
    );
}

// ---------------------------------------------------------------------------
// Timeouts
// ---------------------------------------------------------------------------

#[tokio::test]
async fn timed_out_append_leaves_ledger_unchanged() {
    let store = Arc::new(NullStore::new());
    // Genesis at difficulty 0, then reopen with a target no nonce can meet.
    Ledger::new(store.clone(), Difficulty::new(0).unwrap())
        .initialize()
        .unwrap();

    let config = NodeConfig {
        difficulty: Difficulty::new(Difficulty::MAX).unwrap(),
        append_timeout_ms: 50,
        vote_key: Some(VoteKey::from_bytes([1; 32]).to_hex()),
        ..NodeConfig::default()
    };
    let service = VoteLedgerService::with_store(config, store.clone()).unwrap();

    let err = service
        .submit_vote(ballot("poll-1", "alice", "optionA"))
        .await
        .unwrap_err();
    assert!(matches!(err, NodeError::Timeout(_)));
    assert_eq!(service.ledger().len(), 1);
    assert_eq!(store.block_count().unwrap(), 1);
    assert_eq!(service.metrics().append_timeouts.get(), 1);

    // The pair was never marked as cast.
    assert!(service
        .coordinator()
        .vote_status(&"poll-1".into(), &"alice".into())
        .unwrap()
        .is_none());
}

// ---------------------------------------------------------------------------
// Lifecycle events, lookups and verification
// ---------------------------------------------------------------------------

#[tokio::test]
async fn poll_lifecycle_is_recorded() {
    let (_dir, service) = temp_service();
    let coordinator = service.coordinator();

    coordinator.record_user_registered("admin".into()).await.unwrap();
    coordinator
        .record_poll_created(
            "poll-1".into(),
            "Lunch".into(),
            "admin".into(),
            vec!["optionA".into(), "optionB".into()],
        )
        .await
        .unwrap();
    for voter in ["v1", "v2", "v3"] {
        service
            .submit_vote(ballot("poll-1", voter, "optionA"))
            .await
            .unwrap();
    }
    let ended = coordinator.record_poll_ended("poll-1".into()).await.unwrap();

    match ended.payload {
        vox_types::BlockPayload::PollEnded { total_votes, .. } => assert_eq!(total_votes, 3),
        other => panic!("unexpected payload {other:?}"),
    }
    let stats = service.stats().unwrap();
    assert_eq!(stats.block_count, 7);
    assert!(stats.is_valid);
    assert_eq!(stats.latest_block, ended);
}

#[tokio::test]
async fn poll_with_one_option_is_rejected() {
    let (_dir, service) = temp_service();
    let err = service
        .coordinator()
        .record_poll_created(
            "poll-1".into(),
            "Lunch".into(),
            "admin".into(),
            vec!["optionA".into()],
        )
        .await
        .unwrap_err();
    assert!(matches!(err, NodeError::Validation(_)));
    assert_eq!(service.ledger().len(), 1);
}

#[tokio::test]
async fn verify_vote_points_at_its_block() {
    let (_dir, service) = temp_service();
    let receipt = service
        .submit_vote(ballot("poll-1", "alice", "optionA"))
        .await
        .unwrap();

    let verification = service
        .coordinator()
        .verify_vote(&"poll-1".into(), &"alice".into())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(verification.block_hash, receipt.block_hash);
    assert_eq!(verification.block_index, receipt.block_index);
    assert_eq!(
        verification.commitment,
        vote_commitment(&"poll-1".into(), &"alice".into(), &"optionA".into())
    );
    assert!(verification.chain_valid);

    assert!(service
        .coordinator()
        .verify_vote(&"poll-1".into(), &"bob".into())
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn get_block_reports_unknown_hash() {
    let (_dir, service) = temp_service();
    let genesis = service.ledger().genesis().unwrap();
    assert_eq!(service.get_block(&genesis.hash).unwrap(), genesis);
    assert!(matches!(
        service.get_block(&BlockHash::new([0xab; 32])),
        Err(NodeError::NotFound(_))
    ));
}

#[tokio::test]
async fn events_and_metrics_follow_appends() {
    let (_dir, service) = temp_service();
    let appended = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&appended);
    service.events().subscribe(move |event| {
        if matches!(event, LedgerEvent::BlockAppended { .. }) {
            seen.fetch_add(1, Ordering::SeqCst);
        }
    });

    service
        .submit_vote(ballot("poll-1", "alice", "optionA"))
        .await
        .unwrap();
    let _ = service
        .submit_vote(ballot("poll-1", "alice", "optionA"))
        .await;

    assert_eq!(appended.load(Ordering::SeqCst), 1);
    assert_eq!(service.metrics().votes_cast.get(), 1);
    assert_eq!(service.metrics().duplicate_votes.get(), 1);
    assert_eq!(service.metrics().block_count.get(), 2);
}

// ---------------------------------------------------------------------------
// Startup failure and fail-closed health
// ---------------------------------------------------------------------------

#[tokio::test]
async fn unreachable_store_is_fatal_at_startup() {
    let store = Arc::new(NullStore::new());
    store.set_unreachable(true);
    let config = NodeConfig {
        vote_key: Some(VoteKey::from_bytes([3; 32]).to_hex()),
        ..NodeConfig::default()
    };
    let result = VoteLedgerService::with_store(config, store);
    assert!(matches!(result, Err(NodeError::Ledger(_))));
}

#[tokio::test]
async fn missing_vote_key_is_refused_before_genesis() {
    let store = Arc::new(NullStore::new());
    let result = VoteLedgerService::with_store(NodeConfig::default(), store.clone());
    assert!(matches!(result, Err(NodeError::Config(_))));
    assert_eq!(store.write_count(), 0);

    let config = NodeConfig {
        difficulty: Difficulty::new(1).unwrap(),
        ephemeral_key: true,
        ..NodeConfig::default()
    };
    let service = VoteLedgerService::with_store(config, store).unwrap();
    assert_eq!(service.ledger().len(), 1);
}

#[tokio::test]
async fn corrupt_chain_refuses_votes() {
    let store = Arc::new(NullStore::new());
    let config = NodeConfig {
        difficulty: Difficulty::new(1).unwrap(),
        vote_key: Some(VoteKey::from_bytes([5; 32]).to_hex()),
        ..NodeConfig::default()
    };
    {
        let service = VoteLedgerService::with_store(config.clone(), store.clone()).unwrap();
        service
            .submit_vote(ballot("poll-1", "alice", "optionA"))
            .await
            .unwrap();
    }
    store.tamper_block(1, BlockHash::new([0; 32]));

    let service = VoteLedgerService::with_store(config, store).unwrap();
    assert!(matches!(service.health(), LedgerHealth::Degraded { index: 1, .. }));
    let err = service
        .submit_vote(ballot("poll-1", "bob", "optionA"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        NodeError::Ledger(vox_ledger::LedgerError::ChainCorruption { index: 1, .. })
    ));
}

#[tokio::test]
async fn repaired_store_lets_rolled_back_voters_vote_again() {
    let store = Arc::new(NullStore::new());
    let config = NodeConfig {
        difficulty: Difficulty::new(1).unwrap(),
        vote_key: Some(VoteKey::from_bytes([6; 32]).to_hex()),
        ..NodeConfig::default()
    };
    {
        let service = VoteLedgerService::with_store(config.clone(), store.clone()).unwrap();
        service
            .submit_vote(ballot("poll-1", "alice", "optionA"))
            .await
            .unwrap();
    }
    store.tamper_block(1, BlockHash::new([0; 32]));

    let service = VoteLedgerService::with_store(config, store.clone()).unwrap();
    assert!(matches!(service.health(), LedgerHealth::Degraded { .. }));

    // Roll the store back to its last good block.
    store.truncate(1);
    assert!(service.reset_health().unwrap().is_valid());
    assert_eq!(service.health(), LedgerHealth::Healthy);

    let receipt = service
        .submit_vote(ballot("poll-1", "alice", "optionB"))
        .await
        .unwrap();
    assert_eq!(receipt.block_index, 1);
}
