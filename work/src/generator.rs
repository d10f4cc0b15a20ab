//! Block sealing (multi-threaded CPU).

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use rayon::prelude::*;
use rayon::ThreadPool;

use crate::validator::meets_difficulty;
use crate::{CancelFlag, WorkError};
use vox_crypto::SealingHasher;
use vox_types::{Block, Difficulty};

/// Nonces tried per worker before checking the cancel flag.
const BATCH_SIZE: u64 = 4096;

/// Sentinel for "no nonce found yet".
const NOT_FOUND: u64 = u64::MAX;

/// Finds the nonce that seals a candidate block.
///
/// The nonce space is strided across workers. Every worker walks its share
/// in increasing order and stops once it passes the best nonce found so far,
/// so the result is the smallest valid nonce: the same one a sequential
/// `nonce += 1` loop would return.
#[derive(Clone, Default)]
pub struct BlockSealer {
    pool: Option<Arc<ThreadPool>>,
}

impl BlockSealer {
    /// Seal on rayon's global pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seal on a dedicated pool of `threads` workers (0 = rayon default).
    pub fn with_threads(threads: usize) -> Result<Self, WorkError> {
        if threads == 0 {
            return Ok(Self::new());
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("vox-seal-{i}"))
            .build()
            .map_err(|e| WorkError::ThreadPool(e.to_string()))?;
        Ok(Self {
            pool: Some(Arc::new(pool)),
        })
    }

    /// Search for a nonce so the block hash meets `difficulty`.
    ///
    /// The candidate's `nonce` and `hash` are overwritten. Returns
    /// [`WorkError::Cancelled`] as soon as a worker sees `cancel` raised.
    pub fn seal(
        &self,
        mut candidate: Block,
        difficulty: Difficulty,
        cancel: &CancelFlag,
    ) -> Result<Block, WorkError> {
        if cancel.is_cancelled() {
            return Err(WorkError::Cancelled);
        }

        let hasher = SealingHasher::for_block(&candidate);

        if difficulty.digits() == 0 {
            candidate.nonce = 0;
            candidate.hash = hasher.hash_with_nonce(0);
            return Ok(candidate);
        }

        let nonce = match &self.pool {
            Some(pool) => pool.install(|| search(&hasher, difficulty, cancel)),
            None => search(&hasher, difficulty, cancel),
        }?;

        candidate.nonce = nonce;
        candidate.hash = hasher.hash_with_nonce(nonce);
        Ok(candidate)
    }
}

fn search(
    hasher: &SealingHasher,
    difficulty: Difficulty,
    cancel: &CancelFlag,
) -> Result<u64, WorkError> {
    let found = AtomicU64::new(NOT_FOUND);
    let num_threads = rayon::current_num_threads().max(1);
    let stride = num_threads as u64;

    (0..num_threads).into_par_iter().for_each(|thread_id| {
        let mut nonce = thread_id as u64;

        loop {
            if cancel.is_cancelled() || nonce > found.load(Ordering::Relaxed) {
                return;
            }

            for _ in 0..BATCH_SIZE {
                if meets_difficulty(&hasher.hash_with_nonce(nonce), difficulty) {
                    found.fetch_min(nonce, Ordering::Relaxed);
                    return;
                }
                nonce = match nonce.checked_add(stride) {
                    Some(next) if next < NOT_FOUND => next,
                    _ => return,
                };
            }
        }
    });

    if cancel.is_cancelled() {
        return Err(WorkError::Cancelled);
    }
    match found.load(Ordering::Relaxed) {
        NOT_FOUND => Err(WorkError::Exhausted {
            difficulty: difficulty.digits(),
        }),
        nonce => Ok(nonce),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vox_types::{BlockHash, BlockPayload, Timestamp};

    fn candidate() -> Block {
        Block::candidate(
            1,
            Timestamp::from_millis(1_704_067_200_000),
            BlockPayload::UserRegistered {
                user_id: "alice".into(),
            },
            BlockHash::new([0x42; 32]),
        )
    }

    fn diff(d: u32) -> Difficulty {
        Difficulty::new(d).unwrap()
    }

    #[test]
    fn sealed_block_meets_difficulty() {
        let sealed = BlockSealer::new()
            .seal(candidate(), diff(2), &CancelFlag::new())
            .unwrap();
        assert!(sealed.hash.to_string().starts_with("00"));
        assert_eq!(sealed.hash, vox_crypto::block_hash(&sealed));
    }

    #[test]
    fn finds_smallest_nonce() {
        let sealed = BlockSealer::new()
            .seal(candidate(), diff(2), &CancelFlag::new())
            .unwrap();
        let hasher = SealingHasher::for_block(&candidate());
        for nonce in 0..sealed.nonce {
            assert!(!meets_difficulty(&hasher.hash_with_nonce(nonce), diff(2)));
        }
    }

    #[test]
    fn dedicated_pool_agrees_with_global_pool() {
        let global = BlockSealer::new()
            .seal(candidate(), diff(2), &CancelFlag::new())
            .unwrap();
        let pooled = BlockSealer::with_threads(3)
            .unwrap()
            .seal(candidate(), diff(2), &CancelFlag::new())
            .unwrap();
        assert_eq!(global.nonce, pooled.nonce);
        assert_eq!(global.hash, pooled.hash);
    }

    #[test]
    fn zero_difficulty_uses_nonce_zero() {
        let sealed = BlockSealer::new()
            .seal(candidate(), diff(0), &CancelFlag::new())
            .unwrap();
        assert_eq!(sealed.nonce, 0);
        assert_eq!(sealed.hash, vox_crypto::block_hash(&sealed));
    }

    #[test]
    fn cancelled_before_start() {
        let cancel = CancelFlag::new();
        cancel.cancel();
        let result = BlockSealer::new().seal(candidate(), diff(1), &cancel);
        assert!(matches!(result, Err(WorkError::Cancelled)));
    }

    #[test]
    fn cancel_interrupts_unreachable_target() {
        let cancel = CancelFlag::new();
        let remote = cancel.clone();
        let handle = std::thread::spawn(move || {
            BlockSealer::new().seal(candidate(), diff(64), &remote)
        });
        std::thread::sleep(std::time::Duration::from_millis(50));
        cancel.cancel();
        let result = handle.join().unwrap();
        assert!(matches!(result, Err(WorkError::Cancelled)));
    }
}
