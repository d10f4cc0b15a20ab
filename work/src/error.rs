use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkError {
    #[error("block sealing cancelled")]
    Cancelled,

    #[error("nonce space exhausted at difficulty {difficulty}")]
    Exhausted { difficulty: u32 },

    #[error("failed to build sealing thread pool: {0}")]
    ThreadPool(String),
}
