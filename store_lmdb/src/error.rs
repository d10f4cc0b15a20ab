use thiserror::Error;

#[derive(Debug, Error)]
pub enum LmdbError {
    #[error("LMDB error: {0}")]
    Heed(String),

    #[error("key not found: {0}")]
    NotFound(String),

    #[error("duplicate key: {0}")]
    Duplicate(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<heed::Error> for LmdbError {
    fn from(e: heed::Error) -> Self {
        LmdbError::Heed(e.to_string())
    }
}

impl From<serde_json::Error> for LmdbError {
    fn from(e: serde_json::Error) -> Self {
        LmdbError::Serialization(e.to_string())
    }
}

impl From<bincode::Error> for LmdbError {
    fn from(e: bincode::Error) -> Self {
        LmdbError::Serialization(e.to_string())
    }
}

impl From<LmdbError> for vox_store::StoreError {
    fn from(e: LmdbError) -> Self {
        match e {
            LmdbError::NotFound(key) => vox_store::StoreError::NotFound(key),
            LmdbError::Duplicate(key) => vox_store::StoreError::Duplicate(key),
            LmdbError::Serialization(msg) => vox_store::StoreError::Serialization(msg),
            LmdbError::Io(e) => vox_store::StoreError::Unavailable(e.to_string()),
            LmdbError::Heed(msg) => vox_store::StoreError::Backend(msg),
        }
    }
}
