//! LMDB environment setup.

use std::path::{Path, PathBuf};

use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions};

use crate::migration::Migrator;
use crate::write_batch::WriteBatch;
use crate::LmdbError;

/// Number of named databases the environment is opened with.
const MAX_DBS: u32 = 8;

/// Wraps the LMDB environment and all database handles.
///
/// `Env` and `Database` are cheap handles, so cloning the environment
/// shares the same underlying LMDB files.
#[derive(Clone)]
pub struct LmdbEnvironment {
    pub(crate) env: Env,
    pub(crate) blocks_db: Database<Bytes, Bytes>,
    pub(crate) votes_db: Database<Bytes, Bytes>,
    pub(crate) meta_db: Database<Bytes, Bytes>,
    path: PathBuf,
}

impl LmdbEnvironment {
    /// Open or create an LMDB environment at the given path and bring its
    /// schema up to date.
    pub fn open(path: &Path, map_size: usize) -> Result<Self, LmdbError> {
        std::fs::create_dir_all(path)?;

        // SAFETY: the environment is opened once per process per path, and
        // nothing else maps these files.
        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(map_size)
                .max_dbs(MAX_DBS)
                .open(path)?
        };

        let mut wtxn = env.write_txn()?;
        let blocks_db = env.create_database(&mut wtxn, Some("blocks"))?;
        let votes_db = env.create_database(&mut wtxn, Some("votes"))?;
        let meta_db = env.create_database(&mut wtxn, Some("meta"))?;
        wtxn.commit()?;

        let environment = Self {
            env,
            blocks_db,
            votes_db,
            meta_db,
            path: path.to_path_buf(),
        };
        Migrator::run(&environment)?;

        tracing::info!(path = %path.display(), "opened LMDB environment");
        Ok(environment)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn env(&self) -> &Env {
        &self.env
    }

    /// Begin a write batch; nothing is visible until [`WriteBatch::commit`].
    pub fn write_batch(&self) -> Result<WriteBatch<'_>, LmdbError> {
        WriteBatch::new(self)
    }

    /// Force an fsync of the environment.
    pub fn sync(&self) -> Result<(), LmdbError> {
        self.env.force_sync()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vox_store::MetaStore;

    #[test]
    fn open_creates_directory_and_sets_schema() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/ledger");
        let env = LmdbEnvironment::open(&path, 16 * 1024 * 1024).unwrap();
        assert!(path.join("data.mdb").exists());
        assert_eq!(
            env.get_schema_version().unwrap(),
            crate::migration::CURRENT_SCHEMA_VERSION
        );
    }
}
