use vox_store::{MetaStore, StoreError};

use crate::environment::LmdbEnvironment;
use crate::LmdbError;

pub(crate) const SCHEMA_VERSION_KEY: &str = "schema_version";

impl MetaStore for LmdbEnvironment {
    fn get_schema_version(&self) -> Result<u32, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        match self
            .meta_db
            .get(&rtxn, SCHEMA_VERSION_KEY.as_bytes())
            .map_err(LmdbError::from)?
        {
            Some(bytes) => {
                let arr: [u8; 4] = bytes.try_into().map_err(|_| {
                    StoreError::Corruption(format!("schema version has {} bytes", bytes.len()))
                })?;
                Ok(u32::from_be_bytes(arr))
            }
            None => Ok(0),
        }
    }

    fn set_schema_version(&self, version: u32) -> Result<(), StoreError> {
        let mut batch = self.write_batch()?;
        batch.put_meta(SCHEMA_VERSION_KEY, &version.to_be_bytes())?;
        batch.commit()?;
        Ok(())
    }
}
