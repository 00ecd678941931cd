//! Database persistence layer using Sled
//!
//! All record kinds share one ordered tree; prefixes keep them apart.

use crate::config::Config;
use crate::error::{LedgerError, Result};
use crate::storage::{KeyChange, KvIter, KvRead, KvWrite, WriteSet};
use sled::{Batch, Db, Tree};
use std::path::Path;

const STATE_TREE: &str = "state";

/// Database wrapper
#[derive(Debug, Clone)]
pub struct SledStore {
    db: Db,
    state: Tree,
}

impl SledStore {
    /// Open or create the database at `path`
    pub fn open<P: AsRef<Path>>(path: P, cache_capacity: u64) -> Result<Self> {
        let db = sled::Config::new()
            .path(path)
            .cache_capacity(cache_capacity)
            .open()?;
        Self::from_db(db)
    }

    /// Open the database described by the configuration
    pub fn open_with_config(config: &Config) -> Result<Self> {
        std::fs::create_dir_all(&config.data_dir)?;
        let store = Self::open(&config.data_dir, config.cache_capacity_bytes)?;
        tracing::info!(path = ?config.data_dir, "Opened ledger database");
        Ok(store)
    }

    /// Database removed on drop
    pub fn temporary() -> Result<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::from_db(db)
    }

    fn from_db(db: Db) -> Result<Self> {
        let state = db.open_tree(STATE_TREE)?;
        Ok(Self { db, state })
    }

    /// Force pending writes to disk
    pub fn flush(&self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }

    /// Number of stored entries
    pub fn len(&self) -> usize {
        self.state.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.is_empty()
    }
}

impl KvRead for SledStore {
    fn read(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.state.get(key)?.map(|value| value.to_vec()))
    }

    fn iter_from(&self, start: &[u8]) -> KvIter<'_> {
        Box::new(self.state.range(start.to_vec()..).map(|item| {
            item.map(|(key, value)| (key.to_vec(), value.to_vec()))
                .map_err(LedgerError::from)
        }))
    }
}

impl KvWrite for SledStore {
    fn write(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.state.insert(key, value)?;
        Ok(())
    }

    fn erase(&mut self, key: &[u8]) -> Result<()> {
        self.state.remove(key)?;
        Ok(())
    }

    /// Atomic batch followed by a flush, so a committed block survives a crash
    fn apply(&mut self, write_set: &WriteSet) -> Result<()> {
        let mut batch = Batch::default();
        for (key, change) in write_set.iter() {
            match change {
                KeyChange::Written(value) => batch.insert(key, value.as_slice()),
                KeyChange::Deleted => batch.remove(key),
                KeyChange::Unchanged => {}
            }
        }
        self.state.apply_batch(batch)?;
        self.flush()?;
        tracing::debug!(changes = write_set.len(), "Applied write set");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Overlay;
    use tempfile::TempDir;

    #[test]
    fn test_persists_across_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let mut store = SledStore::open(dir.path(), 1024 * 1024).unwrap();
            let mut overlay = Overlay::new(&mut store);
            overlay.write(b"a1", b"one").unwrap();
            overlay.write(b"a2", b"two").unwrap();
            overlay.flush().unwrap();
        }

        let store = SledStore::open(dir.path(), 1024 * 1024).unwrap();
        assert_eq!(store.read(b"a1").unwrap(), Some(b"one".to_vec()));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_range_scan_from_start_key() {
        let mut store = SledStore::temporary().unwrap();
        store.write(b"a", b"1").unwrap();
        store.write(b"b", b"2").unwrap();
        store.write(b"c", b"3").unwrap();

        let keys: Vec<Vec<u8>> = store
            .iter_from(b"b")
            .map(|item| item.unwrap().0)
            .collect();
        assert_eq!(keys, vec![b"b".to_vec(), b"c".to_vec()]);

        store.erase(b"b").unwrap();
        assert!(!store.exists(b"b").unwrap());
    }
}
