//! In-memory ordered store
//!
//! Backs tests and scratch views. Cloning yields an independent snapshot.

use crate::error::Result;
use crate::storage::{KvIter, KvRead, KvWrite};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: BTreeMap<Vec<u8>, Vec<u8>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl KvRead for MemoryStore {
    fn read(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.entries.get(key).cloned())
    }

    fn iter_from(&self, start: &[u8]) -> KvIter<'_> {
        Box::new(
            self.entries
                .range(start.to_vec()..)
                .map(|(k, v)| Ok((k.clone(), v.clone()))),
        )
    }
}

impl KvWrite for MemoryStore {
    fn write(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.entries.insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn erase(&mut self, key: &[u8]) -> Result<()> {
        self.entries.remove(key);
        Ok(())
    }
}
