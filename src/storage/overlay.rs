//! Copy-on-write transactional overlay
//!
//! An [`Overlay`] stages writes in memory on top of a parent store. Reads
//! see the staged writes first, scans merge both sides in key order, and
//! nothing reaches the parent until [`Overlay::flush`]. Dropping or
//! discarding the overlay throws the staged writes away, which is how a
//! failed transaction is rolled back.

use crate::error::Result;
use crate::storage::{KvIter, KvPair, KvRead, KvWrite};
use std::cmp::Ordering;
use std::collections::btree_map::{self, BTreeMap};
use std::iter::Peekable;

/// State of one key relative to the parent store
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyChange {
    Unchanged,
    Written(Vec<u8>),
    Deleted,
}

static UNCHANGED: KeyChange = KeyChange::Unchanged;

/// Ordered raw key -> change map captured by an overlay
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteSet {
    changes: BTreeMap<Vec<u8>, KeyChange>,
}

impl WriteSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write(&mut self, key: &[u8], value: &[u8]) {
        self.changes
            .insert(key.to_vec(), KeyChange::Written(value.to_vec()));
    }

    pub fn erase(&mut self, key: &[u8]) {
        self.changes.insert(key.to_vec(), KeyChange::Deleted);
    }

    /// Change recorded for `key`, `Unchanged` if never touched
    pub fn get(&self, key: &[u8]) -> &KeyChange {
        self.changes.get(key).unwrap_or(&UNCHANGED)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&[u8], &KeyChange)> + '_ {
        self.changes.iter().map(|(k, v)| (k.as_slice(), v))
    }

    /// Changes with key >= `start`
    pub fn range_from(&self, start: &[u8]) -> btree_map::Range<'_, Vec<u8>, KeyChange> {
        self.changes.range(start.to_vec()..)
    }

    /// The contiguous run of changes whose key starts with `prefix`
    pub fn prefix_range(&self, prefix: u8) -> impl Iterator<Item = (&[u8], &KeyChange)> + '_ {
        self.changes
            .range(vec![prefix]..)
            .take_while(move |(key, _)| key.first() == Some(&prefix))
            .map(|(k, v)| (k.as_slice(), v))
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn clear(&mut self) {
        self.changes.clear();
    }
}

/// Staged view on top of a parent store
#[derive(Debug)]
pub struct Overlay<P> {
    parent: P,
    changes: WriteSet,
}

impl<P: KvRead> Overlay<P> {
    pub fn new(parent: P) -> Self {
        Self {
            parent,
            changes: WriteSet::new(),
        }
    }

    /// The parent store as it was before any staged write
    pub fn parent(&self) -> &P {
        &self.parent
    }

    pub fn write_set(&self) -> &WriteSet {
        &self.changes
    }

    /// Drop all staged writes
    pub fn discard(&mut self) {
        self.changes.clear();
    }
}

impl<P: KvWrite> Overlay<P> {
    /// Push staged writes into the parent
    pub fn flush(&mut self) -> Result<()> {
        self.parent.apply(&self.changes)?;
        self.changes.clear();
        Ok(())
    }
}

impl<P: KvRead> KvRead for Overlay<P> {
    fn read(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        match self.changes.get(key) {
            KeyChange::Written(value) => Ok(Some(value.clone())),
            KeyChange::Deleted => Ok(None),
            KeyChange::Unchanged => self.parent.read(key),
        }
    }

    fn iter_from(&self, start: &[u8]) -> KvIter<'_> {
        Box::new(MergeIter {
            base: self.parent.iter_from(start).peekable(),
            local: self.changes.range_from(start).peekable(),
        })
    }
}

impl<P: KvRead> KvWrite for Overlay<P> {
    fn write(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.changes.write(key, value);
        Ok(())
    }

    fn erase(&mut self, key: &[u8]) -> Result<()> {
        self.changes.erase(key);
        Ok(())
    }
}

/// Merges the parent scan with staged changes; staged changes win on ties
struct MergeIter<'a> {
    base: Peekable<KvIter<'a>>,
    local: Peekable<btree_map::Range<'a, Vec<u8>, KeyChange>>,
}

enum Next {
    Base,
    Local,
    Both,
    Done,
}

impl<'a> Iterator for MergeIter<'a> {
    type Item = Result<KvPair>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let next = match (self.base.peek(), self.local.peek()) {
                (None, None) => Next::Done,
                (Some(Err(_)), _) | (Some(Ok(_)), None) => Next::Base,
                (None, Some(_)) => Next::Local,
                (Some(Ok((base_key, _))), Some((local_key, _))) => {
                    match base_key.as_slice().cmp(local_key.as_slice()) {
                        Ordering::Less => Next::Base,
                        Ordering::Equal => Next::Both,
                        Ordering::Greater => Next::Local,
                    }
                }
            };

            let (key, change) = match next {
                Next::Done => return None,
                Next::Base => return self.base.next(),
                Next::Both => {
                    self.base.next();
                    self.local.next()?
                }
                Next::Local => self.local.next()?,
            };

            if let KeyChange::Written(value) = change {
                return Some(Ok((key.clone(), value.clone())));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    fn collect<S: KvRead>(store: &S) -> Vec<KvPair> {
        store.iter_from(&[]).map(|item| item.unwrap()).collect()
    }

    #[test]
    fn test_reads_see_staged_writes() {
        let mut base = MemoryStore::new();
        base.write(b"a", b"1").unwrap();
        base.write(b"b", b"2").unwrap();

        let mut overlay = Overlay::new(&mut base);
        overlay.write(b"a", b"9").unwrap();
        overlay.erase(b"b").unwrap();

        assert_eq!(overlay.read(b"a").unwrap(), Some(b"9".to_vec()));
        assert_eq!(overlay.read(b"b").unwrap(), None);
        assert_eq!(overlay.parent().read(b"b").unwrap(), Some(b"2".to_vec()));
    }

    #[test]
    fn test_merged_scan_is_ordered() {
        let mut base = MemoryStore::new();
        base.write(b"a", b"1").unwrap();
        base.write(b"c", b"3").unwrap();
        base.write(b"e", b"5").unwrap();

        let mut overlay = Overlay::new(&base);
        overlay.write(b"b", b"2").unwrap();
        overlay.write(b"c", b"33").unwrap();
        overlay.erase(b"e").unwrap();
        overlay.write(b"f", b"6").unwrap();

        let keys: Vec<(Vec<u8>, Vec<u8>)> = collect(&overlay);
        assert_eq!(
            keys,
            vec![
                (b"a".to_vec(), b"1".to_vec()),
                (b"b".to_vec(), b"2".to_vec()),
                (b"c".to_vec(), b"33".to_vec()),
                (b"f".to_vec(), b"6".to_vec()),
            ]
        );
    }

    #[test]
    fn test_flush_and_discard() {
        let mut base = MemoryStore::new();
        {
            let mut overlay = Overlay::new(&mut base);
            overlay.write(b"k", b"v").unwrap();
            overlay.discard();
            overlay.flush().unwrap();
        }
        assert_eq!(base.read(b"k").unwrap(), None);

        {
            let mut overlay = Overlay::new(&mut base);
            overlay.write(b"k", b"v").unwrap();
            overlay.flush().unwrap();
            assert!(overlay.write_set().is_empty());
        }
        assert_eq!(base.read(b"k").unwrap(), Some(b"v".to_vec()));
    }

    #[test]
    fn test_nested_overlays() {
        let mut base = MemoryStore::new();
        let mut block = Overlay::new(&mut base);
        {
            let mut tx = Overlay::new(&mut block);
            tx.write(b"x", b"1").unwrap();
            tx.flush().unwrap();
        }
        assert_eq!(block.read(b"x").unwrap(), Some(b"1".to_vec()));
        block.flush().unwrap();
        assert_eq!(base.read(b"x").unwrap(), Some(b"1".to_vec()));
    }

    #[test]
    fn test_write_set_three_states() {
        let mut set = WriteSet::new();
        set.write(b"a1", b"v");
        set.erase(b"a2");
        set.write(b"b1", b"w");

        assert_eq!(set.get(b"a1"), &KeyChange::Written(b"v".to_vec()));
        assert_eq!(set.get(b"a2"), &KeyChange::Deleted);
        assert_eq!(set.get(b"zz"), &KeyChange::Unchanged);
        assert_eq!(set.prefix_range(b'a').count(), 2);
    }
}
