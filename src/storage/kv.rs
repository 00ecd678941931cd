//! Raw ordered key-value access
//!
//! Every record kind lives under its own single-byte prefix. Keys are
//! compared byte-lexicographically, so a scan starting at `[prefix, ..]`
//! visits one record kind in key order until the prefix changes.

use crate::error::Result;
use crate::storage::WriteSet;
use crate::storage::KeyChange;

/// Reserved key prefixes, one per record kind.
///
/// Discriminants must be unique; the compiler rejects a duplicate value.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Prefix {
    /// (owner, token id) -> amount
    Balance = b'a',
    /// (owner, height, txn) -> (txid, deltas)
    AccountHistory = b'h',
    /// pool id -> pool pair
    PoolPair = b'i',
    /// (token a, token b) -> pool id
    PoolPairByTokens = b'j',
    /// (pool id, owner) -> marker
    PoolShare = b'k',
}

impl Prefix {
    pub const ALL: [Prefix; 5] = [
        Prefix::Balance,
        Prefix::AccountHistory,
        Prefix::PoolPair,
        Prefix::PoolPairByTokens,
        Prefix::PoolShare,
    ];

    pub const fn byte(self) -> u8 {
        self as u8
    }
}

/// Raw key/value pair
pub type KvPair = (Vec<u8>, Vec<u8>);

/// Ascending iterator over raw pairs
pub type KvIter<'a> = Box<dyn Iterator<Item = Result<KvPair>> + 'a>;

/// Read access to an ordered key-value store
pub trait KvRead {
    /// Read a raw value
    fn read(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Iterate all pairs with key >= `start` in ascending order
    fn iter_from(&self, start: &[u8]) -> KvIter<'_>;

    fn exists(&self, key: &[u8]) -> Result<bool> {
        Ok(self.read(key)?.is_some())
    }
}

/// Write access to an ordered key-value store
pub trait KvWrite: KvRead {
    fn write(&mut self, key: &[u8], value: &[u8]) -> Result<()>;

    fn erase(&mut self, key: &[u8]) -> Result<()>;

    /// Apply a captured write set
    fn apply(&mut self, write_set: &WriteSet) -> Result<()> {
        for (key, change) in write_set.iter() {
            match change {
                KeyChange::Written(value) => self.write(key, value)?,
                KeyChange::Deleted => self.erase(key)?,
                KeyChange::Unchanged => {}
            }
        }
        Ok(())
    }
}

impl<T: KvRead + ?Sized> KvRead for &T {
    fn read(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        (**self).read(key)
    }

    fn iter_from(&self, start: &[u8]) -> KvIter<'_> {
        (**self).iter_from(start)
    }
}

impl<T: KvRead + ?Sized> KvRead for &mut T {
    fn read(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        (**self).read(key)
    }

    fn iter_from(&self, start: &[u8]) -> KvIter<'_> {
        (**self).iter_from(start)
    }
}

impl<T: KvWrite + ?Sized> KvWrite for &mut T {
    fn write(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        (**self).write(key, value)
    }

    fn erase(&mut self, key: &[u8]) -> Result<()> {
        (**self).erase(key)
    }

    fn apply(&mut self, write_set: &WriteSet) -> Result<()> {
        (**self).apply(write_set)
    }
}
