//! Order-preserving key encoding and typed record access
//!
//! Integers are fixed-width big-endian so that byte order equals numeric
//! order. Owners are variable length: each `0x00` byte is escaped as
//! `0x00 0xFF` and the owner is terminated by `0x00 0x01`, which keeps
//! byte-lexicographic owner order even when more key fields follow.
//!
//! Values are plain bincode.

use crate::error::{LedgerError, Result};
use crate::primitives::{Owner, TokenId};
use crate::storage::{KvRead, KvWrite, Prefix};
use serde::de::DeserializeOwned;
use serde::Serialize;

const ESCAPE: u8 = 0x00;
const ESCAPED_ZERO: u8 = 0xFF;
const TERMINATOR: u8 = 0x01;

/// A key component with an order-preserving byte form
pub trait KeyCodec: Sized {
    fn encode_key(&self, out: &mut Vec<u8>);

    /// Decode from the front of `input`, advancing it
    fn decode_key(input: &mut &[u8]) -> Result<Self>;
}

fn take<'a>(input: &mut &'a [u8], len: usize) -> Result<&'a [u8]> {
    if input.len() < len {
        return Err(LedgerError::MalformedKey(format!(
            "expected {} bytes, found {}",
            len,
            input.len()
        )));
    }
    let (head, tail) = input.split_at(len);
    *input = tail;
    Ok(head)
}

impl KeyCodec for u32 {
    fn encode_key(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.to_be_bytes());
    }

    fn decode_key(input: &mut &[u8]) -> Result<Self> {
        let bytes = take(input, 4)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }
}

impl KeyCodec for TokenId {
    fn encode_key(&self, out: &mut Vec<u8>) {
        self.0.encode_key(out);
    }

    fn decode_key(input: &mut &[u8]) -> Result<Self> {
        Ok(TokenId(u32::decode_key(input)?))
    }
}

impl KeyCodec for Owner {
    fn encode_key(&self, out: &mut Vec<u8>) {
        for &byte in self.as_bytes() {
            out.push(byte);
            if byte == ESCAPE {
                out.push(ESCAPED_ZERO);
            }
        }
        out.push(ESCAPE);
        out.push(TERMINATOR);
    }

    fn decode_key(input: &mut &[u8]) -> Result<Self> {
        let mut owner = Vec::new();
        loop {
            let byte = take(input, 1)?[0];
            if byte != ESCAPE {
                owner.push(byte);
                continue;
            }
            match take(input, 1)?[0] {
                ESCAPED_ZERO => owner.push(ESCAPE),
                TERMINATOR => return Ok(Owner(owner)),
                other => {
                    return Err(LedgerError::MalformedKey(format!(
                        "invalid owner escape 0x{:02x}",
                        other
                    )))
                }
            }
        }
    }
}

/// Key of a balance entry
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct BalanceKey {
    pub owner: Owner,
    pub token_id: TokenId,
}

impl KeyCodec for BalanceKey {
    fn encode_key(&self, out: &mut Vec<u8>) {
        self.owner.encode_key(out);
        self.token_id.encode_key(out);
    }

    fn decode_key(input: &mut &[u8]) -> Result<Self> {
        Ok(BalanceKey {
            owner: Owner::decode_key(input)?,
            token_id: TokenId::decode_key(input)?,
        })
    }
}

/// Key of an account history record
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct AccountHistoryKey {
    pub owner: Owner,
    pub block_height: u32,
    pub txn: u32,
}

impl KeyCodec for AccountHistoryKey {
    fn encode_key(&self, out: &mut Vec<u8>) {
        self.owner.encode_key(out);
        self.block_height.encode_key(out);
        self.txn.encode_key(out);
    }

    fn decode_key(input: &mut &[u8]) -> Result<Self> {
        Ok(AccountHistoryKey {
            owner: Owner::decode_key(input)?,
            block_height: u32::decode_key(input)?,
            txn: u32::decode_key(input)?,
        })
    }
}

/// Key of a pool share marker, grouped by pool
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct PoolShareKey {
    pub pool_id: TokenId,
    pub owner: Owner,
}

impl KeyCodec for PoolShareKey {
    fn encode_key(&self, out: &mut Vec<u8>) {
        self.pool_id.encode_key(out);
        self.owner.encode_key(out);
    }

    fn decode_key(input: &mut &[u8]) -> Result<Self> {
        Ok(PoolShareKey {
            pool_id: TokenId::decode_key(input)?,
            owner: Owner::decode_key(input)?,
        })
    }
}

/// Key of the token pair index
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct PairKey {
    pub token_a: TokenId,
    pub token_b: TokenId,
}

impl KeyCodec for PairKey {
    fn encode_key(&self, out: &mut Vec<u8>) {
        self.token_a.encode_key(out);
        self.token_b.encode_key(out);
    }

    fn decode_key(input: &mut &[u8]) -> Result<Self> {
        Ok(PairKey {
            token_a: TokenId::decode_key(input)?,
            token_b: TokenId::decode_key(input)?,
        })
    }
}

/// Binds a prefix, a key type and a value type into one record kind
pub trait Record {
    const PREFIX: Prefix;
    type Key: KeyCodec;
    type Value: Serialize + DeserializeOwned;
}

/// Full raw key of a record: prefix byte followed by the encoded key
pub fn record_key<R: Record>(key: &R::Key) -> Vec<u8> {
    let mut out = vec![R::PREFIX.byte()];
    key.encode_key(&mut out);
    out
}

/// Decode a full raw key; the whole input must be consumed
pub fn decode_record_key<R: Record>(raw: &[u8]) -> Result<R::Key> {
    match raw.split_first() {
        Some((prefix, mut rest)) if *prefix == R::PREFIX.byte() => {
            let key = R::Key::decode_key(&mut rest)?;
            if !rest.is_empty() {
                return Err(LedgerError::MalformedKey(format!(
                    "{} trailing bytes",
                    rest.len()
                )));
            }
            Ok(key)
        }
        _ => Err(LedgerError::MalformedKey(format!(
            "missing prefix {:?}",
            R::PREFIX
        ))),
    }
}

pub fn encode_value<V: Serialize>(value: &V) -> Result<Vec<u8>> {
    Ok(bincode::serialize(value)?)
}

pub fn decode_value<V: DeserializeOwned>(bytes: &[u8]) -> Result<V> {
    Ok(bincode::deserialize(bytes)?)
}

/// Typed reads keyed by record kind
pub trait TypedRead: KvRead {
    fn read_by<R: Record>(&self, key: &R::Key) -> Result<Option<R::Value>> {
        match self.read(&record_key::<R>(key))? {
            Some(bytes) => Ok(Some(decode_value(&bytes)?)),
            None => Ok(None),
        }
    }

    fn exists_by<R: Record>(&self, key: &R::Key) -> Result<bool> {
        self.exists(&record_key::<R>(key))
    }

    /// Visit records of one kind in ascending key order starting at `start`.
    /// Stops at the end of the prefix or when `callback` returns false.
    fn for_each_by<R, F>(&self, start: &R::Key, mut callback: F) -> Result<()>
    where
        R: Record,
        F: FnMut(R::Key, R::Value) -> bool,
    {
        for item in self.iter_from(&record_key::<R>(start)) {
            let (raw_key, raw_value) = item?;
            if raw_key.first() != Some(&R::PREFIX.byte()) {
                break;
            }
            let key = decode_record_key::<R>(&raw_key)?;
            let value = decode_value::<R::Value>(&raw_value)?;
            if !callback(key, value) {
                break;
            }
        }
        Ok(())
    }
}

impl<T: KvRead + ?Sized> TypedRead for T {}

/// Typed writes keyed by record kind
pub trait TypedWrite: KvWrite {
    fn write_by<R: Record>(&mut self, key: &R::Key, value: &R::Value) -> Result<()> {
        let bytes = encode_value(value)?;
        self.write(&record_key::<R>(key), &bytes)
    }

    fn erase_by<R: Record>(&mut self, key: &R::Key) -> Result<()> {
        self.erase(&record_key::<R>(key))
    }
}

impl<T: KvWrite + ?Sized> TypedWrite for T {}
