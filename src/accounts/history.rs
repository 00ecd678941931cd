//! Account history index
//!
//! History is derived after the fact: once every balance mutation of a
//! transaction has landed in its overlay, the balance-prefixed part of the
//! write set is diffed against the state before the transaction and one
//! record per affected owner is written.

use crate::accounts::BalanceEntries;
use crate::error::{LedgerError, Result};
use crate::primitives::{Amount, Owner, TokenId, TxId};
use crate::storage::{
    decode_record_key, decode_value, AccountHistoryKey, KeyChange, KvRead, KvWrite, Overlay,
    Prefix, Record, TypedRead, TypedWrite, WriteSet,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Signed per-token balance deltas
pub type TokenDeltas = BTreeMap<TokenId, Amount>;

/// Net effect of one transaction on one owner
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub txid: TxId,
    pub deltas: TokenDeltas,
}

/// Record kind: (owner, height, txn) -> history entry
pub struct AccountHistoryEntries;

impl Record for AccountHistoryEntries {
    const PREFIX: Prefix = Prefix::AccountHistory;
    type Key = AccountHistoryKey;
    type Value = HistoryEntry;
}

/// Diff the balance entries of `write_set` against `before`.
///
/// Returns the per-owner deltas and whether any balance key was present.
/// Rewriting a key with its previous value still yields a zero delta.
pub fn collect_balance_deltas<B: KvRead + ?Sized>(
    before: &B,
    write_set: &WriteSet,
) -> Result<(BTreeMap<Owner, TokenDeltas>, bool)> {
    let mut deltas: BTreeMap<Owner, TokenDeltas> = BTreeMap::new();
    let mut found = false;

    for (raw_key, change) in write_set.prefix_range(Prefix::Balance.byte()) {
        found = true;
        let key = decode_record_key::<BalanceEntries>(raw_key)?;

        let new_amount: Amount = match change {
            KeyChange::Written(bytes) => decode_value(bytes)?,
            KeyChange::Deleted | KeyChange::Unchanged => 0,
        };
        let old_amount: Amount = match before.read(raw_key)? {
            Some(bytes) => decode_value(&bytes)?,
            None => 0,
        };
        let delta = new_amount
            .checked_sub(old_amount)
            .ok_or(LedgerError::Overflow { token_id: key.token_id })?;

        deltas.entry(key.owner).or_default().insert(key.token_id, delta);
    }

    Ok((deltas, found))
}

/// History reads
pub trait HistoryView: KvRead {
    /// Visit history ordered by owner, height, txn, starting at `start`
    fn for_each_account_history<F>(&self, start: &AccountHistoryKey, mut callback: F) -> Result<()>
    where
        F: FnMut(&AccountHistoryKey, &HistoryEntry) -> bool,
    {
        self.for_each_by::<AccountHistoryEntries, _>(start, |key, entry| callback(&key, &entry))
    }
}

impl<T: KvRead + ?Sized> HistoryView for T {}

/// History writes
pub trait HistoryViewMut: KvWrite {
    fn set_account_history(
        &mut self,
        owner: &Owner,
        height: u32,
        txn: u32,
        txid: &TxId,
        deltas: &TokenDeltas,
    ) -> Result<()> {
        tracing::debug!(
            owner = %owner,
            height,
            txn,
            txid = %txid,
            diffs = deltas.len(),
            "Set account history"
        );
        let key = AccountHistoryKey {
            owner: owner.clone(),
            block_height: height,
            txn,
        };
        let entry = HistoryEntry {
            txid: *txid,
            deltas: deltas.clone(),
        };
        self.write_by::<AccountHistoryEntries>(&key, &entry)
    }

    /// Write one history record per owner whose balances appear in `write_set`.
    /// Returns false when the write set holds no balance keys.
    fn track_affected_accounts<B: KvRead + ?Sized>(
        &mut self,
        before: &B,
        write_set: &WriteSet,
        height: u32,
        txn: u32,
        txid: &TxId,
    ) -> Result<bool> {
        let (deltas, found) = collect_balance_deltas(before, write_set)?;
        for (owner, owner_deltas) in &deltas {
            self.set_account_history(owner, height, txn, txid, owner_deltas)?;
        }
        Ok(found)
    }
}

impl<T: KvWrite + ?Sized> HistoryViewMut for T {}

impl<P: KvRead> Overlay<P> {
    /// Record history for this overlay's own balance writes, using the
    /// parent as the before state. The records are staged in the overlay
    /// and commit together with the transaction.
    pub fn track_affected_accounts(&mut self, height: u32, txn: u32, txid: &TxId) -> Result<bool> {
        let (deltas, found) = collect_balance_deltas(self.parent(), self.write_set())?;
        for (owner, owner_deltas) in &deltas {
            self.set_account_history(owner, height, txn, txid, owner_deltas)?;
        }
        Ok(found)
    }
}
