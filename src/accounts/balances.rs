//! Sparse per-(owner, token) balances
//!
//! A zero balance is never stored: setting a balance to 0 erases the entry
//! and a missing entry reads back as 0.

use crate::error::Result;
use crate::primitives::{Amount, Balances, Owner, TokenAmount, TokenId};
use crate::storage::{BalanceKey, KvRead, KvWrite, Prefix, Record, TypedRead, TypedWrite};

/// Record kind: (owner, token id) -> amount
pub struct BalanceEntries;

impl Record for BalanceEntries {
    const PREFIX: Prefix = Prefix::Balance;
    type Key = BalanceKey;
    type Value = Amount;
}

/// Balance reads
pub trait BalancesView: KvRead {
    /// Stored balance, zero when absent
    fn get_balance(&self, owner: &Owner, token_id: TokenId) -> Result<TokenAmount> {
        let key = BalanceKey {
            owner: owner.clone(),
            token_id,
        };
        let value = self.read_by::<BalanceEntries>(&key)?.unwrap_or(0);
        Ok(TokenAmount::new(token_id, value))
    }

    /// Visit balances ordered by owner bytes then token id, starting at `start`
    fn for_each_balance<F>(&self, start: &BalanceKey, mut callback: F) -> Result<()>
    where
        F: FnMut(&Owner, TokenAmount) -> bool,
    {
        self.for_each_by::<BalanceEntries, _>(start, |key, value| {
            callback(&key.owner, TokenAmount::new(key.token_id, value))
        })
    }
}

impl<T: KvRead + ?Sized> BalancesView for T {}

/// Balance mutations
///
/// Batch operations stop at the first failure without undoing earlier
/// writes; run them inside an overlay and discard it on error.
pub trait BalancesViewMut: BalancesView + KvWrite {
    fn set_balance(&mut self, owner: &Owner, amount: TokenAmount) -> Result<()> {
        let key = BalanceKey {
            owner: owner.clone(),
            token_id: amount.token_id,
        };
        if amount.value != 0 {
            self.write_by::<BalanceEntries>(&key, &amount.value)
        } else {
            self.erase_by::<BalanceEntries>(&key)
        }
    }

    fn add_balance(&mut self, owner: &Owner, amount: TokenAmount) -> Result<()> {
        if amount.value == 0 {
            return Ok(());
        }
        let mut balance = self.get_balance(owner, amount.token_id)?;
        balance.add(amount.value)?;
        self.set_balance(owner, balance)
    }

    fn sub_balance(&mut self, owner: &Owner, amount: TokenAmount) -> Result<()> {
        if amount.value == 0 {
            return Ok(());
        }
        let mut balance = self.get_balance(owner, amount.token_id)?;
        balance.sub(amount.value)?;
        self.set_balance(owner, balance)
    }

    fn add_balances(&mut self, owner: &Owner, balances: &Balances) -> Result<()> {
        for amount in balances.iter() {
            self.add_balance(owner, amount)?;
        }
        Ok(())
    }

    fn sub_balances(&mut self, owner: &Owner, balances: &Balances) -> Result<()> {
        for amount in balances.iter() {
            self.sub_balance(owner, amount)?;
        }
        Ok(())
    }
}

impl<T: KvWrite + ?Sized> BalancesViewMut for T {}
