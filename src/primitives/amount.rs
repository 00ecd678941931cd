//! Fixed-point token amounts
//!
//! Amounts are signed 64-bit integers with an implicit 8 decimal scale.
//! Stored balances are never negative; every arithmetic helper here is
//! checked and reports overflow or a negative result as an error.

use crate::constants::{COIN, DECIMAL_PLACES};
use crate::error::{LedgerError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Amount in base units (1 coin = 100_000_000)
pub type Amount = i64;

/// Identifier of a fungible token type
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct TokenId(pub u32);

impl TokenId {
    /// The native token
    pub const NATIVE: TokenId = TokenId(crate::constants::NATIVE_TOKEN_ID);

    /// Lowest id of a pool pair (and its liquidity token)
    pub const FIRST_POOL: TokenId = TokenId(crate::constants::FIRST_POOL_TOKEN_ID);

    pub fn is_pool(self) -> bool {
        self >= Self::FIRST_POOL
    }

    pub fn next(self) -> Option<TokenId> {
        self.0.checked_add(1).map(TokenId)
    }
}

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Format an amount as a decimal string with 8 fractional digits
pub fn format_amount(value: Amount) -> String {
    let sign = if value < 0 { "-" } else { "" };
    let abs = value.unsigned_abs();
    let coin = COIN as u64;
    format!(
        "{}{}.{:0width$}",
        sign,
        abs / coin,
        abs % coin,
        width = DECIMAL_PLACES as usize
    )
}

/// An amount of one specific token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenAmount {
    pub token_id: TokenId,
    pub value: Amount,
}

impl TokenAmount {
    pub fn new(token_id: TokenId, value: Amount) -> Self {
        Self { token_id, value }
    }

    /// Add to this amount; fails on overflow or a negative result
    pub fn add(&mut self, value: Amount) -> Result<()> {
        let sum = self
            .value
            .checked_add(value)
            .ok_or(LedgerError::Overflow { token_id: self.token_id })?;
        if sum < 0 {
            return Err(LedgerError::NegativeAmount {
                token_id: self.token_id,
                value: sum,
            });
        }
        self.value = sum;
        Ok(())
    }

    /// Subtract from this amount; fails if the result would be negative
    pub fn sub(&mut self, value: Amount) -> Result<()> {
        let diff = self
            .value
            .checked_sub(value)
            .ok_or(LedgerError::Overflow { token_id: self.token_id })?;
        if diff < 0 {
            return Err(LedgerError::InsufficientFunds {
                token_id: self.token_id,
                available: self.value,
                required: value,
            });
        }
        self.value = diff;
        Ok(())
    }
}

impl fmt::Display for TokenAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", format_amount(self.value), self.token_id)
    }
}

/// Unordered collection of per-token amounts (iterated in token order)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balances {
    pub balances: BTreeMap<TokenId, Amount>,
}

impl Balances {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an amount, keeping the map sparse
    pub fn add(&mut self, amount: TokenAmount) -> Result<()> {
        let current = self.balances.get(&amount.token_id).copied().unwrap_or(0);
        let mut updated = TokenAmount::new(amount.token_id, current);
        updated.add(amount.value)?;
        if updated.value == 0 {
            self.balances.remove(&amount.token_id);
        } else {
            self.balances.insert(amount.token_id, updated.value);
        }
        Ok(())
    }

    /// Sum of another collection into this one
    pub fn add_all(&mut self, other: &Balances) -> Result<()> {
        for amount in other.iter() {
            self.add(amount)?;
        }
        Ok(())
    }

    pub fn get(&self, token_id: TokenId) -> Amount {
        self.balances.get(&token_id).copied().unwrap_or(0)
    }

    pub fn iter(&self) -> impl Iterator<Item = TokenAmount> + '_ {
        self.balances
            .iter()
            .map(|(token_id, value)| TokenAmount::new(*token_id, *value))
    }

    pub fn len(&self) -> usize {
        self.balances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.balances.is_empty()
    }
}

impl FromIterator<(TokenId, Amount)> for Balances {
    fn from_iter<I: IntoIterator<Item = (TokenId, Amount)>>(iter: I) -> Self {
        Self {
            balances: iter.into_iter().collect(),
        }
    }
}
