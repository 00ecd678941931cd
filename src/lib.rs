//! PoolSwap Ledger Core Library
//!
//! Transactional ledger layer for a blockchain node: sparse per-account
//! token balances with an account history index, and constant-product
//! pool pairs with liquidity provisioning, swaps and reward distribution.
//!
//! Everything runs on top of an ordered key-value store; transactions are
//! staged in an [`storage::Overlay`] and flushed by the caller.

pub mod accounts;
pub mod config;
pub mod error;
pub mod poolpairs;
pub mod primitives;
pub mod storage;
pub mod txs;

pub use config::Config;
pub use error::{LedgerError, Result};

/// Protocol constants - fixed by consensus, never configurable
pub mod constants {
    /// One whole coin in base units (8 decimal places)
    pub const COIN: i64 = 100_000_000;

    /// Number of decimal places of every amount
    pub const DECIMAL_PLACES: u8 = 8;

    /// Liquidity locked forever when a pool is bootstrapped
    pub const MINIMUM_LIQUIDITY: i64 = 1000;

    /// Both reserves must hold at least this much before a swap may run
    pub const MIN_SWAP_RESERVE: i64 = 1000;

    /// Scale of the per-provider weight used by reward distribution (100%)
    pub const REWARD_PRECISION: i64 = 10_000;

    /// Token in which yield farming rewards are paid
    pub const NATIVE_TOKEN_ID: u32 = 0;

    /// First id handed out to pool pairs (and their liquidity tokens)
    pub const FIRST_POOL_TOKEN_ID: u32 = 1 << 31;
}
