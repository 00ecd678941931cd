//! Error types for the ledger core

use crate::primitives::{Amount, Owner, TokenId};
use thiserror::Error;

/// Result type for ledger operations
pub type Result<T> = std::result::Result<T, LedgerError>;

/// Ledger errors
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("Malformed key: {0}")]
    MalformedKey(String),

    #[error("Arithmetic overflow on token {token_id}")]
    Overflow { token_id: TokenId },

    #[error("Negative amount {value} on token {token_id}")]
    NegativeAmount { token_id: TokenId, value: Amount },

    #[error("Insufficient funds on token {token_id}: available {available}, required {required}")]
    InsufficientFunds {
        token_id: TokenId,
        available: Amount,
        required: Amount,
    },

    #[error("Pool pair {0} not found")]
    PoolNotFound(TokenId),

    #[error("Pool pair for tokens {token_a}/{token_b} already exists")]
    PoolPairExists { token_a: TokenId, token_b: TokenId },

    #[error("Pool id {0} is already taken")]
    PoolIdTaken(TokenId),

    #[error("Invalid pool pair: {0}")]
    InvalidPool(String),

    #[error("Invalid liquidity: {0}")]
    InvalidLiquidity(String),

    #[error("Token {0} does not belong to the pool")]
    TokenMismatch(TokenId),

    #[error("Input amount should be positive")]
    NonPositiveInput,

    #[error("Pool trading is turned off")]
    TradingDisabled,

    #[error("Lack of liquidity")]
    LackOfLiquidity,

    #[error("Swap output rounds down to zero")]
    ZeroOutput,

    #[error("Price {price} is higher than indicated {max_price}")]
    PriceExceeded { price: Amount, max_price: Amount },

    #[error("removing liquidity: {0}")]
    RemovingLiquidity(#[source] Box<LedgerError>),

    #[error("minting liquidity: {0}")]
    MintingLiquidity(#[source] Box<LedgerError>),

    /// Fatal: a provider's share weight reached 100%
    #[error("Pool rewards: weight {weight} of {owner} in pool {pool_id} is not below precision")]
    RewardWeight {
        pool_id: TokenId,
        owner: Owner,
        weight: i64,
    },

    /// Fatal: the pool could not be written back after a reward cycle
    #[error("Pool rewards: can't update pool (id={pool_id}) state: {source}")]
    PoolUpdate {
        pool_id: TokenId,
        #[source]
        source: Box<LedgerError>,
    },

    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl LedgerError {
    /// Errors after which ledger consistency can no longer be guaranteed.
    /// Block processing must stop instead of skipping the transaction.
    pub fn is_fatal(&self) -> bool {
        matches!(self, LedgerError::RewardWeight { .. } | LedgerError::PoolUpdate { .. })
    }
}

impl From<sled::Error> for LedgerError {
    fn from(err: sled::Error) -> Self {
        LedgerError::Storage(err.to_string())
    }
}
