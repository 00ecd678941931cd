//! Pool transaction messages and their wire form
//!
//! Wire layout: 4-byte marker, 1-byte message type, 4-byte little-endian
//! payload length, then the bincode payload. Payloads use variable-length
//! integers so that small token ids stay compact.

use crate::error::{LedgerError, Result};
use crate::primitives::{Amount, Balances, Owner, TokenAmount, TokenId};
use bincode::Options;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Marker opening every pool transaction ("PsTx")
pub const TX_MARKER: [u8; 4] = *b"PsTx";

/// Largest accepted payload (64 KB)
pub const MAX_PAYLOAD_SIZE: usize = 64 * 1024;

const HEADER_LEN: usize = 4 + 1 + 4;

/// Open a new pool pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatePoolPairMessage {
    pub token_a: TokenId,
    pub token_b: TokenId,
    pub commission: Amount,
    pub owner_fee_address: Option<Owner>,
    pub status: bool,
    pub reward_pct: Amount,
}

/// Add liquidity funded by one or more owners
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiquidityMessage {
    pub from: BTreeMap<Owner, Balances>,
    pub share_address: Owner,
}

/// Return liquidity tokens for the underlying reserves
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveLiquidityMessage {
    pub from: Owner,
    /// Liquidity token (the pool id) and amount
    pub amount: TokenAmount,
}

/// Swap one pool token for the other
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolSwapMessage {
    pub from: Owner,
    pub to: Owner,
    pub token_from: TokenId,
    pub token_to: TokenId,
    pub amount_from: Amount,
    pub max_price: Amount,
}

/// Pool transaction kinds
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PoolTx {
    CreatePoolPair(CreatePoolPairMessage),
    AddLiquidity(LiquidityMessage),
    RemoveLiquidity(RemoveLiquidityMessage),
    PoolSwap(PoolSwapMessage),
}

fn payload_options() -> impl Options {
    bincode::DefaultOptions::new().with_limit(MAX_PAYLOAD_SIZE as u64)
}

fn encode_payload<T: Serialize>(message: &T) -> Result<Vec<u8>> {
    Ok(payload_options().serialize(message)?)
}

fn decode_payload<'a, T: Deserialize<'a>>(bytes: &'a [u8]) -> Result<T> {
    Ok(payload_options().deserialize(bytes)?)
}

impl PoolTx {
    /// Type byte on the wire
    pub fn type_byte(&self) -> u8 {
        match self {
            PoolTx::CreatePoolPair(_) => b'p',
            PoolTx::AddLiquidity(_) => b'l',
            PoolTx::RemoveLiquidity(_) => b'r',
            PoolTx::PoolSwap(_) => b's',
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            PoolTx::CreatePoolPair(_) => "createpoolpair",
            PoolTx::AddLiquidity(_) => "addpoolliquidity",
            PoolTx::RemoveLiquidity(_) => "removepoolliquidity",
            PoolTx::PoolSwap(_) => "poolswap",
        }
    }

    /// Serialize to the wire form
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let payload = match self {
            PoolTx::CreatePoolPair(msg) => encode_payload(msg)?,
            PoolTx::AddLiquidity(msg) => encode_payload(msg)?,
            PoolTx::RemoveLiquidity(msg) => encode_payload(msg)?,
            PoolTx::PoolSwap(msg) => encode_payload(msg)?,
        };

        let mut bytes = Vec::with_capacity(HEADER_LEN + payload.len());
        bytes.extend_from_slice(&TX_MARKER);
        bytes.push(self.type_byte());
        bytes.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        bytes.extend_from_slice(&payload);
        Ok(bytes)
    }

    /// Parse the wire form. Trailing bytes after the payload are rejected.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_LEN {
            return Err(LedgerError::InvalidMessage("message too short".to_string()));
        }
        if bytes[0..4] != TX_MARKER {
            return Err(LedgerError::InvalidMessage("invalid marker".to_string()));
        }

        let type_byte = bytes[4];
        let length = u32::from_le_bytes([bytes[5], bytes[6], bytes[7], bytes[8]]) as usize;
        if length > MAX_PAYLOAD_SIZE {
            return Err(LedgerError::InvalidMessage(format!(
                "payload of {} bytes exceeds {}",
                length, MAX_PAYLOAD_SIZE
            )));
        }
        if bytes.len() != HEADER_LEN + length {
            return Err(LedgerError::InvalidMessage(format!(
                "declared {} payload bytes, found {}",
                length,
                bytes.len() - HEADER_LEN
            )));
        }

        let payload = &bytes[HEADER_LEN..];
        match type_byte {
            b'p' => Ok(PoolTx::CreatePoolPair(decode_payload(payload)?)),
            b'l' => Ok(PoolTx::AddLiquidity(decode_payload(payload)?)),
            b'r' => Ok(PoolTx::RemoveLiquidity(decode_payload(payload)?)),
            b's' => Ok(PoolTx::PoolSwap(decode_payload(payload)?)),
            other => Err(LedgerError::InvalidMessage(format!(
                "unknown transaction type 0x{:02x}",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn swap_tx() -> PoolTx {
        PoolTx::PoolSwap(PoolSwapMessage {
            from: Owner::new(b"from".to_vec()),
            to: Owner::new(b"to".to_vec()),
            token_from: TokenId(1),
            token_to: TokenId(2),
            amount_from: 5_000,
            max_price: i64::MAX,
        })
    }

    #[test]
    fn test_header_layout() {
        let bytes = swap_tx().to_bytes().unwrap();
        assert_eq!(&bytes[0..4], b"PsTx");
        assert_eq!(bytes[4], b's');
        let length = u32::from_le_bytes([bytes[5], bytes[6], bytes[7], bytes[8]]) as usize;
        assert_eq!(length, bytes.len() - HEADER_LEN);
    }

    #[test]
    fn test_parse_back() {
        let tx = swap_tx();
        assert_eq!(PoolTx::from_bytes(&tx.to_bytes().unwrap()).unwrap(), tx);
    }

    #[test]
    fn test_small_token_ids_are_compact() {
        let tx = PoolTx::RemoveLiquidity(RemoveLiquidityMessage {
            from: Owner::empty(),
            amount: TokenAmount::new(TokenId(3), 1),
        });
        let bytes = tx.to_bytes().unwrap();
        // empty owner (1) + token id (1) + value (1)
        assert_eq!(bytes.len(), HEADER_LEN + 3);
    }

    #[test]
    fn test_invalid_marker_rejected() {
        let mut bytes = swap_tx().to_bytes().unwrap();
        bytes[0] = 0xFF;
        assert!(matches!(
            PoolTx::from_bytes(&bytes),
            Err(LedgerError::InvalidMessage(_))
        ));
    }

    #[test]
    fn test_oversize_payload_rejected() {
        let mut bytes = swap_tx().to_bytes().unwrap();
        bytes[5..9].copy_from_slice(&((MAX_PAYLOAD_SIZE + 1) as u32).to_le_bytes());
        let err = PoolTx::from_bytes(&bytes).unwrap_err();
        assert!(err.to_string().contains("exceeds"));
    }

    #[test]
    fn test_unknown_type_and_truncation_rejected() {
        let mut bytes = swap_tx().to_bytes().unwrap();
        bytes[4] = b'z';
        assert!(PoolTx::from_bytes(&bytes).is_err());

        let bytes = swap_tx().to_bytes().unwrap();
        assert!(PoolTx::from_bytes(&bytes[..bytes.len() - 1]).is_err());
        assert!(PoolTx::from_bytes(&bytes[..3]).is_err());
    }
}
