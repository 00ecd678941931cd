//! Applying pool transactions to a store
//!
//! The `apply_*` functions write straight into the store they are given and
//! may leave partial writes behind on error, so they are meant to run
//! against a transaction overlay. [`process_pool_tx`] wraps that pattern:
//! one overlay per transaction, history tracked on success, discarded on
//! failure.

use crate::accounts::{BalancesView, BalancesViewMut};
use crate::constants::COIN;
use crate::error::{LedgerError, Result};
use crate::poolpairs::{PoolPair, PoolPairView, PoolPairViewMut};
use crate::primitives::{Amount, Balances, TokenAmount, TokenId, TxId};
use crate::storage::{KvRead, KvWrite, Overlay};
use crate::txs::{
    CreatePoolPairMessage, LiquidityMessage, PoolSwapMessage, PoolTx, RemoveLiquidityMessage,
};

/// Position of a transaction in the chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxContext {
    pub height: u32,
    /// Index within the block
    pub txn: u32,
    pub txid: TxId,
}

/// Apply one pool transaction to `store`
pub fn apply_pool_tx<S: KvRead + KvWrite>(store: &mut S, tx: &PoolTx, ctx: &TxContext) -> Result<()> {
    tracing::debug!(
        kind = tx.name(),
        height = ctx.height,
        txn = ctx.txn,
        txid = %ctx.txid,
        "Applying pool transaction"
    );
    match tx {
        PoolTx::CreatePoolPair(msg) => apply_create_pool_pair(store, msg, ctx).map(|_| ()),
        PoolTx::AddLiquidity(msg) => apply_add_liquidity(store, msg, ctx),
        PoolTx::RemoveLiquidity(msg) => apply_remove_liquidity(store, msg, ctx),
        PoolTx::PoolSwap(msg) => apply_pool_swap(store, msg, ctx),
    }
}

/// Apply `tx` in its own overlay on top of `block`.
///
/// On success the account history of the transaction is recorded and
/// everything is flushed into `block`; on failure `block` is untouched.
pub fn process_pool_tx<B: KvRead + KvWrite>(block: &mut B, tx: &PoolTx, ctx: &TxContext) -> Result<bool> {
    let mut overlay = Overlay::new(&mut *block);
    if let Err(err) = apply_pool_tx(&mut overlay, tx, ctx) {
        tracing::debug!(kind = tx.name(), txid = %ctx.txid, error = %err, "Pool transaction rejected");
        overlay.discard();
        return Err(err);
    }
    let tracked = overlay.track_affected_accounts(ctx.height, ctx.txn, &ctx.txid)?;
    overlay.flush()?;
    Ok(tracked)
}

/// Create a pool under the next free id and return that id
pub fn apply_create_pool_pair<S: KvRead + KvWrite>(
    store: &mut S,
    msg: &CreatePoolPairMessage,
    ctx: &TxContext,
) -> Result<TokenId> {
    if msg.token_a == msg.token_b {
        return Err(LedgerError::InvalidPool("tokens must differ".to_string()));
    }
    if !(0..=COIN).contains(&msg.commission) {
        return Err(LedgerError::InvalidPool(format!(
            "commission {} out of range",
            msg.commission
        )));
    }
    if !(0..=COIN).contains(&msg.reward_pct) {
        return Err(LedgerError::InvalidPool(format!(
            "reward pct {} out of range",
            msg.reward_pct
        )));
    }

    let mut pool = PoolPair::new(msg.token_a, msg.token_b);
    pool.commission = msg.commission;
    pool.status = msg.status;
    pool.reward_pct = msg.reward_pct;
    pool.set_owner_fee_address(msg.owner_fee_address.clone());
    pool.creation_tx = ctx.txid;
    pool.creation_height = ctx.height;

    let pool_id = store.next_pool_id()?;
    store.create_pool_pair(pool_id, &pool)?;
    Ok(pool_id)
}

pub fn apply_add_liquidity<S: KvRead + KvWrite>(
    store: &mut S,
    msg: &LiquidityMessage,
    ctx: &TxContext,
) -> Result<()> {
    let mut sum = Balances::new();
    for (owner, balances) in &msg.from {
        store.sub_balances(owner, balances)?;
        sum.add_all(balances)?;
    }

    let mut amounts = sum.iter();
    let (first, second) = match (amounts.next(), amounts.next(), amounts.next()) {
        (Some(first), Some(second), None) => (first, second),
        _ => {
            return Err(LedgerError::InvalidLiquidity(
                "exactly two tokens should be provided".to_string(),
            ))
        }
    };
    if first.value <= 0 || second.value <= 0 {
        return Err(LedgerError::InvalidLiquidity(
            "amounts should be positive".to_string(),
        ));
    }

    let (pool_id, mut pool) = store
        .get_pool_pair_by_tokens(first.token_id, second.token_id)?
        .ok_or_else(|| {
            LedgerError::InvalidPool(format!(
                "no pool for tokens {}/{}",
                first.token_id, second.token_id
            ))
        })?;
    let (amount_a, amount_b) = if first.token_id == pool.token_a {
        (first.value, second.value)
    } else {
        (second.value, first.value)
    };

    pool.add_liquidity(
        amount_a,
        amount_b,
        &msg.share_address,
        |to, liquidity, total| {
            store.add_balance(to, TokenAmount::new(pool_id, liquidity))?;
            store.set_share(pool_id, to)?;
            *total = total
                .checked_add(liquidity)
                .ok_or(LedgerError::Overflow { token_id: pool_id })?;
            Ok(())
        },
        ctx.height,
    )?;

    store.set_pool_pair(pool_id, &pool)
}

pub fn apply_remove_liquidity<S: KvRead + KvWrite>(
    store: &mut S,
    msg: &RemoveLiquidityMessage,
    ctx: &TxContext,
) -> Result<()> {
    let pool_id = msg.amount.token_id;
    if !pool_id.is_pool() {
        return Err(LedgerError::InvalidPool(format!(
            "token {} is not a liquidity token",
            pool_id
        )));
    }
    let mut pool = store
        .get_pool_pair(pool_id)?
        .ok_or(LedgerError::PoolNotFound(pool_id))?;

    let (token_a, token_b) = (pool.token_a, pool.token_b);
    let liq_amount: Amount = msg.amount.value;

    pool.remove_liquidity(
        &msg.from,
        liq_amount,
        |from, amount_a, amount_b, total| {
            store.sub_balance(from, TokenAmount::new(pool_id, liq_amount))?;
            *total -= liq_amount;
            store.add_balance(from, TokenAmount::new(token_a, amount_a))?;
            store.add_balance(from, TokenAmount::new(token_b, amount_b))?;
            if store.get_balance(from, pool_id)?.value == 0 {
                store.del_share(pool_id, from)?;
            }
            Ok(())
        },
        ctx.height,
    )?;

    store.set_pool_pair(pool_id, &pool)
}

pub fn apply_pool_swap<S: KvRead + KvWrite>(
    store: &mut S,
    msg: &PoolSwapMessage,
    _ctx: &TxContext,
) -> Result<()> {
    let (pool_id, mut pool) = store
        .get_pool_pair_by_tokens(msg.token_from, msg.token_to)?
        .ok_or_else(|| {
            LedgerError::InvalidPool(format!(
                "no pool for tokens {}/{}",
                msg.token_from, msg.token_to
            ))
        })?;

    store.sub_balance(&msg.from, TokenAmount::new(msg.token_from, msg.amount_from))?;
    pool.swap(
        TokenAmount::new(msg.token_from, msg.amount_from),
        msg.max_price,
        |amount_out| store.add_balance(&msg.to, amount_out),
    )?;

    store.set_pool_pair(pool_id, &pool)
}
