//! Per-block reward distribution
//!
//! Every block, each pool's share of the yield farming emission and the
//! trading fees it collected are paid out to liquidity providers in
//! proportion to their liquidity token balance.

use crate::constants::{COIN, REWARD_PRECISION};
use crate::error::{LedgerError, Result};
use crate::poolpairs::{PoolPair, PoolPairView, PoolPairViewMut};
use crate::primitives::{Amount, Owner, TokenAmount, TokenId};
use crate::storage::PoolShareKey;

/// Pool's share of the per-block emission
pub fn pool_reward(yield_farming: Amount, reward_pct: Amount) -> Amount {
    (yield_farming as i128 * reward_pct as i128 / COIN as i128) as Amount
}

/// Provider weight in units of `REWARD_PRECISION`
fn provider_weight(liquidity: Amount, total_liquidity: Amount) -> i128 {
    liquidity as i128 * REWARD_PRECISION as i128 / total_liquidity as i128
}

fn scale(amount: Amount, weight: i128) -> Amount {
    (amount as i128 * weight / REWARD_PRECISION as i128) as Amount
}

/// Distribute rewards and trading fees of every pool.
///
/// `get_balance` returns an owner's liquidity token balance and `transfer`
/// credits an owner; both get the store so they can work on it directly.
/// Returns the total yield farming paid out.
///
/// A failed transfer aborts the cycle without undoing earlier payouts, so
/// callers run this inside an overlay. [`LedgerError::RewardWeight`] and
/// [`LedgerError::PoolUpdate`] are fatal.
pub fn distribute_rewards<S, G, T>(
    store: &mut S,
    yield_farming: Amount,
    mut get_balance: G,
    mut transfer: T,
) -> Result<Amount>
where
    S: PoolPairViewMut,
    G: FnMut(&S, &Owner, TokenId) -> Result<TokenAmount>,
    T: FnMut(&mut S, &Owner, TokenAmount) -> Result<()>,
{
    let mut pools: Vec<(TokenId, PoolPair)> = Vec::new();
    store.for_each_pool_pair(TokenId(0), |id, pool| {
        pools.push((id, pool.clone()));
        true
    })?;

    let mut distributed: Amount = 0;
    let mut rewarded_pools = 0usize;

    for (pool_id, mut pool) in pools {
        let reward = pool_reward(yield_farming, pool.reward_pct);
        if !pool.swap_event && reward == 0 {
            continue;
        }
        if pool.total_liquidity <= 0 {
            continue;
        }

        let mut owners = Vec::new();
        let start = PoolShareKey {
            pool_id,
            owner: Owner::empty(),
        };
        store.for_each_pool_share(&start, |id, owner| {
            if id != pool_id {
                return false;
            }
            owners.push(owner.clone());
            true
        })?;

        let mut distributed_fee_a: Amount = 0;
        let mut distributed_fee_b: Amount = 0;

        for owner in &owners {
            let liquidity = get_balance(&*store, owner, pool_id)?.value;
            let weight = provider_weight(liquidity, pool.total_liquidity);
            if weight >= REWARD_PRECISION as i128 {
                let err = LedgerError::RewardWeight {
                    pool_id,
                    owner: owner.clone(),
                    weight: weight as i64,
                };
                tracing::error!(error = %err, "Reward distribution aborted");
                return Err(err);
            }

            if pool.swap_event {
                let fee_a = scale(pool.block_commission_a, weight);
                let fee_b = scale(pool.block_commission_b, weight);
                if fee_a != 0 {
                    transfer(&mut *store, owner, TokenAmount::new(pool.token_a, fee_a))?;
                    distributed_fee_a += fee_a;
                }
                if fee_b != 0 {
                    transfer(&mut *store, owner, TokenAmount::new(pool.token_b, fee_b))?;
                    distributed_fee_b += fee_b;
                }
            }

            if reward > 0 {
                let provider_reward = scale(reward, weight);
                if provider_reward != 0 {
                    transfer(&mut *store, owner, TokenAmount::new(TokenId::NATIVE, provider_reward))?;
                    distributed += provider_reward;
                }
            }
        }

        pool.block_commission_a -= distributed_fee_a;
        pool.block_commission_b -= distributed_fee_b;
        pool.swap_event = false;

        if let Err(source) = store.set_pool_pair(pool_id, &pool) {
            let err = LedgerError::PoolUpdate {
                pool_id,
                source: Box::new(source),
            };
            tracing::error!(error = %err, "Reward distribution aborted");
            return Err(err);
        }
        rewarded_pools += 1;
    }

    tracing::info!(
        yield_farming,
        distributed,
        pools = rewarded_pools,
        "Pool rewards distributed"
    );
    Ok(distributed)
}
