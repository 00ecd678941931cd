//! Pool registry and pool-share ledger

use crate::error::{LedgerError, Result};
use crate::poolpairs::PoolPair;
use crate::primitives::{Owner, TokenId};
use crate::storage::{
    KvRead, KvWrite, PairKey, PoolShareKey, Prefix, Record, TypedRead, TypedWrite,
};

/// Record kind: pool id -> pool pair
pub struct PoolPairs;

impl Record for PoolPairs {
    const PREFIX: Prefix = Prefix::PoolPair;
    type Key = TokenId;
    type Value = PoolPair;
}

/// Record kind: (token a, token b) -> pool id
pub struct PoolPairsByTokens;

impl Record for PoolPairsByTokens {
    const PREFIX: Prefix = Prefix::PoolPairByTokens;
    type Key = PairKey;
    type Value = TokenId;
}

/// Record kind: (pool id, owner) -> presence marker
pub struct PoolShares;

impl Record for PoolShares {
    const PREFIX: Prefix = Prefix::PoolShare;
    type Key = PoolShareKey;
    type Value = ();
}

/// Pool reads
pub trait PoolPairView: KvRead {
    fn get_pool_pair(&self, pool_id: TokenId) -> Result<Option<PoolPair>> {
        self.read_by::<PoolPairs>(&pool_id)
    }

    /// Look a pool up by its tokens in either order
    fn get_pool_pair_by_tokens(
        &self,
        token_a: TokenId,
        token_b: TokenId,
    ) -> Result<Option<(TokenId, PoolPair)>> {
        let pool_id = match self.read_by::<PoolPairsByTokens>(&PairKey { token_a, token_b })? {
            Some(id) => Some(id),
            None => self.read_by::<PoolPairsByTokens>(&PairKey {
                token_a: token_b,
                token_b: token_a,
            })?,
        };
        match pool_id {
            Some(id) => Ok(self.get_pool_pair(id)?.map(|pool| (id, pool))),
            None => Ok(None),
        }
    }

    /// Visit pools in ascending id order starting at `start`
    fn for_each_pool_pair<F>(&self, start: TokenId, mut callback: F) -> Result<()>
    where
        F: FnMut(TokenId, &PoolPair) -> bool,
    {
        self.for_each_by::<PoolPairs, _>(&start, |id, pool| callback(id, &pool))
    }

    /// Visit share markers grouped by pool id, then owner
    fn for_each_pool_share<F>(&self, start: &PoolShareKey, mut callback: F) -> Result<()>
    where
        F: FnMut(TokenId, &Owner) -> bool,
    {
        self.for_each_by::<PoolShares, _>(start, |key, ()| callback(key.pool_id, &key.owner))
    }

    /// One past the highest registered pool id, or `FIRST_POOL_TOKEN_ID`
    fn next_pool_id(&self) -> Result<TokenId> {
        let mut last = None;
        self.for_each_pool_pair(TokenId::FIRST_POOL, |id, _| {
            last = Some(id);
            true
        })?;
        match last {
            Some(id) => id
                .next()
                .ok_or_else(|| LedgerError::InvalidPool("pool id space exhausted".to_string())),
            None => Ok(TokenId::FIRST_POOL),
        }
    }
}

impl<T: KvRead + ?Sized> PoolPairView for T {}

/// Pool writes
pub trait PoolPairViewMut: PoolPairView + KvWrite {
    /// Register a new pool and index it by its token pair
    fn create_pool_pair(&mut self, pool_id: TokenId, pool: &PoolPair) -> Result<()> {
        if !pool_id.is_pool() {
            return Err(LedgerError::InvalidPool(format!(
                "pool id {} is below {}",
                pool_id,
                TokenId::FIRST_POOL
            )));
        }
        if self.get_pool_pair_by_tokens(pool.token_a, pool.token_b)?.is_some() {
            return Err(LedgerError::PoolPairExists {
                token_a: pool.token_a,
                token_b: pool.token_b,
            });
        }
        if self.exists_by::<PoolPairs>(&pool_id)? {
            return Err(LedgerError::PoolIdTaken(pool_id));
        }

        self.set_pool_pair(pool_id, pool)?;
        self.write_by::<PoolPairsByTokens>(
            &PairKey {
                token_a: pool.token_a,
                token_b: pool.token_b,
            },
            &pool_id,
        )?;

        tracing::info!(
            pool_id = %pool_id,
            token_a = %pool.token_a,
            token_b = %pool.token_b,
            commission = pool.commission,
            "Pool pair created"
        );
        Ok(())
    }

    fn set_pool_pair(&mut self, pool_id: TokenId, pool: &PoolPair) -> Result<()> {
        self.write_by::<PoolPairs>(&pool_id, pool)
    }

    fn set_share(&mut self, pool_id: TokenId, owner: &Owner) -> Result<()> {
        self.write_by::<PoolShares>(
            &PoolShareKey {
                pool_id,
                owner: owner.clone(),
            },
            &(),
        )
    }

    fn del_share(&mut self, pool_id: TokenId, owner: &Owner) -> Result<()> {
        self.erase_by::<PoolShares>(&PoolShareKey {
            pool_id,
            owner: owner.clone(),
        })
    }
}

impl<T: KvWrite + ?Sized> PoolPairViewMut for T {}
