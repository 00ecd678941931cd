//! Constant-product pool pair state machine
//!
//! A [`PoolPair`] is loaded from storage, mutated by one operation and
//! written back by the caller. Operations reach outside the pool only
//! through the callbacks they are given:
//!
//! - mint `(to, liquidity, &mut total_liquidity)` credits new liquidity
//!   tokens and must add them to the total,
//! - burn `(from, amount_a, amount_b, &mut total_liquidity)` destroys the
//!   caller's liquidity tokens, reduces the total and pays out both sides,
//! - transfer `(token_amount)` settles swap output.
//!
//! Reserves only change after the callback involved has succeeded.

use crate::constants::{COIN, MINIMUM_LIQUIDITY, MIN_SWAP_RESERVE};
use crate::error::{LedgerError, Result};
use crate::poolpairs::math::{effective_price, isqrt, mul_div, reserve_product, swap_output};
use crate::primitives::{Amount, Owner, TokenAmount, TokenId, TxId};
use serde::{Deserialize, Serialize};

/// Pool pair state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolPair {
    pub token_a: TokenId,
    pub token_b: TokenId,
    /// Share of every swap input kept as trading fee (fraction of COIN)
    pub commission: Amount,
    /// Receiver of the protocol fee, if enabled
    pub owner_fee_address: Option<Owner>,
    /// Trading enabled
    pub status: bool,

    pub reserve_a: Amount,
    pub reserve_b: Amount,
    pub total_liquidity: Amount,

    /// Trading fees accrued since the last reward distribution
    pub block_commission_a: Amount,
    pub block_commission_b: Amount,

    /// reserve_a * reserve_b as of the last protocol fee mint point.
    /// Human-readable formats carry it as a decimal string.
    #[serde(with = "k_last_format")]
    pub k_last: u128,

    /// Share of the yield farming emission (fraction of COIN)
    pub reward_pct: Amount,
    /// A swap happened since the last distribution
    pub swap_event: bool,

    pub creation_tx: TxId,
    pub creation_height: u32,
}

mod k_last_format {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &u128, serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.collect_str(value)
        } else {
            serializer.serialize_u128(*value)
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u128, D::Error> {
        if deserializer.is_human_readable() {
            String::deserialize(deserializer)?.parse().map_err(D::Error::custom)
        } else {
            u128::deserialize(deserializer)
        }
    }
}

/// Result of pricing a swap without executing it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapQuote {
    pub trade_fee: Amount,
    pub amount_out: TokenAmount,
    /// Input base units paid per whole output coin
    pub price: Amount,
}

impl PoolPair {
    /// Empty, trading-enabled pool
    pub fn new(token_a: TokenId, token_b: TokenId) -> Self {
        Self {
            token_a,
            token_b,
            commission: 0,
            owner_fee_address: None,
            status: true,
            reserve_a: 0,
            reserve_b: 0,
            total_liquidity: 0,
            block_commission_a: 0,
            block_commission_b: 0,
            k_last: 0,
            reward_pct: 0,
            swap_event: false,
            creation_tx: TxId::zero(),
            creation_height: 0,
        }
    }

    pub fn contains(&self, token_id: TokenId) -> bool {
        token_id == self.token_a || token_id == self.token_b
    }

    /// Change the protocol fee receiver. Clearing it drops `k_last`.
    pub fn set_owner_fee_address(&mut self, address: Option<Owner>) {
        if address.is_none() {
            self.k_last = 0;
        }
        self.owner_fee_address = address;
    }

    /// Provide liquidity. `amount_a` and `amount_b` must already be
    /// oriented to `token_a` and `token_b`.
    pub fn add_liquidity<F>(
        &mut self,
        amount_a: Amount,
        amount_b: Amount,
        share_address: &Owner,
        mut on_mint: F,
        height: u32,
    ) -> Result<()>
    where
        F: FnMut(&Owner, Amount, &mut Amount) -> Result<()>,
    {
        if amount_a <= 0 || amount_b <= 0 {
            return Err(LedgerError::InvalidLiquidity(
                "amounts should be positive".to_string(),
            ));
        }

        self.mint_fee(&mut on_mint)?;

        let liquidity = if self.total_liquidity == 0 {
            let root = isqrt(reserve_product(amount_a, amount_b)) as i128;
            let liquidity = (root - MINIMUM_LIQUIDITY as i128) as Amount;
            if liquidity <= 0 {
                return Err(LedgerError::InvalidLiquidity(
                    "insufficient liquidity minted".to_string(),
                ));
            }
            // permanently locked, owned by nobody
            self.total_liquidity = MINIMUM_LIQUIDITY;
            liquidity
        } else {
            let liquidity_a = mul_div(amount_a, self.total_liquidity, self.reserve_a);
            let liquidity_b = mul_div(amount_b, self.total_liquidity, self.reserve_b);
            liquidity_a.min(liquidity_b)
        };

        let reserve_a = self
            .reserve_a
            .checked_add(amount_a)
            .ok_or(LedgerError::Overflow { token_id: self.token_a })?;
        let reserve_b = self
            .reserve_b
            .checked_add(amount_b)
            .ok_or(LedgerError::Overflow { token_id: self.token_b })?;

        let minted = on_mint(share_address, liquidity, &mut self.total_liquidity);
        self.settle_mint(minted, share_address, liquidity)?;

        self.reserve_a = reserve_a;
        self.reserve_b = reserve_b;
        if self.owner_fee_address.is_some() {
            self.k_last = reserve_product(self.reserve_a, self.reserve_b);
        }

        tracing::debug!(
            height,
            provider = %share_address,
            liquidity,
            reserve_a = self.reserve_a,
            reserve_b = self.reserve_b,
            "Liquidity added"
        );
        Ok(())
    }

    /// Withdraw `liq_amount` liquidity tokens pro rata from both reserves
    pub fn remove_liquidity<F>(
        &mut self,
        address: &Owner,
        liq_amount: Amount,
        on_burn: F,
        height: u32,
    ) -> Result<()>
    where
        F: FnOnce(&Owner, Amount, Amount, &mut Amount) -> Result<()>,
    {
        if liq_amount <= 0 {
            return Err(LedgerError::RemovingLiquidity(Box::new(
                LedgerError::InvalidLiquidity("amount should be positive".to_string()),
            )));
        }
        if self.total_liquidity <= 0 {
            return Err(LedgerError::RemovingLiquidity(Box::new(
                LedgerError::InvalidLiquidity("pool has no liquidity".to_string()),
            )));
        }

        let amount_a = mul_div(liq_amount, self.reserve_a, self.total_liquidity);
        let amount_b = mul_div(liq_amount, self.reserve_b, self.total_liquidity);

        on_burn(address, amount_a, amount_b, &mut self.total_liquidity)
            .map_err(|e| LedgerError::RemovingLiquidity(Box::new(e)))?;

        self.reserve_a -= amount_a;
        self.reserve_b -= amount_b;

        tracing::debug!(
            height,
            provider = %address,
            liq_amount,
            amount_a,
            amount_b,
            "Liquidity removed"
        );
        Ok(())
    }

    /// Price a swap of `token_in` against the current reserves
    pub fn quote_swap(&self, token_in: TokenAmount) -> Result<SwapQuote> {
        let forward = self.direction(token_in.token_id)?;
        if token_in.value <= 0 {
            return Err(LedgerError::NonPositiveInput);
        }
        if !self.status {
            return Err(LedgerError::TradingDisabled);
        }
        if self.reserve_a < MIN_SWAP_RESERVE || self.reserve_b < MIN_SWAP_RESERVE {
            return Err(LedgerError::LackOfLiquidity);
        }

        let (reserve_from, reserve_to, token_out) = if forward {
            (self.reserve_a, self.reserve_b, self.token_b)
        } else {
            (self.reserve_b, self.reserve_a, self.token_a)
        };

        let trade_fee = mul_div(token_in.value, self.commission, COIN);
        let net_in = token_in.value - trade_fee;
        let amount_out = swap_output(net_in, reserve_from, reserve_to);
        if amount_out <= 0 {
            return Err(LedgerError::ZeroOutput);
        }
        let price = Amount::try_from(effective_price(token_in.value, amount_out))
            .unwrap_or(Amount::MAX);

        Ok(SwapQuote {
            trade_fee,
            amount_out: TokenAmount::new(token_out, amount_out),
            price,
        })
    }

    /// Swap `token_in` for the other pool token.
    ///
    /// Fails without touching the pool when the effective price exceeds
    /// `max_price` or when `on_transfer` fails.
    pub fn swap<F>(&mut self, token_in: TokenAmount, max_price: Amount, on_transfer: F) -> Result<()>
    where
        F: FnOnce(TokenAmount) -> Result<()>,
    {
        let quote = self.quote_swap(token_in)?;
        if quote.price > max_price {
            return Err(LedgerError::PriceExceeded {
                price: quote.price,
                max_price,
            });
        }

        let forward = token_in.token_id == self.token_a;
        let net_in = token_in.value - quote.trade_fee;
        let (reserve_from, reserve_to, commission) = if forward {
            (self.reserve_a, self.reserve_b, self.block_commission_a)
        } else {
            (self.reserve_b, self.reserve_a, self.block_commission_b)
        };
        let overflow = LedgerError::Overflow { token_id: token_in.token_id };
        let reserve_from = reserve_from.checked_add(net_in).ok_or(overflow)?;
        let reserve_to = reserve_to - quote.amount_out.value;
        let commission = commission
            .checked_add(quote.trade_fee)
            .ok_or(LedgerError::Overflow { token_id: token_in.token_id })?;

        on_transfer(quote.amount_out)?;

        if forward {
            self.reserve_a = reserve_from;
            self.reserve_b = reserve_to;
            self.block_commission_a = commission;
        } else {
            self.reserve_b = reserve_from;
            self.reserve_a = reserve_to;
            self.block_commission_b = commission;
        }
        self.swap_event = true;

        tracing::debug!(
            amount_in = %token_in,
            amount_out = %quote.amount_out,
            trade_fee = quote.trade_fee,
            price = quote.price,
            "Pool swap"
        );
        Ok(())
    }

    /// true when `token_id` is token A, false when token B
    fn direction(&self, token_id: TokenId) -> Result<bool> {
        if token_id == self.token_a {
            Ok(true)
        } else if token_id == self.token_b {
            Ok(false)
        } else {
            Err(LedgerError::TokenMismatch(token_id))
        }
    }

    /// Mint the protocol fee: about one sixth of the growth of sqrt(k)
    /// since `k_last`, as liquidity tokens to the fee address.
    fn mint_fee<F>(&mut self, on_mint: &mut F) -> Result<()>
    where
        F: FnMut(&Owner, Amount, &mut Amount) -> Result<()>,
    {
        let fee_address = match &self.owner_fee_address {
            Some(address) => address.clone(),
            None => {
                self.k_last = 0;
                return Ok(());
            }
        };
        if self.k_last == 0 {
            return Ok(());
        }

        let root_k = isqrt(reserve_product(self.reserve_a, self.reserve_b));
        let root_k_last = isqrt(self.k_last);
        if root_k > root_k_last {
            let numerator = self.total_liquidity as u128 * (root_k - root_k_last);
            let denominator = root_k * 5 + root_k_last;
            let liquidity = (numerator / denominator) as Amount;
            if liquidity > 0 {
                let minted = on_mint(&fee_address, liquidity, &mut self.total_liquidity);
                self.settle_mint(minted, &fee_address, liquidity)?;
            }
        }
        Ok(())
    }

    #[cfg(not(feature = "strict-mint"))]
    fn settle_mint(&self, minted: Result<()>, to: &Owner, liquidity: Amount) -> Result<()> {
        if let Err(err) = minted {
            tracing::warn!(to = %to, liquidity, error = %err, "Ignoring failed liquidity mint");
        }
        Ok(())
    }

    #[cfg(feature = "strict-mint")]
    fn settle_mint(&self, minted: Result<()>, to: &Owner, liquidity: Amount) -> Result<()> {
        minted.map_err(|err| {
            tracing::warn!(to = %to, liquidity, error = %err, "Liquidity mint failed");
            LedgerError::MintingLiquidity(Box::new(err))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> Owner {
        Owner::new(b"provider".to_vec())
    }

    fn funded_pool(reserve_a: Amount, reserve_b: Amount, total: Amount) -> PoolPair {
        let mut pool = PoolPair::new(TokenId(1), TokenId(2));
        pool.reserve_a = reserve_a;
        pool.reserve_b = reserve_b;
        pool.total_liquidity = total;
        pool
    }

    #[test]
    fn test_bootstrap_locks_minimum_liquidity() {
        let mut pool = PoolPair::new(TokenId(1), TokenId(2));
        let mut minted = Vec::new();

        pool.add_liquidity(
            1_000_000,
            1_000_000,
            &provider(),
            |to, amount, total| {
                assert_eq!(*total, MINIMUM_LIQUIDITY);
                minted.push((to.clone(), amount));
                *total += amount;
                Ok(())
            },
            1,
        )
        .unwrap();

        assert_eq!(minted, vec![(provider(), 999_000)]);
        assert_eq!(pool.total_liquidity, 1_000_000);
        assert_eq!((pool.reserve_a, pool.reserve_b), (1_000_000, 1_000_000));
        assert_eq!(pool.k_last, 0);
    }

    #[test]
    fn test_empty_or_dust_deposit_rejected() {
        let mut pool = PoolPair::new(TokenId(1), TokenId(2));
        let mut mints = 0;

        for (a, b) in [(0, 1_000_000), (1_000_000, -1), (1000, 1000)] {
            let result = pool.add_liquidity(
                a,
                b,
                &provider(),
                |_, _, _| {
                    mints += 1;
                    Ok(())
                },
                1,
            );
            assert!(matches!(result, Err(LedgerError::InvalidLiquidity(_))));
        }

        assert_eq!(mints, 0);
        assert_eq!(pool, PoolPair::new(TokenId(1), TokenId(2)));
    }

    #[test]
    fn test_proportional_add_takes_minimum() {
        let mut pool = funded_pool(1000, 2000, 100);
        let mut minted = 0;

        pool.add_liquidity(
            100,
            200,
            &provider(),
            |_, amount, total| {
                minted = amount;
                *total += amount;
                Ok(())
            },
            1,
        )
        .unwrap();

        assert_eq!(minted, 10);
        assert_eq!(pool.total_liquidity, 110);
        assert_eq!((pool.reserve_a, pool.reserve_b), (1100, 2200));
    }

    #[cfg(not(feature = "strict-mint"))]
    #[test]
    fn test_failed_mint_is_ignored() {
        let mut pool = funded_pool(1000, 1000, 1000);
        pool.add_liquidity(
            10,
            10,
            &provider(),
            |_, _, _| Err(LedgerError::Storage("down".to_string())),
            1,
        )
        .unwrap();
        assert_eq!(pool.reserve_a, 1010);
        assert_eq!(pool.total_liquidity, 1000);
    }

    #[cfg(feature = "strict-mint")]
    #[test]
    fn test_failed_mint_is_propagated() {
        let mut pool = funded_pool(1000, 1000, 1000);
        let result = pool.add_liquidity(
            10,
            10,
            &provider(),
            |_, _, _| Err(LedgerError::Storage("down".to_string())),
            1,
        );
        assert!(matches!(result, Err(LedgerError::MintingLiquidity(_))));
        assert_eq!(pool.reserve_a, 1000);
    }

    #[test]
    fn test_k_last_tracks_reserves_with_fee_address() {
        let mut pool = PoolPair::new(TokenId(1), TokenId(2));
        pool.set_owner_fee_address(Some(Owner::new(b"fees".to_vec())));
        pool.add_liquidity(4000, 9000, &provider(), |_, amount, total| {
            *total += amount;
            Ok(())
        }, 1)
        .unwrap();
        assert_eq!(pool.k_last, 4000 * 9000);

        pool.set_owner_fee_address(None);
        assert_eq!(pool.k_last, 0);
    }

    #[test]
    fn test_protocol_fee_minted_on_growth() {
        let fee_address = Owner::new(b"fees".to_vec());
        let mut pool = funded_pool(2_000_000, 2_000_000, 2_000_000);
        pool.owner_fee_address = Some(fee_address.clone());
        // sqrt(k) grew from 1_000_000 to 2_000_000
        pool.k_last = 1_000_000u128 * 1_000_000;

        let mut mints = Vec::new();
        pool.add_liquidity(1000, 1000, &provider(), |to, amount, total| {
            mints.push((to.clone(), amount));
            *total += amount;
            Ok(())
        }, 1)
        .unwrap();

        // 2_000_000 * 1_000_000 / (2_000_000 * 5 + 1_000_000)
        assert_eq!(mints[0], (fee_address, 181_818));
        assert_eq!(mints[1].0, provider());
        assert_eq!(pool.k_last, 2_001_000u128 * 2_001_000);
    }

    #[test]
    fn test_large_k_last_in_json_and_bincode() {
        let mut pool = funded_pool(100 * COIN, 100 * COIN, 100 * COIN);
        pool.owner_fee_address = Some(Owner::new(b"fees".to_vec()));
        pool.k_last = reserve_product(100 * COIN, 100 * COIN);

        let json = serde_json::to_string(&pool).unwrap();
        assert!(json.contains("\"k_last\":\"100000000000000000000\""));
        assert_eq!(serde_json::from_str::<PoolPair>(&json).unwrap(), pool);

        let bytes = bincode::serialize(&pool).unwrap();
        assert_eq!(bincode::deserialize::<PoolPair>(&bytes).unwrap(), pool);
    }

    #[test]
    fn test_remove_liquidity_pays_pro_rata() {
        let mut pool = funded_pool(1000, 2000, 100);
        let mut paid = (0, 0);

        pool.remove_liquidity(&provider(), 10, |_, a, b, total| {
            paid = (a, b);
            *total -= 10;
            Ok(())
        }, 1)
        .unwrap();

        assert_eq!(paid, (100, 200));
        assert_eq!((pool.reserve_a, pool.reserve_b, pool.total_liquidity), (900, 1800, 90));
    }

    #[test]
    fn test_failed_burn_leaves_reserves() {
        let mut pool = funded_pool(1000, 2000, 100);
        let result = pool.remove_liquidity(&provider(), 10, |_, _, _, _| {
            Err(LedgerError::InsufficientFunds {
                token_id: TokenId(3),
                available: 0,
                required: 10,
            })
        }, 1);

        let err = result.unwrap_err();
        assert!(err.to_string().starts_with("removing liquidity: Insufficient funds"));
        assert_eq!((pool.reserve_a, pool.reserve_b), (1000, 2000));
    }

    #[test]
    fn test_swap_moves_reserves_and_fees() {
        let mut pool = funded_pool(1_000_000, 1_000_000, 1_000_000);
        pool.commission = COIN / 100; // 1%

        let mut received = None;
        pool.swap(TokenAmount::new(TokenId(1), 10_000), Amount::MAX, |out| {
            received = Some(out);
            Ok(())
        })
        .unwrap();

        // net 9_900 in: 1_000_000 * 9_900 / 1_009_900
        let out = received.unwrap();
        assert_eq!(out, TokenAmount::new(TokenId(2), 9_802));
        assert_eq!(pool.reserve_a, 1_009_900);
        assert_eq!(pool.reserve_b, 1_000_000 - 9_802);
        assert_eq!(pool.block_commission_a, 100);
        assert!(pool.swap_event);
    }

    #[test]
    fn test_swap_price_bound_is_atomic() {
        let mut pool = funded_pool(1_000_000, 1_000_000, 1_000_000);
        let before = pool.clone();

        let result = pool.swap(TokenAmount::new(TokenId(1), 500_000), COIN, |_| {
            panic!("transfer must not run");
        });
        assert!(matches!(result, Err(LedgerError::PriceExceeded { .. })));
        assert_eq!(pool, before);
    }

    #[test]
    fn test_swap_failed_transfer_is_atomic() {
        let mut pool = funded_pool(1_000_000, 1_000_000, 1_000_000);
        let before = pool.clone();
        let result = pool.swap(TokenAmount::new(TokenId(2), 1000), Amount::MAX, |_| {
            Err(LedgerError::Storage("down".to_string()))
        });
        assert!(result.is_err());
        assert_eq!(pool, before);
    }

    #[test]
    fn test_swap_rejections() {
        let mut pool = funded_pool(1_000_000, 1_000_000, 1_000_000);
        let ok = |_: TokenAmount| -> Result<()> { Ok(()) };

        assert!(matches!(
            pool.swap(TokenAmount::new(TokenId(9), 10), Amount::MAX, ok),
            Err(LedgerError::TokenMismatch(TokenId(9)))
        ));
        assert!(matches!(
            pool.swap(TokenAmount::new(TokenId(1), 0), Amount::MAX, ok),
            Err(LedgerError::NonPositiveInput)
        ));

        pool.status = false;
        assert!(matches!(
            pool.swap(TokenAmount::new(TokenId(1), 10), Amount::MAX, ok),
            Err(LedgerError::TradingDisabled)
        ));

        let mut shallow = funded_pool(999, 1_000_000, 1000);
        assert!(matches!(
            shallow.swap(TokenAmount::new(TokenId(1), 10), Amount::MAX, ok),
            Err(LedgerError::LackOfLiquidity)
        ));
    }
}
