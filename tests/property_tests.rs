//! Property-based tests for the ledger core
//!
//! These tests verify balance and pool invariants under random inputs.

use proptest::prelude::*;
use poolswap_core::accounts::{BalancesView, BalancesViewMut};
use poolswap_core::constants::{COIN, MINIMUM_LIQUIDITY};
use poolswap_core::poolpairs::{
    distribute_rewards, pool_reward, PoolPair, PoolPairView, PoolPairViewMut,
};
use poolswap_core::primitives::{Amount, Owner, TokenAmount, TokenId};
use poolswap_core::storage::MemoryStore;

fn owner_strategy() -> impl Strategy<Value = Owner> {
    prop::collection::vec(any::<u8>(), 0..24).prop_map(Owner::new)
}

fn pool(reserve_a: Amount, reserve_b: Amount, total: Amount) -> PoolPair {
    let mut pool = PoolPair::new(TokenId(1), TokenId(2));
    pool.reserve_a = reserve_a;
    pool.reserve_b = reserve_b;
    pool.total_liquidity = total;
    pool
}

// ============================================================================
// BALANCES
// ============================================================================

proptest! {
    /// Whatever is stored reads back unchanged, including owners with zero bytes
    #[test]
    fn prop_balance_roundtrip(
        who in owner_strategy(),
        token in any::<u32>(),
        value in 0i64..i64::MAX
    ) {
        let mut store = MemoryStore::new();
        store.set_balance(&who, TokenAmount::new(TokenId(token), value)).unwrap();
        prop_assert_eq!(store.get_balance(&who, TokenId(token)).unwrap().value, value);
        prop_assert_eq!(store.is_empty(), value == 0);
    }

    /// Adding then subtracting the same amount restores the balance
    #[test]
    fn prop_add_sub_identity(
        who in owner_strategy(),
        start in 0i64..1_000_000_000_000,
        delta in 0i64..1_000_000_000_000
    ) {
        let mut store = MemoryStore::new();
        let token = TokenId(7);
        store.set_balance(&who, TokenAmount::new(token, start)).unwrap();

        store.add_balance(&who, TokenAmount::new(token, delta)).unwrap();
        store.sub_balance(&who, TokenAmount::new(token, delta)).unwrap();

        prop_assert_eq!(store.get_balance(&who, token).unwrap().value, start);
    }

    /// A failed subtraction never changes the stored balance
    #[test]
    fn prop_overdraft_rejected(
        start in 0i64..1_000_000,
        extra in 1i64..1_000_000
    ) {
        let who = Owner::new(b"who".to_vec());
        let mut store = MemoryStore::new();
        store.set_balance(&who, TokenAmount::new(TokenId(1), start)).unwrap();

        prop_assert!(store.sub_balance(&who, TokenAmount::new(TokenId(1), start + extra)).is_err());
        prop_assert_eq!(store.get_balance(&who, TokenId(1)).unwrap().value, start);
    }
}

// ============================================================================
// POOLS
// ============================================================================

proptest! {
    /// Removing freshly minted liquidity never pays out more than was put in,
    /// so the pool never loses reserves through an add/remove cycle
    #[test]
    fn prop_remove_after_add_never_profits(
        reserve_a in 1_000_000i64..1_000_000_000_000,
        reserve_b in 1_000_000i64..1_000_000_000_000,
        total in 1_000_000i64..1_000_000_000_000,
        amount_a in 1_000i64..1_000_000_000,
        amount_b in 1_000i64..1_000_000_000
    ) {
        let mut pool = pool(reserve_a, reserve_b, total);
        let provider = Owner::new(b"lp".to_vec());

        let mut minted = 0;
        pool.add_liquidity(amount_a, amount_b, &provider, |_, liquidity, total| {
            minted = liquidity;
            *total += liquidity;
            Ok(())
        }, 1).unwrap();
        prop_assume!(minted > 0);

        let mut paid = (0, 0);
        pool.remove_liquidity(&provider, minted, |_, a, b, total| {
            paid = (a, b);
            *total -= minted;
            Ok(())
        }, 2).unwrap();

        prop_assert!(paid.0 <= amount_a);
        prop_assert!(paid.1 <= amount_b);
        prop_assert!(pool.reserve_a >= reserve_a);
        prop_assert!(pool.reserve_b >= reserve_b);
        prop_assert_eq!(pool.total_liquidity, total);
    }

    /// Larger trades get a worse price and a larger output
    #[test]
    fn prop_price_monotonic_in_size(
        reserve_a in 500_000_000_000i64..2_000_000_000_000,
        reserve_b in 500_000_000_000i64..2_000_000_000_000,
        amount in 100_000_000i64..10_000_000_000,
        commission in 0i64..COIN / 100
    ) {
        let mut pool = pool(reserve_a, reserve_b, 1_000_000);
        pool.commission = commission;

        let small = pool.quote_swap(TokenAmount::new(TokenId(1), amount)).unwrap();
        let large = pool.quote_swap(TokenAmount::new(TokenId(1), amount * 2)).unwrap();

        prop_assert!(large.price >= small.price);
        prop_assert!(large.amount_out.value > small.amount_out.value);
        prop_assert!(large.amount_out.value < reserve_b);
    }

    /// A swap keeps the reserve product from shrinking
    #[test]
    fn prop_swap_keeps_product(
        reserve_a in 1_000_000i64..1_000_000_000_000,
        reserve_b in 1_000_000i64..1_000_000_000_000,
        amount in 1_000i64..1_000_000_000
    ) {
        let mut pool = pool(reserve_a, reserve_b, 1_000_000);
        let before = reserve_a as u128 * reserve_b as u128;

        let swapped = pool.swap(TokenAmount::new(TokenId(2), amount), Amount::MAX, |_| Ok(()));
        prop_assume!(swapped.is_ok());

        let after = pool.reserve_a as u128 * pool.reserve_b as u128;
        prop_assert!(after >= before);
    }

    /// Providers never receive more than the pool's share of the emission
    #[test]
    fn prop_rewards_bounded(
        liquidities in prop::collection::vec(1i64..1_000_000_000, 1..8),
        yield_farming in 0i64..100 * COIN,
        reward_pct in 0i64..=COIN
    ) {
        let mut store = MemoryStore::new();
        let pool_id = TokenId::FIRST_POOL;
        let total: Amount = liquidities.iter().sum::<Amount>() + MINIMUM_LIQUIDITY;

        let mut pool = pool(10_000, 10_000, total);
        pool.reward_pct = reward_pct;
        store.create_pool_pair(pool_id, &pool).unwrap();
        for (i, liquidity) in liquidities.iter().enumerate() {
            let provider = Owner::new(vec![i as u8]);
            store.set_share(pool_id, &provider).unwrap();
            store.set_balance(&provider, TokenAmount::new(pool_id, *liquidity)).unwrap();
        }

        let distributed = distribute_rewards(
            &mut store,
            yield_farming,
            |s, who, token| s.get_balance(who, token),
            |s, who, amount| s.add_balance(who, amount),
        ).unwrap();

        let mut received = 0;
        for i in 0..liquidities.len() {
            received += store.get_balance(&Owner::new(vec![i as u8]), TokenId::NATIVE).unwrap().value;
        }
        prop_assert_eq!(received, distributed);
        prop_assert!(distributed <= pool_reward(yield_farming, reward_pct));
    }

    /// Fees paid out in a cycle never exceed the commission collected before it,
    /// and whatever was paid is taken off the pool's commission
    #[test]
    fn prop_fees_bounded_by_commission(
        liquidities in prop::collection::vec(1i64..1_000_000_000, 1..8),
        commission_a in 0i64..1_000_000_000_000,
        commission_b in 0i64..1_000_000_000_000
    ) {
        let mut store = MemoryStore::new();
        let pool_id = TokenId::FIRST_POOL;
        let total: Amount = liquidities.iter().sum::<Amount>() + MINIMUM_LIQUIDITY;

        let mut pool = pool(10_000, 10_000, total);
        pool.block_commission_a = commission_a;
        pool.block_commission_b = commission_b;
        pool.swap_event = true;
        store.create_pool_pair(pool_id, &pool).unwrap();
        for (i, liquidity) in liquidities.iter().enumerate() {
            let provider = Owner::new(vec![i as u8]);
            store.set_share(pool_id, &provider).unwrap();
            store.set_balance(&provider, TokenAmount::new(pool_id, *liquidity)).unwrap();
        }

        let distributed = distribute_rewards(
            &mut store,
            0,
            |s, who, token| s.get_balance(who, token),
            |s, who, amount| s.add_balance(who, amount),
        ).unwrap();
        prop_assert_eq!(distributed, 0);

        let (mut paid_a, mut paid_b) = (0, 0);
        for i in 0..liquidities.len() {
            let provider = Owner::new(vec![i as u8]);
            paid_a += store.get_balance(&provider, TokenId(1)).unwrap().value;
            paid_b += store.get_balance(&provider, TokenId(2)).unwrap().value;
        }
        prop_assert!(paid_a <= commission_a);
        prop_assert!(paid_b <= commission_b);

        let pool = store.get_pool_pair(pool_id).unwrap().unwrap();
        prop_assert_eq!(pool.block_commission_a, commission_a - paid_a);
        prop_assert_eq!(pool.block_commission_b, commission_b - paid_b);
        prop_assert!(!pool.swap_event);
    }
}
