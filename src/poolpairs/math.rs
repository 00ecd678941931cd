//! Wide-integer pool arithmetic
//!
//! Amounts are `i64`; every product is formed in 128 bits before dividing.
//! Narrowing back to `i64` after a division truncates silently, matching
//! consensus behaviour.

use crate::constants::COIN;
use crate::primitives::Amount;

/// Floor of the square root (Newton iteration)
pub fn isqrt(n: u128) -> u128 {
    if n < 2 {
        return n;
    }
    let bits = 128 - n.leading_zeros();
    let mut x = 1u128 << ((bits + 1) / 2);
    loop {
        let y = (x + n / x) / 2;
        if y >= x {
            return x;
        }
        x = y;
    }
}

/// `a * b / c` with a 128-bit intermediate, truncated to an amount.
/// `c` must be non-zero.
pub fn mul_div(a: Amount, b: Amount, c: Amount) -> Amount {
    (a as i128 * b as i128 / c as i128) as Amount
}

/// Product of two non-negative reserves
pub fn reserve_product(reserve_a: Amount, reserve_b: Amount) -> u128 {
    reserve_a as u128 * reserve_b as u128
}

/// Constant-product output for `amount_in` entering `reserve_from`
pub fn swap_output(amount_in: Amount, reserve_from: Amount, reserve_to: Amount) -> Amount {
    let amount_in = amount_in as i128;
    (reserve_to as i128 * amount_in / (reserve_from as i128 + amount_in)) as Amount
}

/// Price paid per whole output coin, in input base units.
/// `amount_out` must be positive.
pub fn effective_price(amount_in: Amount, amount_out: Amount) -> i128 {
    amount_in as i128 * COIN as i128 / amount_out as i128
}
