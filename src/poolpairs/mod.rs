//! Pool pairs - constant-product pools, their registry and reward payout

pub mod math;
mod pool;
mod rewards;
mod view;

pub use pool::*;
pub use rewards::*;
pub use view::*;
