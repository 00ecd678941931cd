//! Primitive types - token amounts, owners and transaction ids

mod amount;
mod ids;

pub use amount::*;
pub use ids::*;
