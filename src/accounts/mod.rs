//! Accounts module - token balances and account history

mod balances;
mod history;

pub use balances::*;
pub use history::*;
