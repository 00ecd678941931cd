//! Pool transactions - messages, wire form and application

mod apply;
mod messages;

pub use apply::*;
pub use messages::*;
