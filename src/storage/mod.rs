//! Storage module - ordered key-value providers, overlays and typed records

mod codec;
pub mod db;
mod kv;
mod memory;
mod overlay;

pub use codec::*;
pub use db::SledStore;
pub use kv::*;
pub use memory::*;
pub use overlay::*;
