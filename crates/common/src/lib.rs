//! Shared value types used across the shop crates.

pub mod money;
pub mod types;

pub use money::Money;
pub use types::{CartId, OrderId, ProductId, UserId};
