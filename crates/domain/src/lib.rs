//! Domain layer for the shop backend.
//!
//! This crate provides the services behind every HTTP operation:
//! - `AccountService` for registration, login, profiles and token checks
//! - `CatalogService` for product CRUD, listing and search
//! - `CartService` for the per-user cart
//! - `CheckoutService` which turns a cart into an immutable order
//! - `OrderHistory` for reading placed orders

pub mod account;
pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod error;
pub mod orders;

pub use account::{AccountService, Claims, LoginToken, Registration, TokenConfig};
pub use cart::{CartService, CartView, CartViewLine};
pub use catalog::{CatalogService, MAX_PRICE, ProductInput, ProductPatch};
pub use checkout::{CheckoutService, ShippingDetails, build_order};
pub use error::{DomainError, Result};
pub use orders::OrderHistory;
