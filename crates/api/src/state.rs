//! Shared application state.

use domain::{
    AccountService, CartService, CatalogService, CheckoutService, OrderHistory, TokenConfig,
};
use store::Store;

use crate::config::AuthMode;

/// Shared application state accessible from all handlers.
pub struct AppState<S> {
    pub accounts: AccountService<S>,
    pub catalog: CatalogService<S>,
    pub cart: CartService<S>,
    pub checkout: CheckoutService<S>,
    pub orders: OrderHistory<S>,
    pub auth_mode: AuthMode,
}

impl<S: Store + Clone> AppState<S> {
    /// Builds every service over one store handle.
    pub fn new(store: S, tokens: TokenConfig, auth_mode: AuthMode) -> Self {
        Self {
            accounts: AccountService::new(store.clone(), tokens),
            catalog: CatalogService::new(store.clone()),
            cart: CartService::new(store.clone()),
            checkout: CheckoutService::new(store.clone()),
            orders: OrderHistory::new(store),
            auth_mode,
        }
    }
}
