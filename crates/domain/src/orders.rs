//! Order history.

use common::UserId;
use store::{Order, Store};

use crate::error::Result;

/// Read-only access to a user's placed orders.
#[derive(Debug, Clone)]
pub struct OrderHistory<S> {
    store: S,
}

impl<S: Store> OrderHistory<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Lists the user's orders oldest first, each with its captured lines.
    #[tracing::instrument(skip(self))]
    pub async fn list_orders(&self, user_id: UserId) -> Result<Vec<Order>> {
        Ok(self.store.list_orders(user_id).await?)
    }
}
