//! Per-user shopping cart.

use common::{Money, ProductId, UserId};
use store::{CartLine, Store};

use crate::error::{DomainError, Result};

/// A cart line with its computed subtotal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartViewLine {
    pub product_id: ProductId,
    pub name: String,
    pub price: Money,
    pub quantity: i32,
    pub subtotal: Money,
}

/// A cart's lines with the computed total.
///
/// A user without a cart gets an empty view, never an error.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CartView {
    pub items: Vec<CartViewLine>,
    pub total: Money,
}

impl CartView {
    /// Prices each line; fails if a subtotal or the total overflows.
    pub fn from_lines(lines: Vec<CartLine>) -> Result<Self> {
        let items = lines
            .into_iter()
            .map(|line| -> Result<CartViewLine> {
                let subtotal = line.subtotal().ok_or_else(amount_out_of_range)?;
                Ok(CartViewLine {
                    product_id: line.product_id,
                    name: line.name,
                    price: line.price,
                    quantity: line.quantity,
                    subtotal,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let total =
            Money::checked_sum(items.iter().map(|line| line.subtotal)).ok_or_else(amount_out_of_range)?;
        Ok(Self { items, total })
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

pub(crate) fn amount_out_of_range() -> DomainError {
    DomainError::validation("Amount out of range")
}

/// Service for cart reads and mutations.
#[derive(Debug, Clone)]
pub struct CartService<S> {
    store: S,
}

impl<S: Store> CartService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_cart(&self, user_id: UserId) -> Result<CartView> {
        let lines = self.store.cart_lines(user_id).await?.unwrap_or_default();
        CartView::from_lines(lines)
    }

    /// Adds `quantity` of a product, creating the cart if needed.
    ///
    /// The increment is applied as given, without clamping.
    #[tracing::instrument(skip(self))]
    pub async fn add_item(&self, user_id: UserId, product_id: ProductId, quantity: i32) -> Result<()> {
        self.store.add_cart_item(user_id, product_id, quantity).await?;
        metrics::counter!("cart_items_added_total").increment(1);
        Ok(())
    }

    /// Overwrites a line's quantity; a non-positive quantity removes the line.
    #[tracing::instrument(skip(self))]
    pub async fn update_item(&self, user_id: UserId, product_id: ProductId, quantity: i32) -> Result<()> {
        if quantity <= 0 {
            self.store.remove_cart_item(user_id, product_id).await?;
        } else {
            self.store
                .set_cart_item_quantity(user_id, product_id, quantity)
                .await?;
        }
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    pub async fn remove_item(&self, user_id: UserId, product_id: ProductId) -> Result<()> {
        self.store.remove_cart_item(user_id, product_id).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use store::{InMemoryStore, NewProduct, NewUser};

    use super::*;
    use crate::DomainError;

    async fn fixture() -> (CartService<InMemoryStore>, UserId, ProductId) {
        let store = InMemoryStore::new();
        let user = store
            .create_user(NewUser {
                username: "ann".into(),
                email: "ann@x.io".into(),
                password_hash: "h".into(),
            })
            .await
            .unwrap();
        let product = store
            .create_product(NewProduct {
                name: "Mug".into(),
                description: None,
                price: Money::from_cents(1250),
                image_url: None,
            })
            .await
            .unwrap();
        (CartService::new(store), user.id, product.id)
    }

    #[tokio::test]
    async fn missing_cart_is_empty_view() {
        let (cart, user, _) = fixture().await;
        let view = cart.get_cart(user).await.unwrap();
        assert!(view.is_empty());
        assert!(view.total.is_zero());
    }

    #[tokio::test]
    async fn total_is_sum_of_subtotals() {
        let (cart, user, product) = fixture().await;
        cart.add_item(user, product, 3).await.unwrap();

        let view = cart.get_cart(user).await.unwrap();
        assert_eq!(view.items[0].subtotal.cents(), 3750);
        assert_eq!(view.total.cents(), 3750);
    }

    #[tokio::test]
    async fn add_applies_signed_increment() {
        let (cart, user, product) = fixture().await;
        cart.add_item(user, product, 3).await.unwrap();
        cart.add_item(user, product, -1).await.unwrap();

        let view = cart.get_cart(user).await.unwrap();
        assert_eq!(view.items[0].quantity, 2);
    }

    #[tokio::test]
    async fn update_with_negative_quantity_removes_line() {
        let (cart, user, product) = fixture().await;
        cart.add_item(user, product, 1).await.unwrap();
        cart.update_item(user, product, -4).await.unwrap();
        assert!(cart.get_cart(user).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn update_without_cart_is_not_found() {
        let (cart, user, product) = fixture().await;
        let err = cart.update_item(user, product, 2).await.unwrap_err();
        assert!(matches!(err, DomainError::NotFound { .. }));

        let err = cart.update_item(user, product, 0).await.unwrap_err();
        assert!(matches!(err, DomainError::NotFound { .. }));
    }

    fn line(cents: i64, quantity: i32) -> CartLine {
        CartLine {
            product_id: ProductId::new(),
            name: "Crate".into(),
            price: Money::from_cents(cents),
            quantity,
        }
    }

    #[test]
    fn overflowing_subtotal_is_rejected() {
        let err = CartView::from_lines(vec![line(i64::MAX / 4, 10)]).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
        assert_eq!(err.to_string(), "Amount out of range");
    }

    #[test]
    fn overflowing_total_is_rejected() {
        let half = i64::MAX / 2 + 1;
        let err = CartView::from_lines(vec![line(half, 1), line(half, 1)]).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }
}
