//! Checkout: converting a cart into an immutable order.

use std::time::Instant;

use common::{Money, OrderId, UserId};
use store::{CartLine, NewOrder, OrderLine, ShippingAddress, Store};

use crate::cart::amount_out_of_range;
use crate::error::{DomainError, Result};

/// Shipping fields as supplied by the caller.
#[derive(Debug, Clone, Default)]
pub struct ShippingDetails {
    pub address: Option<String>,
    pub city: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
}

impl ShippingDetails {
    /// Requires every field to be present and non-blank.
    pub fn validate(self) -> Result<ShippingAddress> {
        fn required(value: Option<String>, field: &str) -> Result<String> {
            match value.as_deref().map(str::trim) {
                Some(v) if !v.is_empty() => Ok(v.to_string()),
                _ => Err(DomainError::validation(format!("{field} is required"))),
            }
        }

        Ok(ShippingAddress {
            street: required(self.address, "shipping_address")?,
            city: required(self.city, "shipping_city")?,
            postal_code: required(self.postal_code, "shipping_postal_code")?,
            country: required(self.country, "shipping_country")?,
        })
    }
}

/// Builds an order from a snapshot of cart lines.
///
/// Each line's price is read exactly once and copied onto the order line;
/// the total is the sum of those captured subtotals. Fails with a
/// validation error if any amount overflows.
pub fn build_order(lines: &[CartLine], shipping: ShippingAddress) -> Result<NewOrder> {
    if lines.is_empty() {
        return Err(DomainError::EmptyCart);
    }

    let items: Vec<OrderLine> = lines
        .iter()
        .map(|line| OrderLine {
            product_id: line.product_id,
            name: line.name.clone(),
            quantity: line.quantity,
            price: line.price,
        })
        .collect();
    let subtotals = items
        .iter()
        .map(|item| item.subtotal().ok_or_else(amount_out_of_range))
        .collect::<Result<Vec<_>>>()?;
    let total_price = Money::checked_sum(subtotals).ok_or_else(amount_out_of_range)?;

    Ok(NewOrder {
        total_price,
        shipping,
        items,
    })
}

/// Service running the checkout transaction.
#[derive(Debug, Clone)]
pub struct CheckoutService<S> {
    store: S,
}

impl<S: Store> CheckoutService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Places an order from the user's cart and retires the cart.
    ///
    /// Validation happens before the store is touched. The read of the cart,
    /// the order insert and the cart deletion share one transaction.
    #[tracing::instrument(skip(self, shipping))]
    pub async fn checkout(&self, user_id: UserId, shipping: ShippingDetails) -> Result<OrderId> {
        let shipping = shipping.validate()?;
        let start = Instant::now();

        let result = self
            .store
            .place_order(user_id, move |lines: &[CartLine]| build_order(lines, shipping))
            .await;

        metrics::histogram!("checkout_duration_seconds").record(start.elapsed().as_secs_f64());
        match result {
            Ok(order) => {
                metrics::counter!("checkouts_total").increment(1);
                tracing::info!(
                    order_id = %order.id,
                    total = %order.total_price,
                    items = order.items.len(),
                    "Order placed"
                );
                Ok(order.id)
            }
            Err(e) => {
                metrics::counter!("checkouts_failed_total").increment(1);
                Err(e)
            }
        }
    }
}
