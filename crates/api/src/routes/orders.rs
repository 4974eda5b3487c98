//! Checkout and order history endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use common::{OrderId, ProductId};
use domain::ShippingDetails;
use serde::{Deserialize, Serialize};
use store::{Order, Store};

use crate::auth::CurrentUser;
use crate::error::ApiError;
use crate::extract::JsonBody;
use crate::state::AppState;

// -- Request types --

#[derive(Deserialize)]
pub struct CheckoutRequest {
    pub shipping_address: Option<String>,
    pub shipping_city: Option<String>,
    pub shipping_postal_code: Option<String>,
    pub shipping_country: Option<String>,
}

// -- Response types --

#[derive(Serialize)]
pub struct CheckoutResponse {
    pub message: &'static str,
    pub order_id: OrderId,
}

#[derive(Serialize)]
pub struct OrderItemResponse {
    pub product_id: ProductId,
    pub name: String,
    pub quantity: i32,
    pub price: f64,
}

#[derive(Serialize)]
pub struct OrderResponse {
    pub id: OrderId,
    pub created_at: DateTime<Utc>,
    pub total_price: f64,
    pub shipping_address: String,
    pub shipping_city: String,
    pub shipping_postal_code: String,
    pub shipping_country: String,
    pub items: Vec<OrderItemResponse>,
}

impl From<Order> for OrderResponse {
    fn from(order: Order) -> Self {
        Self {
            id: order.id,
            created_at: order.created_at,
            total_price: order.total_price.to_major(),
            shipping_address: order.shipping.street,
            shipping_city: order.shipping.city,
            shipping_postal_code: order.shipping.postal_code,
            shipping_country: order.shipping.country,
            items: order
                .items
                .into_iter()
                .map(|item| OrderItemResponse {
                    product_id: item.product_id,
                    name: item.name,
                    quantity: item.quantity,
                    price: item.price.to_major(),
                })
                .collect(),
        }
    }
}

#[derive(Serialize)]
pub struct OrderListResponse {
    pub orders: Vec<OrderResponse>,
}

// -- Handlers --

/// POST /checkout — converts the caller's cart into an order.
#[tracing::instrument(skip_all)]
pub async fn checkout<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentUser(user): CurrentUser,
    JsonBody(req): JsonBody<CheckoutRequest>,
) -> Result<(StatusCode, Json<CheckoutResponse>), ApiError> {
    let order_id = state
        .checkout
        .checkout(
            user.id,
            ShippingDetails {
                address: req.shipping_address,
                city: req.shipping_city,
                postal_code: req.shipping_postal_code,
                country: req.shipping_country,
            },
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(CheckoutResponse {
            message: "Order placed successfully",
            order_id,
        }),
    ))
}

/// GET /orders — lists the caller's orders, oldest first.
#[tracing::instrument(skip_all)]
pub async fn list<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<OrderListResponse>, ApiError> {
    let orders = state.orders.list_orders(user.id).await?;
    Ok(Json(OrderListResponse {
        orders: orders.into_iter().map(OrderResponse::from).collect(),
    }))
}
