//! Cart endpoints. All require an authenticated caller.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use common::ProductId;
use domain::CartView;
use serde::{Deserialize, Serialize};
use store::Store;

use super::MessageResponse;
use crate::auth::CurrentUser;
use crate::error::ApiError;
use crate::extract::{JsonBody, parse_id};
use crate::state::AppState;

// -- Request types --

#[derive(Deserialize)]
pub struct AddItemRequest {
    pub product_id: Option<String>,
    pub quantity: Option<i32>,
}

#[derive(Deserialize)]
pub struct UpdateItemRequest {
    pub quantity: Option<i32>,
}

// -- Response types --

#[derive(Serialize)]
pub struct CartItemResponse {
    pub product_id: ProductId,
    pub name: String,
    pub price: f64,
    pub quantity: i32,
    pub subtotal: f64,
}

#[derive(Serialize)]
pub struct CartResponse {
    pub items: Vec<CartItemResponse>,
    pub total: f64,
}

impl From<CartView> for CartResponse {
    fn from(view: CartView) -> Self {
        Self {
            total: view.total.to_major(),
            items: view
                .items
                .into_iter()
                .map(|line| CartItemResponse {
                    subtotal: line.subtotal.to_major(),
                    product_id: line.product_id,
                    name: line.name,
                    price: line.price.to_major(),
                    quantity: line.quantity,
                })
                .collect(),
        }
    }
}

// -- Handlers --

/// GET /cart — returns the caller's cart; empty if none exists.
#[tracing::instrument(skip_all)]
pub async fn get<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<CartResponse>, ApiError> {
    let view = state.cart.get_cart(user.id).await?;
    Ok(Json(CartResponse::from(view)))
}

/// POST /cart/add — adds a product; `quantity` defaults to 1.
#[tracing::instrument(skip_all)]
pub async fn add<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentUser(user): CurrentUser,
    JsonBody(req): JsonBody<AddItemRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let raw = req.product_id.ok_or_else(ApiError::missing_data)?;
    let product_id: ProductId = parse_id(&raw, "product")?;

    state
        .cart
        .add_item(user.id, product_id, req.quantity.unwrap_or(1))
        .await?;
    Ok(Json(MessageResponse::new("Item added to cart")))
}

/// PUT /cart/update/{product_id} — overwrites a line's quantity.
#[tracing::instrument(skip(state, user, req))]
pub async fn update<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentUser(user): CurrentUser,
    Path(product_id): Path<String>,
    JsonBody(req): JsonBody<UpdateItemRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let product_id: ProductId = parse_id(&product_id, "product")?;
    let quantity = req.quantity.ok_or_else(ApiError::missing_data)?;

    state.cart.update_item(user.id, product_id, quantity).await?;
    Ok(Json(MessageResponse::new("Cart updated")))
}

/// DELETE /cart/remove/{product_id} — deletes a line.
#[tracing::instrument(skip(state, user))]
pub async fn remove<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentUser(user): CurrentUser,
    Path(product_id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    let product_id: ProductId = parse_id(&product_id, "product")?;

    state.cart.remove_item(user.id, product_id).await?;
    Ok(Json(MessageResponse::new("Item removed from cart")))
}
