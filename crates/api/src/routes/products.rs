//! Catalog endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use common::ProductId;
use domain::{ProductInput, ProductPatch};
use serde::{Deserialize, Serialize};
use store::{Page, Product, Store};

use super::MessageResponse;
use crate::auth::CurrentUser;
use crate::error::ApiError;
use crate::extract::{JsonBody, parse_id};
use crate::state::AppState;

// -- Request types --

#[derive(Deserialize)]
pub struct ProductRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<f64>,
    pub image_url: Option<String>,
}

#[derive(Deserialize)]
pub struct ListQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
}

// -- Response types --

#[derive(Serialize)]
pub struct ProductResponse {
    pub id: ProductId,
    pub name: String,
    pub description: Option<String>,
    pub price: f64,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<Product> for ProductResponse {
    fn from(product: Product) -> Self {
        Self {
            id: product.id,
            name: product.name,
            description: product.description,
            price: product.price.to_major(),
            image_url: product.image_url,
            created_at: product.created_at,
        }
    }
}

#[derive(Serialize)]
pub struct ProductPageResponse {
    pub products: Vec<ProductResponse>,
    pub total: u64,
    pub current_page: u32,
    pub per_page: u32,
    pub total_pages: u64,
    pub has_next: bool,
    pub has_prev: bool,
}

impl From<Page<Product>> for ProductPageResponse {
    fn from(page: Page<Product>) -> Self {
        Self {
            total: page.total,
            current_page: page.request.page,
            per_page: page.request.per_page,
            total_pages: page.total_pages(),
            has_next: page.has_next(),
            has_prev: page.has_prev(),
            products: page.items.into_iter().map(ProductResponse::from).collect(),
        }
    }
}

#[derive(Serialize)]
pub struct SearchResponse {
    pub products: Vec<ProductResponse>,
}

fn query_error(rejection: QueryRejection) -> ApiError {
    ApiError::BadRequest(rejection.body_text())
}

// -- Handlers --

/// POST /products — adds a product to the catalog.
#[tracing::instrument(skip_all)]
pub async fn create<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    _user: CurrentUser,
    JsonBody(req): JsonBody<ProductRequest>,
) -> Result<(StatusCode, Json<ProductResponse>), ApiError> {
    let product = state
        .catalog
        .create_product(ProductInput {
            name: req.name,
            description: req.description,
            price: req.price,
            image_url: req.image_url,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(ProductResponse::from(product))))
}

/// GET /products — lists products one page at a time.
#[tracing::instrument(skip_all)]
pub async fn list<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> Result<Json<ProductPageResponse>, ApiError> {
    let Query(query) = query.map_err(query_error)?;
    let page = state
        .catalog
        .list_products(query.page, query.per_page)
        .await?;
    Ok(Json(ProductPageResponse::from(page)))
}

/// GET /products/search?q= — matches name or description.
#[tracing::instrument(skip_all)]
pub async fn search<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    query: Result<Query<SearchQuery>, QueryRejection>,
) -> Result<Json<SearchResponse>, ApiError> {
    let Query(query) = query.map_err(query_error)?;
    let products = state
        .catalog
        .search_products(query.q.as_deref().unwrap_or_default())
        .await?;
    Ok(Json(SearchResponse {
        products: products.into_iter().map(ProductResponse::from).collect(),
    }))
}

/// GET /products/{id} — returns one product.
#[tracing::instrument(skip(state))]
pub async fn get<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<ProductResponse>, ApiError> {
    let product_id: ProductId = parse_id(&id, "product")?;
    let product = state.catalog.get_product(product_id).await?;
    Ok(Json(ProductResponse::from(product)))
}

/// PUT /products/{id} — updates the supplied fields.
#[tracing::instrument(skip(state, _user, req))]
pub async fn update<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    _user: CurrentUser,
    Path(id): Path<String>,
    JsonBody(req): JsonBody<ProductRequest>,
) -> Result<Json<ProductResponse>, ApiError> {
    let product_id: ProductId = parse_id(&id, "product")?;
    let product = state
        .catalog
        .update_product(
            product_id,
            ProductPatch {
                name: req.name,
                description: req.description,
                price: req.price,
                image_url: req.image_url,
            },
        )
        .await?;
    Ok(Json(ProductResponse::from(product)))
}

/// DELETE /products/{id} — removes a product from the catalog and all carts.
#[tracing::instrument(skip(state, _user))]
pub async fn delete<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    _user: CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    let product_id: ProductId = parse_id(&id, "product")?;
    state.catalog.delete_product(product_id).await?;
    Ok(Json(MessageResponse::new("Product deleted successfully")))
}
