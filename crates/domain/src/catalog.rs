//! Product catalog.

use common::{Money, ProductId};
use store::{NewProduct, Page, PageRequest, Product, ProductUpdate, Store, StoreExt};

use crate::error::{DomainError, Result};

/// Input for creating a product. Prices are decimal major units.
#[derive(Debug, Clone, Default)]
pub struct ProductInput {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<f64>,
    pub image_url: Option<String>,
}

/// Partial product update. Prices are decimal major units.
#[derive(Debug, Clone, Default)]
pub struct ProductPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<f64>,
    pub image_url: Option<String>,
}

/// Service for catalog reads and writes.
#[derive(Debug, Clone)]
pub struct CatalogService<S> {
    store: S,
}

impl<S: Store> CatalogService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    #[tracing::instrument(skip(self))]
    pub async fn create_product(&self, input: ProductInput) -> Result<Product> {
        let name = validate_name(input.name.unwrap_or_default())?;
        let price = match input.price {
            Some(price) => validate_price(price)?,
            None => return Err(DomainError::validation("Price is required")),
        };

        let product = self
            .store
            .create_product(NewProduct {
                name,
                description: input.description,
                price,
                image_url: input.image_url,
            })
            .await?;

        tracing::info!(product_id = %product.id, "Product created");
        Ok(product)
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_product(&self, product_id: ProductId) -> Result<Product> {
        Ok(self.store.require_product(product_id).await?)
    }

    #[tracing::instrument(skip(self))]
    pub async fn list_products(&self, page: Option<u32>, per_page: Option<u32>) -> Result<Page<Product>> {
        let request = PageRequest::new(
            page.unwrap_or(1),
            per_page.unwrap_or(PageRequest::DEFAULT_PER_PAGE),
        );
        Ok(self.store.list_products(request).await?)
    }

    #[tracing::instrument(skip(self))]
    pub async fn search_products(&self, query: &str) -> Result<Vec<Product>> {
        let query = query.trim();
        if query.is_empty() {
            return Err(DomainError::validation("Search query is required"));
        }
        Ok(self.store.search_products(query).await?)
    }

    #[tracing::instrument(skip(self))]
    pub async fn update_product(&self, product_id: ProductId, patch: ProductPatch) -> Result<Product> {
        let update = ProductUpdate {
            name: patch.name.map(validate_name).transpose()?,
            description: patch.description,
            price: patch.price.map(validate_price).transpose()?,
            image_url: patch.image_url,
        };
        Ok(self.store.update_product(product_id, update).await?)
    }

    #[tracing::instrument(skip(self))]
    pub async fn delete_product(&self, product_id: ProductId) -> Result<()> {
        self.store.delete_product(product_id).await?;
        tracing::info!(%product_id, "Product deleted");
        Ok(())
    }
}

fn validate_name(name: String) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(DomainError::validation("Name is required"));
    }
    Ok(name.to_string())
}

/// Highest accepted unit price; any line at this price and an `i32`
/// quantity still fits in the cent range.
pub const MAX_PRICE: Money = Money::from_cents(1_000_000_000);

fn validate_price(price: f64) -> Result<Money> {
    match Money::from_major(price) {
        Some(money) if money.is_negative() => Err(DomainError::validation(
            "Price must be a non-negative number",
        )),
        Some(money) if money > MAX_PRICE => Err(DomainError::validation(format!(
            "Price must not exceed {MAX_PRICE}"
        ))),
        Some(money) => Ok(money),
        None => Err(DomainError::validation("Price must be a non-negative number")),
    }
}
