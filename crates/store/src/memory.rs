use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::{
    CartLine, NewOrder, NewProduct, NewUser, Order, OrderId, Page, PageRequest, Product,
    ProductId, ProductUpdate, ProfileUpdate, Result, StoreError, User, UserId, store::Store,
};

/// In-memory store implementation.
///
/// Provides the same interface as the PostgreSQL implementation. Every
/// operation runs under a single lock over all tables, which gives mutating
/// calls (checkout in particular) the same all-or-nothing behaviour as a
/// database transaction.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<RwLock<Tables>>,
}

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    products: Vec<Product>,
    carts: HashMap<UserId, Cart>,
    orders: Vec<Order>,
}

#[derive(Default)]
struct Cart {
    items: Vec<CartItem>,
}

struct CartItem {
    product_id: ProductId,
    quantity: i32,
}

impl Tables {
    fn check_unique(&self, username: &str, email: &str, except: Option<UserId>) -> Result<()> {
        let others = self.users.iter().filter(|u| Some(u.id) != except);
        for user in others {
            if user.username == username {
                return Err(StoreError::Conflict { field: "username" });
            }
            if user.email == email {
                return Err(StoreError::Conflict { field: "email" });
            }
        }
        Ok(())
    }

    fn lines_for(&self, user_id: UserId) -> Option<Vec<CartLine>> {
        let cart = self.carts.get(&user_id)?;
        let lines = cart
            .items
            .iter()
            .filter_map(|item| {
                self.products
                    .iter()
                    .find(|p| p.id == item.product_id)
                    .map(|product| CartLine {
                        product_id: product.id,
                        name: product.name.clone(),
                        price: product.price,
                        quantity: item.quantity,
                    })
            })
            .collect();
        Some(lines)
    }

    fn cart_item_mut(&mut self, user_id: UserId, product_id: ProductId) -> Result<&mut CartItem> {
        let cart = self
            .carts
            .get_mut(&user_id)
            .ok_or_else(|| StoreError::not_found("Cart", user_id))?;
        cart.items
            .iter_mut()
            .find(|item| item.product_id == product_id)
            .ok_or_else(|| StoreError::not_found("Cart item", product_id))
    }
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of orders stored.
    pub async fn order_count(&self) -> usize {
        self.tables.read().await.orders.len()
    }

    /// Returns true if the user currently has a cart.
    pub async fn has_cart(&self, user_id: UserId) -> bool {
        self.tables.read().await.carts.contains_key(&user_id)
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn create_user(&self, user: NewUser) -> Result<User> {
        let mut tables = self.tables.write().await;
        tables.check_unique(&user.username, &user.email, None)?;

        let user = User {
            id: UserId::new(),
            username: user.username,
            email: user.email,
            password_hash: user.password_hash,
            created_at: Utc::now(),
        };
        tables.users.push(user.clone());
        Ok(user)
    }

    async fn get_user(&self, user_id: UserId) -> Result<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables.users.iter().find(|u| u.id == user_id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables.users.iter().find(|u| u.email == email).cloned())
    }

    async fn update_profile(&self, user_id: UserId, update: ProfileUpdate) -> Result<User> {
        let mut tables = self.tables.write().await;
        let current = tables
            .users
            .iter()
            .find(|u| u.id == user_id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("User", user_id))?;

        let username = update.username.unwrap_or(current.username);
        let email = update.email.unwrap_or(current.email);
        tables.check_unique(&username, &email, Some(user_id))?;

        let user = tables
            .users
            .iter_mut()
            .find(|u| u.id == user_id)
            .ok_or_else(|| StoreError::not_found("User", user_id))?;
        user.username = username;
        user.email = email;
        Ok(user.clone())
    }

    async fn set_password_hash(&self, user_id: UserId, password_hash: String) -> Result<()> {
        let mut tables = self.tables.write().await;
        let user = tables
            .users
            .iter_mut()
            .find(|u| u.id == user_id)
            .ok_or_else(|| StoreError::not_found("User", user_id))?;
        user.password_hash = password_hash;
        Ok(())
    }

    async fn create_product(&self, product: NewProduct) -> Result<Product> {
        let product = Product {
            id: ProductId::new(),
            name: product.name,
            description: product.description,
            price: product.price,
            image_url: product.image_url,
            created_at: Utc::now(),
        };
        self.tables.write().await.products.push(product.clone());
        Ok(product)
    }

    async fn get_product(&self, product_id: ProductId) -> Result<Option<Product>> {
        let tables = self.tables.read().await;
        Ok(tables.products.iter().find(|p| p.id == product_id).cloned())
    }

    async fn list_products(&self, page: PageRequest) -> Result<Page<Product>> {
        let tables = self.tables.read().await;
        let offset = usize::try_from(page.offset()).unwrap_or(usize::MAX);
        let items = tables
            .products
            .iter()
            .skip(offset)
            .take(page.per_page as usize)
            .cloned()
            .collect();

        Ok(Page {
            items,
            total: tables.products.len() as u64,
            request: page,
        })
    }

    async fn search_products(&self, query: &str) -> Result<Vec<Product>> {
        let needle = query.to_lowercase();
        let tables = self.tables.read().await;
        Ok(tables
            .products
            .iter()
            .filter(|p| {
                p.name.to_lowercase().contains(&needle)
                    || p.description
                        .as_deref()
                        .is_some_and(|d| d.to_lowercase().contains(&needle))
            })
            .cloned()
            .collect())
    }

    async fn update_product(
        &self,
        product_id: ProductId,
        update: ProductUpdate,
    ) -> Result<Product> {
        let mut tables = self.tables.write().await;
        let product = tables
            .products
            .iter_mut()
            .find(|p| p.id == product_id)
            .ok_or_else(|| StoreError::not_found("Product", product_id))?;
        update.apply(product);
        Ok(product.clone())
    }

    async fn delete_product(&self, product_id: ProductId) -> Result<()> {
        let mut tables = self.tables.write().await;
        let before = tables.products.len();
        tables.products.retain(|p| p.id != product_id);
        if tables.products.len() == before {
            return Err(StoreError::not_found("Product", product_id));
        }

        for cart in tables.carts.values_mut() {
            cart.items.retain(|item| item.product_id != product_id);
        }
        Ok(())
    }

    async fn cart_lines(&self, user_id: UserId) -> Result<Option<Vec<CartLine>>> {
        Ok(self.tables.read().await.lines_for(user_id))
    }

    async fn add_cart_item(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: i32,
    ) -> Result<()> {
        let mut tables = self.tables.write().await;
        if !tables.products.iter().any(|p| p.id == product_id) {
            return Err(StoreError::not_found("Product", product_id));
        }

        let cart = tables.carts.entry(user_id).or_default();
        match cart.items.iter_mut().find(|i| i.product_id == product_id) {
            Some(item) => {
                item.quantity = item
                    .quantity
                    .checked_add(quantity)
                    .ok_or(StoreError::OutOfRange { field: "quantity" })?;
            }
            None => cart.items.push(CartItem {
                product_id,
                quantity,
            }),
        }
        Ok(())
    }

    async fn set_cart_item_quantity(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: i32,
    ) -> Result<()> {
        let mut tables = self.tables.write().await;
        tables.cart_item_mut(user_id, product_id)?.quantity = quantity;
        Ok(())
    }

    async fn remove_cart_item(&self, user_id: UserId, product_id: ProductId) -> Result<()> {
        let mut tables = self.tables.write().await;
        let cart = tables
            .carts
            .get_mut(&user_id)
            .ok_or_else(|| StoreError::not_found("Cart", user_id))?;
        let before = cart.items.len();
        cart.items.retain(|item| item.product_id != product_id);
        if cart.items.len() == before {
            return Err(StoreError::not_found("Cart item", product_id));
        }
        Ok(())
    }

    async fn place_order<F, E>(&self, user_id: UserId, build: F) -> std::result::Result<Order, E>
    where
        F: FnOnce(&[CartLine]) -> std::result::Result<NewOrder, E> + Send,
        E: From<StoreError> + Send,
    {
        let mut tables = self.tables.write().await;
        let lines = tables.lines_for(user_id).unwrap_or_default();
        let new_order = build(&lines)?;

        let order = Order {
            id: OrderId::new(),
            user_id,
            total_price: new_order.total_price,
            shipping: new_order.shipping,
            created_at: Utc::now(),
            items: new_order.items,
        };
        tables.orders.push(order.clone());
        tables.carts.remove(&user_id);
        Ok(order)
    }

    async fn list_orders(&self, user_id: UserId) -> Result<Vec<Order>> {
        let tables = self.tables.read().await;
        Ok(tables
            .orders
            .iter()
            .filter(|o| o.user_id == user_id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Money, OrderLine, ShippingAddress};

    fn new_user(username: &str, email: &str) -> NewUser {
        NewUser {
            username: username.to_string(),
            email: email.to_string(),
            password_hash: "hash".to_string(),
        }
    }

    fn new_product(name: &str, cents: i64) -> NewProduct {
        NewProduct {
            name: name.to_string(),
            description: None,
            price: Money::from_cents(cents),
            image_url: None,
        }
    }

    fn shipping() -> ShippingAddress {
        ShippingAddress {
            street: "1 Main St".into(),
            city: "Springfield".into(),
            postal_code: "12345".into(),
            country: "US".into(),
        }
    }

    fn order_from(lines: &[CartLine]) -> std::result::Result<NewOrder, StoreError> {
        let items: Vec<OrderLine> = lines
            .iter()
            .map(|l| OrderLine {
                product_id: l.product_id,
                name: l.name.clone(),
                quantity: l.quantity,
                price: l.price,
            })
            .collect();
        Ok(NewOrder {
            total_price: Money::checked_sum(items.iter().flat_map(OrderLine::subtotal)).unwrap(),
            shipping: shipping(),
            items,
        })
    }

    #[tokio::test]
    async fn create_user_enforces_unique_username_and_email() {
        let store = InMemoryStore::new();
        store.create_user(new_user("alice", "a@x.io")).await.unwrap();

        let err = store
            .create_user(new_user("alice", "other@x.io"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict { field: "username" }));

        let err = store
            .create_user(new_user("bob", "a@x.io"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict { field: "email" }));
    }

    #[tokio::test]
    async fn update_profile_allows_keeping_own_values() {
        let store = InMemoryStore::new();
        let alice = store.create_user(new_user("alice", "a@x.io")).await.unwrap();
        store.create_user(new_user("bob", "b@x.io")).await.unwrap();

        let updated = store
            .update_profile(
                alice.id,
                ProfileUpdate {
                    username: Some("alice".into()),
                    email: Some("alice@x.io".into()),
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.email, "alice@x.io");

        let err = store
            .update_profile(
                alice.id,
                ProfileUpdate {
                    username: Some("bob".into()),
                    email: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict { field: "username" }));
    }

    #[tokio::test]
    async fn repeated_add_increments_single_line() {
        let store = InMemoryStore::new();
        let user = UserId::new();
        let product = store.create_product(new_product("Widget", 1000)).await.unwrap();

        store.add_cart_item(user, product.id, 2).await.unwrap();
        store.add_cart_item(user, product.id, 3).await.unwrap();

        let lines = store.cart_lines(user).await.unwrap().unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].quantity, 5);
    }

    #[tokio::test]
    async fn increment_past_i32_max_is_out_of_range_and_keeps_line() {
        let store = InMemoryStore::new();
        let user = UserId::new();
        let product = store.create_product(new_product("Widget", 1000)).await.unwrap();

        store.add_cart_item(user, product.id, 2_000_000_000).await.unwrap();
        let err = store
            .add_cart_item(user, product.id, 2_000_000_000)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::OutOfRange { field: "quantity" }));

        let lines = store.cart_lines(user).await.unwrap().unwrap();
        assert_eq!(lines[0].quantity, 2_000_000_000);
    }

    #[tokio::test]
    async fn add_unknown_product_is_not_found_and_creates_no_cart() {
        let store = InMemoryStore::new();
        let user = UserId::new();

        let err = store
            .add_cart_item(user, ProductId::new(), 1)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { entity: "Product", .. }));
        assert!(!store.has_cart(user).await);
    }

    #[tokio::test]
    async fn cart_item_mutations_require_existing_line() {
        let store = InMemoryStore::new();
        let user = UserId::new();
        let product = store.create_product(new_product("Widget", 1000)).await.unwrap();

        let err = store
            .set_cart_item_quantity(user, product.id, 4)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { entity: "Cart", .. }));

        store.add_cart_item(user, product.id, 1).await.unwrap();
        let err = store
            .remove_cart_item(user, ProductId::new())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { entity: "Cart item", .. }));
    }

    #[tokio::test]
    async fn delete_product_removes_it_from_carts() {
        let store = InMemoryStore::new();
        let user = UserId::new();
        let product = store.create_product(new_product("Widget", 1000)).await.unwrap();
        store.add_cart_item(user, product.id, 1).await.unwrap();

        store.delete_product(product.id).await.unwrap();

        assert!(store.cart_lines(user).await.unwrap().unwrap().is_empty());
        assert!(matches!(
            store.delete_product(product.id).await,
            Err(StoreError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn place_order_persists_order_and_removes_cart() {
        let store = InMemoryStore::new();
        let user = UserId::new();
        let product = store.create_product(new_product("Widget", 1000)).await.unwrap();
        store.add_cart_item(user, product.id, 2).await.unwrap();

        let order = store.place_order(user, order_from).await.unwrap();

        assert_eq!(order.total_price.cents(), 2000);
        assert!(!store.has_cart(user).await);
        assert_eq!(store.list_orders(user).await.unwrap(), vec![order]);
    }

    #[tokio::test]
    async fn failed_build_leaves_cart_untouched() {
        let store = InMemoryStore::new();
        let user = UserId::new();
        let product = store.create_product(new_product("Widget", 1000)).await.unwrap();
        store.add_cart_item(user, product.id, 2).await.unwrap();

        let result = store
            .place_order(user, |_| {
                Err::<NewOrder, _>(StoreError::Conflict { field: "test" })
            })
            .await;

        assert!(result.is_err());
        assert!(store.has_cart(user).await);
        assert_eq!(store.order_count().await, 0);
    }

    #[tokio::test]
    async fn list_products_pages_in_creation_order() {
        let store = InMemoryStore::new();
        for i in 0..5 {
            store
                .create_product(new_product(&format!("P{i}"), 100))
                .await
                .unwrap();
        }

        let page = store.list_products(PageRequest::new(2, 2)).await.unwrap();
        let names: Vec<_> = page.items.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["P2", "P3"]);
        assert_eq!(page.total, 5);
        assert_eq!(page.total_pages(), 3);
    }

    #[tokio::test]
    async fn search_matches_name_or_description_case_insensitively() {
        let store = InMemoryStore::new();
        store.create_product(new_product("Blue Mug", 500)).await.unwrap();
        store
            .create_product(NewProduct {
                description: Some("A BLUE teapot".into()),
                ..new_product("Teapot", 900)
            })
            .await
            .unwrap();
        store.create_product(new_product("Red Mug", 500)).await.unwrap();

        let found = store.search_products("blue").await.unwrap();
        assert_eq!(found.len(), 2);
    }
}
