use async_trait::async_trait;

use crate::{
    CartLine, NewOrder, NewProduct, NewUser, Order, Page, PageRequest, Product, ProductId,
    ProductUpdate, ProfileUpdate, Result, StoreError, User, UserId,
};

/// Core trait for store implementations.
///
/// A store persists users, products, carts and orders. All implementations
/// must be thread-safe (Send + Sync) and must make every mutating call
/// atomic: it either fully applies or leaves no trace.
#[async_trait]
pub trait Store: Send + Sync {
    /// Creates a user.
    ///
    /// Fails with `Conflict` if the username or email is already taken.
    async fn create_user(&self, user: NewUser) -> Result<User>;

    /// Retrieves a user by identity.
    async fn get_user(&self, user_id: UserId) -> Result<Option<User>>;

    /// Retrieves a user by email address.
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Applies a profile update.
    ///
    /// Fails with `NotFound` for an unknown user and `Conflict` if the new
    /// username or email belongs to another user.
    async fn update_profile(&self, user_id: UserId, update: ProfileUpdate) -> Result<User>;

    /// Replaces a user's password hash.
    async fn set_password_hash(&self, user_id: UserId, password_hash: String) -> Result<()>;

    /// Creates a product.
    async fn create_product(&self, product: NewProduct) -> Result<Product>;

    /// Retrieves a product by identity.
    async fn get_product(&self, product_id: ProductId) -> Result<Option<Product>>;

    /// Lists products in creation order, one page at a time.
    async fn list_products(&self, page: PageRequest) -> Result<Page<Product>>;

    /// Case-insensitive substring search over product name and description.
    async fn search_products(&self, query: &str) -> Result<Vec<Product>>;

    /// Applies a product update. Fails with `NotFound` if absent.
    async fn update_product(&self, product_id: ProductId, update: ProductUpdate)
    -> Result<Product>;

    /// Deletes a product and every cart line referencing it.
    ///
    /// Fails with `NotFound` if absent. Orders are not affected.
    async fn delete_product(&self, product_id: ProductId) -> Result<()>;

    /// Returns the user's cart lines in insertion order, joined with the
    /// products' current name and price.
    ///
    /// Returns `None` if the user has no cart.
    async fn cart_lines(&self, user_id: UserId) -> Result<Option<Vec<CartLine>>>;

    /// Adds `quantity` of a product to the user's cart.
    ///
    /// Creates the cart if absent. If a line for the product exists its
    /// quantity is incremented, otherwise a new line is inserted. The
    /// increment is applied as given. Fails with `NotFound` if the product
    /// does not exist.
    async fn add_cart_item(&self, user_id: UserId, product_id: ProductId, quantity: i32)
    -> Result<()>;

    /// Overwrites the quantity of an existing cart line.
    ///
    /// Fails with `NotFound` if the user has no cart or no line for the
    /// product.
    async fn set_cart_item_quantity(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: i32,
    ) -> Result<()>;

    /// Deletes a cart line. Fails with `NotFound` if absent.
    async fn remove_cart_item(&self, user_id: UserId, product_id: ProductId) -> Result<()>;

    /// Converts the user's cart into an order in one transaction.
    ///
    /// Inside the transaction the cart lines are read once (empty if there
    /// is no cart) and passed to `build`, which computes the order. If
    /// `build` fails nothing is written. Otherwise the order and its lines
    /// are inserted, and the cart lines and the cart are deleted, before
    /// the transaction commits.
    async fn place_order<F, E>(&self, user_id: UserId, build: F) -> std::result::Result<Order, E>
    where
        F: FnOnce(&[CartLine]) -> std::result::Result<NewOrder, E> + Send,
        E: From<StoreError> + Send;

    /// Lists the user's orders, oldest first, with their lines.
    async fn list_orders(&self, user_id: UserId) -> Result<Vec<Order>>;
}

/// Extension trait providing convenience methods for stores.
#[async_trait]
pub trait StoreExt: Store {
    /// Retrieves a user, failing with `NotFound` if absent.
    async fn require_user(&self, user_id: UserId) -> Result<User> {
        self.get_user(user_id)
            .await?
            .ok_or_else(|| StoreError::not_found("User", user_id))
    }

    /// Retrieves a product, failing with `NotFound` if absent.
    async fn require_product(&self, product_id: ProductId) -> Result<Product> {
        self.get_product(product_id)
            .await?
            .ok_or_else(|| StoreError::not_found("Product", product_id))
    }
}

// Blanket implementation for all Store implementations
impl<T: Store + ?Sized> StoreExt for T {}
