use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgExecutor, PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::{
    CartId, CartLine, Money, NewOrder, NewProduct, NewUser, Order, OrderId, OrderLine, Page,
    PageRequest, Product, ProductId, ProductUpdate, ProfileUpdate, Result, ShippingAddress,
    StoreError, User, UserId, store::Store,
};

const USER_COLUMNS: &str = "id, username, email, password_hash, created_at";
const PRODUCT_COLUMNS: &str = "id, name, description, price_cents, image_url, created_at";
const NUMERIC_VALUE_OUT_OF_RANGE: &str = "22003";

/// PostgreSQL-backed store implementation.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a new PostgreSQL store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        tracing::info!("Database migrations applied");
        Ok(())
    }

    fn row_to_user(row: PgRow) -> Result<User> {
        Ok(User {
            id: UserId::from_uuid(row.try_get::<Uuid, _>("id")?),
            username: row.try_get("username")?,
            email: row.try_get("email")?,
            password_hash: row.try_get("password_hash")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn row_to_product(row: PgRow) -> Result<Product> {
        Ok(Product {
            id: ProductId::from_uuid(row.try_get::<Uuid, _>("id")?),
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            price: Money::from_cents(row.try_get("price_cents")?),
            image_url: row.try_get("image_url")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn row_to_cart_line(row: PgRow) -> Result<CartLine> {
        Ok(CartLine {
            product_id: ProductId::from_uuid(row.try_get::<Uuid, _>("product_id")?),
            name: row.try_get("name")?,
            price: Money::from_cents(row.try_get("price_cents")?),
            quantity: row.try_get("quantity")?,
        })
    }

    /// Maps unique-constraint violations on the users table to `Conflict`.
    fn map_user_conflict(e: sqlx::Error) -> StoreError {
        if let sqlx::Error::Database(ref db_err) = e {
            match db_err.constraint() {
                Some("unique_username") => return StoreError::Conflict { field: "username" },
                Some("unique_email") => return StoreError::Conflict { field: "email" },
                _ => {}
            }
        }
        StoreError::Database(e)
    }

    /// Maps integer overflow in a quantity update (SQLSTATE 22003) to
    /// `OutOfRange`.
    fn map_quantity_overflow(e: sqlx::Error) -> StoreError {
        if let sqlx::Error::Database(ref db_err) = e {
            if db_err.code().as_deref() == Some(NUMERIC_VALUE_OUT_OF_RANGE) {
                return StoreError::OutOfRange { field: "quantity" };
            }
        }
        StoreError::Database(e)
    }

    async fn find_cart_id<'e>(
        executor: impl PgExecutor<'e>,
        user_id: UserId,
    ) -> Result<Option<CartId>> {
        let id: Option<Uuid> =
            sqlx::query_scalar("SELECT id FROM carts WHERE user_id = $1 FOR UPDATE")
                .bind(user_id.as_uuid())
                .fetch_optional(executor)
                .await?;
        Ok(id.map(CartId::from_uuid))
    }

    /// Reads a cart's lines joined with current product name and price.
    ///
    /// With `lock` set, the cart item rows are locked for update and the
    /// product rows for share until the enclosing transaction ends.
    async fn lines_in_cart<'e>(
        executor: impl PgExecutor<'e>,
        cart_id: CartId,
        lock: bool,
    ) -> Result<Vec<CartLine>> {
        let mut sql = String::from(
            r#"
            SELECT ci.product_id, p.name, p.price_cents, ci.quantity
            FROM cart_items ci
            JOIN products p ON p.id = ci.product_id
            WHERE ci.cart_id = $1
            ORDER BY ci.seq ASC
            "#,
        );
        if lock {
            sql.push_str(" FOR UPDATE OF ci FOR SHARE OF p");
        }

        let rows = sqlx::query(&sql)
            .bind(cart_id.as_uuid())
            .fetch_all(executor)
            .await?;
        rows.into_iter().map(Self::row_to_cart_line).collect()
    }
}

/// Builds an ILIKE pattern matching `query` anywhere, with wildcards escaped.
fn contains_pattern(query: &str) -> String {
    let mut pattern = String::with_capacity(query.len() + 2);
    pattern.push('%');
    for c in query.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

#[async_trait]
impl Store for PostgresStore {
    async fn create_user(&self, user: NewUser) -> Result<User> {
        let row = sqlx::query(&format!(
            "INSERT INTO users (id, username, email, password_hash) VALUES ($1, $2, $3, $4) RETURNING {USER_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(Self::map_user_conflict)?;

        Self::row_to_user(row)
    }

    async fn get_user(&self, user_id: UserId) -> Result<Option<User>> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(user_id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        row.map(Self::row_to_user).transpose()
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1"))
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Self::row_to_user).transpose()
    }

    async fn update_profile(&self, user_id: UserId, update: ProfileUpdate) -> Result<User> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE users
            SET username = COALESCE($2, username), email = COALESCE($3, email)
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(user_id.as_uuid())
        .bind(update.username)
        .bind(update.email)
        .fetch_optional(&self.pool)
        .await
        .map_err(Self::map_user_conflict)?;

        match row {
            Some(row) => Self::row_to_user(row),
            None => Err(StoreError::not_found("User", user_id)),
        }
    }

    async fn set_password_hash(&self, user_id: UserId, password_hash: String) -> Result<()> {
        let result = sqlx::query("UPDATE users SET password_hash = $2 WHERE id = $1")
            .bind(user_id.as_uuid())
            .bind(password_hash)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("User", user_id));
        }
        Ok(())
    }

    async fn create_product(&self, product: NewProduct) -> Result<Product> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO products (id, name, description, price_cents, image_url)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {PRODUCT_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price.cents())
        .bind(&product.image_url)
        .fetch_one(&self.pool)
        .await?;

        Self::row_to_product(row)
    }

    async fn get_product(&self, product_id: ProductId) -> Result<Option<Product>> {
        let row = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"
        ))
        .bind(product_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_product).transpose()
    }

    async fn list_products(&self, page: PageRequest) -> Result<Page<Product>> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(&self.pool)
            .await?;

        let rows = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products ORDER BY seq ASC LIMIT $1 OFFSET $2"
        ))
        .bind(i64::from(page.per_page))
        .bind(page.offset() as i64)
        .fetch_all(&self.pool)
        .await?;

        let items = rows
            .into_iter()
            .map(Self::row_to_product)
            .collect::<Result<Vec<_>>>()?;

        Ok(Page {
            items,
            total: total.max(0) as u64,
            request: page,
        })
    }

    async fn search_products(&self, query: &str) -> Result<Vec<Product>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {PRODUCT_COLUMNS} FROM products
            WHERE name ILIKE $1 OR description ILIKE $1
            ORDER BY seq ASC
            "#
        ))
        .bind(contains_pattern(query))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_product).collect()
    }

    async fn update_product(
        &self,
        product_id: ProductId,
        update: ProductUpdate,
    ) -> Result<Product> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE products
            SET name = COALESCE($2, name),
                description = COALESCE($3, description),
                price_cents = COALESCE($4, price_cents),
                image_url = COALESCE($5, image_url)
            WHERE id = $1
            RETURNING {PRODUCT_COLUMNS}
            "#
        ))
        .bind(product_id.as_uuid())
        .bind(update.name)
        .bind(update.description)
        .bind(update.price.map(|p| p.cents()))
        .bind(update.image_url)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Self::row_to_product(row),
            None => Err(StoreError::not_found("Product", product_id)),
        }
    }

    async fn delete_product(&self, product_id: ProductId) -> Result<()> {
        // cart_items rows go with it via ON DELETE CASCADE
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(product_id.as_uuid())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("Product", product_id));
        }
        Ok(())
    }

    async fn cart_lines(&self, user_id: UserId) -> Result<Option<Vec<CartLine>>> {
        let cart_id: Option<Uuid> = sqlx::query_scalar("SELECT id FROM carts WHERE user_id = $1")
            .bind(user_id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        match cart_id {
            Some(id) => Ok(Some(
                Self::lines_in_cart(&self.pool, CartId::from_uuid(id), false).await?,
            )),
            None => Ok(None),
        }
    }

    async fn add_cart_item(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: i32,
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let product: Option<Uuid> =
            sqlx::query_scalar("SELECT id FROM products WHERE id = $1 FOR SHARE")
                .bind(product_id.as_uuid())
                .fetch_optional(&mut *tx)
                .await?;
        if product.is_none() {
            return Err(StoreError::not_found("Product", product_id));
        }

        // The upsert takes the cart row lock, serializing with checkout.
        let cart_id: Uuid = sqlx::query_scalar(
            r#"
            INSERT INTO carts (id, user_id) VALUES ($1, $2)
            ON CONFLICT (user_id) DO UPDATE SET user_id = EXCLUDED.user_id
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id.as_uuid())
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO cart_items (id, cart_id, product_id, quantity) VALUES ($1, $2, $3, $4)
            ON CONFLICT (cart_id, product_id)
            DO UPDATE SET quantity = cart_items.quantity + EXCLUDED.quantity
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(cart_id)
        .bind(product_id.as_uuid())
        .bind(quantity)
        .execute(&mut *tx)
        .await
        .map_err(Self::map_quantity_overflow)?;

        tx.commit().await?;
        Ok(())
    }

    async fn set_cart_item_quantity(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: i32,
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        let cart_id = Self::find_cart_id(&mut *tx, user_id)
            .await?
            .ok_or_else(|| StoreError::not_found("Cart", user_id))?;

        let result =
            sqlx::query("UPDATE cart_items SET quantity = $3 WHERE cart_id = $1 AND product_id = $2")
                .bind(cart_id.as_uuid())
                .bind(product_id.as_uuid())
                .bind(quantity)
                .execute(&mut *tx)
                .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("Cart item", product_id));
        }

        tx.commit().await?;
        Ok(())
    }

    async fn remove_cart_item(&self, user_id: UserId, product_id: ProductId) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        let cart_id = Self::find_cart_id(&mut *tx, user_id)
            .await?
            .ok_or_else(|| StoreError::not_found("Cart", user_id))?;

        let result = sqlx::query("DELETE FROM cart_items WHERE cart_id = $1 AND product_id = $2")
            .bind(cart_id.as_uuid())
            .bind(product_id.as_uuid())
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("Cart item", product_id));
        }

        tx.commit().await?;
        Ok(())
    }

    async fn place_order<F, E>(&self, user_id: UserId, build: F) -> std::result::Result<Order, E>
    where
        F: FnOnce(&[CartLine]) -> std::result::Result<NewOrder, E> + Send,
        E: From<StoreError> + Send,
    {
        // Dropping `tx` on any early return rolls everything back.
        let mut tx = self.pool.begin().await.map_err(StoreError::from)?;

        let cart_id = Self::find_cart_id(&mut *tx, user_id).await?;
        let lines = match cart_id {
            Some(cart_id) => Self::lines_in_cart(&mut *tx, cart_id, true).await?,
            None => Vec::new(),
        };

        let new_order = build(&lines)?;
        tracing::debug!(%user_id, lines = new_order.items.len(), "Writing order");

        let order_id = OrderId::new();
        let created_at: DateTime<Utc> = sqlx::query_scalar(
            r#"
            INSERT INTO orders (id, user_id, total_price_cents, shipping_address, shipping_city,
                                shipping_postal_code, shipping_country)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING created_at
            "#,
        )
        .bind(order_id.as_uuid())
        .bind(user_id.as_uuid())
        .bind(new_order.total_price.cents())
        .bind(&new_order.shipping.street)
        .bind(&new_order.shipping.city)
        .bind(&new_order.shipping.postal_code)
        .bind(&new_order.shipping.country)
        .fetch_one(&mut *tx)
        .await
        .map_err(StoreError::from)?;

        for item in &new_order.items {
            sqlx::query(
                r#"
                INSERT INTO order_items (id, order_id, product_id, product_name, quantity, price_cents)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(order_id.as_uuid())
            .bind(item.product_id.as_uuid())
            .bind(&item.name)
            .bind(item.quantity)
            .bind(item.price.cents())
            .execute(&mut *tx)
            .await
            .map_err(StoreError::from)?;
        }

        if let Some(cart_id) = cart_id {
            sqlx::query("DELETE FROM cart_items WHERE cart_id = $1")
                .bind(cart_id.as_uuid())
                .execute(&mut *tx)
                .await
                .map_err(StoreError::from)?;
            sqlx::query("DELETE FROM carts WHERE id = $1")
                .bind(cart_id.as_uuid())
                .execute(&mut *tx)
                .await
                .map_err(StoreError::from)?;
        }

        tx.commit().await.map_err(StoreError::from)?;

        Ok(Order {
            id: order_id,
            user_id,
            total_price: new_order.total_price,
            shipping: new_order.shipping,
            created_at,
            items: new_order.items,
        })
    }

    async fn list_orders(&self, user_id: UserId) -> Result<Vec<Order>> {
        let order_rows = sqlx::query(
            r#"
            SELECT id, total_price_cents, shipping_address, shipping_city, shipping_postal_code,
                   shipping_country, created_at
            FROM orders
            WHERE user_id = $1
            ORDER BY seq ASC
            "#,
        )
        .bind(user_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        let order_ids = order_rows
            .iter()
            .map(|row| row.try_get::<Uuid, _>("id"))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let item_rows = sqlx::query(
            r#"
            SELECT order_id, product_id, product_name, quantity, price_cents
            FROM order_items
            WHERE order_id = ANY($1)
            ORDER BY seq ASC
            "#,
        )
        .bind(&order_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut items: HashMap<Uuid, Vec<OrderLine>> = HashMap::new();
        for row in item_rows {
            let order_id: Uuid = row.try_get("order_id")?;
            items.entry(order_id).or_default().push(OrderLine {
                product_id: ProductId::from_uuid(row.try_get::<Uuid, _>("product_id")?),
                name: row.try_get("product_name")?,
                quantity: row.try_get("quantity")?,
                price: Money::from_cents(row.try_get("price_cents")?),
            });
        }

        order_rows
            .into_iter()
            .map(|row| {
                let id: Uuid = row.try_get("id")?;
                Ok(Order {
                    id: OrderId::from_uuid(id),
                    user_id,
                    total_price: Money::from_cents(row.try_get("total_price_cents")?),
                    shipping: ShippingAddress {
                        street: row.try_get("shipping_address")?,
                        city: row.try_get("shipping_city")?,
                        postal_code: row.try_get("shipping_postal_code")?,
                        country: row.try_get("shipping_country")?,
                    },
                    created_at: row.try_get("created_at")?,
                    items: items.remove(&id).unwrap_or_default(),
                })
            })
            .collect()
    }
}
