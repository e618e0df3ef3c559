//! Postgres-backed shop store.
//!
//! The relational constraints live in `migrations/0001_store_schema.sql`; this
//! module only validates payloads and maps driver failures back onto
//! `StoreError`:
//!
//! | SQLx error | PostgreSQL code | StoreError | Scenario |
//! |------------|-----------------|------------|----------|
//! | Database (unique violation) | `23505` | `UniqueViolation` | duplicate slug, (order, product), (cart, product) |
//! | Database (foreign key violation) on insert/update | `23503` | `MissingReference` | referenced row does not exist |
//! | Database (foreign key violation) on delete | `23503` | `Protected` | RESTRICT relation still has dependents |
//! | Database (check constraint violation) | `23514` | `Domain(Validation)` | value rejected by a CHECK |
//! | RowNotFound | N/A | `NotFound` | addressed row does not exist |
//! | Other | N/A | `Database` | connection failures, pool closed, etc. |

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, QueryBuilder, Row, Transaction};
use tracing::{Span, info, instrument};
use uuid::Uuid;

use store_catalog::{
    Category, CategoryId, Comment, CommentId, CommentStatus, Discount, DiscountId, InventoryPredicate,
    NewCategory, NewComment, NewDiscount, NewProduct, Price, Product, ProductId, ProductQuery, Slug,
};
use store_core::DomainError;
use store_customers::{Address, Customer, CustomerId, Email, NewAddress, NewCustomer};
use store_sales::{
    Cart, CartId, CartItem, CartItemId, NewCartItem, NewOrder, NewOrderItem, Order, OrderId,
    OrderItem, OrderItemId, OrderStatus, Quantity,
};

use super::{OrderItemRow, ProductRow, ShopStore, StoreError, StoreResult};
use crate::pagination::Pagination;

const PRODUCT_COLUMNS: &str = "p.id, p.name, p.slug, p.description, p.price, p.inventory, \
     p.category_id, p.created_at, p.modified_at, c.title AS category_title";

/// Connection settings for [`PostgresShopStore::connect`].
#[derive(Debug, Clone)]
pub struct PgSettings {
    pub url: String,
    pub max_connections: u32,
    pub acquire_timeout: Duration,
}

/// Postgres-backed shop store.
///
/// `Send + Sync`; all statements go through the SQLx pool. Multi-row writes
/// run inside a transaction.
#[derive(Debug, Clone)]
pub struct PostgresShopStore {
    pool: Arc<PgPool>,
}

impl PostgresShopStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Open a pool with the given settings.
    pub async fn connect(settings: &PgSettings) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(settings.max_connections)
            .acquire_timeout(settings.acquire_timeout)
            .connect(&settings.url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    /// Apply the bundled schema migrations.
    #[instrument(skip(self), err)]
    pub async fn migrate(&self) -> StoreResult<()> {
        sqlx::migrate!("./migrations")
            .run(&*self.pool)
            .await
            .map_err(|e| StoreError::Database(format!("migration failed: {e}")))?;
        info!("schema migrations applied");
        Ok(())
    }

    async fn begin(&self) -> StoreResult<Transaction<'static, Postgres>> {
        self.pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))
    }

    async fn discount_ids_for(&self, ids: &[i64]) -> StoreResult<HashMap<ProductId, Vec<DiscountId>>> {
        let rows = sqlx::query(
            r#"
            SELECT product_id, discount_id
            FROM product_discounts
            WHERE product_id = ANY($1)
            ORDER BY product_id, discount_id
            "#,
        )
        .bind(ids)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_product_discounts", e))?;

        let mut out: HashMap<ProductId, Vec<DiscountId>> = HashMap::new();
        for row in rows {
            let product_id: i64 = row.try_get("product_id").map_err(decode_error)?;
            let discount_id: i64 = row.try_get("discount_id").map_err(decode_error)?;
            out.entry(ProductId::new(product_id))
                .or_default()
                .push(DiscountId::new(discount_id));
        }
        Ok(out)
    }

    async fn load_product(&self, id: ProductId) -> StoreResult<Product> {
        let row = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products p JOIN categories c ON c.id = p.category_id WHERE p.id = $1"
        ))
        .bind(id.get())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_product", e))?
        .ok_or(StoreError::NotFound)?;

        let mut product = product_row(&row)?.product;
        product.discount_ids = self
            .discount_ids_for(&[id.get()])
            .await?
            .remove(&id)
            .unwrap_or_default();
        Ok(product)
    }

    async fn touch_product(&self, tx: &mut Transaction<'static, Postgres>, id: ProductId) -> StoreResult<()> {
        let result = sqlx::query("UPDATE products SET modified_at = now() WHERE id = $1")
            .bind(id.get())
            .execute(&mut **tx)
            .await
            .map_err(|e| map_sqlx_error("touch_product", e))?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn delete_by_id(&self, operation: &str, entity: &str, sql: &str, id: i64) -> StoreResult<()> {
        let result = sqlx::query(sql)
            .bind(id)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_delete_error(operation, entity, e))?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

fn push_product_filters(qb: &mut QueryBuilder<'_, Postgres>, query: &ProductQuery) {
    qb.push(" WHERE TRUE");
    for predicate in &query.inventory {
        match *predicate {
            InventoryPredicate::Below(n) => {
                qb.push(" AND p.inventory < ").push_bind(i64::from(n));
            }
            InventoryPredicate::Between { low, high } => {
                qb.push(" AND p.inventory BETWEEN ")
                    .push_bind(i64::from(low))
                    .push(" AND ")
                    .push_bind(i64::from(high));
            }
            InventoryPredicate::Above(n) => {
                qb.push(" AND p.inventory > ").push_bind(i64::from(n));
            }
        }
    }
    if let Some(category_id) = query.category_id {
        qb.push(" AND p.category_id = ").push_bind(category_id.get());
    }
    if let Some(needle) = &query.category_title_contains {
        qb.push(" AND c.title ILIKE ")
            .push_bind(format!("%{}%", escape_like(needle)));
    }
    if let Some(prefix) = &query.name_starts_with {
        qb.push(" AND p.name ILIKE ")
            .push_bind(format!("{}%", escape_like(prefix)));
    }
    if let Some(since) = query.created_since {
        qb.push(" AND p.created_at >= ").push_bind(since);
    }
}

/// Escape `LIKE` metacharacters so user text matches literally.
fn escape_like(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn raw_ids<I: Copy + Into<i64>>(ids: &[I]) -> Vec<i64> {
    ids.iter().map(|id| (*id).into()).collect()
}

#[async_trait::async_trait]
impl ShopStore for PostgresShopStore {
    fn backend(&self) -> &'static str {
        "postgres"
    }

    #[instrument(skip(self, new), fields(operation = "insert_category"), err)]
    async fn insert_category(&self, new: NewCategory) -> StoreResult<Category> {
        new.validate()?;
        let row = sqlx::query(
            r#"
            INSERT INTO categories (title, description, top_product_id)
            VALUES ($1, $2, $3)
            RETURNING id
            "#,
        )
        .bind(&new.title)
        .bind(&new.description)
        .bind(new.top_product_id.map(ProductId::get))
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_category", e))?;
        let id: i64 = row.try_get("id").map_err(decode_error)?;
        Ok(new.into_category(CategoryId::new(id)))
    }

    async fn get_category(&self, id: CategoryId) -> StoreResult<Category> {
        let row = sqlx::query("SELECT id, title, description, top_product_id FROM categories WHERE id = $1")
            .bind(id.get())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_category", e))?
            .ok_or(StoreError::NotFound)?;
        category_row(&row)
    }

    async fn list_categories(&self) -> StoreResult<Vec<Category>> {
        let rows = sqlx::query("SELECT id, title, description, top_product_id FROM categories ORDER BY id")
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_categories", e))?;
        rows.iter().map(category_row).collect()
    }

    #[instrument(skip(self), fields(operation = "set_top_product"), err)]
    async fn set_top_product(
        &self,
        id: CategoryId,
        product_id: Option<ProductId>,
    ) -> StoreResult<Category> {
        let row = sqlx::query(
            r#"
            UPDATE categories SET top_product_id = $2
            WHERE id = $1
            RETURNING id, title, description, top_product_id
            "#,
        )
        .bind(id.get())
        .bind(product_id.map(ProductId::get))
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("set_top_product", e))?
        .ok_or(StoreError::NotFound)?;
        category_row(&row)
    }

    #[instrument(skip(self), fields(operation = "delete_category"), err)]
    async fn delete_category(&self, id: CategoryId) -> StoreResult<()> {
        self.delete_by_id("delete_category", "category", "DELETE FROM categories WHERE id = $1", id.get())
            .await
    }

    #[instrument(skip(self, new), fields(operation = "insert_discount"), err)]
    async fn insert_discount(&self, new: NewDiscount) -> StoreResult<Discount> {
        new.validate()?;
        let row = sqlx::query("INSERT INTO discounts (discount, description) VALUES ($1, $2) RETURNING id")
            .bind(new.discount)
            .bind(&new.description)
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("insert_discount", e))?;
        let id: i64 = row.try_get("id").map_err(decode_error)?;
        Ok(new.into_discount(DiscountId::new(id)))
    }

    async fn list_discounts(&self) -> StoreResult<Vec<Discount>> {
        let rows = sqlx::query("SELECT id, discount, description FROM discounts ORDER BY id")
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_discounts", e))?;
        rows.iter().map(discount_row).collect()
    }

    #[instrument(skip(self), fields(operation = "delete_discount"), err)]
    async fn delete_discount(&self, id: DiscountId) -> StoreResult<()> {
        self.delete_by_id("delete_discount", "discount", "DELETE FROM discounts WHERE id = $1", id.get())
            .await
    }

    #[instrument(skip(self, new), fields(operation = "insert_product"), err)]
    async fn insert_product(&self, new: NewProduct) -> StoreResult<Product> {
        new.validate()?;
        let slug = new.resolved_slug();
        let mut tx = self.begin().await?;

        let row = sqlx::query(
            r#"
            INSERT INTO products (name, slug, description, price, inventory, category_id)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, created_at
            "#,
        )
        .bind(&new.name)
        .bind(slug.as_str())
        .bind(&new.description)
        .bind(new.price.amount())
        .bind(new.inventory as i32)
        .bind(new.category_id.get())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("insert_product", e))?;
        let id = ProductId::new(row.try_get("id").map_err(decode_error)?);
        let created_at: DateTime<Utc> = row.try_get("created_at").map_err(decode_error)?;

        let product = new.into_product(id, created_at);
        for discount_id in &product.discount_ids {
            sqlx::query("INSERT INTO product_discounts (product_id, discount_id) VALUES ($1, $2)")
                .bind(id.get())
                .bind(discount_id.get())
                .execute(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("link_discount", e))?;
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(product)
    }

    async fn get_product(&self, id: ProductId) -> StoreResult<Product> {
        self.load_product(id).await
    }

    #[instrument(skip(self, query), fields(operation = "fetch_products", row_count), err)]
    async fn fetch_products(
        &self,
        query: &ProductQuery,
        page: Option<Pagination>,
    ) -> StoreResult<(Vec<ProductRow>, u64)> {
        let mut count =
            QueryBuilder::new("SELECT COUNT(*) AS total FROM products p JOIN categories c ON c.id = p.category_id");
        push_product_filters(&mut count, query);
        let total: i64 = count
            .build()
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("count_products", e))?
            .try_get("total")
            .map_err(decode_error)?;

        let mut select = QueryBuilder::new(format!(
            "SELECT {PRODUCT_COLUMNS} FROM products p JOIN categories c ON c.id = p.category_id"
        ));
        push_product_filters(&mut select, query);
        select.push(" ORDER BY p.id ASC");
        if let Some(page) = page {
            select
                .push(" LIMIT ")
                .push_bind(i64::from(page.limit))
                .push(" OFFSET ")
                .push_bind(i64::from(page.offset));
        }
        let rows = select
            .build()
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("fetch_products", e))?;

        let mut out = rows.iter().map(product_row).collect::<StoreResult<Vec<_>>>()?;
        let ids: Vec<i64> = out.iter().map(|r| r.product.id.get()).collect();
        let mut links = self.discount_ids_for(&ids).await?;
        for row in &mut out {
            row.product.discount_ids = links.remove(&row.product.id).unwrap_or_default();
        }

        Span::current().record("row_count", out.len());
        Ok((out, total as u64))
    }

    #[instrument(skip(self), fields(operation = "update_product_price"), err)]
    async fn update_product_price(&self, id: ProductId, price: Price) -> StoreResult<Product> {
        let result = sqlx::query("UPDATE products SET price = $2, modified_at = now() WHERE id = $1")
            .bind(id.get())
            .bind(price.amount())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("update_product_price", e))?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        self.load_product(id).await
    }

    #[instrument(skip(self), fields(operation = "attach_discount"), err)]
    async fn attach_discount(&self, id: ProductId, discount_id: DiscountId) -> StoreResult<Product> {
        let mut tx = self.begin().await?;
        self.touch_product(&mut tx, id).await?;
        sqlx::query(
            r#"
            INSERT INTO product_discounts (product_id, discount_id)
            VALUES ($1, $2)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(id.get())
        .bind(discount_id.get())
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("attach_discount", e))?;
        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        self.load_product(id).await
    }

    #[instrument(skip(self), fields(operation = "detach_discount"), err)]
    async fn detach_discount(&self, id: ProductId, discount_id: DiscountId) -> StoreResult<Product> {
        let mut tx = self.begin().await?;
        self.touch_product(&mut tx, id).await?;
        sqlx::query("DELETE FROM product_discounts WHERE product_id = $1 AND discount_id = $2")
            .bind(id.get())
            .bind(discount_id.get())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("detach_discount", e))?;
        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        self.load_product(id).await
    }

    #[instrument(skip(self, ids), fields(operation = "clear_inventory", requested = ids.len()), err)]
    async fn clear_inventory(&self, ids: &[ProductId]) -> StoreResult<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        let result = sqlx::query("UPDATE products SET inventory = 0 WHERE id = ANY($1)")
            .bind(raw_ids(ids))
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("clear_inventory", e))?;
        let updated = result.rows_affected();
        info!(updated, "inventory cleared");
        Ok(updated)
    }

    #[instrument(skip(self), fields(operation = "delete_product"), err)]
    async fn delete_product(&self, id: ProductId) -> StoreResult<()> {
        self.delete_by_id("delete_product", "product", "DELETE FROM products WHERE id = $1", id.get())
            .await
    }

    async fn comment_counts(&self, ids: &[ProductId]) -> StoreResult<HashMap<ProductId, u64>> {
        let rows = sqlx::query(
            r#"
            SELECT product_id, COUNT(*) AS comments_count
            FROM comments
            WHERE product_id = ANY($1)
            GROUP BY product_id
            "#,
        )
        .bind(raw_ids(ids))
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("comment_counts", e))?;

        let mut out = HashMap::with_capacity(rows.len());
        for row in rows {
            let id: i64 = row.try_get("product_id").map_err(decode_error)?;
            let n: i64 = row.try_get("comments_count").map_err(decode_error)?;
            out.insert(ProductId::new(id), n as u64);
        }
        Ok(out)
    }

    async fn discounts_for(
        &self,
        ids: &[ProductId],
    ) -> StoreResult<HashMap<ProductId, Vec<Discount>>> {
        let rows = sqlx::query(
            r#"
            SELECT pd.product_id, d.id, d.discount, d.description
            FROM product_discounts pd
            JOIN discounts d ON d.id = pd.discount_id
            WHERE pd.product_id = ANY($1)
            ORDER BY pd.product_id, d.id
            "#,
        )
        .bind(raw_ids(ids))
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("discounts_for", e))?;

        let mut out: HashMap<ProductId, Vec<Discount>> =
            ids.iter().map(|id| (*id, Vec::new())).collect();
        for row in &rows {
            let product_id: i64 = row.try_get("product_id").map_err(decode_error)?;
            out.entry(ProductId::new(product_id))
                .or_default()
                .push(discount_row(row)?);
        }
        Ok(out)
    }

    #[instrument(skip(self, new), fields(operation = "insert_comment"), err)]
    async fn insert_comment(&self, new: NewComment) -> StoreResult<Comment> {
        new.validate()?;
        let row = sqlx::query(
            r#"
            INSERT INTO comments (product_id, name, body, status)
            VALUES ($1, $2, $3, $4)
            RETURNING id, created_at
            "#,
        )
        .bind(new.product_id.get())
        .bind(&new.name)
        .bind(&new.body)
        .bind(new.status.code())
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_comment", e))?;
        let id: i64 = row.try_get("id").map_err(decode_error)?;
        let created_at: DateTime<Utc> = row.try_get("created_at").map_err(decode_error)?;
        Ok(new.into_comment(CommentId::new(id), created_at))
    }

    async fn fetch_comments(
        &self,
        product_id: Option<ProductId>,
        page: Pagination,
    ) -> StoreResult<(Vec<Comment>, u64)> {
        let product_id = product_id.map(ProductId::get);
        let total: i64 = sqlx::query(
            "SELECT COUNT(*) AS total FROM comments WHERE ($1::bigint IS NULL OR product_id = $1)",
        )
        .bind(product_id)
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("count_comments", e))?
        .try_get("total")
        .map_err(decode_error)?;

        let rows = sqlx::query(
            r#"
            SELECT id, product_id, name, body, created_at, status
            FROM comments
            WHERE ($1::bigint IS NULL OR product_id = $1)
            ORDER BY id
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(product_id)
        .bind(i64::from(page.limit))
        .bind(i64::from(page.offset))
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("fetch_comments", e))?;

        let comments = rows.iter().map(comment_row).collect::<StoreResult<Vec<_>>>()?;
        Ok((comments, total as u64))
    }

    #[instrument(skip(self), fields(operation = "update_comment_status"), err)]
    async fn update_comment_status(
        &self,
        id: CommentId,
        status: CommentStatus,
    ) -> StoreResult<Comment> {
        let row = sqlx::query(
            r#"
            UPDATE comments SET status = $2
            WHERE id = $1
            RETURNING id, product_id, name, body, created_at, status
            "#,
        )
        .bind(id.get())
        .bind(status.code())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("update_comment_status", e))?
        .ok_or(StoreError::NotFound)?;
        comment_row(&row)
    }

    async fn delete_comment(&self, id: CommentId) -> StoreResult<()> {
        self.delete_by_id("delete_comment", "comment", "DELETE FROM comments WHERE id = $1", id.get())
            .await
    }

    #[instrument(skip(self, new), fields(operation = "insert_customer"), err)]
    async fn insert_customer(&self, new: NewCustomer) -> StoreResult<Customer> {
        new.validate()?;
        let row = sqlx::query(
            r#"
            INSERT INTO customers (first_name, last_name, email, phone_number)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            "#,
        )
        .bind(&new.first_name)
        .bind(&new.last_name)
        .bind(new.email.as_str())
        .bind(&new.phone_number)
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_customer", e))?;
        let id: i64 = row.try_get("id").map_err(decode_error)?;
        Ok(new.into_customer(CustomerId::new(id)))
    }

    async fn get_customer(&self, id: CustomerId) -> StoreResult<Customer> {
        let row = sqlx::query(
            "SELECT id, first_name, last_name, email, phone_number FROM customers WHERE id = $1",
        )
        .bind(id.get())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_customer", e))?
        .ok_or(StoreError::NotFound)?;
        customer_row(&row)
    }

    async fn fetch_customers(
        &self,
        search: Option<&str>,
        page: Pagination,
    ) -> StoreResult<(Vec<Customer>, u64)> {
        let pattern = search.map(|s| format!("{}%", escape_like(s)));
        let total: i64 = sqlx::query(
            r#"
            SELECT COUNT(*) AS total FROM customers
            WHERE ($1::text IS NULL OR first_name ILIKE $1 OR last_name ILIKE $1)
            "#,
        )
        .bind(pattern.as_deref())
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("count_customers", e))?
        .try_get("total")
        .map_err(decode_error)?;

        let rows = sqlx::query(
            r#"
            SELECT id, first_name, last_name, email, phone_number FROM customers
            WHERE ($1::text IS NULL OR first_name ILIKE $1 OR last_name ILIKE $1)
            ORDER BY lower(first_name), lower(last_name), id
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(pattern.as_deref())
        .bind(i64::from(page.limit))
        .bind(i64::from(page.offset))
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("fetch_customers", e))?;

        let customers = rows.iter().map(customer_row).collect::<StoreResult<Vec<_>>>()?;
        Ok((customers, total as u64))
    }

    async fn customers_by_id(
        &self,
        ids: &[CustomerId],
    ) -> StoreResult<HashMap<CustomerId, Customer>> {
        let rows = sqlx::query(
            "SELECT id, first_name, last_name, email, phone_number FROM customers WHERE id = ANY($1)",
        )
        .bind(raw_ids(ids))
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("customers_by_id", e))?;
        rows.iter()
            .map(|row| customer_row(row).map(|c| (c.id, c)))
            .collect()
    }

    #[instrument(skip(self), fields(operation = "delete_customer"), err)]
    async fn delete_customer(&self, id: CustomerId) -> StoreResult<()> {
        self.delete_by_id("delete_customer", "customer", "DELETE FROM customers WHERE id = $1", id.get())
            .await
    }

    #[instrument(skip(self, new), fields(operation = "upsert_address"), err)]
    async fn upsert_address(
        &self,
        customer_id: CustomerId,
        new: NewAddress,
    ) -> StoreResult<Address> {
        new.validate()?;
        sqlx::query(
            r#"
            INSERT INTO addresses (customer_id, province, city, street)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (customer_id) DO UPDATE SET
                province = EXCLUDED.province,
                city = EXCLUDED.city,
                street = EXCLUDED.street
            "#,
        )
        .bind(customer_id.get())
        .bind(&new.province)
        .bind(&new.city)
        .bind(&new.street)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("upsert_address", e))?;
        Ok(new.into_address(customer_id))
    }

    async fn get_address(&self, customer_id: CustomerId) -> StoreResult<Address> {
        let row = sqlx::query(
            "SELECT customer_id, province, city, street FROM addresses WHERE customer_id = $1",
        )
        .bind(customer_id.get())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_address", e))?
        .ok_or(StoreError::NotFound)?;
        Ok(Address {
            customer_id: CustomerId::new(row.try_get("customer_id").map_err(decode_error)?),
            province: row.try_get("province").map_err(decode_error)?,
            city: row.try_get("city").map_err(decode_error)?,
            street: row.try_get("street").map_err(decode_error)?,
        })
    }

    #[instrument(skip(self, new), fields(operation = "insert_order", items = new.items.len()), err)]
    async fn insert_order(&self, new: NewOrder) -> StoreResult<(Order, Vec<OrderItem>)> {
        new.validate()?;
        let mut tx = self.begin().await?;

        let row = sqlx::query(
            r#"
            INSERT INTO orders (customer_id, status)
            VALUES ($1, $2)
            RETURNING id, created_at
            "#,
        )
        .bind(new.customer_id.get())
        .bind(new.status.code())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("insert_order", e))?;
        let id = OrderId::new(row.try_get("id").map_err(decode_error)?);
        let created_at: DateTime<Utc> = row.try_get("created_at").map_err(decode_error)?;

        let (order, new_items) = new.into_order(id, created_at);
        let mut items = Vec::with_capacity(new_items.len());
        for new_item in new_items {
            items.push(insert_order_item(&mut tx, id, new_item).await?);
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok((order, items))
    }

    async fn get_order(&self, id: OrderId) -> StoreResult<Order> {
        let row = sqlx::query("SELECT id, customer_id, created_at, status FROM orders WHERE id = $1")
            .bind(id.get())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_order", e))?
            .ok_or(StoreError::NotFound)?;
        order_row(&row)
    }

    async fn fetch_orders(&self, page: Pagination) -> StoreResult<(Vec<Order>, u64)> {
        let total: i64 = sqlx::query("SELECT COUNT(*) AS total FROM orders")
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("count_orders", e))?
            .try_get("total")
            .map_err(decode_error)?;

        let rows = sqlx::query(
            r#"
            SELECT id, customer_id, created_at, status FROM orders
            ORDER BY created_at DESC, id DESC
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(i64::from(page.limit))
        .bind(i64::from(page.offset))
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("fetch_orders", e))?;

        let orders = rows.iter().map(order_row).collect::<StoreResult<Vec<_>>>()?;
        Ok((orders, total as u64))
    }

    async fn item_counts(&self, ids: &[OrderId]) -> StoreResult<HashMap<OrderId, u64>> {
        let rows = sqlx::query(
            r#"
            SELECT order_id, COUNT(*) AS items_count
            FROM order_items
            WHERE order_id = ANY($1)
            GROUP BY order_id
            "#,
        )
        .bind(raw_ids(ids))
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("item_counts", e))?;

        let mut out = HashMap::with_capacity(rows.len());
        for row in rows {
            let id: i64 = row.try_get("order_id").map_err(decode_error)?;
            let n: i64 = row.try_get("items_count").map_err(decode_error)?;
            out.insert(OrderId::new(id), n as u64);
        }
        Ok(out)
    }

    async fn items_for(&self, ids: &[OrderId]) -> StoreResult<HashMap<OrderId, Vec<OrderItem>>> {
        let rows = sqlx::query(
            r#"
            SELECT id, order_id, product_id, quantity, price
            FROM order_items
            WHERE order_id = ANY($1)
            ORDER BY order_id, id
            "#,
        )
        .bind(raw_ids(ids))
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("items_for", e))?;

        let mut out: HashMap<OrderId, Vec<OrderItem>> = HashMap::new();
        for row in &rows {
            let item = order_item_row(row)?;
            out.entry(item.order_id).or_default().push(item);
        }
        Ok(out)
    }

    async fn fetch_order_items(&self, page: Pagination) -> StoreResult<(Vec<OrderItemRow>, u64)> {
        let total: i64 = sqlx::query("SELECT COUNT(*) AS total FROM order_items")
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("count_order_items", e))?
            .try_get("total")
            .map_err(decode_error)?;

        let rows = sqlx::query(
            r#"
            SELECT oi.id, oi.order_id, oi.product_id, oi.quantity, oi.price,
                   p.name AS product_name
            FROM order_items oi
            JOIN products p ON p.id = oi.product_id
            ORDER BY oi.id
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(i64::from(page.limit))
        .bind(i64::from(page.offset))
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("fetch_order_items", e))?;

        let mut out = Vec::with_capacity(rows.len());
        for row in &rows {
            out.push(OrderItemRow {
                item: order_item_row(row)?,
                product_name: row.try_get("product_name").map_err(decode_error)?,
            });
        }
        Ok((out, total as u64))
    }

    #[instrument(skip(self, new), fields(operation = "add_order_item"), err)]
    async fn add_order_item(&self, order_id: OrderId, new: NewOrderItem) -> StoreResult<OrderItem> {
        let mut tx = self.begin().await?;
        let item = insert_order_item(&mut tx, order_id, new).await?;
        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(item)
    }

    #[instrument(skip(self), fields(operation = "update_order_status"), err)]
    async fn update_order_status(&self, id: OrderId, status: OrderStatus) -> StoreResult<Order> {
        let row = sqlx::query(
            r#"
            UPDATE orders SET status = $2
            WHERE id = $1
            RETURNING id, customer_id, created_at, status
            "#,
        )
        .bind(id.get())
        .bind(status.code())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("update_order_status", e))?
        .ok_or(StoreError::NotFound)?;
        order_row(&row)
    }

    async fn delete_order_item(&self, id: OrderItemId) -> StoreResult<()> {
        self.delete_by_id("delete_order_item", "order item", "DELETE FROM order_items WHERE id = $1", id.get())
            .await
    }

    #[instrument(skip(self), fields(operation = "delete_order"), err)]
    async fn delete_order(&self, id: OrderId) -> StoreResult<()> {
        self.delete_by_id("delete_order", "order", "DELETE FROM orders WHERE id = $1", id.get())
            .await
    }

    async fn create_cart(&self) -> StoreResult<Cart> {
        let cart = Cart::open(Utc::now());
        sqlx::query("INSERT INTO carts (id, created_at) VALUES ($1, $2)")
            .bind(cart.id.as_uuid())
            .bind(cart.created_at)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("create_cart", e))?;
        Ok(cart)
    }

    async fn get_cart(&self, id: CartId) -> StoreResult<Cart> {
        let row = sqlx::query("SELECT id, created_at FROM carts WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_cart", e))?
            .ok_or(StoreError::NotFound)?;
        let uuid: Uuid = row.try_get("id").map_err(decode_error)?;
        Ok(Cart {
            id: CartId::from_uuid(uuid),
            created_at: row.try_get("created_at").map_err(decode_error)?,
        })
    }

    async fn cart_items(&self, id: CartId) -> StoreResult<Vec<CartItem>> {
        self.get_cart(id).await?;
        let rows = sqlx::query(
            "SELECT id, cart_id, product_id, quantity FROM cart_items WHERE cart_id = $1 ORDER BY id",
        )
        .bind(id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("cart_items", e))?;
        rows.iter().map(cart_item_row).collect()
    }

    #[instrument(skip(self, new), fields(operation = "add_cart_item"), err)]
    async fn add_cart_item(&self, cart_id: CartId, new: NewCartItem) -> StoreResult<CartItem> {
        let row = sqlx::query(
            r#"
            INSERT INTO cart_items (cart_id, product_id, quantity)
            VALUES ($1, $2, $3)
            RETURNING id
            "#,
        )
        .bind(cart_id.as_uuid())
        .bind(new.product_id.get())
        .bind(new.quantity.get() as i16)
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("add_cart_item", e))?;
        let id: i64 = row.try_get("id").map_err(decode_error)?;
        Ok(new.into_item(CartItemId::new(id), cart_id))
    }

    async fn delete_cart_item(&self, id: CartItemId) -> StoreResult<()> {
        self.delete_by_id("delete_cart_item", "cart item", "DELETE FROM cart_items WHERE id = $1", id.get())
            .await
    }

    async fn delete_cart(&self, id: CartId) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM carts WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_delete_error("delete_cart", "cart", e))?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

/// Insert one order item, capturing the product's current price when the
/// payload carries no snapshot.
async fn insert_order_item(
    tx: &mut Transaction<'static, Postgres>,
    order_id: OrderId,
    new: NewOrderItem,
) -> StoreResult<OrderItem> {
    let row = sqlx::query(
        r#"
        INSERT INTO order_items (order_id, product_id, quantity, price)
        SELECT $1, p.id, $3, COALESCE($4, p.price)
        FROM products p
        WHERE p.id = $2
        RETURNING id, price
        "#,
    )
    .bind(order_id.get())
    .bind(new.product_id.get())
    .bind(new.quantity.get() as i16)
    .bind(new.price.map(|p| p.amount()))
    .fetch_optional(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error("insert_order_item", e))?
    .ok_or_else(|| StoreError::missing(format!("product {}", new.product_id)))?;

    let id: i64 = row.try_get("id").map_err(decode_error)?;
    let price = decode_price(row.try_get("price").map_err(decode_error)?)?;
    Ok(new.into_item(OrderItemId::new(id), order_id, price))
}

// Row decoding

fn decode_error(err: sqlx::Error) -> StoreError {
    StoreError::Database(format!("failed to decode row: {err}"))
}

fn corrupt(err: DomainError) -> StoreError {
    StoreError::Database(format!("stored row violates domain rules: {err}"))
}

fn decode_price(amount: Decimal) -> StoreResult<Price> {
    Price::new(amount).map_err(corrupt)
}

fn category_row(row: &PgRow) -> StoreResult<Category> {
    let top: Option<i64> = row.try_get("top_product_id").map_err(decode_error)?;
    Ok(Category {
        id: CategoryId::new(row.try_get("id").map_err(decode_error)?),
        title: row.try_get("title").map_err(decode_error)?,
        description: row.try_get("description").map_err(decode_error)?,
        top_product_id: top.map(ProductId::new),
    })
}

fn discount_row(row: &PgRow) -> StoreResult<Discount> {
    Ok(Discount {
        id: DiscountId::new(row.try_get("id").map_err(decode_error)?),
        discount: row.try_get("discount").map_err(decode_error)?,
        description: row.try_get("description").map_err(decode_error)?,
    })
}

fn product_row(row: &PgRow) -> StoreResult<ProductRow> {
    let slug: String = row.try_get("slug").map_err(decode_error)?;
    let inventory: i32 = row.try_get("inventory").map_err(decode_error)?;
    let product = Product {
        id: ProductId::new(row.try_get("id").map_err(decode_error)?),
        name: row.try_get("name").map_err(decode_error)?,
        slug: Slug::parse(slug).map_err(corrupt)?,
        description: row.try_get("description").map_err(decode_error)?,
        price: decode_price(row.try_get("price").map_err(decode_error)?)?,
        inventory: u32::try_from(inventory)
            .map_err(|_| StoreError::Database(format!("negative inventory {inventory}")))?,
        category_id: CategoryId::new(row.try_get("category_id").map_err(decode_error)?),
        created_at: row.try_get("created_at").map_err(decode_error)?,
        modified_at: row.try_get("modified_at").map_err(decode_error)?,
        discount_ids: Vec::new(),
    };
    Ok(ProductRow {
        product,
        category_title: row.try_get("category_title").map_err(decode_error)?,
    })
}

fn comment_row(row: &PgRow) -> StoreResult<Comment> {
    let status: String = row.try_get("status").map_err(decode_error)?;
    Ok(Comment {
        id: CommentId::new(row.try_get("id").map_err(decode_error)?),
        product_id: ProductId::new(row.try_get("product_id").map_err(decode_error)?),
        name: row.try_get("name").map_err(decode_error)?,
        body: row.try_get("body").map_err(decode_error)?,
        created_at: row.try_get("created_at").map_err(decode_error)?,
        status: CommentStatus::from_code(status.trim()).map_err(corrupt)?,
    })
}

fn customer_row(row: &PgRow) -> StoreResult<Customer> {
    let email: String = row.try_get("email").map_err(decode_error)?;
    Ok(Customer {
        id: CustomerId::new(row.try_get("id").map_err(decode_error)?),
        first_name: row.try_get("first_name").map_err(decode_error)?,
        last_name: row.try_get("last_name").map_err(decode_error)?,
        email: Email::parse(email).map_err(corrupt)?,
        phone_number: row.try_get("phone_number").map_err(decode_error)?,
    })
}

fn order_row(row: &PgRow) -> StoreResult<Order> {
    let status: String = row.try_get("status").map_err(decode_error)?;
    Ok(Order {
        id: OrderId::new(row.try_get("id").map_err(decode_error)?),
        customer_id: CustomerId::new(row.try_get("customer_id").map_err(decode_error)?),
        created_at: row.try_get("created_at").map_err(decode_error)?,
        status: OrderStatus::from_code(status.trim()).map_err(corrupt)?,
    })
}

fn order_item_row(row: &PgRow) -> StoreResult<OrderItem> {
    let quantity: i16 = row.try_get("quantity").map_err(decode_error)?;
    Ok(OrderItem {
        id: OrderItemId::new(row.try_get("id").map_err(decode_error)?),
        order_id: OrderId::new(row.try_get("order_id").map_err(decode_error)?),
        product_id: ProductId::new(row.try_get("product_id").map_err(decode_error)?),
        quantity: Quantity::new(i64::from(quantity)).map_err(corrupt)?,
        price: decode_price(row.try_get("price").map_err(decode_error)?)?,
    })
}

fn cart_item_row(row: &PgRow) -> StoreResult<CartItem> {
    let quantity: i16 = row.try_get("quantity").map_err(decode_error)?;
    let cart_id: Uuid = row.try_get("cart_id").map_err(decode_error)?;
    Ok(CartItem {
        id: CartItemId::new(row.try_get("id").map_err(decode_error)?),
        cart_id: CartId::from_uuid(cart_id),
        product_id: ProductId::new(row.try_get("product_id").map_err(decode_error)?),
        quantity: Quantity::new(i64::from(quantity)).map_err(corrupt)?,
    })
}

// Error mapping

fn sqlstate(err: &sqlx::Error) -> Option<String> {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().map(|c| c.into_owned()),
        _ => None,
    }
}

fn constraint_name(err: &sqlx::Error) -> String {
    match err {
        sqlx::Error::Database(db_err) => db_err
            .constraint()
            .map(str::to_string)
            .unwrap_or_else(|| db_err.message().to_string()),
        other => other.to_string(),
    }
}

/// Map a SQLx error from a delete; foreign-key failures mean a RESTRICT
/// relation still has dependents.
fn map_delete_error(operation: &str, entity: &str, err: sqlx::Error) -> StoreError {
    if sqlstate(&err).as_deref() == Some("23503") {
        return StoreError::protected(entity, constraint_name(&err));
    }
    map_sqlx_error(operation, err)
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(ref db_err) => {
            let msg = format!("{operation}: {}", constraint_name(&err));
            match db_err.code().as_deref() {
                Some("23505") => StoreError::UniqueViolation(msg),
                Some("23503") => StoreError::MissingReference(msg),
                Some("23514") => StoreError::Domain(DomainError::validation(msg)),
                _ => StoreError::Database(format!(
                    "database error in {operation}: {}",
                    db_err.message()
                )),
            }
        }
        sqlx::Error::RowNotFound => StoreError::NotFound,
        sqlx::Error::PoolClosed => {
            StoreError::Database(format!("connection pool closed in {operation}"))
        }
        other => StoreError::Database(format!("sqlx error in {operation}: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_metacharacters_are_escaped() {
        assert_eq!(escape_like("the"), "the");
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
    }

    #[test]
    fn product_filters_render_in_declaration_order() {
        let query = ProductQuery::all()
            .inventory(InventoryPredicate::Between { low: 3, high: 10 })
            .category_title_icontains("the")
            .name_istartswith("mu");
        let mut qb = QueryBuilder::<Postgres>::new("SELECT 1 FROM products p JOIN categories c ON c.id = p.category_id");
        push_product_filters(&mut qb, &query);
        assert_eq!(
            qb.sql(),
            "SELECT 1 FROM products p JOIN categories c ON c.id = p.category_id WHERE TRUE \
             AND p.inventory BETWEEN $1 AND $2 AND c.title ILIKE $3 AND p.name ILIKE $4"
        );
    }

    #[test]
    fn non_database_errors_map_to_database_variant() {
        assert!(matches!(map_sqlx_error("op", sqlx::Error::RowNotFound), StoreError::NotFound));
        assert!(matches!(
            map_sqlx_error("op", sqlx::Error::PoolClosed),
            StoreError::Database(_)
        ));
    }

    /// Exercised only when `DATABASE_URL` points at a scratch database.
    #[tokio::test]
    async fn protected_delete_round_trip_against_postgres() {
        let Ok(url) = std::env::var("DATABASE_URL") else {
            return;
        };
        let store = PostgresShopStore::connect(&PgSettings {
            url,
            max_connections: 2,
            acquire_timeout: Duration::from_secs(5),
        })
        .await
        .unwrap();
        store.migrate().await.unwrap();

        let category = store
            .insert_category(NewCategory::new("The Shop"))
            .await
            .unwrap();
        let product = store
            .insert_product(NewProduct::new(
                format!("Mug {}", Uuid::new_v4().simple()),
                category.id,
                Price::zero(),
                4,
            ))
            .await
            .unwrap();

        let err = store.delete_category(category.id).await.unwrap_err();
        assert!(matches!(err, StoreError::Protected { .. }));

        assert_eq!(store.clear_inventory(&[product.id]).await.unwrap(), 1);

        let buyer = store
            .insert_customer(NewCustomer {
                first_name: "Ada".into(),
                last_name: "Lovelace".into(),
                email: Email::parse(format!("{}@example.com", Uuid::new_v4().simple())).unwrap(),
                phone_number: "555-0100".into(),
            })
            .await
            .unwrap();
        let snapshot: Price = "3.25".parse().unwrap();
        let (order, items) = store
            .insert_order(NewOrder {
                customer_id: buyer.id,
                status: OrderStatus::Unpaid,
                items: vec![NewOrderItem {
                    product_id: product.id,
                    quantity: Quantity::new(2).unwrap(),
                    price: Some(snapshot),
                }],
            })
            .await
            .unwrap();
        assert_eq!(items[0].price, snapshot);
        let err = store.delete_product(product.id).await.unwrap_err();
        assert!(matches!(err, StoreError::Protected { .. }));

        store.delete_order_item(items[0].id).await.unwrap();
        store.delete_order(order.id).await.unwrap();
        store.delete_customer(buyer.id).await.unwrap();
        store.delete_product(product.id).await.unwrap();
        store.delete_category(category.id).await.unwrap();
    }
}
