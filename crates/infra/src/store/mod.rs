//! Relational storage boundary.
//!
//! `ShopStore` exposes the primitives the read-model services compose
//! (filtered fetch with a category join, grouped counts, batched loads, the
//! bulk inventory update) plus the inserts, edits and deletes behind the admin
//! editors. Two backends implement it:
//!
//! - [`InMemoryShopStore`]: all tables behind one lock, with the relational
//!   constraints (uniqueness, references, PROTECT/CASCADE) enforced in Rust.
//! - [`PostgresShopStore`]: the same constraints declared in the migration
//!   DDL, with driver errors mapped back onto [`StoreError`].
//!
//! Both backends validate the domain payload before touching any table.

use std::collections::HashMap;

use serde::Serialize;
use thiserror::Error;

use store_catalog::{
    Category, CategoryId, Comment, CommentId, CommentStatus, Discount, DiscountId, NewCategory,
    NewComment, NewDiscount, NewProduct, Price, Product, ProductId, ProductQuery,
};
use store_core::DomainError;
use store_customers::{Address, Customer, CustomerId, NewAddress, NewCustomer};
use store_sales::{
    Cart, CartId, CartItem, CartItemId, NewCartItem, NewOrder, NewOrderItem, Order, OrderId,
    OrderItem, OrderItemId, OrderStatus,
};

use crate::pagination::Pagination;

pub mod in_memory;
pub mod postgres;

pub use in_memory::InMemoryShopStore;
pub use postgres::PostgresShopStore;

pub type StoreResult<T> = Result<T, StoreError>;

/// Storage operation error.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The payload failed domain validation; nothing was written.
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// A uniqueness constraint rejected the write.
    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),

    /// A PROTECT-ed row still has dependents.
    #[error("cannot delete {entity}: referenced by {dependents}")]
    Protected { entity: String, dependents: String },

    /// The write referenced a row that does not exist.
    #[error("missing reference: {0}")]
    MissingReference(String),

    #[error("not found")]
    NotFound,

    #[error("database error: {0}")]
    Database(String),
}

impl StoreError {
    pub fn protected(entity: impl Into<String>, dependents: impl Into<String>) -> Self {
        Self::Protected {
            entity: entity.into(),
            dependents: dependents.into(),
        }
    }

    pub fn missing(what: impl Into<String>) -> Self {
        Self::MissingReference(what.into())
    }

    pub fn unique(what: impl Into<String>) -> Self {
        Self::UniqueViolation(what.into())
    }
}

/// A product joined with its category title.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductRow {
    pub product: Product,
    pub category_title: String,
}

/// An order item joined with its product name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderItemRow {
    #[serde(flatten)]
    pub item: OrderItem,
    pub product_name: String,
}

/// Async relational store for the shop schema.
#[async_trait::async_trait]
pub trait ShopStore: Send + Sync {
    /// Human-readable backend name for logs and `/health`.
    fn backend(&self) -> &'static str;

    // Categories

    async fn insert_category(&self, new: NewCategory) -> StoreResult<Category>;
    async fn get_category(&self, id: CategoryId) -> StoreResult<Category>;
    async fn list_categories(&self) -> StoreResult<Vec<Category>>;
    async fn set_top_product(
        &self,
        id: CategoryId,
        product_id: Option<ProductId>,
    ) -> StoreResult<Category>;
    /// PROTECT: fails while any product belongs to the category.
    async fn delete_category(&self, id: CategoryId) -> StoreResult<()>;

    // Discounts

    async fn insert_discount(&self, new: NewDiscount) -> StoreResult<Discount>;
    async fn list_discounts(&self) -> StoreResult<Vec<Discount>>;
    /// Removes the discount and its product links.
    async fn delete_discount(&self, id: DiscountId) -> StoreResult<()>;

    // Products

    async fn insert_product(&self, new: NewProduct) -> StoreResult<Product>;
    async fn get_product(&self, id: ProductId) -> StoreResult<Product>;
    /// Products matching `query` joined with their category title, ordered by
    /// ascending id, plus the total match count before pagination.
    async fn fetch_products(
        &self,
        query: &ProductQuery,
        page: Option<Pagination>,
    ) -> StoreResult<(Vec<ProductRow>, u64)>;
    async fn update_product_price(&self, id: ProductId, price: Price) -> StoreResult<Product>;
    async fn attach_discount(&self, id: ProductId, discount_id: DiscountId) -> StoreResult<Product>;
    async fn detach_discount(&self, id: ProductId, discount_id: DiscountId) -> StoreResult<Product>;
    /// Sets inventory to zero for every listed product in one atomic write and
    /// returns how many rows changed. Unknown ids are ignored.
    async fn clear_inventory(&self, ids: &[ProductId]) -> StoreResult<u64>;
    /// PROTECT against order items and featuring categories; cascades to
    /// comments, cart items and discount links.
    async fn delete_product(&self, id: ProductId) -> StoreResult<()>;

    // Batched loads over a page of products

    async fn comment_counts(&self, ids: &[ProductId]) -> StoreResult<HashMap<ProductId, u64>>;
    async fn discounts_for(
        &self,
        ids: &[ProductId],
    ) -> StoreResult<HashMap<ProductId, Vec<Discount>>>;

    // Comments

    async fn insert_comment(&self, new: NewComment) -> StoreResult<Comment>;
    /// Oldest first; optionally narrowed to one product.
    async fn fetch_comments(
        &self,
        product_id: Option<ProductId>,
        page: Pagination,
    ) -> StoreResult<(Vec<Comment>, u64)>;
    async fn update_comment_status(
        &self,
        id: CommentId,
        status: CommentStatus,
    ) -> StoreResult<Comment>;
    async fn delete_comment(&self, id: CommentId) -> StoreResult<()>;

    // Customers

    async fn insert_customer(&self, new: NewCustomer) -> StoreResult<Customer>;
    async fn get_customer(&self, id: CustomerId) -> StoreResult<Customer>;
    /// Ordered by first name, then last name; `search` is a case-insensitive
    /// prefix of either name.
    async fn fetch_customers(
        &self,
        search: Option<&str>,
        page: Pagination,
    ) -> StoreResult<(Vec<Customer>, u64)>;
    async fn customers_by_id(
        &self,
        ids: &[CustomerId],
    ) -> StoreResult<HashMap<CustomerId, Customer>>;
    /// PROTECT against orders; cascades to the address.
    async fn delete_customer(&self, id: CustomerId) -> StoreResult<()>;
    async fn upsert_address(&self, customer_id: CustomerId, new: NewAddress)
    -> StoreResult<Address>;
    async fn get_address(&self, customer_id: CustomerId) -> StoreResult<Address>;

    // Orders

    /// Inserts the order and its items atomically.
    async fn insert_order(&self, new: NewOrder) -> StoreResult<(Order, Vec<OrderItem>)>;
    async fn get_order(&self, id: OrderId) -> StoreResult<Order>;
    /// Newest first, ties by descending id.
    async fn fetch_orders(&self, page: Pagination) -> StoreResult<(Vec<Order>, u64)>;
    async fn item_counts(&self, ids: &[OrderId]) -> StoreResult<HashMap<OrderId, u64>>;
    async fn items_for(&self, ids: &[OrderId]) -> StoreResult<HashMap<OrderId, Vec<OrderItem>>>;
    /// Every order item in ascending id order, across all orders.
    async fn fetch_order_items(&self, page: Pagination) -> StoreResult<(Vec<OrderItemRow>, u64)>;
    async fn add_order_item(&self, order_id: OrderId, new: NewOrderItem) -> StoreResult<OrderItem>;
    async fn update_order_status(&self, id: OrderId, status: OrderStatus) -> StoreResult<Order>;
    async fn delete_order_item(&self, id: OrderItemId) -> StoreResult<()>;
    /// PROTECT: fails while the order still has items.
    async fn delete_order(&self, id: OrderId) -> StoreResult<()>;

    // Carts

    async fn create_cart(&self) -> StoreResult<Cart>;
    async fn get_cart(&self, id: CartId) -> StoreResult<Cart>;
    async fn cart_items(&self, id: CartId) -> StoreResult<Vec<CartItem>>;
    async fn add_cart_item(&self, cart_id: CartId, new: NewCartItem) -> StoreResult<CartItem>;
    async fn delete_cart_item(&self, id: CartItemId) -> StoreResult<()>;
    /// Cascades to the cart's items.
    async fn delete_cart(&self, id: CartId) -> StoreResult<()>;
}
