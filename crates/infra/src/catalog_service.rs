//! Admin read models over the shop store.
//!
//! Every listing resolves its annotations (counts, joined titles, eager
//! loaded associations) with a fixed number of store calls per page rather
//! than one per row.

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, instrument};

use store_catalog::{Comment, Discount, InventoryStatus, Product, ProductId, ProductQuery};
use store_customers::Customer;
use store_sales::{Order, OrderId, OrderItem};

use crate::pagination::{Page, Pagination};
use crate::store::{OrderItemRow, ShopStore, StoreResult};

/// One row of the admin product listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductListing {
    #[serde(flatten)]
    pub product: Product,
    pub category_title: String,
    pub inventory_status: InventoryStatus,
    pub comments_count: u64,
    pub discounts: Vec<Discount>,
}

/// One row of the admin order listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderListing {
    #[serde(flatten)]
    pub order: Order,
    pub customer: String,
    pub items_count: u64,
    pub items: Vec<OrderItem>,
}

/// Outcome of the bulk inventory action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InventoryCleared {
    pub updated: u64,
    pub message: String,
}

impl InventoryCleared {
    pub fn new(updated: u64) -> Self {
        Self {
            updated,
            message: format!("Inventory cleared for {updated} products."),
        }
    }
}

/// Annotated, paginated listings and the bulk actions of the admin.
#[derive(Clone)]
pub struct CatalogQueryService {
    store: Arc<dyn ShopStore>,
}

impl CatalogQueryService {
    pub fn new(store: Arc<dyn ShopStore>) -> Self {
        Self { store }
    }

    /// Products matching `query` in ascending id order, annotated with their
    /// category title, stock status, comment count and discounts.
    #[instrument(skip(self, query), fields(limit = page.limit, offset = page.offset), err)]
    pub async fn list_products(
        &self,
        query: &ProductQuery,
        page: Pagination,
    ) -> StoreResult<Page<ProductListing>> {
        let (rows, total) = self.store.fetch_products(query, Some(page)).await?;
        let ids: Vec<ProductId> = rows.iter().map(|r| r.product.id).collect();

        let counts = self.store.comment_counts(&ids).await?;
        let mut discounts = self.store.discounts_for(&ids).await?;

        let items = rows
            .into_iter()
            .map(|row| {
                let id = row.product.id;
                ProductListing {
                    inventory_status: InventoryStatus::classify(row.product.inventory),
                    comments_count: counts.get(&id).copied().unwrap_or(0),
                    discounts: discounts.remove(&id).unwrap_or_default(),
                    category_title: row.category_title,
                    product: row.product,
                }
            })
            .collect();
        Ok(Page::new(items, total, page))
    }

    /// Orders newest first, annotated with their item count and eagerly
    /// loaded items and customer name.
    #[instrument(skip(self), fields(limit = page.limit, offset = page.offset), err)]
    pub async fn list_orders(&self, page: Pagination) -> StoreResult<Page<OrderListing>> {
        let (orders, total) = self.store.fetch_orders(page).await?;
        let ids: Vec<OrderId> = orders.iter().map(|o| o.id).collect();
        let mut customer_ids: Vec<_> = orders.iter().map(|o| o.customer_id).collect();
        customer_ids.sort();
        customer_ids.dedup();

        let counts = self.store.item_counts(&ids).await?;
        let mut items = self.store.items_for(&ids).await?;
        let customers = self.store.customers_by_id(&customer_ids).await?;

        let rows = orders
            .into_iter()
            .map(|order| OrderListing {
                customer: customers
                    .get(&order.customer_id)
                    .map(Customer::to_string)
                    .unwrap_or_default(),
                items_count: counts.get(&order.id).copied().unwrap_or(0),
                items: items.remove(&order.id).unwrap_or_default(),
                order,
            })
            .collect();
        Ok(Page::new(rows, total, page))
    }

    /// Zero the inventory of every listed product in one write.
    #[instrument(skip(self, ids), fields(requested = ids.len()), err)]
    pub async fn clear_inventory(&self, ids: &[ProductId]) -> StoreResult<InventoryCleared> {
        let updated = if ids.is_empty() {
            0
        } else {
            self.store.clear_inventory(ids).await?
        };
        let cleared = InventoryCleared::new(updated);
        info!(updated, "{}", cleared.message);
        Ok(cleared)
    }

    pub async fn list_comments(
        &self,
        product_id: Option<ProductId>,
        page: Pagination,
    ) -> StoreResult<Page<Comment>> {
        let (comments, total) = self.store.fetch_comments(product_id, page).await?;
        Ok(Page::new(comments, total, page))
    }

    /// Order items across all orders, each with its product name.
    pub async fn list_order_items(&self, page: Pagination) -> StoreResult<Page<OrderItemRow>> {
        let (rows, total) = self.store.fetch_order_items(page).await?;
        Ok(Page::new(rows, total, page))
    }

    /// Customers by first then last name, optionally narrowed by a name prefix.
    pub async fn list_customers(
        &self,
        search: Option<&str>,
        page: Pagination,
    ) -> StoreResult<Page<Customer>> {
        let search = search.map(str::trim).filter(|s| !s.is_empty());
        let (customers, total) = self.store.fetch_customers(search, page).await?;
        Ok(Page::new(customers, total, page))
    }
}
