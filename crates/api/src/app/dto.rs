use serde::{Deserialize, Serialize};

use store_catalog::{
    CategoryId, CommentStatus, CreatedWithin, InventoryFilter, Lookup, Price, ProductId,
};
use store_sales::{Cart, CartItem, Order, OrderItem, OrderStatus};

// -------------------------
// Request DTOs
// -------------------------

/// `?page=` on the plain admin listings.
#[derive(Debug, Default, Deserialize)]
pub struct PageParams {
    pub page: Option<u32>,
}

/// Admin product changelist parameters.
#[derive(Debug, Default, Deserialize)]
pub struct ProductListParams {
    pub page: Option<u32>,
    /// Inventory filter value (`<3`, `3<=10`, `>10`).
    pub inventory: Option<String>,
    /// Creation-date filter (`today`, `past_7_days`, `this_month`, `this_year`).
    pub created: Option<String>,
    pub category_id: Option<CategoryId>,
    /// Case-insensitive name prefix.
    pub q: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CustomerListParams {
    pub page: Option<u32>,
    pub q: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CommentListParams {
    pub product_id: Option<ProductId>,
    pub page: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct ClearInventoryRequest {
    pub ids: Vec<ProductId>,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePriceRequest {
    pub price: Price,
}

#[derive(Debug, Deserialize)]
pub struct SetTopProductRequest {
    pub product_id: Option<ProductId>,
}

#[derive(Debug, Deserialize)]
pub struct OrderStatusRequest {
    pub status: OrderStatus,
}

#[derive(Debug, Deserialize)]
pub struct CommentStatusRequest {
    pub status: CommentStatus,
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct FilterSpec {
    pub title: &'static str,
    pub parameter_name: &'static str,
    pub lookups: Vec<Lookup>,
}

/// Filters offered by the product changelist.
#[derive(Debug, Serialize)]
pub struct ProductFilters {
    pub inventory: FilterSpec,
    pub created: FilterSpec,
}

impl ProductFilters {
    pub fn describe() -> Self {
        Self {
            inventory: FilterSpec {
                title: InventoryFilter::TITLE,
                parameter_name: InventoryFilter::PARAMETER_NAME,
                lookups: InventoryFilter::lookups(),
            },
            created: FilterSpec {
                title: "By date created",
                parameter_name: "created",
                lookups: CreatedWithin::ALL
                    .into_iter()
                    .map(|w| Lookup {
                        value: w.param(),
                        label: w.label(),
                    })
                    .collect(),
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct OrderDetail {
    pub order: Order,
    pub items: Vec<OrderItem>,
}

#[derive(Debug, Serialize)]
pub struct CartDetail {
    pub cart: Cart,
    pub items: Vec<CartItem>,
}
