//! Infrastructure layer: storage backends, migrations and the admin and
//! storefront read models built on them.

pub mod catalog_service;
pub mod pagination;
pub mod store;
pub mod storefront;

pub use catalog_service::{CatalogQueryService, InventoryCleared, OrderListing, ProductListing};
pub use pagination::{DEFAULT_PER_PAGE, MAX_PER_PAGE, Page, Pagination};
pub use store::postgres::PgSettings;
pub use store::{
    InMemoryShopStore, OrderItemRow, PostgresShopStore, ProductRow, ShopStore, StoreError,
    StoreResult,
};
pub use storefront::{Storefront, StorefrontContext};
