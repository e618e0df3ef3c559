use axum::{Router, routing::get};

pub mod carts;
pub mod categories;
pub mod comments;
pub mod customers;
pub mod discounts;
pub mod orders;
pub mod products;
pub mod system;

/// Admin endpoints (the JSON counterpart of the admin panel).
pub fn admin_router() -> Router {
    Router::new()
        .route("/site", get(system::site))
        .nest("/products", products::router())
        .nest("/categories", categories::router())
        .nest("/discounts", discounts::router())
        .nest("/comments", comments::router())
        .nest("/customers", customers::router())
        .nest("/orders", orders::router())
        .nest("/order-items", orders::items_router())
}

