//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: store selection and the shared query services
//! - `routes/`: HTTP routes + handlers (one file per admin area)
//! - `dto.rs`: request/response DTOs
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{Extension, Router, routing::get};
use tower::ServiceBuilder;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

pub use services::{AppServices, build_services};

/// Build the full HTTP router (public entrypoint used by `main.rs` and the
/// black-box tests).
pub fn build_app(services: AppServices) -> Router {
    let services = Arc::new(services);

    Router::new()
        .route("/health", get(routes::system::health))
        .route("/store", get(routes::system::storefront_home))
        .route("/store/", get(routes::system::storefront_home))
        .nest("/store/carts", routes::carts::router())
        .nest("/admin", routes::admin_router())
        .layer(ServiceBuilder::new().layer(Extension(services)))
}
