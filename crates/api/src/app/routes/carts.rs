use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post},
};

use store_sales::{CartId, CartItemId, NewCartItem};

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_cart))
        .route("/:id", get(get_cart).delete(delete_cart))
        .route("/:id/items", post(add_item))
        .route("/:id/items/:item_id", delete(delete_item))
}

pub async fn create_cart(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    match services.store.create_cart().await {
        Ok(cart) => (StatusCode::CREATED, Json(cart)).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn get_cart(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: CartId = match errors::parse_id(&id, "cart") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let cart = match services.store.get_cart(id).await {
        Ok(c) => c,
        Err(e) => return errors::store_error_to_response(e),
    };
    match services.store.cart_items(id).await {
        Ok(items) => (StatusCode::OK, Json(dto::CartDetail { cart, items })).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn add_item(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    body: Result<Json<NewCartItem>, JsonRejection>,
) -> axum::response::Response {
    let id: CartId = match errors::parse_id(&id, "cart") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let Json(body) = match body {
        Ok(b) => b,
        Err(e) => return errors::json_rejection(e),
    };
    match services.store.add_cart_item(id, body).await {
        Ok(item) => (StatusCode::CREATED, Json(item)).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn delete_item(
    Extension(services): Extension<Arc<AppServices>>,
    Path((id, item_id)): Path<(String, String)>,
) -> axum::response::Response {
    let id: CartId = match errors::parse_id(&id, "cart") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let item_id: CartItemId = match errors::parse_id(&item_id, "cart item") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    // The item must belong to the cart named in the path.
    match services.store.cart_items(id).await {
        Ok(items) if items.iter().any(|i| i.id == item_id) => {}
        Ok(_) => return errors::json_error(StatusCode::NOT_FOUND, "not_found", "cart item not found"),
        Err(e) => return errors::store_error_to_response(e),
    }
    match services.store.delete_cart_item(item_id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn delete_cart(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: CartId = match errors::parse_id(&id, "cart") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services.store.delete_cart(id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}
