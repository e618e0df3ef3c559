use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get},
};

use store_catalog::{DiscountId, NewDiscount};

use crate::app::errors;
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_discounts).post(create_discount))
        .route("/:id", delete(delete_discount))
}

pub async fn list_discounts(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    match services.store.list_discounts().await {
        Ok(items) => (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn create_discount(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<NewDiscount>, JsonRejection>,
) -> axum::response::Response {
    let Json(body) = match body {
        Ok(b) => b,
        Err(e) => return errors::json_rejection(e),
    };
    match services.store.insert_discount(body).await {
        Ok(discount) => (StatusCode::CREATED, Json(discount)).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn delete_discount(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: DiscountId = match errors::parse_id(&id, "discount") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services.store.delete_discount(id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}
