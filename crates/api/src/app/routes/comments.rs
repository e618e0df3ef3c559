use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{
        Extension, Path, Query,
        rejection::{JsonRejection, QueryRejection},
    },
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, patch},
};

use store_catalog::{CommentId, NewComment};

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_comments).post(create_comment))
        .route("/:id", delete(delete_comment))
        .route("/:id/status", patch(update_status))
}

/// Comments, optionally for one product (`?product_id=`).
pub async fn list_comments(
    Extension(services): Extension<Arc<AppServices>>,
    params: Result<Query<dto::CommentListParams>, QueryRejection>,
) -> axum::response::Response {
    let Query(params) = match params {
        Ok(p) => p,
        Err(e) => return errors::query_rejection(e),
    };
    match services
        .catalog
        .list_comments(params.product_id, services.page(params.page))
        .await
    {
        Ok(page) => (StatusCode::OK, Json(page)).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn create_comment(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<NewComment>, JsonRejection>,
) -> axum::response::Response {
    let Json(body) = match body {
        Ok(b) => b,
        Err(e) => return errors::json_rejection(e),
    };
    match services.store.insert_comment(body).await {
        Ok(comment) => (StatusCode::CREATED, Json(comment)).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn update_status(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    body: Result<Json<dto::CommentStatusRequest>, JsonRejection>,
) -> axum::response::Response {
    let id: CommentId = match errors::parse_id(&id, "comment") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let Json(body) = match body {
        Ok(b) => b,
        Err(e) => return errors::json_rejection(e),
    };
    match services.store.update_comment_status(id, body.status).await {
        Ok(comment) => (StatusCode::OK, Json(comment)).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn delete_comment(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: CommentId = match errors::parse_id(&id, "comment") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services.store.delete_comment(id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}
