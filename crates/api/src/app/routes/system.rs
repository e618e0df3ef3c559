use std::sync::Arc;

use axum::{Json, extract::Extension, http::StatusCode, response::IntoResponse};

use crate::app::errors;
use crate::app::services::AppServices;

pub async fn health(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "status": "ok",
            "backend": services.store.backend(),
        })),
    )
        .into_response()
}

/// Admin branding.
pub async fn site(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    (StatusCode::OK, Json(&services.site)).into_response()
}

/// Storefront home page context.
pub async fn storefront_home(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    match services.storefront.home().await {
        Ok(context) => (StatusCode::OK, Json(context)).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}
