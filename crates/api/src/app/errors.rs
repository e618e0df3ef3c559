use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;
use tracing::warn;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use store_core::DomainError;
use store_infra::StoreError;

pub type ApiResult<T> = Result<T, axum::response::Response>;

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

pub fn domain_error_to_response(err: DomainError) -> axum::response::Response {
    match err {
        DomainError::Validation(msg) => json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
        DomainError::InvalidId(msg) => json_error(StatusCode::BAD_REQUEST, "invalid_id", msg),
    }
}

pub fn store_error_to_response(err: StoreError) -> axum::response::Response {
    match err {
        StoreError::Domain(e) => domain_error_to_response(e),
        StoreError::UniqueViolation(msg) => {
            warn!(%msg, "unique constraint rejected write");
            json_error(StatusCode::CONFLICT, "unique_violation", msg)
        }
        e @ StoreError::Protected { .. } => {
            warn!(error = %e, "protected delete rejected");
            json_error(StatusCode::CONFLICT, "protected", e.to_string())
        }
        StoreError::MissingReference(msg) => {
            warn!(%msg, "write referenced a missing row");
            json_error(StatusCode::UNPROCESSABLE_ENTITY, "missing_reference", msg)
        }
        StoreError::NotFound => json_error(StatusCode::NOT_FOUND, "not_found", "not found"),
        StoreError::Database(msg) => {
            tracing::error!(%msg, "store failure");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "store_error", msg)
        }
    }
}

pub fn json_rejection(err: JsonRejection) -> axum::response::Response {
    json_error(StatusCode::BAD_REQUEST, "invalid_body", err.body_text())
}

pub fn query_rejection(err: QueryRejection) -> axum::response::Response {
    json_error(StatusCode::BAD_REQUEST, "invalid_query", err.body_text())
}

/// Parse a path segment into a typed id.
pub fn parse_id<T>(raw: &str, what: &str) -> ApiResult<T>
where
    T: core::str::FromStr<Err = DomainError>,
{
    raw.parse()
        .map_err(|_| json_error(StatusCode::BAD_REQUEST, "invalid_id", format!("invalid {what} id")))
}
