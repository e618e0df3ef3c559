use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{
        Extension, Path, Query,
        rejection::{JsonRejection, QueryRejection},
    },
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch, post},
};
use chrono::Utc;

use store_catalog::{CreatedWithin, DiscountId, InventoryFilter, NewProduct, ProductId, ProductQuery};

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_products).post(create_product))
        .route("/filters", get(filters))
        .route("/clear-inventory", post(clear_inventory))
        .route("/:id", get(get_product).delete(delete_product))
        .route("/:id/price", patch(update_price))
        .route(
            "/:id/discounts/:discount_id",
            post(attach_discount).delete(detach_discount),
        )
}

/// Translate changelist parameters into a product query.
pub fn product_query(params: &dto::ProductListParams) -> ProductQuery {
    let mut query = ProductQuery::all();
    if let Some(category_id) = params.category_id {
        query = query.in_category(category_id);
    }
    if let Some(window) = params.created.as_deref().and_then(CreatedWithin::from_param) {
        query = query.created_since(window.since(Utc::now()));
    }
    if let Some(prefix) = params.q.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
        query = query.name_istartswith(prefix);
    }
    InventoryFilter::narrow(
        InventoryFilter::from_param(params.inventory.as_deref()),
        query,
    )
}

pub async fn list_products(
    Extension(services): Extension<Arc<AppServices>>,
    params: Result<Query<dto::ProductListParams>, QueryRejection>,
) -> axum::response::Response {
    let Query(params) = match params {
        Ok(p) => p,
        Err(e) => return errors::query_rejection(e),
    };
    let query = product_query(&params);
    match services
        .catalog
        .list_products(&query, services.page(params.page))
        .await
    {
        Ok(page) => (StatusCode::OK, Json(page)).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn filters() -> axum::response::Response {
    (StatusCode::OK, Json(dto::ProductFilters::describe())).into_response()
}

pub async fn create_product(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<NewProduct>, JsonRejection>,
) -> axum::response::Response {
    let Json(body) = match body {
        Ok(b) => b,
        Err(e) => return errors::json_rejection(e),
    };
    match services.store.insert_product(body).await {
        Ok(product) => (StatusCode::CREATED, Json(product)).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn get_product(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: ProductId = match errors::parse_id(&id, "product") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services.store.get_product(id).await {
        Ok(product) => (StatusCode::OK, Json(product)).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn update_price(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    body: Result<Json<dto::UpdatePriceRequest>, JsonRejection>,
) -> axum::response::Response {
    let id: ProductId = match errors::parse_id(&id, "product") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let Json(body) = match body {
        Ok(b) => b,
        Err(e) => return errors::json_rejection(e),
    };
    match services.store.update_product_price(id, body.price).await {
        Ok(product) => (StatusCode::OK, Json(product)).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn attach_discount(
    Extension(services): Extension<Arc<AppServices>>,
    Path((id, discount_id)): Path<(String, String)>,
) -> axum::response::Response {
    let (id, discount_id) = match parse_pair(&id, &discount_id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services.store.attach_discount(id, discount_id).await {
        Ok(product) => (StatusCode::OK, Json(product)).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn detach_discount(
    Extension(services): Extension<Arc<AppServices>>,
    Path((id, discount_id)): Path<(String, String)>,
) -> axum::response::Response {
    let (id, discount_id) = match parse_pair(&id, &discount_id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services.store.detach_discount(id, discount_id).await {
        Ok(product) => (StatusCode::OK, Json(product)).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

fn parse_pair(id: &str, discount_id: &str) -> errors::ApiResult<(ProductId, DiscountId)> {
    Ok((
        errors::parse_id(id, "product")?,
        errors::parse_id(discount_id, "discount")?,
    ))
}

/// The "Clear Inventory" bulk action over the selected rows.
pub async fn clear_inventory(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<dto::ClearInventoryRequest>, JsonRejection>,
) -> axum::response::Response {
    let Json(body) = match body {
        Ok(b) => b,
        Err(e) => return errors::json_rejection(e),
    };
    match services.catalog.clear_inventory(&body.ids).await {
        Ok(cleared) => (StatusCode::OK, Json(cleared)).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn delete_product(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: ProductId = match errors::parse_id(&id, "product") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services.store.delete_product(id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

#[cfg(test)]
mod tests {
    use store_catalog::{CategoryId, InventoryPredicate};

    use super::*;

    #[test]
    fn changelist_params_build_a_conjunctive_query() {
        let params = dto::ProductListParams {
            inventory: Some("3<=10".to_string()),
            category_id: Some(CategoryId::new(2)),
            q: Some("  mu ".to_string()),
            ..Default::default()
        };
        let query = product_query(&params);
        assert_eq!(query.inventory, vec![InventoryPredicate::Between { low: 3, high: 10 }]);
        assert_eq!(query.category_id, Some(CategoryId::new(2)));
        assert_eq!(query.name_starts_with.as_deref(), Some("mu"));
        assert!(query.created_since.is_none());
    }

    #[test]
    fn unknown_filter_values_are_ignored() {
        let params = dto::ProductListParams {
            inventory: Some("lots".to_string()),
            created: Some("last_century".to_string()),
            q: Some("   ".to_string()),
            ..Default::default()
        };
        assert!(product_query(&params).is_unfiltered());
    }
}
