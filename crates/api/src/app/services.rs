use std::sync::Arc;

use tracing::info;

use store_infra::{
    CatalogQueryService, InMemoryShopStore, Pagination, PostgresShopStore, ShopStore, StoreError,
    Storefront,
};

use crate::config::{AppConfig, DEFAULT_LIST_PER_PAGE, SiteConfig};

/// Shared per-process services handed to every handler.
#[derive(Clone)]
pub struct AppServices {
    pub store: Arc<dyn ShopStore>,
    pub catalog: CatalogQueryService,
    pub storefront: Storefront,
    pub site: SiteConfig,
    pub list_per_page: u32,
}

impl AppServices {
    pub fn new(store: Arc<dyn ShopStore>, site: SiteConfig, list_per_page: u32) -> Self {
        Self {
            catalog: CatalogQueryService::new(store.clone()),
            storefront: Storefront::new(store.clone()),
            store,
            site,
            list_per_page,
        }
    }

    /// In-memory wiring with default branding (dev/test).
    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(InMemoryShopStore::new()),
            SiteConfig::default(),
            DEFAULT_LIST_PER_PAGE,
        )
    }

    /// Admin page window for a 1-based page number.
    pub fn page(&self, number: Option<u32>) -> Pagination {
        Pagination::page(number.unwrap_or(1), self.list_per_page)
    }
}

/// Wire the store selected by configuration.
///
/// With a database URL the Postgres store is connected and migrated;
/// otherwise everything lives in memory for the lifetime of the process.
pub async fn build_services(config: &AppConfig) -> Result<AppServices, StoreError> {
    let store: Arc<dyn ShopStore> = match &config.database {
        Some(db) => {
            let store = PostgresShopStore::connect(&db.pg_settings()).await?;
            store.migrate().await?;
            Arc::new(store)
        }
        None => Arc::new(InMemoryShopStore::new()),
    };
    info!(backend = store.backend(), "store ready");
    Ok(AppServices::new(
        store,
        config.site.clone(),
        config.list_per_page,
    ))
}
