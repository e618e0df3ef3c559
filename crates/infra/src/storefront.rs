//! Public storefront page.

use std::sync::Arc;

use serde::Serialize;
use tracing::instrument;

use store_catalog::{Product, ProductQuery};

use crate::store::{ShopStore, StoreResult};

/// Category titles containing this text (any case) are shown on the home page.
pub const FEATURED_TITLE_FRAGMENT: &str = "the";

/// Context handed to the home page template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StorefrontContext {
    pub products: Vec<Product>,
}

#[derive(Clone)]
pub struct Storefront {
    store: Arc<dyn ShopStore>,
}

impl Storefront {
    pub fn new(store: Arc<dyn ShopStore>) -> Self {
        Self { store }
    }

    /// Every product of a featured category, unpaginated.
    #[instrument(skip(self), err)]
    pub async fn home(&self) -> StoreResult<StorefrontContext> {
        let query = ProductQuery::all().category_title_icontains(FEATURED_TITLE_FRAGMENT);
        let (rows, _) = self.store.fetch_products(&query, None).await?;
        Ok(StorefrontContext {
            products: rows.into_iter().map(|row| row.product).collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use store_catalog::{NewCategory, NewProduct, Price};

    use super::*;
    use crate::store::InMemoryShopStore;

    #[tokio::test]
    async fn home_lists_products_of_categories_mentioning_the() {
        let store = Arc::new(InMemoryShopStore::new());
        let mut expected = Vec::new();
        for (title, name) in [("The Shop", "Mug"), ("Kitchen", "Pan"), ("Weather", "Umbrella")] {
            let category = store.insert_category(NewCategory::new(title)).await.unwrap();
            let product = store
                .insert_product(NewProduct::new(name, category.id, Price::zero(), 3))
                .await
                .unwrap();
            if title != "Kitchen" {
                expected.push(product.id);
            }
        }

        let context = Storefront::new(store).home().await.unwrap();
        let ids: Vec<_> = context.products.iter().map(|p| p.id).collect();
        assert_eq!(ids, expected);
    }

    #[tokio::test]
    async fn match_is_a_plain_substring() {
        let store = Arc::new(InMemoryShopStore::new());
        let other = store.insert_category(NewCategory::new("Other")).await.unwrap();
        store
            .insert_product(NewProduct::new("Thing", other.id, Price::zero(), 1))
            .await
            .unwrap();

        let context = Storefront::new(store).home().await.unwrap();
        assert_eq!(context.products.len(), 1);
    }

    #[tokio::test]
    async fn context_serializes_under_products_key() {
        let store = Arc::new(InMemoryShopStore::new());
        let context = Storefront::new(store).home().await.unwrap();
        assert_eq!(
            serde_json::to_value(&context).unwrap(),
            serde_json::json!({ "products": [] })
        );
    }
}
