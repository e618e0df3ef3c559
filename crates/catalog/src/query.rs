//! Product query predicates.
//!
//! A `ProductQuery` is a storage-agnostic description of which products a
//! listing wants. The in-memory store evaluates it with [`ProductQuery::matches`];
//! the SQL store translates each predicate into a `WHERE` clause. Both must
//! agree on the semantics documented here.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::category::{Category, CategoryId};
use crate::product::Product;

/// Range predicate over a product's inventory count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InventoryPredicate {
    /// `inventory < n`
    Below(u32),
    /// `low <= inventory <= high`
    Between { low: u32, high: u32 },
    /// `inventory > n`
    Above(u32),
}

impl InventoryPredicate {
    pub fn matches(self, inventory: u32) -> bool {
        match self {
            InventoryPredicate::Below(n) => inventory < n,
            InventoryPredicate::Between { low, high } => (low..=high).contains(&inventory),
            InventoryPredicate::Above(n) => inventory > n,
        }
    }
}

/// Creation-date choices offered next to the inventory filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CreatedWithin {
    Today,
    PastSevenDays,
    ThisMonth,
    ThisYear,
}

impl CreatedWithin {
    pub const ALL: [CreatedWithin; 4] = [
        CreatedWithin::Today,
        CreatedWithin::PastSevenDays,
        CreatedWithin::ThisMonth,
        CreatedWithin::ThisYear,
    ];

    pub fn param(self) -> &'static str {
        match self {
            CreatedWithin::Today => "today",
            CreatedWithin::PastSevenDays => "past_7_days",
            CreatedWithin::ThisMonth => "this_month",
            CreatedWithin::ThisYear => "this_year",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            CreatedWithin::Today => "Today",
            CreatedWithin::PastSevenDays => "Past 7 days",
            CreatedWithin::ThisMonth => "This month",
            CreatedWithin::ThisYear => "This year",
        }
    }

    pub fn from_param(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.param() == value)
    }

    /// Inclusive lower bound (UTC midnight) for the window containing `now`.
    pub fn since(self, now: DateTime<Utc>) -> DateTime<Utc> {
        let today = now.date_naive();
        let start = match self {
            CreatedWithin::Today => today,
            CreatedWithin::PastSevenDays => today - Duration::days(7),
            CreatedWithin::ThisMonth => {
                NaiveDate::from_ymd_opt(today.year(), today.month(), 1).unwrap_or(today)
            }
            CreatedWithin::ThisYear => NaiveDate::from_ymd_opt(today.year(), 1, 1).unwrap_or(today),
        };
        Utc.from_utc_datetime(&start.and_time(NaiveTime::MIN))
    }
}

/// Filters applied to a product listing. An empty query matches every product.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductQuery {
    pub inventory: Vec<InventoryPredicate>,
    pub category_id: Option<CategoryId>,
    /// Case-insensitive substring of the category title.
    pub category_title_contains: Option<String>,
    /// Case-insensitive prefix of the product name.
    pub name_starts_with: Option<String>,
    pub created_since: Option<DateTime<Utc>>,
}

impl ProductQuery {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn inventory(mut self, predicate: InventoryPredicate) -> Self {
        self.inventory.push(predicate);
        self
    }

    pub fn in_category(mut self, category_id: CategoryId) -> Self {
        self.category_id = Some(category_id);
        self
    }

    pub fn category_title_icontains(mut self, needle: impl Into<String>) -> Self {
        self.category_title_contains = Some(needle.into());
        self
    }

    pub fn name_istartswith(mut self, prefix: impl Into<String>) -> Self {
        self.name_starts_with = Some(prefix.into());
        self
    }

    pub fn created_since(mut self, since: DateTime<Utc>) -> Self {
        self.created_since = Some(since);
        self
    }

    pub fn is_unfiltered(&self) -> bool {
        *self == Self::default()
    }

    /// Evaluate the query against one product and its category.
    pub fn matches(&self, product: &Product, category: &Category) -> bool {
        if !self.inventory.iter().all(|p| p.matches(product.inventory)) {
            return false;
        }
        if self.category_id.is_some_and(|id| id != product.category_id) {
            return false;
        }
        if let Some(needle) = &self.category_title_contains {
            if !category.title.to_lowercase().contains(&needle.to_lowercase()) {
                return false;
            }
        }
        if let Some(prefix) = &self.name_starts_with {
            if !product.name.to_lowercase().starts_with(&prefix.to_lowercase()) {
                return false;
            }
        }
        if self.created_since.is_some_and(|since| product.created_at < since) {
            return false;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::category::NewCategory;
    use crate::product::{NewProduct, Price, ProductId};

    fn fixture(category_title: &str, name: &str, inventory: u32) -> (Product, Category) {
        let category = NewCategory::new(category_title).into_category(CategoryId::new(1));
        let product = NewProduct::new(name, category.id, Price::zero(), inventory)
            .into_product(ProductId::new(1), Utc::now());
        (product, category)
    }

    #[test]
    fn empty_query_matches_everything() {
        let (product, category) = fixture("Other", "Mug", 0);
        assert!(ProductQuery::all().is_unfiltered());
        assert!(ProductQuery::all().matches(&product, &category));
    }

    #[test]
    fn category_title_match_is_case_insensitive_substring() {
        let query = ProductQuery::all().category_title_icontains("the");
        for title in ["The Shop", "Weather", "ATHENS"] {
            let (product, category) = fixture(title, "Mug", 1);
            assert!(query.matches(&product, &category), "{title} should match");
        }
        let (product, category) = fixture("Other", "Mug", 1);
        // "Other" contains "the" as well: o-t-h-e-r.
        assert!(query.matches(&product, &category));
        let (product, category) = fixture("Kitchen", "Mug", 1);
        assert!(!query.matches(&product, &category));
    }

    #[test]
    fn name_prefix_is_case_insensitive() {
        let (product, category) = fixture("Kitchen", "Blue Mug", 1);
        assert!(ProductQuery::all().name_istartswith("blu").matches(&product, &category));
        assert!(!ProductQuery::all().name_istartswith("mug").matches(&product, &category));
    }

    #[test]
    fn inventory_predicates_are_conjunctive() {
        let (product, category) = fixture("Kitchen", "Mug", 5);
        let query = ProductQuery::all()
            .inventory(InventoryPredicate::Above(2))
            .inventory(InventoryPredicate::Below(6));
        assert!(query.matches(&product, &category));
        let query = query.inventory(InventoryPredicate::Between { low: 6, high: 9 });
        assert!(!query.matches(&product, &category));
    }

    #[test]
    fn created_window_bounds_start_at_midnight() {
        let now = Utc.with_ymd_and_hms(2024, 3, 15, 13, 45, 0).unwrap();
        assert_eq!(
            CreatedWithin::Today.since(now),
            Utc.with_ymd_and_hms(2024, 3, 15, 0, 0, 0).unwrap()
        );
        assert_eq!(
            CreatedWithin::PastSevenDays.since(now),
            Utc.with_ymd_and_hms(2024, 3, 8, 0, 0, 0).unwrap()
        );
        assert_eq!(
            CreatedWithin::ThisMonth.since(now),
            Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap()
        );
        assert_eq!(
            CreatedWithin::ThisYear.since(now),
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
        );
        assert_eq!(CreatedWithin::from_param("past_7_days"), Some(CreatedWithin::PastSevenDays));
        assert_eq!(CreatedWithin::from_param("yesterday"), None);
    }
}
