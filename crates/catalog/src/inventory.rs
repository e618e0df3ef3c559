//! Inventory classification and the admin inventory filter.
//!
//! The classifier bands (10/50) and the filter bands (3/10) are unrelated
//! thresholds and are kept separate.

use serde::{Deserialize, Serialize};

use crate::query::{InventoryPredicate, ProductQuery};

/// Stock level shown next to each product in the admin listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InventoryStatus {
    Low,
    Medium,
    High,
}

impl InventoryStatus {
    pub const LOW_BELOW: u32 = 10;
    pub const HIGH_ABOVE: u32 = 50;

    pub fn classify(inventory: u32) -> Self {
        if inventory < Self::LOW_BELOW {
            InventoryStatus::Low
        } else if inventory > Self::HIGH_ABOVE {
            InventoryStatus::High
        } else {
            InventoryStatus::Medium
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            InventoryStatus::Low => "Low",
            InventoryStatus::Medium => "Medium",
            InventoryStatus::High => "High",
        }
    }
}

impl core::fmt::Display for InventoryStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.label())
    }
}

/// One selectable choice of the inventory filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InventoryBand {
    Low,
    Medium,
    Ok,
}

impl InventoryBand {
    pub const ALL: [InventoryBand; 3] = [InventoryBand::Low, InventoryBand::Medium, InventoryBand::Ok];

    /// Query-string value selecting this band.
    pub fn param(self) -> &'static str {
        match self {
            InventoryBand::Low => "<3",
            InventoryBand::Medium => "3<=10",
            InventoryBand::Ok => ">10",
        }
    }

    /// Criticality label; the lowest-stock band reads "High".
    pub fn label(self) -> &'static str {
        match self {
            InventoryBand::Low => "High",
            InventoryBand::Medium => "Medium",
            InventoryBand::Ok => "OK",
        }
    }

    pub fn predicate(self) -> InventoryPredicate {
        match self {
            InventoryBand::Low => InventoryPredicate::Below(3),
            InventoryBand::Medium => InventoryPredicate::Between { low: 3, high: 10 },
            InventoryBand::Ok => InventoryPredicate::Above(10),
        }
    }

    pub fn contains(self, inventory: u32) -> bool {
        self.predicate().matches(inventory)
    }
}

/// Lookup pair rendered by a listing UI: (query-string value, label).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Lookup {
    pub value: &'static str,
    pub label: &'static str,
}

/// The "Critical Inventory Status" list filter.
#[derive(Debug, Clone, Copy, Default)]
pub struct InventoryFilter;

impl InventoryFilter {
    pub const TITLE: &'static str = "Critical Inventory Status";
    pub const PARAMETER_NAME: &'static str = "inventory";

    pub fn lookups() -> Vec<Lookup> {
        InventoryBand::ALL
            .into_iter()
            .map(|band| Lookup {
                value: band.param(),
                label: band.label(),
            })
            .collect()
    }

    /// Resolve the raw query-string value. Unknown values select nothing.
    pub fn from_param(value: Option<&str>) -> Option<InventoryBand> {
        let value = value?;
        InventoryBand::ALL.into_iter().find(|band| band.param() == value)
    }

    pub fn narrow(selection: Option<InventoryBand>, query: ProductQuery) -> ProductQuery {
        match selection {
            Some(band) => query.inventory(band.predicate()),
            None => query,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn classifier_boundaries() {
        assert_eq!(InventoryStatus::classify(0), InventoryStatus::Low);
        assert_eq!(InventoryStatus::classify(9), InventoryStatus::Low);
        assert_eq!(InventoryStatus::classify(10), InventoryStatus::Medium);
        assert_eq!(InventoryStatus::classify(11), InventoryStatus::Medium);
        assert_eq!(InventoryStatus::classify(50), InventoryStatus::Medium);
        assert_eq!(InventoryStatus::classify(51), InventoryStatus::High);
    }

    #[test]
    fn filter_exposes_title_parameter_and_lookups() {
        assert_eq!(InventoryFilter::TITLE, "Critical Inventory Status");
        assert_eq!(InventoryFilter::PARAMETER_NAME, "inventory");
        let lookups: Vec<_> = InventoryFilter::lookups()
            .into_iter()
            .map(|l| (l.value, l.label))
            .collect();
        assert_eq!(lookups, vec![("<3", "High"), ("3<=10", "Medium"), (">10", "OK")]);
    }

    #[test]
    fn unknown_parameter_selects_nothing() {
        assert_eq!(InventoryFilter::from_param(Some("lots")), None);
        assert_eq!(InventoryFilter::from_param(None), None);
        assert_eq!(InventoryFilter::from_param(Some(">10")), Some(InventoryBand::Ok));
    }

    #[test]
    fn narrow_without_selection_is_identity() {
        let query = ProductQuery::all().name_istartswith("mug");
        assert_eq!(InventoryFilter::narrow(None, query.clone()), query);
    }

    #[test]
    fn narrow_adds_band_predicate() {
        let query = InventoryFilter::narrow(Some(InventoryBand::Medium), ProductQuery::all());
        assert_eq!(query.inventory, vec![InventoryPredicate::Between { low: 3, high: 10 }]);
    }

    proptest! {
        #[test]
        fn classify_matches_thresholds(i in 0u32..10_000) {
            let expected = if i < 10 {
                InventoryStatus::Low
            } else if i > 50 {
                InventoryStatus::High
            } else {
                InventoryStatus::Medium
            };
            prop_assert_eq!(InventoryStatus::classify(i), expected);
        }

        #[test]
        fn exactly_one_band_contains_each_count(i in 0u32..10_000) {
            let hits: Vec<_> = InventoryBand::ALL.into_iter().filter(|b| b.contains(i)).collect();
            prop_assert_eq!(hits.len(), 1);
            let expected = if i < 3 {
                InventoryBand::Low
            } else if i <= 10 {
                InventoryBand::Medium
            } else {
                InventoryBand::Ok
            };
            prop_assert_eq!(hits[0], expected);
        }
    }
}
