//! Admin list pagination.

use serde::{Deserialize, Serialize};

/// Page size used by the admin listings unless configured otherwise.
pub const DEFAULT_PER_PAGE: u32 = 10;
/// Upper bound on any page size.
pub const MAX_PER_PAGE: u32 = 1000;

/// Limit/offset window over an ordered listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub limit: u32,
    pub offset: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            limit: DEFAULT_PER_PAGE,
            offset: 0,
        }
    }
}

impl Pagination {
    /// 1-based page number; page 0 is treated as page 1.
    pub fn page(number: u32, per_page: u32) -> Self {
        let per_page = per_page.clamp(1, MAX_PER_PAGE);
        Self {
            limit: per_page,
            offset: number.max(1).saturating_sub(1).saturating_mul(per_page),
        }
    }

    /// Slice an already-ordered, fully materialized listing.
    pub fn apply<T>(&self, rows: Vec<T>) -> Vec<T> {
        rows.into_iter()
            .skip(self.offset as usize)
            .take(self.limit as usize)
            .collect()
    }
}

/// One page of a listing plus the total number of matching rows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub pagination: Pagination,
    pub has_more: bool,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: u64, pagination: Pagination) -> Self {
        let has_more = u64::from(pagination.offset) + (items.len() as u64) < total;
        Self {
            items,
            total,
            pagination,
            has_more,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_numbers_are_one_based() {
        assert_eq!(Pagination::page(1, 10), Pagination { limit: 10, offset: 0 });
        assert_eq!(Pagination::page(3, 10), Pagination { limit: 10, offset: 20 });
        assert_eq!(Pagination::page(0, 10), Pagination { limit: 10, offset: 0 });
    }

    #[test]
    fn limits_are_clamped() {
        assert_eq!(Pagination::page(1, 5_000).limit, MAX_PER_PAGE);
        assert_eq!(Pagination::page(1, 0).limit, 1);
        assert_eq!(Pagination::page(1, DEFAULT_PER_PAGE), Pagination::default());
    }

    #[test]
    fn has_more_reflects_remaining_rows() {
        let pagination = Pagination::page(1, 2);
        let page = Page::new(pagination.apply(vec![1, 2, 3]), 3, pagination);
        assert_eq!(page.items, vec![1, 2]);
        assert!(page.has_more);

        let pagination = Pagination::page(2, 2);
        let page = Page::new(pagination.apply(vec![1, 2, 3]), 3, pagination);
        assert_eq!(page.items, vec![3]);
        assert!(!page.has_more);
    }
}
