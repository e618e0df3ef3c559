use serde::{Deserialize, Serialize};

use store_core::error::{limit_text, require_text};
use store_core::{DomainResult, Entity, OnDelete, row_id};

use crate::product::ProductId;

row_id!(
    /// Category identifier.
    CategoryId,
    "CategoryId"
);

pub const TITLE_MAX_LEN: usize = 255;
pub const DESCRIPTION_MAX_LEN: usize = 500;

/// A product category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub title: String,
    pub description: String,
    /// Optional featured product. Nullable; deleting the referenced product is
    /// refused while a category still points at it.
    pub top_product_id: Option<ProductId>,
}

impl Category {
    /// Deleting a product that a category features is blocked.
    pub const TOP_PRODUCT_ON_DELETE: OnDelete = OnDelete::Protect;
}

impl Entity for Category {
    type Id = CategoryId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

impl core::fmt::Display for Category {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.title)
    }
}

/// Insert payload for a category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCategory {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub top_product_id: Option<ProductId>,
}

impl NewCategory {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: String::new(),
            top_product_id: None,
        }
    }

    pub fn validate(&self) -> DomainResult<()> {
        require_text("title", &self.title, TITLE_MAX_LEN)?;
        limit_text("description", &self.description, DESCRIPTION_MAX_LEN)
    }

    pub fn into_category(self, id: CategoryId) -> Category {
        Category {
            id,
            title: self.title,
            description: self.description,
            top_product_id: self.top_product_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use store_core::DomainError;

    #[test]
    fn title_is_required() {
        let err = NewCategory::new("  ").validate().unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn description_may_be_blank_but_bounded() {
        let mut category = NewCategory::new("Kitchen");
        assert!(category.validate().is_ok());

        category.description = "x".repeat(DESCRIPTION_MAX_LEN + 1);
        assert!(category.validate().is_err());
    }

    #[test]
    fn displays_as_title() {
        let category = NewCategory::new("The Shop").into_category(CategoryId::new(1));
        assert_eq!(category.to_string(), "The Shop");
    }
}
