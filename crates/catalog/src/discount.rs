use serde::{Deserialize, Serialize};

use store_core::error::require_text;
use store_core::{DomainError, DomainResult, Entity, row_id};

row_id!(
    /// Discount identifier.
    DiscountId,
    "DiscountId"
);

pub const DESCRIPTION_MAX_LEN: usize = 500;

/// A discount that can be attached to any number of products.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Discount {
    pub id: DiscountId,
    pub discount: f64,
    pub description: String,
}

impl Entity for Discount {
    type Id = DiscountId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

impl core::fmt::Display for Discount {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{} | {}", self.discount, self.description)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewDiscount {
    pub discount: f64,
    pub description: String,
}

impl NewDiscount {
    pub fn validate(&self) -> DomainResult<()> {
        if !self.discount.is_finite() {
            return Err(DomainError::validation("discount must be a finite number"));
        }
        require_text("description", &self.description, DESCRIPTION_MAX_LEN)
    }

    pub fn into_discount(self, id: DiscountId) -> Discount {
        Discount {
            id,
            discount: self.discount,
            description: self.description,
        }
    }
}
