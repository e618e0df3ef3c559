use serde::{Deserialize, Serialize};

use store_core::error::require_text;
use store_core::{DomainResult, Entity, OnDelete};

use crate::customer::CustomerId;

pub const FIELD_MAX_LEN: usize = 255;

/// Postal address. Keyed by its customer, so a customer has at most one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub customer_id: CustomerId,
    pub province: String,
    pub city: String,
    pub street: String,
}

impl Address {
    pub const CUSTOMER_ON_DELETE: OnDelete = OnDelete::Cascade;
}

impl Entity for Address {
    type Id = CustomerId;

    fn id(&self) -> &Self::Id {
        &self.customer_id
    }
}

/// Upsert payload; the customer comes from the request path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAddress {
    pub province: String,
    pub city: String,
    pub street: String,
}

impl NewAddress {
    pub fn validate(&self) -> DomainResult<()> {
        require_text("province", &self.province, FIELD_MAX_LEN)?;
        require_text("city", &self.city, FIELD_MAX_LEN)?;
        require_text("street", &self.street, FIELD_MAX_LEN)
    }

    pub fn into_address(self, customer_id: CustomerId) -> Address {
        Address {
            customer_id,
            province: self.province,
            city: self.city,
            street: self.street,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_is_keyed_by_customer() {
        let address = NewAddress {
            province: "Tehran".into(),
            city: "Tehran".into(),
            street: "Valiasr".into(),
        }
        .into_address(CustomerId::new(7));
        assert_eq!(*address.id(), CustomerId::new(7));
    }

    #[test]
    fn every_field_is_required() {
        let address = NewAddress {
            province: "Tehran".into(),
            city: String::new(),
            street: "Valiasr".into(),
        };
        assert!(address.validate().is_err());
    }
}
