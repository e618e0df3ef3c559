use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use store_catalog::ProductId;
use store_core::{DomainError, Entity, OnDelete, row_id};

use crate::quantity::Quantity;

/// Cart identifier.
///
/// Carts belong to anonymous sessions, so their ids are random rather than
/// sequential.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CartId(Uuid);

impl CartId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for CartId {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Display for CartId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

impl core::str::FromStr for CartId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|e| DomainError::invalid_id(format!("CartId: {e}")))
    }
}

row_id!(
    /// Cart item identifier.
    CartItemId,
    "CartItemId"
);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    pub id: CartId,
    pub created_at: DateTime<Utc>,
}

impl Cart {
    pub fn open(now: DateTime<Utc>) -> Self {
        Self {
            id: CartId::new(),
            created_at: now,
        }
    }
}

impl Entity for Cart {
    type Id = CartId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub id: CartItemId,
    pub cart_id: CartId,
    pub product_id: ProductId,
    pub quantity: Quantity,
}

impl CartItem {
    pub const CART_ON_DELETE: OnDelete = OnDelete::Cascade;
    pub const PRODUCT_ON_DELETE: OnDelete = OnDelete::Cascade;
}

impl Entity for CartItem {
    type Id = CartItemId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCartItem {
    pub product_id: ProductId,
    pub quantity: Quantity,
}

impl NewCartItem {
    pub fn into_item(self, id: CartItemId, cart_id: CartId) -> CartItem {
        CartItem {
            id,
            cart_id,
            product_id: self.product_id,
            quantity: self.quantity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cart_ids_are_random() {
        let now = Utc::now();
        assert_ne!(Cart::open(now).id, Cart::open(now).id);
    }

    #[test]
    fn cart_id_parses_from_text() {
        let id = CartId::new();
        let parsed: CartId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
        assert!("42".parse::<CartId>().is_err());
    }

    #[test]
    fn cart_items_cascade_with_cart_and_product() {
        assert_eq!(CartItem::CART_ON_DELETE, OnDelete::Cascade);
        assert_eq!(CartItem::PRODUCT_ON_DELETE, OnDelete::Cascade);
    }
}
