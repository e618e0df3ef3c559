use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use store_core::error::require_text;
use store_core::{DomainError, DomainResult, Entity, OnDelete, ValueObject, row_id};

use crate::category::CategoryId;
use crate::discount::DiscountId;

row_id!(
    /// Product identifier.
    ProductId,
    "ProductId"
);

pub const NAME_MAX_LEN: usize = 255;
pub const SLUG_MAX_LEN: usize = 50;
/// Largest value a non-negative 32-bit inventory column can hold.
pub const MAX_INVENTORY: u32 = i32::MAX as u32;

/// Fixed-point price: non-negative, two decimal places, at most six digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Price(Decimal);

impl Price {
    pub const DECIMAL_PLACES: u32 = 2;
    pub const MAX_DIGITS: u32 = 6;

    pub fn new(amount: Decimal) -> DomainResult<Self> {
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(DomainError::validation("price cannot be negative"));
        }
        if amount.normalize().scale() > Self::DECIMAL_PLACES {
            return Err(DomainError::validation(format!(
                "price cannot have more than {} decimal places",
                Self::DECIMAL_PLACES
            )));
        }
        let mut amount = amount.abs();
        amount.rescale(Self::DECIMAL_PLACES);
        if amount >= Self::limit() {
            return Err(DomainError::validation(format!(
                "price cannot have more than {} digits",
                Self::MAX_DIGITS
            )));
        }
        Ok(Self(amount))
    }

    pub fn zero() -> Self {
        Self(Decimal::new(0, Self::DECIMAL_PLACES))
    }

    pub fn amount(&self) -> Decimal {
        self.0
    }

    fn limit() -> Decimal {
        Decimal::from(10_i64.pow(Self::MAX_DIGITS - Self::DECIMAL_PLACES))
    }
}

impl ValueObject for Price {}

impl TryFrom<Decimal> for Price {
    type Error = DomainError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Price> for Decimal {
    fn from(value: Price) -> Self {
        value.0
    }
}

impl core::str::FromStr for Price {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let amount = Decimal::from_str_exact(s.trim())
            .map_err(|e| DomainError::validation(format!("invalid price '{s}': {e}")))?;
        Self::new(amount)
    }
}

impl core::fmt::Display for Price {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// URL-safe product handle (letters, digits, `-` and `_`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Slug(String);

impl Slug {
    pub fn parse(value: impl Into<String>) -> DomainResult<Self> {
        let value = value.into();
        if value.is_empty() {
            return Err(DomainError::validation("slug cannot be empty"));
        }
        if value.len() > SLUG_MAX_LEN {
            return Err(DomainError::validation(format!(
                "slug cannot exceed {SLUG_MAX_LEN} characters"
            )));
        }
        if !value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(DomainError::validation(format!(
                "slug '{value}' may only contain letters, numbers, underscores or hyphens"
            )));
        }
        Ok(Self(value))
    }

    /// Derive a slug from a display name.
    ///
    /// Non-ASCII text is transliterated first ("Café" → "cafe"). A name with
    /// nothing transliterable gets `product-` plus a short name-based UUID,
    /// so the same name always yields the same slug.
    pub fn from_name(name: &str) -> Self {
        let slug = slug::slugify(name);
        let truncated: String = slug.chars().take(SLUG_MAX_LEN).collect();
        let truncated = truncated.trim_end_matches('-');
        if truncated.is_empty() {
            let digest = Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes()).simple().to_string();
            return Self(format!("product-{}", &digest[..12]));
        }
        Self(truncated.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl ValueObject for Slug {}

impl TryFrom<String> for Slug {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<Slug> for String {
    fn from(value: Slug) -> Self {
        value.0
    }
}

impl core::fmt::Display for Slug {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A sellable catalog product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub slug: Slug,
    pub description: String,
    pub price: Price,
    pub inventory: u32,
    pub category_id: CategoryId,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    pub discount_ids: Vec<DiscountId>,
}

impl Product {
    /// A category cannot be deleted while it still has products.
    pub const CATEGORY_ON_DELETE: OnDelete = OnDelete::Protect;

    pub fn has_discount(&self, discount_id: DiscountId) -> bool {
        self.discount_ids.contains(&discount_id)
    }
}

impl Entity for Product {
    type Id = ProductId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

impl core::fmt::Display for Product {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.name)
    }
}

/// Insert payload for a product.
///
/// `slug` is optional: when absent it is derived from `name`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProduct {
    pub name: String,
    #[serde(default)]
    pub slug: Option<Slug>,
    #[serde(default)]
    pub description: String,
    pub price: Price,
    pub inventory: u32,
    pub category_id: CategoryId,
    #[serde(default)]
    pub discount_ids: Vec<DiscountId>,
}

impl NewProduct {
    pub fn new(name: impl Into<String>, category_id: CategoryId, price: Price, inventory: u32) -> Self {
        Self {
            name: name.into(),
            slug: None,
            description: String::new(),
            price,
            inventory,
            category_id,
            discount_ids: Vec::new(),
        }
    }

    pub fn with_slug(mut self, slug: Slug) -> Self {
        self.slug = Some(slug);
        self
    }

    pub fn with_discounts(mut self, discount_ids: Vec<DiscountId>) -> Self {
        self.discount_ids = discount_ids;
        self
    }

    pub fn validate(&self) -> DomainResult<()> {
        require_text("name", &self.name, NAME_MAX_LEN)?;
        validate_inventory(self.inventory)
    }

    /// The explicit slug, or one derived from the name.
    pub fn resolved_slug(&self) -> Slug {
        match &self.slug {
            Some(slug) => slug.clone(),
            None => Slug::from_name(&self.name),
        }
    }

    pub fn into_product(self, id: ProductId, now: DateTime<Utc>) -> Product {
        let slug = self.resolved_slug();
        let mut discount_ids = self.discount_ids;
        discount_ids.sort();
        discount_ids.dedup();
        Product {
            id,
            name: self.name,
            slug,
            description: self.description,
            price: self.price,
            inventory: self.inventory,
            category_id: self.category_id,
            created_at: now,
            modified_at: now,
            discount_ids,
        }
    }
}

pub fn validate_inventory(inventory: u32) -> DomainResult<()> {
    if inventory > MAX_INVENTORY {
        return Err(DomainError::validation(format!(
            "inventory cannot exceed {MAX_INVENTORY}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn price(s: &str) -> Price {
        s.parse().unwrap()
    }

    #[test]
    fn price_is_rescaled_to_two_places() {
        assert_eq!(price("12").to_string(), "12.00");
        assert_eq!(price("12.5").to_string(), "12.50");
        assert_eq!(Price::new(Decimal::new(999, 2)).unwrap(), price("9.99"));
    }

    #[test]
    fn price_rejects_negative_amounts() {
        let err = "-0.01".parse::<Price>().unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn price_rejects_extra_decimal_places() {
        assert!("1.005".parse::<Price>().is_err());
        // Trailing zeros are not extra precision.
        assert_eq!(price("1.500"), price("1.5"));
    }

    #[test]
    fn price_respects_max_digits() {
        assert!("9999.99".parse::<Price>().is_ok());
        assert!("10000.00".parse::<Price>().is_err());
    }

    #[test]
    fn price_serializes_as_string() {
        let json = serde_json::to_string(&price("4.2")).unwrap();
        assert_eq!(json, "\"4.20\"");
        let back: Price = serde_json::from_str("\"4.20\"").unwrap();
        assert_eq!(back, price("4.2"));
    }

    #[test]
    fn slug_is_derived_from_name() {
        assert_eq!(Slug::from_name("Blue Coffee Mug").as_str(), "blue-coffee-mug");
        assert_eq!(Slug::from_name("  Tea -- & Biscuits! ").as_str(), "tea-biscuits");
        assert_eq!(Slug::from_name("snake_case name").as_str(), "snake-case-name");
    }

    #[test]
    fn slug_transliterates_accented_names() {
        assert_eq!(Slug::from_name("Café Crème").as_str(), "cafe-creme");
    }

    #[test]
    fn slug_from_non_latin_name_is_a_valid_handle() {
        let slug = Slug::from_name("کتاب");
        assert!(Slug::parse(slug.as_str()).is_ok());

        let product = NewProduct::new("کتاب", CategoryId::new(1), Price::zero(), 1);
        assert!(product.validate().is_ok());
        assert_eq!(product.resolved_slug(), slug);
    }

    #[test]
    fn slug_falls_back_to_a_stable_name_digest() {
        let slug = Slug::from_name("!!!");
        assert!(slug.as_str().starts_with("product-"));
        assert!(Slug::parse(slug.as_str()).is_ok());
        assert_eq!(Slug::from_name("!!!"), slug);
        assert_ne!(Slug::from_name("???"), slug);
    }

    #[test]
    fn slug_rejects_spaces() {
        assert!(Slug::parse("blue mug").is_err());
        assert!(Slug::parse("Blue-Mug_2").is_ok());
    }

    #[test]
    fn long_names_are_truncated_to_slug_limit() {
        let name = "word ".repeat(30);
        let slug = Slug::from_name(&name);
        assert!(slug.as_str().len() <= SLUG_MAX_LEN);
        assert!(!slug.as_str().ends_with('-'));
    }

    #[test]
    fn new_product_rejects_blank_name() {
        let product = NewProduct::new(" ", CategoryId::new(1), Price::zero(), 0);
        assert!(product.validate().is_err());
    }

    #[test]
    fn new_product_rejects_inventory_beyond_column_range() {
        let product = NewProduct::new("Mug", CategoryId::new(1), Price::zero(), u32::MAX);
        assert!(product.validate().is_err());
    }

    #[test]
    fn into_product_stamps_timestamps_and_dedups_discounts() {
        let now = Utc::now();
        let product = NewProduct::new("Mug", CategoryId::new(1), price("3.50"), 7)
            .with_discounts(vec![DiscountId::new(2), DiscountId::new(1), DiscountId::new(2)])
            .into_product(ProductId::new(10), now);

        assert_eq!(product.slug.as_str(), "mug");
        assert_eq!(product.created_at, now);
        assert_eq!(product.modified_at, now);
        assert_eq!(product.discount_ids, vec![DiscountId::new(1), DiscountId::new(2)]);
        assert!(product.has_discount(DiscountId::new(1)));
    }
}
