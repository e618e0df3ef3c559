use serde::{Deserialize, Serialize};

use store_core::{DomainError, DomainResult, ValueObject};

/// Positive small-integer quantity (`1..=32767`), shared by order and cart items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u16")]
pub struct Quantity(u16);

impl Quantity {
    pub const MAX: u16 = i16::MAX as u16;

    pub fn new(value: i64) -> DomainResult<Self> {
        if value < 1 {
            return Err(DomainError::validation("quantity must be positive"));
        }
        if value > i64::from(Self::MAX) {
            return Err(DomainError::validation(format!(
                "quantity cannot exceed {}",
                Self::MAX
            )));
        }
        Ok(Self(value as u16))
    }

    pub fn get(self) -> u16 {
        self.0
    }
}

impl ValueObject for Quantity {}

impl TryFrom<i64> for Quantity {
    type Error = DomainError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Quantity> for u16 {
    fn from(value: Quantity) -> Self {
        value.0
    }
}

impl core::fmt::Display for Quantity {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn bounds() {
        assert!(Quantity::new(0).is_err());
        assert!(Quantity::new(-1).is_err());
        assert_eq!(Quantity::new(1).unwrap().get(), 1);
        assert_eq!(Quantity::new(32767).unwrap().get(), 32767);
        assert!(Quantity::new(32768).is_err());
    }

    #[test]
    fn deserialization_validates() {
        assert!(serde_json::from_str::<Quantity>("0").is_err());
        assert_eq!(serde_json::from_str::<Quantity>("3").unwrap().get(), 3);
    }

    proptest! {
        #[test]
        fn accepts_exactly_the_positive_small_range(v in -100_000i64..100_000) {
            prop_assert_eq!(Quantity::new(v).is_ok(), (1..=32767).contains(&v));
        }
    }
}
