//! Strongly-typed row identifiers used across the domain.
//!
//! Rows are keyed by store-assigned, monotonically increasing integers. Each
//! table gets its own newtype so a `ProductId` can never be passed where an
//! `OrderId` is expected.

/// A table key that can be rebuilt from the raw value the store assigned.
pub trait RowKey: Copy + Ord + core::hash::Hash + core::fmt::Debug {
    fn from_raw(raw: i64) -> Self;
    fn raw(self) -> i64;
}

/// Define a transparent `i64` row identifier newtype.
///
/// The generated type implements `RowKey`, `Display`, `FromStr` and the
/// `From` conversions to and from `i64`.
#[macro_export]
macro_rules! row_id {
    ($(#[$meta:meta])* $t:ident, $name:literal) => {
        $(#[$meta])*
        #[derive(
            Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash,
            serde::Serialize, serde::Deserialize,
        )]
        #[serde(transparent)]
        pub struct $t(i64);

        impl $t {
            pub const fn new(raw: i64) -> Self {
                Self(raw)
            }

            pub const fn get(self) -> i64 {
                self.0
            }
        }

        impl $crate::id::RowKey for $t {
            fn from_raw(raw: i64) -> Self {
                Self(raw)
            }

            fn raw(self) -> i64 {
                self.0
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                core::fmt::Display::fmt(&self.0, f)
            }
        }

        impl From<i64> for $t {
            fn from(value: i64) -> Self {
                Self(value)
            }
        }

        impl From<$t> for i64 {
            fn from(value: $t) -> Self {
                value.0
            }
        }

        impl core::str::FromStr for $t {
            type Err = $crate::error::DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let raw = s.trim().parse::<i64>().map_err(|e| {
                    $crate::error::DomainError::invalid_id(format!("{}: {}", $name, e))
                })?;
                if raw <= 0 {
                    return Err($crate::error::DomainError::invalid_id(format!(
                        "{}: must be positive",
                        $name
                    )));
                }
                Ok(Self(raw))
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::RowKey;
    use crate::DomainError;

    crate::row_id!(
        /// Identifier used only by these tests.
        WidgetId,
        "WidgetId"
    );

    #[test]
    fn parses_positive_ids() {
        let id: WidgetId = "42".parse().unwrap();
        assert_eq!(id.get(), 42);
        assert_eq!(id.to_string(), "42");
        assert_eq!(WidgetId::from_raw(42), id);
    }

    #[test]
    fn rejects_garbage_and_non_positive_ids() {
        assert!(matches!("abc".parse::<WidgetId>(), Err(DomainError::InvalidId(_))));
        assert!(matches!("0".parse::<WidgetId>(), Err(DomainError::InvalidId(_))));
        assert!(matches!("-3".parse::<WidgetId>(), Err(DomainError::InvalidId(_))));
    }

    #[test]
    fn serializes_transparently() {
        let json = serde_json::to_string(&WidgetId::new(7)).unwrap();
        assert_eq!(json, "7");
    }
}
