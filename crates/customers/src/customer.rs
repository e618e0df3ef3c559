use serde::{Deserialize, Serialize};

use store_core::error::require_text;
use store_core::{DomainError, DomainResult, Entity, ValueObject, row_id};

row_id!(
    /// Customer identifier.
    CustomerId,
    "CustomerId"
);

pub const NAME_MAX_LEN: usize = 255;
pub const PHONE_MAX_LEN: usize = 255;
pub const EMAIL_MAX_LEN: usize = 254;

/// An email address that passed a shape check (`local@domain.tld`).
///
/// This is a syntactic check only; deliverability is not verified.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Email(String);

impl Email {
    pub fn parse(value: impl Into<String>) -> DomainResult<Self> {
        let value = value.into().trim().to_string();
        let invalid = || DomainError::validation(format!("'{value}' is not a valid email address"));

        if value.is_empty() || value.chars().count() > EMAIL_MAX_LEN {
            return Err(invalid());
        }
        if value.chars().any(char::is_whitespace) {
            return Err(invalid());
        }
        let Some((local, domain)) = value.rsplit_once('@') else {
            return Err(invalid());
        };
        if local.is_empty() || local.contains('@') {
            return Err(invalid());
        }
        let labels: Vec<&str> = domain.split('.').collect();
        if labels.len() < 2 || labels.iter().any(|l| l.is_empty() || l.starts_with('-') || l.ends_with('-')) {
            return Err(invalid());
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl ValueObject for Email {}

impl TryFrom<String> for Email {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<Email> for String {
    fn from(value: Email) -> Self {
        value.0
    }
}

impl core::fmt::Display for Email {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A store customer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub id: CustomerId,
    pub first_name: String,
    pub last_name: String,
    pub email: Email,
    pub phone_number: String,
}

impl Customer {
    /// Admin listing order: first name, then last name, ignoring case.
    pub fn sort_key(&self) -> (String, String, CustomerId) {
        (
            self.first_name.to_lowercase(),
            self.last_name.to_lowercase(),
            self.id,
        )
    }

    /// Case-insensitive prefix match on either name.
    pub fn name_starts_with(&self, prefix: &str) -> bool {
        let prefix = prefix.to_lowercase();
        self.first_name.to_lowercase().starts_with(&prefix)
            || self.last_name.to_lowercase().starts_with(&prefix)
    }
}

impl Entity for Customer {
    type Id = CustomerId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

impl core::fmt::Display for Customer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{} {}", self.first_name, self.last_name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCustomer {
    pub first_name: String,
    pub last_name: String,
    pub email: Email,
    pub phone_number: String,
}

impl NewCustomer {
    pub fn validate(&self) -> DomainResult<()> {
        require_text("first_name", &self.first_name, NAME_MAX_LEN)?;
        require_text("last_name", &self.last_name, NAME_MAX_LEN)?;
        require_text("phone_number", &self.phone_number, PHONE_MAX_LEN)
    }

    pub fn into_customer(self, id: CustomerId) -> Customer {
        Customer {
            id,
            first_name: self.first_name,
            last_name: self.last_name,
            email: self.email,
            phone_number: self.phone_number,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn ada() -> Customer {
        NewCustomer {
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            email: Email::parse("ada@example.com").unwrap(),
            phone_number: "+44 20 0000".into(),
        }
        .into_customer(CustomerId::new(1))
    }

    #[test]
    fn displays_full_name() {
        assert_eq!(ada().to_string(), "Ada Lovelace");
    }

    #[test]
    fn accepts_ordinary_addresses() {
        for ok in ["a@b.co", "first.last+tag@sub.example.org", "  padded@example.com "] {
            assert!(Email::parse(ok).is_ok(), "{ok}");
        }
    }

    #[test]
    fn rejects_malformed_addresses() {
        for bad in ["", "plain", "@example.com", "a@", "a@localhost", "a@b..com", "a b@c.com", "a@-b.com"] {
            assert!(Email::parse(bad).is_err(), "{bad}");
        }
    }

    #[test]
    fn email_deserialization_validates() {
        let err = serde_json::from_str::<Email>("\"nope\"");
        assert!(err.is_err());
    }

    #[test]
    fn name_search_matches_either_name_prefix() {
        let c = ada();
        assert!(c.name_starts_with("ad"));
        assert!(c.name_starts_with("LOVE"));
        assert!(!c.name_starts_with("lace"));
    }

    #[test]
    fn phone_number_is_required() {
        let mut new = NewCustomer {
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            email: Email::parse("ada@example.com").unwrap(),
            phone_number: String::new(),
        };
        assert!(new.validate().is_err());
        new.phone_number = "123".into();
        assert!(new.validate().is_ok());
    }

    proptest! {
        #[test]
        fn generated_addresses_parse(local in "[a-z0-9]{1,20}", host in "[a-z]{1,20}", tld in "[a-z]{2,6}") {
            let raw = format!("{local}@{host}.{tld}");
            let email = Email::parse(raw.clone()).unwrap();
            prop_assert_eq!(email.as_str(), raw.as_str());
        }
    }
}
