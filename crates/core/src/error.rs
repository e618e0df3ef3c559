//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Value-level failures detected before any storage is touched. Relational
/// failures (uniqueness, references, missing rows) belong to the infra crate.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation (e.g. empty title, negative price).
    #[error("validation failed: {0}")]
    Validation(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }
}

/// Validate a required, length-bounded text column.
pub fn require_text(field: &str, value: &str, max_len: usize) -> DomainResult<()> {
    if value.trim().is_empty() {
        return Err(DomainError::validation(format!("{field} cannot be empty")));
    }
    limit_text(field, value, max_len)
}

/// Validate an optional (blank allowed) length-bounded text column.
pub fn limit_text(field: &str, value: &str, max_len: usize) -> DomainResult<()> {
    if value.chars().count() > max_len {
        return Err(DomainError::validation(format!(
            "{field} cannot exceed {max_len} characters"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn require_text_rejects_blank() {
        let err = require_text("title", "   ", 255).unwrap_err();
        assert_eq!(err, DomainError::validation("title cannot be empty"));
    }

    #[test]
    fn limit_text_counts_characters_not_bytes() {
        let value = "é".repeat(255);
        assert!(limit_text("title", &value, 255).is_ok());
        assert!(limit_text("title", &format!("{value}x"), 255).is_err());
    }

    #[test]
    fn limit_text_allows_blank() {
        assert!(limit_text("description", "", 500).is_ok());
    }
}
