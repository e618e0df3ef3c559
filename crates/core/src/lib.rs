//! `store-core`: shared building blocks for the store domain crates.
//!
//! Pure domain primitives only: identifiers, error model, entity/value-object
//! markers and foreign-key deletion policies. No IO lives here.

pub mod entity;
pub mod error;
pub mod id;
pub mod relation;
pub mod value_object;

pub use entity::Entity;
pub use error::{DomainError, DomainResult};
pub use id::RowKey;
pub use relation::OnDelete;
pub use value_object::ValueObject;
