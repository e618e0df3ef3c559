//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects have no identity and are compared by their attribute values
/// (e.g. a `Price` of `9.99`, a `Slug` of `"blue-mug"`). They are immutable:
/// "changing" one means constructing a new one, which is also where validation
/// happens, so a value object that exists is always valid.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
