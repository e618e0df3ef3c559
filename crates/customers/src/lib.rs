//! Customers domain module.
//!
//! Customers and their (single) postal address. Pure domain logic: no IO,
//! no HTTP, no storage.

pub mod address;
pub mod customer;

pub use address::{Address, NewAddress};
pub use customer::{Customer, CustomerId, Email, NewCustomer};
