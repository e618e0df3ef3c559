//! Sales domain module.
//!
//! Orders with their items, and session-scoped shopping carts. Pure domain
//! logic: no IO, no HTTP, no storage.

pub mod cart;
pub mod order;
pub mod quantity;

pub use cart::{Cart, CartId, CartItem, CartItemId, NewCartItem};
pub use order::{NewOrder, NewOrderItem, Order, OrderId, OrderItem, OrderItemId, OrderStatus};
pub use quantity::Quantity;
