//! Catalog domain module.
//!
//! Categories, products, discounts and product comments, plus the inventory
//! classifier and list filter used by the admin catalog listing. Pure domain
//! logic: no IO, no HTTP, no storage.

pub mod category;
pub mod comment;
pub mod discount;
pub mod inventory;
pub mod product;
pub mod query;

pub use category::{Category, CategoryId, NewCategory};
pub use comment::{Comment, CommentId, CommentStatus, NewComment};
pub use discount::{Discount, DiscountId, NewDiscount};
pub use inventory::{InventoryBand, InventoryFilter, InventoryStatus, Lookup};
pub use product::{NewProduct, Price, Product, ProductId, Slug};
pub use query::{CreatedWithin, InventoryPredicate, ProductQuery};
