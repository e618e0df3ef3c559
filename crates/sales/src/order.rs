use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use store_catalog::{Price, ProductId};
use store_core::{DomainError, DomainResult, Entity, OnDelete, row_id};
use store_customers::CustomerId;

use crate::quantity::Quantity;

row_id!(
    /// Order identifier.
    OrderId,
    "OrderId"
);

row_id!(
    /// Order item identifier.
    OrderItemId,
    "OrderItemId"
);

/// Payment status of an order.
///
/// Any status may be assigned at any time; no transition order is enforced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Paid,
    #[default]
    Unpaid,
    Cancelled,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 3] = [OrderStatus::Paid, OrderStatus::Unpaid, OrderStatus::Cancelled];

    /// Single-letter storage code.
    pub fn code(self) -> &'static str {
        match self {
            OrderStatus::Paid => "p",
            OrderStatus::Unpaid => "u",
            OrderStatus::Cancelled => "c",
        }
    }

    pub fn from_code(code: &str) -> DomainResult<Self> {
        Self::ALL
            .into_iter()
            .find(|s| s.code() == code)
            .ok_or_else(|| DomainError::validation(format!("unknown order status code '{code}'")))
    }

    pub fn label(self) -> &'static str {
        match self {
            OrderStatus::Paid => "Paid",
            OrderStatus::Unpaid => "Unpaid",
            OrderStatus::Cancelled => "Cancelled",
        }
    }
}

/// Order header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub customer_id: CustomerId,
    pub created_at: DateTime<Utc>,
    pub status: OrderStatus,
}

impl Order {
    pub const CUSTOMER_ON_DELETE: OnDelete = OnDelete::Protect;

    /// Listing order: newest first, ties broken by the higher id.
    pub fn newest_first(a: &Order, b: &Order) -> core::cmp::Ordering {
        b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id))
    }
}

impl Entity for Order {
    type Id = OrderId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// One product line of an order, with the price captured when it was added.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub quantity: Quantity,
    pub price: Price,
}

impl OrderItem {
    /// An order with items cannot be deleted until its items are.
    pub const ORDER_ON_DELETE: OnDelete = OnDelete::Protect;
    /// A product that was ever ordered cannot be deleted.
    pub const PRODUCT_ON_DELETE: OnDelete = OnDelete::Protect;
}

impl Entity for OrderItem {
    type Id = OrderItemId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrderItem {
    pub product_id: ProductId,
    pub quantity: Quantity,
    /// Price snapshot. When absent the product's current price is captured.
    #[serde(default)]
    pub price: Option<Price>,
}

impl NewOrderItem {
    pub fn new(product_id: ProductId, quantity: Quantity) -> Self {
        Self {
            product_id,
            quantity,
            price: None,
        }
    }

    pub fn into_item(self, id: OrderItemId, order_id: OrderId, current_price: Price) -> OrderItem {
        OrderItem {
            id,
            order_id,
            product_id: self.product_id,
            quantity: self.quantity,
            price: self.price.unwrap_or(current_price),
        }
    }
}

/// Insert payload for an order and its inline items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrder {
    pub customer_id: CustomerId,
    #[serde(default)]
    pub status: OrderStatus,
    pub items: Vec<NewOrderItem>,
}

impl NewOrder {
    pub fn validate(&self) -> DomainResult<()> {
        if self.items.is_empty() {
            return Err(DomainError::validation("an order needs at least one item"));
        }
        Ok(())
    }

    pub fn into_order(self, id: OrderId, now: DateTime<Utc>) -> (Order, Vec<NewOrderItem>) {
        let order = Order {
            id,
            customer_id: self.customer_id,
            created_at: now,
            status: self.status,
        };
        (order, self.items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn qty(n: i64) -> Quantity {
        Quantity::new(n).unwrap()
    }

    #[test]
    fn orders_default_to_unpaid() {
        let order: NewOrder = serde_json::from_value(serde_json::json!({
            "customer_id": 1,
            "items": [{ "product_id": 2, "quantity": 1 }],
        }))
        .unwrap();
        assert_eq!(order.status, OrderStatus::Unpaid);
        assert!(order.validate().is_ok());
    }

    #[test]
    fn order_without_items_is_rejected() {
        let order = NewOrder {
            customer_id: CustomerId::new(1),
            status: OrderStatus::Paid,
            items: Vec::new(),
        };
        assert!(matches!(order.validate(), Err(DomainError::Validation(_))));
    }

    #[test]
    fn status_codes_round_trip() {
        for status in OrderStatus::ALL {
            assert_eq!(OrderStatus::from_code(status.code()).unwrap(), status);
        }
        assert!(OrderStatus::from_code("x").is_err());
        assert_eq!(serde_json::to_string(&OrderStatus::Cancelled).unwrap(), "\"cancelled\"");
    }

    #[test]
    fn item_captures_current_price_unless_given() {
        let current: Price = "9.99".parse().unwrap();
        let explicit: Price = "5.00".parse().unwrap();

        let item = NewOrderItem::new(ProductId::new(1), qty(2)).into_item(
            OrderItemId::new(1),
            OrderId::new(1),
            current,
        );
        assert_eq!(item.price, current);

        let mut new = NewOrderItem::new(ProductId::new(1), qty(2));
        new.price = Some(explicit);
        let item = new.into_item(OrderItemId::new(2), OrderId::new(1), current);
        assert_eq!(item.price, explicit);
    }

    #[test]
    fn newest_first_breaks_ties_by_id() {
        let now = Utc::now();
        let mk = |id: i64, at| Order {
            id: OrderId::new(id),
            customer_id: CustomerId::new(1),
            created_at: at,
            status: OrderStatus::Unpaid,
        };
        let mut orders = vec![mk(1, now - Duration::seconds(5)), mk(2, now), mk(3, now)];
        orders.sort_by(Order::newest_first);
        let ids: Vec<i64> = orders.iter().map(|o| o.id.get()).collect();
        assert_eq!(ids, vec![3, 2, 1]);
    }
}
