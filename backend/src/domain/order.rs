//! Orders recorded by successful purchases.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{OrderId, ProductId, Quantity, UserId};

/// A committed purchase owned by one user.
///
/// Orders are immutable once written by the purchase workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    /// Stable identifier.
    pub id: OrderId,
    /// Buyer that placed the order.
    pub user_id: UserId,
    /// Units bought.
    pub quantity: Quantity,
    /// When the order was written.
    pub created_at: DateTime<Utc>,
}

/// Link between an order and the product it bought.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderProduct {
    /// Owning order.
    pub order_id: OrderId,
    /// Purchased product.
    pub product_id: ProductId,
}

/// An order together with its product links, as returned by lookups.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderDetails {
    /// The order itself.
    pub order: Order,
    /// Products linked to the order.
    pub products: Vec<ProductId>,
}
