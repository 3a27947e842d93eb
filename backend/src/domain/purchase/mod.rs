//! The "buy product" workflow.
//!
//! A purchase locks the product row, checks stock, locks the user row,
//! checks funds, then decrements both and records an order with its product
//! link. All of it runs as one unit of work, so a failed attempt leaves no
//! trace.
//!
//! Lock order is fixed: product first, then user. Any new workflow touching
//! both rows must follow the same order.

mod service;
mod workflow;

use serde::{Deserialize, Serialize};
use serde_json::json;

use super::ports::{Interruption, StoreError, UnitOfWorkError};
use super::{
    AmountValidationError, Error, Money, Order, OrderProduct, Product, ProductId, Quantity, User,
    UserId,
};

pub use service::PurchaseService;

/// Identifiers and quantity for one purchase attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseRequest {
    /// Buyer.
    pub user_id: UserId,
    /// Product being bought.
    pub product_id: ProductId,
    /// Units requested.
    pub quantity: Quantity,
}

impl PurchaseRequest {
    /// Build a request from an already validated quantity.
    pub fn new(user_id: UserId, product_id: ProductId, quantity: Quantity) -> Self {
        Self {
            user_id,
            product_id,
            quantity,
        }
    }

    /// Validate a raw quantity and build a request.
    ///
    /// # Errors
    ///
    /// Returns [`PurchaseError::InvalidQuantity`] for zero, negative or
    /// oversized quantities. No transaction is opened in that case.
    pub fn try_new(
        user_id: UserId,
        product_id: ProductId,
        quantity: i64,
    ) -> Result<Self, PurchaseError> {
        Ok(Self::new(user_id, product_id, Quantity::new(quantity)?))
    }
}

/// Post-purchase snapshots returned on commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseReceipt {
    /// Product after its stock was reduced.
    pub product: Product,
    /// Buyer after the balance was charged.
    pub user: User,
    /// The recorded order.
    pub order: Order,
    /// Link between the order and the product.
    pub order_product: OrderProduct,
}

/// Reasons a purchase did not commit.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PurchaseError {
    /// The requested quantity was not a positive integer.
    #[error(transparent)]
    InvalidQuantity(#[from] AmountValidationError),
    /// No product has the requested identifier.
    #[error("product {0} not found")]
    ProductNotFound(ProductId),
    /// No user has the requested identifier.
    #[error("user {0} not found")]
    UserNotFound(UserId),
    /// Selling the quantity would drive stock below zero.
    #[error("insufficient stock: requested {requested}, available {available}")]
    InsufficientStock {
        /// Units asked for.
        requested: u32,
        /// Units in stock when the locked read ran.
        available: u32,
    },
    /// The cost exceeds the buyer's balance.
    #[error("insufficient funds: required {required}, available {available}")]
    InsufficientFunds {
        /// Total cost, or [`Money::MAX`] when it overflows.
        required: Money,
        /// Balance when the locked read ran.
        available: Money,
    },
    /// The store failed while running the workflow or committing it.
    #[error(transparent)]
    Storage(#[from] StoreError),
    /// Rolling back after a failure also failed.
    #[error("tx error: {cause}, rb err: {rollback}")]
    RollbackFailed {
        /// The failure that triggered the rollback.
        cause: Box<PurchaseError>,
        /// Why the rollback failed.
        rollback: StoreError,
    },
    /// The caller cancelled or the deadline passed.
    #[error(transparent)]
    Interrupted(Interruption),
}

impl PurchaseError {
    /// Whether a business rule refused the purchase.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::InsufficientStock { .. } | Self::InsufficientFunds { .. }
        )
    }

    /// Whether a referenced record was absent.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::ProductNotFound(_) | Self::UserNotFound(_))
    }
}

impl UnitOfWorkError for PurchaseError {
    fn interrupted(reason: Interruption) -> Self {
        Self::Interrupted(reason)
    }

    fn with_rollback_failure(self, rollback: StoreError) -> Self {
        Self::RollbackFailed {
            cause: Box::new(self),
            rollback,
        }
    }
}

impl From<PurchaseError> for Error {
    fn from(value: PurchaseError) -> Self {
        let message = value.to_string();
        match value {
            PurchaseError::InvalidQuantity(_) => Error::invalid_request(message),
            PurchaseError::ProductNotFound(_) | PurchaseError::UserNotFound(_) => {
                Error::not_found(message)
            }
            PurchaseError::InsufficientStock {
                requested,
                available,
            } => Error::rejected(message).with_details(json!({
                "reason": "insufficient_stock",
                "requested": requested,
                "available": available,
            })),
            PurchaseError::InsufficientFunds {
                required,
                available,
            } => Error::rejected(message).with_details(json!({
                "reason": "insufficient_funds",
                "required": required,
                "available": available,
            })),
            PurchaseError::Storage(store) if store.is_connection() => {
                Error::service_unavailable(message)
            }
            PurchaseError::Interrupted(_) => Error::service_unavailable(message),
            PurchaseError::Storage(_) | PurchaseError::RollbackFailed { .. } => {
                Error::internal(message)
            }
        }
    }
}

#[cfg(test)]
mod tests;
