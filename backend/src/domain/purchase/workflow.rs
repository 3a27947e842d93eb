//! Unit of work executed inside the purchase transaction.

use tracing::debug;

use super::{PurchaseError, PurchaseReceipt, PurchaseRequest};
use crate::domain::Money;
use crate::domain::ports::EntityTransaction;

/// Run the purchase protocol against an open transaction.
///
/// Every check happens against locked rows and before the first write, so
/// a rejected attempt issues no mutation at all.
pub(super) async fn buy_product(
    tx: &mut dyn EntityTransaction,
    request: PurchaseRequest,
) -> Result<PurchaseReceipt, PurchaseError> {
    let PurchaseRequest {
        user_id,
        product_id,
        quantity,
    } = request;

    let product = tx
        .get_product_for_update(product_id)
        .await?
        .ok_or(PurchaseError::ProductNotFound(product_id))?;

    let available = product.in_stock();
    if available < quantity.get() {
        debug!(%product_id, available, requested = quantity.get(), "stock check failed");
        return Err(PurchaseError::InsufficientStock {
            requested: quantity.get(),
            available,
        });
    }

    let user = tx
        .get_user_for_update(user_id)
        .await?
        .ok_or(PurchaseError::UserNotFound(user_id))?;

    // An unrepresentable cost can never be afforded.
    let cost = product.price().checked_times(quantity.get());
    let Some(cost) = cost.filter(|cost| user.balance().checked_sub(*cost).is_some()) else {
        debug!(%user_id, balance = %user.balance(), "funds check failed");
        return Err(PurchaseError::InsufficientFunds {
            required: cost.unwrap_or(Money::MAX),
            available: user.balance(),
        });
    };

    let product = tx.reduce_product_stock(product_id, quantity).await?;
    let user = tx.reduce_user_balance(user_id, cost).await?;
    let order = tx.create_order(user_id, quantity).await?;
    let order_product = tx.create_order_product(order.id, product_id).await?;

    Ok(PurchaseReceipt {
        product,
        user,
        order,
        order_product,
    })
}
