//! Entry point wrapping the purchase unit of work in a transaction.

use tracing::{info, instrument, warn};

use super::{PurchaseError, PurchaseReceipt, PurchaseRequest, workflow};
use crate::domain::ports::{ExecutionContext, TransactionExecutor};

/// Runs purchases through an injected [`TransactionExecutor`].
#[derive(Debug, Clone)]
pub struct PurchaseService<X> {
    executor: X,
}

impl<X> PurchaseService<X>
where
    X: TransactionExecutor,
{
    /// Wrap the executor used for every purchase.
    pub fn new(executor: X) -> Self {
        Self { executor }
    }

    /// Buy `request.quantity` units of a product for a user.
    ///
    /// # Errors
    ///
    /// Returns the [`PurchaseError`] that stopped the attempt. Nothing is
    /// persisted in that case and nothing is retried.
    #[instrument(
        skip(self, context),
        fields(
            user_id = %request.user_id,
            product_id = %request.product_id,
            quantity = %request.quantity,
        )
    )]
    pub async fn buy_product(
        &self,
        context: &ExecutionContext,
        request: PurchaseRequest,
    ) -> Result<PurchaseReceipt, PurchaseError> {
        let outcome = self
            .executor
            .execute(context, move |tx| {
                Box::pin(workflow::buy_product(tx, request))
            })
            .await;

        match &outcome {
            Ok(receipt) => info!(
                order_id = %receipt.order.id,
                in_stock = receipt.product.in_stock(),
                balance = %receipt.user.balance(),
                "purchase committed"
            ),
            Err(error) if error.is_rejection() || error.is_not_found() => {
                info!(%error, "purchase rejected");
            }
            Err(error) => warn!(%error, "purchase failed"),
        }
        outcome
    }
}
