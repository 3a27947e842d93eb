//! Concurrent client harness.
//!
//! Launches many purchase attempts at once against shared rows and tallies
//! the outcomes. All attempts wait on a barrier so they reach the store at
//! the same moment, which is what makes lost updates and overselling
//! observable if the locking discipline is ever broken.

use std::sync::Arc;

use tokio::sync::Barrier;
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::domain::ports::{ExecutionContext, TransactionExecutor};
use crate::domain::{PurchaseError, PurchaseReceipt, PurchaseRequest, PurchaseService};

/// Outcome tally of one harness run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HarnessReport {
    /// Committed purchases.
    pub succeeded: usize,
    /// Attempts refused for lack of stock.
    pub insufficient_stock: usize,
    /// Attempts refused for lack of funds.
    pub insufficient_funds: usize,
    /// Attempts naming a missing user or product.
    pub not_found: usize,
    /// Storage failures, interruptions and panicked tasks.
    pub other_failures: usize,
    /// Receipts of committed purchases, in completion order.
    pub receipts: Vec<PurchaseReceipt>,
    /// Every error returned, in completion order.
    pub errors: Vec<PurchaseError>,
}

impl HarnessReport {
    /// Total number of attempts recorded.
    pub fn attempts(&self) -> usize {
        self.succeeded
            + self.insufficient_stock
            + self.insufficient_funds
            + self.not_found
            + self.other_failures
    }

    fn record(&mut self, outcome: Result<PurchaseReceipt, PurchaseError>) {
        match outcome {
            Ok(receipt) => {
                self.succeeded += 1;
                self.receipts.push(receipt);
            }
            Err(error) => {
                match &error {
                    PurchaseError::InsufficientStock { .. } => self.insufficient_stock += 1,
                    PurchaseError::InsufficientFunds { .. } => self.insufficient_funds += 1,
                    PurchaseError::ProductNotFound(_) | PurchaseError::UserNotFound(_) => {
                        self.not_found += 1;
                    }
                    _ => self.other_failures += 1,
                }
                self.errors.push(error);
            }
        }
    }
}

/// Drives simultaneous purchases through a shared [`PurchaseService`].
#[derive(Debug)]
pub struct PurchaseHarness<X> {
    service: Arc<PurchaseService<X>>,
    context: ExecutionContext,
}

impl<X> PurchaseHarness<X>
where
    X: TransactionExecutor + 'static,
{
    /// Harness issuing attempts without timeout or cancellation.
    pub fn new(service: PurchaseService<X>) -> Self {
        Self {
            service: Arc::new(service),
            context: ExecutionContext::new(),
        }
    }

    /// Use `context` for every attempt.
    #[must_use]
    pub fn with_context(mut self, context: ExecutionContext) -> Self {
        self.context = context;
        self
    }

    /// Run every request concurrently and wait for all of them.
    pub async fn run(&self, requests: Vec<PurchaseRequest>) -> HarnessReport {
        let barrier = Arc::new(Barrier::new(requests.len()));
        let mut tasks = JoinSet::new();
        for request in requests {
            let service = Arc::clone(&self.service);
            let context = self.context.clone();
            let barrier = Arc::clone(&barrier);
            tasks.spawn(async move {
                barrier.wait().await;
                service.buy_product(&context, request).await
            });
        }

        let mut report = HarnessReport::default();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => report.record(outcome),
                Err(error) => {
                    warn!(%error, "purchase task did not complete");
                    report.other_failures += 1;
                }
            }
        }

        info!(
            attempts = report.attempts(),
            succeeded = report.succeeded,
            insufficient_stock = report.insufficient_stock,
            insufficient_funds = report.insufficient_funds,
            not_found = report.not_found,
            other_failures = report.other_failures,
            "harness run finished"
        );
        report
    }

    /// Run `attempts` copies of the same request concurrently.
    pub async fn run_repeated(&self, request: PurchaseRequest, attempts: usize) -> HarnessReport {
        self.run(vec![request; attempts]).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Money, ProductId, UserId};
    use rstest::rstest;

    #[rstest]
    fn record_tallies_by_failure_kind() {
        let mut report = HarnessReport::default();
        report.record(Err(PurchaseError::InsufficientStock {
            requested: 1,
            available: 0,
        }));
        report.record(Err(PurchaseError::InsufficientFunds {
            required: Money::new(500).expect("amount"),
            available: Money::ZERO,
        }));
        report.record(Err(PurchaseError::UserNotFound(UserId::random())));
        report.record(Err(PurchaseError::ProductNotFound(ProductId::random())));

        assert_eq!(report.insufficient_stock, 1);
        assert_eq!(report.insufficient_funds, 1);
        assert_eq!(report.not_found, 2);
        assert_eq!(report.attempts(), 4);
        assert_eq!(report.errors.len(), 4);
    }

    #[rstest]
    #[tokio::test]
    async fn empty_run_reports_nothing() {
        let harness = PurchaseHarness::new(PurchaseService::new(
            crate::outbound::memory::InMemoryStore::new(),
        ));
        let report = harness.run(Vec::new()).await;
        assert_eq!(report, HarnessReport::default());
    }
}
