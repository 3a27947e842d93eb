//! Domain ports and supporting types for the hexagonal boundary.

mod macros;
pub(crate) use macros::define_port_error;

mod entity_store;
mod transaction_executor;

#[cfg(test)]
pub use entity_store::MockEntityTransaction;
pub use entity_store::{EntityTransaction, StoreError};
pub use transaction_executor::{
    CancelHandle, CancelSignal, ExecutionContext, ExecutionScope, Interruption,
    TransactionExecutor, UnitOfWorkError, cancellation,
};
