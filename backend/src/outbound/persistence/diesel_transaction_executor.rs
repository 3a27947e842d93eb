//! PostgreSQL-backed [`TransactionExecutor`].
//!
//! Transactions are driven by hand through `AnsiTransactionManager` rather
//! than `AsyncConnection::transaction` so that an interrupted unit of work
//! still gets an explicit rollback whose failure can be reported alongside
//! the original cause.
//!
//! When the context carries a timeout, the time remaining after checkout is
//! also applied as a transaction-local `lock_timeout`, so a locking read that
//! waits too long fails on the server instead of pinning the connection.
//! That failure is reported as [`Interruption::TimedOut`], exactly like the
//! client-side deadline.
//!
//! Cancellation drops the in-flight statement future. PostgreSQL keeps
//! executing that statement until it finishes or hits `lock_timeout`; the
//! rollback is queued behind it on the same connection.

use async_trait::async_trait;
use diesel::sql_types::Text;
use diesel_async::{AnsiTransactionManager, AsyncPgConnection, RunQueryDsl, TransactionManager};
use futures_util::future::BoxFuture;
use tracing::debug;

use crate::domain::ports::{
    EntityTransaction, ExecutionContext, ExecutionScope, Interruption, StoreError,
    TransactionExecutor, UnitOfWorkError,
};

use super::diesel_entity_transaction::DieselEntityTransaction;
use super::error_mapping::{map_diesel_error, map_pool_error};
use super::pool::DbPool;

type Manager = AnsiTransactionManager;

/// Runs units of work inside PostgreSQL transactions drawn from a pool.
#[derive(Debug, Clone)]
pub struct DieselTransactionExecutor {
    pool: DbPool,
}

impl DieselTransactionExecutor {
    /// Create an executor over the given pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

async fn apply_lock_timeout(
    conn: &mut AsyncPgConnection,
    scope: &ExecutionScope,
) -> Result<(), StoreError> {
    let Some(remaining) = scope.remaining() else {
        return Ok(());
    };
    // Zero disables the timeout in PostgreSQL, so never send it.
    let millis = remaining.as_millis().max(1);
    diesel::sql_query("SELECT set_config('lock_timeout', $1, true)")
        .bind::<Text, _>(format!("{millis}ms"))
        .execute(conn)
        .await
        .map_err(map_diesel_error)?;
    Ok(())
}

#[async_trait]
impl TransactionExecutor for DieselTransactionExecutor {
    async fn execute<T, E, F>(&self, context: &ExecutionContext, work: F) -> Result<T, E>
    where
        T: Send + 'static,
        E: UnitOfWorkError + 'static,
        F: for<'t> FnOnce(&'t mut dyn EntityTransaction) -> BoxFuture<'t, Result<T, E>>
            + Send
            + 'static,
    {
        let scope = context.start();
        scope.check().map_err(E::interrupted)?;

        let mut pooled = scope
            .run(self.pool.get())
            .await
            .map_err(E::interrupted)?
            .map_err(|err| E::from(map_pool_error(err)))?;
        let conn: &mut AsyncPgConnection = &mut pooled;

        <Manager as TransactionManager<AsyncPgConnection>>::begin_transaction(conn)
            .await
            .map_err(|err| E::from(map_diesel_error(err)))?;

        let outcome = match apply_lock_timeout(conn, &scope).await {
            Err(err) => Err(E::from(err)),
            Ok(()) => {
                let mut tx = DieselEntityTransaction::new(conn);
                let outcome = scope.run(work(&mut tx)).await;
                match outcome {
                    // The server enforced the deadline before the client did.
                    Ok(Err(_)) if tx.lock_timed_out() => {
                        debug!("lock wait cancelled by lock_timeout");
                        Err(E::interrupted(Interruption::TimedOut))
                    }
                    Ok(outcome) => outcome,
                    Err(reason) => {
                        debug!(%reason, "unit of work interrupted");
                        Err(E::interrupted(reason))
                    }
                }
            }
        };

        match outcome {
            Ok(value) => {
                <Manager as TransactionManager<AsyncPgConnection>>::commit_transaction(conn)
                    .await
                    .map_err(|err| E::from(map_diesel_error(err)))?;
                Ok(value)
            }
            Err(error) => {
                match <Manager as TransactionManager<AsyncPgConnection>>::rollback_transaction(conn)
                    .await
                {
                    Ok(()) => Err(error),
                    Err(rollback) => {
                        debug!("rollback failed after unit of work error");
                        Err(error.with_rollback_failure(map_diesel_error(rollback)))
                    }
                }
            }
        }
    }
}
