//! Translation of pool and Diesel failures into [`StoreError`].

use diesel::result::{DatabaseErrorKind, Error as DieselError};
use tracing::debug;

use crate::domain::ports::StoreError;

use super::pool::PoolError;

/// Map pool errors to connection failures.
pub(crate) fn map_pool_error(error: PoolError) -> StoreError {
    match error {
        PoolError::Checkout { message } | PoolError::Build { message } => {
            StoreError::connection(message)
        }
    }
}

/// PostgreSQL cancels a lock wait that outlives `lock_timeout` with SQLSTATE
/// `55P03`, which Diesel reports as an unclassified database error.
fn is_lock_timeout(message: &str) -> bool {
    message.contains("lock timeout")
}

/// Map Diesel errors to entity store errors.
///
/// Constraint violations keep the constraint name so callers can tell a
/// failed `CHECK (in_stock >= 0)` from a dangling foreign key.
pub(crate) fn map_diesel_error(error: DieselError) -> StoreError {
    match &error {
        DieselError::DatabaseError(kind, info) => {
            debug!(?kind, message = info.message(), "diesel operation failed");
        }
        _ => debug!(
            error_type = %std::any::type_name_of_val(&error),
            "diesel operation failed"
        ),
    }

    match error {
        DieselError::NotFound => StoreError::query("record not found"),
        DieselError::QueryBuilderError(_) => StoreError::query("database query error"),
        DieselError::DatabaseError(
            DatabaseErrorKind::ClosedConnection | DatabaseErrorKind::UnableToSendCommand,
            _,
        ) => StoreError::connection("database connection error"),
        DieselError::DatabaseError(
            DatabaseErrorKind::UniqueViolation
            | DatabaseErrorKind::ForeignKeyViolation
            | DatabaseErrorKind::CheckViolation
            | DatabaseErrorKind::NotNullViolation,
            info,
        ) => StoreError::constraint(info.constraint_name().unwrap_or(info.message())),
        DieselError::DatabaseError(_, info) if is_lock_timeout(info.message()) => {
            StoreError::lock_timeout(info.message())
        }
        DieselError::DatabaseError(_, info) => StoreError::query(info.message()),
        DieselError::BrokenTransactionManager => {
            StoreError::connection("transaction manager is in an unusable state")
        }
        _ => StoreError::query("database error"),
    }
}
