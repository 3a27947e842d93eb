//! PostgreSQL persistence adapters using Diesel ORM.
//!
//! Provides the [`DieselTransactionExecutor`], which opens a transaction on
//! a pooled `diesel-async` connection and hands the purchase workflow a
//! scoped entity handle bound to it.
//!
//! # Architecture
//!
//! - **Thin adapters**: the entity handle only translates between Diesel
//!   rows and domain records. Stock and funds rules live in the domain.
//! - **Internal models**: row structs (`models.rs`) and table definitions
//!   (`schema.rs`) never leave this module.
//! - **Async-safe pooling**: connections come from a `bb8` pool.
//! - **Strongly typed errors**: every Diesel failure becomes a
//!   [`crate::domain::ports::StoreError`].
//!
//! # Example
//!
//! ```no_run
//! use storefront::outbound::persistence::{DbPool, DieselTransactionExecutor, PoolConfig};
//!
//! # async fn connect() -> Result<(), storefront::outbound::persistence::PoolError> {
//! let pool = DbPool::new(PoolConfig::new("postgres://localhost/storefront")).await?;
//! let executor = DieselTransactionExecutor::new(pool);
//! # let _ = executor;
//! # Ok(())
//! # }
//! ```

mod diesel_entity_transaction;
mod diesel_transaction_executor;
mod error_mapping;
mod migrations;
mod models;
mod pool;
mod schema;

pub use diesel_transaction_executor::DieselTransactionExecutor;
pub use migrations::{MIGRATIONS, MigrationError, run_migrations};
pub use pool::{DbPool, PoolConfig, PoolError};
