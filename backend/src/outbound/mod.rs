//! Outbound adapters implementing domain ports for external infrastructure.
//!
//! - **persistence**: PostgreSQL-backed entity store and transaction executor
//!   using Diesel ORM with row-level `FOR NO KEY UPDATE` locking
//! - **memory**: process-local store with the same locking contract, used by
//!   tests and the load harness when no database is configured
//!
//! Adapters are thin translators that convert between domain types and
//! infrastructure-specific representations. They contain no business logic.

pub mod memory;
pub mod persistence;
