//! Storefront core: users with balances buy products from a finite stock.
//!
//! The purchase workflow runs as one store transaction that locks the
//! product and the buyer, checks stock and funds, then records the order.
//! Adapters are provided for PostgreSQL (Diesel) and for a process-local
//! in-memory store with the same locking semantics.

pub mod config;
pub mod domain;
pub mod harness;
pub mod outbound;
pub mod telemetry;
