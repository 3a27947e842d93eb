//! Shared helpers for storefront integration tests.
//!
//! Integration tests compile as separate crates under `backend/tests/`, so
//! helpers live here and each suite pulls them in with `mod support;`.

pub mod cluster_skip;
pub mod embedded_postgres;
pub mod pg_embed;

pub use cluster_skip::handle_cluster_setup_failure;
pub use embedded_postgres::reset_database;
pub use pg_embed::test_cluster;
