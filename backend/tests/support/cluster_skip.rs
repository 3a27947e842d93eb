//! Policy for suites that need the embedded PostgreSQL cluster.
//!
//! The cluster downloads binaries on first use, which is not possible in
//! every environment. Suites skip with a `SKIP-TEST-CLUSTER` marker unless
//! `REQUIRE_TEST_CLUSTER` is truthy, in which case setup failures panic so CI
//! breakage is not masked.

/// Returns true when `REQUIRE_TEST_CLUSTER` is "1", "true" or "yes"
/// (case-insensitive).
pub fn cluster_required() -> bool {
    std::env::var("REQUIRE_TEST_CLUSTER")
        .map(|value| matches!(value.to_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false)
}

/// Handles embedded cluster setup failures consistently across suites.
pub fn handle_cluster_setup_failure<T>(reason: impl std::fmt::Display) -> Option<T> {
    if cluster_required() {
        panic!("Test cluster setup failed: {reason}. Unset REQUIRE_TEST_CLUSTER to skip.");
    }
    eprintln!("SKIP-TEST-CLUSTER: {reason}");
    None
}
