//! Tracing and logging setup shared by the ledger binaries and tests.

/// Initialize process-wide structured logging (JSON, `RUST_LOG`, default `info`).
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    tracing::init();
}

/// Tracing configuration (filters, output format).
pub mod tracing;

pub use tracing::{LogFormat, TracingConfig, init_with};
