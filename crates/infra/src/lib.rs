//! Infrastructure layer: ledger stores, transactional services, queries, config.

pub mod config;
pub mod ledger;
pub mod projections;
pub mod store;


pub use config::{ConfigError, LedgerConfig};
pub use ledger::{Ledger, LedgerServiceError, RetryPolicy};
pub use store::{InMemoryLedgerStore, LedgerStore, LedgerTransaction, PostgresLedgerStore, StoreError};
