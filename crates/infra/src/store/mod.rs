//! Transactional ledger store boundary.
//!
//! This module defines the atomic-transaction abstraction the ledger services
//! run on, without making storage assumptions. The in-memory store serves
//! tests and development; the Postgres store is the durable backend.

pub mod in_memory;
pub mod postgres;
pub mod r#trait;

pub use in_memory::InMemoryLedgerStore;
pub use postgres::PostgresLedgerStore;
pub use r#trait::{LedgerStore, LedgerTransaction, StoreError};
