//! Read-side projections over the ledger.
//!
//! Projections never write: they fold immutable entries and lines read from
//! one snapshot transaction, so they can be recomputed at any time.

pub mod ledger_query;

pub use ledger_query::{EntryDetail, LedgerQuery};
