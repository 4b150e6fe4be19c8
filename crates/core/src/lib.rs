//! Shared building blocks for the ledger engine.
//!
//! Pure primitives only (no IO): identifiers, optimistic-version checks,
//! minor-unit money conversion.

pub mod error;
pub mod id;
pub mod money;
pub mod version;

pub use error::{DomainError, DomainResult};
pub use id::{EntryId, LineId, UserId};
pub use version::{ExpectedVersion, Versioned};
