use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use thiserror::Error;

use clubledger_accounting::{Account, DateRange, JournalEntry, JournalLine};
use clubledger_core::{EntryId, UserId};

/// Ledger store operation error.
///
/// These are **infrastructure errors** as opposed to ledger domain errors
/// (validation, invariants).
///
/// ## Error Categories
///
/// - **Conflict**: optimistic concurrency failure; the whole attempt may be retried
/// - **Integrity**: stored data violates a ledger rule (corrupt row, out-of-range value)
/// - **Backend**: connection, IO or driver failure
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("transaction conflict: {0}")]
    Conflict(String),

    #[error("integrity violation: {0}")]
    Integrity(String),

    #[error("store backend failure: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict(_))
    }
}

/// Atomic unit of work against the ledger store.
///
/// A transaction buffers (or locks, depending on the backend) every read and
/// write between `begin` and `commit`. Either all writes become visible at
/// `commit` or none do. `commit` fails with `StoreError::Conflict` when a row
/// this transaction read was changed by another committed transaction; the
/// caller then starts a fresh attempt.
///
/// Reads observe one consistent snapshot of committed state for the whole
/// transaction, plus this transaction's own pending writes. Range reads count
/// as reads of the whole journal: a concurrent posting conflicts with them.
///
/// ## Rows
///
/// - accounts (chart of accounts, keyed by code)
/// - journal entries (header rows; only the reversal status ever changes)
/// - journal lines (append-only)
/// - sequence counters (named singleton rows)
/// - collaborator documents (opaque JSON keyed by collection + id)
#[async_trait]
pub trait LedgerTransaction: Send {
    async fn get_account(&mut self, code: &str) -> Result<Option<Account>, StoreError>;

    /// All accounts ordered by code.
    async fn list_accounts(&mut self) -> Result<Vec<Account>, StoreError>;

    /// Insert a new account. Fails with `Conflict` at commit if the code exists.
    async fn insert_account(&mut self, account: &Account) -> Result<(), StoreError>;

    /// Last value of a named counter (0 if the row does not exist yet).
    async fn read_counter(&mut self, name: &str) -> Result<u64, StoreError>;

    async fn write_counter(&mut self, name: &str, value: u64) -> Result<(), StoreError>;

    async fn get_entry(&mut self, id: EntryId) -> Result<Option<JournalEntry>, StoreError>;

    async fn insert_entry(&mut self, entry: &JournalEntry) -> Result<(), StoreError>;

    async fn insert_lines(&mut self, lines: &[JournalLine]) -> Result<(), StoreError>;

    /// Set the reversal status of an entry. Fails with `Conflict` if the entry
    /// was reversed by someone else since this transaction read it.
    async fn mark_reversed(
        &mut self,
        id: EntryId,
        reversed_at: chrono::DateTime<chrono::Utc>,
        reversed_by: UserId,
    ) -> Result<(), StoreError>;

    /// Lines of one entry ordered by line number.
    async fn lines_for_entry(&mut self, id: EntryId) -> Result<Vec<JournalLine>, StoreError>;

    /// Entries dated within `range`, ordered by entry number.
    async fn entries_in_range(&mut self, range: &DateRange) -> Result<Vec<JournalEntry>, StoreError>;

    /// Lines whose entry is dated within `range`, optionally for one account.
    async fn lines_in_range(
        &mut self,
        range: &DateRange,
        account_code: Option<&str>,
    ) -> Result<Vec<JournalLine>, StoreError>;

    async fn get_document(
        &mut self,
        collection: &str,
        id: &str,
    ) -> Result<Option<JsonValue>, StoreError>;

    async fn put_document(
        &mut self,
        collection: &str,
        id: &str,
        body: JsonValue,
    ) -> Result<(), StoreError>;

    /// Make all writes visible atomically.
    async fn commit(self: Box<Self>) -> Result<(), StoreError>;

    /// Discard all writes.
    async fn rollback(self: Box<Self>) -> Result<(), StoreError>;
}

/// Factory for ledger transactions (the shared backing store).
///
/// ## Implementation Requirements
///
/// Implementations must:
/// - make every transaction all-or-nothing
/// - detect lost updates on rows read inside a transaction and report them as
///   `StoreError::Conflict` (optimistic concurrency)
/// - never expose partially committed state to readers
#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn LedgerTransaction>, StoreError>;
}

#[async_trait]
impl<S> LedgerStore for Arc<S>
where
    S: LedgerStore + ?Sized,
{
    async fn begin(&self) -> Result<Box<dyn LedgerTransaction>, StoreError> {
        (**self).begin().await
    }
}
