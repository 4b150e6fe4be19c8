use thiserror::Error;

use clubledger_accounting::LedgerError;

use crate::store::StoreError;

/// Error surfaced by the ledger services.
///
/// Store conflicts never escape as `Store`: they are retried and, once the
/// retry budget is spent, reported as `ConcurrencyExhausted`.
#[derive(Debug, Error)]
pub enum LedgerServiceError {
    /// Domain validation or lookup failure. Deterministic; never retried.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("{operation} did not commit after {attempts} attempts due to concurrent updates")]
    ConcurrencyExhausted {
        operation: &'static str,
        attempts: u32,
    },

    /// Store failure other than an exhausted conflict. The message shown to
    /// callers hides backend detail; the source keeps it for logs.
    #[error("ledger storage is unavailable")]
    Store(#[source] StoreError),
}

impl LedgerServiceError {
    pub fn kind(&self) -> &'static str {
        match self {
            LedgerServiceError::Ledger(e) => e.kind(),
            LedgerServiceError::ConcurrencyExhausted { .. } => "concurrency_exhausted",
            LedgerServiceError::Store(_) => "storage_unavailable",
        }
    }

    /// True for a raw store conflict still inside a retry loop.
    pub fn is_conflict(&self) -> bool {
        matches!(self, LedgerServiceError::Store(e) if e.is_conflict())
    }
}

impl From<StoreError> for LedgerServiceError {
    fn from(value: StoreError) -> Self {
        LedgerServiceError::Store(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_and_messages_hide_store_internals() {
        let err = LedgerServiceError::from(StoreError::Backend("tcp reset by 10.0.0.3".into()));
        assert_eq!(err.kind(), "storage_unavailable");
        assert_eq!(err.to_string(), "ledger storage is unavailable");

        let err = LedgerServiceError::from(LedgerError::Unbalanced {
            debits: 10_000,
            credits: 9_999,
        });
        assert_eq!(err.kind(), "unbalanced");
        assert!(err.to_string().contains("debits and credits must be equal"));
    }

    #[test]
    fn only_store_conflicts_count_as_conflicts() {
        assert!(LedgerServiceError::from(StoreError::Conflict("x".into())).is_conflict());
        assert!(!LedgerServiceError::from(StoreError::Integrity("x".into())).is_conflict());
        assert!(!LedgerServiceError::ConcurrencyExhausted { operation: "post", attempts: 5 }.is_conflict());
    }
}
