//! Ledger domain errors.
//!
//! Every variant is a deterministic business failure, detected before any
//! write. Storage and concurrency failures live in the infra layer.

use thiserror::Error;

use clubledger_core::EntryId;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("a journal entry needs at least two lines (got {count})")]
    InsufficientLines { count: usize },

    #[error("line {index} has a zero amount; every line must be greater than zero")]
    ZeroAmountLine { index: usize },

    #[error("debits and credits must be equal (debits {debits}, credits {credits})")]
    Unbalanced { debits: u64, credits: u64 },

    /// Kept for taxonomy completeness: zero-amount lines and the two-line
    /// minimum are checked first, so a balanced entry never totals zero.
    #[error("a journal entry must move a non-zero amount")]
    EmptyTransaction,

    #[error("account '{0}' is not in the chart of accounts")]
    UnknownAccount(String),

    #[error("account '{0}' was not found")]
    AccountNotFound(String),

    #[error("journal entry {0} was not found")]
    EntryNotFound(EntryId),

    #[error("entry #{entry_number} has already been reversed")]
    AlreadyReversed { entry_number: u64 },

    #[error("account code '{0}' already exists")]
    DuplicateAccount(String),

    #[error("invalid account: {0}")]
    InvalidAccount(String),

    #[error("a reversal needs a reason")]
    InvalidReason,

    #[error("date range starts after it ends")]
    InvalidDateRange,

    #[error("amounts overflow the supported range")]
    AmountOverflow,

    #[error("stored journal line is corrupt: {0}")]
    CorruptLine(String),
}

impl LedgerError {
    /// Stable snake_case error kind for calling UIs.
    pub fn kind(&self) -> &'static str {
        match self {
            LedgerError::InsufficientLines { .. } => "insufficient_lines",
            LedgerError::ZeroAmountLine { .. } => "zero_amount_line",
            LedgerError::Unbalanced { .. } => "unbalanced",
            LedgerError::EmptyTransaction => "empty_transaction",
            LedgerError::UnknownAccount(_) => "unknown_account",
            LedgerError::AccountNotFound(_) | LedgerError::EntryNotFound(_) => "not_found",
            LedgerError::AlreadyReversed { .. } => "already_reversed",
            LedgerError::DuplicateAccount(_) => "duplicate_account",
            LedgerError::InvalidAccount(_) => "invalid_account",
            LedgerError::InvalidReason => "invalid_reason",
            LedgerError::InvalidDateRange => "invalid_date_range",
            LedgerError::AmountOverflow => "amount_overflow",
            LedgerError::CorruptLine(_) => "corrupt_line",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_variants_share_a_kind() {
        assert_eq!(LedgerError::AccountNotFound("1010".into()).kind(), "not_found");
        assert_eq!(LedgerError::EntryNotFound(EntryId::new()).kind(), "not_found");
    }

    #[test]
    fn unbalanced_message_is_human_readable() {
        let msg = LedgerError::Unbalanced { debits: 10_000, credits: 9_999 }.to_string();
        assert!(msg.starts_with("debits and credits must be equal"));
    }
}
