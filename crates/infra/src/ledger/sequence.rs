//! Gapless entry numbering.
//!
//! The counter row is the single serialization point of the ledger: every
//! posting reads it and writes it back inside the posting's own transaction,
//! so two concurrent postings always conflict on it and one of them retries.

use crate::ledger::error::LedgerServiceError;
use crate::store::{LedgerTransaction, StoreError};

/// Counter row that numbers journal entries.
pub const ENTRY_SEQUENCE: &str = "transactions";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequenceCounter {
    name: &'static str,
}

impl SequenceCounter {
    pub const fn named(name: &'static str) -> Self {
        Self { name }
    }

    pub const fn entries() -> Self {
        Self::named(ENTRY_SEQUENCE)
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Number the next entry would get. Nothing is written.
    pub async fn reserve(&self, tx: &mut dyn LedgerTransaction) -> Result<u64, LedgerServiceError> {
        let current = tx.read_counter(self.name).await?;
        current
            .checked_add(1)
            .ok_or_else(|| StoreError::Integrity(format!("sequence {} is exhausted", self.name)).into())
    }

    /// Record `number` as the last one handed out.
    pub async fn advance(
        &self,
        tx: &mut dyn LedgerTransaction,
        number: u64,
    ) -> Result<(), LedgerServiceError> {
        tx.write_counter(self.name, number).await?;
        Ok(())
    }

    /// `reserve` then `advance` in one step.
    pub async fn next(&self, tx: &mut dyn LedgerTransaction) -> Result<u64, LedgerServiceError> {
        let number = self.reserve(tx).await?;
        self.advance(tx, number).await?;
        Ok(number)
    }
}

impl Default for SequenceCounter {
    fn default() -> Self {
        Self::entries()
    }
}
