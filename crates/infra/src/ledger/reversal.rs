//! Reversing posted entries.
//!
//! A reversal never edits history: it posts a mirror entry (every debit
//! becomes a credit and vice versa) and flags the original as reversed, both
//! in the same transaction. The flag is the only mutation an entry ever sees.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, instrument};

use clubledger_accounting::{LedgerError, PostedEntry, reversal::build_reversal};
use clubledger_core::{EntryId, UserId};

use crate::ledger::error::LedgerServiceError;
use crate::ledger::poster::write_entry;
use crate::ledger::retry::{RetryPolicy, run_atomic};
use crate::store::{LedgerStore, LedgerTransaction};

#[derive(Debug)]
pub struct ReversalEngine<S> {
    store: Arc<S>,
    policy: RetryPolicy,
}

impl<S> Clone for ReversalEngine<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            policy: self.policy.clone(),
        }
    }
}

impl<S: LedgerStore> ReversalEngine<S> {
    pub fn new(store: Arc<S>, policy: RetryPolicy) -> Self {
        Self { store, policy }
    }

    /// Reverse `entry_id`; returns the id and number of the reversal entry.
    #[instrument(skip(self, reason), fields(entry_id = %entry_id), err)]
    pub async fn reverse(
        &self,
        entry_id: EntryId,
        reversed_by: UserId,
        reason: &str,
    ) -> Result<PostedEntry, LedgerServiceError> {
        let reversal = run_atomic(self.store.as_ref(), &self.policy, "reverse", |tx| {
            let reason = reason.to_string();
            Box::pin(async move { reverse_in(tx, entry_id, reversed_by, &reason).await })
        })
        .await?;

        info!(
            entry_id = %entry_id,
            reversal_entry_id = %reversal.entry_id,
            reversal_entry_number = reversal.entry_number,
            "journal entry reversed"
        );
        Ok(reversal)
    }
}

/// Reverse inside a caller-owned transaction. Nothing is committed.
///
/// The reversal is dated on today's UTC date and created by `reversed_by`.
pub async fn reverse_in(
    tx: &mut dyn LedgerTransaction,
    entry_id: EntryId,
    reversed_by: UserId,
    reason: &str,
) -> Result<PostedEntry, LedgerServiceError> {
    let original = tx
        .get_entry(entry_id)
        .await?
        .ok_or(LedgerError::EntryNotFound(entry_id))?;
    let lines = tx.lines_for_entry(entry_id).await?;

    let now = Utc::now();
    let mirror = build_reversal(&original, &lines, reversed_by, reason, now.date_naive())?;

    let reversal = write_entry(tx, &mirror, Some(entry_id)).await?;
    tx.mark_reversed(entry_id, now, reversed_by).await?;
    Ok(reversal)
}
