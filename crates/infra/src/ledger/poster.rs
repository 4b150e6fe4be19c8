//! Posting balanced journal entries.
//!
//! ```text
//! ProposedEntry
//!   ↓
//! 1. Validate shape and balance (no store access)
//!   ↓
//! 2. Resolve every account code
//!   ↓
//! 3. Reserve the next entry number
//!   ↓
//! 4. Write the entry header, then its lines
//!   ↓
//! 5. Advance the counter
//! ```
//!
//! Steps 2-5 run inside one store transaction; a conflict at commit restarts
//! from step 1 with fresh reads.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, instrument};

use clubledger_accounting::{JournalEntry, JournalLine, LedgerError, PostedEntry, ProposedEntry};
use clubledger_core::EntryId;

use crate::ledger::error::LedgerServiceError;
use crate::ledger::retry::{RetryPolicy, run_atomic};
use crate::ledger::sequence::SequenceCounter;
use crate::store::{LedgerStore, LedgerTransaction};

/// Standalone posting entry point: one entry, one atomic operation.
#[derive(Debug)]
pub struct LedgerPoster<S> {
    store: Arc<S>,
    policy: RetryPolicy,
}

impl<S> Clone for LedgerPoster<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            policy: self.policy.clone(),
        }
    }
}

impl<S: LedgerStore> LedgerPoster<S> {
    pub fn new(store: Arc<S>, policy: RetryPolicy) -> Self {
        Self { store, policy }
    }

    /// Validate and commit `entry`, retrying on conflict.
    #[instrument(skip(self, entry), fields(lines = entry.lines.len()), err)]
    pub async fn post(&self, entry: &ProposedEntry) -> Result<PostedEntry, LedgerServiceError> {
        // shape errors need no transaction
        entry.validate()?;

        let posted = run_atomic(self.store.as_ref(), &self.policy, "post", |tx| {
            let entry = entry.clone();
            Box::pin(async move { post_in(tx, &entry).await })
        })
        .await?;

        info!(
            entry_id = %posted.entry_id,
            entry_number = posted.entry_number,
            lines = entry.lines.len(),
            "journal entry posted"
        );
        Ok(posted)
    }
}

/// Post `entry` inside a caller-owned transaction. Nothing is committed.
pub async fn post_in(
    tx: &mut dyn LedgerTransaction,
    entry: &ProposedEntry,
) -> Result<PostedEntry, LedgerServiceError> {
    write_entry(tx, entry, None).await
}

/// Shared commit sequence for ordinary postings and reversals.
pub(crate) async fn write_entry(
    tx: &mut dyn LedgerTransaction,
    proposed: &ProposedEntry,
    reverses: Option<EntryId>,
) -> Result<PostedEntry, LedgerServiceError> {
    proposed.validate()?;

    for code in proposed.account_codes() {
        if tx.get_account(code).await?.is_none() {
            return Err(LedgerError::UnknownAccount(code.to_string()).into());
        }
    }

    let counter = SequenceCounter::entries();
    let entry_number = counter.reserve(tx).await?;

    let entry = JournalEntry::posted(entry_number, proposed, reverses, Utc::now());
    let lines: Vec<JournalLine> = (1u32..)
        .zip(&proposed.lines)
        .map(|(line_no, line)| JournalLine::new(entry.id, line_no, line))
        .collect();

    tx.insert_entry(&entry).await?;
    tx.insert_lines(&lines).await?;
    counter.advance(tx, entry_number).await?;

    debug!(entry_id = %entry.id, entry_number, "journal entry staged");
    Ok(PostedEntry {
        entry_id: entry.id,
        entry_number,
    })
}
