//! Mirror-image entries that cancel a posted entry.

use chrono::NaiveDate;

use clubledger_core::UserId;

use crate::error::LedgerError;
use crate::journal::{JournalEntry, JournalLine, ProposedEntry, ProposedLine};

/// Narration recorded on a reversal entry.
pub fn reversal_narration(original_entry_number: u64, reason: &str) -> String {
    format!(
        "Reversal of Entry #{original_entry_number}. Reason: {}",
        reason.trim()
    )
}

/// Swap the debit and credit side of every line.
///
/// Posting the result next to the original nets every touched account to zero.
pub fn mirror_lines(lines: &[JournalLine]) -> Vec<ProposedLine> {
    let mut ordered: Vec<&JournalLine> = lines.iter().collect();
    ordered.sort_by_key(|l| l.line_no());

    ordered
        .into_iter()
        .map(|line| ProposedLine {
            account_code: line.account_code().to_string(),
            side: line.side().opposite(),
            amount: line.amount(),
        })
        .collect()
}

/// Build the entry that reverses `original`.
///
/// Fails with `AlreadyReversed` if the original is flagged and with
/// `InvalidReason` if no reason was given.
pub fn build_reversal(
    original: &JournalEntry,
    lines: &[JournalLine],
    reversed_by: UserId,
    reason: &str,
    date: NaiveDate,
) -> Result<ProposedEntry, LedgerError> {
    if original.is_reversed() {
        return Err(LedgerError::AlreadyReversed {
            entry_number: original.entry_number,
        });
    }
    if reason.trim().is_empty() {
        return Err(LedgerError::InvalidReason);
    }

    Ok(ProposedEntry {
        date,
        narration: reversal_narration(original.entry_number, reason),
        created_by: reversed_by,
        lines: mirror_lines(lines),
    })
}
