//! Journal entries and lines (double-entry, immutable once posted).

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use clubledger_core::{EntryId, LineId, UserId};

use crate::error::LedgerError;

/// Side of a journal line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Debit,
    Credit,
}

impl Side {
    pub fn opposite(self) -> Self {
        match self {
            Side::Debit => Side::Credit,
            Side::Credit => Side::Debit,
        }
    }
}

/// One line of an entry that has not been posted yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposedLine {
    pub account_code: String,
    pub side: Side,
    /// Positive amount in minor units (e.g. cents).
    pub amount: u64,
}

impl ProposedLine {
    pub fn debit(account_code: impl Into<String>, amount: u64) -> Self {
        Self {
            account_code: account_code.into(),
            side: Side::Debit,
            amount,
        }
    }

    pub fn credit(account_code: impl Into<String>, amount: u64) -> Self {
        Self {
            account_code: account_code.into(),
            side: Side::Credit,
            amount,
        }
    }
}

/// A journal entry as submitted by a caller (manual entry screen, workflows).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposedEntry {
    pub date: NaiveDate,
    pub narration: String,
    pub created_by: UserId,
    pub lines: Vec<ProposedLine>,
}

/// Debit and credit totals of a validated entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryTotals {
    pub debits: u64,
    pub credits: u64,
}

impl ProposedEntry {
    /// Check the structural invariants of a double-entry posting.
    ///
    /// Account existence is not checked here; it needs the registry.
    pub fn validate(&self) -> Result<EntryTotals, LedgerError> {
        if self.lines.len() < 2 {
            return Err(LedgerError::InsufficientLines {
                count: self.lines.len(),
            });
        }

        let mut debits: u64 = 0;
        let mut credits: u64 = 0;

        for (index, line) in self.lines.iter().enumerate() {
            if line.amount == 0 {
                return Err(LedgerError::ZeroAmountLine { index });
            }
            let total = match line.side {
                Side::Debit => &mut debits,
                Side::Credit => &mut credits,
            };
            *total = total
                .checked_add(line.amount)
                .ok_or(LedgerError::AmountOverflow)?;
        }

        if debits != credits {
            return Err(LedgerError::Unbalanced { debits, credits });
        }
        if debits == 0 {
            return Err(LedgerError::EmptyTransaction);
        }

        Ok(EntryTotals { debits, credits })
    }

    /// Distinct account codes referenced by the lines, sorted.
    pub fn account_codes(&self) -> Vec<&str> {
        let mut codes: Vec<&str> = self.lines.iter().map(|l| l.account_code.as_str()).collect();
        codes.sort_unstable();
        codes.dedup();
        codes
    }
}

/// Lifecycle of a posted entry: `Posted` → `Reversed` (terminal).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EntryStatus {
    Posted,
    Reversed {
        reversed_at: DateTime<Utc>,
        reversed_by: UserId,
    },
}

/// A committed journal entry (header row).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub id: EntryId,
    pub entry_number: u64,
    pub date: NaiveDate,
    pub narration: String,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
    pub status: EntryStatus,
    pub reverses_entry_id: Option<EntryId>,
}

impl JournalEntry {
    /// Header for a freshly numbered entry.
    pub fn posted(
        entry_number: u64,
        proposed: &ProposedEntry,
        reverses_entry_id: Option<EntryId>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: EntryId::new(),
            entry_number,
            date: proposed.date,
            narration: proposed.narration.trim().to_string(),
            created_by: proposed.created_by,
            created_at,
            status: EntryStatus::Posted,
            reverses_entry_id,
        }
    }

    pub fn is_reversed(&self) -> bool {
        matches!(self.status, EntryStatus::Reversed { .. })
    }

    /// Flag the entry as reversed. The only transition an entry supports.
    pub fn mark_reversed(
        &mut self,
        reversed_at: DateTime<Utc>,
        reversed_by: UserId,
    ) -> Result<(), LedgerError> {
        if self.is_reversed() {
            return Err(LedgerError::AlreadyReversed {
                entry_number: self.entry_number,
            });
        }
        self.status = EntryStatus::Reversed {
            reversed_at,
            reversed_by,
        };
        Ok(())
    }
}

/// A committed journal line. Exactly one of debit/credit is non-zero.
///
/// Fields are private: a line cannot be changed after it is built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalLine {
    id: LineId,
    entry_id: EntryId,
    line_no: u32,
    account_code: String,
    debit: u64,
    credit: u64,
}

impl JournalLine {
    pub fn new(entry_id: EntryId, line_no: u32, proposed: &ProposedLine) -> Self {
        let (debit, credit) = match proposed.side {
            Side::Debit => (proposed.amount, 0),
            Side::Credit => (0, proposed.amount),
        };
        Self {
            id: LineId::new(),
            entry_id,
            line_no,
            account_code: proposed.account_code.clone(),
            debit,
            credit,
        }
    }

    /// Rebuild a line read back from storage, re-checking the one-sided rule.
    pub fn from_stored(
        id: LineId,
        entry_id: EntryId,
        line_no: u32,
        account_code: String,
        debit: u64,
        credit: u64,
    ) -> Result<Self, LedgerError> {
        if (debit == 0) == (credit == 0) {
            return Err(LedgerError::CorruptLine(format!(
                "line {id} must have exactly one non-zero side (debit {debit}, credit {credit})"
            )));
        }
        Ok(Self {
            id,
            entry_id,
            line_no,
            account_code,
            debit,
            credit,
        })
    }

    pub fn id(&self) -> LineId {
        self.id
    }

    pub fn entry_id(&self) -> EntryId {
        self.entry_id
    }

    pub fn line_no(&self) -> u32 {
        self.line_no
    }

    pub fn account_code(&self) -> &str {
        &self.account_code
    }

    pub fn debit(&self) -> u64 {
        self.debit
    }

    pub fn credit(&self) -> u64 {
        self.credit
    }

    pub fn side(&self) -> Side {
        if self.debit > 0 { Side::Debit } else { Side::Credit }
    }

    pub fn amount(&self) -> u64 {
        self.debit.max(self.credit)
    }
}

/// Result of a successful posting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostedEntry {
    pub entry_id: EntryId,
    pub entry_number: u64,
}
