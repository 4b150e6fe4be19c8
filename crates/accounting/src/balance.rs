//! Balance folding over immutable ledger history.
//!
//! Pure functions: the infra query layer reads entries and lines in a
//! snapshot and hands them here. Reversed entries are never skipped; an entry
//! and its reversal both count and cancel arithmetically.

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use clubledger_core::EntryId;

use crate::account::Account;
use crate::error::LedgerError;
use crate::journal::{JournalEntry, JournalLine};

/// Inclusive date range; `None` leaves that end open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl DateRange {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn up_to(to: Option<NaiveDate>) -> Self {
        Self { from: None, to }
    }

    pub fn between(from: Option<NaiveDate>, to: Option<NaiveDate>) -> Result<Self, LedgerError> {
        if let (Some(f), Some(t)) = (from, to) {
            if f > t {
                return Err(LedgerError::InvalidDateRange);
            }
        }
        Ok(Self { from, to })
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.from.is_none_or(|f| date >= f) && self.to.is_none_or(|t| date <= t)
    }

    /// Everything strictly before this range starts (`None` if open-ended).
    pub fn preceding(&self) -> Option<DateRange> {
        let from = self.from?;
        Some(DateRange {
            from: None,
            to: Some(from.pred_opt()?),
        })
    }
}

/// Debit and credit turnover of one account.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountTotals {
    pub debits: u64,
    pub credits: u64,
}

impl AccountTotals {
    pub fn add_line(&mut self, line: &JournalLine) -> Result<(), LedgerError> {
        self.debits = self
            .debits
            .checked_add(line.debit())
            .ok_or(LedgerError::AmountOverflow)?;
        self.credits = self
            .credits
            .checked_add(line.credit())
            .ok_or(LedgerError::AmountOverflow)?;
        Ok(())
    }

    pub fn fold<'a>(lines: impl IntoIterator<Item = &'a JournalLine>) -> Result<Self, LedgerError> {
        let mut totals = Self::default();
        for line in lines {
            totals.add_line(line)?;
        }
        Ok(totals)
    }
}

/// Signed balance of `account` over `lines` (lines for other accounts are ignored).
pub fn account_balance<'a>(
    account: &Account,
    lines: impl IntoIterator<Item = &'a JournalLine>,
) -> Result<i128, LedgerError> {
    let totals = AccountTotals::fold(
        lines
            .into_iter()
            .filter(|l| l.account_code() == account.code),
    )?;
    Ok(account.normal_balance.signed(totals.debits, totals.credits))
}

/// One row of an account's running ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunningLedgerRow {
    pub entry: JournalEntry,
    /// Movement on the account within this entry.
    pub debit: u64,
    pub credit: u64,
    /// Account balance after this entry.
    pub running_balance: i128,
}

/// Replay `entries` in ascending entry number, carrying the balance of `account`
/// forward from `opening_balance`. Entries that do not touch the account are omitted.
pub fn running_ledger(
    account: &Account,
    opening_balance: i128,
    entries: &[JournalEntry],
    lines: &[JournalLine],
) -> Result<Vec<RunningLedgerRow>, LedgerError> {
    let mut by_entry: HashMap<EntryId, AccountTotals> = HashMap::new();
    for line in lines.iter().filter(|l| l.account_code() == account.code) {
        by_entry.entry(line.entry_id()).or_default().add_line(line)?;
    }

    let mut ordered: Vec<&JournalEntry> = entries
        .iter()
        .filter(|e| by_entry.contains_key(&e.id))
        .collect();
    ordered.sort_by_key(|e| e.entry_number);

    let mut balance = opening_balance;
    let mut rows = Vec::with_capacity(ordered.len());
    for entry in ordered {
        let movement = by_entry[&entry.id];
        balance += account.normal_balance.signed(movement.debits, movement.credits);
        rows.push(RunningLedgerRow {
            entry: entry.clone(),
            debit: movement.debits,
            credit: movement.credits,
            running_balance: balance,
        });
    }

    Ok(rows)
}

/// Per-account line of a trial balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrialBalanceRow {
    pub account: Account,
    pub debits: u64,
    pub credits: u64,
    pub balance: i128,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrialBalance {
    pub as_of: Option<NaiveDate>,
    pub rows: Vec<TrialBalanceRow>,
    pub total_debits: u64,
    pub total_credits: u64,
}

impl TrialBalance {
    /// Build from the full chart and every line up to the cutoff.
    ///
    /// Rows are ordered by account code; accounts without activity show zero.
    pub fn build(
        as_of: Option<NaiveDate>,
        accounts: &[Account],
        lines: &[JournalLine],
    ) -> Result<Self, LedgerError> {
        let mut per_account: BTreeMap<&str, AccountTotals> = BTreeMap::new();
        for line in lines {
            per_account
                .entry(line.account_code())
                .or_default()
                .add_line(line)?;
        }

        let mut sorted: Vec<&Account> = accounts.iter().collect();
        sorted.sort_by(|a, b| a.code.cmp(&b.code));

        let mut grand = AccountTotals::default();
        let mut rows = Vec::with_capacity(sorted.len());
        for account in sorted {
            let totals = per_account.get(account.code.as_str()).copied().unwrap_or_default();
            grand.debits = grand
                .debits
                .checked_add(totals.debits)
                .ok_or(LedgerError::AmountOverflow)?;
            grand.credits = grand
                .credits
                .checked_add(totals.credits)
                .ok_or(LedgerError::AmountOverflow)?;
            rows.push(TrialBalanceRow {
                account: account.clone(),
                debits: totals.debits,
                credits: totals.credits,
                balance: account.normal_balance.signed(totals.debits, totals.credits),
            });
        }

        Ok(Self {
            as_of,
            rows,
            total_debits: grand.debits,
            total_credits: grand.credits,
        })
    }

    pub fn is_balanced(&self) -> bool {
        self.total_debits == self.total_credits
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::AccountGroup;
    use crate::journal::{ProposedEntry, ProposedLine};
    use chrono::Utc;
    use clubledger_core::UserId;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    fn cash() -> Account {
        Account::conventional("1010", "Cash at Bank", AccountGroup::CurrentAsset).unwrap()
    }

    fn dues() -> Account {
        Account::conventional("4010", "Membership Dues", AccountGroup::Revenue).unwrap()
    }

    fn post(number: u64, day: u32, lines: Vec<ProposedLine>) -> (JournalEntry, Vec<JournalLine>) {
        let proposed = ProposedEntry {
            date: d(day),
            narration: format!("entry {number}"),
            created_by: UserId::new(),
            lines,
        };
        let entry = JournalEntry::posted(number, &proposed, None, Utc::now());
        let lines = proposed
            .lines
            .iter()
            .enumerate()
            .map(|(i, l)| JournalLine::new(entry.id, i as u32 + 1, l))
            .collect();
        (entry, lines)
    }

    #[test]
    fn date_range_bounds_are_inclusive() {
        let r = DateRange::between(Some(d(5)), Some(d(10))).unwrap();
        assert!(r.contains(d(5)));
        assert!(r.contains(d(10)));
        assert!(!r.contains(d(4)));
        assert!(!r.contains(d(11)));
        assert_eq!(r.preceding(), Some(DateRange::up_to(Some(d(4)))));
        assert!(DateRange::all().preceding().is_none());
    }

    #[test]
    fn inverted_range_is_rejected() {
        assert_eq!(
            DateRange::between(Some(d(10)), Some(d(5))).unwrap_err(),
            LedgerError::InvalidDateRange
        );
    }

    #[test]
    fn balance_respects_normal_side() {
        let (_, lines) = post(
            1,
            1,
            vec![ProposedLine::debit("1010", 2_500), ProposedLine::credit("4010", 2_500)],
        );
        assert_eq!(account_balance(&cash(), &lines).unwrap(), 2_500);
        assert_eq!(account_balance(&dues(), &lines).unwrap(), 2_500);
    }

    #[test]
    fn running_ledger_orders_by_entry_number_and_skips_untouched_entries() {
        let (e1, l1) = post(1, 3, vec![ProposedLine::debit("1010", 1_000), ProposedLine::credit("4010", 1_000)]);
        let (e2, l2) = post(2, 2, vec![ProposedLine::debit("5010", 300), ProposedLine::credit("2010", 300)]);
        let (e3, l3) = post(3, 4, vec![ProposedLine::debit("5020", 400), ProposedLine::credit("1010", 400)]);

        let entries = vec![e3.clone(), e1.clone(), e2];
        let lines: Vec<JournalLine> = l1.into_iter().chain(l2).chain(l3).collect();

        let rows = running_ledger(&cash(), 50, &entries, &lines).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].entry.id, e1.id);
        assert_eq!(rows[0].running_balance, 1_050);
        assert_eq!(rows[1].entry.id, e3.id);
        assert_eq!(rows[1].credit, 400);
        assert_eq!(rows[1].running_balance, 650);
    }

    #[test]
    fn trial_balance_totals_match_and_include_idle_accounts() {
        let (_, lines) = post(
            1,
            1,
            vec![ProposedLine::debit("1010", 700), ProposedLine::credit("4010", 700)],
        );
        let travel = Account::conventional("5030", "Travel", AccountGroup::Expense).unwrap();
        let tb = TrialBalance::build(None, &[dues(), travel, cash()], &lines).unwrap();

        assert!(tb.is_balanced());
        assert_eq!(tb.total_debits, 700);
        let codes: Vec<_> = tb.rows.iter().map(|r| r.account.code.as_str()).collect();
        assert_eq!(codes, vec!["1010", "4010", "5030"]);
        assert_eq!(tb.rows[2].balance, 0);
    }
}
