//! Read side of the ledger: balances, running ledgers, trial balance.
//!
//! Nothing here is materialized. Each query reads entries and lines in one
//! read-only snapshot transaction and folds them with the pure functions in
//! `clubledger_accounting::balance`. An entry and its reversal both count;
//! neither is hidden.

use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use clubledger_accounting::{
    Account, DateRange, JournalEntry, JournalLine, LedgerError, RunningLedgerRow, TrialBalance,
    balance,
};
use clubledger_core::EntryId;

use crate::ledger::LedgerServiceError;
use crate::ledger::retry::read_only;
use crate::store::{LedgerStore, LedgerTransaction};

/// One entry with its lines, for ledger review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryDetail {
    pub entry: JournalEntry,
    pub lines: Vec<JournalLine>,
}

#[derive(Debug)]
pub struct LedgerQuery<S> {
    store: Arc<S>,
}

impl<S> Clone for LedgerQuery<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: LedgerStore> LedgerQuery<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Signed balance of `code` over every line dated on or before `as_of`.
    pub async fn account_balance(
        &self,
        code: &str,
        as_of: Option<NaiveDate>,
    ) -> Result<i128, LedgerServiceError> {
        let code = code.to_string();
        read_only(self.store.as_ref(), "account_balance", |tx| {
            Box::pin(async move { balance_in(tx, &code, as_of).await })
        })
        .await
    }

    /// Entries touching `code` within `range`, in entry-number order, with
    /// the balance carried forward from the day before the range starts.
    pub async fn running_ledger(
        &self,
        code: &str,
        range: DateRange,
    ) -> Result<Vec<RunningLedgerRow>, LedgerServiceError> {
        let code = code.to_string();
        read_only(self.store.as_ref(), "running_ledger", |tx| {
            Box::pin(async move { running_ledger_in(tx, &code, range).await })
        })
        .await
    }

    pub async fn trial_balance(
        &self,
        as_of: Option<NaiveDate>,
    ) -> Result<TrialBalance, LedgerServiceError> {
        read_only(self.store.as_ref(), "trial_balance", |tx| {
            Box::pin(async move { trial_balance_in(tx, as_of).await })
        })
        .await
    }

    pub async fn entry(&self, id: EntryId) -> Result<EntryDetail, LedgerServiceError> {
        read_only(self.store.as_ref(), "entry", |tx| {
            Box::pin(async move { entry_in(tx, id).await })
        })
        .await
    }
}

async fn account_in(tx: &mut dyn LedgerTransaction, code: &str) -> Result<Account, LedgerServiceError> {
    tx.get_account(code)
        .await?
        .ok_or_else(|| LedgerError::AccountNotFound(code.to_string()).into())
}

pub async fn balance_in(
    tx: &mut dyn LedgerTransaction,
    code: &str,
    as_of: Option<NaiveDate>,
) -> Result<i128, LedgerServiceError> {
    let account = account_in(tx, code).await?;
    let lines = tx.lines_in_range(&DateRange::up_to(as_of), Some(code)).await?;
    Ok(balance::account_balance(&account, &lines)?)
}

pub async fn running_ledger_in(
    tx: &mut dyn LedgerTransaction,
    code: &str,
    range: DateRange,
) -> Result<Vec<RunningLedgerRow>, LedgerServiceError> {
    // fields are public; re-check ordering
    let range = DateRange::between(range.from, range.to)?;
    let account = account_in(tx, code).await?;

    let opening = match range.preceding() {
        Some(before) => {
            let lines = tx.lines_in_range(&before, Some(code)).await?;
            balance::account_balance(&account, &lines)?
        }
        None => 0,
    };

    let entries = tx.entries_in_range(&range).await?;
    let lines = tx.lines_in_range(&range, Some(code)).await?;
    Ok(balance::running_ledger(&account, opening, &entries, &lines)?)
}

pub async fn trial_balance_in(
    tx: &mut dyn LedgerTransaction,
    as_of: Option<NaiveDate>,
) -> Result<TrialBalance, LedgerServiceError> {
    let accounts = tx.list_accounts().await?;
    let lines = tx.lines_in_range(&DateRange::up_to(as_of), None).await?;
    Ok(TrialBalance::build(as_of, &accounts, &lines)?)
}

pub async fn entry_in(
    tx: &mut dyn LedgerTransaction,
    id: EntryId,
) -> Result<EntryDetail, LedgerServiceError> {
    let entry = tx.get_entry(id).await?.ok_or(LedgerError::EntryNotFound(id))?;
    let lines = tx.lines_for_entry(id).await?;
    Ok(EntryDetail { entry, lines })
}

#[cfg(test)]
mod tests {
    use super::*;
    use clubledger_accounting::{AccountGroup, ProposedEntry, ProposedLine};
    use clubledger_core::UserId;

    use crate::ledger::{Ledger, RetryPolicy};
    use crate::store::InMemoryLedgerStore;

    fn d(month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, month, day).unwrap()
    }

    async fn ledger() -> Ledger<InMemoryLedgerStore> {
        let ledger = Ledger::with_policy(InMemoryLedgerStore::new(), RetryPolicy::default());
        ledger.accounts().seed_default_chart().await.unwrap();
        ledger
    }

    async fn post(ledger: &Ledger<InMemoryLedgerStore>, date: NaiveDate, lines: Vec<ProposedLine>) -> EntryId {
        ledger
            .post(&ProposedEntry {
                date,
                narration: "test".into(),
                created_by: UserId::new(),
                lines,
            })
            .await
            .unwrap()
            .entry_id
    }

    #[tokio::test]
    async fn balance_honours_cutoff_and_normal_side() {
        let ledger = ledger().await;
        post(&ledger, d(1, 10), vec![ProposedLine::debit("1010", 5_000), ProposedLine::credit("4010", 5_000)]).await;
        post(&ledger, d(2, 10), vec![ProposedLine::debit("5030", 1_200), ProposedLine::credit("1010", 1_200)]).await;

        let query = ledger.query();
        assert_eq!(query.account_balance("1010", None).await.unwrap(), 3_800);
        assert_eq!(query.account_balance("1010", Some(d(1, 31))).await.unwrap(), 5_000);
        assert_eq!(query.account_balance("4010", None).await.unwrap(), 5_000);
        assert_eq!(query.account_balance("1020", None).await.unwrap(), 0);

        let err = query.account_balance("0000", None).await.unwrap_err();
        assert_eq!(err.kind(), "not_found");
    }

    #[tokio::test]
    async fn running_ledger_carries_opening_balance() {
        let ledger = ledger().await;
        post(&ledger, d(1, 5), vec![ProposedLine::debit("1010", 1_000), ProposedLine::credit("4010", 1_000)]).await;
        post(&ledger, d(2, 5), vec![ProposedLine::debit("1010", 300), ProposedLine::credit("4030", 300)]).await;
        post(&ledger, d(2, 6), vec![ProposedLine::debit("5010", 50), ProposedLine::credit("2010", 50)]).await;
        post(&ledger, d(2, 7), vec![ProposedLine::debit("5040", 20), ProposedLine::credit("1010", 20)]).await;

        let range = DateRange::between(Some(d(2, 1)), Some(d(2, 28))).unwrap();
        let rows = ledger.query().running_ledger("1010", range).await.unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!((rows[0].entry.entry_number, rows[0].debit, rows[0].running_balance), (2, 300, 1_300));
        assert_eq!((rows[1].entry.entry_number, rows[1].credit, rows[1].running_balance), (4, 20, 1_280));
    }

    #[tokio::test]
    async fn inverted_range_is_rejected() {
        let ledger = ledger().await;
        let range = DateRange {
            from: Some(d(3, 1)),
            to: Some(d(2, 1)),
        };
        let err = ledger.query().running_ledger("1010", range).await.unwrap_err();
        assert_eq!(err.kind(), "invalid_date_range");
    }

    #[tokio::test]
    async fn trial_balance_and_entry_detail() {
        let ledger = ledger().await;
        let id = post(&ledger, d(4, 1), vec![ProposedLine::debit("1510", 90_000), ProposedLine::credit("3010", 90_000)]).await;

        let tb = ledger.query().trial_balance(None).await.unwrap();
        assert!(tb.is_balanced());
        assert_eq!(tb.rows.len(), 12);
        assert_eq!(tb.total_debits, 90_000);

        let detail = ledger.query().entry(id).await.unwrap();
        assert_eq!(detail.entry.entry_number, 1);
        assert_eq!(detail.lines.len(), 2);

        let err = ledger.query().entry(EntryId::new()).await.unwrap_err();
        assert_eq!(err.kind(), "not_found");

        let equipment = ledger.accounts().get("1510").await.unwrap();
        assert_eq!(equipment.group, AccountGroup::FixedAsset);
    }
}
