//! Cost adjustments: posting the difference when an estimated liability is
//! superseded by the actual cost.
//!
//! The triggering workflow (e.g. recording a purchase against an approved
//! procurement) should call [`reconcile_in`] inside its own transaction so
//! that its document write and the corrective entry commit together.

use std::sync::Arc;

use tracing::{debug, info, instrument};

use clubledger_accounting::{CostAdjustment, PostedEntry};

use crate::ledger::error::LedgerServiceError;
use crate::ledger::poster::write_entry;
use crate::ledger::retry::{RetryPolicy, run_atomic};
use crate::store::{LedgerStore, LedgerTransaction};

#[derive(Debug)]
pub struct CostReconciler<S> {
    store: Arc<S>,
    policy: RetryPolicy,
}

impl<S> Clone for CostReconciler<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            policy: self.policy.clone(),
        }
    }
}

impl<S: LedgerStore> CostReconciler<S> {
    pub fn new(store: Arc<S>, policy: RetryPolicy) -> Self {
        Self { store, policy }
    }

    /// Post the corrective entry on its own. `None` when the delta is immaterial.
    #[instrument(skip(self, adjustment), fields(reference = %adjustment.reference), err)]
    pub async fn reconcile(
        &self,
        adjustment: &CostAdjustment,
    ) -> Result<Option<PostedEntry>, LedgerServiceError> {
        if !adjustment.is_material() {
            debug!(delta = %adjustment.delta(), "cost adjustment below materiality; nothing posted");
            return Ok(None);
        }

        let posted = run_atomic(self.store.as_ref(), &self.policy, "reconcile", |tx| {
            let adjustment = adjustment.clone();
            Box::pin(async move { reconcile_in(tx, &adjustment).await })
        })
        .await?;

        if let Some(entry) = &posted {
            info!(
                entry_id = %entry.entry_id,
                entry_number = entry.entry_number,
                delta = %adjustment.delta(),
                "cost adjustment posted"
            );
        }
        Ok(posted)
    }
}

/// Post the corrective entry inside a caller-owned transaction.
pub async fn reconcile_in(
    tx: &mut dyn LedgerTransaction,
    adjustment: &CostAdjustment,
) -> Result<Option<PostedEntry>, LedgerServiceError> {
    match adjustment.corrective_entry() {
        Some(entry) => Ok(Some(write_entry(tx, &entry, None).await?)),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use clubledger_accounting::{Account, AccountGroup, DateRange};
    use clubledger_core::UserId;

    use crate::store::InMemoryLedgerStore;

    async fn setup() -> Arc<InMemoryLedgerStore> {
        let store = Arc::new(InMemoryLedgerStore::new());
        let mut tx = store.begin().await.unwrap();
        for (code, name, group) in [
            ("2010", "Reimbursements Payable", AccountGroup::CurrentLiability),
            ("5010", "Project Materials", AccountGroup::Expense),
        ] {
            tx.insert_account(&Account::conventional(code, name, group).unwrap())
                .await
                .unwrap();
        }
        tx.commit().await.unwrap();
        store
    }

    fn adjustment(expected: u64, actual: u64) -> CostAdjustment {
        CostAdjustment::against_reimbursements(
            "PR-0042",
            expected,
            actual,
            "5010",
            NaiveDate::from_ymd_opt(2024, 3, 14).unwrap(),
            UserId::new(),
        )
    }

    #[tokio::test]
    async fn overrun_debits_expense_and_credits_liability() {
        let store = setup().await;
        let reconciler = CostReconciler::new(store.clone(), RetryPolicy::default());

        let posted = reconciler.reconcile(&adjustment(1_500, 1_650)).await.unwrap().unwrap();

        let mut tx = store.begin().await.unwrap();
        let lines = tx.lines_for_entry(posted.entry_id).await.unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!((lines[0].account_code(), lines[0].debit()), ("5010", 150));
        assert_eq!((lines[1].account_code(), lines[1].credit()), ("2010", 150));
    }

    #[tokio::test]
    async fn underrun_reverses_the_sides() {
        let store = setup().await;
        let reconciler = CostReconciler::new(store.clone(), RetryPolicy::default());

        let posted = reconciler.reconcile(&adjustment(1_500, 1_200)).await.unwrap().unwrap();

        let mut tx = store.begin().await.unwrap();
        let lines = tx.lines_for_entry(posted.entry_id).await.unwrap();
        assert_eq!((lines[0].account_code(), lines[0].debit()), ("2010", 300));
        assert_eq!((lines[1].account_code(), lines[1].credit()), ("5010", 300));
    }

    #[tokio::test]
    async fn exact_estimate_posts_nothing() {
        let store = setup().await;
        let reconciler = CostReconciler::new(store.clone(), RetryPolicy::default());

        assert!(reconciler.reconcile(&adjustment(1_500, 1_500)).await.unwrap().is_none());

        let mut tx = store.begin().await.unwrap();
        assert!(tx.entries_in_range(&DateRange::all()).await.unwrap().is_empty());
    }
}
