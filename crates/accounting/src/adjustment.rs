//! Expected-vs-actual cost reconciliation.
//!
//! When a procurement is approved its expected cost is booked against
//! Reimbursements Payable. Once the actual purchase cost is known the
//! difference is posted so the liability always equals what the club owes.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use clubledger_core::UserId;

use crate::chart::REIMBURSEMENTS_PAYABLE;
use crate::journal::{ProposedEntry, ProposedLine};

/// Deltas smaller than this (in minor units) are not posted.
pub const MATERIALITY_THRESHOLD: u64 = 1;

/// An estimate superseded by an actual cost.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostAdjustment {
    /// Business reference of the triggering record (e.g. procurement id).
    pub reference: String,
    pub expected_cost: u64,
    pub actual_cost: u64,
    /// Expense or asset account the estimate was booked to.
    pub target_account: String,
    pub liability_account: String,
    pub date: NaiveDate,
    pub recorded_by: UserId,
}

impl CostAdjustment {
    /// Adjustment against the default Reimbursements Payable account.
    pub fn against_reimbursements(
        reference: impl Into<String>,
        expected_cost: u64,
        actual_cost: u64,
        target_account: impl Into<String>,
        date: NaiveDate,
        recorded_by: UserId,
    ) -> Self {
        Self {
            reference: reference.into(),
            expected_cost,
            actual_cost,
            target_account: target_account.into(),
            liability_account: REIMBURSEMENTS_PAYABLE.to_string(),
            date,
            recorded_by,
        }
    }

    /// `actual - expected`, signed.
    pub fn delta(&self) -> i128 {
        i128::from(self.actual_cost) - i128::from(self.expected_cost)
    }

    pub fn is_material(&self) -> bool {
        self.delta().unsigned_abs() >= u128::from(MATERIALITY_THRESHOLD)
    }

    /// The corrective entry, or `None` when the delta is immaterial.
    ///
    /// A positive delta raises both the target account and the liability;
    /// a negative delta lowers both.
    pub fn corrective_entry(&self) -> Option<ProposedEntry> {
        if !self.is_material() {
            return None;
        }

        let delta = self.delta();
        // |actual - expected| never exceeds max(actual, expected), so it fits in u64.
        let amount = self.actual_cost.abs_diff(self.expected_cost);
        let lines = if delta > 0 {
            vec![
                ProposedLine::debit(self.target_account.clone(), amount),
                ProposedLine::credit(self.liability_account.clone(), amount),
            ]
        } else {
            vec![
                ProposedLine::debit(self.liability_account.clone(), amount),
                ProposedLine::credit(self.target_account.clone(), amount),
            ]
        };

        Some(ProposedEntry {
            date: self.date,
            narration: format!(
                "Cost adjustment for {}: expected {}, actual {}",
                self.reference, self.expected_cost, self.actual_cost
            ),
            created_by: self.recorded_by,
            lines,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adjustment(expected: u64, actual: u64) -> CostAdjustment {
        CostAdjustment::against_reimbursements(
            "PROC-42",
            expected,
            actual,
            "5010",
            NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            UserId::new(),
        )
    }

    #[test]
    fn overrun_debits_expense_and_credits_liability() {
        let entry = adjustment(1_500, 1_650).corrective_entry().unwrap();
        assert_eq!(
            entry.lines,
            vec![
                ProposedLine::debit("5010", 150),
                ProposedLine::credit(REIMBURSEMENTS_PAYABLE, 150),
            ]
        );
        assert!(entry.validate().is_ok());
        assert_eq!(entry.narration, "Cost adjustment for PROC-42: expected 1500, actual 1650");
    }

    #[test]
    fn underrun_reverses_the_sides() {
        let entry = adjustment(1_500, 1_200).corrective_entry().unwrap();
        assert_eq!(
            entry.lines,
            vec![
                ProposedLine::debit(REIMBURSEMENTS_PAYABLE, 300),
                ProposedLine::credit("5010", 300),
            ]
        );
    }

    #[test]
    fn exact_estimate_posts_nothing() {
        let adj = adjustment(1_500, 1_500);
        assert_eq!(adj.delta(), 0);
        assert!(!adj.is_material());
        assert!(adj.corrective_entry().is_none());
    }

    #[test]
    fn one_minor_unit_is_material() {
        assert!(adjustment(1_500, 1_501).corrective_entry().is_some());
        assert!(adjustment(1_500, 1_499).corrective_entry().is_some());
    }
}
