//! Default chart of accounts for a student club.

use crate::account::{Account, AccountGroup};

/// Liability account that tracks money the club owes its members.
pub const REIMBURSEMENTS_PAYABLE: &str = "2010";

const DEFAULT_CHART: &[(&str, &str, AccountGroup)] = &[
    ("1010", "Cash at Bank", AccountGroup::CurrentAsset),
    ("1020", "Petty Cash", AccountGroup::CurrentAsset),
    ("1510", "Equipment", AccountGroup::FixedAsset),
    (REIMBURSEMENTS_PAYABLE, "Reimbursements Payable", AccountGroup::CurrentLiability),
    ("3010", "Club Fund", AccountGroup::Equity),
    ("4010", "Membership Dues", AccountGroup::Revenue),
    ("4020", "Sponsorship Income", AccountGroup::Revenue),
    ("4030", "Event Income", AccountGroup::Revenue),
    ("5010", "Project Materials", AccountGroup::Expense),
    ("5020", "Event Expenses", AccountGroup::Expense),
    ("5030", "Travel", AccountGroup::Expense),
    ("5040", "Bank Charges", AccountGroup::Expense),
];

/// The default chart, ordered by code.
pub fn default_chart() -> Vec<Account> {
    DEFAULT_CHART
        .iter()
        .map(|&(code, name, group)| Account {
            code: code.to_string(),
            name: name.to_string(),
            group,
            normal_balance: group.default_normal_balance(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::NormalBalance;

    #[test]
    fn default_chart_is_sorted_and_unique() {
        let chart = default_chart();
        let codes: Vec<_> = chart.iter().map(|a| a.code.as_str()).collect();
        let mut sorted = codes.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(codes, sorted);
    }

    #[test]
    fn reimbursements_payable_is_a_credit_normal_liability() {
        let chart = default_chart();
        let payable = chart.iter().find(|a| a.code == REIMBURSEMENTS_PAYABLE).unwrap();
        assert_eq!(payable.group, AccountGroup::CurrentLiability);
        assert_eq!(payable.normal_balance, NormalBalance::Credit);
    }
}
