//! Chart-of-accounts records.

use serde::{Deserialize, Serialize};

use crate::error::LedgerError;

/// Balance-sheet / income-statement group of an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountGroup {
    CurrentAsset,
    FixedAsset,
    CurrentLiability,
    Equity,
    Revenue,
    Expense,
}

impl AccountGroup {
    /// Conventional polarity: assets and expenses grow on the debit side.
    pub fn default_normal_balance(self) -> NormalBalance {
        match self {
            AccountGroup::CurrentAsset | AccountGroup::FixedAsset | AccountGroup::Expense => {
                NormalBalance::Debit
            }
            AccountGroup::CurrentLiability | AccountGroup::Equity | AccountGroup::Revenue => {
                NormalBalance::Credit
            }
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AccountGroup::CurrentAsset => "current_asset",
            AccountGroup::FixedAsset => "fixed_asset",
            AccountGroup::CurrentLiability => "current_liability",
            AccountGroup::Equity => "equity",
            AccountGroup::Revenue => "revenue",
            AccountGroup::Expense => "expense",
        }
    }
}

impl core::str::FromStr for AccountGroup {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "current_asset" => Ok(AccountGroup::CurrentAsset),
            "fixed_asset" => Ok(AccountGroup::FixedAsset),
            "current_liability" => Ok(AccountGroup::CurrentLiability),
            "equity" => Ok(AccountGroup::Equity),
            "revenue" => Ok(AccountGroup::Revenue),
            "expense" => Ok(AccountGroup::Expense),
            other => Err(LedgerError::InvalidAccount(format!("unknown account group '{other}'"))),
        }
    }
}

/// The side on which an account's balance naturally increases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NormalBalance {
    Debit,
    Credit,
}

impl NormalBalance {
    pub fn as_str(self) -> &'static str {
        match self {
            NormalBalance::Debit => "debit",
            NormalBalance::Credit => "credit",
        }
    }

    /// Signed balance from debit and credit totals, positive on the normal side.
    pub fn signed(self, debits: u64, credits: u64) -> i128 {
        let (debits, credits) = (i128::from(debits), i128::from(credits));
        match self {
            NormalBalance::Debit => debits - credits,
            NormalBalance::Credit => credits - debits,
        }
    }
}

impl core::str::FromStr for NormalBalance {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "debit" => Ok(NormalBalance::Debit),
            "credit" => Ok(NormalBalance::Credit),
            other => Err(LedgerError::InvalidAccount(format!("unknown normal balance '{other}'"))),
        }
    }
}

/// Account in the chart of accounts.
///
/// Accounts are never deleted: historical journal lines reference them by code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Account {
    pub code: String, // e.g. "1010"
    pub name: String, // e.g. "Cash at Bank"
    pub group: AccountGroup,
    pub normal_balance: NormalBalance,
}

impl Account {
    /// Validated constructor used by administrative account creation.
    pub fn new(
        code: impl Into<String>,
        name: impl Into<String>,
        group: AccountGroup,
        normal_balance: NormalBalance,
    ) -> Result<Self, LedgerError> {
        let code = code.into().trim().to_string();
        let name = name.into().trim().to_string();

        if code.is_empty() {
            return Err(LedgerError::InvalidAccount("code must not be empty".to_string()));
        }
        if code.chars().any(char::is_whitespace) {
            return Err(LedgerError::InvalidAccount(format!(
                "code '{code}' must not contain whitespace"
            )));
        }
        if name.is_empty() {
            return Err(LedgerError::InvalidAccount(format!("account '{code}' needs a name")));
        }

        Ok(Self {
            code,
            name,
            group,
            normal_balance,
        })
    }

    /// Account with the group's conventional normal balance.
    pub fn conventional(
        code: impl Into<String>,
        name: impl Into<String>,
        group: AccountGroup,
    ) -> Result<Self, LedgerError> {
        Self::new(code, name, group, group.default_normal_balance())
    }
}
