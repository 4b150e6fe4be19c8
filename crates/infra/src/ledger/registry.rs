//! Chart of accounts.
//!
//! Accounts are created administratively and never deleted; lookups are
//! ordered by code.

use std::sync::Arc;

use tracing::{info, instrument};

use clubledger_accounting::{Account, AccountGroup, LedgerError, default_chart};

use crate::ledger::error::LedgerServiceError;
use crate::ledger::retry::{RetryPolicy, read_only, run_atomic};
use crate::store::{LedgerStore, LedgerTransaction};

#[derive(Debug)]
pub struct AccountRegistry<S> {
    store: Arc<S>,
    policy: RetryPolicy,
}

impl<S> Clone for AccountRegistry<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            policy: self.policy.clone(),
        }
    }
}

impl<S: LedgerStore> AccountRegistry<S> {
    pub fn new(store: Arc<S>, policy: RetryPolicy) -> Self {
        Self { store, policy }
    }

    pub async fn get(&self, code: &str) -> Result<Account, LedgerServiceError> {
        let code = code.trim().to_string();
        read_only(self.store.as_ref(), "get_account", |tx| {
            Box::pin(async move {
                match tx.get_account(&code).await? {
                    Some(account) => Ok::<_, LedgerServiceError>(account),
                    None => Err(LedgerError::AccountNotFound(code.clone()).into()),
                }
            })
        })
        .await
    }

    /// Accounts ordered by code, optionally restricted to one group.
    pub async fn list(&self, group: Option<AccountGroup>) -> Result<Vec<Account>, LedgerServiceError> {
        read_only(self.store.as_ref(), "list_accounts", |tx| {
            Box::pin(async move {
                let mut accounts = tx.list_accounts().await?;
                accounts.retain(|a| group.is_none_or(|g| a.group == g));
                Ok::<_, LedgerServiceError>(accounts)
            })
        })
        .await
    }

    /// Create a new account. A concurrent creation of the same code makes the
    /// loser retry, re-read, and fail with `DuplicateAccount`.
    #[instrument(skip(self, account), fields(code = %account.code), err)]
    pub async fn create(&self, account: &Account) -> Result<Account, LedgerServiceError> {
        let account = Account::new(
            account.code.clone(),
            account.name.clone(),
            account.group,
            account.normal_balance,
        )?;

        run_atomic(self.store.as_ref(), &self.policy, "create_account", |tx| {
            let account = account.clone();
            Box::pin(async move { create_in(tx, &account).await })
        })
        .await?;

        info!(code = %account.code, group = account.group.as_str(), "account created");
        Ok(account)
    }

    /// Insert the default club chart, skipping codes already present.
    /// Returns how many accounts were created.
    #[instrument(skip(self), err)]
    pub async fn seed_default_chart(&self) -> Result<usize, LedgerServiceError> {
        let created = run_atomic(self.store.as_ref(), &self.policy, "seed_default_chart", |tx| {
            Box::pin(async move {
                let mut created: usize = 0;
                for account in default_chart() {
                    if tx.get_account(&account.code).await?.is_none() {
                        tx.insert_account(&account).await?;
                        created += 1;
                    }
                }
                Ok::<_, LedgerServiceError>(created)
            })
        })
        .await?;

        info!(created, "default chart of accounts seeded");
        Ok(created)
    }
}

/// Insert `account` inside a caller-owned transaction.
pub async fn create_in(
    tx: &mut dyn LedgerTransaction,
    account: &Account,
) -> Result<(), LedgerServiceError> {
    if tx.get_account(&account.code).await?.is_some() {
        return Err(LedgerError::DuplicateAccount(account.code.clone()).into());
    }
    tx.insert_account(account).await?;
    Ok(())
}
