//! Transactional ledger services.
//!
//! Every write goes through [`retry::run_atomic`]: one store transaction per
//! attempt, retried on conflict, all-or-nothing. Each service also exposes an
//! `*_in` function that runs the same steps against a caller-supplied
//! transaction so collaborators can compose ledger writes with their own
//! document writes in one atomic operation (see [`Ledger::transaction`]).

pub mod error;
pub mod poster;
pub mod reconciler;
pub mod registry;
pub mod retry;
pub mod reversal;
pub mod sequence;

use std::sync::Arc;

use clubledger_accounting::{CostAdjustment, PostedEntry, ProposedEntry};
use clubledger_core::{EntryId, UserId};

use crate::config::LedgerConfig;
use crate::projections::ledger_query::LedgerQuery;
use crate::store::{LedgerStore, LedgerTransaction};

pub use error::LedgerServiceError;
pub use poster::{LedgerPoster, post_in};
pub use reconciler::{CostReconciler, reconcile_in};
pub use registry::{AccountRegistry, create_in};
pub use retry::{BackoffStrategy, RetryPolicy, TxFuture, run_atomic};
pub use reversal::{ReversalEngine, reverse_in};
pub use sequence::{ENTRY_SEQUENCE, SequenceCounter};

/// Entry point tying the services to one store and retry policy.
#[derive(Debug)]
pub struct Ledger<S> {
    store: Arc<S>,
    policy: RetryPolicy,
}

impl<S> Clone for Ledger<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            policy: self.policy.clone(),
        }
    }
}

impl<S: LedgerStore> Ledger<S> {
    pub fn new(store: S) -> Self {
        Self::with_policy(store, RetryPolicy::default())
    }

    pub fn with_policy(store: S, policy: RetryPolicy) -> Self {
        Self {
            store: Arc::new(store),
            policy,
        }
    }

    pub fn from_config(store: S, config: &LedgerConfig) -> Self {
        Self::with_policy(store, config.retry.clone())
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn accounts(&self) -> AccountRegistry<S> {
        AccountRegistry::new(Arc::clone(&self.store), self.policy.clone())
    }

    pub fn poster(&self) -> LedgerPoster<S> {
        LedgerPoster::new(Arc::clone(&self.store), self.policy.clone())
    }

    pub fn reversals(&self) -> ReversalEngine<S> {
        ReversalEngine::new(Arc::clone(&self.store), self.policy.clone())
    }

    pub fn reconciler(&self) -> CostReconciler<S> {
        CostReconciler::new(Arc::clone(&self.store), self.policy.clone())
    }

    pub fn query(&self) -> LedgerQuery<S> {
        LedgerQuery::new(Arc::clone(&self.store))
    }

    pub async fn post(&self, entry: &ProposedEntry) -> Result<PostedEntry, LedgerServiceError> {
        self.poster().post(entry).await
    }

    pub async fn reverse(
        &self,
        entry_id: EntryId,
        reversed_by: UserId,
        reason: &str,
    ) -> Result<PostedEntry, LedgerServiceError> {
        self.reversals().reverse(entry_id, reversed_by, reason).await
    }

    pub async fn reconcile(
        &self,
        adjustment: &CostAdjustment,
    ) -> Result<Option<PostedEntry>, LedgerServiceError> {
        self.reconciler().reconcile(adjustment).await
    }

    /// Run `work` as one atomic operation with this ledger's retry policy.
    ///
    /// `work` may mix ledger writes (`post_in`, `reverse_in`,
    /// `reconcile_in`) with collaborator document writes; they commit or
    /// roll back together. It may be invoked more than once.
    pub async fn transaction<T, F>(
        &self,
        operation: &'static str,
        work: F,
    ) -> Result<T, LedgerServiceError>
    where
        T: Send,
        F: for<'a> FnMut(&'a mut dyn LedgerTransaction) -> TxFuture<'a, T> + Send,
    {
        run_atomic(self.store.as_ref(), &self.policy, operation, work).await
    }
}
