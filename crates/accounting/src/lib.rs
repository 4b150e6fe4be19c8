//! Accounting domain: double-entry club ledger.
//!
//! Pure domain logic only: no IO, no persistence concerns. The transactional
//! posting services live in `clubledger-infra`.

pub mod account;
pub mod adjustment;
pub mod balance;
pub mod chart;
pub mod error;
pub mod journal;
pub mod reversal;

pub use account::{Account, AccountGroup, NormalBalance};
pub use adjustment::{CostAdjustment, MATERIALITY_THRESHOLD};
pub use balance::{AccountTotals, DateRange, RunningLedgerRow, TrialBalance, TrialBalanceRow};
pub use chart::{REIMBURSEMENTS_PAYABLE, default_chart};
pub use error::LedgerError;
pub use journal::{
    EntryStatus, EntryTotals, JournalEntry, JournalLine, PostedEntry, ProposedEntry, ProposedLine,
    Side,
};
