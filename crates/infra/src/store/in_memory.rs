use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;

use clubledger_accounting::{Account, DateRange, EntryStatus, JournalEntry, JournalLine};
use clubledger_core::{EntryId, ExpectedVersion, UserId, Versioned};

use super::r#trait::{LedgerStore, LedgerTransaction, StoreError};

/// Row identity used for optimistic concurrency bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum RowKey {
    Account(String),
    Entry(EntryId),
    Counter(String),
    Document(String, String),
    /// The journal as a whole; bumped by every entry insert or reversal.
    Journal,
}

#[derive(Debug, Default, Clone)]
struct State {
    accounts: BTreeMap<String, Versioned<Account>>,
    entries: HashMap<EntryId, Versioned<JournalEntry>>,
    entry_numbers: BTreeMap<u64, EntryId>,
    lines: HashMap<EntryId, Vec<JournalLine>>,
    counters: HashMap<String, Versioned<u64>>,
    documents: HashMap<(String, String), Versioned<JsonValue>>,
    journal_version: u64,
}

impl State {
    /// Current version of a row (0 = absent).
    fn version_of(&self, key: &RowKey) -> u64 {
        match key {
            RowKey::Account(code) => self.accounts.get(code).map(|r| r.version),
            RowKey::Entry(id) => self.entries.get(id).map(|r| r.version),
            RowKey::Counter(name) => self.counters.get(name).map(|r| r.version),
            RowKey::Document(c, id) => self
                .documents
                .get(&(c.clone(), id.clone()))
                .map(|r| r.version),
            RowKey::Journal => Some(self.journal_version),
        }
        .unwrap_or(0)
    }
}

/// In-memory ledger store with optimistic multi-row transactions.
///
/// Intended for tests/dev. Each transaction reads from the snapshot that was
/// current at `begin`, records the version of every row it reads and buffers
/// its writes. `commit` validates the recorded versions against the latest
/// state under the write lock and applies everything or nothing. Range reads
/// record the journal watermark, so a concurrent posting invalidates them.
///
/// Committed state is copy-on-write: a commit clones it only while an older
/// snapshot is still held by an open transaction.
#[derive(Debug, Default, Clone)]
pub struct InMemoryLedgerStore {
    state: Arc<RwLock<Arc<State>>>,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned() -> StoreError {
    StoreError::Backend("lock poisoned".to_string())
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn begin(&self) -> Result<Box<dyn LedgerTransaction>, StoreError> {
        let snapshot = self.state.read().map_err(|_| poisoned())?.clone();
        Ok(Box::new(InMemoryTransaction {
            state: self.state.clone(),
            snapshot,
            reads: HashMap::new(),
            pending: Pending::default(),
        }))
    }
}

#[derive(Debug, Default)]
struct Pending {
    accounts: BTreeMap<String, Account>,
    entries: Vec<JournalEntry>,
    lines: Vec<JournalLine>,
    counters: HashMap<String, u64>,
    reversals: HashMap<EntryId, (DateTime<Utc>, UserId)>,
    documents: HashMap<(String, String), JsonValue>,
}

impl Pending {
    fn is_empty(&self) -> bool {
        self.accounts.is_empty()
            && self.entries.is_empty()
            && self.lines.is_empty()
            && self.counters.is_empty()
            && self.reversals.is_empty()
            && self.documents.is_empty()
    }

    fn overlay(&self, mut entry: JournalEntry) -> JournalEntry {
        // mark_reversed only queues entries that are unreversed in the snapshot.
        if let Some((at, by)) = self.reversals.get(&entry.id) {
            if !entry.is_reversed() {
                entry.status = EntryStatus::Reversed {
                    reversed_at: *at,
                    reversed_by: *by,
                };
            }
        }
        entry
    }
}

/// Transaction handle over [`InMemoryLedgerStore`].
#[derive(Debug)]
pub struct InMemoryTransaction {
    state: Arc<RwLock<Arc<State>>>,
    snapshot: Arc<State>,
    reads: HashMap<RowKey, u64>,
    pending: Pending,
}

impl InMemoryTransaction {
    /// Remember the first version observed for a row.
    fn observe(&mut self, key: RowKey, version: u64) {
        self.reads.entry(key).or_insert(version);
    }

    fn entry_date(state: &State, pending: &Pending, id: EntryId) -> Option<chrono::NaiveDate> {
        state
            .entries
            .get(&id)
            .map(|r| r.value.date)
            .or_else(|| pending.entries.iter().find(|e| e.id == id).map(|e| e.date))
    }

    fn validate(&self, state: &State) -> Result<(), StoreError> {
        for (key, observed) in &self.reads {
            ExpectedVersion::observed(*observed)
                .check(state.version_of(key))
                .map_err(|e| StoreError::Conflict(format!("{key:?}: {e}")))?;
        }

        for code in self.pending.accounts.keys() {
            if state.accounts.contains_key(code) {
                return Err(StoreError::Conflict(format!("account '{code}' already exists")));
            }
        }

        for entry in &self.pending.entries {
            if state.entries.contains_key(&entry.id) {
                return Err(StoreError::Conflict(format!("entry {} already exists", entry.id)));
            }
            if state.entry_numbers.contains_key(&entry.entry_number) {
                return Err(StoreError::Conflict(format!(
                    "entry number {} already taken",
                    entry.entry_number
                )));
            }
        }

        for id in self.pending.reversals.keys() {
            match state.entries.get(id) {
                Some(row) if row.value.is_reversed() => {
                    return Err(StoreError::Conflict(format!(
                        "entry #{} is already reversed",
                        row.value.entry_number
                    )));
                }
                Some(_) => {}
                None if self.pending.entries.iter().any(|e| e.id == *id) => {}
                None => {
                    return Err(StoreError::Integrity(format!("cannot reverse missing entry {id}")));
                }
            }
        }

        Ok(())
    }

    /// Apply validated writes. Runs under the write lock after `validate`.
    fn apply(pending: Pending, state: &mut State) {
        if !pending.entries.is_empty() || !pending.reversals.is_empty() {
            state.journal_version += 1;
        }

        for (code, account) in pending.accounts {
            state.accounts.insert(code, Versioned::initial(account));
        }

        for entry in pending.entries {
            state.entry_numbers.insert(entry.entry_number, entry.id);
            state.entries.insert(entry.id, Versioned::initial(entry));
        }

        for line in pending.lines {
            state.lines.entry(line.entry_id()).or_default().push(line);
        }

        for (name, value) in pending.counters {
            match state.counters.get_mut(&name) {
                Some(row) => row.replace(value),
                None => {
                    state.counters.insert(name, Versioned::initial(value));
                }
            }
        }

        for (id, (at, by)) in pending.reversals {
            // validate rejected entries that were already reversed
            if let Some(row) = state.entries.get_mut(&id) {
                let mut entry = row.value.clone();
                entry.status = EntryStatus::Reversed {
                    reversed_at: at,
                    reversed_by: by,
                };
                row.replace(entry);
            }
        }

        for (key, body) in pending.documents {
            match state.documents.get_mut(&key) {
                Some(row) => row.replace(body),
                None => {
                    state.documents.insert(key, Versioned::initial(body));
                }
            }
        }
    }
}

#[async_trait]
impl LedgerTransaction for InMemoryTransaction {
    async fn get_account(&mut self, code: &str) -> Result<Option<Account>, StoreError> {
        if let Some(account) = self.pending.accounts.get(code) {
            return Ok(Some(account.clone()));
        }
        let (account, version) = {
            let state = &self.snapshot;
            match state.accounts.get(code) {
                Some(row) => (Some(row.value.clone()), row.version),
                None => (None, 0),
            }
        };
        self.observe(RowKey::Account(code.to_string()), version);
        Ok(account)
    }

    async fn list_accounts(&mut self) -> Result<Vec<Account>, StoreError> {
        let mut merged: BTreeMap<String, Account> = {
            let state = &self.snapshot;
            state
                .accounts
                .iter()
                .map(|(code, row)| (code.clone(), row.value.clone()))
                .collect()
        };
        for (code, account) in &self.pending.accounts {
            merged.insert(code.clone(), account.clone());
        }
        Ok(merged.into_values().collect())
    }

    async fn insert_account(&mut self, account: &Account) -> Result<(), StoreError> {
        if self.pending.accounts.contains_key(&account.code) {
            return Err(StoreError::Conflict(format!(
                "account '{}' inserted twice in one transaction",
                account.code
            )));
        }
        self.pending
            .accounts
            .insert(account.code.clone(), account.clone());
        Ok(())
    }

    async fn read_counter(&mut self, name: &str) -> Result<u64, StoreError> {
        if let Some(value) = self.pending.counters.get(name) {
            return Ok(*value);
        }
        let (value, version) = {
            let state = &self.snapshot;
            match state.counters.get(name) {
                Some(row) => (row.value, row.version),
                None => (0, 0),
            }
        };
        self.observe(RowKey::Counter(name.to_string()), version);
        Ok(value)
    }

    async fn write_counter(&mut self, name: &str, value: u64) -> Result<(), StoreError> {
        self.pending.counters.insert(name.to_string(), value);
        Ok(())
    }

    async fn get_entry(&mut self, id: EntryId) -> Result<Option<JournalEntry>, StoreError> {
        if let Some(entry) = self.pending.entries.iter().find(|e| e.id == id) {
            return Ok(Some(self.pending.overlay(entry.clone())));
        }
        let (entry, version) = {
            let state = &self.snapshot;
            match state.entries.get(&id) {
                Some(row) => (Some(row.value.clone()), row.version),
                None => (None, 0),
            }
        };
        self.observe(RowKey::Entry(id), version);
        Ok(entry.map(|e| self.pending.overlay(e)))
    }

    async fn insert_entry(&mut self, entry: &JournalEntry) -> Result<(), StoreError> {
        if self
            .pending
            .entries
            .iter()
            .any(|e| e.id == entry.id || e.entry_number == entry.entry_number)
        {
            return Err(StoreError::Conflict(format!(
                "entry #{} inserted twice in one transaction",
                entry.entry_number
            )));
        }
        self.pending.entries.push(entry.clone());
        Ok(())
    }

    async fn insert_lines(&mut self, lines: &[JournalLine]) -> Result<(), StoreError> {
        self.pending.lines.extend_from_slice(lines);
        Ok(())
    }

    async fn mark_reversed(
        &mut self,
        id: EntryId,
        reversed_at: DateTime<Utc>,
        reversed_by: UserId,
    ) -> Result<(), StoreError> {
        let current = self
            .get_entry(id)
            .await?
            .ok_or_else(|| StoreError::Integrity(format!("cannot reverse missing entry {id}")))?;
        if current.is_reversed() {
            return Err(StoreError::Conflict(format!(
                "entry #{} is already reversed",
                current.entry_number
            )));
        }
        self.pending.reversals.insert(id, (reversed_at, reversed_by));
        Ok(())
    }

    async fn lines_for_entry(&mut self, id: EntryId) -> Result<Vec<JournalLine>, StoreError> {
        let mut lines: Vec<JournalLine> = {
            let state = &self.snapshot;
            state.lines.get(&id).cloned().unwrap_or_default()
        };
        lines.extend(self.pending.lines.iter().filter(|l| l.entry_id() == id).cloned());
        lines.sort_by_key(|l| l.line_no());
        Ok(lines)
    }

    async fn entries_in_range(&mut self, range: &DateRange) -> Result<Vec<JournalEntry>, StoreError> {
        let watermark = self.snapshot.journal_version;
        self.observe(RowKey::Journal, watermark);
        let mut entries: Vec<JournalEntry> = {
            let state = &self.snapshot;
            state
                .entry_numbers
                .values()
                .filter_map(|id| state.entries.get(id))
                .filter(|row| range.contains(row.value.date))
                .map(|row| row.value.clone())
                .collect()
        };
        entries.extend(
            self.pending
                .entries
                .iter()
                .filter(|e| range.contains(e.date))
                .cloned(),
        );
        let mut entries: Vec<JournalEntry> =
            entries.into_iter().map(|e| self.pending.overlay(e)).collect();
        entries.sort_by_key(|e| e.entry_number);
        Ok(entries)
    }

    async fn lines_in_range(
        &mut self,
        range: &DateRange,
        account_code: Option<&str>,
    ) -> Result<Vec<JournalLine>, StoreError> {
        let watermark = self.snapshot.journal_version;
        self.observe(RowKey::Journal, watermark);
        let state: &State = &self.snapshot;
        let wanted = |line: &JournalLine| {
            account_code.is_none_or(|code| line.account_code() == code)
                && Self::entry_date(state, &self.pending, line.entry_id())
                    .is_some_and(|date| range.contains(date))
        };

        let lines = state
            .lines
            .values()
            .flatten()
            .chain(self.pending.lines.iter())
            .filter(|l| wanted(*l))
            .cloned()
            .collect();
        Ok(lines)
    }

    async fn get_document(
        &mut self,
        collection: &str,
        id: &str,
    ) -> Result<Option<JsonValue>, StoreError> {
        let key = (collection.to_string(), id.to_string());
        if let Some(body) = self.pending.documents.get(&key) {
            return Ok(Some(body.clone()));
        }
        let (body, version) = {
            let state = &self.snapshot;
            match state.documents.get(&key) {
                Some(row) => (Some(row.value.clone()), row.version),
                None => (None, 0),
            }
        };
        self.observe(RowKey::Document(key.0, key.1), version);
        Ok(body)
    }

    async fn put_document(
        &mut self,
        collection: &str,
        id: &str,
        body: JsonValue,
    ) -> Result<(), StoreError> {
        self.pending
            .documents
            .insert((collection.to_string(), id.to_string()), body);
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        if self.pending.is_empty() {
            return Ok(());
        }

        let this = *self;
        let mut latest = this.state.write().map_err(|_| poisoned())?;
        this.validate(&latest)?;
        Self::apply(this.pending, Arc::make_mut(&mut latest));
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use clubledger_accounting::{AccountGroup, ProposedEntry, ProposedLine};

    fn cash() -> Account {
        Account::conventional("1010", "Cash at Bank", AccountGroup::CurrentAsset).unwrap()
    }

    fn sample_entry(number: u64) -> (JournalEntry, Vec<JournalLine>) {
        let proposed = ProposedEntry {
            date: NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
            narration: "Dues".into(),
            created_by: UserId::new(),
            lines: vec![ProposedLine::debit("1010", 500), ProposedLine::credit("4010", 500)],
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

    #[tokio::test]
    async fn concurrent_counter_updates_conflict() {
        let store = InMemoryLedgerStore::new();
        let mut tx1 = store.begin().await.unwrap();
        let mut tx2 = store.begin().await.unwrap();

        let a = tx1.read_counter("transactions").await.unwrap();
        let b = tx2.read_counter("transactions").await.unwrap();
        assert_eq!((a, b), (0, 0));

        tx1.write_counter("transactions", a + 1).await.unwrap();
        tx2.write_counter("transactions", b + 1).await.unwrap();

        tx1.commit().await.unwrap();
        let err = tx2.commit().await.unwrap_err();
        assert!(err.is_conflict());

        let mut tx3 = store.begin().await.unwrap();
        assert_eq!(tx3.read_counter("transactions").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn reads_see_own_pending_writes_but_others_do_not() {
        let store = InMemoryLedgerStore::new();
        let (entry, lines) = sample_entry(1);

        let mut tx = store.begin().await.unwrap();
        tx.insert_entry(&entry).await.unwrap();
        tx.insert_lines(&lines).await.unwrap();
        assert!(tx.get_entry(entry.id).await.unwrap().is_some());
        assert_eq!(tx.lines_for_entry(entry.id).await.unwrap().len(), 2);

        let mut other = store.begin().await.unwrap();
        assert!(other.get_entry(entry.id).await.unwrap().is_none());

        tx.commit().await.unwrap();
        let mut after = store.begin().await.unwrap();
        assert!(after.get_entry(entry.id).await.unwrap().is_some());
        assert_eq!(after.lines_in_range(&DateRange::all(), Some("4010")).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn rollback_discards_everything() {
        let store = InMemoryLedgerStore::new();
        let mut tx = store.begin().await.unwrap();
        tx.insert_account(&cash()).await.unwrap();
        tx.write_counter("transactions", 9).await.unwrap();
        tx.rollback().await.unwrap();

        let mut check = store.begin().await.unwrap();
        assert!(check.get_account("1010").await.unwrap().is_none());
        assert_eq!(check.read_counter("transactions").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn racing_account_inserts_conflict() {
        let store = InMemoryLedgerStore::new();
        let mut tx1 = store.begin().await.unwrap();
        let mut tx2 = store.begin().await.unwrap();
        assert!(tx1.get_account("1010").await.unwrap().is_none());
        assert!(tx2.get_account("1010").await.unwrap().is_none());
        tx1.insert_account(&cash()).await.unwrap();
        tx2.insert_account(&cash()).await.unwrap();

        tx1.commit().await.unwrap();
        assert!(tx2.commit().await.unwrap_err().is_conflict());
    }

    #[tokio::test]
    async fn racing_reversal_flags_conflict() {
        let store = InMemoryLedgerStore::new();
        let (entry, lines) = sample_entry(1);
        let mut setup = store.begin().await.unwrap();
        setup.insert_entry(&entry).await.unwrap();
        setup.insert_lines(&lines).await.unwrap();
        setup.commit().await.unwrap();

        let mut tx1 = store.begin().await.unwrap();
        let mut tx2 = store.begin().await.unwrap();
        tx1.mark_reversed(entry.id, Utc::now(), UserId::new()).await.unwrap();
        tx2.mark_reversed(entry.id, Utc::now(), UserId::new()).await.unwrap();
        tx1.commit().await.unwrap();
        assert!(tx2.commit().await.unwrap_err().is_conflict());

        let mut check = store.begin().await.unwrap();
        let stored = check.get_entry(entry.id).await.unwrap().unwrap();
        assert!(stored.is_reversed());
        assert!(
            check
                .mark_reversed(entry.id, Utc::now(), UserId::new())
                .await
                .unwrap_err()
                .is_conflict()
        );
    }

    #[tokio::test]
    async fn documents_are_versioned_like_ledger_rows() {
        let store = InMemoryLedgerStore::new();
        let mut tx1 = store.begin().await.unwrap();
        let mut tx2 = store.begin().await.unwrap();
        assert!(tx1.get_document("procurements", "p1").await.unwrap().is_none());
        assert!(tx2.get_document("procurements", "p1").await.unwrap().is_none());
        tx1.put_document("procurements", "p1", serde_json::json!({"actual": 1650}))
            .await
            .unwrap();
        tx2.put_document("procurements", "p1", serde_json::json!({"actual": 1700}))
            .await
            .unwrap();
        tx1.commit().await.unwrap();
        assert!(tx2.commit().await.unwrap_err().is_conflict());
    }

    #[tokio::test]
    async fn reads_stay_on_the_snapshot_taken_at_begin() {
        let store = InMemoryLedgerStore::new();
        let mut reader = store.begin().await.unwrap();
        assert!(reader.list_accounts().await.unwrap().is_empty());
        assert!(reader.lines_in_range(&DateRange::all(), None).await.unwrap().is_empty());

        let (entry, lines) = sample_entry(1);
        let mut writer = store.begin().await.unwrap();
        writer.insert_account(&cash()).await.unwrap();
        writer.insert_entry(&entry).await.unwrap();
        writer.insert_lines(&lines).await.unwrap();
        writer.commit().await.unwrap();

        assert!(reader.list_accounts().await.unwrap().is_empty());
        assert!(reader.get_entry(entry.id).await.unwrap().is_none());
        assert!(reader.lines_in_range(&DateRange::all(), None).await.unwrap().is_empty());
        assert!(reader.lines_for_entry(entry.id).await.unwrap().is_empty());
        reader.rollback().await.unwrap();

        let mut fresh = store.begin().await.unwrap();
        assert_eq!(fresh.list_accounts().await.unwrap().len(), 1);
        assert_eq!(fresh.lines_in_range(&DateRange::all(), None).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn range_reads_conflict_with_concurrent_postings() {
        let store = InMemoryLedgerStore::new();

        let mut decider = store.begin().await.unwrap();
        assert!(decider.lines_in_range(&DateRange::all(), Some("1010")).await.unwrap().is_empty());
        decider
            .put_document("procurements", "p1", serde_json::json!({"approved": true}))
            .await
            .unwrap();

        let (entry, lines) = sample_entry(1);
        let mut writer = store.begin().await.unwrap();
        writer.insert_entry(&entry).await.unwrap();
        writer.insert_lines(&lines).await.unwrap();
        writer.commit().await.unwrap();

        assert!(decider.commit().await.unwrap_err().is_conflict());

        let mut retry = store.begin().await.unwrap();
        assert_eq!(retry.lines_in_range(&DateRange::all(), Some("1010")).await.unwrap().len(), 1);
        retry
            .put_document("procurements", "p1", serde_json::json!({"approved": true}))
            .await
            .unwrap();
        retry.commit().await.unwrap();
    }

    #[tokio::test]
    async fn pending_reversal_is_visible_inside_its_transaction() {
        let store = InMemoryLedgerStore::new();
        let (entry, lines) = sample_entry(1);
        let mut setup = store.begin().await.unwrap();
        setup.insert_entry(&entry).await.unwrap();
        setup.insert_lines(&lines).await.unwrap();
        setup.commit().await.unwrap();

        let by = UserId::new();
        let mut tx = store.begin().await.unwrap();
        tx.mark_reversed(entry.id, Utc::now(), by).await.unwrap();

        let seen = tx.get_entry(entry.id).await.unwrap().unwrap();
        assert!(matches!(seen.status, EntryStatus::Reversed { reversed_by, .. } if reversed_by == by));
        assert!(tx.entries_in_range(&DateRange::all()).await.unwrap()[0].is_reversed());
        assert!(
            tx.mark_reversed(entry.id, Utc::now(), UserId::new())
                .await
                .unwrap_err()
                .is_conflict()
        );
        tx.commit().await.unwrap();

        let mut check = store.begin().await.unwrap();
        let stored = check.get_entry(entry.id).await.unwrap().unwrap();
        assert!(matches!(stored.status, EntryStatus::Reversed { reversed_by, .. } if reversed_by == by));
    }
}
