//! Postgres-backed ledger store.
//!
//! Each ledger transaction is a Postgres transaction at `SERIALIZABLE`
//! isolation, which gives the optimistic-concurrency semantics the ledger
//! services expect: concurrent read-modify-write of the sequence counter is
//! detected by the database and surfaces as a retryable conflict.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError | Scenario |
//! |------------|----------------------|------------|----------|
//! | Database (serialization failure) | `40001` | `Conflict` | Concurrent counter/entry update |
//! | Database (deadlock detected) | `40P01` | `Conflict` | Lock cycle between concurrent postings |
//! | Database (unique violation) | `23505` | `Conflict` | Entry number or account code taken concurrently |
//! | Database (foreign key violation) | `23503` | `Integrity` | Line references an unknown account or entry |
//! | Database (check constraint violation) | `23514` | `Integrity` | Negative or two-sided line amounts |
//! | Database (raise exception) | `P0001` | `Integrity` | Immutability trigger fired |
//! | Database (other) | Any other | `Backend` | Other database errors |
//! | Other | N/A | `Backend` | Pool closed, network errors, etc. |

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value as JsonValue;
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::instrument;
use uuid::Uuid;

use clubledger_accounting::{
    Account, DateRange, EntryStatus, JournalEntry, JournalLine, LedgerError,
};
use clubledger_core::{EntryId, LineId, UserId};

use super::r#trait::{LedgerStore, LedgerTransaction, StoreError};

/// Schema for the ledger tables. Idempotent; applied by [`PostgresLedgerStore::migrate`].
pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS ledger_accounts (
    code            TEXT PRIMARY KEY CHECK (code <> ''),
    name            TEXT NOT NULL CHECK (name <> ''),
    account_group   TEXT NOT NULL,
    normal_balance  TEXT NOT NULL CHECK (normal_balance IN ('debit', 'credit')),
    created_at      TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE TABLE IF NOT EXISTS journal_entries (
    id                 UUID PRIMARY KEY,
    entry_number       BIGINT NOT NULL UNIQUE CHECK (entry_number > 0),
    entry_date         DATE NOT NULL,
    narration          TEXT NOT NULL,
    created_by         UUID NOT NULL,
    created_at         TIMESTAMPTZ NOT NULL,
    is_reversed        BOOLEAN NOT NULL DEFAULT FALSE,
    reversed_at        TIMESTAMPTZ,
    reversed_by        UUID,
    reverses_entry_id  UUID REFERENCES journal_entries (id),
    CHECK (
        (is_reversed AND reversed_at IS NOT NULL AND reversed_by IS NOT NULL)
        OR (NOT is_reversed AND reversed_at IS NULL AND reversed_by IS NULL)
    )
);

CREATE INDEX IF NOT EXISTS journal_entries_date_idx ON journal_entries (entry_date);

CREATE TABLE IF NOT EXISTS journal_lines (
    id            UUID PRIMARY KEY,
    entry_id      UUID NOT NULL REFERENCES journal_entries (id),
    line_no       INTEGER NOT NULL CHECK (line_no > 0),
    account_code  TEXT NOT NULL REFERENCES ledger_accounts (code),
    debit_minor   BIGINT NOT NULL CHECK (debit_minor >= 0),
    credit_minor  BIGINT NOT NULL CHECK (credit_minor >= 0),
    CHECK ((debit_minor = 0) <> (credit_minor = 0)),
    UNIQUE (entry_id, line_no)
);

CREATE INDEX IF NOT EXISTS journal_lines_account_idx ON journal_lines (account_code);

CREATE TABLE IF NOT EXISTS sequence_counters (
    name         TEXT PRIMARY KEY,
    last_number  BIGINT NOT NULL CHECK (last_number >= 0)
);

CREATE TABLE IF NOT EXISTS ledger_documents (
    collection  TEXT NOT NULL,
    id          TEXT NOT NULL,
    body        JSONB NOT NULL,
    updated_at  TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    PRIMARY KEY (collection, id)
);

CREATE OR REPLACE FUNCTION ledger_reject_line_change() RETURNS trigger AS $$
BEGIN
    RAISE EXCEPTION 'journal lines are immutable';
END;
$$ LANGUAGE plpgsql;

DROP TRIGGER IF EXISTS journal_lines_immutable ON journal_lines;
CREATE TRIGGER journal_lines_immutable
    BEFORE UPDATE OR DELETE ON journal_lines
    FOR EACH ROW EXECUTE FUNCTION ledger_reject_line_change();

CREATE OR REPLACE FUNCTION ledger_guard_entry_change() RETURNS trigger AS $$
BEGIN
    IF TG_OP = 'DELETE' THEN
        RAISE EXCEPTION 'journal entries cannot be deleted';
    END IF;
    IF OLD.is_reversed
        OR NEW.id <> OLD.id
        OR NEW.entry_number <> OLD.entry_number
        OR NEW.entry_date <> OLD.entry_date
        OR NEW.narration <> OLD.narration
        OR NEW.created_by <> OLD.created_by
        OR NEW.created_at <> OLD.created_at
        OR NEW.reverses_entry_id IS DISTINCT FROM OLD.reverses_entry_id THEN
        RAISE EXCEPTION 'journal entries change only once, when reversed';
    END IF;
    RETURN NEW;
END;
$$ LANGUAGE plpgsql;

DROP TRIGGER IF EXISTS journal_entries_guard ON journal_entries;
CREATE TRIGGER journal_entries_guard
    BEFORE UPDATE OR DELETE ON journal_entries
    FOR EACH ROW EXECUTE FUNCTION ledger_guard_entry_change();
"#;

const ENTRY_COLUMNS: &str = "id, entry_number, entry_date, narration, created_by, created_at, \
     is_reversed, reversed_at, reversed_by, reverses_entry_id";

/// Postgres-backed ledger store.
///
/// ## Thread Safety
///
/// Uses the SQLx connection pool (Arc + Send + Sync); every ledger
/// transaction holds one pooled connection until commit or rollback.
#[derive(Debug, Clone)]
pub struct PostgresLedgerStore {
    pool: Arc<PgPool>,
}

impl PostgresLedgerStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Connect a pool to `database_url`.
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPool::connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    /// Apply [`SCHEMA`].
    #[instrument(skip(self), err)]
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(SCHEMA)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("migrate", e))?;
        Ok(())
    }
}

#[async_trait]
impl LedgerStore for PostgresLedgerStore {
    #[instrument(skip(self), err)]
    async fn begin(&self) -> Result<Box<dyn LedgerTransaction>, StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        sqlx::query("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE")
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("set_isolation", e))?;

        Ok(Box::new(PostgresTransaction { tx }))
    }
}

/// Transaction handle over [`PostgresLedgerStore`].
pub struct PostgresTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl LedgerTransaction for PostgresTransaction {
    async fn get_account(&mut self, code: &str) -> Result<Option<Account>, StoreError> {
        let row = sqlx::query(
            "SELECT code, name, account_group, normal_balance FROM ledger_accounts WHERE code = $1",
        )
        .bind(code)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("get_account", e))?;

        row.map(|r| account_from_row(&r)).transpose()
    }

    async fn list_accounts(&mut self) -> Result<Vec<Account>, StoreError> {
        let rows = sqlx::query(
            "SELECT code, name, account_group, normal_balance FROM ledger_accounts ORDER BY code",
        )
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("list_accounts", e))?;

        rows.iter().map(account_from_row).collect()
    }

    async fn insert_account(&mut self, account: &Account) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO ledger_accounts (code, name, account_group, normal_balance)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(&account.code)
        .bind(&account.name)
        .bind(account.group.as_str())
        .bind(account.normal_balance.as_str())
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_account", e))?;
        Ok(())
    }

    async fn read_counter(&mut self, name: &str) -> Result<u64, StoreError> {
        let last: Option<i64> =
            sqlx::query_scalar("SELECT last_number FROM sequence_counters WHERE name = $1")
                .bind(name)
                .fetch_optional(&mut *self.tx)
                .await
                .map_err(|e| map_sqlx_error("read_counter", e))?;

        last.map(|v| from_db(v, "last_number")).transpose().map(|v| v.unwrap_or(0))
    }

    async fn write_counter(&mut self, name: &str, value: u64) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO sequence_counters (name, last_number)
            VALUES ($1, $2)
            ON CONFLICT (name) DO UPDATE SET last_number = EXCLUDED.last_number
            "#,
        )
        .bind(name)
        .bind(to_db(value, "last_number")?)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("write_counter", e))?;
        Ok(())
    }

    async fn get_entry(&mut self, id: EntryId) -> Result<Option<JournalEntry>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {ENTRY_COLUMNS} FROM journal_entries WHERE id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("get_entry", e))?;

        row.map(|r| JournalEntry::try_from(EntryRow::from_row(&r)?))
            .transpose()
    }

    async fn insert_entry(&mut self, entry: &JournalEntry) -> Result<(), StoreError> {
        let (is_reversed, reversed_at, reversed_by) = match entry.status {
            EntryStatus::Posted => (false, None, None),
            EntryStatus::Reversed {
                reversed_at,
                reversed_by,
            } => (true, Some(reversed_at), Some(*reversed_by.as_uuid())),
        };

        sqlx::query(
            r#"
            INSERT INTO journal_entries (
                id,
                entry_number,
                entry_date,
                narration,
                created_by,
                created_at,
                is_reversed,
                reversed_at,
                reversed_by,
                reverses_entry_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(entry.id.as_uuid())
        .bind(to_db(entry.entry_number, "entry_number")?)
        .bind(entry.date)
        .bind(&entry.narration)
        .bind(entry.created_by.as_uuid())
        .bind(entry.created_at)
        .bind(is_reversed)
        .bind(reversed_at)
        .bind(reversed_by)
        .bind(entry.reverses_entry_id.map(Uuid::from))
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_entry", e))?;
        Ok(())
    }

    async fn insert_lines(&mut self, lines: &[JournalLine]) -> Result<(), StoreError> {
        for line in lines {
            let line_no = i32::try_from(line.line_no())
                .map_err(|_| StoreError::Integrity(format!("line_no {} out of range", line.line_no())))?;
            sqlx::query(
                r#"
                INSERT INTO journal_lines (id, entry_id, line_no, account_code, debit_minor, credit_minor)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(line.id().as_uuid())
            .bind(line.entry_id().as_uuid())
            .bind(line_no)
            .bind(line.account_code())
            .bind(to_db(line.debit(), "debit_minor")?)
            .bind(to_db(line.credit(), "credit_minor")?)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("insert_lines", e))?;
        }
        Ok(())
    }

    #[instrument(skip(self), fields(entry_id = %id), err)]
    async fn mark_reversed(
        &mut self,
        id: EntryId,
        reversed_at: DateTime<Utc>,
        reversed_by: UserId,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE journal_entries
            SET is_reversed = TRUE, reversed_at = $2, reversed_by = $3
            WHERE id = $1 AND NOT is_reversed
            "#,
        )
        .bind(id.as_uuid())
        .bind(reversed_at)
        .bind(reversed_by.as_uuid())
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("mark_reversed", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Conflict(format!(
                "entry {id} is missing or already reversed"
            )));
        }
        Ok(())
    }

    async fn lines_for_entry(&mut self, id: EntryId) -> Result<Vec<JournalLine>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, entry_id, line_no, account_code, debit_minor, credit_minor
            FROM journal_lines
            WHERE entry_id = $1
            ORDER BY line_no ASC
            "#,
        )
        .bind(id.as_uuid())
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("lines_for_entry", e))?;

        rows.iter()
            .map(|r| JournalLine::try_from(LineRow::from_row(r)?))
            .collect()
    }

    async fn entries_in_range(&mut self, range: &DateRange) -> Result<Vec<JournalEntry>, StoreError> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {ENTRY_COLUMNS}
            FROM journal_entries
            WHERE ($1::date IS NULL OR entry_date >= $1)
                AND ($2::date IS NULL OR entry_date <= $2)
            ORDER BY entry_number ASC
            "#
        ))
        .bind(range.from)
        .bind(range.to)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("entries_in_range", e))?;

        rows.iter()
            .map(|r| JournalEntry::try_from(EntryRow::from_row(r)?))
            .collect()
    }

    async fn lines_in_range(
        &mut self,
        range: &DateRange,
        account_code: Option<&str>,
    ) -> Result<Vec<JournalLine>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT l.id, l.entry_id, l.line_no, l.account_code, l.debit_minor, l.credit_minor
            FROM journal_lines l
            JOIN journal_entries e ON e.id = l.entry_id
            WHERE ($1::date IS NULL OR e.entry_date >= $1)
                AND ($2::date IS NULL OR e.entry_date <= $2)
                AND ($3::text IS NULL OR l.account_code = $3)
            ORDER BY e.entry_number ASC, l.line_no ASC
            "#,
        )
        .bind(range.from)
        .bind(range.to)
        .bind(account_code)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("lines_in_range", e))?;

        rows.iter()
            .map(|r| JournalLine::try_from(LineRow::from_row(r)?))
            .collect()
    }

    async fn get_document(
        &mut self,
        collection: &str,
        id: &str,
    ) -> Result<Option<JsonValue>, StoreError> {
        sqlx::query_scalar("SELECT body FROM ledger_documents WHERE collection = $1 AND id = $2")
            .bind(collection)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("get_document", e))
    }

    async fn put_document(
        &mut self,
        collection: &str,
        id: &str,
        body: JsonValue,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO ledger_documents (collection, id, body)
            VALUES ($1, $2, $3)
            ON CONFLICT (collection, id) DO UPDATE SET body = EXCLUDED.body, updated_at = NOW()
            "#,
        )
        .bind(collection)
        .bind(id)
        .bind(body)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("put_document", e))?;
        Ok(())
    }

    #[instrument(skip(self), err)]
    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx
            .commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        self.tx
            .rollback()
            .await
            .map_err(|e| map_sqlx_error("rollback", e))
    }
}

/// Map SQLx errors to StoreError.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some(code) => classify_sqlstate(code, msg),
                None => StoreError::Backend(msg),
            }
        }
        sqlx::Error::PoolClosed => {
            StoreError::Backend(format!("connection pool closed in {}", operation))
        }
        _ => StoreError::Backend(format!("sqlx error in {}: {}", operation, err)),
    }
}

fn classify_sqlstate(code: &str, msg: String) -> StoreError {
    match code {
        // serialization_failure, deadlock_detected, unique_violation
        "40001" | "40P01" | "23505" => StoreError::Conflict(msg),
        // foreign_key_violation, check_violation, raise_exception
        "23503" | "23514" | "P0001" => StoreError::Integrity(msg),
        _ => StoreError::Backend(msg),
    }
}

fn to_db(value: u64, column: &str) -> Result<i64, StoreError> {
    i64::try_from(value)
        .map_err(|_| StoreError::Integrity(format!("{column} value {value} exceeds BIGINT")))
}

fn from_db(value: i64, column: &str) -> Result<u64, StoreError> {
    u64::try_from(value)
        .map_err(|_| StoreError::Integrity(format!("{column} holds negative value {value}")))
}

fn integrity(err: LedgerError) -> StoreError {
    StoreError::Integrity(err.to_string())
}

fn account_from_row(row: &sqlx::postgres::PgRow) -> Result<Account, StoreError> {
    let read = |e: sqlx::Error| map_sqlx_error("decode_account", e);
    let group: String = row.try_get("account_group").map_err(read)?;
    let normal: String = row.try_get("normal_balance").map_err(read)?;
    Ok(Account {
        code: row.try_get("code").map_err(read)?,
        name: row.try_get("name").map_err(read)?,
        group: group.parse().map_err(integrity)?,
        normal_balance: normal.parse().map_err(integrity)?,
    })
}

// SQLx row types

#[derive(Debug)]
struct EntryRow {
    id: Uuid,
    entry_number: i64,
    entry_date: NaiveDate,
    narration: String,
    created_by: Uuid,
    created_at: DateTime<Utc>,
    is_reversed: bool,
    reversed_at: Option<DateTime<Utc>>,
    reversed_by: Option<Uuid>,
    reverses_entry_id: Option<Uuid>,
}

impl EntryRow {
    fn from_row(row: &sqlx::postgres::PgRow) -> Result<Self, StoreError> {
        let read = |e: sqlx::Error| map_sqlx_error("decode_entry", e);
        Ok(EntryRow {
            id: row.try_get("id").map_err(read)?,
            entry_number: row.try_get("entry_number").map_err(read)?,
            entry_date: row.try_get("entry_date").map_err(read)?,
            narration: row.try_get("narration").map_err(read)?,
            created_by: row.try_get("created_by").map_err(read)?,
            created_at: row.try_get("created_at").map_err(read)?,
            is_reversed: row.try_get("is_reversed").map_err(read)?,
            reversed_at: row.try_get("reversed_at").map_err(read)?,
            reversed_by: row.try_get("reversed_by").map_err(read)?,
            reverses_entry_id: row.try_get("reverses_entry_id").map_err(read)?,
        })
    }
}

impl TryFrom<EntryRow> for JournalEntry {
    type Error = StoreError;

    fn try_from(row: EntryRow) -> Result<Self, Self::Error> {
        let status = match (row.is_reversed, row.reversed_at, row.reversed_by) {
            (false, None, None) => EntryStatus::Posted,
            (true, Some(reversed_at), Some(reversed_by)) => EntryStatus::Reversed {
                reversed_at,
                reversed_by: UserId::from_uuid(reversed_by),
            },
            _ => {
                return Err(StoreError::Integrity(format!(
                    "entry {} has inconsistent reversal fields",
                    row.id
                )));
            }
        };

        Ok(JournalEntry {
            id: EntryId::from_uuid(row.id),
            entry_number: from_db(row.entry_number, "entry_number")?,
            date: row.entry_date,
            narration: row.narration,
            created_by: UserId::from_uuid(row.created_by),
            created_at: row.created_at,
            status,
            reverses_entry_id: row.reverses_entry_id.map(EntryId::from_uuid),
        })
    }
}

#[derive(Debug)]
struct LineRow {
    id: Uuid,
    entry_id: Uuid,
    line_no: i32,
    account_code: String,
    debit_minor: i64,
    credit_minor: i64,
}

impl LineRow {
    fn from_row(row: &sqlx::postgres::PgRow) -> Result<Self, StoreError> {
        let read = |e: sqlx::Error| map_sqlx_error("decode_line", e);
        Ok(LineRow {
            id: row.try_get("id").map_err(read)?,
            entry_id: row.try_get("entry_id").map_err(read)?,
            line_no: row.try_get("line_no").map_err(read)?,
            account_code: row.try_get("account_code").map_err(read)?,
            debit_minor: row.try_get("debit_minor").map_err(read)?,
            credit_minor: row.try_get("credit_minor").map_err(read)?,
        })
    }
}

impl TryFrom<LineRow> for JournalLine {
    type Error = StoreError;

    fn try_from(row: LineRow) -> Result<Self, Self::Error> {
        let line_no = u32::try_from(row.line_no)
            .map_err(|_| StoreError::Integrity(format!("line {} has negative line_no", row.id)))?;
        JournalLine::from_stored(
            LineId::from_uuid(row.id),
            EntryId::from_uuid(row.entry_id),
            line_no,
            row.account_code,
            from_db(row.debit_minor, "debit_minor")?,
            from_db(row.credit_minor, "credit_minor")?,
        )
        .map_err(integrity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry_row() -> EntryRow {
        EntryRow {
            id: Uuid::now_v7(),
            entry_number: 3,
            entry_date: NaiveDate::from_ymd_opt(2024, 4, 2).unwrap(),
            narration: "Sponsorship received".into(),
            created_by: Uuid::now_v7(),
            created_at: Utc::now(),
            is_reversed: false,
            reversed_at: None,
            reversed_by: None,
            reverses_entry_id: None,
        }
    }

    #[test]
    fn sqlstates_map_to_store_errors() {
        assert!(classify_sqlstate("40001", "x".into()).is_conflict());
        assert!(classify_sqlstate("40P01", "x".into()).is_conflict());
        assert!(classify_sqlstate("23505", "x".into()).is_conflict());
        assert!(matches!(classify_sqlstate("23514", "x".into()), StoreError::Integrity(_)));
        assert!(matches!(classify_sqlstate("P0001", "x".into()), StoreError::Integrity(_)));
        assert!(matches!(classify_sqlstate("08006", "x".into()), StoreError::Backend(_)));
    }

    #[test]
    fn posted_entry_row_converts() {
        let entry: JournalEntry = entry_row().try_into().unwrap();
        assert_eq!(entry.entry_number, 3);
        assert_eq!(entry.status, EntryStatus::Posted);
    }

    #[test]
    fn half_reversed_entry_row_is_an_integrity_error() {
        let mut row = entry_row();
        row.is_reversed = true;
        let err = JournalEntry::try_from(row).unwrap_err();
        assert!(matches!(err, StoreError::Integrity(_)));
    }

    #[test]
    fn two_sided_or_negative_lines_are_rejected() {
        let base = || LineRow {
            id: Uuid::now_v7(),
            entry_id: Uuid::now_v7(),
            line_no: 1,
            account_code: "1010".into(),
            debit_minor: 100,
            credit_minor: 0,
        };
        assert!(JournalLine::try_from(base()).is_ok());

        let mut two_sided = base();
        two_sided.credit_minor = 100;
        assert!(matches!(JournalLine::try_from(two_sided), Err(StoreError::Integrity(_))));

        let mut negative = base();
        negative.debit_minor = -5;
        assert!(matches!(JournalLine::try_from(negative), Err(StoreError::Integrity(_))));
    }

    #[test]
    fn amounts_beyond_bigint_are_rejected() {
        assert!(to_db(u64::MAX, "debit_minor").is_err());
        assert_eq!(to_db(42, "debit_minor").unwrap(), 42);
    }
}
