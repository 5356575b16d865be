use crate::errors::{internal, ApiError};
use crate::models::{EventItem, EventKind, RootRecord};
use crate::policy::{Caller, Role};
use chrono::{DateTime, Utc};
use merkle_commit::Digest;
use serde_json::json;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow},
    Executor, Pool, Row, Sqlite,
};
use std::str::FromStr;
use std::time::Duration;
use uuid::Uuid;

pub type Db = Pool<Sqlite>;

/// How long a writer waits for SQLite's write lock before giving up.
const BUSY_TIMEOUT: Duration = Duration::from_secs(10);

pub async fn connect(db_url: &str) -> Result<Db, ApiError> {
    // WAL lets readers proceed while a batch is being appended.
    let options = SqliteConnectOptions::from_str(db_url)
        .map_err(internal)?
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(BUSY_TIMEOUT);

    SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await
        .map_err(internal)
}

pub async fn init_schema(db: &Db) -> Result<(), ApiError> {
    // Rows in root_records, batch_leaves and events are only ever inserted.
    sqlx::query(
        r#"
CREATE TABLE IF NOT EXISTS root_records (
  sequence INTEGER PRIMARY KEY,
  batch_id TEXT NOT NULL UNIQUE,
  root_hex TEXT NOT NULL,
  prev_root_hex TEXT,
  leaf_count INTEGER NOT NULL,
  issuer TEXT NOT NULL,
  issued_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS root_records_root ON root_records(root_hex);

CREATE TABLE IF NOT EXISTS batch_leaves (
  sequence INTEGER NOT NULL,
  leaf_index INTEGER NOT NULL,
  leaf_hex TEXT NOT NULL,
  PRIMARY KEY(sequence, leaf_index)
);

CREATE TABLE IF NOT EXISTS members (
  api_key TEXT PRIMARY KEY,
  role TEXT NOT NULL,
  label TEXT NOT NULL,
  created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS events (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  created_at TEXT NOT NULL,
  kind TEXT NOT NULL,
  actor TEXT NOT NULL,
  detail_json TEXT NOT NULL
);
"#,
    )
    .execute(db)
    .await
    .map_err(internal)?;

    Ok(())
}

fn parse_time(s: &str) -> Result<DateTime<Utc>, ApiError> {
    Ok(DateTime::parse_from_rfc3339(s).map_err(internal)?.with_timezone(&Utc))
}

fn root_record_from_row(row: &SqliteRow) -> Result<RootRecord, ApiError> {
    let sequence: i64 = row.get(0);
    let batch_id: String = row.get(1);
    let root_hex: String = row.get(2);
    let prev_root_hex: Option<String> = row.get(3);
    let leaf_count: i64 = row.get(4);
    let issuer: String = row.get(5);
    let issued_at: String = row.get(6);

    Ok(RootRecord {
        sequence: sequence as u64,
        batch_id: Uuid::parse_str(&batch_id).map_err(internal)?,
        root: Digest::from_hex(&root_hex).map_err(internal)?,
        prev_root: prev_root_hex
            .map(|h| Digest::from_hex(&h))
            .transpose()
            .map_err(internal)?,
        leaf_count: leaf_count as u64,
        issuer,
        issued_at: parse_time(&issued_at)?,
    })
}

const ROOT_RECORD_COLUMNS: &str =
    "sequence, batch_id, root_hex, prev_root_hex, leaf_count, issuer, issued_at";

/// Append a new root record linked to the latest one, together with its leaves and
/// its `RootPublished` event.
///
/// Callers must hold the publish lock. The first statement is the insert itself, so the
/// transaction takes SQLite's write lock up front (waiting on the busy timeout) instead of
/// upgrading a read lock, which SQLite refuses with `SQLITE_BUSY` under contention.
pub async fn append_root_record(
    db: &Db,
    root: Digest,
    leaves: &[Digest],
    issuer: &str,
) -> Result<RootRecord, ApiError> {
    let mut tx = db.begin().await.map_err(internal)?;

    let batch_id = Uuid::new_v4();
    let issued_at = Utc::now();

    let row = sqlx::query(
        r#"INSERT INTO root_records (sequence, batch_id, root_hex, prev_root_hex, leaf_count, issuer, issued_at)
           SELECT COALESCE(MAX(sequence), 0) + 1,
                  ?, ?,
                  (SELECT root_hex FROM root_records ORDER BY sequence DESC LIMIT 1),
                  ?, ?, ?
           FROM root_records
           RETURNING sequence, prev_root_hex"#,
    )
    .bind(batch_id.to_string())
    .bind(root.to_hex())
    .bind(leaves.len() as i64)
    .bind(issuer)
    .bind(issued_at.to_rfc3339())
    .fetch_one(&mut *tx)
    .await
    .map_err(internal)?;

    let sequence: i64 = row.get(0);
    let prev_root_hex: Option<String> = row.get(1);

    let record = RootRecord {
        sequence: sequence as u64,
        batch_id,
        root,
        prev_root: prev_root_hex
            .map(|h| Digest::from_hex(&h))
            .transpose()
            .map_err(internal)?,
        leaf_count: leaves.len() as u64,
        issuer: issuer.to_string(),
        issued_at,
    };

    for (leaf_index, leaf) in leaves.iter().enumerate() {
        sqlx::query(r#"INSERT INTO batch_leaves (sequence, leaf_index, leaf_hex) VALUES (?, ?, ?)"#)
            .bind(sequence)
            .bind(leaf_index as i64)
            .bind(leaf.to_hex())
            .execute(&mut *tx)
            .await
            .map_err(internal)?;
    }

    insert_event(
        &mut *tx,
        EventKind::RootPublished,
        issuer,
        json!({
            "sequence": record.sequence,
            "root": record.root,
            "prev_root": record.prev_root,
            "leaf_count": record.leaf_count,
        }),
    )
    .await?;

    tx.commit().await.map_err(internal)?;
    Ok(record)
}

pub async fn get_root_record(db: &Db, sequence: u64) -> Result<Option<RootRecord>, ApiError> {
    let row = sqlx::query(&format!("SELECT {ROOT_RECORD_COLUMNS} FROM root_records WHERE sequence = ?"))
        .bind(sequence as i64)
        .fetch_optional(db)
        .await
        .map_err(internal)?;

    row.as_ref().map(root_record_from_row).transpose()
}

pub async fn current_root_record(db: &Db) -> Result<Option<RootRecord>, ApiError> {
    let row = sqlx::query(&format!(
        "SELECT {ROOT_RECORD_COLUMNS} FROM root_records ORDER BY sequence DESC LIMIT 1"
    ))
    .fetch_optional(db)
    .await
    .map_err(internal)?;

    row.as_ref().map(root_record_from_row).transpose()
}

/// Earliest sequence that published `root`, if any.
pub async fn find_root_sequence(db: &Db, root: &Digest) -> Result<Option<u64>, ApiError> {
    let row = sqlx::query(r#"SELECT MIN(sequence) AS s FROM root_records WHERE root_hex = ?"#)
        .bind(root.to_hex())
        .fetch_one(db)
        .await
        .map_err(internal)?;
    let s: Option<i64> = row.get("s");
    Ok(s.map(|s| s as u64))
}

pub async fn count_root_records(db: &Db) -> Result<u64, ApiError> {
    let row = sqlx::query(r#"SELECT COUNT(*) AS c FROM root_records"#)
        .fetch_one(db)
        .await
        .map_err(internal)?;
    let c: i64 = row.get("c");
    Ok(c as u64)
}

pub async fn list_root_records(db: &Db, offset: u64, limit: u64) -> Result<Vec<RootRecord>, ApiError> {
    let rows = sqlx::query(&format!(
        "SELECT {ROOT_RECORD_COLUMNS} FROM root_records ORDER BY sequence LIMIT ? OFFSET ?"
    ))
    .bind(limit as i64)
    .bind(offset as i64)
    .fetch_all(db)
    .await
    .map_err(internal)?;

    rows.iter().map(root_record_from_row).collect()
}

pub async fn list_all_root_records(db: &Db) -> Result<Vec<RootRecord>, ApiError> {
    let rows = sqlx::query(&format!("SELECT {ROOT_RECORD_COLUMNS} FROM root_records ORDER BY sequence"))
        .fetch_all(db)
        .await
        .map_err(internal)?;

    rows.iter().map(root_record_from_row).collect()
}

/// Leaves of a published batch in commitment order.
pub async fn get_batch_leaves(db: &Db, sequence: u64) -> Result<Vec<Digest>, ApiError> {
    let rows = sqlx::query(r#"SELECT leaf_hex FROM batch_leaves WHERE sequence = ? ORDER BY leaf_index"#)
        .bind(sequence as i64)
        .fetch_all(db)
        .await
        .map_err(internal)?;

    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        let leaf_hex: String = row.get(0);
        out.push(Digest::from_hex(&leaf_hex).map_err(internal)?);
    }
    Ok(out)
}

pub async fn insert_member(
    db: &Db,
    api_key: &str,
    role: Role,
    label: &str,
    created_at: DateTime<Utc>,
) -> Result<(), ApiError> {
    let res = sqlx::query(
        r#"INSERT OR IGNORE INTO members (api_key, role, label, created_at) VALUES (?, ?, ?, ?)"#,
    )
    .bind(api_key)
    .bind(role.as_str())
    .bind(label)
    .bind(created_at.to_rfc3339())
    .execute(db)
    .await
    .map_err(internal)?;

    if res.rows_affected() == 0 {
        return Err(ApiError::Conflict("api key already registered".to_string()));
    }
    Ok(())
}

pub async fn find_member(db: &Db, api_key: &str) -> Result<Option<Caller>, ApiError> {
    let row = sqlx::query(r#"SELECT role, label FROM members WHERE api_key = ?"#)
        .bind(api_key)
        .fetch_optional(db)
        .await
        .map_err(internal)?;

    let Some(row) = row else { return Ok(None); };

    let role: String = row.get(0);
    let label: String = row.get(1);
    let role = Role::parse(&role).ok_or_else(|| internal(format!("unknown stored role '{role}'")))?;

    Ok(Some(Caller { role, label }))
}

/// Remove a member and return who it was. `None` when no member had that key, including
/// when a concurrent revoke removed it first.
pub async fn delete_member(db: &Db, api_key: &str) -> Result<Option<Caller>, ApiError> {
    let row = sqlx::query(r#"DELETE FROM members WHERE api_key = ? RETURNING role, label"#)
        .bind(api_key)
        .fetch_optional(db)
        .await
        .map_err(internal)?;

    let Some(row) = row else { return Ok(None); };

    let role: String = row.get(0);
    let label: String = row.get(1);
    let role = Role::parse(&role).ok_or_else(|| internal(format!("unknown stored role '{role}'")))?;

    Ok(Some(Caller { role, label }))
}

/// Append to the event log, either directly on the pool or inside a caller's transaction.
pub async fn insert_event<'e, E>(
    executor: E,
    kind: EventKind,
    actor: &str,
    detail: serde_json::Value,
) -> Result<(), ApiError>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(r#"INSERT INTO events (created_at, kind, actor, detail_json) VALUES (?, ?, ?, ?)"#)
        .bind(Utc::now().to_rfc3339())
        .bind(kind.as_str())
        .bind(actor)
        .bind(detail.to_string())
        .execute(executor)
        .await
        .map_err(internal)?;
    Ok(())
}

pub async fn list_events(db: &Db, offset: u64, limit: u64) -> Result<Vec<EventItem>, ApiError> {
    let rows = sqlx::query(
        r#"SELECT id, created_at, kind, actor, detail_json
           FROM events
           ORDER BY id
           LIMIT ? OFFSET ?"#,
    )
    .bind(limit as i64)
    .bind(offset as i64)
    .fetch_all(db)
    .await
    .map_err(internal)?;

    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        let id: i64 = row.get(0);
        let created_at: String = row.get(1);
        let kind: String = row.get(2);
        let actor: String = row.get(3);
        let detail_json: String = row.get(4);

        out.push(EventItem {
            id: id as u64,
            created_at: parse_time(&created_at)?,
            kind: EventKind::parse(&kind).ok_or_else(|| internal(format!("unknown event kind '{kind}'")))?,
            actor,
            detail: serde_json::from_str(&detail_json).map_err(internal)?,
        });
    }

    Ok(out)
}
