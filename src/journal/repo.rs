use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use tracing::instrument;

use super::model::{ChatRunRecord, ChatStatus, ChatSummary, ChunkRecord, RunRecord, RunStatus};
use crate::error::Result;
use crate::model::CutoffPolicy;

pub type Pool = SqlitePool;

pub async fn init_pool(database_url: &str) -> Result<Pool> {
    let url = expand_home(database_url);
    let in_memory = url.starts_with("sqlite::memory");
    let mut options = SqliteConnectOptions::from_str(&url)?.create_if_missing(true);
    if !in_memory {
        options = options
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Full);
    }
    // Every connection to `sqlite::memory:` opens its own empty database.
    let max_connections = if in_memory { 1 } else { 4 };
    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await?;
    Ok(pool)
}

/// Expand a leading `~/` in a file-backed SQLite URL and make sure the parent
/// directory exists.
fn expand_home(url: &str) -> String {
    let Some(rest) = url.strip_prefix("sqlite://") else {
        return url.to_string();
    };
    let (path, query) = match rest.split_once('?') {
        Some((p, q)) => (p, Some(q)),
        None => (rest, None),
    };

    let path = match (path.strip_prefix("~/"), std::env::var("HOME")) {
        (Some(tail), Ok(home)) => format!("{}/{}", home.trim_end_matches('/'), tail),
        _ => path.to_string(),
    };
    if let Some(parent) = std::path::Path::new(&path).parent() {
        if !parent.as_os_str().is_empty() {
            let _ = std::fs::create_dir_all(parent);
        }
    }

    match query {
        Some(q) => format!("sqlite://{path}?{q}"),
        None => format!("sqlite://{path}"),
    }
}

pub async fn run_migrations(pool: &Pool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

#[instrument(skip_all)]
pub async fn start_run(pool: &Pool, policy: &CutoffPolicy, dry_run: bool) -> Result<i64> {
    let id: i64 = sqlx::query_scalar(
        "INSERT INTO runs (cutoff, skip_memes, dry_run) VALUES (?, ?, ?) RETURNING id",
    )
    .bind(policy.cutoff)
    .bind(policy.skip_memes)
    .bind(dry_run)
    .fetch_one(pool)
    .await?;
    Ok(id)
}

#[instrument(skip_all)]
pub async fn finish_run(pool: &Pool, run_id: i64, status: RunStatus) -> Result<()> {
    sqlx::query("UPDATE runs SET status = ?, finished_at = CURRENT_TIMESTAMP WHERE id = ?")
        .bind(status.as_str())
        .bind(run_id)
        .execute(pool)
        .await?;
    Ok(())
}

#[instrument(skip_all)]
pub async fn fetch_run(pool: &Pool, run_id: i64) -> Result<RunRecord> {
    let row = sqlx::query("SELECT id, cutoff, skip_memes, dry_run, status FROM runs WHERE id = ?")
        .bind(run_id)
        .fetch_one(pool)
        .await?;
    let status: String = row.try_get("status")?;
    Ok(RunRecord {
        id: row.try_get("id")?,
        cutoff: row.try_get::<DateTime<Utc>, _>("cutoff")?,
        skip_memes: row.try_get("skip_memes")?,
        dry_run: row.try_get("dry_run")?,
        status: RunStatus::parse(&status).ok_or_else(|| decode_error("runs.status", &status))?,
    })
}

#[instrument(skip_all)]
pub async fn record_chat(pool: &Pool, run_id: i64, summary: &ChatSummary) -> Result<()> {
    sqlx::query(
        "INSERT INTO chat_runs \
         (run_id, chat_id, title, eligible, skipped_by_date, skipped_by_meme, injected, status, error) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(run_id)
    .bind(summary.chat_id)
    .bind(&summary.title)
    .bind(summary.eligible as i64)
    .bind(summary.skipped_by_date as i64)
    .bind(summary.skipped_by_meme as i64)
    .bind(summary.injected as i64)
    .bind(summary.status.as_str())
    .bind(summary.error.as_deref())
    .execute(pool)
    .await?;
    Ok(())
}

#[instrument(skip_all)]
pub async fn list_chat_runs(pool: &Pool, run_id: i64) -> Result<Vec<ChatRunRecord>> {
    let rows = sqlx::query(
        "SELECT chat_id, title, eligible, injected, status, error FROM chat_runs \
         WHERE run_id = ? ORDER BY id",
    )
    .bind(run_id)
    .fetch_all(pool)
    .await?;

    rows.into_iter()
        .map(|row| -> Result<ChatRunRecord> {
            let status: String = row.try_get("status")?;
            Ok(ChatRunRecord {
                chat_id: row.try_get("chat_id")?,
                title: row.try_get("title")?,
                eligible: row.try_get("eligible")?,
                injected: row.try_get("injected")?,
                status: ChatStatus::parse(&status)
                    .ok_or_else(|| decode_error("chat_runs.status", &status))?,
                error: row.try_get("error")?,
            })
        })
        .collect()
}

#[instrument(skip_all)]
pub async fn record_chunk(
    pool: &Pool,
    run_id: i64,
    chat_id: i64,
    ids: &[i32],
    attempts: i64,
) -> Result<()> {
    let encoded = serde_json::to_string(ids)
        .map_err(|e| sqlx::Error::Protocol(format!("encode message ids: {e}")))?;
    sqlx::query(
        "INSERT INTO deleted_chunks (run_id, chat_id, message_ids, size, attempts) \
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(run_id)
    .bind(chat_id)
    .bind(encoded)
    .bind(ids.len() as i64)
    .bind(attempts)
    .execute(pool)
    .await?;
    Ok(())
}

#[instrument(skip_all)]
pub async fn list_chunks(pool: &Pool, run_id: i64) -> Result<Vec<ChunkRecord>> {
    let rows = sqlx::query(
        "SELECT chat_id, message_ids, attempts FROM deleted_chunks WHERE run_id = ? ORDER BY id",
    )
    .bind(run_id)
    .fetch_all(pool)
    .await?;

    rows.into_iter()
        .map(|row| -> Result<ChunkRecord> {
            let raw: String = row.try_get("message_ids")?;
            let message_ids: Vec<i32> =
                serde_json::from_str(&raw).map_err(|e| sqlx::Error::Decode(Box::new(e)))?;
            Ok(ChunkRecord {
                chat_id: row.try_get("chat_id")?,
                message_ids,
                attempts: row.try_get("attempts")?,
            })
        })
        .collect()
}

fn decode_error(column: &str, value: &str) -> sqlx::Error {
    sqlx::Error::Decode(format!("unknown value {value:?} in {column}").into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expand_home_leaves_memory_urls_alone() {
        assert_eq!(expand_home("sqlite::memory:"), "sqlite::memory:");
    }

    #[test]
    fn expand_home_keeps_query() {
        let td = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}/nested/j.db?mode=rwc", td.path().display());
        assert_eq!(expand_home(&url), url);
        assert!(td.path().join("nested").exists());
    }
}
