use chrono::{DateTime, Utc};
use rusqlite::{params, Row, TransactionBehavior};

use crate::db::models::{Alert, AlertType, Priority, TargetRef};
use crate::db::DbPool;
use crate::engine::evaluators::Candidate;
use crate::error::AppError;

fn row_to_alert(row: &Row) -> rusqlite::Result<Alert> {
    let alert_type: String = row.get("alert_type")?;
    let priority: String = row.get("priority")?;
    let metadata: Option<String> = row.get("metadata")?;
    Ok(Alert {
        id: row.get("id")?,
        user_id: row.get("user_id")?,
        alert_type: AlertType::parse(&alert_type).map_err(|_| {
            rusqlite::Error::InvalidColumnType(0, "alert_type".into(), rusqlite::types::Type::Text)
        })?,
        priority: Priority::parse(&priority).map_err(|_| {
            rusqlite::Error::InvalidColumnType(0, "priority".into(), rusqlite::types::Type::Text)
        })?,
        title: row.get("title")?,
        message: row.get("message")?,
        read: row.get::<_, i32>("read")? != 0,
        actioned: row.get::<_, i32>("actioned")? != 0,
        metadata: metadata.and_then(|m| serde_json::from_str(&m).ok()),
        target: TargetRef::from_columns(row.get("target_kind")?, row.get("target_id")?),
        created_at: row.get("created_at")?,
        expires_at: row.get("expires_at")?,
    })
}

/// SQL fragment selecting alerts still active per the dedup invariant:
/// not expired, and not both read and actioned.
const ACTIVE_PREDICATE: &str =
    "(expires_at IS NULL OR expires_at > ?1) AND NOT (read = 1 AND actioned = 1)";

/// Does an active alert exist for the `(user, type, target)` dedup tuple?
fn active_exists(
    conn: &rusqlite::Connection,
    user_id: &str,
    alert_type: AlertType,
    target: Option<&TargetRef>,
    now_rfc3339: &str,
) -> rusqlite::Result<bool> {
    let sql = format!(
        "SELECT 1 FROM alerts
         WHERE {ACTIVE_PREDICATE}
           AND user_id = ?2 AND alert_type = ?3
           AND ((?4 IS NULL AND target_kind IS NULL) OR target_kind = ?4)
           AND ((?5 IS NULL AND target_id IS NULL) OR target_id = ?5)
         LIMIT 1"
    );
    let mut stmt = conn.prepare(&sql)?;
    stmt.exists(params![
        now_rfc3339,
        user_id,
        alert_type.as_str(),
        target.map(|t| t.kind()),
        target.map(|t| t.id()),
    ])
}

/// Deduplicating insert: discard the candidate when an active alert already
/// exists for its `(user, type, target)` tuple, otherwise persist it unread
/// and unactioned. Returns whether a row was inserted.
///
/// The check and the insert run inside one immediate transaction, which takes
/// the write lock before the SELECT. Concurrent submits for the same tuple
/// serialize at the lock instead of both passing the check; the dedup
/// invariant holds even when evaluation passes overlap.
pub fn submit(
    pool: &DbPool,
    user_id: &str,
    candidate: &Candidate,
    now: DateTime<Utc>,
) -> Result<bool, AppError> {
    let now_s = now.to_rfc3339();
    let metadata = candidate
        .metadata
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;

    let mut conn = pool.get()?;
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    if active_exists(&tx, user_id, candidate.alert_type, candidate.target.as_ref(), &now_s)? {
        tracing::debug!(
            user_id,
            alert_type = candidate.alert_type.as_str(),
            "Duplicate candidate discarded"
        );
        return Ok(false);
    }

    let id = uuid::Uuid::new_v4().to_string();
    tx.execute(
        "INSERT INTO alerts
         (id, user_id, alert_type, priority, title, message, read, actioned,
          metadata, target_kind, target_id, created_at, expires_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, 0, ?7, ?8, ?9, ?10, ?11)",
        params![
            id,
            user_id,
            candidate.alert_type.as_str(),
            candidate.priority.as_str(),
            candidate.title,
            candidate.message,
            metadata,
            candidate.target.as_ref().map(|t| t.kind()),
            candidate.target.as_ref().map(|t| t.id()),
            now_s,
            candidate.expires_at,
        ],
    )?;
    tx.commit()?;
    Ok(true)
}

/// Alerts for one user, active first, then priority and recency.
pub fn get_for_user(pool: &DbPool, user_id: &str) -> Result<Vec<Alert>, AppError> {
    let conn = pool.get()?;
    let mut stmt = conn.prepare(
        "SELECT * FROM alerts WHERE user_id = ?1
         ORDER BY (read = 1 AND actioned = 1) ASC,
                  CASE priority
                    WHEN 'CRITICAL' THEN 0
                    WHEN 'HIGH' THEN 1
                    WHEN 'MEDIUM' THEN 2
                    ELSE 3
                  END ASC,
                  created_at DESC",
    )?;
    let rows = stmt.query_map(params![user_id], row_to_alert)?;
    let alerts = rows.collect::<Result<Vec<_>, _>>().map_err(AppError::Database)?;
    Ok(alerts)
}

pub fn get_by_id(pool: &DbPool, id: &str) -> Result<Alert, AppError> {
    let conn = pool.get()?;
    conn.query_row("SELECT * FROM alerts WHERE id = ?1", params![id], row_to_alert)
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => AppError::NotFound(format!("Alert {id}")),
            other => AppError::Database(other),
        })
}

pub fn mark_read(pool: &DbPool, id: &str) -> Result<Alert, AppError> {
    let conn = pool.get()?;
    let rows = conn.execute("UPDATE alerts SET read = 1 WHERE id = ?1", params![id])?;
    if rows == 0 {
        return Err(AppError::NotFound(format!("Alert {id}")));
    }
    drop(conn);
    get_by_id(pool, id)
}

pub fn mark_actioned(pool: &DbPool, id: &str) -> Result<Alert, AppError> {
    let conn = pool.get()?;
    let rows = conn.execute("UPDATE alerts SET actioned = 1 WHERE id = ?1", params![id])?;
    if rows == 0 {
        return Err(AppError::NotFound(format!("Alert {id}")));
    }
    drop(conn);
    get_by_id(pool, id)
}

pub fn delete(pool: &DbPool, id: &str) -> Result<bool, AppError> {
    let conn = pool.get()?;
    let rows = conn.execute("DELETE FROM alerts WHERE id = ?1", params![id])?;
    Ok(rows > 0)
}

/// Bulk admin clear. With a user id, clears that user's alerts only.
pub fn clear(pool: &DbPool, user_id: Option<&str>) -> Result<usize, AppError> {
    let conn = pool.get()?;
    let rows = match user_id {
        Some(uid) => conn.execute("DELETE FROM alerts WHERE user_id = ?1", params![uid])?,
        None => conn.execute("DELETE FROM alerts", [])?,
    };
    Ok(rows)
}
