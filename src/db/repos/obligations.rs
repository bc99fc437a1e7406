use rusqlite::{params, Row};

use crate::db::models::{
    ObligationPayment, ObligationStatus, ObligationWithPayments, Periodicity,
    RecurringObligation,
};
use crate::db::repos::date_col;
use crate::db::DbPool;
use crate::error::AppError;

fn row_to_obligation(row: &Row) -> rusqlite::Result<RecurringObligation> {
    let periodicity: String = row.get("periodicity")?;
    let cached: Option<String> = row.get("cached_status")?;
    Ok(RecurringObligation {
        id: row.get("id")?,
        user_id: row.get("user_id")?,
        concept: row.get("concept")?,
        amount: row.get("amount")?,
        periodicity: Periodicity::parse(&periodicity).map_err(|_| {
            rusqlite::Error::InvalidColumnType(0, "periodicity".into(), rusqlite::types::Type::Text)
        })?,
        category_id: row.get("category_id")?,
        day_of_payment: row.get::<_, i64>("day_of_payment")? as u8,
        next_due_date: date_col(row, "next_due_date")?,
        active: row.get::<_, i32>("active")? != 0,
        cached_status: cached.and_then(|s| match s.as_str() {
            "SCHEDULED" => Some(ObligationStatus::Scheduled),
            "UPCOMING" => Some(ObligationStatus::Upcoming),
            "PENDING" => Some(ObligationStatus::Pending),
            "PARTIALLY_PAID" => Some(ObligationStatus::PartiallyPaid),
            "PAID" => Some(ObligationStatus::Paid),
            _ => None,
        }),
        cached_status_at: row.get("cached_status_at")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn row_to_payment(row: &Row) -> rusqlite::Result<ObligationPayment> {
    Ok(ObligationPayment {
        id: row.get("id")?,
        obligation_id: row.get("obligation_id")?,
        amount: row.get("amount")?,
        paid_on: date_col(row, "paid_on")?,
        created_at: row.get("created_at")?,
    })
}

pub fn get_payments(pool: &DbPool, obligation_id: &str) -> Result<Vec<ObligationPayment>, AppError> {
    let conn = pool.get()?;
    let mut stmt = conn.prepare(
        "SELECT * FROM obligation_payments WHERE obligation_id = ?1 ORDER BY paid_on ASC",
    )?;
    let rows = stmt.query_map(params![obligation_id], row_to_payment)?;
    let payments = rows.collect::<Result<Vec<_>, _>>().map_err(AppError::Database)?;
    Ok(payments)
}

fn with_payments(
    pool: &DbPool,
    obligations: Vec<RecurringObligation>,
) -> Result<Vec<ObligationWithPayments>, AppError> {
    let mut out = Vec::with_capacity(obligations.len());
    for obligation in obligations {
        let payments = get_payments(pool, &obligation.id)?;
        out.push(ObligationWithPayments { obligation, payments });
    }
    Ok(out)
}

/// Active obligations for one user, each with its linked payments.
pub fn get_active_for_user(
    pool: &DbPool,
    user_id: &str,
) -> Result<Vec<ObligationWithPayments>, AppError> {
    let obligations = {
        let conn = pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT * FROM recurring_obligations
             WHERE user_id = ?1 AND active = 1
             ORDER BY next_due_date ASC",
        )?;
        let rows = stmt.query_map(params![user_id], row_to_obligation)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(AppError::Database)?
    };
    with_payments(pool, obligations)
}

/// All active obligations across users, for the daily cache refresh batch.
pub fn get_all_active(pool: &DbPool) -> Result<Vec<ObligationWithPayments>, AppError> {
    let obligations = {
        let conn = pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT * FROM recurring_obligations WHERE active = 1 ORDER BY next_due_date ASC",
        )?;
        let rows = stmt.query_map([], row_to_obligation)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(AppError::Database)?
    };
    with_payments(pool, obligations)
}

/// Write the derived status into the listing cache. The cache is never
/// authoritative; readers needing correctness re-derive.
pub fn refresh_cached_status(
    pool: &DbPool,
    obligation_id: &str,
    status: ObligationStatus,
) -> Result<(), AppError> {
    let now = chrono::Utc::now().to_rfc3339();
    let conn = pool.get()?;
    conn.execute(
        "UPDATE recurring_obligations
         SET cached_status = ?1, cached_status_at = ?2, updated_at = ?2
         WHERE id = ?3",
        params![status.as_str(), now, obligation_id],
    )?;
    Ok(())
}
