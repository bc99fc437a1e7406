use chrono::{Datelike, NaiveDate};
use rusqlite::{params, Row};

use crate::db::models::{Budget, BudgetUsage, Investment, Loan, Task, Transaction};
use crate::db::repos::{date_col, opt_date_col};
use crate::db::DbPool;
use crate::error::AppError;

fn row_to_budget(row: &Row) -> rusqlite::Result<Budget> {
    Ok(Budget {
        id: row.get("id")?,
        user_id: row.get("user_id")?,
        category_id: row.get("category_id")?,
        name: row.get("name")?,
        amount: row.get("amount")?,
        active: row.get::<_, i32>("active")? != 0,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn row_to_loan(row: &Row) -> rusqlite::Result<Loan> {
    Ok(Loan {
        id: row.get("id")?,
        user_id: row.get("user_id")?,
        concept: row.get("concept")?,
        principal: row.get("principal")?,
        installment_amount: row.get("installment_amount")?,
        next_installment_date: opt_date_col(row, "next_installment_date")?,
        active: row.get::<_, i32>("active")? != 0,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn row_to_investment(row: &Row) -> rusqlite::Result<Investment> {
    Ok(Investment {
        id: row.get("id")?,
        user_id: row.get("user_id")?,
        concept: row.get("concept")?,
        amount: row.get("amount")?,
        maturity_date: opt_date_col(row, "maturity_date")?,
        active: row.get::<_, i32>("active")? != 0,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn row_to_task(row: &Row) -> rusqlite::Result<Task> {
    Ok(Task {
        id: row.get("id")?,
        user_id: row.get("user_id")?,
        title: row.get("title")?,
        due_date: opt_date_col(row, "due_date")?,
        completed: row.get::<_, i32>("completed")? != 0,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn row_to_transaction(row: &Row) -> rusqlite::Result<Transaction> {
    Ok(Transaction {
        id: row.get("id")?,
        user_id: row.get("user_id")?,
        category_id: row.get("category_id")?,
        amount: row.get("amount")?,
        description: row.get("description")?,
        occurred_on: date_col(row, "occurred_on")?,
        created_at: row.get("created_at")?,
    })
}

/// Active budgets for a user joined with spend for the calendar month of `today`.
pub fn get_budget_usage(
    pool: &DbPool,
    user_id: &str,
    today: NaiveDate,
) -> Result<Vec<BudgetUsage>, AppError> {
    let month_start = today.with_day(1).unwrap_or(today).format("%Y-%m-%d").to_string();
    let today_s = today.format("%Y-%m-%d").to_string();

    let conn = pool.get()?;
    let mut stmt = conn.prepare(
        "SELECT * FROM budgets WHERE user_id = ?1 AND active = 1 ORDER BY name ASC",
    )?;
    let rows = stmt.query_map(params![user_id], row_to_budget)?;
    let budgets = rows.collect::<Result<Vec<_>, _>>().map_err(AppError::Database)?;

    let mut out = Vec::with_capacity(budgets.len());
    for budget in budgets {
        let spent: f64 = conn.query_row(
            "SELECT COALESCE(SUM(amount), 0) FROM transactions
             WHERE user_id = ?1 AND category_id = ?2
               AND occurred_on >= ?3 AND occurred_on <= ?4",
            params![user_id, budget.category_id, month_start, today_s],
            |row| row.get(0),
        )?;
        out.push(BudgetUsage { budget, spent });
    }
    Ok(out)
}

pub fn get_active_loans(pool: &DbPool, user_id: &str) -> Result<Vec<Loan>, AppError> {
    let conn = pool.get()?;
    let mut stmt = conn.prepare(
        "SELECT * FROM loans WHERE user_id = ?1 AND active = 1
         ORDER BY next_installment_date ASC",
    )?;
    let rows = stmt.query_map(params![user_id], row_to_loan)?;
    let loans = rows.collect::<Result<Vec<_>, _>>().map_err(AppError::Database)?;
    Ok(loans)
}

pub fn get_active_investments(pool: &DbPool, user_id: &str) -> Result<Vec<Investment>, AppError> {
    let conn = pool.get()?;
    let mut stmt = conn.prepare(
        "SELECT * FROM investments WHERE user_id = ?1 AND active = 1
         ORDER BY maturity_date ASC",
    )?;
    let rows = stmt.query_map(params![user_id], row_to_investment)?;
    let investments = rows.collect::<Result<Vec<_>, _>>().map_err(AppError::Database)?;
    Ok(investments)
}

pub fn get_open_tasks(pool: &DbPool, user_id: &str) -> Result<Vec<Task>, AppError> {
    let conn = pool.get()?;
    let mut stmt = conn.prepare(
        "SELECT * FROM tasks WHERE user_id = ?1 AND completed = 0 ORDER BY due_date ASC",
    )?;
    let rows = stmt.query_map(params![user_id], row_to_task)?;
    let tasks = rows.collect::<Result<Vec<_>, _>>().map_err(AppError::Database)?;
    Ok(tasks)
}

/// Transactions for a user from `since` (inclusive) up to `today`, oldest first.
pub fn get_transactions_since(
    pool: &DbPool,
    user_id: &str,
    since: NaiveDate,
    today: NaiveDate,
) -> Result<Vec<Transaction>, AppError> {
    let conn = pool.get()?;
    let mut stmt = conn.prepare(
        "SELECT * FROM transactions
         WHERE user_id = ?1 AND occurred_on >= ?2 AND occurred_on <= ?3
         ORDER BY occurred_on ASC, created_at ASC",
    )?;
    let rows = stmt.query_map(
        params![
            user_id,
            since.format("%Y-%m-%d").to_string(),
            today.format("%Y-%m-%d").to_string()
        ],
        row_to_transaction,
    )?;
    let txns = rows.collect::<Result<Vec<_>, _>>().map_err(AppError::Database)?;
    Ok(txns)
}

/// Users with any transaction within the trailing activity window. Bounds the
/// cost of a full scheduler pass on large user bases.
pub fn get_active_user_ids(
    pool: &DbPool,
    since: NaiveDate,
) -> Result<Vec<String>, AppError> {
    let conn = pool.get()?;
    let mut stmt = conn.prepare(
        "SELECT DISTINCT user_id FROM transactions WHERE occurred_on >= ?1 ORDER BY user_id",
    )?;
    let rows = stmt.query_map(params![since.format("%Y-%m-%d").to_string()], |row| {
        row.get::<_, String>(0)
    })?;
    let ids = rows.collect::<Result<Vec<_>, _>>().map_err(AppError::Database)?;
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_test_db;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn seed(pool: &DbPool) {
        let conn = pool.get().unwrap();
        conn.execute_batch(
            "INSERT INTO users (id, name) VALUES ('u1', 'A'), ('u2', 'B');
             INSERT INTO categories (id, user_id, name) VALUES ('c1', 'u1', 'Groceries');
             INSERT INTO budgets (id, user_id, category_id, name, amount, active, created_at, updated_at)
             VALUES ('b1', 'u1', 'c1', 'Groceries', 400.0, 1, '', '');
             INSERT INTO transactions (id, user_id, category_id, amount, occurred_on, created_at) VALUES
               ('t1', 'u1', 'c1', 120.0, '2026-08-03', ''),
               ('t2', 'u1', 'c1', 95.5,  '2026-08-15', ''),
               ('t3', 'u1', 'c1', 50.0,  '2026-07-28', ''),
               ('t4', 'u2', NULL, 10.0,  '2026-06-01', '');",
        )
        .unwrap();
    }

    #[test]
    fn test_budget_usage_sums_current_month_only() {
        let pool = init_test_db().unwrap();
        seed(&pool);
        let usage = get_budget_usage(&pool, "u1", d("2026-08-20")).unwrap();
        assert_eq!(usage.len(), 1);
        // July transaction excluded.
        assert_eq!(usage[0].spent, 215.5);
    }

    #[test]
    fn test_active_users_respects_window() {
        let pool = init_test_db().unwrap();
        seed(&pool);
        let active = get_active_user_ids(&pool, d("2026-08-13")).unwrap();
        assert_eq!(active, vec!["u1".to_string()]);
        let all = get_active_user_ids(&pool, d("2026-01-01")).unwrap();
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn test_transactions_since_window() {
        let pool = init_test_db().unwrap();
        seed(&pool);
        let txns = get_transactions_since(&pool, "u1", d("2026-08-01"), d("2026-08-31")).unwrap();
        assert_eq!(txns.len(), 2);
        assert_eq!(txns[0].id, "t1");
    }
}
