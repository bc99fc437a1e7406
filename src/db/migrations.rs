use rusqlite::Connection;

use crate::error::AppError;

/// Run the consolidated schema migration. Idempotent.
pub fn run(conn: &Connection) -> Result<(), AppError> {
    tracing::debug!("Running database migrations");

    conn.execute_batch(SCHEMA)?;

    tracing::info!("Database migrations complete");
    Ok(())
}

const SCHEMA: &str = r#"

-- ============================================================================
-- Users (must precede everything due to FK)
-- ============================================================================

CREATE TABLE IF NOT EXISTS users (
    id          TEXT PRIMARY KEY,
    name        TEXT NOT NULL,
    created_at  TEXT NOT NULL DEFAULT (datetime('now'))
);

-- ============================================================================
-- Categories
-- ============================================================================

CREATE TABLE IF NOT EXISTS categories (
    id          TEXT PRIMARY KEY,
    user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    name        TEXT NOT NULL,
    created_at  TEXT NOT NULL DEFAULT (datetime('now'))
);
CREATE INDEX IF NOT EXISTS idx_categories_user ON categories(user_id);

-- ============================================================================
-- Transactions
-- ============================================================================

CREATE TABLE IF NOT EXISTS transactions (
    id          TEXT PRIMARY KEY,
    user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    category_id TEXT REFERENCES categories(id) ON DELETE SET NULL,
    amount      REAL NOT NULL,
    description TEXT,
    occurred_on TEXT NOT NULL,
    created_at  TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_transactions_user_date ON transactions(user_id, occurred_on);
CREATE INDEX IF NOT EXISTS idx_transactions_category  ON transactions(category_id);

-- ============================================================================
-- Budgets (monthly spending limits per category)
-- ============================================================================

CREATE TABLE IF NOT EXISTS budgets (
    id          TEXT PRIMARY KEY,
    user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    category_id TEXT NOT NULL REFERENCES categories(id) ON DELETE CASCADE,
    name        TEXT NOT NULL,
    amount      REAL NOT NULL,
    active      INTEGER NOT NULL DEFAULT 1,
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_budgets_user ON budgets(user_id, active);

-- ============================================================================
-- Loans
-- ============================================================================

CREATE TABLE IF NOT EXISTS loans (
    id                    TEXT PRIMARY KEY,
    user_id               TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    concept               TEXT NOT NULL,
    principal             REAL NOT NULL,
    installment_amount    REAL NOT NULL,
    next_installment_date TEXT,
    active                INTEGER NOT NULL DEFAULT 1,
    created_at            TEXT NOT NULL,
    updated_at            TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_loans_user ON loans(user_id, active);

-- ============================================================================
-- Investments
-- ============================================================================

CREATE TABLE IF NOT EXISTS investments (
    id            TEXT PRIMARY KEY,
    user_id       TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    concept       TEXT NOT NULL,
    amount        REAL NOT NULL,
    maturity_date TEXT,
    active        INTEGER NOT NULL DEFAULT 1,
    created_at    TEXT NOT NULL,
    updated_at    TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_investments_user ON investments(user_id, active);

-- ============================================================================
-- Recurring obligations + linked payments
-- ============================================================================

CREATE TABLE IF NOT EXISTS recurring_obligations (
    id               TEXT PRIMARY KEY,
    user_id          TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    concept          TEXT NOT NULL,
    amount           REAL NOT NULL,
    periodicity      TEXT NOT NULL DEFAULT 'monthly',
    category_id      TEXT REFERENCES categories(id) ON DELETE SET NULL,
    day_of_payment   INTEGER NOT NULL CHECK (day_of_payment BETWEEN 1 AND 28),
    next_due_date    TEXT NOT NULL,
    active           INTEGER NOT NULL DEFAULT 1,
    cached_status    TEXT,
    cached_status_at TEXT,
    created_at       TEXT NOT NULL,
    updated_at       TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_obligations_user ON recurring_obligations(user_id, active);
CREATE INDEX IF NOT EXISTS idx_obligations_due  ON recurring_obligations(next_due_date);

CREATE TABLE IF NOT EXISTS obligation_payments (
    id            TEXT PRIMARY KEY,
    obligation_id TEXT NOT NULL REFERENCES recurring_obligations(id) ON DELETE CASCADE,
    amount        REAL NOT NULL,
    paid_on       TEXT NOT NULL,
    created_at    TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_obligation_payments ON obligation_payments(obligation_id, paid_on);

-- ============================================================================
-- Tasks
-- ============================================================================

CREATE TABLE IF NOT EXISTS tasks (
    id          TEXT PRIMARY KEY,
    user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    title       TEXT NOT NULL,
    due_date    TEXT,
    completed   INTEGER NOT NULL DEFAULT 0,
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_tasks_user ON tasks(user_id, completed);

-- ============================================================================
-- Alerts
-- ============================================================================

CREATE TABLE IF NOT EXISTS alerts (
    id          TEXT PRIMARY KEY,
    user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    alert_type  TEXT NOT NULL,
    priority    TEXT NOT NULL,
    title       TEXT NOT NULL,
    message     TEXT NOT NULL,
    read        INTEGER NOT NULL DEFAULT 0,
    actioned    INTEGER NOT NULL DEFAULT 0,
    metadata    TEXT,
    target_kind TEXT,
    target_id   TEXT,
    created_at  TEXT NOT NULL,
    expires_at  TEXT
);
CREATE INDEX IF NOT EXISTS idx_alerts_user  ON alerts(user_id, read);
CREATE INDEX IF NOT EXISTS idx_alerts_dedup ON alerts(user_id, alert_type, target_kind, target_id);
"#;
