use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ============================================================================
// Financial read model (the alert engine never writes these)
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Budget {
    pub id: String,
    pub user_id: String,
    pub category_id: String,
    pub name: String,
    pub amount: f64,
    pub active: bool,
    pub created_at: String,
    pub updated_at: String,
}

/// A budget joined with its spend for the current calendar month.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetUsage {
    pub budget: Budget,
    pub spent: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Loan {
    pub id: String,
    pub user_id: String,
    pub concept: String,
    pub principal: f64,
    pub installment_amount: f64,
    pub next_installment_date: Option<NaiveDate>,
    pub active: bool,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Investment {
    pub id: String,
    pub user_id: String,
    pub concept: String,
    pub amount: f64,
    pub maturity_date: Option<NaiveDate>,
    pub active: bool,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub due_date: Option<NaiveDate>,
    pub completed: bool,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    pub user_id: String,
    pub category_id: Option<String>,
    pub amount: f64,
    pub description: Option<String>,
    pub occurred_on: NaiveDate,
    pub created_at: String,
}
