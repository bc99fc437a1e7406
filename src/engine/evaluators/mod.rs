//! Domain-specific alert rules.
//!
//! Every evaluator is a pure function of a [`UserSnapshot`]: it performs no
//! I/O and yields zero or more [`Candidate`] alerts. The orchestrator loads
//! the snapshot, runs each evaluator in isolation, and feeds candidates to
//! the deduplicating store.

mod anomaly;
mod budget;
mod investment;
mod loan;
mod obligation;
mod task;

pub use anomaly::AnomalyEvaluator;
pub use budget::BudgetEvaluator;
pub use investment::InvestmentEvaluator;
pub use loan::LoanEvaluator;
pub use obligation::ObligationEvaluator;
pub use task::TaskEvaluator;

use chrono::NaiveDate;
use serde::Serialize;

use crate::config::EvaluatorsConfig;
use crate::db::models::{
    AlertType, BudgetUsage, Investment, Loan, ObligationWithPayments, Priority, TargetRef, Task,
    Transaction,
};
use crate::error::AppError;

/// A proposed alert, before deduplication.
#[derive(Debug, Clone, Serialize)]
pub struct Candidate {
    pub alert_type: AlertType,
    pub priority: Priority,
    pub title: String,
    pub message: String,
    pub target: Option<TargetRef>,
    pub metadata: Option<serde_json::Value>,
    pub expires_at: Option<String>,
}

/// Read-only view of one user's financial data at evaluation time.
#[derive(Debug, Clone, Default)]
pub struct UserSnapshot {
    pub user_id: String,
    pub today: NaiveDate,
    pub budgets: Vec<BudgetUsage>,
    pub loans: Vec<Loan>,
    pub investments: Vec<Investment>,
    pub obligations: Vec<ObligationWithPayments>,
    pub tasks: Vec<Task>,
    /// Trailing transaction history for the anomaly window, oldest first.
    pub transactions: Vec<Transaction>,
}

/// What one evaluator produced for one user.
#[derive(Debug, Clone, Default)]
pub struct EvalOutput {
    pub candidates: Vec<Candidate>,
    /// Records excluded for malformed data (e.g. non-positive obligation
    /// amounts). Reported in run statistics, never silently dropped.
    pub skipped_invalid: usize,
}

impl EvalOutput {
    pub fn from_candidates(candidates: Vec<Candidate>) -> Self {
        Self {
            candidates,
            skipped_invalid: 0,
        }
    }
}

pub trait Evaluator: Send + Sync {
    /// Stable name for logs and statistics.
    fn name(&self) -> &'static str;

    fn evaluate(&self, snapshot: &UserSnapshot) -> Result<EvalOutput, AppError>;
}

/// Build the enabled evaluator set from the startup configuration. The set
/// is fixed for the process lifetime; nothing re-reads config per run.
pub fn registry(cfg: &EvaluatorsConfig) -> Vec<Box<dyn Evaluator>> {
    let mut evaluators: Vec<Box<dyn Evaluator>> = Vec::new();
    if cfg.budget.enabled {
        evaluators.push(Box::new(BudgetEvaluator));
    }
    if cfg.loan.enabled {
        evaluators.push(Box::new(LoanEvaluator::new(cfg.loan.clone())));
    }
    if cfg.investment.enabled {
        evaluators.push(Box::new(InvestmentEvaluator::new(cfg.investment.clone())));
    }
    if cfg.obligation.enabled {
        evaluators.push(Box::new(ObligationEvaluator));
    }
    if cfg.task.enabled {
        evaluators.push(Box::new(TaskEvaluator));
    }
    if cfg.anomaly.enabled {
        evaluators.push(Box::new(AnomalyEvaluator::new(cfg.anomaly.clone())));
    }
    evaluators
}
