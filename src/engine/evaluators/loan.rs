use serde_json::json;

use crate::config::LoanEvaluatorConfig;
use crate::db::models::{AlertType, Priority, TargetRef};
use crate::error::AppError;

use super::{Candidate, EvalOutput, Evaluator, UserSnapshot};

/// Flags loans whose next installment falls within the lookahead window.
pub struct LoanEvaluator {
    cfg: LoanEvaluatorConfig,
}

impl LoanEvaluator {
    pub fn new(cfg: LoanEvaluatorConfig) -> Self {
        Self { cfg }
    }
}

impl Evaluator for LoanEvaluator {
    fn name(&self) -> &'static str {
        "loan"
    }

    fn evaluate(&self, snapshot: &UserSnapshot) -> Result<EvalOutput, AppError> {
        let mut candidates = Vec::new();

        for loan in &snapshot.loans {
            let Some(due) = loan.next_installment_date else {
                continue;
            };
            let days_until = (due - snapshot.today).num_days();
            if days_until < 0 || days_until > self.cfg.lookahead_days {
                continue;
            }

            let priority = if days_until <= 1 {
                Priority::High
            } else {
                Priority::Medium
            };
            let when = match days_until {
                0 => "today".to_string(),
                1 => "tomorrow".to_string(),
                n => format!("in {n} days"),
            };

            candidates.push(Candidate {
                alert_type: AlertType::LoanInstallmentDue,
                priority,
                title: format!("Installment for '{}' due {when}", loan.concept),
                message: format!(
                    "The next installment of {:.2} for '{}' is due {when}",
                    loan.installment_amount, loan.concept
                ),
                target: Some(TargetRef::Loan(loan.id.clone())),
                metadata: Some(json!({
                    "due_in_days": days_until,
                    "installment_amount": loan.installment_amount,
                    "due_date": due.format("%Y-%m-%d").to_string(),
                })),
                expires_at: None,
            });
        }

        Ok(EvalOutput::from_candidates(candidates))
    }
}
