use serde_json::json;

use crate::config::InvestmentEvaluatorConfig;
use crate::db::models::{AlertType, Priority, TargetRef};
use crate::error::AppError;

use super::{Candidate, EvalOutput, Evaluator, UserSnapshot};

/// Flags investments maturing within the lookahead window.
pub struct InvestmentEvaluator {
    cfg: InvestmentEvaluatorConfig,
}

impl InvestmentEvaluator {
    pub fn new(cfg: InvestmentEvaluatorConfig) -> Self {
        Self { cfg }
    }
}

impl Evaluator for InvestmentEvaluator {
    fn name(&self) -> &'static str {
        "investment"
    }

    fn evaluate(&self, snapshot: &UserSnapshot) -> Result<EvalOutput, AppError> {
        let mut candidates = Vec::new();

        for investment in &snapshot.investments {
            let Some(maturity) = investment.maturity_date else {
                continue;
            };
            let days_until = (maturity - snapshot.today).num_days();
            if days_until < 0 || days_until > self.cfg.lookahead_days {
                continue;
            }

            candidates.push(Candidate {
                alert_type: AlertType::InvestmentMaturing,
                priority: Priority::Medium,
                title: format!("Investment '{}' matures soon", investment.concept),
                message: format!(
                    "'{}' ({:.2}) matures on {}",
                    investment.concept,
                    investment.amount,
                    maturity.format("%Y-%m-%d")
                ),
                target: Some(TargetRef::Investment(investment.id.clone())),
                metadata: Some(json!({
                    "due_in_days": days_until,
                    "amount": investment.amount,
                    "maturity_date": maturity.format("%Y-%m-%d").to_string(),
                })),
                expires_at: None,
            });
        }

        Ok(EvalOutput::from_candidates(candidates))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::Investment;
    use chrono::NaiveDate;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn investment(maturity: Option<&str>) -> Investment {
        Investment {
            id: "i1".into(),
            user_id: "u1".into(),
            concept: "12m deposit".into(),
            amount: 5000.0,
            maturity_date: maturity.map(d),
            active: true,
            created_at: String::new(),
            updated_at: String::new(),
        }
    }

    fn eval(investments: Vec<Investment>, today: &str) -> EvalOutput {
        let snapshot = UserSnapshot {
            user_id: "u1".into(),
            today: d(today),
            investments,
            ..Default::default()
        };
        InvestmentEvaluator::new(InvestmentEvaluatorConfig::default())
            .evaluate(&snapshot)
            .unwrap()
    }

    #[test]
    fn test_maturing_within_window() {
        let out = eval(vec![investment(Some("2026-08-30"))], "2026-08-24");
        assert_eq!(out.candidates.len(), 1);
        assert_eq!(out.candidates[0].alert_type, AlertType::InvestmentMaturing);
        assert_eq!(out.candidates[0].priority, Priority::Medium);
    }

    #[test]
    fn test_outside_window_or_past_is_silent() {
        assert!(eval(vec![investment(Some("2026-09-10"))], "2026-08-24")
            .candidates
            .is_empty());
        assert!(eval(vec![investment(Some("2026-08-20"))], "2026-08-24")
            .candidates
            .is_empty());
    }
}
