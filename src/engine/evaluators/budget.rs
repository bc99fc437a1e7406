use serde_json::json;

use crate::db::models::{AlertType, Priority, TargetRef};
use crate::engine::round2;
use crate::error::AppError;

use super::{Candidate, EvalOutput, Evaluator, UserSnapshot};

/// Flags budgets whose spend for the current period crosses 80%, 90% or
/// 100% of the limit. Only the highest crossed band is emitted.
pub struct BudgetEvaluator;

impl Evaluator for BudgetEvaluator {
    fn name(&self) -> &'static str {
        "budget"
    }

    fn evaluate(&self, snapshot: &UserSnapshot) -> Result<EvalOutput, AppError> {
        let mut out = EvalOutput::default();

        for usage in &snapshot.budgets {
            let limit = round2(usage.budget.amount);
            if limit <= 0.0 {
                tracing::warn!(
                    budget_id = %usage.budget.id,
                    "Budget has non-positive limit, excluded from evaluation"
                );
                out.skipped_invalid += 1;
                continue;
            }
            let spent = round2(usage.spent);
            let percent = round2(spent / limit * 100.0);

            let (alert_type, priority, label) = if percent >= 100.0 {
                (AlertType::BudgetOver, Priority::Critical, "exceeded")
            } else if percent >= 90.0 {
                (AlertType::Budget90, Priority::High, "at 90% of")
            } else if percent >= 80.0 {
                (AlertType::Budget80, Priority::Medium, "at 80% of")
            } else {
                continue;
            };

            out.candidates.push(Candidate {
                alert_type,
                priority,
                title: format!("Budget '{}' {label} its limit", usage.budget.name),
                message: format!(
                    "You have spent {spent:.2} of {limit:.2} ({percent:.2}%) in '{}' this period",
                    usage.budget.name
                ),
                target: Some(TargetRef::Budget(usage.budget.id.clone())),
                metadata: Some(json!({
                    "spent": spent,
                    "limit": limit,
                    "percent": percent,
                    "category_id": usage.budget.category_id,
                })),
                expires_at: None,
            });
        }

        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{Budget, BudgetUsage};

    fn usage(limit: f64, spent: f64) -> BudgetUsage {
        BudgetUsage {
            budget: Budget {
                id: "b1".into(),
                user_id: "u1".into(),
                category_id: "c1".into(),
                name: "Groceries".into(),
                amount: limit,
                active: true,
                created_at: String::new(),
                updated_at: String::new(),
            },
            spent,
        }
    }

    fn snapshot(budgets: Vec<BudgetUsage>) -> UserSnapshot {
        UserSnapshot {
            user_id: "u1".into(),
            budgets,
            ..Default::default()
        }
    }

    #[test]
    fn test_below_threshold_is_silent() {
        let out = BudgetEvaluator.evaluate(&snapshot(vec![usage(400.0, 319.99)])).unwrap();
        assert!(out.candidates.is_empty());
    }

    #[test]
    fn test_bands() {
        let out = BudgetEvaluator.evaluate(&snapshot(vec![usage(400.0, 320.0)])).unwrap();
        assert_eq!(out.candidates[0].alert_type, AlertType::Budget80);
        assert_eq!(out.candidates[0].priority, Priority::Medium);

        let out = BudgetEvaluator.evaluate(&snapshot(vec![usage(400.0, 360.0)])).unwrap();
        assert_eq!(out.candidates[0].alert_type, AlertType::Budget90);
        assert_eq!(out.candidates[0].priority, Priority::High);

        let out = BudgetEvaluator.evaluate(&snapshot(vec![usage(400.0, 410.0)])).unwrap();
        assert_eq!(out.candidates[0].alert_type, AlertType::BudgetOver);
        assert_eq!(out.candidates[0].priority, Priority::Critical);
    }

    #[test]
    fn test_exact_hundred_is_critical_and_just_under_is_high() {
        // 100.00% exactly.
        let out = BudgetEvaluator.evaluate(&snapshot(vec![usage(400.0, 400.0)])).unwrap();
        assert_eq!(out.candidates[0].priority, Priority::Critical);

        // 99.99% lands in the 90-99 band.
        let out = BudgetEvaluator
            .evaluate(&snapshot(vec![usage(10000.0, 9999.0)]))
            .unwrap();
        assert_eq!(out.candidates[0].alert_type, AlertType::Budget90);
        assert_eq!(out.candidates[0].priority, Priority::High);
    }

    #[test]
    fn test_rounding_stabilizes_boundary() {
        // 319.9999999 rounds to 320.00, which is exactly 80%.
        let out = BudgetEvaluator
            .evaluate(&snapshot(vec![usage(400.0, 319.9999999)]))
            .unwrap();
        assert_eq!(out.candidates.len(), 1);
        assert_eq!(out.candidates[0].alert_type, AlertType::Budget80);
    }

    #[test]
    fn test_invalid_limit_skipped() {
        let out = BudgetEvaluator.evaluate(&snapshot(vec![usage(0.0, 100.0)])).unwrap();
        assert!(out.candidates.is_empty());
        assert_eq!(out.skipped_invalid, 1);
    }

    #[test]
    fn test_one_candidate_per_budget() {
        let out = BudgetEvaluator
            .evaluate(&snapshot(vec![usage(400.0, 500.0), usage(400.0, 100.0)]))
            .unwrap();
        assert_eq!(out.candidates.len(), 1);
    }
}
