use serde_json::json;

use crate::db::models::{AlertType, ObligationStatus, Priority, TargetRef};
use crate::engine::status::derive_status;
use crate::error::AppError;

use super::{Candidate, EvalOutput, Evaluator, UserSnapshot};

/// Flags recurring obligations whose derived status is PENDING (overdue,
/// unpaid) or UPCOMING. Malformed obligations are excluded and counted,
/// never guessed at.
pub struct ObligationEvaluator;

impl Evaluator for ObligationEvaluator {
    fn name(&self) -> &'static str {
        "obligation"
    }

    fn evaluate(&self, snapshot: &UserSnapshot) -> Result<EvalOutput, AppError> {
        let mut out = EvalOutput::default();

        for owp in &snapshot.obligations {
            let obligation = &owp.obligation;
            let status = match derive_status(obligation, &owp.payments, snapshot.today) {
                Ok(s) => s,
                Err(AppError::InvalidObligation(msg)) => {
                    tracing::warn!(obligation_id = %obligation.id, "{msg}");
                    out.skipped_invalid += 1;
                    continue;
                }
                Err(e) => return Err(e),
            };

            let (priority, title, message) = match status {
                ObligationStatus::Pending => (
                    Priority::High,
                    format!("'{}' payment is overdue", obligation.concept),
                    format!(
                        "'{}' ({:.2}) was due on {} and no payment has been recorded",
                        obligation.concept,
                        obligation.amount,
                        obligation.next_due_date.format("%Y-%m-%d")
                    ),
                ),
                ObligationStatus::Upcoming => {
                    let days = (obligation.next_due_date - snapshot.today).num_days();
                    (
                        Priority::Medium,
                        format!("'{}' payment due soon", obligation.concept),
                        format!(
                            "'{}' ({:.2}) is due in {days} day{}",
                            obligation.concept,
                            obligation.amount,
                            if days == 1 { "" } else { "s" }
                        ),
                    )
                }
                _ => continue,
            };

            out.candidates.push(Candidate {
                alert_type: AlertType::RecurringObligationDue,
                priority,
                title,
                message,
                target: Some(TargetRef::Obligation(obligation.id.clone())),
                metadata: Some(json!({
                    "status": status.as_str(),
                    "amount": obligation.amount,
                    "next_due_date": obligation.next_due_date.format("%Y-%m-%d").to_string(),
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
    use crate::db::models::{ObligationWithPayments, Periodicity, RecurringObligation};
    use chrono::NaiveDate;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn obligation(amount: f64, next_due: &str) -> ObligationWithPayments {
        ObligationWithPayments {
            obligation: RecurringObligation {
                id: "o1".into(),
                user_id: "u1".into(),
                concept: "Rent".into(),
                amount,
                periodicity: Periodicity::Monthly,
                category_id: None,
                day_of_payment: 5,
                next_due_date: d(next_due),
                active: true,
                cached_status: None,
                cached_status_at: None,
                created_at: String::new(),
                updated_at: String::new(),
            },
            payments: Vec::new(),
        }
    }

    fn eval(obligations: Vec<ObligationWithPayments>, today: &str) -> EvalOutput {
        let snapshot = UserSnapshot {
            user_id: "u1".into(),
            today: d(today),
            obligations,
            ..Default::default()
        };
        ObligationEvaluator.evaluate(&snapshot).unwrap()
    }

    #[test]
    fn test_upcoming_three_days_out_is_medium() {
        // The spec scenario: 850.00 due in 3 days, nothing paid.
        let out = eval(vec![obligation(850.0, "2026-08-27")], "2026-08-24");
        assert_eq!(out.candidates.len(), 1);
        let c = &out.candidates[0];
        assert_eq!(c.alert_type, AlertType::RecurringObligationDue);
        assert_eq!(c.priority, Priority::Medium);
        assert_eq!(c.target, Some(TargetRef::Obligation("o1".into())));
    }

    #[test]
    fn test_overdue_is_high() {
        let out = eval(vec![obligation(850.0, "2026-08-20")], "2026-08-24");
        assert_eq!(out.candidates[0].priority, Priority::High);
    }

    #[test]
    fn test_scheduled_and_paid_are_silent() {
        // 20 days out: scheduled, no alert.
        let out = eval(vec![obligation(850.0, "2026-09-13")], "2026-08-24");
        assert!(out.candidates.is_empty());
    }

    #[test]
    fn test_invalid_amount_counted_not_alerted() {
        let out = eval(
            vec![obligation(0.0, "2026-08-27"), obligation(850.0, "2026-08-27")],
            "2026-08-24",
        );
        assert_eq!(out.skipped_invalid, 1);
        assert_eq!(out.candidates.len(), 1);
    }
}
