use serde_json::json;

use crate::db::models::{AlertType, Priority, TargetRef};
use crate::error::AppError;

use super::{Candidate, EvalOutput, Evaluator, UserSnapshot};

/// Flags open tasks whose due date has passed or falls within one day.
pub struct TaskEvaluator;

impl Evaluator for TaskEvaluator {
    fn name(&self) -> &'static str {
        "task"
    }

    fn evaluate(&self, snapshot: &UserSnapshot) -> Result<EvalOutput, AppError> {
        let mut candidates = Vec::new();

        for task in &snapshot.tasks {
            if task.completed {
                continue;
            }
            let Some(due) = task.due_date else {
                continue;
            };
            let days_until = (due - snapshot.today).num_days();
            if days_until > 1 {
                continue;
            }

            let message = if days_until < 0 {
                format!("'{}' was due on {}", task.title, due.format("%Y-%m-%d"))
            } else if days_until == 0 {
                format!("'{}' is due today", task.title)
            } else {
                format!("'{}' is due tomorrow", task.title)
            };

            candidates.push(Candidate {
                alert_type: AlertType::TaskDue,
                priority: Priority::High,
                title: format!("Task '{}' needs attention", task.title),
                message,
                target: Some(TargetRef::Task(task.id.clone())),
                metadata: Some(json!({
                    "due_date": due.format("%Y-%m-%d").to_string(),
                    "overdue": days_until < 0,
                })),
                expires_at: None,
            });
        }

        Ok(EvalOutput::from_candidates(candidates))
    }
}
