use serde::{Deserialize, Serialize};

use crate::error::AppError;

// ============================================================================
// Alerts
// ============================================================================

/// Closed set of alert types. `PromotionAvailable` is reserved for the
/// promotion pipeline and has no evaluator in this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AlertType {
    #[serde(rename = "budget-80")]
    Budget80,
    #[serde(rename = "budget-90")]
    Budget90,
    #[serde(rename = "budget-over")]
    BudgetOver,
    LoanInstallmentDue,
    InvestmentMaturing,
    RecurringObligationDue,
    TaskDue,
    AnomalousSpending,
    PromotionAvailable,
}

impl AlertType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertType::Budget80 => "budget-80",
            AlertType::Budget90 => "budget-90",
            AlertType::BudgetOver => "budget-over",
            AlertType::LoanInstallmentDue => "loan-installment-due",
            AlertType::InvestmentMaturing => "investment-maturing",
            AlertType::RecurringObligationDue => "recurring-obligation-due",
            AlertType::TaskDue => "task-due",
            AlertType::AnomalousSpending => "anomalous-spending",
            AlertType::PromotionAvailable => "promotion-available",
        }
    }

    pub fn parse(s: &str) -> Result<Self, AppError> {
        Ok(match s {
            "budget-80" => AlertType::Budget80,
            "budget-90" => AlertType::Budget90,
            "budget-over" => AlertType::BudgetOver,
            "loan-installment-due" => AlertType::LoanInstallmentDue,
            "investment-maturing" => AlertType::InvestmentMaturing,
            "recurring-obligation-due" => AlertType::RecurringObligationDue,
            "task-due" => AlertType::TaskDue,
            "anomalous-spending" => AlertType::AnomalousSpending,
            "promotion-available" => AlertType::PromotionAvailable,
            other => return Err(AppError::Validation(format!("Unknown alert type '{other}'"))),
        })
    }
}

/// Priority with a total order: Low < Medium < High < Critical.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "LOW",
            Priority::Medium => "MEDIUM",
            Priority::High => "HIGH",
            Priority::Critical => "CRITICAL",
        }
    }

    pub fn parse(s: &str) -> Result<Self, AppError> {
        Ok(match s {
            "LOW" => Priority::Low,
            "MEDIUM" => Priority::Medium,
            "HIGH" => Priority::High,
            "CRITICAL" => Priority::Critical,
            other => return Err(AppError::Validation(format!("Unknown priority '{other}'"))),
        })
    }
}

/// Polymorphic reference to the entity an alert is about. `None` at the
/// alert level means a global alert; dedup then keys on the type alone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum TargetRef {
    Obligation(String),
    Loan(String),
    Budget(String),
    Investment(String),
    Task(String),
    Promotion(String),
}

impl TargetRef {
    pub fn kind(&self) -> &'static str {
        match self {
            TargetRef::Obligation(_) => "obligation",
            TargetRef::Loan(_) => "loan",
            TargetRef::Budget(_) => "budget",
            TargetRef::Investment(_) => "investment",
            TargetRef::Task(_) => "task",
            TargetRef::Promotion(_) => "promotion",
        }
    }

    pub fn id(&self) -> &str {
        match self {
            TargetRef::Obligation(id)
            | TargetRef::Loan(id)
            | TargetRef::Budget(id)
            | TargetRef::Investment(id)
            | TargetRef::Task(id)
            | TargetRef::Promotion(id) => id,
        }
    }

    pub fn from_columns(kind: Option<String>, id: Option<String>) -> Option<Self> {
        let id = id?;
        match kind?.as_str() {
            "obligation" => Some(TargetRef::Obligation(id)),
            "loan" => Some(TargetRef::Loan(id)),
            "budget" => Some(TargetRef::Budget(id)),
            "investment" => Some(TargetRef::Investment(id)),
            "task" => Some(TargetRef::Task(id)),
            "promotion" => Some(TargetRef::Promotion(id)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub id: String,
    pub user_id: String,
    pub alert_type: AlertType,
    pub priority: Priority,
    pub title: String,
    pub message: String,
    pub read: bool,
    pub actioned: bool,
    pub metadata: Option<serde_json::Value>,
    pub target: Option<TargetRef>,
    pub created_at: String,
    pub expires_at: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alert_type_round_trip() {
        for t in [
            AlertType::Budget80,
            AlertType::BudgetOver,
            AlertType::RecurringObligationDue,
            AlertType::AnomalousSpending,
            AlertType::PromotionAvailable,
        ] {
            assert_eq!(AlertType::parse(t.as_str()).unwrap(), t);
        }
        assert!(AlertType::parse("budget-110").is_err());
    }

    #[test]
    fn test_priority_total_order() {
        assert!(Priority::Low < Priority::Medium);
        assert!(Priority::Medium < Priority::High);
        assert!(Priority::High < Priority::Critical);
    }

    #[test]
    fn test_target_ref_columns() {
        let t = TargetRef::Obligation("o1".into());
        assert_eq!(t.kind(), "obligation");
        assert_eq!(t.id(), "o1");
        let back = TargetRef::from_columns(Some("obligation".into()), Some("o1".into()));
        assert_eq!(back, Some(t));
        assert_eq!(TargetRef::from_columns(None, Some("x".into())), None);
    }
}
