use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

// ============================================================================
// Recurring obligations
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Periodicity {
    Monthly,
    Bimonthly,
    Quarterly,
    Semiannual,
    Annual,
}

impl Periodicity {
    /// Length of one obligation cycle in months.
    pub fn months(&self) -> u32 {
        match self {
            Periodicity::Monthly => 1,
            Periodicity::Bimonthly => 2,
            Periodicity::Quarterly => 3,
            Periodicity::Semiannual => 6,
            Periodicity::Annual => 12,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Periodicity::Monthly => "monthly",
            Periodicity::Bimonthly => "bimonthly",
            Periodicity::Quarterly => "quarterly",
            Periodicity::Semiannual => "semiannual",
            Periodicity::Annual => "annual",
        }
    }

    pub fn parse(s: &str) -> Result<Self, AppError> {
        Ok(match s {
            "monthly" => Periodicity::Monthly,
            "bimonthly" => Periodicity::Bimonthly,
            "quarterly" => Periodicity::Quarterly,
            "semiannual" => Periodicity::Semiannual,
            "annual" => Periodicity::Annual,
            other => {
                return Err(AppError::Validation(format!("Unknown periodicity '{other}'")))
            }
        })
    }
}

/// Lifecycle state of a recurring obligation for its current cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ObligationStatus {
    Scheduled,
    Upcoming,
    Pending,
    PartiallyPaid,
    Paid,
}

impl ObligationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObligationStatus::Scheduled => "SCHEDULED",
            ObligationStatus::Upcoming => "UPCOMING",
            ObligationStatus::Pending => "PENDING",
            ObligationStatus::PartiallyPaid => "PARTIALLY_PAID",
            ObligationStatus::Paid => "PAID",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecurringObligation {
    pub id: String,
    pub user_id: String,
    pub concept: String,
    pub amount: f64,
    pub periodicity: Periodicity,
    pub category_id: Option<String>,
    pub day_of_payment: u8,
    pub next_due_date: NaiveDate,
    pub active: bool,
    /// Listing-performance cache. Never authoritative: consumers needing
    /// correctness call `engine::status::derive_status` instead.
    pub cached_status: Option<ObligationStatus>,
    pub cached_status_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObligationPayment {
    pub id: String,
    pub obligation_id: String,
    pub amount: f64,
    pub paid_on: NaiveDate,
    pub created_at: String,
}

/// An obligation together with its linked payments, as the evaluators see it.
#[derive(Debug, Clone)]
pub struct ObligationWithPayments {
    pub obligation: RecurringObligation,
    pub payments: Vec<ObligationPayment>,
}
