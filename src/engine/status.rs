use chrono::{Months, NaiveDate};

use crate::db::models::{ObligationPayment, ObligationStatus, RecurringObligation};
use crate::engine::round2;
use crate::error::AppError;

/// Days before the due date at which an unpaid obligation becomes UPCOMING.
/// Canonical threshold for the whole crate; the loan evaluator has its own
/// independent lookahead.
pub const UPCOMING_WINDOW_DAYS: i64 = 7;

/// Sum of payments falling inside the current obligation cycle: the window
/// from `next_due_date` minus one period (exclusive) to `next_due_date`
/// (inclusive).
pub fn paid_in_current_cycle(
    obligation: &RecurringObligation,
    payments: &[ObligationPayment],
) -> f64 {
    let cycle_start = obligation
        .next_due_date
        .checked_sub_months(Months::new(obligation.periodicity.months()))
        .unwrap_or(obligation.next_due_date);

    let total: f64 = payments
        .iter()
        .filter(|p| p.paid_on > cycle_start && p.paid_on <= obligation.next_due_date)
        .map(|p| p.amount)
        .sum();
    round2(total)
}

/// Derive the lifecycle state of a recurring obligation. Pure and stateless;
/// safe to call on every read. First match wins:
///
/// 1. paid >= amount          -> PAID
/// 2. paid > 0                -> PARTIALLY_PAID
/// 3. today > next_due_date   -> PENDING (overdue, unpaid)
/// 4. due within 7 days       -> UPCOMING (includes the due date itself)
/// 5. otherwise               -> SCHEDULED
pub fn derive_status(
    obligation: &RecurringObligation,
    payments: &[ObligationPayment],
    today: NaiveDate,
) -> Result<ObligationStatus, AppError> {
    let amount = round2(obligation.amount);
    if amount <= 0.0 {
        return Err(AppError::InvalidObligation(format!(
            "obligation {} ('{}') has non-positive amount {}",
            obligation.id, obligation.concept, obligation.amount
        )));
    }

    let paid = paid_in_current_cycle(obligation, payments);

    if paid >= amount {
        return Ok(ObligationStatus::Paid);
    }
    if paid > 0.0 {
        return Ok(ObligationStatus::PartiallyPaid);
    }
    if today > obligation.next_due_date {
        return Ok(ObligationStatus::Pending);
    }
    if (obligation.next_due_date - today).num_days() <= UPCOMING_WINDOW_DAYS {
        return Ok(ObligationStatus::Upcoming);
    }
    Ok(ObligationStatus::Scheduled)
}
