use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use crate::config::AppConfig;
use crate::db::repos::{alerts as alert_repo, finance as finance_repo, obligations as obligation_repo};
use crate::db::DbPool;
use crate::engine::evaluators::{self, Evaluator, UserSnapshot};
use crate::error::AppError;

/// Statistics for one orchestrator run (single user or aggregate).
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunStats {
    pub users_evaluated: u64,
    pub candidates_considered: u64,
    pub alerts_created: u64,
    /// Alerts created per alert type.
    pub per_type: BTreeMap<String, u64>,
    /// Evaluator runs (or snapshot sections) that failed and were isolated.
    pub evaluator_failures: u64,
    /// Candidates dropped because the store rejected the insert. The next
    /// scheduled run re-evaluates and retries naturally.
    pub store_failures: u64,
    /// Malformed records excluded from evaluation.
    pub records_skipped: u64,
}

impl RunStats {
    pub fn absorb(&mut self, other: RunStats) {
        self.users_evaluated += other.users_evaluated;
        self.candidates_considered += other.candidates_considered;
        self.alerts_created += other.alerts_created;
        self.evaluator_failures += other.evaluator_failures;
        self.store_failures += other.store_failures;
        self.records_skipped += other.records_skipped;
        for (k, v) in other.per_type {
            *self.per_type.entry(k).or_insert(0) += v;
        }
    }
}

/// Runs every enabled evaluator for a user and drives candidates through the
/// deduplicating store. One evaluator failing never aborts its siblings;
/// everything degrades to "fewer alerts this cycle".
pub struct Orchestrator {
    pool: DbPool,
    evaluators: Vec<Box<dyn Evaluator>>,
    cfg: AppConfig,
}

impl Orchestrator {
    pub fn new(pool: DbPool, cfg: AppConfig) -> Self {
        let evaluators = evaluators::registry(&cfg.evaluators);
        Self {
            pool,
            evaluators,
            cfg,
        }
    }

    #[cfg(test)]
    fn with_evaluators(pool: DbPool, cfg: AppConfig, evaluators: Vec<Box<dyn Evaluator>>) -> Self {
        Self {
            pool,
            evaluators,
            cfg,
        }
    }

    /// Load one user's snapshot. Each section is isolated: a failed read
    /// logs, counts as an evaluator failure, and leaves the section empty so
    /// the remaining domains still get evaluated.
    fn load_snapshot(&self, user_id: &str, today: NaiveDate) -> (UserSnapshot, u64) {
        let mut failures = 0u64;
        let mut snapshot = UserSnapshot {
            user_id: user_id.to_string(),
            today,
            ..Default::default()
        };

        match finance_repo::get_budget_usage(&self.pool, user_id, today) {
            Ok(v) => snapshot.budgets = v,
            Err(e) => {
                tracing::error!(user_id, "Snapshot: budget load failed: {e}");
                failures += 1;
            }
        }
        match finance_repo::get_active_loans(&self.pool, user_id) {
            Ok(v) => snapshot.loans = v,
            Err(e) => {
                tracing::error!(user_id, "Snapshot: loan load failed: {e}");
                failures += 1;
            }
        }
        match finance_repo::get_active_investments(&self.pool, user_id) {
            Ok(v) => snapshot.investments = v,
            Err(e) => {
                tracing::error!(user_id, "Snapshot: investment load failed: {e}");
                failures += 1;
            }
        }
        match obligation_repo::get_active_for_user(&self.pool, user_id) {
            Ok(v) => snapshot.obligations = v,
            Err(e) => {
                tracing::error!(user_id, "Snapshot: obligation load failed: {e}");
                failures += 1;
            }
        }
        match finance_repo::get_open_tasks(&self.pool, user_id) {
            Ok(v) => snapshot.tasks = v,
            Err(e) => {
                tracing::error!(user_id, "Snapshot: task load failed: {e}");
                failures += 1;
            }
        }
        let window_start = today - chrono::Duration::days(self.cfg.evaluators.anomaly.window_days);
        match finance_repo::get_transactions_since(&self.pool, user_id, window_start, today) {
            Ok(v) => snapshot.transactions = v,
            Err(e) => {
                tracing::error!(user_id, "Snapshot: transaction load failed: {e}");
                failures += 1;
            }
        }

        (snapshot, failures)
    }

    /// Evaluate one user: collect candidates from every evaluator, submit
    /// each through dedup, tally results. `now` is the dedup store's expiry
    /// reference, injected so callers with a test clock stay deterministic.
    pub fn run_for_user(&self, user_id: &str, today: NaiveDate, now: DateTime<Utc>) -> RunStats {
        let mut stats = RunStats {
            users_evaluated: 1,
            ..Default::default()
        };

        let (snapshot, load_failures) = self.load_snapshot(user_id, today);
        stats.evaluator_failures += load_failures;

        for evaluator in &self.evaluators {
            let output = match evaluator.evaluate(&snapshot) {
                Ok(o) => o,
                Err(e) => {
                    tracing::error!(
                        user_id,
                        evaluator = evaluator.name(),
                        "Evaluator failed, siblings continue: {e}"
                    );
                    stats.evaluator_failures += 1;
                    continue;
                }
            };
            stats.records_skipped += output.skipped_invalid as u64;

            for candidate in output.candidates {
                stats.candidates_considered += 1;
                match alert_repo::submit(&self.pool, user_id, &candidate, now) {
                    Ok(true) => {
                        stats.alerts_created += 1;
                        *stats
                            .per_type
                            .entry(candidate.alert_type.as_str().to_string())
                            .or_insert(0) += 1;
                        tracing::debug!(
                            user_id,
                            alert_type = candidate.alert_type.as_str(),
                            "Alert created"
                        );
                    }
                    Ok(false) => {} // active duplicate, discarded
                    Err(e) => {
                        tracing::error!(
                            user_id,
                            alert_type = candidate.alert_type.as_str(),
                            "Alert store write failed, candidate dropped: {e}"
                        );
                        stats.store_failures += 1;
                    }
                }
            }
        }

        stats
    }

    /// Evaluate every active user. Users are independent; each user's
    /// evaluation stays serialized so dedup holds within a run.
    pub fn run_for_all_active_users(
        &self,
        today: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<RunStats, AppError> {
        let since = today - chrono::Duration::days(self.cfg.scheduler.active_user_window_days as i64);
        let user_ids = finance_repo::get_active_user_ids(&self.pool, since)?;

        let mut total = RunStats::default();
        for user_id in &user_ids {
            total.absorb(self.run_for_user(user_id, today, now));
        }

        tracing::info!(
            users = user_ids.len(),
            alerts_created = total.alerts_created,
            candidates = total.candidates_considered,
            failures = total.evaluator_failures + total.store_failures,
            "Evaluation pass complete"
        );
        Ok(total)
    }
}
