use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use tokio::task::JoinHandle;

use crate::config::SchedulerConfig;
use crate::db::repos::obligations as obligation_repo;
use crate::db::DbPool;
use crate::engine::clock::Clock;
use crate::engine::orchestrator::{Orchestrator, RunStats};
use crate::engine::status::derive_status;

pub const REASON_OK: &str = "ok";
pub const REASON_RATE_LIMITED: &str = "rate-limited";
pub const REASON_DISABLED: &str = "disabled";
pub const REASON_ERROR: &str = "error";

/// The rate-limit gate. Pure state machine over `(executions_today,
/// last_execution)`; the scheduler serializes access behind one mutex so a
/// timer tick and an opportunistic call can never both claim the same slot.
#[derive(Debug, Clone)]
pub struct RateGate {
    executions_today: u32,
    counter_date: NaiveDate,
    last_execution: Option<DateTime<Utc>>,
}

impl RateGate {
    pub fn new(today: NaiveDate) -> Self {
        Self {
            executions_today: 0,
            counter_date: today,
            last_execution: None,
        }
    }

    /// Implicit daily reset, checked on every gate evaluation rather than by
    /// a separate timer.
    fn roll_date(&mut self, today: NaiveDate) {
        if today != self.counter_date {
            self.executions_today = 0;
            self.counter_date = today;
        }
    }

    /// Check-and-increment in one step. On permit, the slot is claimed
    /// immediately; on deny, nothing changes.
    pub fn try_reserve(
        &mut self,
        now: DateTime<Utc>,
        today: NaiveDate,
        max_per_day: u32,
        min_interval: chrono::Duration,
    ) -> Result<(), &'static str> {
        self.roll_date(today);
        if self.executions_today >= max_per_day {
            return Err(REASON_RATE_LIMITED);
        }
        if let Some(last) = self.last_execution {
            if now - last < min_interval {
                return Err(REASON_RATE_LIMITED);
            }
        }
        self.executions_today += 1;
        self.last_execution = Some(now);
        Ok(())
    }

    /// Administrative override: claims a slot unconditionally so manual runs
    /// still count toward the daily cap.
    pub fn force_reserve(&mut self, now: DateTime<Utc>, today: NaiveDate) {
        self.roll_date(today);
        self.executions_today += 1;
        self.last_execution = Some(now);
    }

    pub fn executions_today(&self) -> u32 {
        self.executions_today
    }

    pub fn last_execution(&self) -> Option<DateTime<Utc>> {
        self.last_execution
    }
}

/// Outcome of one `execute_if_due` call.
#[derive(Debug, Clone, Serialize)]
pub struct TickOutcome {
    pub executed: bool,
    pub reason: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alerts_created: Option<u64>,
}

impl TickOutcome {
    fn denied(reason: &'static str) -> Self {
        Self {
            executed: false,
            reason,
            alerts_created: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SchedulerStatus {
    pub is_running: bool,
    pub has_interval_timer: bool,
    pub executions_today: u32,
    pub last_execution: Option<String>,
}

struct GateState {
    gate: RateGate,
    /// Separate daily-once flag for the non-alert batch step, gated purely
    /// by date equality.
    last_subscription_task: Option<NaiveDate>,
}

/// The autonomous driver. One instance per process; there is deliberately no
/// distributed lock, so multi-instance deployments would need leader election
/// before the daily-cap guarantee holds across hosts.
pub struct AlertScheduler {
    pool: DbPool,
    cfg: SchedulerConfig,
    orchestrator: Arc<Orchestrator>,
    clock: Arc<dyn Clock>,
    state: Mutex<GateState>,
    running: AtomicBool,
    timer: Mutex<Option<JoinHandle<()>>>,
}

impl AlertScheduler {
    pub fn new(
        pool: DbPool,
        cfg: SchedulerConfig,
        orchestrator: Arc<Orchestrator>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let today = clock.local_today();
        Self {
            pool,
            cfg,
            orchestrator,
            clock,
            state: Mutex::new(GateState {
                gate: RateGate::new(today),
                last_subscription_task: None,
            }),
            running: AtomicBool::new(false),
            timer: Mutex::new(None),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    pub fn status(&self) -> SchedulerStatus {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let has_timer = self
            .timer
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false);
        SchedulerStatus {
            is_running: self.is_running(),
            has_interval_timer: has_timer,
            executions_today: state.gate.executions_today(),
            last_execution: state.gate.last_execution().map(|t| t.to_rfc3339()),
        }
    }

    /// Begin the periodic timer. No-op (returns false) when already running.
    pub fn start(self: &Arc<Self>, interval_minutes: Option<u32>) -> bool {
        if self.running.swap(true, Ordering::SeqCst) {
            return false;
        }
        let minutes = interval_minutes.unwrap_or(self.cfg.interval_minutes).max(1);
        tracing::info!(interval_minutes = minutes, "Alert scheduler starting");

        let sched = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let period = Duration::from_secs(u64::from(minutes) * 60);
            let mut interval = tokio::time::interval(period);
            // The first tick of tokio's interval fires immediately; the gate
            // still throttles it like any other call.
            loop {
                interval.tick().await;
                if !sched.running.load(Ordering::Relaxed) {
                    break;
                }
                // Each tick runs detached so stop() cancels the timer without
                // tearing down an in-flight evaluation.
                let tick_sched = Arc::clone(&sched);
                tokio::spawn(async move {
                    let outcome = tick_sched.execute_if_due().await;
                    tracing::debug!(
                        executed = outcome.executed,
                        reason = outcome.reason,
                        "Timer tick"
                    );
                    if let Err(e) = tick_sched.run_subscription_tasks_if_due() {
                        tracing::error!("Daily subscription tasks failed: {e}");
                    }
                });
            }
            tracing::info!("Alert scheduler timer exited");
        });

        *self.timer.lock().unwrap_or_else(|e| e.into_inner()) = Some(handle);
        true
    }

    /// Cancel the timer. In-flight runs complete on their own. No-op when
    /// already stopped.
    pub fn stop(&self) -> bool {
        if !self.running.swap(false, Ordering::SeqCst) {
            return false;
        }
        if let Some(handle) = self.timer.lock().unwrap_or_else(|e| e.into_inner()).take() {
            handle.abort();
        }
        tracing::info!("Alert scheduler stopped");
        true
    }

    /// The smart-trigger entry point: run the full evaluation pass only if
    /// the rate-limit gate permits. Safe to call arbitrarily often.
    pub async fn execute_if_due(&self) -> TickOutcome {
        if !self.cfg.enabled {
            return TickOutcome::denied(REASON_DISABLED);
        }

        let now = self.clock.now();
        let today = self.clock.local_today();
        let min_interval = chrono::Duration::minutes(i64::from(self.cfg.min_interval_minutes));
        {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            if let Err(reason) =
                state
                    .gate
                    .try_reserve(now, today, self.cfg.max_executions_per_day, min_interval)
            {
                return TickOutcome::denied(reason);
            }
        }

        match self.run_evaluation(today, now).await {
            Ok(stats) => TickOutcome {
                executed: true,
                reason: REASON_OK,
                alerts_created: Some(stats.alerts_created),
            },
            Err(msg) => {
                tracing::error!("Evaluation pass failed: {msg}");
                TickOutcome {
                    executed: true,
                    reason: REASON_ERROR,
                    alerts_created: None,
                }
            }
        }
    }

    /// Administrative override: bypasses the gate but still claims a slot so
    /// manual runs count toward the daily cap.
    pub async fn run_once(&self) -> Result<RunStats, String> {
        let now = self.clock.now();
        let today = self.clock.local_today();
        {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            state.gate.force_reserve(now, today);
        }
        self.run_evaluation(today, now).await
    }

    /// Run the orchestrator off the async runtime with a hard timeout so a
    /// stuck evaluation cannot stall the next tick.
    async fn run_evaluation(&self, today: NaiveDate, now: DateTime<Utc>) -> Result<RunStats, String> {
        let orchestrator = Arc::clone(&self.orchestrator);
        let task =
            tokio::task::spawn_blocking(move || orchestrator.run_for_all_active_users(today, now));

        match tokio::time::timeout(Duration::from_secs(self.cfg.run_timeout_seconds), task).await {
            Ok(Ok(Ok(stats))) => Ok(stats),
            Ok(Ok(Err(e))) => Err(e.to_string()),
            Ok(Err(join_err)) => Err(format!("evaluation task panicked: {join_err}")),
            Err(_) => Err(format!(
                "evaluation pass exceeded {}s timeout",
                self.cfg.run_timeout_seconds
            )),
        }
    }

    /// Once-per-day batch: refresh every active obligation's cached status.
    /// Gated purely by date equality, independent of the alert rate limiter.
    /// Returns whether the batch ran.
    pub fn run_subscription_tasks_if_due(&self) -> Result<bool, crate::error::AppError> {
        let today = self.clock.local_today();
        {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            if state.last_subscription_task == Some(today) {
                return Ok(false);
            }
            state.last_subscription_task = Some(today);
        }

        let mut refreshed = 0usize;
        let mut invalid = 0usize;
        for owp in obligation_repo::get_all_active(&self.pool)? {
            match derive_status(&owp.obligation, &owp.payments, today) {
                Ok(status) => {
                    obligation_repo::refresh_cached_status(&self.pool, &owp.obligation.id, status)?;
                    refreshed += 1;
                }
                Err(e) => {
                    tracing::warn!(obligation_id = %owp.obligation.id, "Cache refresh skipped: {e}");
                    invalid += 1;
                }
            }
        }
        tracing::info!(refreshed, invalid, "Daily obligation status refresh complete");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::db::init_test_db;
    use crate::engine::clock::ManualClock;
    use chrono::TimeZone;

    fn manual_clock() -> Arc<ManualClock> {
        Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 8, 24, 8, 0, 0).unwrap(),
        ))
    }

    fn scheduler_with(clock: Arc<ManualClock>) -> Arc<AlertScheduler> {
        let pool = init_test_db().unwrap();
        let cfg = AppConfig::default();
        let orchestrator = Arc::new(Orchestrator::new(pool.clone(), cfg.clone()));
        Arc::new(AlertScheduler::new(pool, cfg.scheduler, orchestrator, clock))
    }

    #[test]
    fn test_gate_min_interval() {
        let mut gate = RateGate::new(NaiveDate::from_ymd_opt(2026, 8, 24).unwrap());
        let today = NaiveDate::from_ymd_opt(2026, 8, 24).unwrap();
        let t0 = Utc.with_ymd_and_hms(2026, 8, 24, 8, 0, 0).unwrap();
        let interval = chrono::Duration::minutes(60);

        assert!(gate.try_reserve(t0, today, 24, interval).is_ok());
        // 59 minutes later: denied.
        assert_eq!(
            gate.try_reserve(t0 + chrono::Duration::minutes(59), today, 24, interval),
            Err(REASON_RATE_LIMITED)
        );
        // Exactly 60 minutes later: permitted.
        assert!(gate
            .try_reserve(t0 + chrono::Duration::minutes(60), today, 24, interval)
            .is_ok());
        assert_eq!(gate.executions_today(), 2);
    }

    #[test]
    fn test_gate_daily_cap_and_reset() {
        let today = NaiveDate::from_ymd_opt(2026, 8, 24).unwrap();
        let mut gate = RateGate::new(today);
        let mut t = Utc.with_ymd_and_hms(2026, 8, 24, 0, 0, 0).unwrap();
        let interval = chrono::Duration::minutes(0);

        for _ in 0..24 {
            assert!(gate.try_reserve(t, today, 24, interval).is_ok());
            t += chrono::Duration::minutes(1);
        }
        // The 25th call the same day is denied.
        assert_eq!(gate.try_reserve(t, today, 24, interval), Err(REASON_RATE_LIMITED));

        // Next day: counter resets implicitly on the gate check.
        let tomorrow = today.succ_opt().unwrap();
        assert!(gate.try_reserve(t, tomorrow, 24, interval).is_ok());
        assert_eq!(gate.executions_today(), 1);
    }

    #[test]
    fn test_gate_deny_has_no_side_effects() {
        let today = NaiveDate::from_ymd_opt(2026, 8, 24).unwrap();
        let mut gate = RateGate::new(today);
        let t0 = Utc.with_ymd_and_hms(2026, 8, 24, 8, 0, 0).unwrap();
        let interval = chrono::Duration::minutes(60);

        gate.try_reserve(t0, today, 24, interval).unwrap();
        let before = gate.clone();
        let _ = gate.try_reserve(t0 + chrono::Duration::minutes(1), today, 24, interval);
        assert_eq!(gate.executions_today(), before.executions_today());
        assert_eq!(gate.last_execution(), before.last_execution());
    }

    #[test]
    fn test_force_reserve_counts_toward_cap() {
        let today = NaiveDate::from_ymd_opt(2026, 8, 24).unwrap();
        let mut gate = RateGate::new(today);
        let t0 = Utc.with_ymd_and_hms(2026, 8, 24, 8, 0, 0).unwrap();

        for _ in 0..24 {
            gate.force_reserve(t0, today);
        }
        assert_eq!(gate.executions_today(), 24);
        assert_eq!(
            gate.try_reserve(t0, today, 24, chrono::Duration::minutes(0)),
            Err(REASON_RATE_LIMITED)
        );
    }

    #[tokio::test]
    async fn test_execute_if_due_spec_scenario() {
        // 24 calls spaced >60 minutes apart all execute; the 25th the same
        // day is denied with reason rate-limited.
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 8, 24, 0, 5, 0).unwrap(),
        ));
        let sched = scheduler_with(clock.clone());

        for i in 0..24 {
            let outcome = sched.execute_if_due().await;
            assert!(outcome.executed, "call {i} should execute");
            assert_eq!(outcome.reason, REASON_OK);
            if i < 23 {
                clock.advance(chrono::Duration::minutes(61));
            }
        }
        // Still the same calendar day: the cap, not the spacing, denies.
        clock.advance(chrono::Duration::minutes(30));
        let denied = sched.execute_if_due().await;
        assert!(!denied.executed);
        assert_eq!(denied.reason, REASON_RATE_LIMITED);
        assert_eq!(sched.status().executions_today, 24);
    }

    #[tokio::test]
    async fn test_execute_if_due_disabled() {
        let clock = manual_clock();
        let pool = init_test_db().unwrap();
        let mut cfg = AppConfig::default();
        cfg.scheduler.enabled = false;
        let orchestrator = Arc::new(Orchestrator::new(pool.clone(), cfg.clone()));
        let sched = AlertScheduler::new(pool, cfg.scheduler, orchestrator, clock);

        let outcome = sched.execute_if_due().await;
        assert!(!outcome.executed);
        assert_eq!(outcome.reason, REASON_DISABLED);
        assert_eq!(sched.status().executions_today, 0);
    }

    #[tokio::test]
    async fn test_run_once_bypasses_gate_but_counts() {
        let clock = manual_clock();
        let sched = scheduler_with(clock);

        // Two back-to-back manual runs: no gate, both execute.
        sched.run_once().await.unwrap();
        sched.run_once().await.unwrap();
        assert_eq!(sched.status().executions_today, 2);

        // The opportunistic path is now inside min-interval: denied.
        let outcome = sched.execute_if_due().await;
        assert!(!outcome.executed);
    }

    #[tokio::test]
    async fn test_start_stop_state_machine() {
        let clock = manual_clock();
        let sched = scheduler_with(clock);

        assert!(!sched.is_running());
        assert!(sched.start(Some(60)));
        assert!(sched.is_running());
        // Starting again is a no-op.
        assert!(!sched.start(Some(30)));

        assert!(sched.stop());
        assert!(!sched.is_running());
        // Stopping again is a no-op.
        assert!(!sched.stop());
    }

    #[tokio::test]
    async fn test_subscription_tasks_once_per_day() {
        let clock = manual_clock();
        let sched = scheduler_with(clock.clone());
        {
            let conn = sched.pool.get().unwrap();
            conn.execute_batch(
                "INSERT INTO users (id, name) VALUES ('u1', 'A');
                 INSERT INTO recurring_obligations
                 (id, user_id, concept, amount, periodicity, day_of_payment, next_due_date,
                  active, created_at, updated_at)
                 VALUES ('o1', 'u1', 'Rent', 850.0, 'monthly', 27, '2026-08-27', 1, '', '');",
            )
            .unwrap();
        }

        assert!(sched.run_subscription_tasks_if_due().unwrap());
        // Same day: date equality blocks a second run.
        assert!(!sched.run_subscription_tasks_if_due().unwrap());

        let rows = obligation_repo::get_all_active(&sched.pool).unwrap();
        assert_eq!(
            rows[0].obligation.cached_status,
            Some(crate::db::models::ObligationStatus::Upcoming)
        );

        // Next day it runs again.
        clock.advance(chrono::Duration::days(1));
        assert!(sched.run_subscription_tasks_if_due().unwrap());
    }
}
