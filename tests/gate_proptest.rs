//! Property tests for the scheduler's rate-limit gate.
//!
//! The invariant under test: for any sequence of gate calls within one
//! calendar day, the number of permitted executions never exceeds the daily
//! cap, regardless of call frequency or manual overrides mixed in.

use chrono::{Duration, NaiveDate, TimeZone, Utc};
use proptest::prelude::*;

use ledgerwatch::engine::scheduler::RateGate;

#[derive(Debug, Clone)]
enum GateOp {
    /// Opportunistic/timer call after advancing the clock by N minutes.
    Tick { advance_minutes: u32 },
    /// Administrative run_once after advancing the clock by N minutes.
    Force { advance_minutes: u32 },
}

fn op_strategy() -> impl Strategy<Value = GateOp> {
    prop_oneof![
        4 => (0u32..180).prop_map(|advance_minutes| GateOp::Tick { advance_minutes }),
        1 => (0u32..180).prop_map(|advance_minutes| GateOp::Force { advance_minutes }),
    ]
}

proptest! {
    #[test]
    fn executions_per_day_never_exceed_cap_via_tick(
        ops in proptest::collection::vec(op_strategy(), 1..200),
        max_per_day in 1u32..30,
        min_interval_minutes in 0i64..120,
    ) {
        let start = Utc.with_ymd_and_hms(2026, 8, 24, 0, 0, 0).unwrap();
        let mut now = start;
        let mut gate = RateGate::new(now.date_naive());
        let min_interval = Duration::minutes(min_interval_minutes);

        // Gated permits per calendar day. Forced runs bypass the gate by
        // contract, so only Tick outcomes are bounded by the cap.
        let mut gated_per_day: std::collections::HashMap<NaiveDate, u32> =
            std::collections::HashMap::new();

        for op in ops {
            match op {
                GateOp::Tick { advance_minutes } => {
                    now += Duration::minutes(advance_minutes as i64);
                    let today = now.date_naive();
                    if gate.try_reserve(now, today, max_per_day, min_interval).is_ok() {
                        *gated_per_day.entry(today).or_insert(0) += 1;
                    }
                }
                GateOp::Force { advance_minutes } => {
                    now += Duration::minutes(advance_minutes as i64);
                    gate.force_reserve(now, now.date_naive());
                }
            }
        }

        for (day, permitted) in gated_per_day {
            prop_assert!(
                permitted <= max_per_day,
                "day {day}: {permitted} gated executions exceeded cap {max_per_day}"
            );
        }
    }

    #[test]
    fn min_interval_is_enforced_between_gated_permits(
        gaps in proptest::collection::vec(0u32..240, 1..100),
        min_interval_minutes in 1i64..120,
    ) {
        let mut now = Utc.with_ymd_and_hms(2026, 8, 24, 0, 0, 0).unwrap();
        let mut gate = RateGate::new(now.date_naive());
        let min_interval = Duration::minutes(min_interval_minutes);
        let mut last_permit = None;

        for gap in gaps {
            now += Duration::minutes(gap as i64);
            // Cap high enough that only spacing can deny.
            if gate.try_reserve(now, now.date_naive(), u32::MAX, min_interval).is_ok() {
                if let Some(prev) = last_permit {
                    prop_assert!(now - prev >= min_interval);
                }
                last_permit = Some(now);
            }
        }
    }
}
