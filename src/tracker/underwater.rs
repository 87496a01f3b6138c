//! Underwater timeout
//!
//! Stop-loss for currently-losing trades. A trade whose peak once reached
//! meaningful profit is stopped at breakeven immediately (profit collapse);
//! one that never did waits out a minimum hold before the absolute
//! threshold applies. A future-dated entry timestamp is logged as a data
//! error and the check proceeds as if the hold had elapsed.

use chrono::{DateTime, Utc};

use crate::logger::{self, LogTag};
use crate::types::{ExitCheck, ExitReason};

#[allow(clippy::too_many_arguments)]
pub fn evaluate(
    trade_id: i64,
    peak_pct: f64,
    current_pct: f64,
    entry_time: DateTime<Utc>,
    now: DateTime<Utc>,
    threshold_pct: f64,
    min_hold_minutes: i64,
    meaningful_profit_pct: f64,
) -> ExitCheck {
    if current_pct >= 0.0 {
        return ExitCheck::hold();
    }

    // profit collapse: the stop ratchets to breakeven and ignores min hold
    if peak_pct >= meaningful_profit_pct {
        return ExitCheck::exit(
            ExitReason::ProfitCollapse,
            format!(
                "underwater at {:.2}% after peak {:.2}%, breakeven stop",
                current_pct, peak_pct
            ),
        );
    }

    let held_minutes = now.signed_duration_since(entry_time).num_minutes();
    let held_minutes = if held_minutes < 0 {
        logger::error(
            LogTag::Tracker,
            &format!(
                "trade {} has future entry time {}, treating hold as elapsed",
                trade_id, entry_time
            ),
        );
        min_hold_minutes
    } else {
        held_minutes
    };

    if held_minutes >= min_hold_minutes && current_pct <= threshold_pct {
        return ExitCheck::exit(
            ExitReason::UnderwaterStop,
            format!(
                "underwater {:.2}% past threshold {:.2}% after {} minutes",
                current_pct, threshold_pct, held_minutes
            ),
        );
    }

    ExitCheck::hold()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn at(minutes_held: i64) -> (DateTime<Utc>, DateTime<Utc>) {
        let entry = Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap();
        (entry, entry + Duration::minutes(minutes_held))
    }

    #[test]
    fn never_fires_while_in_profit() {
        let (entry, now) = at(600);
        let check = evaluate(1, 5.0, 0.1, entry, now, -0.8, 15, 1.0);
        assert!(!check.should_exit);
        let breakeven = evaluate(1, 5.0, 0.0, entry, now, -0.8, 15, 1.0);
        assert!(!breakeven.should_exit);
    }

    #[test]
    fn timeout_fires_after_minimum_hold() {
        // never saw meaningful profit, -1.0% at 20 minutes with min hold 15
        let (entry, now) = at(20);
        let check = evaluate(1, 0.0, -1.0, entry, now, -0.8, 15, 1.0);
        assert!(check.should_exit);
        assert_eq!(check.reason, Some(ExitReason::UnderwaterStop));
    }

    #[test]
    fn young_trades_wait_out_the_hold() {
        let (entry, now) = at(10);
        let check = evaluate(1, 0.0, -1.0, entry, now, -0.8, 15, 1.0);
        assert!(!check.should_exit);
    }

    #[test]
    fn shallow_losses_survive_the_threshold() {
        let (entry, now) = at(120);
        let check = evaluate(1, 0.0, -0.5, entry, now, -0.8, 15, 1.0);
        assert!(!check.should_exit);
    }

    #[test]
    fn profit_collapse_stops_at_breakeven_immediately() {
        // peaked at 2.0%, now slightly underwater at age 1 minute
        let (entry, now) = at(1);
        let check = evaluate(1, 2.0, -0.1, entry, now, -0.8, 15, 1.0);
        assert!(check.should_exit);
        assert_eq!(check.reason, Some(ExitReason::ProfitCollapse));
    }

    #[test]
    fn future_entry_time_does_not_block_the_stop() {
        let entry = Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap();
        let now = entry - Duration::hours(2);
        let check = evaluate(1, 0.0, -1.0, entry, now, -0.8, 15, 1.0);
        assert!(check.should_exit);
    }
}
