//! Layer 3: consecutive loss streak
//!
//! Counts the leading run of losing trades from the most recent closes,
//! stopping at the first win. Longer streaks cut size harder and a long
//! enough one pauses the bot for a fixed window.

use chrono::{DateTime, Duration, Utc};

use crate::config::CapitalConfig;
use crate::storage::TradeRecord;

#[derive(Debug, Clone, PartialEq)]
pub struct StreakAssessment {
    pub streak: usize,
    pub multiplier: f64,
    pub pause_until: Option<DateTime<Utc>>,
    pub reason: Option<String>,
}

/// Leading losses in a newest-first list of closed trades. A trade without
/// a recorded P&L ends the run.
pub fn leading_loss_streak(recent_newest_first: &[TradeRecord]) -> usize {
    recent_newest_first
        .iter()
        .take_while(|t| matches!(t.realized_pnl, Some(pnl) if pnl < 0.0))
        .count()
}

/// Leading run of winning trades, used for the equity-peak reset
pub fn leading_win_streak(recent_newest_first: &[TradeRecord]) -> usize {
    recent_newest_first
        .iter()
        .take_while(|t| matches!(t.realized_pnl, Some(pnl) if pnl > 0.0))
        .count()
}

pub fn evaluate(streak: usize, now: DateTime<Utc>, cfg: &CapitalConfig) -> StreakAssessment {
    if streak >= cfg.streak_pause_count {
        return StreakAssessment {
            streak,
            multiplier: 0.0,
            pause_until: Some(now + Duration::hours(cfg.streak_pause_hours)),
            reason: Some(format!("{} consecutive losses, pausing", streak)),
        };
    }
    let (multiplier, reason) = if streak >= cfg.streak_quarter_count {
        (0.25, Some(format!("{} consecutive losses, quarter size", streak)))
    } else if streak >= cfg.streak_half_count {
        (0.5, Some(format!("{} consecutive losses, half size", streak)))
    } else {
        (1.0, None)
    };
    StreakAssessment {
        streak,
        multiplier,
        pause_until: None,
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{Store, TradeStatus};
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    fn trade(pnl: Option<f64>) -> TradeRecord {
        TradeRecord {
            id: 0,
            bot_id: "bot-1".to_string(),
            pair: "ETH/USD".to_string(),
            status: TradeStatus::Closed,
            entry_time: now(),
            exit_time: Some(now()),
            realized_pnl: pnl,
            peak_profit_percent: 0.0,
            peak_updated_at: None,
        }
    }

    #[test]
    fn streak_stops_at_the_first_win() {
        let trades: Vec<TradeRecord> = [-1.0, -2.0, 3.0, -4.0]
            .iter()
            .map(|p| trade(Some(*p)))
            .collect();
        assert_eq!(leading_loss_streak(&trades), 2);
    }

    #[test]
    fn missing_pnl_ends_the_run() {
        let trades = vec![trade(Some(-1.0)), trade(None), trade(Some(-2.0))];
        assert_eq!(leading_loss_streak(&trades), 1);
    }

    #[test]
    fn thresholds_scale_the_multiplier() {
        let cfg = CapitalConfig::default();
        assert_eq!(evaluate(0, now(), &cfg).multiplier, 1.0);
        assert_eq!(evaluate(2, now(), &cfg).multiplier, 1.0);
        assert_eq!(evaluate(3, now(), &cfg).multiplier, 0.5);
        assert_eq!(evaluate(5, now(), &cfg).multiplier, 0.25);
        let paused = evaluate(6, now(), &cfg);
        assert_eq!(paused.multiplier, 0.0);
        assert_eq!(
            paused.pause_until,
            Some(now() + Duration::hours(cfg.streak_pause_hours))
        );
    }

    #[test]
    fn streak_counts_real_ledger_rows() {
        let store = Store::open_in_memory().unwrap();
        let base = now();
        for (i, pnl) in [5.0, -1.0, -2.0, -3.0].iter().enumerate() {
            let id = store
                .insert_trade("bot-1", "ETH/USD", base + Duration::hours(i as i64))
                .unwrap();
            store
                .close_trade(id, base + Duration::hours(i as i64 + 1), *pnl)
                .unwrap();
        }
        let recent = store.recent_closed_trades("bot-1", 20).unwrap();
        assert_eq!(leading_loss_streak(&recent), 3);
    }
}
