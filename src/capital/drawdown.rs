//! Layer 2: rolling drawdown
//!
//! Compares equity (cumulative realized P&L) against a persisted peak and
//! the trailing-window P&L against pause/reduce thresholds. The peak
//! ratchets upward on new highs and resets to current equity after a run
//! of consecutive wins, so one old spike does not pin a recovered bot in
//! drawdown forever.

use chrono::{DateTime, Duration, Utc};

use crate::config::CapitalConfig;

#[derive(Debug, Clone, PartialEq)]
pub struct DrawdownAssessment {
    pub multiplier: f64,
    /// Fixed-length pause on a rolling-window breach
    pub pause_until: Option<DateTime<Utc>>,
    /// Drawdown-from-peak breach: paused until the BTC gate recovers
    pub indefinite_pause: bool,
    pub reason: Option<String>,
    /// Peak to persist after this evaluation
    pub new_peak_equity: f64,
}

pub fn evaluate(
    current_equity: f64,
    rolling_window_pnl: f64,
    persisted_peak: f64,
    leading_win_run: usize,
    now: DateTime<Utc>,
    cfg: &CapitalConfig,
) -> DrawdownAssessment {
    let peak = if leading_win_run >= cfg.peak_reset_win_run {
        current_equity
    } else {
        persisted_peak.max(current_equity)
    };

    // a bot that has never been in profit still needs a loss denominator;
    // until the peak turns positive, losses are measured against the
    // configured notional instead
    let reference = if peak > 0.0 {
        peak
    } else {
        cfg.drawdown_reference_equity
    };

    let drawdown_pct = if reference > 0.0 {
        (peak - current_equity).max(0.0) / reference * 100.0
    } else {
        0.0
    };

    if drawdown_pct >= cfg.drawdown_stop_pct {
        return DrawdownAssessment {
            multiplier: 0.0,
            pause_until: None,
            indefinite_pause: true,
            reason: Some(format!(
                "drawdown {:.1}% from equity peak {:.2} exceeds stop {:.1}%",
                drawdown_pct, peak, cfg.drawdown_stop_pct
            )),
            new_peak_equity: peak,
        };
    }

    let rolling_loss_pct = if reference > 0.0 && rolling_window_pnl < 0.0 {
        -rolling_window_pnl / reference * 100.0
    } else {
        0.0
    };

    if rolling_loss_pct >= cfg.drawdown_pause_pct {
        return DrawdownAssessment {
            multiplier: 0.0,
            pause_until: Some(now + Duration::hours(cfg.drawdown_pause_hours)),
            indefinite_pause: false,
            reason: Some(format!(
                "{}-day loss {:.1}% of equity base exceeds pause threshold {:.1}%",
                cfg.drawdown_window_days, rolling_loss_pct, cfg.drawdown_pause_pct
            )),
            new_peak_equity: peak,
        };
    }

    if rolling_loss_pct >= cfg.drawdown_reduce_pct {
        return DrawdownAssessment {
            multiplier: 0.5,
            pause_until: None,
            indefinite_pause: false,
            reason: Some(format!(
                "{}-day loss {:.1}% of equity base exceeds reduce threshold {:.1}%",
                cfg.drawdown_window_days, rolling_loss_pct, cfg.drawdown_reduce_pct
            )),
            new_peak_equity: peak,
        };
    }

    DrawdownAssessment {
        multiplier: 1.0,
        pause_until: None,
        indefinite_pause: false,
        reason: None,
        new_peak_equity: peak,
    }
}
