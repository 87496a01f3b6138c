//! Profit lock
//!
//! Once peak profit clears the regime's arming level, a floor at
//! peak x lock-fraction is guaranteed. Stronger regimes retain a smaller
//! fraction so winners can run; weaker regimes lock sooner and tighter.

use crate::config::RegimeTableConfig;
use crate::regime::MarketRegime;
use crate::risk::tables::{lock_fraction, lock_min_peak_pct};
use crate::types::{ExitCheck, ExitReason};

pub fn evaluate(
    peak_pct: f64,
    current_pct: f64,
    regime: MarketRegime,
    tables: &RegimeTableConfig,
) -> ExitCheck {
    let arm_at = lock_min_peak_pct(regime, tables);
    if peak_pct < arm_at {
        return ExitCheck::hold();
    }

    let locked_level = peak_pct * lock_fraction(regime, tables);
    if current_pct <= locked_level {
        return ExitCheck::exit(
            ExitReason::ProfitLock,
            format!(
                "profit {:.2}% fell to locked level {:.2}% (peak {:.2}%, {} regime)",
                current_pct, locked_level, peak_pct, regime
            ),
        );
    }

    ExitCheck::hold()
}
