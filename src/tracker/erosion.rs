//! Erosion cap checks
//!
//! Two independent exits. The primary check is regime-scaled and only arms
//! once the peak clears a minimum floor; the secondary check is a fixed
//! peak-relative threshold that arms on hold time instead, so small peaks
//! exempt from the primary check still get protection on older trades.
//! Neither check ever fires while the trade is underwater; that domain
//! belongs to the underwater timeout.

use crate::config::{RegimeTableConfig, TrackerConfig};
use crate::regime::MarketRegime;
use crate::risk::tables::erosion_cap_fraction;
use crate::types::{ExitCheck, ExitReason};

pub fn evaluate(
    peak_pct: f64,
    current_pct: f64,
    held_minutes: i64,
    regime: MarketRegime,
    cfg: &TrackerConfig,
    tables: &RegimeTableConfig,
) -> ExitCheck {
    if current_pct < 0.0 || peak_pct <= 0.0 || current_pct >= peak_pct {
        return ExitCheck::hold();
    }

    let erosion = (peak_pct - current_pct) / peak_pct;

    if peak_pct >= cfg.erosion_min_peak_pct {
        let cap = erosion_cap_fraction(regime, tables);
        if erosion > cap {
            return ExitCheck::exit(
                ExitReason::ErosionCap,
                format!(
                    "gave back {:.0}% of peak {:.2}% (cap {:.0}% in {} regime), now {:.2}%",
                    erosion * 100.0,
                    peak_pct,
                    cap * 100.0,
                    regime,
                    current_pct
                ),
            );
        }
    }

    if held_minutes >= cfg.erosion_secondary_min_hold_minutes
        && erosion >= cfg.erosion_secondary_fraction
    {
        return ExitCheck::exit(
            ExitReason::ErosionTimeGated,
            format!(
                "gave back {:.0}% of peak {:.2}% after {} minutes (limit {:.0}%)",
                erosion * 100.0,
                peak_pct,
                held_minutes,
                cfg.erosion_secondary_fraction * 100.0
            ),
        );
    }

    ExitCheck::hold()
}
