//! Regime-parameterized lookup tables
//!
//! Profit targets, erosion caps, and profit-lock parameters are keyed by
//! regime. The moderate row is the default posture; a falling ADX slope
//! demotes a strong regime's profit target back to the moderate value so a
//! position is not held for an unrealistic target while the trend exhausts.

use serde_json::json;

use crate::config::{RegimeTableConfig, RiskConfig};
use crate::regime::MarketRegime;
use crate::types::{RiskCheck, RiskStage};

pub fn profit_target_pct(regime: MarketRegime, t: &RegimeTableConfig) -> f64 {
    match regime {
        MarketRegime::Choppy => t.profit_target_choppy_pct,
        MarketRegime::Transitioning => t.profit_target_transitioning_pct,
        MarketRegime::Weak => t.profit_target_weak_pct,
        MarketRegime::Moderate => t.profit_target_moderate_pct,
        MarketRegime::Strong => t.profit_target_strong_pct,
    }
}

/// Maximum fraction of peak profit a trade may give back before forced exit
pub fn erosion_cap_fraction(regime: MarketRegime, t: &RegimeTableConfig) -> f64 {
    match regime {
        MarketRegime::Choppy => t.erosion_cap_choppy,
        MarketRegime::Transitioning => t.erosion_cap_transitioning,
        MarketRegime::Weak => t.erosion_cap_weak,
        MarketRegime::Moderate => t.erosion_cap_moderate,
        MarketRegime::Strong => t.erosion_cap_strong,
    }
}

/// Fraction of peak profit the lock guarantees once armed
pub fn lock_fraction(regime: MarketRegime, t: &RegimeTableConfig) -> f64 {
    match regime {
        MarketRegime::Choppy => t.lock_fraction_choppy,
        MarketRegime::Transitioning => t.lock_fraction_transitioning,
        MarketRegime::Weak => t.lock_fraction_weak,
        MarketRegime::Moderate => t.lock_fraction_moderate,
        MarketRegime::Strong => t.lock_fraction_strong,
    }
}

/// Peak profit (percent) required before the lock arms
pub fn lock_min_peak_pct(regime: MarketRegime, t: &RegimeTableConfig) -> f64 {
    match regime {
        MarketRegime::Choppy => t.lock_min_peak_choppy_pct,
        MarketRegime::Transitioning => t.lock_min_peak_transitioning_pct,
        MarketRegime::Weak => t.lock_min_peak_weak_pct,
        MarketRegime::Moderate => t.lock_min_peak_moderate_pct,
        MarketRegime::Strong => t.lock_min_peak_strong_pct,
    }
}

/// Profit target after the ADX-slope downgrade: a strong regime whose slope
/// has turned down is paid the moderate target instead.
pub fn effective_profit_target(
    regime: MarketRegime,
    adx_slope: f64,
    risk: &RiskConfig,
    t: &RegimeTableConfig,
) -> f64 {
    if regime == MarketRegime::Strong && adx_slope <= risk.adx_falling_slope {
        t.profit_target_moderate_pct
    } else {
        profit_target_pct(regime, t)
    }
}

/// Minimum AI confidence for adding unit `level` to an open position.
/// Level 1 is the base entry and is gated by the main pipeline instead.
pub fn pyramid_min_confidence(level: u32, risk: &RiskConfig) -> f64 {
    match level {
        0 | 1 => 0.0,
        2 => risk.pyramid_confidence_l2,
        3 => risk.pyramid_confidence_l3,
        _ => risk.pyramid_confidence_deep,
    }
}

/// Gate for pyramiding into an existing position: deeper units need
/// strictly higher conviction.
pub fn check_pyramid(pair: &str, level: u32, ai_confidence: f64, risk: &RiskConfig) -> RiskCheck {
    let required = pyramid_min_confidence(level, risk);
    let diag = json!({
        "pair": pair,
        "level": level,
        "ai_confidence": ai_confidence,
        "required": required,
    });
    if ai_confidence >= required {
        RiskCheck::pass(RiskStage::AiValidation, diag)
    } else {
        RiskCheck::block(
            RiskStage::AiValidation,
            format!(
                "pyramid level {} needs confidence >= {:.0}, got {:.0}",
                level, required, ai_confidence
            ),
            diag,
        )
    }
}
