//! Stage 1: market health
//!
//! ADX-based tradability gate. The transition zone admits an entry only when
//! the slope AND 1h momentum both confirm; either alone is treated as a
//! false breakout.

use serde_json::json;

use crate::config::RiskConfig;
use crate::indicators::TechnicalIndicators;
use crate::types::{RiskCheck, RiskStage};

pub fn check_market_health(
    pair: &str,
    indicators: &TechnicalIndicators,
    cfg: &RiskConfig,
) -> RiskCheck {
    let adx = indicators.adx;
    let slope = indicators.adx_slope;
    let m1 = indicators.momentum_1h;

    let diag = json!({
        "pair": pair,
        "adx": adx,
        "adx_slope": slope,
        "momentum_1h": m1,
        "min_adx_for_entry": cfg.min_adx_for_entry,
        "transition_min": cfg.adx_transition_min,
    });

    if !adx.is_finite() || adx <= 0.0 {
        return RiskCheck::block(
            RiskStage::Health,
            format!("ADX unavailable ({})", adx),
            diag,
        );
    }

    if adx >= cfg.min_adx_for_entry {
        return RiskCheck::pass(RiskStage::Health, diag);
    }

    if adx >= cfg.adx_transition_min {
        let slope_ok = slope >= cfg.adx_rising_slope;
        let momentum_ok = m1 >= cfg.health_momentum_override_pct;
        if slope_ok && momentum_ok {
            return RiskCheck::pass(RiskStage::Health, diag);
        }
        return RiskCheck::block(
            RiskStage::Health,
            format!(
                "choppy market: ADX {:.1} in transition zone without confirmation \
                 (slope {:+.2} needs >= {:.2}, momentum {:+.2}% needs >= {:.2}%)",
                adx, slope, cfg.adx_rising_slope, m1, cfg.health_momentum_override_pct
            ),
            diag,
        );
    }

    RiskCheck::block(
        RiskStage::Health,
        format!(
            "choppy market: ADX {:.1} below transition minimum {:.1}",
            adx, cfg.adx_transition_min
        ),
        diag,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::test_support::snapshot;

    fn cfg() -> RiskConfig {
        RiskConfig::default()
    }

    #[test]
    fn trending_adx_passes() {
        let check = check_market_health("ETH/USD", &snapshot(32.0, 0.0, 1.2, 1.0, 0.5), &cfg());
        assert!(check.pass);
        assert_eq!(check.stage, RiskStage::Health);
    }

    #[test]
    fn low_adx_blocks_as_choppy() {
        // ADX 15 sits in the transition zone but has no confirmation
        let check = check_market_health("ETH/USD", &snapshot(15.0, 0.0, 0.0, 0.0, 0.5), &cfg());
        assert!(!check.pass);
        assert!(check.reason.as_deref().unwrap().contains("choppy"));
    }

    #[test]
    fn transition_zone_needs_both_confirmations() {
        // slope alone is not enough
        let slope_only = check_market_health("ETH/USD", &snapshot(15.0, 2.0, 0.1, 0.0, 0.5), &cfg());
        assert!(!slope_only.pass);
        // momentum alone is not enough
        let momentum_only =
            check_market_health("ETH/USD", &snapshot(15.0, 0.2, 1.0, 0.0, 0.5), &cfg());
        assert!(!momentum_only.pass);
        // both together admit the entry
        let both = check_market_health("ETH/USD", &snapshot(15.0, 2.0, 1.0, 0.0, 0.5), &cfg());
        assert!(both.pass);
    }

    #[test]
    fn missing_adx_blocks() {
        let zero = check_market_health("ETH/USD", &snapshot(0.0, 0.0, 1.0, 1.0, 0.5), &cfg());
        assert!(!zero.pass);
        let nan = check_market_health("ETH/USD", &snapshot(f64::NAN, 0.0, 1.0, 1.0, 0.5), &cfg());
        assert!(!nan.pass);
    }

    #[test]
    fn below_transition_zone_blocks_regardless_of_confirmation() {
        let check = check_market_health("ETH/USD", &snapshot(8.0, 5.0, 3.0, 3.0, 0.5), &cfg());
        assert!(!check.pass);
        assert!(check.reason.as_deref().unwrap().contains("choppy"));
    }
}
