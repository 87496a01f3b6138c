//! Stage 3: entry quality
//!
//! Price-location and momentum admission. The price-top check is
//! regime-aware: a trending market may be entered near its highs (but not
//! after a deep pullback), a non-trending one must not chase the high.
//! Momentum admission is an OR of four independent paths.

use serde_json::json;

use crate::config::{RegimeConfig, RiskConfig};
use crate::indicators::TechnicalIndicators;
use crate::types::{RiskCheck, RiskStage};

pub fn check_entry_quality(
    pair: &str,
    price: f64,
    indicators: &TechnicalIndicators,
    cfg: &RiskConfig,
    regime_cfg: &RegimeConfig,
) -> RiskCheck {
    // the creeping flag relaxes the price-top check only; the pullback
    // momentum path below needs a real ADX trend
    let adx_trending = indicators.adx >= cfg.min_adx_for_entry;
    let trending = adx_trending || regime_cfg.creeping_uptrend_enabled;
    let distance_from_high_pct = if indicators.recent_high > 0.0 {
        (indicators.recent_high - price) / indicators.recent_high * 100.0
    } else {
        0.0
    };

    let diag = json!({
        "pair": pair,
        "price": price,
        "recent_high": indicators.recent_high,
        "distance_from_high_pct": distance_from_high_pct,
        "trending": trending,
        "rsi": indicators.rsi,
        "momentum_1h": indicators.momentum_1h,
        "momentum_4h": indicators.momentum_4h,
        "volume_ratio": indicators.volume_ratio,
        "ema200": indicators.ema200,
    });

    if trending {
        if distance_from_high_pct > cfg.trending_pullback_max_pct {
            return RiskCheck::block(
                RiskStage::EntryQuality,
                format!(
                    "pulled back {:.2}% from recent high, max {:.2}% in a trend",
                    distance_from_high_pct, cfg.trending_pullback_max_pct
                ),
                diag,
            );
        }
    } else if distance_from_high_pct < cfg.near_high_block_pct {
        return RiskCheck::block(
            RiskStage::EntryQuality,
            format!(
                "price within {:.2}% of recent high without a trend",
                distance_from_high_pct
            ),
            diag,
        );
    }

    if cfg.ema200_downtrend_block && indicators.ema200 > 0.0 && price < indicators.ema200 {
        return RiskCheck::block(
            RiskStage::EntryQuality,
            format!(
                "price {:.4} below EMA200 {:.4}",
                price, indicators.ema200
            ),
            diag,
        );
    }

    // extreme overbought blocks no matter the regime
    if indicators.rsi > cfg.rsi_overbought_max {
        return RiskCheck::block(
            RiskStage::EntryQuality,
            format!(
                "RSI {:.1} above overbought max {:.1}",
                indicators.rsi, cfg.rsi_overbought_max
            ),
            diag,
        );
    }

    let m1 = indicators.momentum_1h;
    let m4 = indicators.momentum_4h;

    let path = if m1 >= cfg.momentum_1h_entry_pct {
        Some("momentum_1h")
    } else if m1 >= cfg.momentum_combo_1h_pct && m4 >= cfg.momentum_combo_4h_pct {
        Some("momentum_combo")
    } else if indicators.volume_ratio >= cfg.volume_breakout_ratio && m1 > 0.0 {
        Some("volume_breakout")
    } else if adx_trending && m4 >= cfg.pullback_4h_min_pct && m1 >= cfg.pullback_1h_dip_pct {
        Some("trending_pullback")
    } else {
        None
    };

    match path {
        Some(name) => {
            let mut diag = diag;
            diag["entry_path"] = json!(name);
            RiskCheck::pass(RiskStage::EntryQuality, diag)
        }
        None => RiskCheck::block(
            RiskStage::EntryQuality,
            format!(
                "no momentum path: 1h {:+.2}% / 4h {:+.2}%, volume ratio {:.1}x",
                m1, m4, indicators.volume_ratio
            ),
            diag,
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::test_support::snapshot;

    fn cfgs() -> (RiskConfig, RegimeConfig) {
        (RiskConfig::default(), RegimeConfig::default())
    }

    #[test]
    fn trending_momentum_entry_passes() {
        let (risk, regime) = cfgs();
        let check = check_entry_quality(
            "ETH/USD",
            100.0,
            &snapshot(32.0, 0.0, 1.2, 1.0, 0.5),
            &risk,
            &regime,
        );
        assert!(check.pass);
        assert_eq!(check.diagnostics["entry_path"], "momentum_1h");
    }

    #[test]
    fn non_trending_blocks_near_the_high() {
        let (risk, regime) = cfgs();
        // snapshot recent_high is 102; price 101.8 is 0.2% below it
        let check = check_entry_quality(
            "ETH/USD",
            101.8,
            &snapshot(18.0, 0.0, 1.2, 1.0, 0.5),
            &risk,
            &regime,
        );
        assert!(!check.pass);
        assert!(check.reason.as_deref().unwrap().contains("recent high"));
    }

    #[test]
    fn trend_allows_highs_but_not_deep_pullbacks() {
        let (risk, regime) = cfgs();
        let ind = snapshot(32.0, 0.0, 1.2, 1.0, 0.5);
        // near the high in a trend is fine
        assert!(check_entry_quality("ETH/USD", 101.8, &ind, &risk, &regime).pass);
        // 5% off the high in a trend is a stale entry
        let deep = check_entry_quality("ETH/USD", 96.9, &ind, &risk, &regime);
        assert!(!deep.pass);
        assert!(deep.reason.as_deref().unwrap().contains("pulled back"));
    }

    #[test]
    fn extreme_rsi_blocks_regardless_of_trend() {
        let (risk, regime) = cfgs();
        let mut ind = snapshot(40.0, 2.0, 2.0, 2.0, 0.5);
        ind.rsi = 90.0;
        let check = check_entry_quality("ETH/USD", 100.0, &ind, &risk, &regime);
        assert!(!check.pass);
        assert!(check.reason.as_deref().unwrap().contains("RSI"));
    }

    #[test]
    fn ema200_block_is_opt_in() {
        let (mut risk, regime) = cfgs();
        let mut ind = snapshot(32.0, 0.0, 1.2, 1.0, 0.5);
        ind.ema200 = 105.0;
        // off by default
        assert!(check_entry_quality("ETH/USD", 100.0, &ind, &risk, &regime).pass);
        risk.ema200_downtrend_block = true;
        let check = check_entry_quality("ETH/USD", 100.0, &ind, &risk, &regime);
        assert!(!check.pass);
        assert!(check.reason.as_deref().unwrap().contains("EMA200"));
    }

    #[test]
    fn momentum_paths_are_an_or() {
        let (risk, regime) = cfgs();
        // combo path: 1h 0.6 (below main 0.8) with 4h 1.5
        let combo = check_entry_quality(
            "ETH/USD",
            100.0,
            &snapshot(32.0, 0.0, 0.6, 1.5, 0.5),
            &risk,
            &regime,
        );
        assert_eq!(combo.diagnostics["entry_path"], "momentum_combo");

        // volume breakout: weak momentum but 2x volume
        let mut ind = snapshot(32.0, 0.0, 0.2, 0.0, 0.5);
        ind.volume_ratio = 2.5;
        let breakout = check_entry_quality("ETH/USD", 100.0, &ind, &risk, &regime);
        assert_eq!(breakout.diagnostics["entry_path"], "volume_breakout");

        // trending pullback: shallow 1h dip with positive 4h in a trend
        let pullback = check_entry_quality(
            "ETH/USD",
            100.0,
            &snapshot(32.0, 0.0, -0.2, 0.8, 0.5),
            &risk,
            &regime,
        );
        assert_eq!(pullback.diagnostics["entry_path"], "trending_pullback");

        // nothing qualifies
        let dead = check_entry_quality(
            "ETH/USD",
            100.0,
            &snapshot(32.0, 0.0, -0.6, -0.5, 0.5),
            &risk,
            &regime,
        );
        assert!(!dead.pass);
        assert!(dead.reason.as_deref().unwrap().contains("no momentum path"));
    }

    #[test]
    fn creeping_flag_does_not_arm_the_pullback_path() {
        let (risk, mut regime) = cfgs();
        regime.creeping_uptrend_enabled = true;
        // low ADX, pullback-shaped momentum: would pass path (d) in a real
        // trend, but the creeping flag alone must not open it
        let ind = snapshot(16.0, 0.0, -0.2, 0.8, 0.5);
        let check = check_entry_quality("ETH/USD", 100.0, &ind, &risk, &regime);
        assert!(!check.pass);
        assert!(check.reason.as_deref().unwrap().contains("no momentum path"));

        // the flag still relaxes the price-top check near the high
        let near_high = check_entry_quality(
            "ETH/USD",
            101.8,
            &snapshot(16.0, 0.0, 1.2, 1.0, 0.5),
            &risk,
            &regime,
        );
        assert!(near_high.pass);
    }

    #[test]
    fn deep_dip_fails_the_pullback_path() {
        let (risk, regime) = cfgs();
        // 1h dip of -0.5% is below the -0.3% tolerance
        let check = check_entry_quality(
            "ETH/USD",
            100.0,
            &snapshot(32.0, 0.0, -0.5, 0.8, 0.5),
            &risk,
            &regime,
        );
        assert!(!check.pass);
    }
}
