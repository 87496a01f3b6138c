//! Stage 2: drop protection
//!
//! Vetoes entries during market-wide stress: a BTC dump (read from the
//! shared per-cycle momentum cell), panic selling on a volume spike with
//! negative momentum, or an excessive bid/ask spread. BTC pairs skip the
//! BTC dump veto since they ARE the reference asset.

use serde_json::json;

use crate::config::{GeneralConfig, RiskConfig};
use crate::context::EngineContext;
use crate::indicators::TechnicalIndicators;
use crate::types::{RiskCheck, RiskStage, Ticker};

pub fn check_drop_protection(
    pair: &str,
    ticker: &Ticker,
    indicators: &TechnicalIndicators,
    ctx: &EngineContext,
    cfg: &RiskConfig,
    general: &GeneralConfig,
) -> RiskCheck {
    let btc_momentum = ctx.btc_momentum();
    let spread = ticker.spread_percent();

    let diag = json!({
        "pair": pair,
        "btc_momentum_1h": btc_momentum,
        "volume_ratio": indicators.volume_ratio,
        "momentum_1h": indicators.momentum_1h,
        "spread_pct": spread,
    });

    let is_btc_pair = pair.starts_with(&general.btc_pair_prefix);
    if !is_btc_pair {
        if let Some(m) = btc_momentum {
            if m < cfg.btc_dump_threshold_pct {
                return RiskCheck::block(
                    RiskStage::DropProtection,
                    format!(
                        "BTC dumping: 1h momentum {:+.2}% below {:.2}%",
                        m, cfg.btc_dump_threshold_pct
                    ),
                    diag,
                );
            }
        }
    }

    // a spike with positive momentum is a breakout, not panic
    if indicators.volume_ratio > cfg.volume_spike_cap
        && indicators.momentum_1h < cfg.panic_momentum_pct
    {
        return RiskCheck::block(
            RiskStage::DropProtection,
            format!(
                "volume panic: ratio {:.1}x with momentum {:+.2}%",
                indicators.volume_ratio, indicators.momentum_1h
            ),
            diag,
        );
    }

    if ticker.is_degenerate() {
        return RiskCheck::block(
            RiskStage::DropProtection,
            format!(
                "degenerate quote: bid {:.4} / ask {:.4}",
                ticker.bid, ticker.ask
            ),
            diag,
        );
    }

    if spread > cfg.max_spread_pct {
        return RiskCheck::block(
            RiskStage::DropProtection,
            format!("spread {:.2}% above max {:.2}%", spread, cfg.max_spread_pct),
            diag,
        );
    }

    RiskCheck::pass(RiskStage::DropProtection, diag)
}
