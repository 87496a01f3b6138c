//! Stage 5: cost floor
//!
//! Round-trip cost = entry fee + exit fee + spread allowance + slippage
//! allowance. The profit target must clear a multiple of that cost and a
//! minimum reward:cost ratio; a target that barely pays the fees is not a
//! trade.

use serde_json::json;

use crate::config::RiskConfig;
use crate::types::{RiskCheck, RiskStage};

/// Total round-trip cost in percent for one unit
pub fn round_trip_cost_pct(cfg: &RiskConfig) -> f64 {
    2.0 * cfg.taker_fee_pct + cfg.spread_allowance_pct + cfg.slippage_allowance_pct
}

pub fn check_cost_floor(pair: &str, profit_target_pct: f64, cfg: &RiskConfig) -> RiskCheck {
    let cost = round_trip_cost_pct(cfg);
    let floor = cfg.cost_floor_multiple * cost;
    let ratio = if cost > 0.0 {
        profit_target_pct / cost
    } else {
        f64::INFINITY
    };

    let diag = json!({
        "pair": pair,
        "profit_target_pct": profit_target_pct,
        "round_trip_cost_pct": cost,
        "required_floor_pct": floor,
        "reward_cost_ratio": ratio,
    });

    if profit_target_pct < floor {
        return RiskCheck::block(
            RiskStage::CostFloor,
            format!(
                "profit target {:.2}% below cost floor {:.2}% ({}x round-trip cost {:.2}%)",
                profit_target_pct, floor, cfg.cost_floor_multiple, cost
            ),
            diag,
        );
    }

    if ratio < cfg.reward_cost_min_ratio {
        return RiskCheck::block(
            RiskStage::CostFloor,
            format!(
                "reward:cost {:.1} below minimum {:.1}",
                ratio, cfg.reward_cost_min_ratio
            ),
            diag,
        );
    }

    RiskCheck::pass(RiskStage::CostFloor, diag)
}
