//! Five-stage entry admission gate
//!
//! Stages run in order and stop at the first failure; only a pass-through
//! of all five permits an entry. Every block is logged with its stage and
//! reason for the audit trail.

pub mod ai_validation;
pub mod cost_floor;
pub mod drop_protection;
pub mod entry_quality;
pub mod health;
pub mod tables;

pub use ai_validation::check_ai_confidence;
pub use cost_floor::check_cost_floor;
pub use drop_protection::check_drop_protection;
pub use entry_quality::check_entry_quality;
pub use health::check_market_health;
pub use tables::{check_pyramid, effective_profit_target};

use chrono::Utc;

use crate::config::EngineConfig;
use crate::context::EngineContext;
use crate::indicators::TechnicalIndicators;
use crate::logger::{log, LogTag};
use crate::regime::RegimeClassification;
use crate::types::{EntryDecision, RiskCheck, Ticker};

/// Stages 1-3, run before the external AI signal is requested. Fail-fast:
/// the returned vector holds every stage up to and including the first
/// failure, so a failed last element means skip the AI call for this pair.
pub fn pre_signal_check(
    pair: &str,
    ticker: &Ticker,
    indicators: &TechnicalIndicators,
    ctx: &EngineContext,
    cfg: &EngineConfig,
) -> Vec<RiskCheck> {
    let mut checks = Vec::with_capacity(3);
    for check in [
        check_market_health(pair, indicators, &cfg.risk),
        check_drop_protection(pair, ticker, indicators, ctx, &cfg.risk, &cfg.general),
        check_entry_quality(pair, ticker.last, indicators, &cfg.risk, &cfg.regime),
    ] {
        let passed = check.pass;
        checks.push(check);
        if !passed {
            break;
        }
    }
    checks
}

/// Run the full gate for one pair. `ai_confidence` comes from the external
/// signal generator; stages 1-3 never look at it.
pub fn evaluate_entry(
    pair: &str,
    ticker: &Ticker,
    indicators: &TechnicalIndicators,
    regime: &RegimeClassification,
    ai_confidence: f64,
    ctx: &EngineContext,
    cfg: &EngineConfig,
) -> EntryDecision {
    let profit_target_pct =
        effective_profit_target(regime.regime, indicators.adx_slope, &cfg.risk, &cfg.tables);

    let mut checks = pre_signal_check(pair, ticker, indicators, ctx, cfg);
    if checks.last().map_or(false, |c| c.pass) {
        for check in [
            check_ai_confidence(pair, ai_confidence, None, &cfg.risk),
            check_cost_floor(pair, profit_target_pct, &cfg.risk),
        ] {
            let passed = check.pass;
            checks.push(check);
            if !passed {
                break;
            }
        }
    }

    if let Some(failed) = checks.iter().find(|c| !c.pass) {
        let failed_stage = failed.stage;
        let reason = failed.reason.clone();
        log(
            LogTag::Risk,
            "BLOCK",
            &format!(
                "{} stage {} ({}): {}",
                pair,
                failed_stage.number(),
                failed_stage.as_str(),
                reason.as_deref().unwrap_or("no reason")
            ),
        );
        return EntryDecision {
            approved: false,
            pair: pair.to_string(),
            checks,
            failed_stage: Some(failed_stage),
            reason,
            profit_target_pct,
            evaluated_at: Utc::now(),
        };
    }

    log(
        LogTag::Risk,
        "ALLOW",
        &format!(
            "{} passed all stages, regime {} target {:.2}%",
            pair, regime.regime, profit_target_pct
        ),
    );

    EntryDecision {
        approved: true,
        pair: pair.to_string(),
        checks,
        failed_stage: None,
        reason: None,
        profit_target_pct,
        evaluated_at: Utc::now(),
    }
}
