//! Shared decision and market-input types
//!
//! Everything the engine reports to the orchestrator (stage results, exit
//! signals, capital decisions) is a typed result so audit logging and order
//! placement can consume them without string parsing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Live ticker snapshot from the exchange adapter
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Ticker {
    pub bid: f64,
    pub ask: f64,
    pub last: f64,
}

impl Ticker {
    /// Crossed or otherwise unusable book: ask under bid, non-positive or
    /// non-finite sides. A sign of market stress, never a tradeable quote.
    pub fn is_degenerate(&self) -> bool {
        !self.bid.is_finite() || !self.ask.is_finite() || self.bid <= 0.0 || self.ask < self.bid
    }

    /// Bid/ask spread as a percentage of the mid price.
    /// Returns 0.0 for degenerate quotes; callers gate on `is_degenerate`
    /// first rather than reading that as a perfect spread.
    pub fn spread_percent(&self) -> f64 {
        if self.is_degenerate() {
            return 0.0;
        }
        ((self.ask - self.bid) / ((self.bid + self.ask) / 2.0)) * 100.0
    }
}

/// The five risk gate stages, in evaluation order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RiskStage {
    Health = 1,
    DropProtection = 2,
    EntryQuality = 3,
    AiValidation = 4,
    CostFloor = 5,
}

impl RiskStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskStage::Health => "health",
            RiskStage::DropProtection => "drop_protection",
            RiskStage::EntryQuality => "entry_quality",
            RiskStage::AiValidation => "ai_validation",
            RiskStage::CostFloor => "cost_floor",
        }
    }

    pub fn number(&self) -> u8 {
        *self as u8
    }
}

/// Result of a single risk gate stage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskCheck {
    pub pass: bool,
    pub stage: RiskStage,
    pub reason: Option<String>,
    /// Numeric context for audit logging (thresholds vs. observed values)
    pub diagnostics: serde_json::Value,
}

impl RiskCheck {
    pub fn pass(stage: RiskStage, diagnostics: serde_json::Value) -> Self {
        Self {
            pass: true,
            stage,
            reason: None,
            diagnostics,
        }
    }

    pub fn block(stage: RiskStage, reason: String, diagnostics: serde_json::Value) -> Self {
        Self {
            pass: false,
            stage,
            reason: Some(reason),
            diagnostics,
        }
    }
}

/// Why a position-tracker check wants the trade closed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExitReason {
    ErosionCap,
    ErosionTimeGated,
    ProfitLock,
    ProfitCollapse,
    UnderwaterStop,
}

impl ExitReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExitReason::ErosionCap => "erosion_cap",
            ExitReason::ErosionTimeGated => "erosion_time_gated",
            ExitReason::ProfitLock => "profit_lock",
            ExitReason::ProfitCollapse => "profit_collapse",
            ExitReason::UnderwaterStop => "underwater_stop",
        }
    }
}

/// Result of one exit check against an open trade
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExitCheck {
    pub should_exit: bool,
    pub reason: Option<ExitReason>,
    pub detail: Option<String>,
}

impl ExitCheck {
    pub fn hold() -> Self {
        Self {
            should_exit: false,
            reason: None,
            detail: None,
        }
    }

    pub fn exit(reason: ExitReason, detail: String) -> Self {
        Self {
            should_exit: true,
            reason: Some(reason),
            detail: Some(detail),
        }
    }
}

/// Final per-pair entry verdict from the decision engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryDecision {
    pub approved: bool,
    pub pair: String,
    /// All stage results up to and including the first failure
    pub checks: Vec<RiskCheck>,
    pub failed_stage: Option<RiskStage>,
    pub reason: Option<String>,
    /// Regime-parameterized profit target (after any slope demotion)
    pub profit_target_pct: f64,
    pub evaluated_at: DateTime<Utc>,
}

/// Account-level capital preservation verdict, one per bot per cycle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapitalDecision {
    pub allow_trading: bool,
    /// Multiplier the orchestrator applies to any approved entry size
    pub size_multiplier: f64,
    pub reason: Option<String>,
    pub paused_until: Option<DateTime<Utc>>,
}
