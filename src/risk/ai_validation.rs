//! Stage 4: AI confidence validation
//!
//! One global threshold across all regimes. The upstream signal generator
//! is expected to already encode regime into its confidence number, so the
//! gate stays regime-blind on purpose.

use serde_json::json;

use crate::config::RiskConfig;
use crate::types::{RiskCheck, RiskStage};

pub fn check_ai_confidence(
    pair: &str,
    confidence: f64,
    threshold_override: Option<f64>,
    cfg: &RiskConfig,
) -> RiskCheck {
    let required = threshold_override.unwrap_or(cfg.ai_confidence_min);
    let diag = json!({
        "pair": pair,
        "ai_confidence": confidence,
        "required": required,
        "override": threshold_override.is_some(),
    });

    if !confidence.is_finite() || !(0.0..=100.0).contains(&confidence) {
        return RiskCheck::block(
            RiskStage::AiValidation,
            format!("AI confidence out of range: {}", confidence),
            diag,
        );
    }

    if confidence >= required {
        RiskCheck::pass(RiskStage::AiValidation, diag)
    } else {
        RiskCheck::block(
            RiskStage::AiValidation,
            format!(
                "AI confidence {:.0} below minimum {:.0}",
                confidence, required
            ),
            diag,
        )
    }
}
