//! Market regime classification
//!
//! Pure function of the indicator snapshot: ADX bands set the regime, a
//! regime x momentum-alignment table sets the confidence, and a volatility
//! penalty trims overheated markets. The transition band (12..20 ADX) only
//! upgrades out of choppy when the ADX slope confirms a building trend.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::candles::Candle;
use crate::config::RegimeConfig;
use crate::indicators::TechnicalIndicators;

/// Trend-strength regime, ordered weakest to strongest
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketRegime {
    Choppy,
    Transitioning,
    Weak,
    Moderate,
    Strong,
}

impl MarketRegime {
    pub fn as_str(&self) -> &'static str {
        match self {
            MarketRegime::Choppy => "choppy",
            MarketRegime::Transitioning => "transitioning",
            MarketRegime::Weak => "weak",
            MarketRegime::Moderate => "moderate",
            MarketRegime::Strong => "strong",
        }
    }
}

impl std::fmt::Display for MarketRegime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegimeClassification {
    pub regime: MarketRegime,
    /// 0..100
    pub confidence: f64,
    /// "up" / "down" / "mixed" / "flat" by momentum signs
    pub trend: String,
    /// ATR as a percent of the last close
    pub volatility: f64,
    pub analysis: String,
    pub timestamp: DateTime<Utc>,
}

/// Classify the market regime from the latest indicator snapshot.
pub fn classify(
    candles: &[Candle],
    indicators: &TechnicalIndicators,
    cfg: &RegimeConfig,
) -> RegimeClassification {
    let regime = regime_from_adx(indicators.adx, indicators.adx_slope, cfg);

    let price = candles.last().map(|c| c.close).unwrap_or(0.0);
    let volatility = if price > 0.0 {
        indicators.atr / price * 100.0
    } else {
        0.0
    };

    let m1 = indicators.momentum_1h;
    let m4 = indicators.momentum_4h;
    let both_positive = m1 > 0.0 && m4 > 0.0;
    let both_negative = m1 < 0.0 && m4 < 0.0;
    let misaligned = (m1 > 0.0 && m4 < 0.0) || (m1 < 0.0 && m4 > 0.0);

    let mut analysis = format!(
        "adx {:.1} (slope {:+.1}), momentum 1h {:+.2}% / 4h {:+.2}%",
        indicators.adx, indicators.adx_slope, m1, m4
    );

    let mut confidence = if both_negative {
        35.0
    } else if misaligned {
        // disagreement between windows is never a conviction setup
        match regime {
            MarketRegime::Strong => 50.0,
            MarketRegime::Moderate => 48.0,
            MarketRegime::Weak => 45.0,
            MarketRegime::Transitioning => 42.0,
            MarketRegime::Choppy => 35.0,
        }
    } else if both_positive {
        match regime {
            MarketRegime::Strong => 78.0,
            MarketRegime::Moderate => 72.0,
            MarketRegime::Weak => 65.0,
            MarketRegime::Transitioning => 58.0,
            MarketRegime::Choppy => {
                // choppy only earns a tradable score on an extreme aligned move
                if m1 >= cfg.extreme_momentum_pct {
                    62.0
                } else {
                    45.0
                }
            }
        }
    } else {
        // at least one window flat
        match regime {
            MarketRegime::Strong => 60.0,
            MarketRegime::Moderate => 55.0,
            MarketRegime::Weak => 50.0,
            MarketRegime::Transitioning => 45.0,
            MarketRegime::Choppy => 38.0,
        }
    };

    if cfg.creeping_uptrend_enabled
        && both_positive
        && volatility <= cfg.creeping_max_volatility_pct
        && matches!(regime, MarketRegime::Weak | MarketRegime::Transitioning)
        && confidence < 68.0
    {
        confidence = 68.0;
        analysis.push_str(", creeping uptrend");
    }

    if volatility > cfg.high_volatility_pct {
        confidence = (confidence - cfg.volatility_penalty).max(35.0);
        analysis.push_str(&format!(", high volatility {:.1}%", volatility));
    }

    confidence = confidence.clamp(0.0, 100.0);

    let trend = if both_positive {
        "up"
    } else if both_negative {
        "down"
    } else if misaligned {
        "mixed"
    } else {
        "flat"
    };

    RegimeClassification {
        regime,
        confidence,
        trend: trend.to_string(),
        volatility,
        analysis,
        timestamp: Utc::now(),
    }
}

/// ADX band lookup. The transition band requires a confirming slope;
/// otherwise it stays choppy.
fn regime_from_adx(adx: f64, adx_slope: f64, cfg: &RegimeConfig) -> MarketRegime {
    if adx >= cfg.strong_min_adx {
        MarketRegime::Strong
    } else if adx >= cfg.moderate_min_adx {
        MarketRegime::Moderate
    } else if adx >= cfg.weak_min_adx {
        MarketRegime::Weak
    } else if adx >= cfg.choppy_max_adx && adx_slope >= cfg.adx_rising_slope {
        MarketRegime::Transitioning
    } else {
        MarketRegime::Choppy
    }
}
