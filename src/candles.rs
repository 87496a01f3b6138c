//! Candle series primitives
//!
//! A candle series is the engine's only market-history input: strictly
//! ascending timestamps, immutable once formed. The candle interval (15m for
//! pair evaluation, 1d for the BTC trend gate) is a caller contract the
//! engine trusts but does not enforce.

use crate::errors::EngineError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Single OHLCV candle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    pub fn new(
        timestamp: DateTime<Utc>,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    ) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// Price change from open to close, as a percentage of open
    pub fn change_percent(&self) -> f64 {
        if self.open == 0.0 {
            0.0
        } else {
            ((self.close - self.open) / self.open) * 100.0
        }
    }

    /// Bullish candle (close above open)
    pub fn is_green(&self) -> bool {
        self.close > self.open
    }

    fn is_finite(&self) -> bool {
        self.open.is_finite()
            && self.high.is_finite()
            && self.low.is_finite()
            && self.close.is_finite()
            && self.volume.is_finite()
    }
}

/// Validate that a candle series is well-formed: non-empty, strictly
/// ascending timestamps, all-finite values.
pub fn validate_series(candles: &[Candle]) -> Result<(), EngineError> {
    if candles.is_empty() {
        return Err(EngineError::InvalidSeries("empty candle series".to_string()));
    }
    for (i, c) in candles.iter().enumerate() {
        if !c.is_finite() {
            return Err(EngineError::InvalidSeries(format!(
                "non-finite value in candle {} at {}",
                i, c.timestamp
            )));
        }
        if i > 0 && c.timestamp <= candles[i - 1].timestamp {
            return Err(EngineError::InvalidSeries(format!(
                "timestamps not strictly ascending at index {} ({} <= {})",
                i,
                c.timestamp,
                candles[i - 1].timestamp
            )));
        }
    }
    Ok(())
}

/// Percent change between the last close and the close `lookback` candles
/// earlier. Returns 0.0 when the series is too short or the base is zero.
pub fn percent_change(candles: &[Candle], lookback: usize) -> f64 {
    let n = candles.len();
    if n == 0 || lookback == 0 || n <= lookback {
        return 0.0;
    }
    let base = candles[n - 1 - lookback].close;
    let last = candles[n - 1].close;
    if base == 0.0 || !base.is_finite() || !last.is_finite() {
        return 0.0;
    }
    ((last - base) / base) * 100.0
}
