//! Technical indicator snapshot computation
//!
//! `compute_indicators` turns an ordered candle series into one immutable
//! `TechnicalIndicators` snapshot per pair per evaluation cycle. The entry
//! point fails hard below 26 candles; ADX additionally needs 2x its period
//! and degrades to a deliberately low fallback (15.0) on short or malformed
//! data so the downstream risk gate blocks instead of trading blind.
//!
//! EMA seeding note: every EMA here is seeded from the first value and
//! recursed forward (not SMA-seeded). That is a deliberate simplification
//! kept for parity with the platform's historical behavior, not a bug.

use crate::candles::{percent_change, Candle};
use crate::config::IndicatorConfig;
use crate::errors::InsufficientDataError;
use serde::{Deserialize, Serialize};

/// Minimum candle history for any indicator snapshot
pub const MIN_CANDLES: usize = 26;

/// Conservative ADX stand-in when the series is too short or the math
/// produced a non-finite value. Low on purpose: it biases the health gate
/// toward blocking rather than admitting trades on bad data.
pub const ADX_FALLBACK: f64 = 15.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Macd {
    pub value: f64,
    pub signal: f64,
    pub histogram: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BollingerBands {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MovingAverages {
    pub sma20: f64,
    pub sma50: f64,
    pub ema12: f64,
    pub ema26: f64,
}

/// Immutable indicator snapshot for one pair at one evaluation instant
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TechnicalIndicators {
    pub rsi: f64,
    pub macd: Macd,
    pub bollinger: BollingerBands,
    pub moving_averages: MovingAverages,
    pub atr: f64,
    pub obv: f64,
    pub adx: f64,
    pub adx_slope: f64,
    pub momentum_1h: f64,
    pub momentum_4h: f64,
    pub volume_ratio: f64,
    pub ema200: f64,
    pub recent_high: f64,
    pub recent_low: f64,
}

/// Compute the full indicator snapshot from an ordered candle series.
///
/// Fails with `InsufficientDataError` below 26 candles; everything else
/// degrades per-indicator instead of failing (see module docs).
pub fn compute_indicators(
    candles: &[Candle],
    cfg: &IndicatorConfig,
) -> Result<TechnicalIndicators, InsufficientDataError> {
    if candles.len() < MIN_CANDLES {
        return Err(InsufficientDataError {
            required: MIN_CANDLES,
            supplied: candles.len(),
        });
    }

    let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
    let n = closes.len();

    let ema12_series = ema_series(&closes, 12);
    let ema26_series = ema_series(&closes, 26);
    let macd_line: Vec<f64> = ema12_series
        .iter()
        .zip(ema26_series.iter())
        .map(|(a, b)| a - b)
        .collect();
    let signal_series = ema_series(&macd_line, 9);
    let macd_value = macd_line[n - 1];
    let macd_signal = signal_series[n - 1];

    let (adx, adx_slope) = adx_with_slope(candles, cfg.adx_period, cfg.adx_slope_candles);

    let recent = &candles[n.saturating_sub(cfg.recent_window)..];
    let recent_high = recent.iter().map(|c| c.high).fold(f64::MIN, f64::max);
    let recent_low = recent.iter().map(|c| c.low).fold(f64::MAX, f64::min);

    Ok(TechnicalIndicators {
        rsi: rsi(&closes, cfg.rsi_period),
        macd: Macd {
            value: macd_value,
            signal: macd_signal,
            histogram: macd_value - macd_signal,
        },
        bollinger: bollinger(&closes, cfg.bollinger_period, cfg.bollinger_std_dev),
        moving_averages: MovingAverages {
            sma20: sma_last(&closes, 20),
            sma50: sma_last(&closes, 50),
            ema12: ema12_series[n - 1],
            ema26: ema26_series[n - 1],
        },
        atr: atr(candles, cfg.atr_period),
        obv: obv(candles),
        adx,
        adx_slope,
        momentum_1h: percent_change(candles, cfg.momentum_1h_candles),
        momentum_4h: percent_change(candles, cfg.momentum_4h_candles),
        volume_ratio: volume_ratio(candles, cfg.volume_window),
        ema200: ema_long(&closes, cfg.ema_long_period, cfg.ema_long_fallback_period),
        recent_high,
        recent_low,
    })
}

// ============================================================================
// Moving averages
// ============================================================================

/// Simple moving average over the trailing `period` values (or the whole
/// series if shorter)
fn sma_last(values: &[f64], period: usize) -> f64 {
    let window = &values[values.len().saturating_sub(period)..];
    if window.is_empty() {
        return 0.0;
    }
    window.iter().sum::<f64>() / window.len() as f64
}

/// Exponential moving average series seeded from the first value
pub(crate) fn ema_series(values: &[f64], period: usize) -> Vec<f64> {
    let mut out = Vec::with_capacity(values.len());
    if values.is_empty() {
        return out;
    }
    let k = 2.0 / (period as f64 + 1.0);
    let mut ema = values[0];
    out.push(ema);
    for &v in &values[1..] {
        ema = v * k + ema * (1.0 - k);
        out.push(ema);
    }
    out
}

pub(crate) fn ema_last(values: &[f64], period: usize) -> f64 {
    ema_series(values, period).last().copied().unwrap_or(0.0)
}

/// Long EMA with a shortened fallback period when history is thin
fn ema_long(closes: &[f64], period: usize, fallback: usize) -> f64 {
    let effective = if closes.len() >= period {
        period
    } else {
        closes.len().min(fallback)
    };
    ema_last(closes, effective.max(1))
}

// ============================================================================
// RSI
// ============================================================================

/// RSI over the trailing window; neutral 50 when history is short, pinned to
/// 100/0 at the zero-loss/zero-gain extremes
fn rsi(closes: &[f64], period: usize) -> f64 {
    if closes.len() < period + 1 {
        return 50.0;
    }
    let window = &closes[closes.len() - period - 1..];
    let mut gains = 0.0;
    let mut losses = 0.0;
    for pair in window.windows(2) {
        let delta = pair[1] - pair[0];
        if delta > 0.0 {
            gains += delta;
        } else {
            losses += -delta;
        }
    }
    let avg_gain = gains / period as f64;
    let avg_loss = losses / period as f64;

    if avg_loss == 0.0 && avg_gain == 0.0 {
        return 50.0;
    }
    if avg_loss == 0.0 {
        return 100.0;
    }
    if avg_gain == 0.0 {
        return 0.0;
    }
    let rs = avg_gain / avg_loss;
    100.0 - 100.0 / (1.0 + rs)
}

// ============================================================================
// Bollinger bands
// ============================================================================

/// Bollinger bands: SMA middle, population standard deviation bands
fn bollinger(closes: &[f64], period: usize, std_devs: f64) -> BollingerBands {
    let window = &closes[closes.len().saturating_sub(period)..];
    let middle = window.iter().sum::<f64>() / window.len() as f64;
    let variance =
        window.iter().map(|v| (v - middle) * (v - middle)).sum::<f64>() / window.len() as f64;
    let sd = variance.sqrt();
    BollingerBands {
        upper: middle + std_devs * sd,
        middle,
        lower: middle - std_devs * sd,
    }
}

// ============================================================================
// ATR / true range
// ============================================================================

/// True range per candle (index 0 has no previous close and is skipped)
fn true_ranges(candles: &[Candle]) -> Vec<f64> {
    let mut out = vec![f64::NAN; candles.len()];
    for i in 1..candles.len() {
        let prev_close = candles[i - 1].close;
        let c = &candles[i];
        out[i] = (c.high - c.low)
            .max((c.high - prev_close).abs())
            .max((c.low - prev_close).abs());
    }
    out
}

/// ATR as the plain mean of the trailing `period` true ranges
fn atr(candles: &[Candle], period: usize) -> f64 {
    let trs = true_ranges(candles);
    let finite: Vec<f64> = trs.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.is_empty() {
        return 0.0;
    }
    let window = &finite[finite.len().saturating_sub(period)..];
    window.iter().sum::<f64>() / window.len() as f64
}

// ============================================================================
// OBV
// ============================================================================

/// On-balance volume: cumulative signed volume by close direction
fn obv(candles: &[Candle]) -> f64 {
    let mut total = 0.0;
    for i in 1..candles.len() {
        if candles[i].close > candles[i - 1].close {
            total += candles[i].volume;
        } else if candles[i].close < candles[i - 1].close {
            total -= candles[i].volume;
        }
    }
    total
}

// ============================================================================
// ADX (Wilder)
// ============================================================================

/// Wilder smoothing: first output is the average of the first `period`
/// finite inputs, then the standard 1/period recursion.
fn wilder_smooth(values: &[f64], period: usize) -> Vec<f64> {
    let n = values.len();
    let mut out = vec![f64::NAN; n];
    let mut seed_sum = 0.0;
    let mut seed_count = 0usize;
    let mut prev: Option<f64> = None;

    for i in 0..n {
        let v = values[i];
        if !v.is_finite() {
            continue;
        }
        match prev {
            None => {
                seed_sum += v;
                seed_count += 1;
                if seed_count == period {
                    let avg = seed_sum / period as f64;
                    out[i] = avg;
                    prev = Some(avg);
                }
            }
            Some(p) => {
                let s = p + (v - p) / period as f64;
                out[i] = s;
                prev = Some(s);
            }
        }
    }
    out
}

/// Full ADX series aligned with the candle indices (NaN until warm)
fn adx_series(candles: &[Candle], period: usize) -> Vec<f64> {
    let n = candles.len();
    let mut plus_dm = vec![f64::NAN; n];
    let mut minus_dm = vec![f64::NAN; n];

    for i in 1..n {
        let up = candles[i].high - candles[i - 1].high;
        let down = candles[i - 1].low - candles[i].low;
        plus_dm[i] = if up > down && up > 0.0 { up } else { 0.0 };
        minus_dm[i] = if down > up && down > 0.0 { down } else { 0.0 };
    }

    let smooth_tr = wilder_smooth(&true_ranges(candles), period);
    let smooth_plus = wilder_smooth(&plus_dm, period);
    let smooth_minus = wilder_smooth(&minus_dm, period);

    let mut dx = vec![f64::NAN; n];
    for i in 0..n {
        if !smooth_tr[i].is_finite() || smooth_tr[i] == 0.0 {
            continue;
        }
        let plus_di = 100.0 * smooth_plus[i] / smooth_tr[i];
        let minus_di = 100.0 * smooth_minus[i] / smooth_tr[i];
        let di_sum = plus_di + minus_di;
        dx[i] = if di_sum == 0.0 {
            0.0
        } else {
            100.0 * (plus_di - minus_di).abs() / di_sum
        };
    }

    wilder_smooth(&dx, period)
}

/// Current ADX and its slope over `slope_candles` candles.
///
/// Needs 2x period candles; anything less (or a non-finite result) yields
/// the conservative `ADX_FALLBACK` with a flat slope.
fn adx_with_slope(candles: &[Candle], period: usize, slope_candles: usize) -> (f64, f64) {
    if candles.len() < 2 * period {
        return (ADX_FALLBACK, 0.0);
    }
    let series = adx_series(candles, period);
    let n = series.len();
    let current = series[n - 1];
    if !current.is_finite() {
        return (ADX_FALLBACK, 0.0);
    }
    let slope = if slope_candles > 0 && n > slope_candles {
        let prev = series[n - 1 - slope_candles];
        if prev.is_finite() {
            current - prev
        } else {
            0.0
        }
    } else {
        0.0
    };
    (current, slope)
}

// ============================================================================
// Volume
// ============================================================================

/// Current volume divided by the mean volume of the candles preceding it
fn volume_ratio(candles: &[Candle], window: usize) -> f64 {
    let n = candles.len();
    if n < 2 {
        return 1.0;
    }
    let start = (n - 1).saturating_sub(window);
    let baseline = &candles[start..n - 1];
    let mean = baseline.iter().map(|c| c.volume).sum::<f64>() / baseline.len() as f64;
    if mean <= 0.0 || !mean.is_finite() {
        return 1.0;
    }
    candles[n - 1].volume / mean
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::candles::test_support::*;

    fn cfg() -> IndicatorConfig {
        IndicatorConfig::default()
    }

    #[test]
    fn rejects_short_history() {
        let candles = trending_candles(100.0, 0.1, 25);
        let err = compute_indicators(&candles, &cfg()).unwrap_err();
        assert_eq!(err.required, 26);
        assert_eq!(err.supplied, 25);
    }

    #[test]
    fn snapshot_is_finite_and_bounded() {
        let closes: Vec<f64> = (0..60)
            .map(|i| 100.0 + (i as f64 * 0.7).sin() * 2.0 + i as f64 * 0.05)
            .collect();
        let candles = candles_from_closes(&closes);
        let ind = compute_indicators(&candles, &cfg()).unwrap();

        assert!(ind.rsi >= 0.0 && ind.rsi <= 100.0);
        assert!(ind.adx >= 0.0 && ind.adx <= 100.0);
        for v in [
            ind.macd.value,
            ind.macd.signal,
            ind.macd.histogram,
            ind.bollinger.upper,
            ind.bollinger.middle,
            ind.bollinger.lower,
            ind.moving_averages.sma20,
            ind.moving_averages.sma50,
            ind.moving_averages.ema12,
            ind.moving_averages.ema26,
            ind.atr,
            ind.obv,
            ind.adx_slope,
            ind.momentum_1h,
            ind.momentum_4h,
            ind.volume_ratio,
            ind.ema200,
            ind.recent_high,
            ind.recent_low,
        ] {
            assert!(v.is_finite(), "non-finite indicator value: {}", v);
        }
    }

    #[test]
    fn rsi_pins_extremes() {
        let rising: Vec<f64> = (0..30).map(|i| 100.0 + i as f64).collect();
        let falling: Vec<f64> = (0..30).map(|i| 130.0 - i as f64).collect();
        let flat = vec![100.0; 30];
        assert_eq!(rsi(&rising, 14), 100.0);
        assert_eq!(rsi(&falling, 14), 0.0);
        assert_eq!(rsi(&flat, 14), 50.0);
        // short history is neutral, not an error
        assert_eq!(rsi(&rising[..10], 14), 50.0);
    }

    #[test]
    fn macd_is_zero_on_flat_series() {
        let candles = candles_from_closes(&vec![100.0; 40]);
        let ind = compute_indicators(&candles, &cfg()).unwrap();
        assert!(ind.macd.value.abs() < 1e-9);
        assert!(ind.macd.signal.abs() < 1e-9);
        assert!(ind.macd.histogram.abs() < 1e-9);
    }

    #[test]
    fn bollinger_collapses_on_constant_closes() {
        let b = bollinger(&vec![50.0; 25], 20, 2.0);
        assert_eq!(b.upper, 50.0);
        assert_eq!(b.middle, 50.0);
        assert_eq!(b.lower, 50.0);
    }

    #[test]
    fn adx_elevated_in_steady_trend() {
        let candles = trending_candles(100.0, 1.0, 60);
        let ind = compute_indicators(&candles, &cfg()).unwrap();
        assert!(
            ind.adx > 25.0,
            "steady trend should produce elevated ADX, got {}",
            ind.adx
        );
        assert!(ind.adx <= 100.0);
    }

    #[test]
    fn adx_falls_back_below_two_periods() {
        // 26 candles clears the snapshot floor but not the 28-candle ADX need
        let candles = trending_candles(100.0, 1.0, 26);
        let ind = compute_indicators(&candles, &cfg()).unwrap();
        assert_eq!(ind.adx, ADX_FALLBACK);
        assert_eq!(ind.adx_slope, 0.0);
    }

    #[test]
    fn momentum_windows_measure_percent_change() {
        // flat then a clean +4% move over the final 4 candles
        let mut closes = vec![100.0; 40];
        for (k, c) in closes[36..].iter_mut().enumerate() {
            *c = 100.0 + (k + 1) as f64;
        }
        let candles = candles_from_closes(&closes);
        let ind = compute_indicators(&candles, &cfg()).unwrap();
        assert!((ind.momentum_1h - 4.0).abs() < 1e-9);
        assert!((ind.momentum_4h - 4.0).abs() < 1e-9);
    }

    #[test]
    fn volume_ratio_flags_spikes() {
        let mut volumes = vec![1_000.0; 40];
        *volumes.last_mut().unwrap() = 3_000.0;
        let candles = candles_from_closes_volumes(&vec![100.0; 40], &volumes);
        let ind = compute_indicators(&candles, &cfg()).unwrap();
        assert!((ind.volume_ratio - 3.0).abs() < 1e-9);
    }

    #[test]
    fn recent_high_low_use_wicks_not_closes() {
        let candles = trending_candles(100.0, 0.5, 40);
        let ind = compute_indicators(&candles, &cfg()).unwrap();
        let max_close = candles[20..].iter().map(|c| c.close).fold(f64::MIN, f64::max);
        let min_close = candles[20..].iter().map(|c| c.close).fold(f64::MAX, f64::min);
        assert!(ind.recent_high > max_close);
        assert!(ind.recent_low < min_close);
    }

    #[test]
    fn ema_long_uses_fallback_period_on_short_history() {
        let closes: Vec<f64> = (0..40).map(|i| 100.0 + i as f64).collect();
        // 40 candles < 200, so the effective period is min(40, 50) = 40
        let full = ema_long(&closes, 200, 50);
        let expected = ema_last(&closes, 40);
        assert!((full - expected).abs() < 1e-12);
    }
}
