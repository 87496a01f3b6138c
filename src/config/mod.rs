//! Engine configuration
//!
//! Every threshold the decision pipeline uses lives here, defined once with
//! its default via `config_struct!`. The config is loaded and validated a
//! single time at startup and passed by `Arc<EngineConfig>` into each
//! component; hot-path decision functions never re-read global state.

pub mod macros;

use crate::config_struct;
use anyhow::{Context, Result};
use std::path::Path;

// ============================================================================
// INDICATOR CONFIGURATION
// ============================================================================

config_struct! {
    /// Periods and windows for the technical indicator snapshot.
    /// Momentum windows assume 15-minute candles (4 candles = 1 hour).
    pub struct IndicatorConfig {
        rsi_period: usize = 14,
        atr_period: usize = 14,
        adx_period: usize = 14,
        bollinger_period: usize = 20,
        bollinger_std_dev: f64 = 2.0,
        momentum_1h_candles: usize = 4,
        momentum_4h_candles: usize = 16,
        volume_window: usize = 20,
        recent_window: usize = 20,
        ema_long_period: usize = 200,
        ema_long_fallback_period: usize = 50,
        /// How many candles back the ADX slope looks (4 = one hour at 15m)
        adx_slope_candles: usize = 4,
    }
}

// ============================================================================
// REGIME CLASSIFICATION
// ============================================================================

config_struct! {
    /// ADX band boundaries and confidence shaping for regime classification
    pub struct RegimeConfig {
        /// Below this ADX the market is always choppy
        choppy_max_adx: f64 = 12.0,
        /// At or above this ADX the regime is at least weak
        weak_min_adx: f64 = 20.0,
        moderate_min_adx: f64 = 30.0,
        strong_min_adx: f64 = 35.0,
        /// ADX slope at or above this counts as rising (transition zone)
        adx_rising_slope: f64 = 1.0,
        /// Treat slow grinding uptrends as tradeable despite weak ADX
        creeping_uptrend_enabled: bool = false,
        /// Max ATR/price (percent) for a market to count as creeping
        creeping_max_volatility_pct: f64 = 1.5,
        /// ATR/price (percent) above which the volatility penalty applies
        high_volatility_pct: f64 = 3.0,
        volatility_penalty: f64 = 15.0,
        /// 1h momentum needed for choppy markets to admit at all
        extreme_momentum_pct: f64 = 1.5,
    }
}

// ============================================================================
// RISK GATE (five stages)
// ============================================================================

config_struct! {
    /// Thresholds for the five-stage entry admission filter
    pub struct RiskConfig {
        // Stage 1: market health
        min_adx_for_entry: f64 = 20.0,
        adx_transition_min: f64 = 12.0,
        adx_rising_slope: f64 = 1.0,
        /// 1h momentum required alongside a rising slope to trade the
        /// transition zone (both are required, never one alone)
        health_momentum_override_pct: f64 = 0.5,

        // Stage 2: drop protection
        btc_dump_threshold_pct: f64 = -1.5,
        volume_spike_cap: f64 = 3.0,
        /// 1h momentum below this plus a volume spike is panic selling
        panic_momentum_pct: f64 = -0.5,
        max_spread_pct: f64 = 0.8,

        // Stage 3: entry quality
        near_high_block_pct: f64 = 0.5,
        /// In a trend, block entries that already pulled back more than this
        /// from the recent high
        trending_pullback_max_pct: f64 = 3.0,
        ema200_downtrend_block: bool = false,
        rsi_overbought_max: f64 = 85.0,
        momentum_1h_entry_pct: f64 = 0.8,
        momentum_combo_1h_pct: f64 = 0.5,
        momentum_combo_4h_pct: f64 = 1.0,
        volume_breakout_ratio: f64 = 2.0,
        pullback_4h_min_pct: f64 = 0.5,
        /// Shallow 1h dip tolerated for the trending-pullback entry path
        pullback_1h_dip_pct: f64 = -0.3,

        // Stage 4: AI validation
        ai_confidence_min: f64 = 70.0,

        // Stage 5: cost floor
        taker_fee_pct: f64 = 0.26,
        spread_allowance_pct: f64 = 0.10,
        slippage_allowance_pct: f64 = 0.10,
        cost_floor_multiple: f64 = 3.0,
        reward_cost_min_ratio: f64 = 2.0,

        /// ADX slope at or below this demotes a strong regime's profit
        /// target to the moderate value
        adx_falling_slope: f64 = -1.0,

        // Pyramiding: deeper units need stricter AI confidence
        pyramid_confidence_l2: f64 = 75.0,
        pyramid_confidence_l3: f64 = 80.0,
        pyramid_confidence_deep: f64 = 85.0,
    }
}

// ============================================================================
// REGIME-PARAMETERIZED TABLES
// ============================================================================

config_struct! {
    /// Per-regime profit targets, erosion caps, and profit-lock parameters
    pub struct RegimeTableConfig {
        profit_target_choppy_pct: f64 = 1.0,
        profit_target_transitioning_pct: f64 = 1.5,
        profit_target_weak_pct: f64 = 2.0,
        profit_target_moderate_pct: f64 = 2.5,
        profit_target_strong_pct: f64 = 3.5,

        erosion_cap_choppy: f64 = 0.25,
        erosion_cap_transitioning: f64 = 0.30,
        erosion_cap_weak: f64 = 0.35,
        erosion_cap_moderate: f64 = 0.40,
        erosion_cap_strong: f64 = 0.50,

        // Fraction of peak profit retained by the lock; stronger regimes
        // retain less so winners can run
        lock_fraction_choppy: f64 = 0.80,
        lock_fraction_transitioning: f64 = 0.75,
        lock_fraction_weak: f64 = 0.70,
        lock_fraction_moderate: f64 = 0.60,
        lock_fraction_strong: f64 = 0.50,

        lock_min_peak_choppy_pct: f64 = 0.8,
        lock_min_peak_transitioning_pct: f64 = 0.8,
        lock_min_peak_weak_pct: f64 = 1.0,
        lock_min_peak_moderate_pct: f64 = 1.2,
        lock_min_peak_strong_pct: f64 = 1.5,
    }
}

// ============================================================================
// POSITION TRACKER
// ============================================================================

config_struct! {
    /// Peak-profit protection state machine thresholds
    pub struct TrackerConfig {
        /// Primary erosion check only applies once peak reached this
        erosion_min_peak_pct: f64 = 1.0,
        /// Secondary peak-relative erosion threshold (fraction of peak)
        erosion_secondary_fraction: f64 = 0.40,
        erosion_secondary_min_hold_minutes: i64 = 30,
        /// Once peak reached this, the underwater stop ratchets to breakeven
        meaningful_profit_pct: f64 = 1.0,
        /// Default absolute stop for trades that never saw meaningful profit
        underwater_threshold_pct: f64 = -0.8,
        underwater_min_hold_minutes: i64 = 15,
    }
}

// ============================================================================
// CAPITAL PRESERVATION
// ============================================================================

config_struct! {
    /// Account-level circuit breaker configuration
    pub struct CapitalConfig {
        btc_trend_enabled: bool = true,
        btc_trend_symbol: String = "BTC/USD".to_string(),
        btc_ema_short_period: usize = 20,
        btc_ema_long_period: usize = 50,
        btc_trend_cache_ttl_secs: u64 = 3600,
        /// Deliberately opportunistic: below the long EMA trading continues
        /// at a small fraction instead of a hard block
        btc_below_long_multiplier: f64 = 0.25,
        btc_below_short_multiplier: f64 = 0.5,

        drawdown_window_days: i64 = 7,
        drawdown_stop_pct: f64 = 20.0,
        drawdown_pause_pct: f64 = 10.0,
        drawdown_reduce_pct: f64 = 5.0,
        drawdown_pause_hours: i64 = 24,
        /// Notional account size used as the loss denominator while the
        /// realized-P&L peak has not yet turned positive
        drawdown_reference_equity: f64 = 1_000.0,
        /// Consecutive wins that reset the persisted equity peak
        peak_reset_win_run: usize = 3,

        streak_pause_count: usize = 6,
        streak_quarter_count: usize = 5,
        streak_half_count: usize = 3,
        streak_pause_hours: i64 = 12,
        /// How many recent closed trades the streak counter inspects
        streak_lookback_trades: usize = 20,

        combined_multiplier_floor: f64 = 0.25,
    }
}

// ============================================================================
// ENGINE / STORAGE / FEED
// ============================================================================

config_struct! {
    /// Engine-level knobs outside any single pipeline stage
    pub struct GeneralConfig {
        log_level: String = "info".to_string(),
        /// Pairs are blocked from re-entry for this long after a close
        reentry_cooldown_minutes: i64 = 15,
        /// Pairs whose base asset is BTC skip the BTC dump veto
        btc_pair_prefix: String = "BTC".to_string(),
    }
}

config_struct! {
    pub struct StorageConfig {
        db_path: String = "trendguard.db".to_string(),
    }
}

config_struct! {
    /// BTC daily-candle feed for the trend gate. The URL must return a JSON
    /// array of [timestamp, open, high, low, close, volume] rows.
    pub struct FeedConfig {
        btc_daily_url: String = "".to_string(),
        request_timeout_secs: u64 = 10,
        daily_candle_limit: usize = 120,
    }
}

// ============================================================================
// TOP-LEVEL CONFIG
// ============================================================================

#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub general: GeneralConfig,
    pub indicators: IndicatorConfig,
    pub regime: RegimeConfig,
    pub risk: RiskConfig,
    pub tables: RegimeTableConfig,
    pub tracker: TrackerConfig,
    pub capital: CapitalConfig,
    pub storage: StorageConfig,
    pub feed: FeedConfig,
}

impl EngineConfig {
    /// Load configuration from a TOML file, creating it with defaults when it
    /// does not exist yet.
    pub fn load(path: &str) -> Result<Self> {
        if !Path::new(path).exists() {
            let default_config = Self::default();
            default_config.save(path)?;
            return Ok(default_config);
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path))?;

        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &str) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path))?;
        Ok(())
    }

    /// Sanity-check thresholds, listing every offending field at once
    pub fn validate(&self) -> Result<()> {
        let mut problems: Vec<String> = Vec::new();

        if self.indicators.rsi_period == 0 {
            problems.push("indicators.rsi_period must be >= 1".to_string());
        }
        if self.indicators.adx_period == 0 {
            problems.push("indicators.adx_period must be >= 1".to_string());
        }
        if self.indicators.bollinger_period < 2 {
            problems.push("indicators.bollinger_period must be >= 2".to_string());
        }

        if !(0.0..=100.0).contains(&self.risk.ai_confidence_min) {
            problems.push("risk.ai_confidence_min must be within [0, 100]".to_string());
        }
        if self.risk.min_adx_for_entry <= self.risk.adx_transition_min {
            problems.push(
                "risk.min_adx_for_entry must be above risk.adx_transition_min".to_string(),
            );
        }
        if self.risk.taker_fee_pct < 0.0 {
            problems.push("risk.taker_fee_pct must not be negative".to_string());
        }

        for (name, v) in [
            ("tables.erosion_cap_choppy", self.tables.erosion_cap_choppy),
            (
                "tables.erosion_cap_transitioning",
                self.tables.erosion_cap_transitioning,
            ),
            ("tables.erosion_cap_weak", self.tables.erosion_cap_weak),
            (
                "tables.erosion_cap_moderate",
                self.tables.erosion_cap_moderate,
            ),
            ("tables.erosion_cap_strong", self.tables.erosion_cap_strong),
            (
                "tables.lock_fraction_choppy",
                self.tables.lock_fraction_choppy,
            ),
            (
                "tables.lock_fraction_strong",
                self.tables.lock_fraction_strong,
            ),
            (
                "tracker.erosion_secondary_fraction",
                self.tracker.erosion_secondary_fraction,
            ),
        ] {
            if !(0.0..=1.0).contains(&v) {
                problems.push(format!("{} must be a fraction within [0, 1]", name));
            }
        }

        if self.tracker.underwater_threshold_pct >= 0.0 {
            problems.push("tracker.underwater_threshold_pct must be negative".to_string());
        }

        if self.capital.btc_ema_short_period >= self.capital.btc_ema_long_period {
            problems.push(
                "capital.btc_ema_short_period must be below capital.btc_ema_long_period"
                    .to_string(),
            );
        }
        if self.capital.drawdown_reference_equity <= 0.0 {
            problems.push("capital.drawdown_reference_equity must be positive".to_string());
        }
        if self.capital.combined_multiplier_floor <= 0.0
            || self.capital.combined_multiplier_floor > 1.0
        {
            problems.push("capital.combined_multiplier_floor must be within (0, 1]".to_string());
        }

        if problems.is_empty() {
            Ok(())
        } else {
            anyhow::bail!("invalid configuration:\n  - {}", problems.join("\n  - "))
        }
    }
}
