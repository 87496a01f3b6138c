//! Layer 1: BTC trend gate
//!
//! Shared across bots, TTL-cached. Compares the current BTC price to short
//! and long EMAs of daily candles. Below the long EMA trading continues at
//! a small fraction rather than stopping outright. Network failures fail
//! OPEN (full size): this layer is a risk-reduction overlay, not a
//! correctness gate, the opposite asymmetry of the fail-closed indicator
//! policy.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;

use crate::capital::feed::BtcCandleFeed;
use crate::config::CapitalConfig;
use crate::logger::{self, log, LogTag};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BtcTrend {
    /// Price at or above both EMAs
    Healthy,
    /// Below the short EMA only
    BelowShort,
    /// Below the long EMA
    BelowLong,
}

impl BtcTrend {
    pub fn multiplier(&self, cfg: &CapitalConfig) -> f64 {
        match self {
            BtcTrend::Healthy => 1.0,
            BtcTrend::BelowShort => cfg.btc_below_short_multiplier,
            BtcTrend::BelowLong => cfg.btc_below_long_multiplier,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BtcTrend::Healthy => "healthy",
            BtcTrend::BelowShort => "below_short_ema",
            BtcTrend::BelowLong => "below_long_ema",
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct CachedTrend {
    trend: BtcTrend,
    fetched_at: DateTime<Utc>,
}

pub struct BtcTrendGate {
    feed: Arc<dyn BtcCandleFeed>,
    cfg: CapitalConfig,
    daily_candle_limit: usize,
    cache: RwLock<Option<CachedTrend>>,
}

impl BtcTrendGate {
    pub fn new(feed: Arc<dyn BtcCandleFeed>, cfg: CapitalConfig, daily_candle_limit: usize) -> Self {
        Self {
            feed,
            cfg,
            daily_candle_limit,
            cache: RwLock::new(None),
        }
    }

    /// Current BTC trend, served from cache within the TTL. A concurrent
    /// cache miss may fetch redundantly; both writers store the same
    /// assessment so the race is harmless.
    pub async fn assess(&self) -> BtcTrend {
        if !self.cfg.btc_trend_enabled {
            return BtcTrend::Healthy;
        }

        let ttl = Duration::seconds(self.cfg.btc_trend_cache_ttl_secs as i64);
        if let Some(cached) = *self.cache.read().await {
            if Utc::now().signed_duration_since(cached.fetched_at) < ttl {
                return cached.trend;
            }
        }

        let candles = match self.feed.daily_candles(self.daily_candle_limit).await {
            Ok(candles) => candles,
            Err(e) => {
                // fail open: full size on a broken feed
                logger::warning(
                    LogTag::Capital,
                    &format!("btc trend fetch failed, trading full size: {}", e),
                );
                return BtcTrend::Healthy;
            }
        };

        if candles.len() < self.cfg.btc_ema_long_period {
            logger::warning(
                LogTag::Capital,
                &format!(
                    "only {} btc daily candles for a {}-period EMA, trading full size",
                    candles.len(),
                    self.cfg.btc_ema_long_period
                ),
            );
            return BtcTrend::Healthy;
        }

        let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
        let price = *closes.last().unwrap_or(&0.0);
        let ema_short = crate::indicators::ema_last(&closes, self.cfg.btc_ema_short_period);
        let ema_long = crate::indicators::ema_last(&closes, self.cfg.btc_ema_long_period);

        let trend = if price < ema_long {
            BtcTrend::BelowLong
        } else if price < ema_short {
            BtcTrend::BelowShort
        } else {
            BtcTrend::Healthy
        };

        log(
            LogTag::Capital,
            "BTC_TREND",
            &format!(
                "{}: price {:.0} vs ema{} {:.0} / ema{} {:.0}",
                trend.as_str(),
                price,
                self.cfg.btc_ema_short_period,
                ema_short,
                self.cfg.btc_ema_long_period,
                ema_long
            ),
        );

        *self.cache.write().await = Some(CachedTrend {
            trend,
            fetched_at: Utc::now(),
        });
        trend
    }
}
