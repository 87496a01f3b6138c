//! BTC daily candle feed
//!
//! The trend gate pulls daily candles over HTTP with a bounded timeout.
//! The endpoint must answer with a JSON array of
//! `[timestamp_secs, open, high, low, close, volume]` rows, ascending.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::candles::Candle;
use crate::config::FeedConfig;
use crate::errors::EngineError;

#[async_trait]
pub trait BtcCandleFeed: Send + Sync {
    async fn daily_candles(&self, limit: usize) -> Result<Vec<Candle>, EngineError>;
}

pub struct HttpBtcFeed {
    client: reqwest::Client,
    url: String,
}

impl HttpBtcFeed {
    pub fn new(cfg: &FeedConfig) -> Result<Self, EngineError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(cfg.request_timeout_secs))
            .build()
            .map_err(|e| EngineError::Feed(format!("failed to build http client: {}", e)))?;
        Ok(Self {
            client,
            url: cfg.btc_daily_url.clone(),
        })
    }
}

#[async_trait]
impl BtcCandleFeed for HttpBtcFeed {
    async fn daily_candles(&self, limit: usize) -> Result<Vec<Candle>, EngineError> {
        if self.url.is_empty() {
            return Err(EngineError::Feed("btc_daily_url is not configured".into()));
        }

        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| EngineError::Feed(format!("btc candle request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(EngineError::Feed(format!(
                "btc candle request returned {}",
                response.status()
            )));
        }

        let rows: Vec<[f64; 6]> = response
            .json()
            .await
            .map_err(|e| EngineError::Feed(format!("btc candle response unparseable: {}", e)))?;

        let mut candles = Vec::with_capacity(rows.len().min(limit));
        for row in rows.iter().rev().take(limit).rev() {
            let timestamp = DateTime::<Utc>::from_timestamp(row[0] as i64, 0).ok_or_else(|| {
                EngineError::Feed(format!("btc candle has invalid timestamp {}", row[0]))
            })?;
            candles.push(Candle {
                timestamp,
                open: row[1],
                high: row[2],
                low: row[3],
                close: row[4],
                volume: row[5],
            });
        }
        Ok(candles)
    }
}
