//! Account-level capital preservation
//!
//! Three layers per bot per cycle: the shared BTC trend gate (layer 1),
//! rolling drawdown (layer 2), and the consecutive loss streak (layer 3).
//! Layers 2 and 3 multiply with a floor; either one's pause blocks trading
//! outright. Layer 1 applies independently on top. Pause and peak state
//! persists into the bot record by JSON merge.

pub mod btc_trend;
pub mod drawdown;
pub mod feed;
pub mod streak;

pub use btc_trend::{BtcTrend, BtcTrendGate};
pub use feed::{BtcCandleFeed, HttpBtcFeed};

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use crate::config::CapitalConfig;
use crate::logger::{self, log, LogTag};
use crate::storage::bots::BotCapitalState;
use crate::storage::Store;
use crate::types::CapitalDecision;

pub struct CapitalPreservation {
    store: Arc<Store>,
    btc_gate: Arc<BtcTrendGate>,
    cfg: CapitalConfig,
}

impl CapitalPreservation {
    pub fn new(store: Arc<Store>, btc_gate: Arc<BtcTrendGate>, cfg: CapitalConfig) -> Self {
        Self {
            store,
            btc_gate,
            cfg,
        }
    }

    /// One decision per bot per cycle
    pub async fn evaluate_bot(&self, bot_id: &str) -> CapitalDecision {
        let now = Utc::now();
        let state = self.store.get_capital_state(bot_id).unwrap_or_else(|e| {
            logger::error(
                LogTag::Capital,
                &format!("failed to load capital state for {}: {:#}", bot_id, e),
            );
            BotCapitalState::default()
        });

        let trend = self.btc_gate.assess().await;
        let l1 = trend.multiplier(&self.cfg);

        // standing pause from an earlier cycle
        let mut lift_indefinite = false;
        if let Some(reason) = &state.pause_reason {
            match state.paused_until {
                Some(until) if now < until => {
                    return self.blocked(bot_id, reason.clone(), Some(until));
                }
                Some(_) => {
                    // expired, evaluation continues and the clear persists below
                }
                None => {
                    // indefinite: waits for the BTC gate to recover
                    if trend != BtcTrend::Healthy {
                        return self.blocked(bot_id, reason.clone(), None);
                    }
                    // re-base the equity peak, otherwise the unchanged
                    // drawdown re-arms the stop on the very same numbers
                    lift_indefinite = true;
                    log(
                        LogTag::Capital,
                        "RESUME",
                        &format!(
                            "{}: BTC trend recovered, lifting indefinite pause and re-basing equity peak",
                            bot_id
                        ),
                    );
                }
            }
        }

        let equity = self.store.total_realized_pnl(bot_id).unwrap_or_else(|e| {
            logger::error(
                LogTag::Capital,
                &format!("failed to read equity for {}: {:#}", bot_id, e),
            );
            0.0
        });
        let window_start = now - Duration::days(self.cfg.drawdown_window_days);
        let window_pnl: f64 = self
            .store
            .closed_trades_since(bot_id, window_start)
            .map(|trades| trades.iter().filter_map(|t| t.realized_pnl).sum())
            .unwrap_or_else(|e| {
                logger::error(
                    LogTag::Capital,
                    &format!("failed to read trade window for {}: {:#}", bot_id, e),
                );
                0.0
            });
        let recent = self
            .store
            .recent_closed_trades(bot_id, self.cfg.streak_lookback_trades)
            .unwrap_or_else(|e| {
                logger::error(
                    LogTag::Capital,
                    &format!("failed to read recent trades for {}: {:#}", bot_id, e),
                );
                Vec::new()
            });

        let persisted_peak = if lift_indefinite {
            equity
        } else {
            state.peak_equity.unwrap_or(equity)
        };
        let dd = drawdown::evaluate(
            equity,
            window_pnl,
            persisted_peak,
            streak::leading_win_streak(&recent),
            now,
            &self.cfg,
        );

        if dd.indefinite_pause {
            let reason = dd.reason.clone().unwrap_or_else(|| "drawdown stop".into());
            self.persist(
                bot_id,
                BotCapitalState {
                    peak_equity: Some(dd.new_peak_equity),
                    paused_until: None,
                    pause_reason: Some(reason.clone()),
                },
            );
            return self.blocked(bot_id, reason, None);
        }

        if let Some(until) = dd.pause_until {
            let reason = dd.reason.clone().unwrap_or_else(|| "drawdown pause".into());
            self.persist(
                bot_id,
                BotCapitalState {
                    peak_equity: Some(dd.new_peak_equity),
                    paused_until: Some(until),
                    pause_reason: Some(reason.clone()),
                },
            );
            return self.blocked(bot_id, reason, Some(until));
        }

        let streak_assessment =
            streak::evaluate(streak::leading_loss_streak(&recent), now, &self.cfg);
        if let Some(until) = streak_assessment.pause_until {
            let reason = streak_assessment
                .reason
                .clone()
                .unwrap_or_else(|| "loss streak pause".into());
            self.persist(
                bot_id,
                BotCapitalState {
                    peak_equity: Some(dd.new_peak_equity),
                    paused_until: Some(until),
                    pause_reason: Some(reason.clone()),
                },
            );
            return self.blocked(bot_id, reason, Some(until));
        }

        // layers 2 and 3 multiply with a floor; layer 1 applies on top
        let combined = (dd.multiplier * streak_assessment.multiplier)
            .max(self.cfg.combined_multiplier_floor);
        let multiplier = l1 * combined;

        let reason = [
            (trend != BtcTrend::Healthy).then(|| format!("btc {}", trend.as_str())),
            dd.reason.clone(),
            streak_assessment.reason.clone(),
        ]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join("; ");

        // new peak and any cleared pause
        self.persist(
            bot_id,
            BotCapitalState {
                peak_equity: Some(dd.new_peak_equity),
                paused_until: None,
                pause_reason: None,
            },
        );

        if multiplier < 1.0 {
            log(
                LogTag::Capital,
                "REDUCE",
                &format!("{}: size multiplier {:.2} ({})", bot_id, multiplier, reason),
            );
        }

        CapitalDecision {
            allow_trading: true,
            size_multiplier: multiplier,
            reason: (!reason.is_empty()).then_some(reason),
            paused_until: None,
        }
    }

    fn blocked(
        &self,
        bot_id: &str,
        reason: String,
        paused_until: Option<DateTime<Utc>>,
    ) -> CapitalDecision {
        log(
            LogTag::Capital,
            "PAUSE",
            &format!(
                "{}: trading blocked ({}){}",
                bot_id,
                reason,
                paused_until
                    .map(|u| format!(" until {}", u.format("%Y-%m-%d %H:%M")))
                    .unwrap_or_default()
            ),
        );
        CapitalDecision {
            allow_trading: false,
            size_multiplier: 0.0,
            reason: Some(reason),
            paused_until,
        }
    }

    // merge failures are logged, never abort the cycle
    fn persist(&self, bot_id: &str, state: BotCapitalState) {
        if let Err(e) = self.store.set_capital_state(bot_id, &state) {
            logger::error(
                LogTag::Capital,
                &format!("failed to persist capital state for {}: {:#}", bot_id, e),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candles::test_support::trending_candles;
    use crate::capital::feed::test_support::{FailingFeed, StaticFeed};
    use chrono::TimeZone;

    fn service_with_feed(
        store: Arc<Store>,
        feed: Arc<dyn BtcCandleFeed>,
        cfg: CapitalConfig,
    ) -> CapitalPreservation {
        let gate = Arc::new(BtcTrendGate::new(feed, cfg.clone(), 120));
        CapitalPreservation::new(store, gate, cfg)
    }

    fn healthy_feed() -> Arc<StaticFeed> {
        Arc::new(StaticFeed::new(trending_candles(20_000.0, 100.0, 120)))
    }

    fn seed_trades(store: &Store, bot_id: &str, pnls: &[f64]) {
        let base = Utc::now() - Duration::hours(pnls.len() as i64 + 1);
        for (i, pnl) in pnls.iter().enumerate() {
            let id = store
                .insert_trade(bot_id, "ETH/USD", base + Duration::hours(i as i64))
                .unwrap();
            store
                .close_trade(id, base + Duration::hours(i as i64) + Duration::minutes(30), *pnl)
                .unwrap();
        }
    }

    #[tokio::test]
    async fn three_losses_halve_size_without_pausing() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        seed_trades(&store, "bot-1", &[100.0, -1.0, -1.0, -1.0]);
        let svc = service_with_feed(store, healthy_feed(), CapitalConfig::default());

        let d = svc.evaluate_bot("bot-1").await;
        assert!(d.allow_trading);
        assert_eq!(d.size_multiplier, 0.5);
    }

    #[tokio::test]
    async fn clean_ledger_trades_full_size() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        seed_trades(&store, "bot-1", &[10.0, 5.0]);
        let svc = service_with_feed(store.clone(), healthy_feed(), CapitalConfig::default());

        let d = svc.evaluate_bot("bot-1").await;
        assert!(d.allow_trading);
        assert_eq!(d.size_multiplier, 1.0);
        // the equity peak was persisted
        let state = store.get_capital_state("bot-1").unwrap();
        assert_eq!(state.peak_equity, Some(15.0));
    }

    #[tokio::test]
    async fn long_loss_streak_pauses_and_the_pause_sticks() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        seed_trades(
            &store,
            "bot-1",
            &[500.0, -1.0, -1.0, -1.0, -1.0, -1.0, -1.0],
        );
        let svc = service_with_feed(store.clone(), healthy_feed(), CapitalConfig::default());

        let d = svc.evaluate_bot("bot-1").await;
        assert!(!d.allow_trading);
        assert!(d.paused_until.is_some());

        // next cycle still blocked by the persisted pause
        let again = svc.evaluate_bot("bot-1").await;
        assert!(!again.allow_trading);
    }

    #[tokio::test]
    async fn deep_drawdown_pauses_until_btc_recovers() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        // equity 70 against a persisted peak of 100 is a 30% drawdown
        seed_trades(&store, "bot-1", &[80.0, -10.0]);
        store
            .set_capital_state(
                "bot-1",
                &BotCapitalState {
                    peak_equity: Some(100.0),
                    paused_until: None,
                    pause_reason: None,
                },
            )
            .unwrap();

        // BTC below its long EMA: the indefinite pause holds
        let falling = Arc::new(StaticFeed::new(trending_candles(60_000.0, -200.0, 120)));
        let svc = service_with_feed(store.clone(), falling, CapitalConfig::default());
        let d = svc.evaluate_bot("bot-1").await;
        assert!(!d.allow_trading);
        assert!(d.paused_until.is_none());
        let state = store.get_capital_state("bot-1").unwrap();
        assert!(state.pause_reason.is_some());

        // second cycle against the same bad trend stays blocked
        let again = svc.evaluate_bot("bot-1").await;
        assert!(!again.allow_trading);
    }

    #[tokio::test]
    async fn healthy_btc_lifts_the_drawdown_stop() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        // equity 70 against the stale peak of 100 tripped the stop earlier
        seed_trades(&store, "bot-1", &[80.0, -10.0]);
        store
            .set_capital_state(
                "bot-1",
                &BotCapitalState {
                    peak_equity: Some(100.0),
                    paused_until: None,
                    pause_reason: Some("drawdown 30.0% from equity peak 100.00".to_string()),
                },
            )
            .unwrap();

        let svc = service_with_feed(store.clone(), healthy_feed(), CapitalConfig::default());
        let d = svc.evaluate_bot("bot-1").await;
        assert!(d.allow_trading, "blocked: {:?}", d.reason);
        assert_eq!(d.size_multiplier, 1.0);

        // the peak re-based to current equity and the pause cleared, so the
        // stop does not re-arm on the next cycle either
        let state = store.get_capital_state("bot-1").unwrap();
        assert_eq!(state.peak_equity, Some(70.0));
        assert!(state.pause_reason.is_none());
        let next = svc.evaluate_bot("bot-1").await;
        assert!(next.allow_trading);
    }

    #[tokio::test]
    async fn broken_feed_does_not_block_trading() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        seed_trades(&store, "bot-1", &[10.0]);
        let svc = service_with_feed(store, Arc::new(FailingFeed), CapitalConfig::default());
        let d = svc.evaluate_bot("bot-1").await;
        assert!(d.allow_trading);
        assert_eq!(d.size_multiplier, 1.0);
    }

    #[tokio::test]
    async fn expired_timed_pause_clears_on_the_next_cycle() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        seed_trades(&store, "bot-1", &[10.0, 5.0]);
        store
            .set_capital_state(
                "bot-1",
                &BotCapitalState {
                    peak_equity: Some(15.0),
                    paused_until: Some(Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap()),
                    pause_reason: Some("old pause".to_string()),
                },
            )
            .unwrap();

        let svc = service_with_feed(store.clone(), healthy_feed(), CapitalConfig::default());
        let d = svc.evaluate_bot("bot-1").await;
        assert!(d.allow_trading);
        let state = store.get_capital_state("bot-1").unwrap();
        assert!(state.pause_reason.is_none());
        assert!(state.paused_until.is_none());
    }

    #[tokio::test]
    async fn combined_reduction_respects_the_floor() {
        let mut cfg = CapitalConfig::default();
        // force both layers to reduce: 3-loss streak (0.5) and a rolling
        // loss above the reduce threshold (0.5) -> 0.25 at the floor
        cfg.drawdown_reduce_pct = 1.0;
        let store = Arc::new(Store::open_in_memory().unwrap());
        // the old win sits outside the rolling window; only losses are in it
        let old = Utc::now() - Duration::days(30);
        let id = store.insert_trade("bot-1", "ETH/USD", old).unwrap();
        store.close_trade(id, old, 100.0).unwrap();
        seed_trades(&store, "bot-1", &[-2.0, -2.0, -2.0]);
        let svc = service_with_feed(store, healthy_feed(), cfg);
        let d = svc.evaluate_bot("bot-1").await;
        assert!(d.allow_trading);
        assert_eq!(d.size_multiplier, 0.25);
    }
}
