//! Decision engine
//!
//! Ties the pipeline together for the orchestrator: candles -> indicators
//! -> regime -> risk gate for entries, the tracker's three checks for open
//! trades, and capital preservation per bot. Within one (bot, pair)
//! evaluation everything is sequential; the orchestrator may run pairs
//! concurrently.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::candles::{validate_series, Candle};
use crate::capital::{BtcCandleFeed, BtcTrendGate, CapitalPreservation};
use crate::config::EngineConfig;
use crate::context::EngineContext;
use crate::errors::EngineError;
use crate::indicators::compute_indicators;
use crate::logger::{self, log, LogTag};
use crate::regime::{classify, RegimeClassification};
use crate::risk;
use crate::storage::Store;
use crate::tracker::PositionTracker;
use crate::types::{CapitalDecision, EntryDecision, ExitCheck, Ticker};

pub struct DecisionEngine {
    cfg: Arc<EngineConfig>,
    ctx: Arc<EngineContext>,
    store: Arc<Store>,
    tracker: PositionTracker,
    capital: CapitalPreservation,
}

impl DecisionEngine {
    pub fn new(cfg: Arc<EngineConfig>, store: Arc<Store>, feed: Arc<dyn BtcCandleFeed>) -> Self {
        let ctx = Arc::new(EngineContext::new());
        let tracker = PositionTracker::new(
            store.clone(),
            cfg.tracker.clone(),
            cfg.tables.clone(),
        );
        let btc_gate = Arc::new(BtcTrendGate::new(
            feed,
            cfg.capital.clone(),
            cfg.feed.daily_candle_limit,
        ));
        let capital = CapitalPreservation::new(store.clone(), btc_gate, cfg.capital.clone());
        Self {
            cfg,
            ctx,
            store,
            tracker,
            capital,
        }
    }

    /// Set the log level and hydrate tracker state; call once at startup
    pub fn init(&self) -> anyhow::Result<()> {
        let level = logger::LogLevel::from_str(&self.cfg.general.log_level)
            .unwrap_or(logger::LogLevel::Info);
        logger::init(level);
        let restored = self.tracker.initialize_from_storage()?;
        log(
            LogTag::Engine,
            "READY",
            &format!("decision engine initialized, {} open trades tracked", restored),
        );
        Ok(())
    }

    pub fn context(&self) -> &EngineContext {
        &self.ctx
    }

    pub fn tracker(&self) -> &PositionTracker {
        &self.tracker
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Classify the market for one pair from its candle series
    pub fn classify_market(
        &self,
        candles: &[Candle],
    ) -> Result<RegimeClassification, EngineError> {
        validate_series(candles)?;
        let indicators = compute_indicators(candles, &self.cfg.indicators)?;
        Ok(classify(candles, &indicators, &self.cfg.regime))
    }

    /// Full entry evaluation for one pair. The re-entry cooldown is checked
    /// before the gate; a pair that closed a trade recently is refused
    /// without touching the stages.
    pub fn evaluate_entry(
        &self,
        bot_id: &str,
        pair: &str,
        candles: &[Candle],
        ticker: &Ticker,
        ai_confidence: f64,
    ) -> Result<EntryDecision, EngineError> {
        validate_series(candles)?;

        if let Some(remaining) = self.reentry_cooldown_remaining(bot_id, pair, Utc::now()) {
            log(
                LogTag::Engine,
                "COOLDOWN",
                &format!("{}: re-entry blocked for another {} minutes", pair, remaining),
            );
            return Ok(EntryDecision {
                approved: false,
                pair: pair.to_string(),
                checks: Vec::new(),
                failed_stage: None,
                reason: Some(format!(
                    "re-entry cooldown, {} minutes remaining",
                    remaining
                )),
                profit_target_pct: 0.0,
                evaluated_at: Utc::now(),
            });
        }

        let indicators = compute_indicators(candles, &self.cfg.indicators)?;
        let regime = classify(candles, &indicators, &self.cfg.regime);
        Ok(risk::evaluate_entry(
            pair,
            ticker,
            &indicators,
            &regime,
            ai_confidence,
            &self.ctx,
            &self.cfg,
        ))
    }

    /// Stages 1-3 only, for screening pairs before requesting an AI signal.
    /// A returned vector whose last check failed means skip the AI call.
    pub fn pre_signal_check(
        &self,
        pair: &str,
        candles: &[Candle],
        ticker: &Ticker,
    ) -> Result<Vec<crate::types::RiskCheck>, EngineError> {
        validate_series(candles)?;
        let indicators = compute_indicators(candles, &self.cfg.indicators)?;
        Ok(risk::pre_signal_check(
            pair,
            ticker,
            &indicators,
            &self.ctx,
            &self.cfg,
        ))
    }

    /// Minutes left in the pair's re-entry cooldown, if any
    fn reentry_cooldown_remaining(
        &self,
        bot_id: &str,
        pair: &str,
        now: DateTime<Utc>,
    ) -> Option<i64> {
        let cooldown = self.cfg.general.reentry_cooldown_minutes;
        if cooldown == 0 {
            return None;
        }
        let trade = match self.store.last_closed_trade_for_pair(bot_id, pair) {
            Ok(trade) => trade?,
            Err(e) => {
                logger::error(
                    LogTag::Engine,
                    &format!("cooldown lookup failed for {}: {:#}", pair, e),
                );
                return None;
            }
        };
        let exit_time = trade.exit_time?;
        let elapsed = now.signed_duration_since(exit_time).num_minutes();
        (elapsed >= 0 && elapsed < cooldown).then(|| cooldown - elapsed)
    }

    /// Evaluate one open trade against current profit and regime. The peak
    /// updates first, then the three protection checks run in order; the
    /// first exit wins.
    pub fn evaluate_open_trade(
        &self,
        trade_id: i64,
        pair: &str,
        current_profit_pct: f64,
        entry_time: DateTime<Utc>,
        regime: &RegimeClassification,
    ) -> ExitCheck {
        self.tracker
            .update_peak_if_higher(trade_id, current_profit_pct, entry_time);

        let erosion = self
            .tracker
            .check_erosion_cap(trade_id, pair, current_profit_pct, regime.regime);
        if erosion.should_exit {
            return erosion;
        }

        let lock = self
            .tracker
            .check_profit_lock(trade_id, pair, current_profit_pct, regime.regime);
        if lock.should_exit {
            return lock;
        }

        self.tracker.check_underwater_timeout(
            trade_id,
            pair,
            current_profit_pct,
            entry_time,
            self.cfg.tracker.underwater_threshold_pct,
            self.cfg.tracker.underwater_min_hold_minutes,
        )
    }

    /// Account-level circuit breakers, once per bot per cycle
    pub async fn evaluate_bot_capital(&self, bot_id: &str) -> CapitalDecision {
        self.capital.evaluate_bot(bot_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candles::test_support::*;
    use crate::capital::feed::test_support::FailingFeed;
    use crate::errors::EngineError;
    use crate::types::{ExitReason, RiskStage};
    use chrono::Duration;

    fn engine() -> DecisionEngine {
        let store = Arc::new(Store::open_in_memory().unwrap());
        DecisionEngine::new(
            Arc::new(EngineConfig::default()),
            store,
            Arc::new(FailingFeed),
        )
    }

    fn ticker() -> Ticker {
        Ticker {
            bid: 99.95,
            ask: 100.05,
            last: 100.0,
        }
    }

    #[test]
    fn short_history_is_a_hard_error() {
        let e = engine();
        let candles = trending_candles(100.0, 0.5, 10);
        let err = e
            .evaluate_entry("bot-1", "ETH/USD", &candles, &ticker(), 80.0)
            .unwrap_err();
        assert!(matches!(err, EngineError::InsufficientData(_)));
    }

    #[test]
    fn flat_market_blocks_at_stage_one() {
        let e = engine();
        let candles = candles_from_closes(&vec![100.0; 60]);
        let d = e
            .evaluate_entry("bot-1", "ETH/USD", &candles, &ticker(), 80.0)
            .unwrap();
        assert!(!d.approved);
        assert_eq!(d.failed_stage, Some(RiskStage::Health));
    }

    #[test]
    fn recent_close_triggers_the_cooldown() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let id = store
            .insert_trade("bot-1", "ETH/USD", Utc::now() - Duration::hours(2))
            .unwrap();
        store
            .close_trade(id, Utc::now() - Duration::minutes(5), 1.0)
            .unwrap();
        let e = DecisionEngine::new(
            Arc::new(EngineConfig::default()),
            store,
            Arc::new(FailingFeed),
        );

        let candles = trending_candles(100.0, 0.5, 60);
        let d = e
            .evaluate_entry("bot-1", "ETH/USD", &candles, &ticker(), 80.0)
            .unwrap();
        assert!(!d.approved);
        assert!(d.checks.is_empty());
        assert!(d.reason.as_deref().unwrap().contains("cooldown"));

        // a different pair is unaffected
        let other = e
            .evaluate_entry("bot-1", "SOL/USD", &candles, &ticker(), 80.0)
            .unwrap();
        assert!(other.checks.len() >= 1);
    }

    #[test]
    fn old_close_does_not_cool_down() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let id = store
            .insert_trade("bot-1", "ETH/USD", Utc::now() - Duration::hours(5))
            .unwrap();
        store
            .close_trade(id, Utc::now() - Duration::hours(4), 1.0)
            .unwrap();
        let e = DecisionEngine::new(
            Arc::new(EngineConfig::default()),
            store,
            Arc::new(FailingFeed),
        );
        assert!(e
            .reentry_cooldown_remaining("bot-1", "ETH/USD", Utc::now())
            .is_none());
    }

    #[test]
    fn pre_signal_screen_covers_only_the_first_three_stages() {
        let e = engine();
        let candles = trending_candles(100.0, 1.0, 60);
        let checks = e.pre_signal_check("ETH/USD", &candles, &ticker()).unwrap();
        assert!(!checks.is_empty());
        assert!(checks.iter().all(|c| c.stage.number() <= 3));
    }

    #[test]
    fn classify_market_runs_end_to_end() {
        let e = engine();
        let candles = trending_candles(100.0, 1.0, 60);
        let classification = e.classify_market(&candles).unwrap();
        assert!(classification.confidence >= 0.0 && classification.confidence <= 100.0);
        assert!(!classification.analysis.is_empty());
    }

    #[test]
    fn open_trade_pipeline_updates_peak_then_checks_exits() {
        let e = engine();
        let entry = Utc::now() - Duration::minutes(60);
        let candles = trending_candles(100.0, 1.0, 60);
        let regime = e.classify_market(&candles).unwrap();

        e.tracker().track_open(1, entry);
        // ride up to 5%, then collapse to 2.4%
        let up = e.evaluate_open_trade(1, "ETH/USD", 5.0, entry, &regime);
        assert!(!up.should_exit);
        assert_eq!(e.tracker().position(1).unwrap().peak_profit_pct, 5.0);

        let down = e.evaluate_open_trade(1, "ETH/USD", 2.4, entry, &regime);
        assert!(down.should_exit);
        // peak survives the losing observation
        assert_eq!(e.tracker().position(1).unwrap().peak_profit_pct, 5.0);
    }

    #[test]
    fn underwater_trade_exits_through_the_pipeline() {
        let e = engine();
        let entry = Utc::now() - Duration::minutes(20);
        let candles = candles_from_closes(&vec![100.0; 60]);
        let regime = e.classify_market(&candles).unwrap();

        e.tracker().track_open(2, entry);
        let check = e.evaluate_open_trade(2, "ETH/USD", -1.0, entry, &regime);
        assert!(check.should_exit);
        assert_eq!(check.reason, Some(ExitReason::UnderwaterStop));
    }

    #[tokio::test]
    async fn capital_decision_flows_through_the_engine() {
        let e = engine();
        let d = e.evaluate_bot_capital("bot-1").await;
        assert!(d.allow_trading);
        assert_eq!(d.size_multiplier, 1.0);
    }
}
