//! Per-trade peak-profit protection
//!
//! The tracker keeps an in-memory peak per open trade, persists every
//! increase synchronously, and rehydrates from the trade ledger on startup
//! so a process restart never resets protection. Exit checks themselves are
//! pure functions in the submodules; the tracker wires them to tracked
//! state.

pub mod erosion;
pub mod profit_lock;
pub mod underwater;

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::config::{RegimeTableConfig, TrackerConfig};
use crate::logger::{self, log, LogTag};
use crate::regime::MarketRegime;
use crate::storage::Store;
use crate::types::ExitCheck;

#[derive(Debug, Clone, Copy)]
pub struct PositionState {
    /// Monotonically non-decreasing, never negative
    pub peak_profit_pct: f64,
    pub entry_time: DateTime<Utc>,
}

pub struct PositionTracker {
    store: Arc<Store>,
    cfg: TrackerConfig,
    tables: RegimeTableConfig,
    // one lock serializes all peak updates; two concurrent evaluations of
    // the same trade cannot lose an increase
    positions: Mutex<HashMap<i64, PositionState>>,
}

impl PositionTracker {
    pub fn new(store: Arc<Store>, cfg: TrackerConfig, tables: RegimeTableConfig) -> Self {
        Self {
            store,
            cfg,
            tables,
            positions: Mutex::new(HashMap::new()),
        }
    }

    /// Hydrate peak state for every open trade from the ledger
    pub fn initialize_from_storage(&self) -> anyhow::Result<usize> {
        let open = self.store.open_trades()?;
        let mut positions = self.positions.lock();
        positions.clear();
        for trade in &open {
            positions.insert(
                trade.id,
                PositionState {
                    peak_profit_pct: trade.peak_profit_percent.max(0.0),
                    entry_time: trade.entry_time,
                },
            );
        }
        log(
            LogTag::Tracker,
            "HYDRATE",
            &format!("restored peak state for {} open trades", open.len()),
        );
        Ok(open.len())
    }

    /// Start tracking a trade. Existing state is kept (lazy creation on
    /// first check is the same call).
    pub fn track_open(&self, trade_id: i64, entry_time: DateTime<Utc>) {
        self.positions.lock().entry(trade_id).or_insert(PositionState {
            peak_profit_pct: 0.0,
            entry_time,
        });
    }

    /// Force-set the peak to max(0, profit) and persist it
    pub fn record_peak(&self, trade_id: i64, profit_pct: f64, entry_time: DateTime<Utc>) {
        let peak = profit_pct.max(0.0);
        let mut positions = self.positions.lock();
        let state = positions.entry(trade_id).or_insert(PositionState {
            peak_profit_pct: 0.0,
            entry_time,
        });
        state.peak_profit_pct = peak;
        self.persist_peak(trade_id, peak);
    }

    /// Raise the peak if the current profit beats it. Returns the peak in
    /// effect afterwards. Persists synchronously on every increase.
    pub fn update_peak_if_higher(
        &self,
        trade_id: i64,
        current_pct: f64,
        entry_time: DateTime<Utc>,
    ) -> f64 {
        let mut positions = self.positions.lock();
        let state = positions.entry(trade_id).or_insert(PositionState {
            peak_profit_pct: 0.0,
            entry_time,
        });
        if current_pct > state.peak_profit_pct && current_pct > 0.0 {
            state.peak_profit_pct = current_pct;
            self.persist_peak(trade_id, current_pct);
        }
        state.peak_profit_pct
    }

    // Storage failures are logged, never propagated: the in-memory decision
    // proceeds on best-available state.
    fn persist_peak(&self, trade_id: i64, peak_pct: f64) {
        if let Err(e) = self.store.update_peak_profit(trade_id, peak_pct) {
            logger::error(
                LogTag::Tracker,
                &format!("failed to persist peak {:.2}% for trade {}: {:#}", peak_pct, trade_id, e),
            );
        }
    }

    pub fn position(&self, trade_id: i64) -> Option<PositionState> {
        self.positions.lock().get(&trade_id).copied()
    }

    pub fn check_erosion_cap(
        &self,
        trade_id: i64,
        pair: &str,
        current_pct: f64,
        regime: MarketRegime,
    ) -> ExitCheck {
        let Some(state) = self.position(trade_id) else {
            return ExitCheck::hold();
        };
        let held_minutes = Utc::now()
            .signed_duration_since(state.entry_time)
            .num_minutes()
            .max(0);
        let check = erosion::evaluate(
            state.peak_profit_pct,
            current_pct,
            held_minutes,
            regime,
            &self.cfg,
            &self.tables,
        );
        self.log_exit(pair, trade_id, &check);
        check
    }

    pub fn check_profit_lock(
        &self,
        trade_id: i64,
        pair: &str,
        current_pct: f64,
        regime: MarketRegime,
    ) -> ExitCheck {
        let Some(state) = self.position(trade_id) else {
            return ExitCheck::hold();
        };
        let check = profit_lock::evaluate(state.peak_profit_pct, current_pct, regime, &self.tables);
        self.log_exit(pair, trade_id, &check);
        check
    }

    pub fn check_underwater_timeout(
        &self,
        trade_id: i64,
        pair: &str,
        current_pct: f64,
        entry_time: DateTime<Utc>,
        threshold_pct: f64,
        min_hold_minutes: i64,
    ) -> ExitCheck {
        let peak = self
            .position(trade_id)
            .map(|s| s.peak_profit_pct)
            .unwrap_or(0.0);
        let check = underwater::evaluate(
            trade_id,
            peak,
            current_pct,
            entry_time,
            Utc::now(),
            threshold_pct,
            min_hold_minutes,
            self.cfg.meaningful_profit_pct,
        );
        self.log_exit(pair, trade_id, &check);
        check
    }

    /// Drop in-memory tracking when a trade closes
    pub fn clear_position(&self, trade_id: i64) {
        self.positions.lock().remove(&trade_id);
    }

    pub fn tracked_count(&self) -> usize {
        self.positions.lock().len()
    }

    fn log_exit(&self, pair: &str, trade_id: i64, check: &ExitCheck) {
        if check.should_exit {
            log(
                LogTag::Tracker,
                "EXIT",
                &format!(
                    "{} trade {}: {} ({})",
                    pair,
                    trade_id,
                    check.reason.map(|r| r.as_str()).unwrap_or("unknown"),
                    check.detail.as_deref().unwrap_or("")
                ),
            );
        }
    }
}
