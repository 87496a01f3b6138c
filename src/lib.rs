//! trendguard - decision core for an automated trading bot platform
//!
//! Decides, per pair and bot, whether a new position may open and whether
//! an open one must close: indicator snapshot -> regime classification ->
//! five-stage risk gate for entries; peak-profit state machines (erosion
//! cap, profit lock, underwater timeout) for exits; and three-layer
//! capital preservation per bot. Order placement, signal generation, and
//! scheduling live outside this crate.

pub mod candles;
pub mod capital;
pub mod config;
pub mod context;
pub mod engine;
pub mod errors;
pub mod indicators;
pub mod logger;
pub mod regime;
pub mod risk;
pub mod storage;
pub mod tracker;
pub mod types;

pub use candles::Candle;
pub use config::EngineConfig;
pub use context::EngineContext;
pub use engine::DecisionEngine;
pub use errors::{EngineError, InsufficientDataError};
pub use indicators::{compute_indicators, TechnicalIndicators};
pub use regime::{classify, MarketRegime, RegimeClassification};
pub use storage::Store;
pub use tracker::PositionTracker;
pub use types::{CapitalDecision, EntryDecision, ExitCheck, ExitReason, RiskCheck, RiskStage, Ticker};
