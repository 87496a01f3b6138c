/// Structured error types for the trendguard decision engine
///
/// The indicator entry point fails hard on short candle history (callers are
/// expected to pre-validate), while storage and feed problems surface as
/// recoverable errors that the calling cycle logs and survives.
use thiserror::Error;

/// Hard failure: the candle series is too short to compute the indicator
/// snapshot. Callers must pre-validate history length before evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("insufficient candle history: {supplied} candles supplied, {required} required")]
pub struct InsufficientDataError {
    pub required: usize,
    pub supplied: usize,
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    InsufficientData(#[from] InsufficientDataError),

    #[error("invalid candle series: {0}")]
    InvalidSeries(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("feed error: {0}")]
    Feed(String),
}
