//! Process-scoped shared state
//!
//! The orchestrator updates the BTC momentum cell once per cycle before
//! dispatching concurrent per-pair evaluations; the gate stages only read
//! it. Explicit field on a context object instead of a module singleton so
//! tests and multiple engines never fight over hidden state.

use parking_lot::RwLock;

#[derive(Debug, Default)]
pub struct EngineContext {
    /// BTC 1h momentum (percent), updated externally once per cycle.
    /// `None` means no fresh value this cycle; the dump veto is skipped.
    btc_momentum_1h: RwLock<Option<f64>>,
}

impl EngineContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Single-writer-per-cycle update; non-finite inputs clear the cell
    pub fn set_btc_momentum(&self, pct: f64) {
        let mut cell = self.btc_momentum_1h.write();
        *cell = if pct.is_finite() { Some(pct) } else { None };
    }

    pub fn clear_btc_momentum(&self) {
        *self.btc_momentum_1h.write() = None;
    }

    pub fn btc_momentum(&self) -> Option<f64> {
        *self.btc_momentum_1h.read()
    }
}
