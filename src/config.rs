// ===============================
// src/config.rs
// ===============================
use std::env;

use dotenvy::dotenv;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Engine tunables. Loaded once per process from the environment
/// (`.env` supported), with conservative defaults.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Open positions whose total quantity rounds to zero within this
    /// epsilon are dropped from the report (fully closed, nothing to show).
    pub qty_epsilon: Decimal,
    /// Disagreement between broker snapshot quantity / entry price and the
    /// locally reconciled values beyond this epsilon raises a
    /// ConsistencyWarning.
    pub snapshot_epsilon: Decimal,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            // Binance stepSize floor for most perp symbols
            qty_epsilon: dec!(0.00000001),
            snapshot_epsilon: dec!(0.0001),
        }
    }
}

impl EngineConfig {
    /// ENV:
    ///   QTY_EPSILON=0.00000001
    ///   SNAPSHOT_QTY_EPSILON=0.0001
    pub fn from_env() -> Self {
        let _ = dotenv();
        let defaults = Self::default();

        let qty_epsilon = env::var("QTY_EPSILON")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.qty_epsilon);
        let snapshot_epsilon = env::var("SNAPSHOT_QTY_EPSILON")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.snapshot_epsilon);

        Self { qty_epsilon, snapshot_epsilon }
    }
}

/// Port for the Prometheus text endpoint; `None` disables the server.
/// ENV: METRICS_PORT=9898
pub fn metrics_port_from_env() -> Option<u16> {
    env::var("METRICS_PORT").ok().and_then(|s| s.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_positive() {
        let cfg = EngineConfig::default();
        assert!(cfg.qty_epsilon > Decimal::ZERO);
        assert!(cfg.snapshot_epsilon > cfg.qty_epsilon);
    }
}
