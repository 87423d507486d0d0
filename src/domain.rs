// ===============================
// src/domain.rs
// ===============================
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side { Buy, Sell }
impl Side {
    pub fn sign(&self) -> Decimal {
        match self { Side::Buy => Decimal::ONE, Side::Sell => -Decimal::ONE }
    }
}

/// Direction of the lot book a fill opens into / closes out of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PositionSide { Long, Short }
impl PositionSide {
    pub fn opposite(&self) -> PositionSide {
        match self { PositionSide::Long => PositionSide::Short, PositionSide::Short => PositionSide::Long }
    }
    /// +1 for Long, -1 for Short (PnL sign convention).
    pub fn sign(&self) -> Decimal {
        match self { PositionSide::Long => Decimal::ONE, PositionSide::Short => -Decimal::ONE }
    }
}

/// One executed trade, already validated and canonicalized by the normalizer.
/// `seq` is the index in the raw feed and breaks timestamp ties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fill {
    pub seq: u64,
    pub symbol: String,
    pub side: Side,
    pub qty: Decimal,
    pub price: Decimal,
    pub fee: Decimal,
    pub ts: DateTime<Utc>,
}

/// Remaining unmatched slice of an opening fill. Owned by exactly one lot
/// queue; `qty_remaining` only ever decreases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lot {
    pub qty_remaining: Decimal,
    pub entry_price: Decimal,
    pub opened_at: DateTime<Utc>,
    pub seq: u64,
}

/// One FIFO match: a slice of an old lot closed against a later fill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RealizedTrade {
    pub symbol: String,
    pub position_side: PositionSide,
    pub matched_qty: Decimal,
    pub entry_price: Decimal,
    pub exit_price: Decimal,
    pub fee_allocated: Decimal,
    pub realized_pnl: Decimal,
    pub opened_at: DateTime<Utc>,
    pub closed_at: DateTime<Utc>,
}

/// Broker-reported live state for one (symbol, side). Read-only input to
/// the merger; mark/leverage/margin are authoritative, qty and entry price
/// are only sanity-checked against locally reconciled lots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionSnapshot {
    pub symbol: String,
    pub position_side: PositionSide,
    pub qty: Decimal,
    pub entry_price: Decimal,
    pub mark_price: Decimal,
    pub leverage: u32,
    pub margin: Decimal,
}

/// Consolidated open position, one row of the report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionView {
    pub symbol: String,
    pub position_side: PositionSide,
    pub total_qty: Decimal,
    pub avg_entry_price: Decimal,
    pub mark_price: Decimal,
    pub leverage: u32,
    pub margin: Decimal,
    pub unrealized_pnl: Decimal,
    pub unrealized_pnl_pct: Decimal,
}

/// Volume-weighted rollup of the realized trades for one (symbol, side)
/// inside the requested window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RealizedSummary {
    pub symbol: String,
    pub position_side: PositionSide,
    pub total_qty: Decimal,
    pub avg_entry_price: Decimal,
    pub avg_exit_price: Decimal,
    pub total_pnl: Decimal,
    pub total_fees: Decimal,
    pub last_closed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub positions_total: usize,
    pub long_positions: usize,
    pub short_positions: usize,
    pub avg_leverage: Decimal,
    pub total_unrealized_pnl: Decimal,
    pub total_realized_pnl: Decimal,
}

/// Non-fatal findings attached to a report run. Malformed records are
/// skipped (never abort the batch); flips and snapshot disagreements are
/// visibility warnings, processing continues with local values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Diagnostic {
    MalformedFill { index: usize, reason: String },
    MalformedSnapshot { index: usize, reason: String },
    Flip { symbol: String, new_side: PositionSide, residual_qty: Decimal },
    SnapshotMismatch {
        symbol: String,
        position_side: PositionSide,
        what: String,
        local: Decimal,
        broker: Decimal,
    },
}

/// Top-level output of one report-generation call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionReport {
    pub generated_at: DateTime<Utc>,
    pub day_range: i64,
    pub positions: Vec<PositionView>,
    pub realized: Vec<RealizedTrade>,
    pub realized_by_symbol: Vec<RealizedSummary>,
    pub summary: ReportSummary,
    pub diagnostics: Vec<Diagnostic>,
}
