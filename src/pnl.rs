// ===============================
// src/pnl.rs
// ===============================
//
// Realized PnL math and window-scoped aggregation.
//
// Sign convention (everywhere in this crate):
//   Long:  pnl = qty * (exit - entry)
//   Short: pnl = qty * (entry - exit)
// Fees are subtracted after the directional term.
//
use ahash::AHashMap as HashMap;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::domain::{PositionSide, RealizedSummary, RealizedTrade};

/// Directional PnL before fees.
pub fn directional_pnl(
    side: PositionSide,
    qty: Decimal,
    entry_price: Decimal,
    exit_price: Decimal,
) -> Decimal {
    side.sign() * qty * (exit_price - entry_price)
}

/// Percent return on entry notional. Zero notional yields zero rather than
/// a division error.
pub fn pnl_pct(pnl: Decimal, qty: Decimal, entry_price: Decimal) -> Decimal {
    let notional = qty * entry_price;
    if notional == Decimal::ZERO {
        Decimal::ZERO
    } else {
        pnl / notional * dec!(100)
    }
}

/// Trades whose `closed_at` falls within `[now - days, now]`, lower bound
/// inclusive.
pub fn window(trades: &[RealizedTrade], now: DateTime<Utc>, days: i64) -> Vec<RealizedTrade> {
    let cutoff = now - Duration::days(days);
    trades
        .iter()
        .filter(|t| t.closed_at >= cutoff && t.closed_at <= now)
        .cloned()
        .collect()
}

fn side_rank(side: PositionSide) -> u8 {
    match side { PositionSide::Long => 0, PositionSide::Short => 1 }
}

/// Roll windowed trades up per (symbol, side): volume-weighted average
/// entry/exit, totals, latest close time. Sorted newest-close first (the
/// order the report prints them in), symbol/side as tie-break so replays
/// are byte-identical.
pub fn summarize(trades: &[RealizedTrade]) -> Vec<RealizedSummary> {
    struct Acc {
        qty: Decimal,
        entry_notional: Decimal,
        exit_notional: Decimal,
        pnl: Decimal,
        fees: Decimal,
        last_closed_at: DateTime<Utc>,
    }

    let mut by_key: HashMap<(String, PositionSide), Acc> = HashMap::new();
    for t in trades {
        let acc = by_key
            .entry((t.symbol.clone(), t.position_side))
            .or_insert_with(|| Acc {
                qty: Decimal::ZERO,
                entry_notional: Decimal::ZERO,
                exit_notional: Decimal::ZERO,
                pnl: Decimal::ZERO,
                fees: Decimal::ZERO,
                last_closed_at: t.closed_at,
            });
        acc.qty += t.matched_qty;
        acc.entry_notional += t.entry_price * t.matched_qty;
        acc.exit_notional += t.exit_price * t.matched_qty;
        acc.pnl += t.realized_pnl;
        acc.fees += t.fee_allocated;
        if t.closed_at > acc.last_closed_at {
            acc.last_closed_at = t.closed_at;
        }
    }

    let mut out: Vec<RealizedSummary> = by_key
        .into_iter()
        .filter(|(_, acc)| acc.qty > Decimal::ZERO)
        .map(|((symbol, position_side), acc)| RealizedSummary {
            symbol,
            position_side,
            total_qty: acc.qty,
            avg_entry_price: acc.entry_notional / acc.qty,
            avg_exit_price: acc.exit_notional / acc.qty,
            total_pnl: acc.pnl,
            total_fees: acc.fees,
            last_closed_at: acc.last_closed_at,
        })
        .collect();

    out.sort_by(|a, b| {
        b.last_closed_at
            .cmp(&a.last_closed_at)
            .then_with(|| a.symbol.cmp(&b.symbol))
            .then_with(|| side_rank(a.position_side).cmp(&side_rank(b.position_side)))
    });
    out
}

/// Total realized PnL across a trade slice.
pub fn total_pnl(trades: &[RealizedTrade]) -> Decimal {
    trades.iter().map(|t| t.realized_pnl).sum()
}
