// ===============================
// src/merge.rs
// ===============================
//
// Position merger: folds each (symbol, side) lot queue into one
// volume-weighted view and joins the broker snapshot for mark price,
// leverage and margin. Local lot totals are authoritative for quantity
// and entry price; the snapshot is authoritative for mark/leverage/margin
// and only sanity-checked otherwise.
//
use std::collections::BTreeMap;

use ahash::AHashMap as HashMap;
use rust_decimal::Decimal;
use tracing::{debug, warn};

use crate::config::EngineConfig;
use crate::domain::{Diagnostic, PositionSide, PositionSnapshot, PositionView};
use crate::matcher::SymbolBook;
use crate::pnl;

fn view_for_side(
    symbol: &str,
    side: PositionSide,
    book: &SymbolBook,
    snapshots: &HashMap<(String, PositionSide), PositionSnapshot>,
    cfg: &EngineConfig,
    diagnostics: &mut Vec<Diagnostic>,
) -> Option<PositionView> {
    let lots = book.lots(side);
    if lots.is_empty() {
        return None;
    }

    let total_qty: Decimal = lots.iter().map(|l| l.qty_remaining).sum();
    if total_qty.abs() <= cfg.qty_epsilon {
        // Fully closed within rounding noise; nothing to show.
        return None;
    }
    let weighted: Decimal = lots.iter().map(|l| l.qty_remaining * l.entry_price).sum();
    let avg_entry_price = weighted / total_qty;

    let snap = snapshots.get(&(symbol.to_string(), side));
    if let Some(s) = snap {
        if (s.qty - total_qty).abs() > cfg.snapshot_epsilon {
            warn!(
                symbol, ?side, local = %total_qty, broker = %s.qty,
                "snapshot quantity disagrees with reconciled lots, fills may be missing"
            );
            diagnostics.push(Diagnostic::SnapshotMismatch {
                symbol: symbol.to_string(),
                position_side: side,
                what: "quantity".to_string(),
                local: total_qty,
                broker: s.qty,
            });
        }
        if s.entry_price > Decimal::ZERO
            && (s.entry_price - avg_entry_price).abs() > cfg.snapshot_epsilon
        {
            // Broker may average over a longer history than is locally
            // visible; local FIFO average stays authoritative.
            diagnostics.push(Diagnostic::SnapshotMismatch {
                symbol: symbol.to_string(),
                position_side: side,
                what: "entry_price".to_string(),
                local: avg_entry_price,
                broker: s.entry_price,
            });
        }
    } else {
        debug!(symbol, ?side, "no broker snapshot, marking at local entry");
    }

    let mark_price = snap.map(|s| s.mark_price).unwrap_or(avg_entry_price);
    let leverage = snap.map(|s| s.leverage).unwrap_or(1);
    let margin = snap.map(|s| s.margin).unwrap_or(Decimal::ZERO);

    let unrealized_pnl = pnl::directional_pnl(side, total_qty, avg_entry_price, mark_price);
    let unrealized_pnl_pct = pnl::pnl_pct(unrealized_pnl, total_qty, avg_entry_price);

    Some(PositionView {
        symbol: symbol.to_string(),
        position_side: side,
        total_qty,
        avg_entry_price,
        mark_price,
        leverage,
        margin,
        unrealized_pnl,
        unrealized_pnl_pct,
    })
}

/// Build one `PositionView` per non-empty (symbol, side). Books iterate in
/// symbol order (BTreeMap), long before short, so output order is stable
/// before the assembler re-sorts by notional.
pub fn merge_positions(
    books: &BTreeMap<String, SymbolBook>,
    snapshots: &[PositionSnapshot],
    cfg: &EngineConfig,
    diagnostics: &mut Vec<Diagnostic>,
) -> Vec<PositionView> {
    let mut snap_map: HashMap<(String, PositionSide), PositionSnapshot> = HashMap::new();
    for s in snapshots {
        snap_map.insert((s.symbol.clone(), s.position_side), s.clone());
    }

    let mut views = Vec::new();
    for (symbol, book) in books {
        for side in [PositionSide::Long, PositionSide::Short] {
            if let Some(v) = view_for_side(symbol, side, book, &snap_map, cfg, diagnostics) {
                snap_map.remove(&(symbol.clone(), side));
                views.push(v);
            }
        }
    }

    // Snapshot says we hold something the fill feed never opened: surface
    // it, the feed is probably incomplete.
    let mut orphans: Vec<&PositionSnapshot> = Vec::new();
    for s in snapshots {
        if snap_map.contains_key(&(s.symbol.clone(), s.position_side)) {
            orphans.push(s);
        }
    }
    orphans.sort_by(|a, b| a.symbol.cmp(&b.symbol));
    for s in orphans {
        warn!(symbol = %s.symbol, side = ?s.position_side, broker_qty = %s.qty,
              "broker position has no reconciled lots");
        diagnostics.push(Diagnostic::SnapshotMismatch {
            symbol: s.symbol.clone(),
            position_side: s.position_side,
            what: "quantity".to_string(),
            local: Decimal::ZERO,
            broker: s.qty,
        });
    }

    views
}
