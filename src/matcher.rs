// ===============================
// src/matcher.rs
// ===============================
//
// FIFO lot matcher. One `SymbolBook` per symbol holds the open long and
// short lot queues; a closing fill consumes the oldest lots first. A fill
// that outsizes the book flips the residual into a fresh lot on the
// opposite side (economic reality of a position reversing inside one
// fill, not an error).
//
// Ordering invariant: `ingest` must see a symbol's fills in (ts, seq)
// order. The normalizer sorts the feed and `reconcile` replays a
// per-symbol slice, so queue insertion order is already the FIFO
// tie-break for equal timestamps.
//
use std::collections::VecDeque;

use rust_decimal::Decimal;
use tracing::warn;

use crate::domain::{Diagnostic, Fill, Lot, PositionSide, RealizedTrade, Side};
use crate::pnl;

#[derive(Debug, Default)]
pub struct SymbolBook {
    long: VecDeque<Lot>,
    short: VecDeque<Lot>,
}

/// Everything one symbol's replay produced: surviving lots stay in the
/// book, matches and flip warnings come out.
#[derive(Debug, Default)]
pub struct SymbolOutcome {
    pub book: SymbolBook,
    pub realized: Vec<RealizedTrade>,
    pub diagnostics: Vec<Diagnostic>,
}

impl SymbolBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lots(&self, side: PositionSide) -> &VecDeque<Lot> {
        match side {
            PositionSide::Long => &self.long,
            PositionSide::Short => &self.short,
        }
    }

    pub fn open_qty(&self, side: PositionSide) -> Decimal {
        self.lots(side).iter().map(|l| l.qty_remaining).sum()
    }

    /// Apply one fill. A BUY closes short lots oldest-first and opens long
    /// with whatever is left; a SELL is the mirror image. Direction comes
    /// purely from this book comparison, never from feed flags.
    pub fn ingest(&mut self, fill: &Fill) -> (Vec<RealizedTrade>, Option<Diagnostic>) {
        let closing_side = match fill.side {
            Side::Buy => PositionSide::Short,
            Side::Sell => PositionSide::Long,
        };
        let queue = match closing_side {
            PositionSide::Long => &mut self.long,
            PositionSide::Short => &mut self.short,
        };

        let had_open = !queue.is_empty();
        let mut remaining = fill.qty;
        let mut realized = Vec::new();

        while remaining > Decimal::ZERO {
            let Some(lot) = queue.front_mut() else { break };
            let matched = lot.qty_remaining.min(remaining);
            // Fee is prorated by matched share of the closing fill.
            let fee_allocated = fill.fee * matched / fill.qty;
            let gross = pnl::directional_pnl(closing_side, matched, lot.entry_price, fill.price);
            realized.push(RealizedTrade {
                symbol: fill.symbol.clone(),
                position_side: closing_side,
                matched_qty: matched,
                entry_price: lot.entry_price,
                exit_price: fill.price,
                fee_allocated,
                realized_pnl: gross - fee_allocated,
                opened_at: lot.opened_at,
                closed_at: fill.ts,
            });
            lot.qty_remaining -= matched;
            remaining -= matched;
            if lot.qty_remaining == Decimal::ZERO {
                queue.pop_front();
            }
        }

        let mut flip = None;
        if remaining > Decimal::ZERO {
            let opening_side = closing_side.opposite();
            if had_open {
                // Book emptied mid-fill: the residual reverses direction.
                warn!(
                    symbol = %fill.symbol,
                    residual = %remaining,
                    new_side = ?opening_side,
                    "position flip within a single fill"
                );
                flip = Some(Diagnostic::Flip {
                    symbol: fill.symbol.clone(),
                    new_side: opening_side,
                    residual_qty: remaining,
                });
            }
            let open_queue = match opening_side {
                PositionSide::Long => &mut self.long,
                PositionSide::Short => &mut self.short,
            };
            open_queue.push_back(Lot {
                qty_remaining: remaining,
                entry_price: fill.price,
                opened_at: fill.ts,
                seq: fill.seq,
            });
        }

        (realized, flip)
    }
}

/// Replay one symbol's ordered fill slice from scratch.
pub fn reconcile(fills: &[Fill]) -> SymbolOutcome {
    let mut outcome = SymbolOutcome::default();
    for fill in fills {
        let (mut realized, flip) = outcome.book.ingest(fill);
        outcome.realized.append(&mut realized);
        if let Some(d) = flip {
            outcome.diagnostics.push(d);
        }
    }
    outcome
}
