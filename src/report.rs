// ===============================
// src/report.rs
// ===============================
//
// Report assembler and the one public entry point:
//
//   generate_report(fills, snapshots, day_range) -> PositionReport | error
//
// Fills are normalized, partitioned into per-symbol ordered sub-streams,
// and reconciled concurrently, one worker per symbol; queues for
// different symbols share no state. Results are reassembled in symbol
// order so a replay of the same feed is byte-identical.
//
use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use thiserror::Error;
use tokio::task::JoinSet;
use tracing::info;

use crate::config::EngineConfig;
use crate::domain::{Fill, PositionReport, PositionSide, ReportSummary};
use crate::matcher::{self, SymbolOutcome};
use crate::merge;
use crate::metrics::{FILLS, FLIPS, MALFORMED_RECORDS, PNL_REALIZED, PNL_UNREALIZED, REPORTS};
use crate::normalize::{self, RawFill, RawPositionSnapshot};
use crate::pnl;

pub const DAY_RANGE_MIN: i64 = 1;
pub const DAY_RANGE_MAX: i64 = 30;

/// Caller-facing validation failures. Per-record problems never land here;
/// they are skipped and reported as diagnostics.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("day range {0} outside {DAY_RANGE_MIN}..={DAY_RANGE_MAX}")]
    DayRange(i64),
    #[error("no valid fills or snapshots to report on")]
    EmptyInput,
    #[error("reconciliation worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

fn side_rank(side: PositionSide) -> u8 {
    match side { PositionSide::Long => 0, PositionSide::Short => 1 }
}

/// Group the time-sorted fill stream by symbol. Relative order inside each
/// sub-stream is preserved; that ordering is what makes per-symbol workers
/// safe to run concurrently.
fn partition_by_symbol(fills: Vec<Fill>) -> BTreeMap<String, Vec<Fill>> {
    let mut by_symbol: BTreeMap<String, Vec<Fill>> = BTreeMap::new();
    for fill in fills {
        by_symbol.entry(fill.symbol.clone()).or_default().push(fill);
    }
    by_symbol
}

fn summarize_views(
    views: &[crate::domain::PositionView],
    total_realized_pnl: Decimal,
) -> ReportSummary {
    let long_positions = views.iter().filter(|v| v.position_side == PositionSide::Long).count();
    let short_positions = views.len() - long_positions;
    // Simple mean, not notional-weighted: "typical leverage in use".
    let avg_leverage = if views.is_empty() {
        Decimal::ZERO
    } else {
        let sum: u64 = views.iter().map(|v| v.leverage as u64).sum();
        Decimal::from(sum) / Decimal::from(views.len() as u64)
    };
    ReportSummary {
        positions_total: views.len(),
        long_positions,
        short_positions,
        avg_leverage,
        total_unrealized_pnl: views.iter().map(|v| v.unrealized_pnl).sum(),
        total_realized_pnl,
    }
}

/// Like [`generate_report`] but with an explicit clock, so replays and
/// tests are reproducible.
pub async fn generate_report_at(
    raw_fills: &[RawFill],
    raw_snapshots: &[RawPositionSnapshot],
    day_range: i64,
    cfg: &EngineConfig,
    now: DateTime<Utc>,
) -> Result<PositionReport, ReportError> {
    if !(DAY_RANGE_MIN..=DAY_RANGE_MAX).contains(&day_range) {
        return Err(ReportError::DayRange(day_range));
    }

    let mut diagnostics = Vec::new();
    let fills = normalize::normalize_fills(raw_fills, &mut diagnostics);
    let snapshots = normalize::normalize_snapshots(raw_snapshots, &mut diagnostics);
    MALFORMED_RECORDS.inc_by(diagnostics.len() as u64);
    if fills.is_empty() && snapshots.is_empty() {
        return Err(ReportError::EmptyInput);
    }
    FILLS.inc_by(fills.len() as u64);

    // One worker per symbol; collect into a BTreeMap so assembly order
    // does not depend on scheduling.
    let mut workers: JoinSet<(String, SymbolOutcome)> = JoinSet::new();
    for (symbol, symbol_fills) in partition_by_symbol(fills) {
        workers.spawn(async move {
            let outcome = matcher::reconcile(&symbol_fills);
            (symbol, outcome)
        });
    }
    let mut outcomes: BTreeMap<String, SymbolOutcome> = BTreeMap::new();
    while let Some(joined) = workers.join_next().await {
        let (symbol, outcome) = joined?;
        outcomes.insert(symbol, outcome);
    }

    let mut books = BTreeMap::new();
    let mut realized_all = Vec::new();
    for (symbol, outcome) in outcomes {
        FLIPS.inc_by(outcome.diagnostics.len() as u64);
        diagnostics.extend(outcome.diagnostics);
        realized_all.extend(outcome.realized);
        books.insert(symbol, outcome.book);
    }

    let mut positions = merge::merge_positions(&books, &snapshots, cfg, &mut diagnostics);
    positions.sort_by(|a, b| {
        let an = (a.total_qty * a.mark_price).abs();
        let bn = (b.total_qty * b.mark_price).abs();
        bn.cmp(&an)
            .then_with(|| a.symbol.cmp(&b.symbol))
            .then_with(|| side_rank(a.position_side).cmp(&side_rank(b.position_side)))
    });

    let realized = pnl::window(&realized_all, now, day_range);
    let realized_by_symbol = pnl::summarize(&realized);
    let total_realized_pnl = pnl::total_pnl(&realized);
    let summary = summarize_views(&positions, total_realized_pnl);

    PNL_REALIZED.set(total_realized_pnl.to_f64().unwrap_or(0.0));
    PNL_UNREALIZED.set(summary.total_unrealized_pnl.to_f64().unwrap_or(0.0));
    REPORTS.inc();

    info!(
        positions = positions.len(),
        realized_trades = realized.len(),
        diagnostics = diagnostics.len(),
        day_range,
        "report assembled"
    );

    Ok(PositionReport {
        generated_at: now,
        day_range,
        positions,
        realized,
        realized_by_symbol,
        summary,
        diagnostics,
    })
}

/// Invocation surface for the command-handling collaborator
/// (`/position [days]` style input, already parsed to an integer).
pub async fn generate_report(
    raw_fills: &[RawFill],
    raw_snapshots: &[RawPositionSnapshot],
    day_range: i64,
    cfg: &EngineConfig,
) -> Result<PositionReport, ReportError> {
    generate_report_at(raw_fills, raw_snapshots, day_range, cfg, Utc::now()).await
}
