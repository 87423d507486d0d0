// ===============================
// src/normalize.rs
// ===============================
//
// Fill / snapshot normalizer:
// - RawFill / RawPositionSnapshot mirror the Binance futures payloads
//   (string-encoded numerics, epoch-ms timestamps).
// - Bad records are skipped and recorded as diagnostics; one bad record
//   never aborts the batch.
// - The advisory `positionSide` flag from the feed is carried but NOT
//   trusted: opening vs closing is decided downstream by comparing the
//   fill side against the lot book, so an absent or inconsistent flag
//   cannot corrupt the matching.
//
use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::domain::{Diagnostic, Fill, PositionSide, PositionSnapshot, Side};

/// One row of `GET /fapi/v1/userTrades`, as delivered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawFill {
    #[serde(default)]
    pub symbol: String,
    pub side: String,
    pub qty: String,
    pub price: String,
    #[serde(default)]
    pub commission: Option<String>,
    #[serde(rename = "commissionAsset", default)]
    pub commission_asset: Option<String>,
    /// Epoch milliseconds.
    pub time: i64,
    /// LONG / SHORT / BOTH, advisory only (see module header).
    #[serde(rename = "positionSide", default)]
    pub position_side: Option<String>,
}

/// One row of the broker's live position list (`futures_account` /
/// `positionRisk` shape). `positionAmt` is signed: > 0 long, < 0 short.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawPositionSnapshot {
    #[serde(default)]
    pub symbol: String,
    #[serde(rename = "positionAmt")]
    pub position_amt: String,
    #[serde(rename = "entryPrice")]
    pub entry_price: String,
    #[serde(rename = "markPrice")]
    pub mark_price: String,
    pub leverage: String,
    #[serde(rename = "isolatedWallet", default)]
    pub isolated_wallet: Option<String>,
}

fn parse_decimal(field: &'static str, raw: &str) -> Result<Decimal, String> {
    raw.trim()
        .parse::<Decimal>()
        .map_err(|_| format!("{field}: unparseable decimal {raw:?}"))
}

fn parse_ts_ms(ms: i64) -> Result<DateTime<Utc>, String> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .ok_or_else(|| format!("time: {ms} out of range"))
}

fn check_fill(seq: u64, raw: &RawFill) -> Result<Fill, String> {
    if raw.symbol.trim().is_empty() {
        return Err("symbol: missing".to_string());
    }
    let side = match raw.side.to_ascii_uppercase().as_str() {
        "BUY" => Side::Buy,
        "SELL" => Side::Sell,
        other => return Err(format!("side: unknown {other:?}")),
    };
    let qty = parse_decimal("qty", &raw.qty)?;
    if qty <= Decimal::ZERO {
        return Err(format!("qty: non-positive {qty}"));
    }
    let price = parse_decimal("price", &raw.price)?;
    if price <= Decimal::ZERO {
        return Err(format!("price: non-positive {price}"));
    }
    let ts = parse_ts_ms(raw.time)?;

    let mut fee = match &raw.commission {
        Some(c) => parse_decimal("commission", c)?,
        None => Decimal::ZERO,
    };
    if fee < Decimal::ZERO {
        return Err(format!("commission: negative {fee}"));
    }
    // Commission paid in a non-quote asset (e.g. BNB) is not comparable to
    // quote-denominated PnL; drop it rather than mix currencies.
    if let Some(asset) = &raw.commission_asset {
        if !asset.is_empty() && !raw.symbol.to_ascii_uppercase().ends_with(&asset.to_ascii_uppercase()) {
            debug!(symbol = %raw.symbol, asset = %asset, "commission in non-quote asset, ignored");
            fee = Decimal::ZERO;
        }
    }

    Ok(Fill {
        seq,
        symbol: raw.symbol.trim().to_ascii_uppercase(),
        side,
        qty,
        price,
        fee,
        ts,
    })
}

fn check_snapshot(raw: &RawPositionSnapshot) -> Result<Option<PositionSnapshot>, String> {
    if raw.symbol.trim().is_empty() {
        return Err("symbol: missing".to_string());
    }
    let amt = parse_decimal("positionAmt", &raw.position_amt)?;
    if amt == Decimal::ZERO {
        // Binance reports flat symbols too; nothing to merge.
        return Ok(None);
    }
    let entry_price = parse_decimal("entryPrice", &raw.entry_price)?;
    let mark_price = parse_decimal("markPrice", &raw.mark_price)?;
    if mark_price <= Decimal::ZERO {
        return Err(format!("markPrice: non-positive {mark_price}"));
    }
    let leverage: u32 = raw
        .leverage
        .trim()
        .parse()
        .map_err(|_| format!("leverage: unparseable {:?}", raw.leverage))?;
    let margin = match &raw.isolated_wallet {
        Some(w) => parse_decimal("isolatedWallet", w)?,
        None => Decimal::ZERO,
    };

    let position_side = if amt > Decimal::ZERO { PositionSide::Long } else { PositionSide::Short };
    Ok(Some(PositionSnapshot {
        symbol: raw.symbol.trim().to_ascii_uppercase(),
        position_side,
        qty: amt.abs(),
        entry_price,
        mark_price,
        leverage: leverage.max(1),
        margin,
    }))
}

/// Validate and canonicalize the raw fill feed. The output is sorted by
/// `(ts, seq)` so that per-symbol replay order is deterministic; rejects go
/// into `diagnostics`.
pub fn normalize_fills(raw: &[RawFill], diagnostics: &mut Vec<Diagnostic>) -> Vec<Fill> {
    let mut fills = Vec::with_capacity(raw.len());
    for (index, r) in raw.iter().enumerate() {
        match check_fill(index as u64, r) {
            Ok(fill) => fills.push(fill),
            Err(reason) => {
                warn!(index, %reason, "malformed fill skipped");
                diagnostics.push(Diagnostic::MalformedFill { index, reason });
            }
        }
    }
    fills.sort_by(|a, b| a.ts.cmp(&b.ts).then(a.seq.cmp(&b.seq)));
    fills
}

/// Validate and canonicalize the broker snapshot feed. Flat rows are
/// silently dropped; malformed rows go into `diagnostics`.
pub fn normalize_snapshots(
    raw: &[RawPositionSnapshot],
    diagnostics: &mut Vec<Diagnostic>,
) -> Vec<PositionSnapshot> {
    let mut snapshots = Vec::with_capacity(raw.len());
    for (index, r) in raw.iter().enumerate() {
        match check_snapshot(r) {
            Ok(Some(snap)) => snapshots.push(snap),
            Ok(None) => {}
            Err(reason) => {
                warn!(index, %reason, "malformed snapshot skipped");
                diagnostics.push(Diagnostic::MalformedSnapshot { index, reason });
            }
        }
    }
    snapshots
}
