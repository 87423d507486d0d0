// End-to-end scenarios: raw Binance-shaped JSON in, assembled report out.

use chrono::{TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use position_recon_rust::domain::{Diagnostic, PositionSide};
use position_recon_rust::normalize::{RawFill, RawPositionSnapshot};
use position_recon_rust::report::generate_report_at;
use position_recon_rust::{EngineConfig, ReportError};

const DAY_MS: i64 = 86_400_000;

fn fills_from_json(json: &str) -> Vec<RawFill> {
    serde_json::from_str(json).expect("fill fixture parses")
}

fn snaps_from_json(json: &str) -> Vec<RawPositionSnapshot> {
    serde_json::from_str(json).expect("snapshot fixture parses")
}

#[tokio::test]
async fn partial_close_and_flip_across_two_symbols() {
    // GIVEN: a day of BTC adds + partial close, and an ETH flip,
    // delivered in the exchange's wire shape
    let t0 = 39 * DAY_MS;
    let fills = fills_from_json(&format!(
        r#"[
          {{"symbol":"BTCUSDT","side":"BUY","qty":"1","price":"10000","commission":"0","commissionAsset":"USDT","time":{t1},"positionSide":"BOTH"}},
          {{"symbol":"BTCUSDT","side":"BUY","qty":"1","price":"11000","commission":"0","commissionAsset":"USDT","time":{t2},"positionSide":"BOTH"}},
          {{"symbol":"BTCUSDT","side":"SELL","qty":"1.5","price":"12000","commission":"0","commissionAsset":"USDT","time":{t3},"positionSide":"BOTH"}},
          {{"symbol":"ETHUSDT","side":"BUY","qty":"2","price":"3000","commission":"0","commissionAsset":"USDT","time":{t1},"positionSide":"BOTH"}},
          {{"symbol":"ETHUSDT","side":"SELL","qty":"3","price":"3100","commission":"0","commissionAsset":"USDT","time":{t2},"positionSide":"BOTH"}}
        ]"#,
        t1 = t0,
        t2 = t0 + 1000,
        t3 = t0 + 2000,
    ));
    let snaps = snaps_from_json(
        r#"[
          {"symbol":"BTCUSDT","positionAmt":"0.5","entryPrice":"11000","markPrice":"12500","leverage":"20","isolatedWallet":"300"},
          {"symbol":"ETHUSDT","positionAmt":"-1","entryPrice":"3100","markPrice":"3050","leverage":"10","isolatedWallet":"310"}
        ]"#,
    );
    let now = Utc.timestamp_millis_opt(40 * DAY_MS).unwrap();

    // WHEN
    let report = generate_report_at(&fills, &snaps, 7, &EngineConfig::default(), now)
        .await
        .expect("report");

    // THEN: BTC realizes 2000 + 500 against the two oldest lots
    let btc: Vec<_> = report.realized.iter().filter(|t| t.symbol == "BTCUSDT").collect();
    assert_eq!(btc.len(), 2);
    assert_eq!(btc[0].matched_qty, dec!(1));
    assert_eq!(btc[0].entry_price, dec!(10000));
    assert_eq!(btc[0].realized_pnl, dec!(2000));
    assert_eq!(btc[1].matched_qty, dec!(0.5));
    assert_eq!(btc[1].entry_price, dec!(11000));
    assert_eq!(btc[1].realized_pnl, dec!(500));

    // ETH realizes 200 and flips 1.0 short at 3100
    let eth: Vec<_> = report.realized.iter().filter(|t| t.symbol == "ETHUSDT").collect();
    assert_eq!(eth.len(), 1);
    assert_eq!(eth[0].matched_qty, dec!(2));
    assert_eq!(eth[0].realized_pnl, dec!(200));
    assert!(report.diagnostics.iter().any(|d| matches!(
        d,
        Diagnostic::Flip { symbol, new_side: PositionSide::Short, residual_qty }
            if symbol == "ETHUSDT" && *residual_qty == dec!(1)
    )));

    // surviving positions merge against the snapshot, biggest notional first
    assert_eq!(report.positions.len(), 2);
    let btc_view = &report.positions[0];
    assert_eq!(btc_view.symbol, "BTCUSDT");
    assert_eq!(btc_view.total_qty, dec!(0.5));
    assert_eq!(btc_view.avg_entry_price, dec!(11000));
    assert_eq!(btc_view.mark_price, dec!(12500));
    assert_eq!(btc_view.unrealized_pnl, dec!(750));
    let eth_view = &report.positions[1];
    assert_eq!(eth_view.position_side, PositionSide::Short);
    assert_eq!(eth_view.unrealized_pnl, dec!(50)); // short, mark below entry

    assert_eq!(report.summary.total_realized_pnl, dec!(2700));
    assert_eq!(report.summary.long_positions, 1);
    assert_eq!(report.summary.short_positions, 1);
    assert_eq!(report.summary.avg_leverage, dec!(15));
}

#[tokio::test]
async fn malformed_rows_are_skipped_and_conservation_holds() {
    let t0 = 39 * DAY_MS;
    let fills = fills_from_json(&format!(
        r#"[
          {{"symbol":"BTCUSDT","side":"BUY","qty":"2","price":"10000","time":{t1}}},
          {{"symbol":"BTCUSDT","side":"BUY","qty":"0","price":"10000","time":{t2}}},
          {{"symbol":"","side":"SELL","qty":"1","price":"10500","time":{t2}}},
          {{"symbol":"BTCUSDT","side":"SELL","qty":"0.5","price":"11000","time":{t3}}}
        ]"#,
        t1 = t0,
        t2 = t0 + 1000,
        t3 = t0 + 2000,
    ));
    let now = Utc.timestamp_millis_opt(40 * DAY_MS).unwrap();
    let report = generate_report_at(&fills, &[], 7, &EngineConfig::default(), now)
        .await
        .expect("report");

    let malformed = report
        .diagnostics
        .iter()
        .filter(|d| matches!(d, Diagnostic::MalformedFill { .. }))
        .count();
    assert_eq!(malformed, 2);

    // valid subset: opened 2, matched 0.5, surviving 1.5
    let matched: Decimal = report.realized.iter().map(|t| t.matched_qty).sum();
    assert_eq!(matched, dec!(0.5));
    assert_eq!(report.positions[0].total_qty, dec!(1.5));
    assert_eq!(matched + report.positions[0].total_qty, dec!(2));
}

#[tokio::test]
async fn out_of_domain_day_range_is_a_validation_error() {
    let fills = fills_from_json(
        r#"[{"symbol":"BTCUSDT","side":"BUY","qty":"1","price":"10000","time":1700000000000}]"#,
    );
    let err = generate_report_at(
        &fills,
        &[],
        45,
        &EngineConfig::default(),
        Utc.timestamp_millis_opt(1_700_100_000_000).unwrap(),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ReportError::DayRange(45)));
}
