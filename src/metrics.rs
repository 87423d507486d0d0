// ===============================
// src/metrics.rs
// ===============================
use once_cell::sync::Lazy;
use prometheus::{Encoder, Gauge, IntCounter, Registry, TextEncoder};
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::thread;

// Single custom registry (we register everything here)
pub static REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);

// -------- Reconciliation metrics --------
pub static FILLS: Lazy<IntCounter> =
    Lazy::new(|| IntCounter::new("fills_processed_total", "valid fills ingested").unwrap());

pub static MALFORMED_RECORDS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("malformed_records_total", "fill/snapshot records skipped").unwrap()
});

pub static FLIPS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("position_flips_total", "fills that reversed a position direction").unwrap()
});

pub static REPORTS: Lazy<IntCounter> =
    Lazy::new(|| IntCounter::new("reports_generated_total", "position reports assembled").unwrap());

// PnL of the most recent report (quote currency)
pub static PNL_REALIZED: Lazy<Gauge> =
    Lazy::new(|| Gauge::new("pnl_realized", "windowed realized PnL, last report").unwrap());

pub static PNL_UNREALIZED: Lazy<Gauge> =
    Lazy::new(|| Gauge::new("pnl_unrealized", "total unrealized PnL, last report").unwrap());

pub fn init() {
    // Register all metrics to the custom registry
    for m in [
        REGISTRY.register(Box::new(FILLS.clone())),
        REGISTRY.register(Box::new(MALFORMED_RECORDS.clone())),
        REGISTRY.register(Box::new(FLIPS.clone())),
        REGISTRY.register(Box::new(REPORTS.clone())),
        REGISTRY.register(Box::new(PNL_REALIZED.clone())),
        REGISTRY.register(Box::new(PNL_UNREALIZED.clone())),
    ] {
        let _ = m;
    }
}

// Encode all metrics in Prometheus text format
fn encode_metrics() -> Vec<u8> {
    let encoder = TextEncoder::new();
    let families = REGISTRY.gather();
    let mut buf = Vec::new();
    if encoder.encode(&families, &mut buf).is_err() || buf.is_empty() {
        buf.extend_from_slice(b"# no metrics\n");
    }
    buf
}

// Serve one HTTP request (GET / or /metrics), tiny HTTP 1.1 responder
fn handle_client(mut stream: TcpStream) {
    // Drain the request line/headers, no full parse needed
    let mut _req_buf = [0u8; 512];
    let _ = stream.read(&mut _req_buf);

    let body = encode_metrics();
    let header = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: text/plain; version=0.0.4; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        body.len()
    );

    let _ = stream.write_all(header.as_bytes());
    let _ = stream.write_all(&body);
    let _ = stream.flush();
}

// Run the exposition server on a dedicated OS thread (keeps the Tokio
// runtime clean; report generation never waits on it)
pub fn serve_metrics(port: u16) {
    thread::spawn(move || {
        let addr = format!("0.0.0.0:{port}");
        let listener = match TcpListener::bind(&addr) {
            Ok(l) => l,
            Err(e) => {
                eprintln!("metrics bind {addr} failed: {e}");
                return;
            }
        };
        eprintln!("metrics listening on http://{addr}/metrics");

        for conn in listener.incoming() {
            match conn {
                Ok(stream) => handle_client(stream),
                Err(e) => eprintln!("metrics accept error: {e}"),
            }
        }
    });
}
