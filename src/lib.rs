// ===============================
// src/lib.rs
// ===============================
//
// Position & realized-PnL reconciliation engine: replays a raw fill feed
// through per-symbol FIFO lot queues, merges the surviving lots with a
// live broker snapshot, and assembles one reportable structure. Pure
// batch computation: acquiring fills/snapshots and delivering the report
// belong to the surrounding collaborators.
//
pub mod config;
pub mod domain;
pub mod matcher;
pub mod merge;
pub mod metrics;
pub mod normalize;
pub mod pnl;
pub mod report;

pub use config::EngineConfig;
pub use domain::{PositionReport, PositionView, RealizedTrade};
pub use normalize::{RawFill, RawPositionSnapshot};
pub use report::{generate_report, generate_report_at, ReportError};
