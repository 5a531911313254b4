//! Library crate for hx-scan-rs: concurrent HTTP status probing with an
//! optional CORS check and a re-scan pass for failed targets.
pub mod aggregator;
pub mod config;
pub mod cors;
pub mod logging;
pub mod prober;
pub mod report;
pub mod scanner;
pub mod sink;
pub mod status;
pub mod targets;
pub mod types;
pub mod worker;
