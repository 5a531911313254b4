use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};

use crate::report::Reporter;
use crate::sink::{append_or_warn, OutputSink, SinkId};
use crate::status::{self, StatusClass};
use crate::types::{CorsOutcome, ScanResult};

/// Counters and collections shared by every phase of one run.
///
/// Created once, passed by reference into each phase, never reset. At any
/// quiescent point `success + failure == processed` and the histogram values
/// sum to `success`.
#[derive(Debug, Default)]
pub struct AggregateState {
    processed: AtomicU64,
    success_count: AtomicI64,
    failure_count: AtomicI64,
    status_histogram: Mutex<BTreeMap<u16, i64>>,
    failed_targets: Mutex<Vec<String>>,
}

impl AggregateState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Targets accounted for so far. Re-scans do not add to it.
    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    pub fn success_count(&self) -> i64 {
        self.success_count.load(Ordering::Relaxed)
    }

    pub fn failure_count(&self) -> i64 {
        self.failure_count.load(Ordering::Relaxed)
    }

    /// Copy of the status histogram.
    pub async fn histogram(&self) -> BTreeMap<u16, i64> {
        self.status_histogram.lock().await.clone()
    }

    /// Copy of the failed-target list, taken under its lock and released
    /// before the caller does anything with it.
    pub async fn failed_targets_snapshot(&self) -> Vec<String> {
        self.failed_targets.lock().await.clone()
    }

    async fn record_status(&self, code: u16) {
        let mut histogram = self.status_histogram.lock().await;
        *histogram.entry(code).or_insert(0) += 1;
    }

    async fn push_failed_target(&self, target: &str) {
        self.failed_targets.lock().await.push(target.to_string());
    }
}

/// Drain `results` until every sender is gone, updating `state` and routing
/// each result to its sinks.
///
/// Must be the only consumer of the channel. `track_failures` controls whether
/// initial-phase failures are remembered for a later re-scan. Returns the
/// number of results consumed.
pub async fn drain_results(
    mut results: mpsc::Receiver<ScanResult>,
    track_failures: bool,
    state: Arc<AggregateState>,
    sinks: Arc<dyn OutputSink>,
    reporter: Arc<dyn Reporter>,
) -> u64 {
    let mut consumed = 0u64;
    let mut recorded_failures: HashSet<String> = HashSet::new();

    while let Some(result) = results.recv().await {
        consumed += 1;

        let description = if result.is_success() {
            status::describe_or_unknown(result.status_code)
        } else {
            ""
        };
        reporter.report_result(&result, description);

        if let Some(cors) = &result.cors {
            handle_cors(&result.target, cors, sinks.as_ref(), reporter.as_ref());
        }

        if result.is_success() {
            record_success(&result, description, &state, sinks.as_ref()).await;
        } else {
            let first = recorded_failures.insert(result.target.clone());
            record_failure(&result, track_failures && first, &state, sinks.as_ref()).await;
        }
    }

    debug!(consumed, "result queue drained");
    consumed
}

async fn record_failure(
    result: &ScanResult,
    remember: bool,
    state: &AggregateState,
    sinks: &dyn OutputSink,
) {
    let reason = result
        .error
        .as_ref()
        .map(ToString::to_string)
        .unwrap_or_else(|| "no response".to_string());

    let line = if result.is_rescan() {
        // Already counted when it failed the initial scan.
        info!(scan_target = %result.target, %reason, "failure persists after re-scan");
        format!("[!!] RESCAN FAIL {} -> ERROR: {reason}", result.target)
    } else {
        state.processed.fetch_add(1, Ordering::Relaxed);
        state.failure_count.fetch_add(1, Ordering::Relaxed);
        if remember {
            state.push_failed_target(&result.target).await;
            append_or_warn(sinks, SinkId::Invalid, &result.target);
        }
        debug!(scan_target = %result.target, %reason, "probe failed");
        format!("[!] FAIL {} -> ERROR: {reason}", result.target)
    };
    append_or_warn(sinks, SinkId::Log, &line);
}

async fn record_success(
    result: &ScanResult,
    description: &str,
    state: &AggregateState,
    sinks: &dyn OutputSink,
) {
    let code = result.status_code;
    let line = if result.is_rescan() {
        // Move the target from the failure tally to the success tally.
        state.failure_count.fetch_sub(1, Ordering::Relaxed);
        format!("[✓✓] RESCAN SUCCESS {} -> {code} {description}", result.target)
    } else {
        state.processed.fetch_add(1, Ordering::Relaxed);
        format!("[✓] SUCCESS {} -> {code} {description}", result.target)
    };
    state.success_count.fetch_add(1, Ordering::Relaxed);
    state.record_status(code).await;

    append_or_warn(sinks, SinkId::Exists, &result.target);
    append_or_warn(sinks, SinkId::Log, &line);

    let class = StatusClass::of(code);
    let known = status::is_known(code);
    match class {
        Some(class) if known => {
            append_or_warn(sinks, SinkId::Status(code), &result.target);
            append_or_warn(sinks, SinkId::Category(class), &result.target);
        }
        _ => {
            warn!(scan_target = %result.target, code, "unknown status code");
            append_or_warn(
                sinks,
                SinkId::Log,
                &format!(
                    "[?] UNKNOWN STATUS {} -> {code} (Desc Known: {known}, Cat Known: {})",
                    result.target,
                    class.is_some()
                ),
            );
            append_or_warn(
                sinks,
                SinkId::UnknownStatus,
                &format!("{} -> {code}", result.target),
            );
        }
    }
}

/// CORS findings go to their own sink and never touch the primary counters.
fn handle_cors(target: &str, cors: &CorsOutcome, sinks: &dyn OutputSink, reporter: &dyn Reporter) {
    if let Some(err) = &cors.error {
        warn!(scan_target = target, error = %err, "CORS check failed");
        append_or_warn(
            sinks,
            SinkId::Log,
            &format!("[!] CORS Check Error for {target}: {err}"),
        );
    } else if cors.vulnerable {
        let finding = format!("{target} ({})", cors.detail);
        info!(scan_target = target, detail = %cors.detail, "CORS misconfiguration found");
        append_or_warn(sinks, SinkId::CorsVulnerable, &finding);
        append_or_warn(sinks, SinkId::Log, &format!("[!] CORS VULNERABLE: {finding}"));
    } else {
        debug!(scan_target = target, detail = %cors.detail, "CORS check passed");
    }
    reporter.report_cors(target, cors);
}
