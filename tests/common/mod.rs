#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use hx_scan_rs::config::ScanConfig;
use hx_scan_rs::cors::CorsCheck;
use hx_scan_rs::prober::Probe;
use hx_scan_rs::report::Reporter;
use hx_scan_rs::scanner::Scanner;
use hx_scan_rs::sink::{OutputSink, SinkId};
use hx_scan_rs::types::{
    CorsOutcome, FailureReason, NetworkErrorKind, PhaseSummary, ScanResult,
};

pub type Outcome = Result<u16, FailureReason>;

pub fn timeout() -> Outcome {
    Err(FailureReason::network(
        NetworkErrorKind::Timeout,
        "operation timed out",
    ))
}

pub fn refused() -> Outcome {
    Err(FailureReason::network(
        NetworkErrorKind::Connect,
        "connection refused",
    ))
}

/// Prober answering from a per-target script. The last scripted outcome of a
/// target repeats once the script runs out; unknown targets time out.
#[derive(Default)]
pub struct ScriptedProber {
    scripts: Mutex<HashMap<String, VecDeque<Outcome>>>,
    calls: Mutex<HashMap<String, usize>>,
    delay: Option<Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedProber {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn script(self, target: &str, outcomes: impl IntoIterator<Item = Outcome>) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(target.to_string(), outcomes.into_iter().collect());
        self
    }

    pub fn calls_for(&self, target: &str) -> usize {
        self.calls.lock().unwrap().get(target).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn next_outcome(&self, target: &str) -> Outcome {
        *self
            .calls
            .lock()
            .unwrap()
            .entry(target.to_string())
            .or_insert(0) += 1;
        let mut scripts = self.scripts.lock().unwrap();
        match scripts.get_mut(target) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap(),
            Some(queue) if !queue.is_empty() => queue[0].clone(),
            _ => timeout(),
        }
    }
}

#[async_trait]
impl Probe for ScriptedProber {
    async fn probe(&self, target: &str) -> Result<u16, FailureReason> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let outcome = self.next_outcome(target);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        outcome
    }
}

/// CORS checker returning canned outcomes; targets without one are "not vulnerable".
#[derive(Default)]
pub struct ScriptedCors {
    outcomes: HashMap<String, CorsOutcome>,
    checked: Mutex<Vec<String>>,
}

impl ScriptedCors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn outcome(mut self, target: &str, outcome: CorsOutcome) -> Self {
        self.outcomes.insert(target.to_string(), outcome);
        self
    }

    pub fn checked(&self) -> Vec<String> {
        self.checked.lock().unwrap().clone()
    }
}

#[async_trait]
impl CorsCheck for ScriptedCors {
    async fn check(&self, target: &str) -> CorsOutcome {
        self.checked.lock().unwrap().push(target.to_string());
        self.outcomes.get(target).cloned().unwrap_or_else(|| CorsOutcome {
            vulnerable: false,
            detail: "ACAO header missing or empty".to_string(),
            error: None,
        })
    }
}

#[derive(Default)]
pub struct MemorySinks {
    lines: Mutex<Vec<(SinkId, String)>>,
}

impl MemorySinks {
    pub fn lines(&self, sink: SinkId) -> Vec<String> {
        let mut lines: Vec<String> = self
            .lines
            .lock()
            .unwrap()
            .iter()
            .filter(|(id, _)| *id == sink)
            .map(|(_, line)| line.clone())
            .collect();
        lines.sort();
        lines
    }
}

impl OutputSink for MemorySinks {
    fn append(&self, sink: SinkId, line: &str) -> io::Result<()> {
        self.lines.lock().unwrap().push((sink, line.to_string()));
        Ok(())
    }
}

/// Reporter that remembers what it was told.
#[derive(Default)]
pub struct RecordingReporter {
    results: Mutex<Vec<ScanResult>>,
    summaries: Mutex<Vec<PhaseSummary>>,
}

impl RecordingReporter {
    pub fn results(&self) -> Vec<ScanResult> {
        self.results.lock().unwrap().clone()
    }

    pub fn summaries(&self) -> Vec<PhaseSummary> {
        self.summaries.lock().unwrap().clone()
    }
}

impl Reporter for RecordingReporter {
    fn report_result(&self, result: &ScanResult, _description: &str) {
        self.results.lock().unwrap().push(result.clone());
    }

    fn report_phase_summary(&self, summary: &PhaseSummary) {
        self.summaries.lock().unwrap().push(summary.clone());
    }
}

pub struct Harness {
    pub scanner: Scanner,
    pub prober: Arc<ScriptedProber>,
    pub cors: Arc<ScriptedCors>,
    pub sinks: Arc<MemorySinks>,
    pub reporter: Arc<RecordingReporter>,
}

pub fn harness(workers: usize, cors_check: bool, prober: ScriptedProber, cors: ScriptedCors) -> Harness {
    let config = ScanConfig::new(workers, Duration::from_secs(1), cors_check, true).unwrap();
    let prober = Arc::new(prober);
    let cors = Arc::new(cors);
    let sinks = Arc::new(MemorySinks::default());
    let reporter = Arc::new(RecordingReporter::default());
    let scanner = Scanner::new(
        config,
        prober.clone(),
        cors.clone(),
        sinks.clone(),
        reporter.clone(),
    );
    Harness {
        scanner,
        prober,
        cors,
        sinks,
        reporter,
    }
}

pub fn targets(list: &[&str]) -> Vec<String> {
    list.iter().map(|t| t.to_string()).collect()
}
