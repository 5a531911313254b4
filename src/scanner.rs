use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::aggregator::{drain_results, AggregateState};
use crate::config::ScanConfig;
use crate::cors::{CorsCheck, HttpCorsChecker};
use crate::prober::{HttpProber, Probe};
use crate::report::Reporter;
use crate::sink::OutputSink;
use crate::types::{PhaseSummary, ScanPhase, ScanResult, ScanSummary};
use crate::worker::{run_worker, JobQueue};

/// Decides whether the failures of the initial scan get a second pass.
#[async_trait]
pub trait RescanGate: Send + Sync {
    async fn confirm_rescan(&self, failed: i64) -> bool;
}

/// Asks the operator on stdin. Anything other than `y`/`yes` declines.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdinGate;

#[async_trait]
impl RescanGate for StdinGate {
    async fn confirm_rescan(&self, failed: i64) -> bool {
        let prompt = format!("\n[*] {failed} targets failed initially. Do you want to re-scan them? (y/N): ");
        let mut stdout = tokio::io::stdout();
        if stdout.write_all(prompt.as_bytes()).await.is_err() || stdout.flush().await.is_err() {
            return false;
        }

        let mut line = String::new();
        match BufReader::new(tokio::io::stdin()).read_line(&mut line).await {
            Ok(_) => is_affirmative(&line),
            Err(e) => {
                warn!(error = %e, "could not read re-scan answer, skipping re-scan");
                false
            }
        }
    }
}

/// Fixed answer, for `--yes` / `--no-rescan` and tests.
#[derive(Debug, Clone, Copy)]
pub struct AutoGate(pub bool);

#[async_trait]
impl RescanGate for AutoGate {
    async fn confirm_rescan(&self, _failed: i64) -> bool {
        self.0
    }
}

/// Only an explicit `y` or `yes` (any case, surrounding whitespace ignored) counts.
pub fn is_affirmative(answer: &str) -> bool {
    let answer = answer.trim();
    answer.eq_ignore_ascii_case("y") || answer.eq_ignore_ascii_case("yes")
}

/// Runs scan phases against one shared [`AggregateState`].
pub struct Scanner {
    config: ScanConfig,
    prober: Arc<dyn Probe>,
    cors: Arc<dyn CorsCheck>,
    sinks: Arc<dyn OutputSink>,
    reporter: Arc<dyn Reporter>,
    state: Arc<AggregateState>,
}

impl Scanner {
    /// `cors` is only consulted when `config.cors_check` is set.
    pub fn new(
        config: ScanConfig,
        prober: Arc<dyn Probe>,
        cors: Arc<dyn CorsCheck>,
        sinks: Arc<dyn OutputSink>,
        reporter: Arc<dyn Reporter>,
    ) -> Self {
        Self {
            config,
            prober,
            cors,
            sinks,
            reporter,
            state: Arc::new(AggregateState::new()),
        }
    }

    /// Scanner backed by the real HTTP prober and CORS checker.
    pub fn http(
        config: ScanConfig,
        sinks: Arc<dyn OutputSink>,
        reporter: Arc<dyn Reporter>,
    ) -> Result<Self> {
        let prober = HttpProber::new(config.timeout)?;
        let cors = HttpCorsChecker::new(config.timeout)?;
        Ok(Self::new(
            config,
            Arc::new(prober),
            Arc::new(cors),
            sinks,
            reporter,
        ))
    }

    pub fn state(&self) -> &Arc<AggregateState> {
        &self.state
    }

    /// One full pass over `targets`: submit jobs, wait for every worker, then
    /// wait for the aggregator to drain what they produced.
    ///
    /// Initial-phase failures are remembered for a re-scan; re-scan failures are not.
    pub async fn run_phase(&self, targets: &[String], phase: ScanPhase) -> Result<PhaseSummary> {
        let started = Instant::now();
        let workers = self.config.workers.max(1);
        self.reporter.phase_started(phase, targets.len());
        info!(%phase, targets = targets.len(), workers, "phase started");

        let (job_tx, job_rx) = mpsc::channel::<String>(workers);
        let (result_tx, result_rx) = mpsc::channel::<ScanResult>(workers * 2);

        let aggregator = tokio::spawn(drain_results(
            result_rx,
            !phase.is_rescan(),
            self.state.clone(),
            self.sinks.clone(),
            self.reporter.clone(),
        ));

        let jobs: JobQueue = Arc::new(Mutex::new(job_rx));
        let cors = self.config.cors_check.then(|| self.cors.clone());
        let mut set = JoinSet::new();
        for id in 0..workers {
            set.spawn(run_worker(
                id,
                jobs.clone(),
                result_tx.clone(),
                phase,
                self.prober.clone(),
                cors.clone(),
            ));
        }

        for target in targets {
            if job_tx.send(target.clone()).await.is_err() {
                warn!(%phase, "all workers stopped before every job was submitted");
                break;
            }
        }
        // No more jobs: workers exit once the queue is empty.
        drop(job_tx);

        let mut handled = 0usize;
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(n) => handled += n,
                Err(e) => warn!(error = %e, "worker task failed"),
            }
        }
        // Last sender gone: the aggregator finishes after the queued results.
        drop(result_tx);

        let consumed = aggregator
            .await
            .with_context(|| format!("{phase} aggregator task failed"))?;
        debug!(%phase, handled, consumed, "phase drained");

        let summary = PhaseSummary {
            phase,
            phase_targets: targets.len() as u64,
            total_targets: self.state.processed(),
            success_count: self.state.success_count(),
            failure_count: self.state.failure_count(),
            histogram: self.state.histogram().await,
            failed_targets: self.state.failed_targets_snapshot().await,
            elapsed_ms: started.elapsed().as_millis() as u64,
        };
        self.reporter.report_phase_summary(&summary);
        Ok(summary)
    }

    pub async fn run_initial(&self, targets: &[String]) -> Result<PhaseSummary> {
        self.run_phase(targets, ScanPhase::Initial).await
    }

    /// Re-scan a snapshot of the failed-target list. `None` when nothing failed.
    pub async fn rescan_failed(&self) -> Result<Option<PhaseSummary>> {
        let failed = self.state.failed_targets_snapshot().await;
        if failed.is_empty() {
            return Ok(None);
        }
        self.run_phase(&failed, ScanPhase::Rescan).await.map(Some)
    }

    /// Initial scan, then a re-scan of the failures if any remain and `gate` agrees.
    pub async fn run(&self, targets: &[String], gate: &dyn RescanGate) -> Result<ScanSummary> {
        let started = Instant::now();
        self.run_initial(targets).await?;

        let failed = self.state.failure_count();
        let mut rescanned = false;
        if failed > 0 {
            if gate.confirm_rescan(failed).await {
                rescanned = self.rescan_failed().await?.is_some();
            } else {
                info!(failed, "re-scan declined");
            }
        }

        Ok(ScanSummary {
            total_targets: self.state.processed(),
            success_count: self.state.success_count(),
            failure_count: self.state.failure_count(),
            histogram: self.state.histogram().await,
            rescanned,
            elapsed_ms: started.elapsed().as_millis() as u64,
        })
    }
}
