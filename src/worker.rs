use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tracing::{debug, warn};

use crate::cors::CorsCheck;
use crate::prober::Probe;
use crate::types::{ScanPhase, ScanResult};

/// Job queue shared by all workers of a phase; each target is taken by exactly one worker.
pub type JobQueue = Arc<Mutex<mpsc::Receiver<String>>>;

/// Pull targets from `jobs` until it is closed and empty, probing each one and
/// sending exactly one [`ScanResult`] per non-empty target to `results`.
///
/// When `cors` is set, targets that answered the primary probe also get a CORS
/// check; its outcome is attached before the result is sent and never changes
/// the primary status or error. Returns the number of targets handled.
pub async fn run_worker(
    id: usize,
    jobs: JobQueue,
    results: mpsc::Sender<ScanResult>,
    phase: ScanPhase,
    prober: Arc<dyn Probe>,
    cors: Option<Arc<dyn CorsCheck>>,
) -> usize {
    let mut handled = 0usize;
    loop {
        // Only hold the queue lock while waiting for the next job.
        let next = { jobs.lock().await.recv().await };
        let Some(target) = next else {
            break;
        };
        if target.is_empty() {
            continue;
        }

        let outcome = prober.probe(&target).await;
        let mut result = ScanResult::from_probe(target, outcome, phase);
        if result.is_success() {
            if let Some(checker) = cors.as_ref() {
                result.cors = Some(checker.check(&result.target).await);
            }
        }

        handled += 1;
        if results.send(result).await.is_err() {
            warn!(worker = id, "result queue closed early, stopping worker");
            break;
        }
    }
    debug!(worker = id, handled, %phase, "worker finished");
    handled
}
