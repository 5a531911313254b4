use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use colored::{ColoredString, Colorize};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

use crate::status::{self, StatusClass};
use crate::types::{CorsOutcome, PhaseSummary, ScanPhase, ScanResult, ScanSummary};

/// Presentation callbacks. Purely informational: nothing a reporter does can
/// affect the scan's accounting.
pub trait Reporter: Send + Sync {
    fn phase_started(&self, _phase: ScanPhase, _targets: usize) {}

    /// Called once for every processed result. `description` is empty for failures.
    fn report_result(&self, result: &ScanResult, description: &str);

    fn report_cors(&self, _target: &str, _outcome: &CorsOutcome) {}

    fn report_phase_summary(&self, summary: &PhaseSummary);
}

/// Reporter that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullReporter;

impl Reporter for NullReporter {
    fn report_result(&self, _result: &ScanResult, _description: &str) {}

    fn report_phase_summary(&self, _summary: &PhaseSummary) {}
}

/// Terminal reporter: one colored line per result and a progress bar per phase.
///
/// Quiet mode hides per-result lines but still shows CORS findings and errors.
pub struct ConsoleReporter {
    quiet: bool,
    bar: Mutex<Option<ProgressBar>>,
}

impl ConsoleReporter {
    pub fn new(quiet: bool) -> Self {
        Self {
            quiet,
            bar: Mutex::new(None),
        }
    }

    fn with_bar<R>(&self, f: impl FnOnce(Option<&ProgressBar>) -> R) -> R {
        let guard = self.bar.lock().unwrap_or_else(|e| e.into_inner());
        f(guard.as_ref())
    }

    fn print_line(&self, line: String) {
        self.with_bar(|bar| match bar {
            Some(bar) => bar.println(line),
            None => println!("{line}"),
        });
    }
}

impl Reporter for ConsoleReporter {
    fn phase_started(&self, phase: ScanPhase, targets: usize) {
        if targets == 0 {
            return;
        }
        println!(
            "\n{}",
            format!("[*] Starting {phase} for {targets} targets...").blue()
        );
        let bar = ProgressBar::with_draw_target(Some(targets as u64), ProgressDrawTarget::stderr());
        let style = ProgressStyle::with_template(
            "{msg} [{wide_bar:.green}] {pos}/{len} ({eta})",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ");
        bar.set_style(style);
        bar.set_message(format!("[*] {phase}"));
        bar.enable_steady_tick(Duration::from_millis(200));
        *self.bar.lock().unwrap_or_else(|e| e.into_inner()) = Some(bar);
    }

    fn report_result(&self, result: &ScanResult, description: &str) {
        self.with_bar(|bar| {
            if let Some(bar) = bar {
                bar.inc(1);
            }
        });
        if self.quiet {
            return;
        }
        if let Some(line) = format_result_line(result, description) {
            self.print_line(line);
        }
    }

    fn report_cors(&self, target: &str, outcome: &CorsOutcome) {
        if let Some(err) = &outcome.error {
            self.print_line(format!(
                "{} {target} -> {}",
                "[CORS ERR]".magenta(),
                err.to_string().red()
            ));
        } else if outcome.vulnerable {
            self.print_line(format!(
                "{} {target} -> {}",
                "[CORS VULN]".bright_red().bold(),
                outcome.detail.yellow()
            ));
        }
    }

    fn report_phase_summary(&self, summary: &PhaseSummary) {
        if let Some(bar) = self.bar.lock().unwrap_or_else(|e| e.into_inner()).take() {
            bar.finish();
        }
        if summary.phase_targets == 0 {
            return;
        }
        println!("{}", format!("[*] {} phase complete.", summary.phase).blue());
        print_counts(
            summary.phase.label(),
            summary.elapsed_ms,
            summary.total_targets,
            summary.success_count,
            summary.failure_count,
            &summary.histogram,
        );
    }
}

/// Render one result line, or `None` for results that produce no line.
pub fn format_result_line(result: &ScanResult, description: &str) -> Option<String> {
    let prefix = if result.is_rescan() { "[RESCAN] " } else { "" };

    if let Some(err) = &result.error {
        return Some(format!(
            "{prefix}{} {} -> {}",
            "[x]".red(),
            result.target,
            format!("ERROR: {err}").red()
        ));
    }

    let code = result.status_code;
    let Some(class) = StatusClass::of(code) else {
        if code == 0 {
            return None;
        }
        return Some(format!("{prefix}[?] {} -> {code} {description}", result.target));
    };

    let mark = if result.is_rescan() { "✓✓" } else { "✓" };
    Some(format!(
        "{prefix}{} {} -> {} {} {description}",
        mark.green(),
        result.target,
        paint_code(code, class),
        class_emoji(class)
    ))
}

fn paint_code(code: u16, class: StatusClass) -> ColoredString {
    let text = code.to_string();
    match class {
        StatusClass::Informational => text.blue(),
        StatusClass::Success => text.green(),
        StatusClass::Redirection => text.yellow(),
        StatusClass::ClientError => text.red(),
        StatusClass::ServerError => text.magenta(),
    }
}

fn class_emoji(class: StatusClass) -> &'static str {
    match class {
        StatusClass::Informational => "🔵",
        StatusClass::Success => "✅",
        StatusClass::Redirection => "🟡",
        StatusClass::ClientError => "❌",
        StatusClass::ServerError => "💥",
    }
}

fn print_counts(
    title: &str,
    elapsed_ms: u64,
    total: u64,
    success: i64,
    failure: i64,
    histogram: &BTreeMap<u16, i64>,
) {
    println!(
        "\n--- {title} Summary ({:.3}s) ---",
        Duration::from_millis(elapsed_ms).as_secs_f64()
    );
    println!("Total Targets: {total}");
    println!("{}", format!("Successful: {success}").green());
    println!("{}", format!("Failed: {failure}").red());
    print_status_breakdown(histogram);
}

/// Histogram breakdown, sorted by code.
pub fn print_status_breakdown(histogram: &BTreeMap<u16, i64>) {
    if histogram.is_empty() {
        return;
    }
    println!("\nStatus Code Breakdown:");
    for (&code, &count) in histogram {
        let Some(class) = StatusClass::of(code) else {
            println!("  {code} ?  {:<25} : {count}", status::UNKNOWN_DESCRIPTION);
            continue;
        };
        println!(
            "  {} {} {:<25} : {count}",
            paint_code(code, class),
            class_emoji(class),
            status::describe_or_unknown(code)
        );
    }
}

/// Final report printed once the last phase is done.
pub fn print_final_summary(summary: &ScanSummary, output_dir: &Path) {
    let title = if summary.rescanned {
        "Final"
    } else {
        "Final (No Re-scan)"
    };
    print_counts(
        title,
        summary.elapsed_ms,
        summary.total_targets,
        summary.success_count,
        summary.failure_count,
        &summary.histogram,
    );
    println!(
        "\n{} Output saved to: {}",
        "[*]".blue(),
        output_dir.display().to_string().cyan()
    );
    println!("{} Scan complete.", "[*]".blue());
}

pub fn print_banner() {
    println!(
        "{}",
        format!(
            "hx-scan-rs v{} (IP/Domain/URL HTTP scanner w/ re-scan)",
            env!("CARGO_PKG_VERSION")
        )
        .bright_magenta()
        .bold()
    );
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FailureReason, NetworkErrorKind};

    fn plain() {
        colored::control::set_override(false);
    }

    #[test]
    fn success_line_marks_rescans() {
        plain();
        let initial = ScanResult::from_probe("a.test".into(), Ok(200), ScanPhase::Initial);
        let line = format_result_line(&initial, "OK").unwrap();
        assert!(line.starts_with("✓ a.test -> 200"), "{line}");

        let rescan = ScanResult::from_probe("a.test".into(), Ok(503), ScanPhase::Rescan);
        let line = format_result_line(&rescan, "Service Unavailable").unwrap();
        assert!(line.starts_with("[RESCAN] ✓✓ a.test -> 503"), "{line}");
    }

    #[test]
    fn failure_line_carries_reason() {
        plain();
        let err = FailureReason::network(NetworkErrorKind::Timeout, "deadline elapsed");
        let failed = ScanResult::from_probe("b.test".into(), Err(err), ScanPhase::Initial);
        let line = format_result_line(&failed, "").unwrap();
        assert!(line.contains("[x] b.test -> ERROR: timeout: deadline elapsed"), "{line}");
    }

    #[test]
    fn empty_phase_starts_no_progress_bar() {
        let reporter = ConsoleReporter::new(true);
        reporter.phase_started(ScanPhase::Rescan, 0);
        assert!(reporter.bar.lock().unwrap().is_none());
    }

    #[test]
    fn out_of_range_codes_use_question_mark() {
        plain();
        let odd = ScanResult::from_probe("c.test".into(), Ok(999), ScanPhase::Initial);
        let line = format_result_line(&odd, status::UNKNOWN_DESCRIPTION).unwrap();
        assert!(line.starts_with("[?] c.test -> 999"), "{line}");
    }
}
