use anyhow::Result;
use tracing_subscriber::{self, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Environment variable consulted after `RUST_LOG`.
pub const LOG_ENV: &str = "HX_SCAN_RS_LOGLEVEL";

/// Filter used when neither `RUST_LOG` nor [`LOG_ENV`] is set.
pub fn default_filter(verbose: bool) -> String {
    let level = if verbose { "debug" } else { "warn" };
    format!("{}={level}", env!("CARGO_CRATE_NAME"))
}

/// Initializes stderr logging using the tracing subscriber.
///
/// Scan results go to stdout and the output directory; this is only for
/// diagnostics, so it stays at `warn` unless asked otherwise.
pub fn initialize_logging(verbose: bool) -> Result<()> {
    let filter = std::env::var("RUST_LOG")
        .or_else(|_| std::env::var(LOG_ENV))
        .unwrap_or_else(|_| default_filter(verbose));

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_ansi(false)
        .with_filter(EnvFilter::new(filter));

    tracing_subscriber::registry().with(stderr_layer).try_init()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_filter_targets_this_crate() {
        assert_eq!(default_filter(false), "hx_scan_rs=warn");
        assert_eq!(default_filter(true), "hx_scan_rs=debug");
    }
}
