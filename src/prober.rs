use std::error::Error as StdError;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{redirect, Client};
use tracing::debug;
use url::Url;

use crate::types::{FailureReason, NetworkErrorKind};

/// User agent sent with every primary probe.
pub const PROBE_USER_AGENT: &str = "HyperScanner/1.4";

/// Something that can fetch the status code of one target.
///
/// The production implementation is [`HttpProber`]; tests substitute scripted probers.
#[async_trait]
pub trait Probe: Send + Sync {
    async fn probe(&self, target: &str) -> Result<u16, FailureReason>;
}

/// Primary GET prober backed by one shared connection pool.
#[derive(Clone, Debug)]
pub struct HttpProber {
    client: Client,
}

impl HttpProber {
    pub fn new(timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: build_probe_client(timeout)?,
        })
    }

}

#[async_trait]
impl Probe for HttpProber {
    async fn probe(&self, target: &str) -> Result<u16, FailureReason> {
        probe_target(&self.client, target).await
    }
}

/// Build the client shared by all workers: redirects are returned as-is so
/// 3xx codes stay visible, and every request is bounded by `timeout`.
pub fn build_probe_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .use_rustls_tls()
        .user_agent(PROBE_USER_AGENT)
        .redirect(redirect::Policy::none())
        .timeout(timeout)
        .pool_max_idle_per_host(10)
        .pool_idle_timeout(Duration::from_secs(90))
        .build()
        .context("failed to build HTTP client")
}

/// Send one GET to `target` and return the response status code.
///
/// Malformed targets fail with [`FailureReason::InvalidTarget`] before any
/// network activity.
pub async fn probe_target(client: &Client, target: &str) -> Result<u16, FailureReason> {
    let url = request_url(target)?;
    debug!(scan_target = target, url = %url, "probing target");

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| network_failure(&e))?;
    let status = response.status().as_u16();
    // Body is never read; dropping the response releases the connection.
    drop(response);

    debug!(scan_target = target, status, "probe finished");
    Ok(status)
}

/// Prefix `http://` when `target` has no scheme.
///
/// A scheme-less host whose authority does not look like `host:port` with a
/// numeric (or empty) port, e.g. `::1` or `fe80::1`, is treated as an IPv6
/// literal and bracketed. Userinfo before `@` is left alone. Values that
/// already carry a scheme are returned unchanged, so the function is idempotent.
pub fn normalize_target(target: &str) -> String {
    if target.contains("://") {
        return target.to_string();
    }
    let end = target.find(&['/', '?', '#'][..]).unwrap_or(target.len());
    let (authority, rest) = target.split_at(end);
    let (userinfo, host) = match authority.rsplit_once('@') {
        Some((user, host)) => (&authority[..=user.len()], host),
        None => ("", authority),
    };
    if is_bare_ipv6(host) {
        format!("http://{userinfo}[{host}]{rest}")
    } else {
        format!("http://{target}")
    }
}

fn is_bare_ipv6(host: &str) -> bool {
    if host.starts_with('[') {
        return false;
    }
    match host.rsplit_once(':') {
        None => false,
        Some((name, port)) => {
            let port_like = port.bytes().all(|b| b.is_ascii_digit());
            !(port_like && !name.contains(':'))
        }
    }
}

/// Normalize `target` and validate it as an absolute http(s) request URI.
pub fn request_url(target: &str) -> Result<Url, FailureReason> {
    let normalized = normalize_target(target);
    let url = Url::parse(&normalized).map_err(|e| FailureReason::invalid_target(target, e))?;
    match url.scheme() {
        "http" | "https" => {}
        other => {
            return Err(FailureReason::invalid_target(
                target,
                format!("unsupported scheme '{other}'"),
            ))
        }
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(FailureReason::invalid_target(target, "missing host"));
    }
    Ok(url)
}

/// Map a transport error onto the failure taxonomy, keeping the full cause chain.
pub(crate) fn network_failure(err: &reqwest::Error) -> FailureReason {
    let kind = if err.is_timeout() {
        NetworkErrorKind::Timeout
    } else if err.is_connect() {
        NetworkErrorKind::Connect
    } else if err.is_request() {
        NetworkErrorKind::Request
    } else {
        NetworkErrorKind::Other
    };
    FailureReason::network(kind, error_chain(err))
}

fn error_chain(err: &dyn StdError) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !out.contains(&text) {
            out.push_str(": ");
            out.push_str(&text);
        }
        source = cause.source();
    }
    out
}
