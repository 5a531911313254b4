use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, ORIGIN};
use reqwest::{redirect, Client, Method};
use tracing::debug;

use crate::prober::{network_failure, request_url};
use crate::types::CorsOutcome;

/// Origin sent with the preflight. Not expected on any real allow-list.
pub const SENTINEL_ORIGIN: &str = "https://evil-cors-test.com";
pub const CORS_USER_AGENT: &str = "HyperScanner/1.4+CORSCheck";

const ACAO: &str = "access-control-allow-origin";
const ACAC: &str = "access-control-allow-credentials";

/// Secondary check run only on targets that answered the primary probe.
#[async_trait]
pub trait CorsCheck: Send + Sync {
    async fn check(&self, target: &str) -> CorsOutcome;
}

/// OPTIONS-based CORS misconfiguration check.
///
/// Uses its own client, separate from the primary prober: no connection reuse,
/// HTTP/1.1 only, redirects returned as-is.
#[derive(Clone, Debug)]
pub struct HttpCorsChecker {
    client: Client,
}

impl HttpCorsChecker {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .use_rustls_tls()
            .user_agent(CORS_USER_AGENT)
            .redirect(redirect::Policy::none())
            .timeout(timeout)
            .connect_timeout(timeout.min(Duration::from_secs(10)))
            .pool_max_idle_per_host(0)
            .http1_only()
            .build()
            .context("failed to build CORS check client")?;
        Ok(Self { client })
    }
}

#[async_trait]
impl CorsCheck for HttpCorsChecker {
    async fn check(&self, target: &str) -> CorsOutcome {
        check_cors(&self.client, target).await
    }
}

/// Send the preflight to `target` and classify the answer.
///
/// URL or transport failures end up in [`CorsOutcome::error`], never as "not vulnerable".
pub async fn check_cors(client: &Client, target: &str) -> CorsOutcome {
    let url = match request_url(target) {
        Ok(url) => url,
        Err(e) => return CorsOutcome::failed(e),
    };

    let response = client
        .request(Method::OPTIONS, url)
        .header(ORIGIN, SENTINEL_ORIGIN)
        .header("Access-Control-Request-Method", "GET")
        .header("Access-Control-Request-Headers", "X-Requested-With")
        .send()
        .await;

    match response {
        Ok(resp) => {
            let outcome = classify_headers(resp.headers());
            debug!(scan_target = target, vulnerable = outcome.vulnerable, detail = %outcome.detail, "CORS check finished");
            outcome
        }
        Err(e) => CorsOutcome::failed(network_failure(&e)),
    }
}

fn classify_headers(headers: &HeaderMap) -> CorsOutcome {
    let value = |name: &str| {
        headers
            .get(name)
            .map(|v| String::from_utf8_lossy(v.as_bytes()).trim().to_string())
    };
    classify_cors(value(ACAO).as_deref(), value(ACAC).as_deref())
}

/// Classify the ACAO / ACAC pair of a preflight response.
///
/// Checked in order: reflected sentinel origin, wildcard, `null`, anything else.
pub fn classify_cors(acao: Option<&str>, acac: Option<&str>) -> CorsOutcome {
    let acao = acao.unwrap_or("");
    let credentials = acac == Some("true");

    let vulnerable = |mut detail: String, credentials_note: &str| {
        if credentials {
            detail.push_str(", ACAC='true' ");
            detail.push_str(credentials_note);
        }
        CorsOutcome {
            vulnerable: true,
            detail,
            error: None,
        }
    };

    if acao == SENTINEL_ORIGIN {
        return vulnerable(format!("Reflects Origin: ACAO='{acao}'"), "(CRITICAL)");
    }
    if acao == "*" {
        return vulnerable(
            "Wildcard Origin: ACAO='*'".to_string(),
            "(Misconfiguration/Severe)",
        );
    }
    if acao == "null" {
        return vulnerable(
            "Null Origin: ACAO='null'".to_string(),
            "(Potentially Problematic)",
        );
    }

    let detail = if acao.is_empty() {
        "ACAO header missing or empty".to_string()
    } else {
        format!("ACAO header: '{acao}' (Not matching test origin, wildcard, or null)")
    };
    CorsOutcome {
        vulnerable: false,
        detail,
        error: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reflected_origin_with_credentials_is_critical() {
        let out = classify_cors(Some(SENTINEL_ORIGIN), Some("true"));
        assert!(out.vulnerable);
        assert!(out.detail.contains("Reflects Origin"));
        assert!(out.detail.contains("CRITICAL"));
        assert!(out.error.is_none());
    }

    #[test]
    fn reflected_origin_without_credentials() {
        let out = classify_cors(Some(SENTINEL_ORIGIN), None);
        assert!(out.vulnerable);
        assert!(!out.detail.contains("CRITICAL"));
    }

    #[test]
    fn wildcard_is_vulnerable_and_flags_credentials() {
        let plain = classify_cors(Some("*"), Some("false"));
        assert!(plain.vulnerable);
        assert_eq!(plain.detail, "Wildcard Origin: ACAO='*'");

        let creds = classify_cors(Some("*"), Some("true"));
        assert!(creds.detail.contains("Misconfiguration"));
    }

    #[test]
    fn null_origin_is_treated_as_vulnerable() {
        let out = classify_cors(Some("null"), None);
        assert!(out.vulnerable);
        assert_eq!(out.detail, "Null Origin: ACAO='null'");
    }

    #[test]
    fn other_values_are_not_vulnerable() {
        let missing = classify_cors(None, Some("true"));
        assert!(!missing.vulnerable);
        assert_eq!(missing.detail, "ACAO header missing or empty");

        let fixed = classify_cors(Some("https://app.example.com"), Some("true"));
        assert!(!fixed.vulnerable);
        assert!(fixed.detail.contains("https://app.example.com"));
    }

    #[test]
    fn credentials_value_must_be_exactly_true() {
        let out = classify_cors(Some(SENTINEL_ORIGIN), Some("TRUE"));
        assert!(!out.detail.contains("CRITICAL"));
    }
}
