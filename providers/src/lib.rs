//! Compliance platform upload clients.
//!
//! # Architecture
//!
//! The crate is organized around a provider dispatch pattern:
//!
//! - [`ComplianceProvider`] - Closed registry of supported platforms,
//!   selected by a stable string key and dispatched by match
//! - [`veridesk`] - Veridesk Records API client
//! - [`complyline`] - Complyline Attestations API client
//!
//! Every provider call is exactly one upload attempt; retry lives with the
//! orchestrator, never inside a provider. Attempt results are normalized to
//! [`UploadOutcome`]:
//!
//! | Outcome | Description |
//! |---------|-------------|
//! | `Accepted` | The platform stored the document; may carry a reference id |
//! | `Rejected` | The attempt failed, with a retryability classification |
//!
//! # Error Classification
//!
//! Providers must classify failures so the orchestrator can stop early on
//! hopeless ones: authentication failures are non-retryable; rate limiting,
//! server errors, network failures, and response-parsing failures are
//! retryable; platform-specific application errors are classified per code
//! and default to retryable when unrecognized.

pub mod complyline;
pub mod retry;
pub mod veridesk;

use std::future::Future;
use std::sync::OnceLock;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use attest_types::{EmployeeId, EvidenceId, PassOutcome, SessionId};

/// Canonical Veridesk Records API endpoint.
pub const VERIDESK_API_URL: &str = "https://api.veridesk.io/v2";
/// Canonical Complyline Attestations API endpoint.
pub const COMPLYLINE_API_URL: &str = "https://platform.complyline.com/api/v1";

const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Upper bound on one attempt's duration; the transport timeout is the only
/// bound a single attempt has.
const UPLOAD_TIMEOUT_SECS: u64 = 120;

const MAX_ERROR_BODY_BYTES: usize = 32 * 1024;

pub fn http_client() -> &'static reqwest::Client {
    static CLIENT: OnceLock<reqwest::Client> = OnceLock::new();
    CLIENT.get_or_init(|| {
        reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .timeout(Duration::from_secs(UPLOAD_TIMEOUT_SECS))
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .unwrap_or_else(|e| {
                tracing::error!("Failed to build upload HTTP client: {e}. Using default client.");
                reqwest::Client::new()
            })
    })
}

pub(crate) async fn read_capped_error_body(response: reqwest::Response) -> String {
    match response.bytes().await {
        Ok(body) => {
            if body.len() > MAX_ERROR_BODY_BYTES {
                let text = String::from_utf8_lossy(&body[..MAX_ERROR_BODY_BYTES]);
                format!("{text}...(truncated)")
            } else {
                String::from_utf8_lossy(&body).into_owned()
            }
        }
        Err(e) => format!("(unreadable error body: {e})"),
    }
}

// ============================================================================
// Attempt outcome
// ============================================================================

/// A failed attempt with its retryability classification.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{code}: {message}")]
pub struct UploadError {
    pub code: String,
    pub message: String,
    pub retryable: bool,
}

impl UploadError {
    /// Authentication failure: retrying with the same credential cannot help.
    #[must_use]
    pub fn auth(message: impl Into<String>) -> Self {
        Self {
            code: "auth-failed".to_owned(),
            message: message.into(),
            retryable: false,
        }
    }

    #[must_use]
    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self {
            code: "rate-limited".to_owned(),
            message: message.into(),
            retryable: true,
        }
    }

    #[must_use]
    pub fn server(message: impl Into<String>) -> Self {
        Self {
            code: "server-error".to_owned(),
            message: message.into(),
            retryable: true,
        }
    }

    #[must_use]
    pub fn network(message: impl Into<String>) -> Self {
        Self {
            code: "network".to_owned(),
            message: message.into(),
            retryable: true,
        }
    }

    /// Response-parse failure. Classified retryable: a garbled body is more
    /// likely a transient proxy problem than a stable contract change.
    #[must_use]
    pub fn parse(message: impl Into<String>) -> Self {
        Self {
            code: "response-parse".to_owned(),
            message: message.into(),
            retryable: true,
        }
    }

    /// Platform-specific application error with an explicit classification.
    #[must_use]
    pub fn application(code: impl Into<String>, message: impl Into<String>, retryable: bool) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            retryable,
        }
    }
}

/// Result of exactly one upload attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    /// The platform stored the document.
    Accepted {
        /// Platform-assigned reference, when the platform issues one.
        provider_reference: Option<String>,
        message: String,
    },
    /// The attempt failed; the error carries the retryability flag.
    Rejected(UploadError),
}

impl UploadOutcome {
    #[must_use]
    pub const fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted { .. })
    }
}

/// Classify an HTTP status that is not a success.
///
/// 401/403 are authentication failures; 429 is rate limiting; 5xx are
/// server errors; any other 4xx is a request-level application error the
/// caller may refine per platform.
pub(crate) fn classify_status(status: reqwest::StatusCode, body: &str) -> UploadError {
    let code = status.as_u16();
    match code {
        401 | 403 => UploadError::auth(format!("HTTP {code}: {body}")),
        429 => UploadError::rate_limited(format!("HTTP {code}: {body}")),
        500..=599 => UploadError::server(format!("HTTP {code}: {body}")),
        _ => UploadError::application(
            format!("http-{code}"),
            format!("HTTP {code}: {body}"),
            false,
        ),
    }
}

pub(crate) fn classify_transport_error(err: &reqwest::Error) -> UploadError {
    UploadError::network(format!("transport failure: {err}"))
}

// ============================================================================
// Upload inputs
// ============================================================================

/// What a platform needs to file the document, alongside the bytes.
#[derive(Debug, Clone, Serialize)]
pub struct EvidenceMetadata {
    pub evidence_id: EvidenceId,
    pub session_id: SessionId,
    pub employee_id: EmployeeId,
    pub tenant_display_name: String,
    /// 64-hex digest of the evidence body; platforms store it for their own
    /// integrity checks.
    pub content_hash: String,
    pub generated_at: DateTime<Utc>,
    pub outcome: PassOutcome,
    pub aggregate_score: Option<f64>,
}

/// Per-tenant provider settings, resolved from tenant configuration.
#[derive(Clone)]
pub struct ProviderConfig {
    credential: String,
    target: String,
    /// API base override; `None` uses the platform's canonical endpoint.
    /// Tests point this at a local mock server.
    base_url: Option<String>,
}

impl ProviderConfig {
    #[must_use]
    pub fn new(credential: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            credential: credential.into(),
            target: target.into(),
            base_url: None,
        }
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    #[must_use]
    pub fn credential(&self) -> &str {
        &self.credential
    }

    #[must_use]
    pub fn target(&self) -> &str {
        &self.target
    }

    #[must_use]
    pub fn base_url_or(&self, default: &'static str) -> String {
        self.base_url
            .clone()
            .unwrap_or_else(|| default.to_owned())
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("credential", &"***")
            .field("target", &self.target)
            .field("base_url", &self.base_url)
            .finish()
    }
}

// ============================================================================
// Provider registry
// ============================================================================

/// The closed set of supported compliance platforms.
///
/// Registered here at compile time and selected by a stable key from tenant
/// configuration; an unknown key is a configuration error surfaced by the
/// orchestrator, not a fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComplianceProvider {
    Veridesk,
    Complyline,
}

impl ComplianceProvider {
    /// Resolve a configured provider key.
    #[must_use]
    pub fn from_key(raw: &str) -> Option<Self> {
        match raw {
            "veridesk" => Some(Self::Veridesk),
            "complyline" => Some(Self::Complyline),
            _ => None,
        }
    }

    /// Stable name used in ledger records and configuration.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Veridesk => "veridesk",
            Self::Complyline => "complyline",
        }
    }

    /// Perform exactly one upload attempt against the platform.
    pub async fn upload_evidence(
        self,
        document: &[u8],
        metadata: &EvidenceMetadata,
        config: &ProviderConfig,
    ) -> UploadOutcome {
        match self {
            Self::Veridesk => veridesk::upload(document, metadata, config).await,
            Self::Complyline => complyline::upload(document, metadata, config).await,
        }
    }
}

/// Transport seam between the orchestrator and the platform clients.
///
/// The production transport performs the HTTP call through the provider
/// registry; tests substitute a scripted transport to drive the retry loop
/// deterministically.
pub trait UploadTransport: Send + Sync {
    fn attempt(
        &self,
        provider: ComplianceProvider,
        document: &[u8],
        metadata: &EvidenceMetadata,
        config: &ProviderConfig,
    ) -> impl Future<Output = UploadOutcome> + Send;
}

/// The real HTTP transport.
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpUploadTransport;

impl UploadTransport for HttpUploadTransport {
    async fn attempt(
        &self,
        provider: ComplianceProvider,
        document: &[u8],
        metadata: &EvidenceMetadata,
        config: &ProviderConfig,
    ) -> UploadOutcome {
        provider.upload_evidence(document, metadata, config).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_keys_round_trip() {
        for provider in [ComplianceProvider::Veridesk, ComplianceProvider::Complyline] {
            assert_eq!(ComplianceProvider::from_key(provider.name()), Some(provider));
        }
    }

    #[test]
    fn unknown_provider_key_is_none() {
        assert_eq!(ComplianceProvider::from_key("sharefile"), None);
        assert_eq!(ComplianceProvider::from_key(""), None);
        assert_eq!(ComplianceProvider::from_key("Veridesk"), None);
    }

    #[test]
    fn error_constructors_classify_retryability() {
        assert!(!UploadError::auth("bad key").retryable);
        assert!(UploadError::rate_limited("slow down").retryable);
        assert!(UploadError::server("boom").retryable);
        assert!(UploadError::network("refused").retryable);
        assert!(UploadError::parse("not json").retryable);
        assert!(!UploadError::application("locked", "folder locked", false).retryable);
        assert!(UploadError::application("busy", "try later", true).retryable);
    }

    #[test]
    fn status_classification() {
        use reqwest::StatusCode;
        assert!(!classify_status(StatusCode::UNAUTHORIZED, "").retryable);
        assert!(!classify_status(StatusCode::FORBIDDEN, "").retryable);
        assert!(classify_status(StatusCode::TOO_MANY_REQUESTS, "").retryable);
        assert!(classify_status(StatusCode::INTERNAL_SERVER_ERROR, "").retryable);
        assert!(classify_status(StatusCode::BAD_GATEWAY, "").retryable);
        assert!(!classify_status(StatusCode::UNPROCESSABLE_ENTITY, "").retryable);
        assert_eq!(classify_status(StatusCode::UNAUTHORIZED, "").code, "auth-failed");
        assert_eq!(
            classify_status(StatusCode::UNPROCESSABLE_ENTITY, "").code,
            "http-422"
        );
    }

    #[test]
    fn provider_config_debug_redacts_credential() {
        let config = ProviderConfig::new("secret-key", "workspace-1");
        let debug = format!("{config:?}");
        assert!(!debug.contains("secret-key"));
        assert!(debug.contains("workspace-1"));
    }
}
