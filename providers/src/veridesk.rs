//! Veridesk Records API client.
//!
//! Files evidence documents as records in a Veridesk workspace via
//! `POST {base}/records` with bearer authentication. One call is one
//! attempt; the platform assigns a `record_id` on acceptance.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::Deserialize;
use serde_json::json;

use attest_types::PassOutcome;

use crate::{
    classify_status, classify_transport_error, http_client, read_capped_error_body,
    EvidenceMetadata, ProviderConfig, UploadError, UploadOutcome, VERIDESK_API_URL,
};

fn records_url(base: &str) -> String {
    format!("{}/records", base.trim_end_matches('/'))
}

const fn result_key(outcome: PassOutcome) -> &'static str {
    match outcome {
        PassOutcome::Passed => "passed",
        PassOutcome::Failed => "failed",
        PassOutcome::Unknown => "unknown",
    }
}

fn build_request_body(
    document: &[u8],
    metadata: &EvidenceMetadata,
    config: &ProviderConfig,
) -> serde_json::Value {
    json!({
        "workspace": config.target(),
        "external_id": metadata.evidence_id.to_string(),
        "session_ref": metadata.session_id.to_string(),
        "employee_ref": metadata.employee_id.as_str(),
        "source": metadata.tenant_display_name,
        "sha256": metadata.content_hash,
        "completed_at": metadata.generated_at.to_rfc3339(),
        "result": result_key(metadata.outcome),
        "score": metadata.aggregate_score,
        "document": {
            "content_type": "application/pdf",
            "data": BASE64.encode(document),
        },
    })
}

#[derive(Debug, Deserialize)]
struct RecordResponse {
    record_id: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    code: String,
    message: String,
}

/// Veridesk application-error table. Unrecognized codes default to
/// retryable.
fn classify_application_error(code: &str, message: &str) -> UploadError {
    let retryable = match code {
        // The workspace is gone or the record shape is wrong; resending the
        // same payload cannot succeed.
        "workspace_archived" | "workspace_not_found" | "record_schema_invalid" => false,
        // Transient platform-side conditions.
        "ingest_busy" | "maintenance_window" => true,
        _ => true,
    };
    UploadError::application(code, message, retryable)
}

pub(crate) async fn upload(
    document: &[u8],
    metadata: &EvidenceMetadata,
    config: &ProviderConfig,
) -> UploadOutcome {
    let url = records_url(&config.base_url_or(VERIDESK_API_URL));
    let body = build_request_body(document, metadata, config);

    let response = http_client()
        .post(&url)
        .bearer_auth(config.credential())
        .json(&body)
        .send()
        .await;

    let response = match response {
        Ok(response) => response,
        Err(e) => return UploadOutcome::Rejected(classify_transport_error(&e)),
    };

    let status = response.status();
    if status.is_success() {
        return match response.json::<RecordResponse>().await {
            Ok(record) => UploadOutcome::Accepted {
                provider_reference: record.record_id,
                message: record.message.unwrap_or_else(|| "record stored".to_owned()),
            },
            Err(e) => UploadOutcome::Rejected(UploadError::parse(format!(
                "unreadable record response: {e}"
            ))),
        };
    }

    let error_text = read_capped_error_body(response).await;
    let error = match status.as_u16() {
        // The status class alone settles these, whatever the body says.
        401 | 403 | 429 | 500..=599 => classify_status(status, &error_text),
        _ => serde_json::from_str::<ErrorEnvelope>(&error_text)
            .map(|envelope| classify_application_error(&envelope.error.code, &envelope.error.message))
            .unwrap_or_else(|_| classify_status(status, &error_text)),
    };
    tracing::debug!(code = %error.code, retryable = error.retryable, "Veridesk upload attempt rejected");
    UploadOutcome::Rejected(error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use attest_types::{EmployeeId, EvidenceId, SessionId};

    fn metadata() -> EvidenceMetadata {
        EvidenceMetadata {
            evidence_id: EvidenceId::generate(),
            session_id: SessionId::generate(),
            employee_id: EmployeeId::new("emp-9"),
            tenant_display_name: "Acme Logistics".to_owned(),
            content_hash: "ab".repeat(32),
            generated_at: Utc::now(),
            outcome: PassOutcome::Passed,
            aggregate_score: Some(0.91),
        }
    }

    fn config(server: &MockServer) -> ProviderConfig {
        ProviderConfig::new("vd_live_key", "acme-workspace").with_base_url(server.uri())
    }

    #[tokio::test]
    async fn accepted_upload_returns_record_id() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/records"))
            .and(header("authorization", "Bearer vd_live_key"))
            .and(body_partial_json(serde_json::json!({
                "workspace": "acme-workspace",
                "result": "passed",
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "record_id": "vd-88421",
                "message": "filed",
            })))
            .expect(1)
            .mount(&server)
            .await;

        let outcome = upload(b"%PDF-1.7", &metadata(), &config(&server)).await;
        match outcome {
            UploadOutcome::Accepted {
                provider_reference,
                message,
            } => {
                assert_eq!(provider_reference.as_deref(), Some("vd-88421"));
                assert_eq!(message, "filed");
            }
            other => panic!("expected Accepted, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unauthorized_is_non_retryable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/records"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad token"))
            .expect(1)
            .mount(&server)
            .await;

        let outcome = upload(b"%PDF-1.7", &metadata(), &config(&server)).await;
        match outcome {
            UploadOutcome::Rejected(error) => {
                assert!(!error.retryable);
                assert_eq!(error.code, "auth-failed");
            }
            other => panic!("expected Rejected, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn rate_limit_and_server_errors_are_retryable() {
        for status in [429_u16, 500, 503] {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .and(path("/records"))
                .respond_with(ResponseTemplate::new(status))
                .expect(1)
                .mount(&server)
                .await;

            let outcome = upload(b"%PDF-1.7", &metadata(), &config(&server)).await;
            match outcome {
                UploadOutcome::Rejected(error) => {
                    assert!(error.retryable, "HTTP {status} should be retryable");
                }
                other => panic!("expected Rejected, got {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn application_errors_use_the_platform_table() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/records"))
            .respond_with(ResponseTemplate::new(422).set_body_json(serde_json::json!({
                "error": { "code": "workspace_archived", "message": "workspace was archived" }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let outcome = upload(b"%PDF-1.7", &metadata(), &config(&server)).await;
        match outcome {
            UploadOutcome::Rejected(error) => {
                assert!(!error.retryable);
                assert_eq!(error.code, "workspace_archived");
            }
            other => panic!("expected Rejected, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unrecognized_application_error_defaults_to_retryable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/records"))
            .respond_with(ResponseTemplate::new(409).set_body_json(serde_json::json!({
                "error": { "code": "revision_in_flight", "message": "try again" }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let outcome = upload(b"%PDF-1.7", &metadata(), &config(&server)).await;
        match outcome {
            UploadOutcome::Rejected(error) => {
                assert!(error.retryable);
                assert_eq!(error.code, "revision_in_flight");
            }
            other => panic!("expected Rejected, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn malformed_success_body_is_a_retryable_parse_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/records"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>gateway</html>"))
            .expect(1)
            .mount(&server)
            .await;

        let outcome = upload(b"%PDF-1.7", &metadata(), &config(&server)).await;
        match outcome {
            UploadOutcome::Rejected(error) => {
                assert!(error.retryable);
                assert_eq!(error.code, "response-parse");
            }
            other => panic!("expected Rejected, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn connection_failure_is_a_retryable_network_error() {
        // Point at a server that is not listening.
        let config = ProviderConfig::new("vd_live_key", "acme-workspace")
            .with_base_url("http://127.0.0.1:9");

        let outcome = upload(b"%PDF-1.7", &metadata(), &config).await;
        match outcome {
            UploadOutcome::Rejected(error) => {
                assert!(error.retryable);
                assert_eq!(error.code, "network");
            }
            other => panic!("expected Rejected, got {other:?}"),
        }
    }
}
