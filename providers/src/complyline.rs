//! Complyline Attestations API client.
//!
//! Files evidence as attestations in a Complyline folder via
//! `POST {base}/attestations` with API-key authentication. Complyline's
//! error envelope is flat (`code` + `detail`) and its result vocabulary is
//! compliance-flavored rather than pass/fail.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::Deserialize;
use serde_json::json;

use attest_types::PassOutcome;

use crate::{
    classify_status, classify_transport_error, http_client, read_capped_error_body,
    EvidenceMetadata, ProviderConfig, UploadError, UploadOutcome, COMPLYLINE_API_URL,
};

fn attestations_url(base: &str) -> String {
    format!("{}/attestations", base.trim_end_matches('/'))
}

const fn verdict_key(outcome: PassOutcome) -> &'static str {
    match outcome {
        PassOutcome::Passed => "compliant",
        PassOutcome::Failed => "non_compliant",
        PassOutcome::Unknown => "indeterminate",
    }
}

fn build_request_body(
    document: &[u8],
    metadata: &EvidenceMetadata,
    config: &ProviderConfig,
) -> serde_json::Value {
    json!({
        "folder": config.target(),
        "subject": metadata.employee_id.as_str(),
        "origin": metadata.tenant_display_name,
        "external_ref": metadata.evidence_id.to_string(),
        "evidence_sha256": metadata.content_hash,
        "filed_at": metadata.generated_at.to_rfc3339(),
        "verdict": verdict_key(metadata.outcome),
        "score": metadata.aggregate_score,
        "document_b64": BASE64.encode(document),
    })
}

#[derive(Debug, Deserialize)]
struct AttestationResponse {
    attestation_id: String,
    #[serde(default)]
    state: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FlatError {
    code: String,
    detail: String,
}

/// Complyline application-error table. Unrecognized codes default to
/// retryable.
fn classify_application_error(code: &str, detail: &str) -> UploadError {
    let retryable = match code {
        // Folder state and payload validation problems are stable.
        "folder_locked" | "folder_unknown" | "invalid_signature" | "duplicate_attestation" => false,
        "queue_full" | "indexing_backlog" => true,
        _ => true,
    };
    UploadError::application(code, detail, retryable)
}

pub(crate) async fn upload(
    document: &[u8],
    metadata: &EvidenceMetadata,
    config: &ProviderConfig,
) -> UploadOutcome {
    let url = attestations_url(&config.base_url_or(COMPLYLINE_API_URL));
    let body = build_request_body(document, metadata, config);

    let response = http_client()
        .post(&url)
        .header("X-Api-Key", config.credential())
        .json(&body)
        .send()
        .await;

    let response = match response {
        Ok(response) => response,
        Err(e) => return UploadOutcome::Rejected(classify_transport_error(&e)),
    };

    let status = response.status();
    if status.is_success() {
        return match response.json::<AttestationResponse>().await {
            Ok(attestation) => UploadOutcome::Accepted {
                provider_reference: Some(attestation.attestation_id),
                message: attestation.state.unwrap_or_else(|| "filed".to_owned()),
            },
            Err(e) => UploadOutcome::Rejected(UploadError::parse(format!(
                "unreadable attestation response: {e}"
            ))),
        };
    }

    let error_text = read_capped_error_body(response).await;
    let error = match status.as_u16() {
        401 | 403 | 429 | 500..=599 => classify_status(status, &error_text),
        _ => serde_json::from_str::<FlatError>(&error_text)
            .map(|flat| classify_application_error(&flat.code, &flat.detail))
            .unwrap_or_else(|_| classify_status(status, &error_text)),
    };
    tracing::debug!(code = %error.code, retryable = error.retryable, "Complyline upload attempt rejected");
    UploadOutcome::Rejected(error)
}
