//! Capability interfaces the engine consumes but does not implement.
//!
//! Curriculum/content generation and scenario evaluation are upstream
//! AI-backed services; document rendering is a pure function from evidence
//! to bytes. Both are injected so the lifecycle logic stays testable and the
//! engine never reaches into ambient state for them.

use std::future::Future;

use thiserror::Error;

use attest_types::{ModuleContent, ModuleOutline, TrainingEvidence, TrainingModule, TrainingSession};

/// Failure of the upstream generation/evaluation service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContentError {
    /// The capability is down or timing out; the action is safe to retry
    /// later.
    #[error("content service unavailable: {0}")]
    Unavailable(String),

    /// The capability answered with something unusable.
    #[error("content service returned an invalid payload: {0}")]
    Invalid(String),
}

/// Score and reasoning for one scenario response.
#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioEvaluation {
    /// 0..=1.
    pub score: f64,
    pub rationale: String,
}

/// Upstream curriculum/content/evaluation capability.
pub trait ContentEngine: Send + Sync {
    /// Plan the session's curriculum from the role profile it references.
    fn generate_curriculum(
        &self,
        session: &TrainingSession,
    ) -> impl Future<Output = Result<Vec<ModuleOutline>, ContentError>> + Send;

    /// Produce learning material for one module.
    fn generate_module_content(
        &self,
        module: &TrainingModule,
    ) -> impl Future<Output = Result<ModuleContent, ContentError>> + Send;

    /// Grade a free-text scenario response.
    fn evaluate_scenario_response(
        &self,
        module: &TrainingModule,
        scenario_index: u32,
        response_text: &str,
    ) -> impl Future<Output = Result<ScenarioEvaluation, ContentError>> + Send;
}

/// Rendering failure. Rendering is deterministic, so the orchestrator treats
/// this as non-retryable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("evidence rendering failed: {0}")]
pub struct RenderError(pub String);

/// Pure function from an evidence record to document bytes.
///
/// The production deployment plugs a PDF renderer in here; the bundled
/// [`JsonEvidenceRenderer`] produces a canonical JSON document and is the
/// default for environments without one.
pub trait EvidenceRenderer: Send + Sync {
    fn render(
        &self,
        evidence: &TrainingEvidence,
        tenant_display_name: &str,
    ) -> Result<Vec<u8>, RenderError>;
}

/// Renders the evidence record as a canonical JSON document.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonEvidenceRenderer;

impl EvidenceRenderer for JsonEvidenceRenderer {
    fn render(
        &self,
        evidence: &TrainingEvidence,
        tenant_display_name: &str,
    ) -> Result<Vec<u8>, RenderError> {
        let document = serde_json::json!({
            "tenant": tenant_display_name,
            "evidence": evidence,
        });
        // Value serialization sorts object keys, so identical evidence
        // renders to identical bytes.
        let value = serde_json::to_value(&document).map_err(|e| RenderError(e.to_string()))?;
        Ok(value.to_string().into_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    use attest_types::{
        EmployeeId, EvidenceBody, EvidenceId, OutcomeSummary, PassOutcome, PolicyAttestation,
        RoleProfileId, SessionId, SessionSummary, TenantId, EVIDENCE_SCHEMA_VERSION,
    };

    fn evidence() -> TrainingEvidence {
        let session_id = SessionId::generate();
        let employee = EmployeeId::new("emp-1");
        TrainingEvidence {
            id: EvidenceId::generate(),
            tenant_id: TenantId::new("acme"),
            session_id,
            employee_id: employee.clone(),
            schema_version: EVIDENCE_SCHEMA_VERSION,
            body: EvidenceBody {
                session: SessionSummary {
                    session_id,
                    employee_id: employee,
                    attempt_number: 1,
                    started_at: Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap(),
                    completed_at: None,
                },
                policy: PolicyAttestation {
                    policy_hash: "e3".repeat(32),
                    role_profile_id: RoleProfileId::new("picker"),
                    role_profile_version: 2,
                    app_version: "1.4.0".to_owned(),
                    pass_threshold: 0.7,
                    max_attempts: 3,
                },
                modules: Vec::new(),
                outcome: OutcomeSummary {
                    outcome: PassOutcome::Passed,
                    aggregate_score: Some(0.9),
                    weak_areas: Vec::new(),
                    module_scores: vec![Some(0.9)],
                },
            },
            content_hash: "11".repeat(32),
            generated_at: Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 0).unwrap(),
        }
    }

    #[test]
    fn json_renderer_is_deterministic() {
        let evidence = evidence();
        let first = JsonEvidenceRenderer.render(&evidence, "Acme").unwrap();
        let second = JsonEvidenceRenderer.render(&evidence, "Acme").unwrap();
        assert_eq!(first, second);
        assert!(!first.is_empty());
    }

    #[test]
    fn json_renderer_includes_tenant_name_and_hash() {
        let evidence = evidence();
        let bytes = JsonEvidenceRenderer.render(&evidence, "Acme Logistics").unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.contains("Acme Logistics"));
        assert!(text.contains(&evidence.content_hash));
    }
}
