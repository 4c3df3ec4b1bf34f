//! Evidence generation.
//!
//! Exactly one evidence record exists per terminal session: generation is
//! idempotent, the record is immutable, and its content hash is recomputable
//! from the stored body alone. The hash is an integrity mechanism (tamper
//! evidence), not encryption.

use std::sync::Arc;

use chrono::Utc;
use sha2::{Digest, Sha256};

use attest_config::TenantConfig;
use attest_core::AttestError;
use attest_storage::{DocumentStore, EvidenceRepository, SessionRepository, StoreError};
use attest_types::{
    EvidenceBody, EvidenceId, ModuleEvidence, OutcomeSummary, PassOutcome, PolicyAttestation,
    SessionId, SessionStatus, SessionSummary, TenantId, TrainingEvidence, TrainingModule,
    TrainingSession, EVIDENCE_SCHEMA_VERSION,
};

use crate::map_store_error;

/// Canonical JSON rendering of an evidence body: object keys sorted, no
/// insignificant whitespace. Serialization-order independent by
/// construction, which is what makes the hash reproducible.
pub fn canonical_json(body: &EvidenceBody) -> Result<String, AttestError> {
    let value = serde_json::to_value(body)
        .map_err(|e| AttestError::internal(format!("evidence body serialization failed: {e}")))?;
    Ok(value.to_string())
}

/// 256-bit content hash over the canonical body, as 64 lowercase hex chars.
pub fn canonical_hash(body: &EvidenceBody) -> Result<String, AttestError> {
    let canonical = canonical_json(body)?;
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    Ok(format!("{:x}", hasher.finalize()))
}

/// Recompute the hash over the stored body and compare. False means the
/// record no longer matches what was generated.
pub fn verify(evidence: &TrainingEvidence) -> Result<bool, AttestError> {
    Ok(canonical_hash(&evidence.body)? == evidence.content_hash)
}

fn outcome_for_status(status: SessionStatus) -> PassOutcome {
    match status {
        SessionStatus::Passed => PassOutcome::Passed,
        // An exhausted session failed its final evaluation; an abandoned one
        // never reached a verdict.
        SessionStatus::Exhausted => PassOutcome::Failed,
        _ => PassOutcome::Unknown,
    }
}

fn assemble_body(
    session: &TrainingSession,
    modules: &[TrainingModule],
    config: &TenantConfig,
) -> EvidenceBody {
    EvidenceBody {
        session: SessionSummary {
            session_id: session.id,
            employee_id: session.employee_id.clone(),
            attempt_number: session.attempt_number,
            started_at: session.created_at,
            completed_at: session.completed_at,
        },
        policy: PolicyAttestation {
            policy_hash: session.policy_hash.clone(),
            role_profile_id: session.role_profile_id.clone(),
            role_profile_version: session.role_profile_version,
            app_version: session.app_version.clone(),
            pass_threshold: config.training.pass_threshold,
            max_attempts: config.training.max_attempts,
        },
        modules: modules.iter().map(ModuleEvidence::from_module).collect(),
        outcome: OutcomeSummary {
            outcome: outcome_for_status(session.status),
            aggregate_score: session.aggregate_score,
            weak_areas: session.weak_areas.clone().unwrap_or_default(),
            module_scores: modules.iter().map(|m| m.module_score).collect(),
        },
    }
}

pub struct EvidenceGenerator<S> {
    sessions: SessionRepository<S>,
    evidence: EvidenceRepository<S>,
}

impl<S: DocumentStore> EvidenceGenerator<S> {
    #[must_use]
    pub fn new(store: Arc<S>) -> Self {
        Self {
            sessions: SessionRepository::new(Arc::clone(&store)),
            evidence: EvidenceRepository::new(store),
        }
    }

    /// Produce (or return the already-produced) evidence record for a
    /// terminal session.
    ///
    /// Idempotent: a second call for the same session returns the stored
    /// record with the same id and hash, regenerating nothing and
    /// dispatching nothing.
    pub fn generate_for_session(
        &self,
        config: &TenantConfig,
        tenant: &TenantId,
        session_id: SessionId,
    ) -> Result<TrainingEvidence, AttestError> {
        let session = self
            .sessions
            .get(tenant, session_id)
            .map_err(map_store_error)?;
        if !session.is_terminal() {
            return Err(AttestError::conflict(format!(
                "session {session_id} is {}; evidence requires a terminal status",
                session.status
            )));
        }

        if let Some(existing) = self
            .evidence
            .find_for_session(tenant, session_id)
            .map_err(map_store_error)?
        {
            tracing::debug!(session = %session_id, evidence = %existing.id, "evidence already generated");
            return Ok(existing);
        }

        let modules = self
            .sessions
            .modules_for_session(tenant, session_id)
            .map_err(map_store_error)?;

        let body = assemble_body(&session, &modules, config);
        let content_hash = canonical_hash(&body)?;
        let record = TrainingEvidence {
            id: EvidenceId::generate(),
            tenant_id: tenant.clone(),
            session_id,
            employee_id: session.employee_id.clone(),
            schema_version: EVIDENCE_SCHEMA_VERSION,
            body,
            content_hash,
            generated_at: Utc::now(),
        };

        match self.evidence.create(&record) {
            Ok(()) => Ok(record),
            // A concurrent generation won the race; return its record.
            Err(StoreError::AlreadyExists { .. }) => self
                .evidence
                .find_for_session(tenant, session_id)
                .map_err(map_store_error)?
                .ok_or_else(|| {
                    AttestError::internal("evidence create conflicted but no record exists")
                }),
            Err(e) => Err(map_store_error(e)),
        }
    }

    /// Stored evidence for a session, if any.
    pub fn find_for_session(
        &self,
        tenant: &TenantId,
        session_id: SessionId,
    ) -> Result<Option<TrainingEvidence>, AttestError> {
        self.evidence
            .find_for_session(tenant, session_id)
            .map_err(map_store_error)
    }
}
