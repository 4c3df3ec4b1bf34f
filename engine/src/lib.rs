//! Session lifecycle orchestration for Attest.
//!
//! This crate ties the pure core to the capabilities around it: the
//! [`SessionService`] drives every state-changing action through the state
//! machine and the version-checked repositories, the [`EvidenceGenerator`]
//! freezes terminal sessions into immutable, hashed evidence records, and
//! the [`ComplianceOrchestrator`] delivers those records to external
//! platforms fire-and-forget, under bounded retry.
//!
//! Failure propagation is strict: every action surfaces a typed
//! [`AttestError`](attest_core::AttestError) synchronously, except
//! compliance delivery, whose outcome is observable only through the upload
//! ledger.

pub mod capabilities;
pub mod dispatch;
pub mod evidence;
pub mod service;

pub use capabilities::{
    ContentEngine, ContentError, EvidenceRenderer, JsonEvidenceRenderer, RenderError,
    ScenarioEvaluation,
};
pub use dispatch::{
    ComplianceOrchestrator, ERROR_CODE_EVIDENCE_NOT_FOUND, ERROR_CODE_RENDER_FAILED,
};
pub use evidence::{canonical_hash, canonical_json, verify, EvidenceGenerator};
pub use service::{
    DeliveryStatus, EvaluationAction, EvaluationOutcome, SessionOverview, SessionService,
};

use attest_core::AttestError;
use attest_storage::StoreError;

/// Translate storage failures into the action-level taxonomy. Version
/// conflicts and duplicate creates are caller-visible conflicts (re-fetch
/// and retry); everything else is internal.
pub(crate) fn map_store_error(err: StoreError) -> AttestError {
    match &err {
        StoreError::NotFound { .. } => AttestError::not_found(err.to_string()),
        StoreError::VersionConflict { .. } | StoreError::AlreadyExists { .. } => {
            AttestError::conflict(err.to_string())
        }
        _ => AttestError::internal(err.to_string()),
    }
}

pub(crate) fn map_config_error(err: attest_config::ConfigError) -> AttestError {
    match &err {
        attest_config::ConfigError::UnknownTenant(_) => AttestError::not_found(err.to_string()),
        _ => AttestError::internal(err.to_string()),
    }
}

pub(crate) fn map_content_error(err: capabilities::ContentError) -> AttestError {
    match &err {
        capabilities::ContentError::Unavailable(_) => {
            AttestError::ServiceUnavailable(err.to_string())
        }
        capabilities::ContentError::Invalid(_) => AttestError::internal(err.to_string()),
    }
}
