//! Core domain types for Attest.
//!
//! This crate contains pure domain types with no IO, no async, and minimal
//! dependencies. Everything here can be used from any layer of the
//! application: identifiers, lifecycle status enums, and the four persisted
//! records (session, module, evidence, upload ledger entry).

// Pedantic lint configuration - these are intentional design choices
#![allow(clippy::missing_errors_doc)] // Result-returning functions are self-explanatory
#![allow(clippy::missing_panics_doc)] // Panics are documented in assertions

mod evidence;
mod ids;
mod module;
mod session;
mod status;
mod upload;

pub use evidence::{
    EvidenceBody, ModuleEvidence, OutcomeSummary, PassOutcome, PolicyAttestation,
    QuizAnswerEvidence, ScenarioResponseEvidence, SessionSummary, TrainingEvidence,
    EVIDENCE_SCHEMA_VERSION,
};
pub use ids::{
    EmployeeId, EvidenceId, ModuleId, RoleProfileId, SessionId, TenantId, UploadId,
};
pub use module::{
    ModuleContent, QuizAnswer, QuizQuestion, ScenarioPrompt, ScenarioResponse, TrainingModule,
};
pub use session::{ModuleOutline, NewSession, TrainingSession};
pub use status::{ModuleStatus, SessionStatus, StatusParseError, UploadStatus};
pub use upload::ComplianceUploadRecord;
