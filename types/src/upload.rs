//! The compliance upload ledger entry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{EvidenceId, SessionId, TenantId, UploadId};
use crate::status::UploadStatus;

/// Durable record of one dispatch of an evidence record to one provider.
///
/// At most one record exists per (tenant, evidence, provider); the
/// orchestrator checks for an existing record before creating one. Status
/// moves pending → succeeded or pending → failed exactly once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplianceUploadRecord {
    pub id: UploadId,
    pub tenant_id: TenantId,
    pub evidence_id: EvidenceId,
    pub session_id: SessionId,
    /// Stable provider key, e.g. `"veridesk"`.
    pub provider: String,
    pub status: UploadStatus,
    /// Attempts performed so far (0 while pending and untried).
    pub attempt_count: u32,
    pub max_attempts: u32,
    /// Reference id assigned by the platform on success.
    pub provider_reference: Option<String>,
    pub last_error: Option<String>,
    pub last_error_code: Option<String>,
    /// Whether the most recent error was classified retryable.
    pub retryable: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl ComplianceUploadRecord {
    /// Open a pending ledger entry before the first attempt.
    #[must_use]
    pub fn pending(
        tenant_id: TenantId,
        evidence_id: EvidenceId,
        session_id: SessionId,
        provider: impl Into<String>,
        max_attempts: u32,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: UploadId::generate(),
            tenant_id,
            evidence_id,
            session_id,
            provider: provider.into(),
            status: UploadStatus::Pending,
            attempt_count: 0,
            max_attempts,
            provider_reference: None,
            last_error: None,
            last_error_code: None,
            retryable: false,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }
}
