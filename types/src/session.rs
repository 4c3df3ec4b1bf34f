//! The training-session record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{EmployeeId, RoleProfileId, SessionId, TenantId};
use crate::status::SessionStatus;

/// One planned module in a session's curriculum, in presentation order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleOutline {
    pub title: String,
    pub topic_area: String,
    /// Indices into the role profile's job-expectation list this module covers.
    pub job_expectation_indices: Vec<u32>,
}

/// A multi-module assessment attempt chain for one employee.
///
/// Owned and mutated exclusively through the state machine and the
/// version-checked repository write. Once the status is terminal the record
/// is logically frozen except for its evidence linkage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingSession {
    pub id: SessionId,
    pub tenant_id: TenantId,
    pub employee_id: EmployeeId,
    pub role_profile_id: RoleProfileId,
    pub role_profile_version: u32,
    /// Hash of the tenant policy configuration in force at creation time.
    pub policy_hash: String,
    pub app_version: String,
    pub status: SessionStatus,
    /// 1-based; incremented when remediation starts.
    pub attempt_number: u32,
    pub curriculum: Vec<ModuleOutline>,
    pub aggregate_score: Option<f64>,
    pub weak_areas: Option<Vec<String>>,
    /// Optimistic-lock counter maintained by the store; increases by exactly
    /// one per accepted write.
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Inputs for creating a fresh session record.
pub struct NewSession {
    pub tenant_id: TenantId,
    pub employee_id: EmployeeId,
    pub role_profile_id: RoleProfileId,
    pub role_profile_version: u32,
    pub policy_hash: String,
    pub app_version: String,
}

impl TrainingSession {
    /// Create a session at attempt start: curriculum generation pending,
    /// attempt number 1, store version not yet assigned.
    #[must_use]
    pub fn create(new: NewSession) -> Self {
        let now = Utc::now();
        Self {
            id: SessionId::generate(),
            tenant_id: new.tenant_id,
            employee_id: new.employee_id,
            role_profile_id: new.role_profile_id,
            role_profile_version: new.role_profile_version,
            policy_hash: new.policy_hash,
            app_version: new.app_version,
            status: SessionStatus::CurriculumGenerating,
            attempt_number: 1,
            curriculum: Vec::new(),
            aggregate_score: None,
            weak_areas: None,
            version: 0,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    /// True once the session has reached a status with no outgoing
    /// transitions.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_session() -> TrainingSession {
        TrainingSession::create(NewSession {
            tenant_id: TenantId::new("acme"),
            employee_id: EmployeeId::new("emp-1"),
            role_profile_id: RoleProfileId::new("warehouse-associate"),
            role_profile_version: 3,
            policy_hash: "0".repeat(64),
            app_version: "1.4.0".to_owned(),
        })
    }

    #[test]
    fn create_starts_in_curriculum_generating() {
        let session = new_session();
        assert_eq!(session.status, SessionStatus::CurriculumGenerating);
        assert_eq!(session.attempt_number, 1);
        assert!(session.curriculum.is_empty());
        assert!(session.aggregate_score.is_none());
        assert!(session.completed_at.is_none());
        assert!(!session.is_terminal());
    }

    #[test]
    fn serde_round_trip() {
        let session = new_session();
        let json = serde_json::to_string(&session).unwrap();
        let back: TrainingSession = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, session.id);
        assert_eq!(back.status, session.status);
        assert_eq!(back.version, session.version);
    }
}
