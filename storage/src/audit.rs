//! Append-only audit log.
//!
//! Entries are written synchronously after the state mutation they describe
//! commits, so the log never describes a state that was not actually
//! persisted. Callers that must not fail on audit problems log and continue;
//! the capability itself reports errors honestly.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

use attest_types::{EmployeeId, TenantId};

use crate::store::{Collection, DocumentStore, StoreError};

/// The closed set of auditable events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AuditEventType {
    SessionStarted,
    CurriculumConfirmed,
    ModuleScored,
    SessionPassed,
    SessionFailed,
    SessionExhausted,
    SessionAbandoned,
    RemediationStarted,
    EvidenceGenerated,
    ComplianceUploadSucceeded,
    ComplianceUploadFailed,
}

/// One audit entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub event_type: AuditEventType,
    pub employee_id: Option<EmployeeId>,
    pub timestamp: DateTime<Utc>,
    pub metadata: Value,
}

impl AuditEvent {
    #[must_use]
    pub fn new(event_type: AuditEventType, employee_id: Option<EmployeeId>, metadata: Value) -> Self {
        Self {
            event_type,
            employee_id,
            timestamp: Utc::now(),
            metadata,
        }
    }
}

/// Audit logging capability.
pub trait AuditLog: Send + Sync {
    fn log(&self, tenant: &TenantId, event: AuditEvent) -> Result<(), StoreError>;
}

/// Audit log backed by the document store's append-only collection.
pub struct StorageAuditLog<S> {
    store: Arc<S>,
}

impl<S: DocumentStore> StorageAuditLog<S> {
    #[must_use]
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// All entries for a tenant, oldest first. Read path for tests and
    /// status queries.
    pub fn entries(&self, tenant: &TenantId) -> Result<Vec<AuditEvent>, StoreError> {
        let mut entries = Vec::new();
        for doc in self.store.find_all(tenant, Collection::AuditLog)? {
            entries.push(serde_json::from_value::<AuditEvent>(doc.doc)?);
        }
        entries.sort_by_key(|event| event.timestamp);
        Ok(entries)
    }
}

impl<S: DocumentStore> AuditLog for StorageAuditLog<S> {
    fn log(&self, tenant: &TenantId, event: AuditEvent) -> Result<(), StoreError> {
        let id = Uuid::new_v4().to_string();
        let doc = serde_json::to_value(&event)?;
        self.store.create(tenant, Collection::AuditLog, &id, &doc)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqlite::SqliteStore;
    use serde_json::json;

    #[test]
    fn log_appends_and_reads_back_in_order() {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let audit = StorageAuditLog::new(store);
        let tenant = TenantId::new("acme");

        audit
            .log(
                &tenant,
                AuditEvent::new(
                    AuditEventType::SessionStarted,
                    Some(EmployeeId::new("emp-1")),
                    json!({"session_id": "s-1"}),
                ),
            )
            .unwrap();
        audit
            .log(
                &tenant,
                AuditEvent::new(AuditEventType::EvidenceGenerated, None, json!({})),
            )
            .unwrap();

        let entries = audit.entries(&tenant).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].event_type, AuditEventType::SessionStarted);
        assert_eq!(
            entries[0].employee_id.as_ref().map(EmployeeId::as_str),
            Some("emp-1")
        );
        assert_eq!(entries[1].event_type, AuditEventType::EvidenceGenerated);
    }

    #[test]
    fn audit_entries_are_tenant_scoped() {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let audit = StorageAuditLog::new(store);

        audit
            .log(
                &TenantId::new("acme"),
                AuditEvent::new(AuditEventType::SessionPassed, None, json!({})),
            )
            .unwrap();

        assert!(audit.entries(&TenantId::new("globex")).unwrap().is_empty());
    }
}
