//! Typed repositories over the document store.
//!
//! These translate between domain records and stored documents and own the
//! record-level invariants: the session/module version counters ride the
//! store's CAS column, evidence has no update or delete path at all, and a
//! terminal upload ledger entry can never change again.

use std::sync::Arc;

use chrono::Utc;
use serde::de::DeserializeOwned;

use attest_types::{
    ComplianceUploadRecord, EmployeeId, EvidenceId, SessionId, TenantId, TrainingEvidence,
    TrainingModule, TrainingSession, UploadId,
};

use crate::store::{Collection, DocumentStore, StoreError, VersionedDoc};

fn decode<T: DeserializeOwned>(doc: VersionedDoc) -> Result<(T, u64), StoreError> {
    let record = serde_json::from_value(doc.doc)?;
    Ok((record, doc.version))
}

fn not_found(collection: Collection, id: impl ToString) -> StoreError {
    StoreError::NotFound {
        collection,
        id: id.to_string(),
    }
}

// ============================================================================
// Sessions and modules
// ============================================================================

pub struct SessionRepository<S> {
    store: Arc<S>,
}

impl<S: DocumentStore> SessionRepository<S> {
    #[must_use]
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Persist a fresh session. The returned record carries the store's
    /// initial version.
    pub fn create(&self, session: &TrainingSession) -> Result<TrainingSession, StoreError> {
        let mut session = session.clone();
        session.version = 0;
        let doc = serde_json::to_value(&session)?;
        session.version = self.store.create(
            &session.tenant_id,
            Collection::Sessions,
            &session.id.to_string(),
            &doc,
        )?;
        Ok(session)
    }

    pub fn get(&self, tenant: &TenantId, id: SessionId) -> Result<TrainingSession, StoreError> {
        let doc = self
            .store
            .find_by_id(tenant, Collection::Sessions, &id.to_string())?
            .ok_or_else(|| not_found(Collection::Sessions, id))?;
        let (mut session, version) = decode::<TrainingSession>(doc)?;
        session.version = version;
        Ok(session)
    }

    /// Version-checked write. `session.version` must be the version last
    /// read; on success the returned record carries the bumped version.
    pub fn update(&self, session: &TrainingSession) -> Result<TrainingSession, StoreError> {
        let mut session = session.clone();
        session.updated_at = Utc::now();
        let doc = serde_json::to_value(&session)?;
        session.version = self.store.update(
            &session.tenant_id,
            Collection::Sessions,
            &session.id.to_string(),
            &doc,
            session.version,
        )?;
        Ok(session)
    }

    /// Commit a session update and its module creations as one atomic group
    /// (curriculum confirmation).
    pub fn update_with_new_modules(
        &self,
        session: &TrainingSession,
        modules: &[TrainingModule],
    ) -> Result<TrainingSession, StoreError> {
        let mut session = session.clone();
        session.updated_at = Utc::now();
        let session_doc = serde_json::to_value(&session)?;

        let mut module_docs = Vec::with_capacity(modules.len());
        for module in modules {
            module_docs.push((module.id.to_string(), serde_json::to_value(module)?));
        }

        let expected = session.version;
        let mut new_version = expected;
        self.store.in_transaction(&session.tenant_id, &mut |tx| {
            new_version = tx.update(
                Collection::Sessions,
                &session.id.to_string(),
                &session_doc,
                expected,
            )?;
            for (id, doc) in &module_docs {
                tx.create(Collection::Modules, id, doc)?;
            }
            Ok(())
        })?;

        session.version = new_version;
        Ok(session)
    }

    /// Commit a session update and module rewrites as one atomic group
    /// (remediation reset).
    pub fn update_with_modules(
        &self,
        session: &TrainingSession,
        modules: &[TrainingModule],
    ) -> Result<TrainingSession, StoreError> {
        let mut session = session.clone();
        session.updated_at = Utc::now();
        let session_doc = serde_json::to_value(&session)?;

        let mut module_docs = Vec::with_capacity(modules.len());
        for module in modules {
            module_docs.push((
                module.id.to_string(),
                serde_json::to_value(module)?,
                module.version,
            ));
        }

        let expected = session.version;
        let mut new_version = expected;
        self.store.in_transaction(&session.tenant_id, &mut |tx| {
            new_version = tx.update(
                Collection::Sessions,
                &session.id.to_string(),
                &session_doc,
                expected,
            )?;
            for (id, doc, version) in &module_docs {
                tx.update(Collection::Modules, id, doc, *version)?;
            }
            Ok(())
        })?;

        session.version = new_version;
        Ok(session)
    }

    /// All modules of a session, ordered by module index.
    pub fn modules_for_session(
        &self,
        tenant: &TenantId,
        session_id: SessionId,
    ) -> Result<Vec<TrainingModule>, StoreError> {
        let mut modules = Vec::new();
        for doc in self.store.find_all(tenant, Collection::Modules)? {
            let (mut module, version) = decode::<TrainingModule>(doc)?;
            module.version = version;
            if module.session_id == session_id {
                modules.push(module);
            }
        }
        modules.sort_by_key(|module| module.module_index);
        Ok(modules)
    }

    pub fn update_module(&self, module: &TrainingModule) -> Result<TrainingModule, StoreError> {
        let mut module = module.clone();
        let doc = serde_json::to_value(&module)?;
        module.version = self.store.update(
            &module.tenant_id,
            Collection::Modules,
            &module.id.to_string(),
            &doc,
            module.version,
        )?;
        Ok(module)
    }

    /// The employee's non-terminal session, if one exists. At most one is
    /// active at a time; the service enforces that on creation.
    pub fn active_session_for_employee(
        &self,
        tenant: &TenantId,
        employee: &EmployeeId,
    ) -> Result<Option<TrainingSession>, StoreError> {
        for doc in self.store.find_all(tenant, Collection::Sessions)? {
            let (mut session, version) = decode::<TrainingSession>(doc)?;
            session.version = version;
            if &session.employee_id == employee && !session.is_terminal() {
                return Ok(Some(session));
            }
        }
        Ok(None)
    }
}

// ============================================================================
// Evidence
// ============================================================================

/// Evidence records are append-only: this repository deliberately exposes no
/// update or delete operation.
pub struct EvidenceRepository<S> {
    store: Arc<S>,
}

impl<S: DocumentStore> EvidenceRepository<S> {
    #[must_use]
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub fn create(&self, evidence: &TrainingEvidence) -> Result<(), StoreError> {
        let doc = serde_json::to_value(evidence)?;
        self.store.create(
            &evidence.tenant_id,
            Collection::Evidence,
            &evidence.id.to_string(),
            &doc,
        )?;
        Ok(())
    }

    pub fn get(&self, tenant: &TenantId, id: EvidenceId) -> Result<TrainingEvidence, StoreError> {
        let doc = self
            .store
            .find_by_id(tenant, Collection::Evidence, &id.to_string())?
            .ok_or_else(|| not_found(Collection::Evidence, id))?;
        Ok(decode::<TrainingEvidence>(doc)?.0)
    }

    pub fn find(
        &self,
        tenant: &TenantId,
        id: EvidenceId,
    ) -> Result<Option<TrainingEvidence>, StoreError> {
        self.store
            .find_by_id(tenant, Collection::Evidence, &id.to_string())?
            .map(|doc| decode::<TrainingEvidence>(doc).map(|(record, _)| record))
            .transpose()
    }

    /// Idempotency lookup: the evidence already generated for a session.
    pub fn find_for_session(
        &self,
        tenant: &TenantId,
        session_id: SessionId,
    ) -> Result<Option<TrainingEvidence>, StoreError> {
        for doc in self.store.find_all(tenant, Collection::Evidence)? {
            let (evidence, _) = decode::<TrainingEvidence>(doc)?;
            if evidence.session_id == session_id {
                return Ok(Some(evidence));
            }
        }
        Ok(None)
    }
}

// ============================================================================
// Upload ledger
// ============================================================================

pub struct UploadRepository<S> {
    store: Arc<S>,
}

impl<S: DocumentStore> UploadRepository<S> {
    #[must_use]
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub fn create(&self, record: &ComplianceUploadRecord) -> Result<(), StoreError> {
        let doc = serde_json::to_value(record)?;
        self.store.create(
            &record.tenant_id,
            Collection::Uploads,
            &record.id.to_string(),
            &doc,
        )?;
        Ok(())
    }

    pub fn get(
        &self,
        tenant: &TenantId,
        id: UploadId,
    ) -> Result<ComplianceUploadRecord, StoreError> {
        let doc = self
            .store
            .find_by_id(tenant, Collection::Uploads, &id.to_string())?
            .ok_or_else(|| not_found(Collection::Uploads, id))?;
        Ok(decode::<ComplianceUploadRecord>(doc)?.0)
    }

    /// Idempotency lookup for (tenant, evidence, provider).
    pub fn find_for_evidence(
        &self,
        tenant: &TenantId,
        evidence_id: EvidenceId,
        provider: &str,
    ) -> Result<Option<ComplianceUploadRecord>, StoreError> {
        for doc in self.store.find_all(tenant, Collection::Uploads)? {
            let (record, _) = decode::<ComplianceUploadRecord>(doc)?;
            if record.evidence_id == evidence_id && record.provider == provider {
                return Ok(Some(record));
            }
        }
        Ok(None)
    }

    /// Persist the caller's mutations to a pending record.
    ///
    /// Rejects the write if the stored record already reached a terminal
    /// status: pending → succeeded/failed happens at most once and is never
    /// reversed.
    pub fn update(&self, record: &ComplianceUploadRecord) -> Result<(), StoreError> {
        let id = record.id.to_string();
        let stored = self
            .store
            .find_by_id(&record.tenant_id, Collection::Uploads, &id)?
            .ok_or_else(|| not_found(Collection::Uploads, &id))?;
        let (current, version) = decode::<ComplianceUploadRecord>(stored)?;
        if current.status.is_terminal() {
            return Err(StoreError::IllegalUpdate(format!(
                "upload record {id} is already {}",
                current.status
            )));
        }

        let doc = serde_json::to_value(record)?;
        self.store
            .update(&record.tenant_id, Collection::Uploads, &id, &doc, version)?;
        Ok(())
    }
}
