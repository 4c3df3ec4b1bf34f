//! Compliance dispatch: fire-and-forget delivery of evidence records.
//!
//! One dispatch invocation drives one upload ledger entry to a terminal
//! status. The caller never learns the outcome synchronously; it is
//! observable later through the ledger. Everything that can go wrong in
//! here is recorded and logged, never propagated, so a dispatch can neither
//! fail the triggering request nor crash the process.

use std::sync::Arc;

use chrono::Utc;

use attest_config::ConfigProvider;
use attest_providers::retry::{backoff_delay, RetryConfig, Sleeper, TokioSleeper};
use attest_providers::{
    ComplianceProvider, EvidenceMetadata, HttpUploadTransport, ProviderConfig, UploadOutcome,
    UploadTransport,
};
use attest_storage::{
    AuditEvent, AuditEventType, AuditLog, DocumentStore, EvidenceRepository, StoreError,
    UploadRepository,
};
use attest_types::{
    ComplianceUploadRecord, EvidenceId, SessionId, TenantId, UploadStatus,
};

use crate::capabilities::EvidenceRenderer;

/// Fixed code recorded when the referenced evidence record is missing.
pub const ERROR_CODE_EVIDENCE_NOT_FOUND: &str = "evidence-not-found";
/// Fixed code recorded when rendering fails. Rendering is deterministic, so
/// the failure is terminal and non-retryable.
pub const ERROR_CODE_RENDER_FAILED: &str = "render-failed";

pub struct ComplianceOrchestrator<S, T, P> {
    evidence: EvidenceRepository<S>,
    uploads: UploadRepository<S>,
    config: Arc<dyn ConfigProvider>,
    renderer: Arc<dyn EvidenceRenderer>,
    audit: Arc<dyn AuditLog>,
    transport: T,
    sleeper: P,
}

impl<S: DocumentStore> ComplianceOrchestrator<S, HttpUploadTransport, TokioSleeper> {
    /// Production wiring: real HTTP uploads and real timer sleeps.
    pub fn with_http_transport(
        store: Arc<S>,
        config: Arc<dyn ConfigProvider>,
        renderer: Arc<dyn EvidenceRenderer>,
        audit: Arc<dyn AuditLog>,
    ) -> Self {
        Self::new(store, config, renderer, audit, HttpUploadTransport, TokioSleeper)
    }
}

impl<S, T, P> ComplianceOrchestrator<S, T, P>
where
    S: DocumentStore,
    T: UploadTransport,
    P: Sleeper,
{
    pub fn new(
        store: Arc<S>,
        config: Arc<dyn ConfigProvider>,
        renderer: Arc<dyn EvidenceRenderer>,
        audit: Arc<dyn AuditLog>,
        transport: T,
        sleeper: P,
    ) -> Self {
        Self {
            evidence: EvidenceRepository::new(Arc::clone(&store)),
            uploads: UploadRepository::new(store),
            config,
            renderer,
            audit,
            transport,
            sleeper,
        }
    }

    /// Detach a dispatch from the calling request. The task runs to a
    /// terminal ledger status on its own; total wall-clock time can reach
    /// `max_attempts * max_delay`.
    pub fn spawn(self: &Arc<Self>, tenant: TenantId, evidence_id: EvidenceId, session_id: SessionId)
    where
        S: 'static,
        T: 'static,
        P: 'static,
    {
        let orchestrator = Arc::clone(self);
        tokio::spawn(async move {
            orchestrator
                .dispatch_upload(&tenant, evidence_id, session_id)
                .await;
        });
    }

    /// Deliver one evidence record to the tenant's configured platform.
    ///
    /// Guarded fast exits, in order: no compliance integration; a ledger
    /// entry already exists for (tenant, evidence, provider) - a previous
    /// failure is final, re-dispatch never re-attempts; unknown provider
    /// key; evidence record missing (terminal failed entry). Then the main
    /// path: pending entry, render, sequential attempt loop.
    pub async fn dispatch_upload(
        &self,
        tenant: &TenantId,
        evidence_id: EvidenceId,
        session_id: SessionId,
    ) {
        let config = match self.config.tenant_config(tenant) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(%tenant, "compliance dispatch skipped, configuration unavailable: {e}");
                return;
            }
        };
        let Some(settings) = config.compliance else {
            tracing::debug!(%tenant, "no compliance integration configured");
            return;
        };

        match self
            .uploads
            .find_for_evidence(tenant, evidence_id, &settings.provider)
        {
            Ok(Some(existing)) => {
                tracing::debug!(
                    %tenant,
                    evidence = %evidence_id,
                    status = %existing.status,
                    "upload already recorded; not re-attempting"
                );
                return;
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(%tenant, evidence = %evidence_id, "upload ledger lookup failed: {e}");
                return;
            }
        }

        let Some(provider) = ComplianceProvider::from_key(&settings.provider) else {
            tracing::warn!(
                %tenant,
                provider = %settings.provider,
                "unknown compliance provider configured; dispatch skipped"
            );
            return;
        };

        let evidence = match self.evidence.find(tenant, evidence_id) {
            Ok(evidence) => evidence,
            Err(e) => {
                tracing::warn!(%tenant, evidence = %evidence_id, "evidence lookup failed: {e}");
                return;
            }
        };
        let mut record = ComplianceUploadRecord::pending(
            tenant.clone(),
            evidence_id,
            session_id,
            provider.name(),
            settings.retry.max_attempts,
        );
        let Some(evidence) = evidence else {
            record.status = UploadStatus::Failed;
            record.last_error = Some("evidence record not found".to_owned());
            record.last_error_code = Some(ERROR_CODE_EVIDENCE_NOT_FOUND.to_owned());
            record.completed_at = Some(Utc::now());
            if let Err(e) = self.uploads.create(&record) {
                tracing::warn!(%tenant, evidence = %evidence_id, "failed to record missing evidence: {e}");
            }
            return;
        };

        match self.uploads.create(&record) {
            Ok(()) => {}
            Err(StoreError::AlreadyExists { .. }) => {
                tracing::debug!(%tenant, evidence = %evidence_id, "concurrent dispatch already opened a ledger entry");
                return;
            }
            Err(e) => {
                tracing::warn!(%tenant, evidence = %evidence_id, "failed to open upload ledger entry: {e}");
                return;
            }
        }

        let document = match self.renderer.render(&evidence, &config.display_name) {
            Ok(bytes) => bytes,
            Err(e) => {
                record.last_error = Some(e.to_string());
                record.last_error_code = Some(ERROR_CODE_RENDER_FAILED.to_owned());
                record.retryable = false;
                self.finish_failed(tenant, &mut record).await;
                return;
            }
        };

        let metadata = EvidenceMetadata {
            evidence_id,
            session_id,
            employee_id: evidence.employee_id.clone(),
            tenant_display_name: config.display_name.clone(),
            content_hash: evidence.content_hash.clone(),
            generated_at: evidence.generated_at,
            outcome: evidence.body.outcome.outcome,
            aggregate_score: evidence.body.outcome.aggregate_score,
        };
        let provider_config =
            ProviderConfig::new(settings.credential.expose(), settings.target.clone());
        let retry_config = RetryConfig::new(
            settings.retry.max_attempts,
            settings.retry.initial_delay_ms,
            settings.retry.max_delay_ms,
        );

        for attempt in 0..retry_config.max_attempts {
            if attempt > 0 {
                self.sleeper
                    .sleep(backoff_delay(attempt, &retry_config))
                    .await;
            }

            let outcome = self
                .transport
                .attempt(provider, &document, &metadata, &provider_config)
                .await;
            record.attempt_count = attempt + 1;
            record.updated_at = Utc::now();

            match outcome {
                UploadOutcome::Accepted {
                    provider_reference,
                    message,
                } => {
                    record.status = UploadStatus::Succeeded;
                    record.provider_reference = provider_reference;
                    record.retryable = false;
                    record.completed_at = Some(Utc::now());
                    self.persist(&record);
                    self.audit_outcome(tenant, &record, AuditEventType::ComplianceUploadSucceeded);
                    tracing::info!(
                        %tenant,
                        evidence = %evidence_id,
                        provider = provider.name(),
                        attempts = record.attempt_count,
                        "compliance upload succeeded: {message}"
                    );
                    return;
                }
                UploadOutcome::Rejected(error) => {
                    record.last_error = Some(error.message.clone());
                    record.last_error_code = Some(error.code.clone());
                    record.retryable = error.retryable;

                    if !error.retryable {
                        // Hopeless; consume no further attempts.
                        self.finish_failed(tenant, &mut record).await;
                        return;
                    }

                    // Keep the attempt bookkeeping visible while pending.
                    self.persist(&record);
                    tracing::debug!(
                        %tenant,
                        evidence = %evidence_id,
                        attempt = record.attempt_count,
                        code = %error.code,
                        "retryable upload failure"
                    );
                }
            }
        }

        self.finish_failed(tenant, &mut record).await;
    }

    async fn finish_failed(&self, tenant: &TenantId, record: &mut ComplianceUploadRecord) {
        record.status = UploadStatus::Failed;
        record.updated_at = Utc::now();
        record.completed_at = Some(Utc::now());
        self.persist(record);
        self.audit_outcome(tenant, record, AuditEventType::ComplianceUploadFailed);
        tracing::warn!(
            %tenant,
            evidence = %record.evidence_id,
            provider = %record.provider,
            attempts = record.attempt_count,
            code = record.last_error_code.as_deref().unwrap_or("none"),
            "compliance upload failed"
        );
    }

    fn persist(&self, record: &ComplianceUploadRecord) {
        if let Err(e) = self.uploads.update(record) {
            tracing::warn!(
                tenant = %record.tenant_id,
                upload = %record.id,
                "failed to persist upload ledger entry: {e}"
            );
        }
    }

    fn audit_outcome(
        &self,
        tenant: &TenantId,
        record: &ComplianceUploadRecord,
        event_type: AuditEventType,
    ) {
        let event = AuditEvent::new(
            event_type,
            None,
            serde_json::json!({
                "evidence_id": record.evidence_id.to_string(),
                "session_id": record.session_id.to_string(),
                "provider": record.provider,
                "attempts": record.attempt_count,
                "provider_reference": record.provider_reference,
                "error_code": record.last_error_code,
            }),
        );
        if let Err(e) = self.audit.log(tenant, event) {
            tracing::warn!(%tenant, "failed to write upload audit event: {e}");
        }
    }
}
