//! The session lifecycle service: every state-changing action in one place.
//!
//! Each action authorizes the caller, asks the state machine whether the
//! transition is legal, and persists through a version-checked write. A
//! stale version surfaces as a conflict and the caller re-fetches; writes
//! are never silently merged. Audit entries are written after the mutation
//! they describe commits.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;

use attest_config::{policy_hash, ConfigProvider, TenantConfig};
use attest_core::state::{
    apply_module_event, apply_session_event, ModuleEvent, SessionEvent,
};
use attest_core::{score, AttestError};
use attest_providers::retry::Sleeper;
use attest_providers::UploadTransport;
use attest_storage::{
    AuditEvent, AuditEventType, AuditLog, DocumentStore, SessionRepository, UploadRepository,
};
use attest_types::{
    ComplianceUploadRecord, EmployeeId, EvidenceId, ModuleStatus, NewSession, QuizAnswer,
    RoleProfileId, ScenarioResponse, SessionId, SessionStatus, TenantId, TrainingModule,
    TrainingSession,
};

use crate::capabilities::ContentEngine;
use crate::dispatch::ComplianceOrchestrator;
use crate::evidence::EvidenceGenerator;
use crate::{map_config_error, map_content_error, map_store_error};

/// What the caller should offer the employee after an evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum EvaluationAction {
    /// Passed; the session is complete.
    Complete,
    /// Failed with attempts remaining; remediation can be started.
    RemediationAvailable,
    /// Failed on the final attempt; the session is exhausted.
    Exhausted,
}

impl EvaluationAction {
    #[must_use]
    pub const fn as_key(self) -> &'static str {
        match self {
            Self::Complete => "complete",
            Self::RemediationAvailable => "remediation-available",
            Self::Exhausted => "exhausted",
        }
    }
}

/// Synchronous result of evaluating a session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationOutcome {
    pub passed: bool,
    pub aggregate_score: f64,
    pub weak_areas: Vec<String>,
    pub action: EvaluationAction,
}

/// Read model for one session and its modules.
#[derive(Debug, Clone)]
pub struct SessionOverview {
    pub session: TrainingSession,
    pub modules: Vec<TrainingModule>,
}

/// Read model for the compliance delivery of a session's evidence. This is
/// the only window onto the fire-and-forget upload.
#[derive(Debug, Clone)]
pub struct DeliveryStatus {
    pub evidence_id: EvidenceId,
    pub content_hash: String,
    pub generated_at: DateTime<Utc>,
    /// Absent while no dispatch has opened a ledger entry (including tenants
    /// without a compliance integration).
    pub upload: Option<ComplianceUploadRecord>,
}

pub struct SessionService<S, C, T, P> {
    sessions: SessionRepository<S>,
    uploads: UploadRepository<S>,
    evidence: EvidenceGenerator<S>,
    content: Arc<C>,
    config: Arc<dyn ConfigProvider>,
    audit: Arc<dyn AuditLog>,
    orchestrator: Arc<ComplianceOrchestrator<S, T, P>>,
}

impl<S, C, T, P> SessionService<S, C, T, P>
where
    S: DocumentStore + 'static,
    C: ContentEngine,
    T: UploadTransport + 'static,
    P: Sleeper + 'static,
{
    pub fn new(
        store: Arc<S>,
        content: Arc<C>,
        config: Arc<dyn ConfigProvider>,
        audit: Arc<dyn AuditLog>,
        orchestrator: Arc<ComplianceOrchestrator<S, T, P>>,
    ) -> Self {
        Self {
            sessions: SessionRepository::new(Arc::clone(&store)),
            uploads: UploadRepository::new(Arc::clone(&store)),
            evidence: EvidenceGenerator::new(store),
            content,
            config,
            audit,
            orchestrator,
        }
    }

    // ------------------------------------------------------------------
    // Actions
    // ------------------------------------------------------------------

    /// Start a new attempt chain for an employee.
    ///
    /// Creates the session in `curriculum-generating`, obtains the
    /// curriculum from the content engine, then commits the outlines, the
    /// locked modules, and the `in-progress` transition as one group.
    pub async fn start_session(
        &self,
        tenant: &TenantId,
        employee: &EmployeeId,
        role_profile_id: RoleProfileId,
        role_profile_version: u32,
    ) -> Result<TrainingSession, AttestError> {
        let config = self.tenant_config(tenant)?;

        if let Some(active) = self
            .sessions
            .active_session_for_employee(tenant, employee)
            .map_err(map_store_error)?
        {
            return Err(AttestError::conflict(format!(
                "employee {employee} already has an active session {}",
                active.id
            )));
        }

        let session = TrainingSession::create(NewSession {
            tenant_id: tenant.clone(),
            employee_id: employee.clone(),
            role_profile_id,
            role_profile_version,
            policy_hash: policy_hash(&config),
            app_version: config.app_version.clone(),
        });
        let session = self.sessions.create(&session).map_err(map_store_error)?;
        self.audit(
            tenant,
            AuditEventType::SessionStarted,
            Some(employee.clone()),
            json!({ "session_id": session.id.to_string() }),
        );

        let outlines = self
            .content
            .generate_curriculum(&session)
            .await
            .map_err(map_content_error)?;
        if outlines.is_empty() {
            return Err(AttestError::internal(
                "curriculum generation returned no modules",
            ));
        }

        let modules: Vec<TrainingModule> = outlines
            .iter()
            .enumerate()
            .map(|(index, outline)| {
                TrainingModule::from_outline(tenant.clone(), session.id, index as u32, outline)
            })
            .collect();

        let transition = apply_session_event(session.status, SessionEvent::CurriculumReady)?;
        let mut session = session;
        session.curriculum = outlines;
        session.status = transition.to;
        let session = self
            .sessions
            .update_with_new_modules(&session, &modules)
            .map_err(map_store_error)?;

        self.audit(
            tenant,
            AuditEventType::CurriculumConfirmed,
            Some(employee.clone()),
            json!({
                "session_id": session.id.to_string(),
                "modules": modules.len(),
            }),
        );
        Ok(session)
    }

    /// Generate content for a locked module and open it for learning.
    pub async fn begin_module(
        &self,
        tenant: &TenantId,
        employee: &EmployeeId,
        session_id: SessionId,
        module_index: u32,
    ) -> Result<TrainingModule, AttestError> {
        let session = self.load_owned_session(tenant, employee, session_id)?;
        Self::ensure_active(&session)?;

        let module = self.module_at(tenant, session_id, module_index)?;
        let generating = apply_module_event(module.status, ModuleEvent::ContentRequested)?;
        let mut module = module;
        module.status = generating;
        let module = self.sessions.update_module(&module).map_err(map_store_error)?;

        let content = match self.content.generate_module_content(&module).await {
            Ok(content) if !content.scenarios.is_empty() && !content.quiz.is_empty() => content,
            Ok(_) => {
                self.reset_to_locked(&module);
                return Err(AttestError::internal(
                    "content generation returned a module without scenarios or quiz",
                ));
            }
            Err(e) => {
                self.reset_to_locked(&module);
                return Err(map_content_error(e));
            }
        };

        let mut module = module;
        module.content = Some(content);
        module.status = apply_module_event(module.status, ModuleEvent::ContentReady)?;
        self.sessions.update_module(&module).map_err(map_store_error)
    }

    /// Accept and evaluate one scenario response.
    ///
    /// Responses arrive strictly in scenario order; answering the same
    /// scenario twice is a conflict.
    pub async fn submit_scenario_response(
        &self,
        tenant: &TenantId,
        employee: &EmployeeId,
        session_id: SessionId,
        module_index: u32,
        scenario_index: u32,
        response_text: &str,
    ) -> Result<TrainingModule, AttestError> {
        let session = self.load_owned_session(tenant, employee, session_id)?;
        Self::ensure_active(&session)?;

        let module = self.module_at(tenant, session_id, module_index)?;
        let Some(content) = module.content.clone() else {
            return Err(AttestError::conflict(format!(
                "module {module_index} has no generated content yet"
            )));
        };
        let scenario_count = content.scenarios.len() as u32;
        if scenario_index >= scenario_count {
            return Err(AttestError::validation(format!(
                "scenario index {scenario_index} out of range ({scenario_count} scenarios)"
            )));
        }
        let answered = module.scenario_responses.len() as u32;
        if scenario_index < answered {
            return Err(AttestError::conflict(format!(
                "scenario {scenario_index} was already answered"
            )));
        }
        if scenario_index > answered {
            return Err(AttestError::validation(format!(
                "scenario {scenario_index} answered out of order; expected {answered}"
            )));
        }
        if response_text.trim().is_empty() {
            return Err(AttestError::validation("scenario response must not be empty"));
        }

        let evaluation = self
            .content
            .evaluate_scenario_response(&module, scenario_index, response_text)
            .await
            .map_err(map_content_error)?;
        if !(0.0..=1.0).contains(&evaluation.score) {
            return Err(AttestError::internal(format!(
                "scenario evaluation score {} out of range",
                evaluation.score
            )));
        }

        let is_last = scenario_index + 1 == scenario_count;
        let next = apply_module_event(module.status, ModuleEvent::ScenarioAnswered { is_last })?;

        let mut module = module;
        module.scenario_responses.push(ScenarioResponse {
            scenario_index,
            response_text: response_text.to_owned(),
            score: evaluation.score,
            rationale: evaluation.rationale,
        });
        module.status = next;
        self.sessions.update_module(&module).map_err(map_store_error)
    }

    /// Accept and score one quiz answer. The last answer scores the module.
    pub fn submit_quiz_answer(
        &self,
        tenant: &TenantId,
        employee: &EmployeeId,
        session_id: SessionId,
        module_index: u32,
        question_index: u32,
        selected_option: &str,
    ) -> Result<TrainingModule, AttestError> {
        let session = self.load_owned_session(tenant, employee, session_id)?;
        Self::ensure_active(&session)?;

        let module = self.module_at(tenant, session_id, module_index)?;
        let Some(content) = module.content.clone() else {
            return Err(AttestError::conflict(format!(
                "module {module_index} has no generated content yet"
            )));
        };
        let quiz_count = content.quiz.len() as u32;
        if question_index >= quiz_count {
            return Err(AttestError::validation(format!(
                "question index {question_index} out of range ({quiz_count} questions)"
            )));
        }
        let answered = module.quiz_answers.len() as u32;
        if question_index < answered {
            return Err(AttestError::conflict(format!(
                "question {question_index} was already answered"
            )));
        }
        if question_index > answered {
            return Err(AttestError::validation(format!(
                "question {question_index} answered out of order; expected {answered}"
            )));
        }
        let question = &content.quiz[question_index as usize];
        if !question.options.iter().any(|option| option == selected_option) {
            return Err(AttestError::validation(
                "selected option is not one of the question's options",
            ));
        }

        let is_last = question_index + 1 == quiz_count;
        let next = apply_module_event(module.status, ModuleEvent::QuizAnswered { is_last })?;

        let mut module = module;
        module.quiz_answers.push(QuizAnswer {
            question_index,
            selected_option: selected_option.to_owned(),
            score: score::score_mc_answer(selected_option, &question.correct_option),
        });
        module.status = next;
        if module.status == ModuleStatus::Scored {
            // The module score exists if and only if the module is scored;
            // this is the transition that establishes it.
            let scenario_scores: Vec<f64> =
                module.scenario_responses.iter().map(|r| r.score).collect();
            let quiz_scores: Vec<f64> = module.quiz_answers.iter().map(|a| a.score).collect();
            module.module_score = score::module_score(&scenario_scores, &quiz_scores);
        }

        let module = self.sessions.update_module(&module).map_err(map_store_error)?;
        if module.status == ModuleStatus::Scored {
            self.audit(
                tenant,
                AuditEventType::ModuleScored,
                Some(employee.clone()),
                json!({
                    "session_id": session_id.to_string(),
                    "module_index": module.module_index,
                    "score": module.module_score,
                }),
            );
        }
        Ok(module)
    }

    /// Evaluate a fully-scored session against the tenant's pass policy.
    ///
    /// The write into `evaluating` is the serialization point for racing
    /// evaluation requests: the loser's version check fails before any
    /// evidence work happens. On a terminal outcome the evidence record is
    /// generated and compliance dispatch is spawned fire-and-forget.
    pub fn evaluate_session(
        &self,
        tenant: &TenantId,
        employee: &EmployeeId,
        session_id: SessionId,
    ) -> Result<EvaluationOutcome, AttestError> {
        let config = self.tenant_config(tenant)?;
        let session = self.load_owned_session(tenant, employee, session_id)?;

        let modules = self
            .sessions
            .modules_for_session(tenant, session_id)
            .map_err(map_store_error)?;
        if modules.is_empty() {
            return Err(AttestError::validation("session has no modules"));
        }
        if modules.iter().any(|m| m.status != ModuleStatus::Scored) {
            return Err(AttestError::validation("not all modules are scored"));
        }

        let transition = apply_session_event(session.status, SessionEvent::AllModulesScored)?;
        let mut session = session;
        session.status = transition.to;
        let session = self.sessions.update(&session).map_err(map_store_error)?;

        let module_scores: Vec<f64> = modules.iter().filter_map(|m| m.module_score).collect();
        let aggregate = score::aggregate_score(&module_scores)
            .ok_or_else(|| AttestError::internal("scored modules are missing scores"))?;
        let topics: Vec<(String, f64)> = modules
            .iter()
            .filter_map(|m| m.module_score.map(|s| (m.topic_area.clone(), s)))
            .collect();
        let threshold = config.training.pass_threshold;
        let weak_areas = score::weak_areas(&topics, threshold);
        let passed = score::is_passing(aggregate, threshold);

        let (event, action) = if passed {
            (SessionEvent::EvaluationPassed, EvaluationAction::Complete)
        } else if session.attempt_number >= config.training.max_attempts {
            (SessionEvent::EvaluationExhausted, EvaluationAction::Exhausted)
        } else {
            (
                SessionEvent::EvaluationFailed,
                EvaluationAction::RemediationAvailable,
            )
        };
        let transition = apply_session_event(session.status, event)?;

        let mut session = session;
        session.status = transition.to;
        session.aggregate_score = Some(aggregate);
        session.weak_areas = Some(weak_areas.clone());
        if transition.to.is_terminal() {
            session.completed_at = Some(Utc::now());
        }
        let session = self.sessions.update(&session).map_err(map_store_error)?;

        let audit_type = match action {
            EvaluationAction::Complete => AuditEventType::SessionPassed,
            EvaluationAction::RemediationAvailable => AuditEventType::SessionFailed,
            EvaluationAction::Exhausted => AuditEventType::SessionExhausted,
        };
        self.audit(
            tenant,
            audit_type,
            Some(employee.clone()),
            json!({
                "session_id": session_id.to_string(),
                "attempt": session.attempt_number,
                "aggregate_score": aggregate,
                "weak_areas": weak_areas,
            }),
        );

        if session.is_terminal() {
            self.generate_and_dispatch(&config, tenant, &session)?;
        }

        Ok(EvaluationOutcome {
            passed,
            aggregate_score: aggregate,
            weak_areas,
            action,
        })
    }

    /// Move a failed session into remediation.
    ///
    /// The attempt number increments here, per the transition table. Modules
    /// that scored below the pass threshold are reset for re-work (answers
    /// and score cleared, content retained); passing modules stand.
    pub fn start_remediation(
        &self,
        tenant: &TenantId,
        employee: &EmployeeId,
        session_id: SessionId,
    ) -> Result<TrainingSession, AttestError> {
        let config = self.tenant_config(tenant)?;
        let session = self.load_owned_session(tenant, employee, session_id)?;

        let transition = apply_session_event(session.status, SessionEvent::RemediationStarted)?;
        let mut session = session;
        session.status = transition.to;
        if transition.increments_attempt {
            session.attempt_number += 1;
        }

        let threshold = config.training.pass_threshold;
        let mut reset = Vec::new();
        for module in self
            .sessions
            .modules_for_session(tenant, session_id)
            .map_err(map_store_error)?
        {
            if module.module_score.is_some_and(|s| s < threshold) {
                let mut module = module;
                module.reset_for_remediation();
                reset.push(module);
            }
        }

        let session = self
            .sessions
            .update_with_modules(&session, &reset)
            .map_err(map_store_error)?;
        self.audit(
            tenant,
            AuditEventType::RemediationStarted,
            Some(employee.clone()),
            json!({
                "session_id": session_id.to_string(),
                "attempt": session.attempt_number,
                "modules_reset": reset.len(),
            }),
        );
        Ok(session)
    }

    /// Abandon an active session. Terminal, with unknown pass outcome;
    /// evidence is still generated and dispatched.
    pub fn abandon_session(
        &self,
        tenant: &TenantId,
        employee: &EmployeeId,
        session_id: SessionId,
    ) -> Result<TrainingSession, AttestError> {
        let config = self.tenant_config(tenant)?;
        let session = self.load_owned_session(tenant, employee, session_id)?;

        let transition = apply_session_event(session.status, SessionEvent::SessionAbandoned)?;
        let mut session = session;
        session.status = transition.to;
        session.completed_at = Some(Utc::now());
        let session = self.sessions.update(&session).map_err(map_store_error)?;

        self.audit(
            tenant,
            AuditEventType::SessionAbandoned,
            Some(employee.clone()),
            json!({ "session_id": session_id.to_string() }),
        );
        self.generate_and_dispatch(&config, tenant, &session)?;
        Ok(session)
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub fn session_overview(
        &self,
        tenant: &TenantId,
        employee: &EmployeeId,
        session_id: SessionId,
    ) -> Result<SessionOverview, AttestError> {
        let session = self.load_owned_session(tenant, employee, session_id)?;
        let modules = self
            .sessions
            .modules_for_session(tenant, session_id)
            .map_err(map_store_error)?;
        Ok(SessionOverview { session, modules })
    }

    /// Evidence and upload-ledger state for a session; `None` until evidence
    /// exists. This is how compliance delivery becomes observable.
    pub fn upload_status(
        &self,
        tenant: &TenantId,
        employee: &EmployeeId,
        session_id: SessionId,
    ) -> Result<Option<DeliveryStatus>, AttestError> {
        self.load_owned_session(tenant, employee, session_id)?;
        let Some(evidence) = self.evidence.find_for_session(tenant, session_id)? else {
            return Ok(None);
        };

        let config = self.tenant_config(tenant)?;
        let upload = match config.compliance {
            Some(settings) => self
                .uploads
                .find_for_evidence(tenant, evidence.id, &settings.provider)
                .map_err(map_store_error)?,
            None => None,
        };
        Ok(Some(DeliveryStatus {
            evidence_id: evidence.id,
            content_hash: evidence.content_hash,
            generated_at: evidence.generated_at,
            upload,
        }))
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn tenant_config(&self, tenant: &TenantId) -> Result<TenantConfig, AttestError> {
        self.config.tenant_config(tenant).map_err(map_config_error)
    }

    fn load_owned_session(
        &self,
        tenant: &TenantId,
        employee: &EmployeeId,
        session_id: SessionId,
    ) -> Result<TrainingSession, AttestError> {
        let session = self
            .sessions
            .get(tenant, session_id)
            .map_err(map_store_error)?;
        if &session.employee_id != employee {
            return Err(AttestError::unauthorized(format!(
                "session {session_id} does not belong to employee {employee}"
            )));
        }
        Ok(session)
    }

    fn ensure_active(session: &TrainingSession) -> Result<(), AttestError> {
        match session.status {
            SessionStatus::InProgress | SessionStatus::InRemediation => Ok(()),
            status => Err(AttestError::conflict(format!(
                "session {} is {status}; learning actions require an active session",
                session.id
            ))),
        }
    }

    fn module_at(
        &self,
        tenant: &TenantId,
        session_id: SessionId,
        module_index: u32,
    ) -> Result<TrainingModule, AttestError> {
        self.sessions
            .modules_for_session(tenant, session_id)
            .map_err(map_store_error)?
            .into_iter()
            .find(|module| module.module_index == module_index)
            .ok_or_else(|| {
                AttestError::not_found(format!(
                    "module {module_index} of session {session_id}"
                ))
            })
    }

    /// Best-effort rollback after content generation fails, so the request
    /// can be retried from `locked`.
    fn reset_to_locked(&self, module: &TrainingModule) {
        let mut rollback = module.clone();
        rollback.status = ModuleStatus::Locked;
        if let Err(e) = self.sessions.update_module(&rollback) {
            tracing::warn!(
                module = %module.id,
                "failed to roll module back to locked after content failure: {e}"
            );
        }
    }

    fn generate_and_dispatch(
        &self,
        config: &TenantConfig,
        tenant: &TenantId,
        session: &TrainingSession,
    ) -> Result<(), AttestError> {
        let evidence = self
            .evidence
            .generate_for_session(config, tenant, session.id)?;
        self.audit(
            tenant,
            AuditEventType::EvidenceGenerated,
            Some(session.employee_id.clone()),
            json!({
                "session_id": session.id.to_string(),
                "evidence_id": evidence.id.to_string(),
                "content_hash": evidence.content_hash,
            }),
        );
        self.orchestrator
            .spawn(tenant.clone(), evidence.id, session.id);
        Ok(())
    }

    fn audit(
        &self,
        tenant: &TenantId,
        event_type: AuditEventType,
        employee: Option<EmployeeId>,
        metadata: serde_json::Value,
    ) {
        let event = AuditEvent::new(event_type, employee, metadata);
        if let Err(e) = self.audit.log(tenant, event) {
            tracing::warn!(%tenant, "failed to write audit event: {e}");
        }
    }
}
