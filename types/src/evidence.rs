//! The immutable evidence record assembled from a terminal session.
//!
//! Evidence is tamper-evident, not encrypted: the content hash is computed
//! over a canonical serialization of the body, so any field mutation changes
//! the hash and recomputation is reproducible from the stored body alone.
//! No update or delete operation exists anywhere for this record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{EmployeeId, EvidenceId, RoleProfileId, SessionId, TenantId};
use crate::module::{QuizQuestion, TrainingModule};

/// Bumped on breaking changes to the evidence body layout.
pub const EVIDENCE_SCHEMA_VERSION: u32 = 1;

/// Tri-state session outcome. Abandoned sessions never reached evaluation,
/// so their pass state is unknown rather than false.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PassOutcome {
    Passed,
    Failed,
    Unknown,
}

/// Identity and timing facts about the session the evidence describes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: SessionId,
    pub employee_id: EmployeeId,
    pub attempt_number: u32,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Binds the record to the exact policy configuration in force.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyAttestation {
    pub policy_hash: String,
    pub role_profile_id: RoleProfileId,
    pub role_profile_version: u32,
    pub app_version: String,
    pub pass_threshold: f64,
    pub max_attempts: u32,
}

/// A scenario answer as it appears in evidence: the employee's words, the
/// assigned score, and the evaluator's rationale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioResponseEvidence {
    pub scenario_index: u32,
    pub response_text: String,
    pub score: f64,
    pub rationale: String,
}

/// A quiz answer as it appears in evidence. The objectively correct option
/// is answer-key metadata and is deliberately absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizAnswerEvidence {
    pub question_index: u32,
    pub question: String,
    pub selected_option: String,
    pub score: f64,
}

/// Per-module evidence, stripped of answer-key metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleEvidence {
    pub module_index: u32,
    pub title: String,
    pub topic_area: String,
    pub scenario_responses: Vec<ScenarioResponseEvidence>,
    pub quiz_answers: Vec<QuizAnswerEvidence>,
    pub module_score: Option<f64>,
}

impl ModuleEvidence {
    /// Project a module record into its evidence form.
    ///
    /// Quiz questions are joined to answers by index so the evidence shows
    /// what was asked and what the employee chose, while `correct_option`
    /// stays behind.
    #[must_use]
    pub fn from_module(module: &TrainingModule) -> Self {
        let questions: &[QuizQuestion] = module
            .content
            .as_ref()
            .map(|content| content.quiz.as_slice())
            .unwrap_or_default();

        let quiz_answers = module
            .quiz_answers
            .iter()
            .map(|answer| QuizAnswerEvidence {
                question_index: answer.question_index,
                question: questions
                    .get(answer.question_index as usize)
                    .map(|q| q.question.clone())
                    .unwrap_or_default(),
                selected_option: answer.selected_option.clone(),
                score: answer.score,
            })
            .collect();

        let scenario_responses = module
            .scenario_responses
            .iter()
            .map(|response| ScenarioResponseEvidence {
                scenario_index: response.scenario_index,
                response_text: response.response_text.clone(),
                score: response.score,
                rationale: response.rationale.clone(),
            })
            .collect();

        Self {
            module_index: module.module_index,
            title: module.title.clone(),
            topic_area: module.topic_area.clone(),
            scenario_responses,
            quiz_answers,
            module_score: module.module_score,
        }
    }
}

/// Final result of the attempt chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomeSummary {
    pub outcome: PassOutcome,
    pub aggregate_score: Option<f64>,
    pub weak_areas: Vec<String>,
    /// Module scores in module-index order; `None` for unscored modules of
    /// abandoned sessions.
    pub module_scores: Vec<Option<f64>>,
}

/// The hashed evidence payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceBody {
    pub session: SessionSummary,
    pub policy: PolicyAttestation,
    pub modules: Vec<ModuleEvidence>,
    pub outcome: OutcomeSummary,
}

/// The persisted evidence record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingEvidence {
    pub id: EvidenceId,
    pub tenant_id: TenantId,
    pub session_id: SessionId,
    pub employee_id: EmployeeId,
    pub schema_version: u32,
    pub body: EvidenceBody,
    /// 64 lowercase hex chars of a 256-bit digest over the canonical body.
    pub content_hash: String,
    pub generated_at: DateTime<Utc>,
}
