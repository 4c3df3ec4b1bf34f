//! The per-module record and its content payloads.

use serde::{Deserialize, Serialize};

use crate::ids::{ModuleId, SessionId, TenantId};
use crate::session::ModuleOutline;
use crate::status::ModuleStatus;

/// One scenario exercise presented to the learner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioPrompt {
    pub prompt: String,
    /// Situational framing shown alongside the prompt.
    pub context: String,
}

/// One multiple-choice quiz question.
///
/// `correct_option` is answer-key material: it never leaves the module
/// record and is stripped when evidence is assembled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizQuestion {
    pub question: String,
    pub options: Vec<String>,
    pub correct_option: String,
}

/// Generated learning material for one module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleContent {
    pub learning_points: Vec<String>,
    pub scenarios: Vec<ScenarioPrompt>,
    pub quiz: Vec<QuizQuestion>,
}

/// A learner's evaluated answer to one scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioResponse {
    pub scenario_index: u32,
    pub response_text: String,
    /// 0..=1, assigned by the evaluation capability.
    pub score: f64,
    pub rationale: String,
}

/// A learner's answer to one quiz question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizAnswer {
    pub question_index: u32,
    pub selected_option: String,
    /// 0.0 or 1.0 for multiple choice.
    pub score: f64,
}

/// One module of a training session.
///
/// Created when the curriculum is confirmed and never deleted. The module
/// score is present if and only if the status is `Scored`; that pairing is
/// established at the scoring transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingModule {
    pub id: ModuleId,
    pub tenant_id: TenantId,
    pub session_id: SessionId,
    /// 0-based position, unique within the session.
    pub module_index: u32,
    pub title: String,
    pub topic_area: String,
    pub job_expectation_indices: Vec<u32>,
    pub status: ModuleStatus,
    pub content: Option<ModuleContent>,
    pub scenario_responses: Vec<ScenarioResponse>,
    pub quiz_answers: Vec<QuizAnswer>,
    pub module_score: Option<f64>,
    /// Optimistic-lock counter maintained by the store.
    pub version: u64,
}

impl TrainingModule {
    /// Create a locked module from a curriculum outline entry.
    #[must_use]
    pub fn from_outline(
        tenant_id: TenantId,
        session_id: SessionId,
        module_index: u32,
        outline: &ModuleOutline,
    ) -> Self {
        Self {
            id: ModuleId::generate(),
            tenant_id,
            session_id,
            module_index,
            title: outline.title.clone(),
            topic_area: outline.topic_area.clone(),
            job_expectation_indices: outline.job_expectation_indices.clone(),
            status: ModuleStatus::Locked,
            content: None,
            scenario_responses: Vec::new(),
            quiz_answers: Vec::new(),
            module_score: None,
            version: 0,
        }
    }

    /// Clear answers and score for a remediation pass. Content is retained
    /// so the learner reworks the same material.
    pub fn reset_for_remediation(&mut self) {
        self.scenario_responses.clear();
        self.quiz_answers.clear();
        self.module_score = None;
        self.status = ModuleStatus::Learning;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outline() -> ModuleOutline {
        ModuleOutline {
            title: "Ladder safety".to_owned(),
            topic_area: "equipment-handling".to_owned(),
            job_expectation_indices: vec![0, 2],
        }
    }

    #[test]
    fn from_outline_starts_locked() {
        let module = TrainingModule::from_outline(
            TenantId::new("acme"),
            SessionId::generate(),
            1,
            &outline(),
        );
        assert_eq!(module.status, ModuleStatus::Locked);
        assert_eq!(module.module_index, 1);
        assert!(module.content.is_none());
        assert!(module.module_score.is_none());
    }

    #[test]
    fn reset_for_remediation_retains_content() {
        let mut module = TrainingModule::from_outline(
            TenantId::new("acme"),
            SessionId::generate(),
            0,
            &outline(),
        );
        module.content = Some(ModuleContent {
            learning_points: vec!["Inspect before use".to_owned()],
            scenarios: Vec::new(),
            quiz: Vec::new(),
        });
        module.status = ModuleStatus::Scored;
        module.module_score = Some(0.4);
        module.quiz_answers.push(QuizAnswer {
            question_index: 0,
            selected_option: "a".to_owned(),
            score: 0.0,
        });

        module.reset_for_remediation();

        assert_eq!(module.status, ModuleStatus::Learning);
        assert!(module.module_score.is_none());
        assert!(module.quiz_answers.is_empty());
        assert!(module.scenario_responses.is_empty());
        assert!(module.content.is_some());
    }
}
