//! Session and module lifecycle transition functions.
//!
//! Both machines are pure and total over their documented tables: every
//! (state, event) pair not listed is a [`StateTransitionError`], never a
//! silent no-op. Callers persist the returned target state through the
//! version-checked repository write; nothing here mutates anything.

use thiserror::Error;

use attest_types::{ModuleStatus, SessionStatus};

/// Which machine rejected the transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionScope {
    Session,
    Module,
}

impl TransitionScope {
    const fn label(self) -> &'static str {
        match self {
            Self::Session => "session",
            Self::Module => "module",
        }
    }
}

/// A (state, event) pair outside the transition table.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("event '{event}' is not valid in {} state '{from}'", .scope.label())]
pub struct StateTransitionError {
    scope: TransitionScope,
    from: &'static str,
    event: &'static str,
}

impl StateTransitionError {
    #[must_use]
    pub const fn scope(&self) -> TransitionScope {
        self.scope
    }

    #[must_use]
    pub const fn from_state(&self) -> &'static str {
        self.from
    }

    #[must_use]
    pub const fn event(&self) -> &'static str {
        self.event
    }
}

// ============================================================================
// Session machine
// ============================================================================

/// Events that drive the session lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    CurriculumReady,
    AllModulesScored,
    EvaluationPassed,
    EvaluationFailed,
    EvaluationExhausted,
    RemediationStarted,
    SessionAbandoned,
}

impl SessionEvent {
    #[must_use]
    pub const fn as_key(self) -> &'static str {
        match self {
            Self::CurriculumReady => "curriculum-ready",
            Self::AllModulesScored => "all-modules-scored",
            Self::EvaluationPassed => "evaluation-passed",
            Self::EvaluationFailed => "evaluation-failed",
            Self::EvaluationExhausted => "evaluation-exhausted",
            Self::RemediationStarted => "remediation-started",
            Self::SessionAbandoned => "session-abandoned",
        }
    }
}

/// Accepted session transition: the target status plus whether the attempt
/// counter advances. The attempt number increments exactly once, on entering
/// remediation; the repository write applies it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionTransition {
    pub to: SessionStatus,
    pub increments_attempt: bool,
}

impl SessionTransition {
    const fn to(status: SessionStatus) -> Self {
        Self {
            to: status,
            increments_attempt: false,
        }
    }
}

/// Apply one event to a session status.
///
/// | Event | From | To |
/// |---|---|---|
/// | curriculum-ready | curriculum-generating | in-progress |
/// | all-modules-scored | in-progress, in-remediation | evaluating |
/// | evaluation-passed | evaluating | passed |
/// | evaluation-failed | evaluating | failed |
/// | evaluation-exhausted | evaluating | exhausted |
/// | remediation-started | failed | in-remediation (attempt +1) |
/// | session-abandoned | in-progress, in-remediation | abandoned |
pub fn apply_session_event(
    status: SessionStatus,
    event: SessionEvent,
) -> Result<SessionTransition, StateTransitionError> {
    use SessionStatus as S;

    let transition = match (status, event) {
        (S::CurriculumGenerating, SessionEvent::CurriculumReady) => {
            SessionTransition::to(S::InProgress)
        }
        (S::InProgress | S::InRemediation, SessionEvent::AllModulesScored) => {
            SessionTransition::to(S::Evaluating)
        }
        (S::Evaluating, SessionEvent::EvaluationPassed) => SessionTransition::to(S::Passed),
        (S::Evaluating, SessionEvent::EvaluationFailed) => SessionTransition::to(S::Failed),
        (S::Evaluating, SessionEvent::EvaluationExhausted) => SessionTransition::to(S::Exhausted),
        (S::Failed, SessionEvent::RemediationStarted) => SessionTransition {
            to: S::InRemediation,
            increments_attempt: true,
        },
        (S::InProgress | S::InRemediation, SessionEvent::SessionAbandoned) => {
            SessionTransition::to(S::Abandoned)
        }
        (from, event) => {
            return Err(StateTransitionError {
                scope: TransitionScope::Session,
                from: from.as_key(),
                event: event.as_key(),
            });
        }
    };

    Ok(transition)
}

// ============================================================================
// Module machine
// ============================================================================

/// Events that drive a module's progression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleEvent {
    ContentRequested,
    ContentReady,
    /// A scenario answer was accepted; `is_last` when it completes the
    /// module's scenario list.
    ScenarioAnswered { is_last: bool },
    /// A quiz answer was accepted; `is_last` triggers scoring.
    QuizAnswered { is_last: bool },
}

impl ModuleEvent {
    #[must_use]
    pub const fn as_key(self) -> &'static str {
        match self {
            Self::ContentRequested => "content-requested",
            Self::ContentReady => "content-ready",
            Self::ScenarioAnswered { .. } => "scenario-answered",
            Self::QuizAnswered { .. } => "quiz-answered",
        }
    }
}

/// Apply one event to a module status.
///
/// Progression: locked → content-generating → learning → scenario-active
/// (first scenario answer) → quiz-active (last scenario answer) → scored
/// (last quiz answer). A single-scenario module jumps learning → quiz-active
/// because its first answer is also its last.
pub fn apply_module_event(
    status: ModuleStatus,
    event: ModuleEvent,
) -> Result<ModuleStatus, StateTransitionError> {
    use ModuleStatus as M;

    let next = match (status, event) {
        (M::Locked, ModuleEvent::ContentRequested) => M::ContentGenerating,
        (M::ContentGenerating, ModuleEvent::ContentReady) => M::Learning,
        (M::Learning | M::ScenarioActive, ModuleEvent::ScenarioAnswered { is_last: false }) => {
            M::ScenarioActive
        }
        (M::Learning | M::ScenarioActive, ModuleEvent::ScenarioAnswered { is_last: true }) => {
            M::QuizActive
        }
        (M::QuizActive, ModuleEvent::QuizAnswered { is_last: false }) => M::QuizActive,
        (M::QuizActive, ModuleEvent::QuizAnswered { is_last: true }) => M::Scored,
        (from, event) => {
            return Err(StateTransitionError {
                scope: TransitionScope::Module,
                from: from.as_key(),
                event: event.as_key(),
            });
        }
    };

    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_SESSION_STATUSES: [SessionStatus; 8] = [
        SessionStatus::CurriculumGenerating,
        SessionStatus::InProgress,
        SessionStatus::InRemediation,
        SessionStatus::Evaluating,
        SessionStatus::Passed,
        SessionStatus::Failed,
        SessionStatus::Exhausted,
        SessionStatus::Abandoned,
    ];

    const ALL_SESSION_EVENTS: [SessionEvent; 7] = [
        SessionEvent::CurriculumReady,
        SessionEvent::AllModulesScored,
        SessionEvent::EvaluationPassed,
        SessionEvent::EvaluationFailed,
        SessionEvent::EvaluationExhausted,
        SessionEvent::RemediationStarted,
        SessionEvent::SessionAbandoned,
    ];

    fn allowed(status: SessionStatus, event: SessionEvent) -> Option<SessionStatus> {
        use SessionEvent as E;
        use SessionStatus as S;
        match (status, event) {
            (S::CurriculumGenerating, E::CurriculumReady) => Some(S::InProgress),
            (S::InProgress | S::InRemediation, E::AllModulesScored) => Some(S::Evaluating),
            (S::Evaluating, E::EvaluationPassed) => Some(S::Passed),
            (S::Evaluating, E::EvaluationFailed) => Some(S::Failed),
            (S::Evaluating, E::EvaluationExhausted) => Some(S::Exhausted),
            (S::Failed, E::RemediationStarted) => Some(S::InRemediation),
            (S::InProgress | S::InRemediation, E::SessionAbandoned) => Some(S::Abandoned),
            _ => None,
        }
    }

    #[test]
    fn session_table_matches_documentation() {
        for status in ALL_SESSION_STATUSES {
            for event in ALL_SESSION_EVENTS {
                match (apply_session_event(status, event), allowed(status, event)) {
                    (Ok(transition), Some(expected)) => assert_eq!(transition.to, expected),
                    (Err(_), None) => {}
                    (Ok(transition), None) => {
                        panic!("{status} + {} unexpectedly allowed -> {}", event.as_key(), transition.to)
                    }
                    (Err(err), Some(_)) => {
                        panic!("{status} + {} unexpectedly rejected: {err}", event.as_key())
                    }
                }
            }
        }
    }

    #[test]
    fn every_unlisted_pair_is_a_typed_error() {
        // Terminal statuses accept nothing.
        for status in [
            SessionStatus::Passed,
            SessionStatus::Exhausted,
            SessionStatus::Abandoned,
        ] {
            for event in ALL_SESSION_EVENTS {
                let err = apply_session_event(status, event).unwrap_err();
                assert_eq!(err.scope(), TransitionScope::Session);
                assert_eq!(err.from_state(), status.as_key());
                assert_eq!(err.event(), event.as_key());
            }
        }
    }

    #[test]
    fn only_remediation_increments_attempt() {
        for status in ALL_SESSION_STATUSES {
            for event in ALL_SESSION_EVENTS {
                if let Ok(transition) = apply_session_event(status, event) {
                    assert_eq!(
                        transition.increments_attempt,
                        event == SessionEvent::RemediationStarted,
                        "{status} + {}",
                        event.as_key()
                    );
                }
            }
        }
    }

    #[test]
    fn abandonment_requires_an_active_session() {
        assert!(apply_session_event(
            SessionStatus::CurriculumGenerating,
            SessionEvent::SessionAbandoned
        )
        .is_err());
        assert!(
            apply_session_event(SessionStatus::Evaluating, SessionEvent::SessionAbandoned)
                .is_err()
        );
        assert_eq!(
            apply_session_event(SessionStatus::InProgress, SessionEvent::SessionAbandoned)
                .unwrap()
                .to,
            SessionStatus::Abandoned
        );
    }

    #[test]
    fn module_happy_path() {
        let mut status = ModuleStatus::Locked;
        for event in [
            ModuleEvent::ContentRequested,
            ModuleEvent::ContentReady,
            ModuleEvent::ScenarioAnswered { is_last: false },
            ModuleEvent::ScenarioAnswered { is_last: true },
            ModuleEvent::QuizAnswered { is_last: false },
            ModuleEvent::QuizAnswered { is_last: true },
        ] {
            status = apply_module_event(status, event).unwrap();
        }
        assert_eq!(status, ModuleStatus::Scored);
    }

    #[test]
    fn single_scenario_module_skips_scenario_active() {
        let status = apply_module_event(
            ModuleStatus::Learning,
            ModuleEvent::ScenarioAnswered { is_last: true },
        )
        .unwrap();
        assert_eq!(status, ModuleStatus::QuizActive);
    }

    #[test]
    fn module_rejects_out_of_order_events() {
        // Quiz before scenarios are done.
        assert!(apply_module_event(
            ModuleStatus::Learning,
            ModuleEvent::QuizAnswered { is_last: false }
        )
        .is_err());
        // Scenario answer after the quiz started.
        assert!(apply_module_event(
            ModuleStatus::QuizActive,
            ModuleEvent::ScenarioAnswered { is_last: false }
        )
        .is_err());
        // Scored is final.
        for event in [
            ModuleEvent::ContentRequested,
            ModuleEvent::ContentReady,
            ModuleEvent::ScenarioAnswered { is_last: true },
            ModuleEvent::QuizAnswered { is_last: true },
        ] {
            let err = apply_module_event(ModuleStatus::Scored, event).unwrap_err();
            assert_eq!(err.scope(), TransitionScope::Module);
        }
    }
}
