//! Escalation Controller — deterministic ladder from AI answer to human interpreter
//!
//! Consumes one analysis outcome per turn and decides what the patient sees.
//! No model calls happen here; all decisions are deterministic.
//!
//! # Escalation Ladder
//!
//! ```text
//! Normal (count 0)
//!     │  not understood / failed
//!     ▼
//! FirstFailure (count 1) — ask the patient to rephrase
//!     │  not understood / failed
//!     ▼
//! Escalated (count ≥ 2) — hand off to the human interpreter line
//!
//! Any understood turn → Normal. Failures never expire on their own.
//! ```
//!
//! Fatal configuration errors bypass the ladder entirely and are returned to
//! the caller unchanged.

use crate::error::AnalysisError;
use crate::result::TriageResult;
use crate::session::ConversationSession;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

pub const FIRST_FAILURE_MESSAGE: &str = "Sorry, I can't fully understand your conversation. Can you please repeat this or try describing your symptoms in a different way?";

pub const HANDOFF_MESSAGE: &str = "Sorry, I still can't understand the conversation completely. I am now going to connect you to our Human Interpreter services for better assistance.";

/// Shown when an understood result carries a blank conversational response.
pub const GENERIC_ACKNOWLEDGEMENT: &str = "I've analyzed your symptoms and here's my assessment:";

/// Position on the escalation ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscalationState {
    Normal,
    FirstFailure,
    Escalated,
}

impl std::fmt::Display for EscalationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Normal => write!(f, "normal"),
            Self::FirstFailure => write!(f, "first_failure"),
            Self::Escalated => write!(f, "escalated"),
        }
    }
}

/// Configuration for the Escalation Controller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EscalationConfig {
    /// Minimum confidence for a result to count as understood
    pub confidence_threshold: u8,
    /// Consecutive failures that trigger interpreter handoff
    pub escalate_after: u32,
    /// Whether a content-filtered message counts as a failure
    pub count_content_filtered: bool,
}

impl Default for EscalationConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 70,
            escalate_after: 2,
            count_content_filtered: true,
        }
    }
}

/// One turn's analysis outcome, classified for the ladder.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnOutcome {
    /// Confident, AI-verified result
    Understood(TriageResult),
    /// A result exists but is low-confidence or flagged as a fallback
    NotUnderstood(TriageResult),
    /// The analysis raised a recoverable error
    Failed(AnalysisError),
}

impl TurnOutcome {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Understood(_) => "understood",
            Self::NotUnderstood(_) => "not_understood",
            Self::Failed(_) => "failed",
        }
    }
}

/// Decision produced by the Escalation Controller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EscalationDecision {
    /// Text to show the patient
    pub message: String,
    /// Whether the turn was understood
    pub understood: bool,
    /// Ladder position after this turn
    pub state: EscalationState,
    /// Consecutive failures after this turn
    pub failure_count: u32,
    /// Whether the interpreter handoff must fire now
    pub trigger_handoff: bool,
    /// The analysis behind the turn, when one exists
    pub analysis: Option<TriageResult>,
    /// Error code for failed turns
    pub error_code: Option<String>,
}

/// The Escalation Controller — deterministic state machine
#[derive(Debug, Clone, Default)]
pub struct EscalationController {
    config: EscalationConfig,
}

impl EscalationController {
    /// Create a new controller with default config
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with custom config
    pub fn with_config(config: EscalationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EscalationConfig {
        &self.config
    }

    /// Ladder position for a count under this controller's threshold.
    pub fn state_for(&self, count: u32) -> EscalationState {
        if count == 0 {
            EscalationState::Normal
        } else if count < self.config.escalate_after {
            EscalationState::FirstFailure
        } else {
            EscalationState::Escalated
        }
    }

    /// Classify an analysis result. Fatal errors come back as `Err` unchanged.
    pub fn classify(
        &self,
        analysis: Result<TriageResult, AnalysisError>,
    ) -> Result<TurnOutcome, AnalysisError> {
        match analysis {
            Err(err) if err.is_fatal() => Err(err),
            Err(err) => Ok(TurnOutcome::Failed(err)),
            Ok(result)
                if result.confidence >= self.config.confidence_threshold
                    && !result.fallback_activated() =>
            {
                Ok(TurnOutcome::Understood(result))
            }
            Ok(result) => Ok(TurnOutcome::NotUnderstood(result)),
        }
    }

    /// Classify and evaluate in one step.
    pub fn process(
        &self,
        session: &mut ConversationSession,
        analysis: Result<TriageResult, AnalysisError>,
    ) -> Result<EscalationDecision, AnalysisError> {
        let outcome = self.classify(analysis)?;
        Ok(self.evaluate(session, outcome))
    }

    /// Apply one turn to the session's counter and decide the message.
    pub fn evaluate(
        &self,
        session: &mut ConversationSession,
        outcome: TurnOutcome,
    ) -> EscalationDecision {
        let session_id = session.short_id();

        let (analysis, error_code) = match outcome {
            TurnOutcome::Understood(result) => {
                let previous = session.failure_count();
                session.record_understood();
                if previous > 0 {
                    info!(
                        session_id = %session_id,
                        previous_failures = previous,
                        "Understood turn reset escalation ladder"
                    );
                }
                let message = if result.conversational_response.trim().is_empty() {
                    GENERIC_ACKNOWLEDGEMENT.to_string()
                } else {
                    result.conversational_response.clone()
                };
                return EscalationDecision {
                    message,
                    understood: true,
                    state: EscalationState::Normal,
                    failure_count: 0,
                    trigger_handoff: false,
                    analysis: Some(result),
                    error_code: None,
                };
            }
            TurnOutcome::NotUnderstood(result) => {
                info!(
                    session_id = %session_id,
                    confidence = result.confidence,
                    fallback = result.fallback_activated(),
                    "Analysis not trusted"
                );
                (Some(result), None)
            }
            TurnOutcome::Failed(err) => {
                if matches!(err, AnalysisError::ContentFiltered { .. })
                    && !self.config.count_content_filtered
                {
                    return self.rephrase_without_counting(session, &err);
                }
                warn!(
                    session_id = %session_id,
                    code = err.code(),
                    error = %err,
                    "Analysis failed"
                );
                (None, Some(err.code().to_string()))
            }
        };

        let count = session.record_failure();
        let state = self.state_for(count);
        session.set_escalation_state(state);
        let escalated = state == EscalationState::Escalated;
        let trigger_handoff = escalated && session.mark_handoff();

        info!(
            session_id = %session_id,
            count,
            state = %state,
            trigger_handoff,
            "Escalation ladder advanced"
        );

        EscalationDecision {
            message: if escalated {
                HANDOFF_MESSAGE.to_string()
            } else {
                FIRST_FAILURE_MESSAGE.to_string()
            },
            understood: false,
            state,
            failure_count: count,
            trigger_handoff,
            analysis,
            error_code,
        }
    }

    fn rephrase_without_counting(
        &self,
        session: &ConversationSession,
        err: &AnalysisError,
    ) -> EscalationDecision {
        info!(
            session_id = %session.short_id(),
            count = session.failure_count(),
            "Content filtered; asking to rephrase without advancing ladder"
        );
        EscalationDecision {
            message: FIRST_FAILURE_MESSAGE.to_string(),
            understood: false,
            state: self.state_for(session.failure_count()),
            failure_count: session.failure_count(),
            trigger_handoff: false,
            analysis: None,
            error_code: Some(err.code().to_string()),
        }
    }
}
