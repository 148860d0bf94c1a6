//! Conversation session — ordered turn log plus the escalation counter
//!
//! The session is owned by exactly one turn-submission handler at a time.
//! Every mutating method takes `&mut self`, so two in-flight submissions
//! against the same session cannot both hold it. The failure counter is only
//! changed by the escalation controller, after an analysis has resolved.

use crate::escalation::EscalationState;
use crate::result::TriageResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Number of prior turns handed to the analysis client as context.
pub const HISTORY_WINDOW: usize = 6;

/// Who produced a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Bot,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Bot => write!(f, "bot"),
        }
    }
}

/// One message in the conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    /// Monotonic per session, starting at 1
    pub id: u64,
    pub role: Role,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    /// Preferred-language hint the patient had selected
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    /// Analysis behind a bot turn, when there was one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis: Option<TriageResult>,
    /// Bot turn that carries an escalation message
    #[serde(default)]
    pub understanding_failure: bool,
}

/// Session-only conversation state. Nothing is persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationSession {
    id: Uuid,
    started_at: DateTime<Utc>,
    turns: Vec<Turn>,
    next_turn_id: u64,
    consecutive_failure_count: u32,
    /// Ladder position as last decided by the escalation controller
    escalation_state: EscalationState,
    handoff_triggered: bool,
}

impl ConversationSession {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            started_at: Utc::now(),
            turns: Vec::new(),
            next_turn_id: 1,
            consecutive_failure_count: 0,
            escalation_state: EscalationState::Normal,
            handoff_triggered: false,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// First 8 characters of the session id, for log lines.
    pub fn short_id(&self) -> String {
        self.id.to_string()[..8].to_string()
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// The last `n` turns in chronological order.
    pub fn recent_history(&self, n: usize) -> &[Turn] {
        let start = self.turns.len().saturating_sub(n);
        &self.turns[start..]
    }

    pub fn failure_count(&self) -> u32 {
        self.consecutive_failure_count
    }

    /// Ladder position after the most recent evaluated turn.
    pub fn escalation_state(&self) -> EscalationState {
        self.escalation_state
    }

    /// Whether the interpreter handoff already fired for the current escalation.
    pub fn handoff_triggered(&self) -> bool {
        self.handoff_triggered
    }

    pub fn append_user(&mut self, text: impl Into<String>, language: impl Into<String>) -> u64 {
        self.push(Role::User, text.into(), Some(language.into()), None, false)
    }

    pub fn append_bot(
        &mut self,
        text: impl Into<String>,
        analysis: Option<TriageResult>,
        understanding_failure: bool,
    ) -> u64 {
        self.push(Role::Bot, text.into(), None, analysis, understanding_failure)
    }

    /// Id of the most recent patient turn.
    pub fn latest_user_turn_id(&self) -> Option<u64> {
        self.turns
            .iter()
            .rev()
            .find(|t| t.role == Role::User)
            .map(|t| t.id)
    }

    /// Whether a reply computed for `user_turn_id` still answers the latest
    /// patient turn. Callers abandoning stale replies compare with this
    /// instead of cancelling the call.
    pub fn is_current(&self, user_turn_id: u64) -> bool {
        self.latest_user_turn_id() == Some(user_turn_id)
    }

    /// "New conversation": drop all turns and escalation state.
    pub fn reset(&mut self) {
        tracing::info!(session_id = %self.short_id(), turns = self.turns.len(), "Session reset");
        *self = Self::new();
    }

    pub(crate) fn record_understood(&mut self) {
        self.consecutive_failure_count = 0;
        self.escalation_state = EscalationState::Normal;
        self.handoff_triggered = false;
    }

    pub(crate) fn record_failure(&mut self) -> u32 {
        self.consecutive_failure_count = self.consecutive_failure_count.saturating_add(1);
        self.consecutive_failure_count
    }

    pub(crate) fn set_escalation_state(&mut self, state: EscalationState) {
        self.escalation_state = state;
    }

    /// Returns `true` only the first time for the current escalation.
    pub(crate) fn mark_handoff(&mut self) -> bool {
        !std::mem::replace(&mut self.handoff_triggered, true)
    }

    fn push(
        &mut self,
        role: Role,
        text: String,
        language: Option<String>,
        analysis: Option<TriageResult>,
        understanding_failure: bool,
    ) -> u64 {
        let id = self.next_turn_id;
        self.next_turn_id += 1;
        self.turns.push(Turn {
            id,
            role,
            text,
            timestamp: Utc::now(),
            language,
            analysis,
            understanding_failure,
        });
        id
    }
}

impl Default for ConversationSession {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_turn_ids_are_monotonic() {
        let mut session = ConversationSession::new();
        let a = session.append_user("hello", "english");
        let b = session.append_bot("hi", None, false);
        let c = session.append_user("fever", "english");
        assert_eq!((a, b, c), (1, 2, 3));
        assert_eq!(session.turns()[1].role, Role::Bot);
        assert_eq!(session.turns()[0].language.as_deref(), Some("english"));
    }

    #[test]
    fn test_recent_history_caps_and_keeps_order() {
        let mut session = ConversationSession::new();
        for i in 0..10 {
            session.append_user(format!("message {i}"), "english");
        }
        let recent = session.recent_history(HISTORY_WINDOW);
        assert_eq!(recent.len(), 6);
        assert_eq!(recent[0].text, "message 4");
        assert_eq!(recent[5].text, "message 9");
        assert_eq!(session.recent_history(50).len(), 10);
    }

    #[test]
    fn test_is_current_tracks_latest_user_turn() {
        let mut session = ConversationSession::new();
        assert_eq!(session.latest_user_turn_id(), None);
        let first = session.append_user("one", "english");
        session.append_bot("reply", None, false);
        assert!(session.is_current(first));
        let second = session.append_user("two", "english");
        assert!(!session.is_current(first));
        assert!(session.is_current(second));
    }

    #[test]
    fn test_counter_and_handoff_flag() {
        let mut session = ConversationSession::new();
        assert_eq!(session.record_failure(), 1);
        assert_eq!(session.record_failure(), 2);
        session.set_escalation_state(EscalationState::Escalated);
        assert_eq!(session.escalation_state(), EscalationState::Escalated);
        assert!(session.mark_handoff());
        assert!(!session.mark_handoff());

        session.record_understood();
        assert_eq!(session.failure_count(), 0);
        assert!(!session.handoff_triggered());
        assert_eq!(session.escalation_state(), EscalationState::Normal);
    }

    #[test]
    fn test_reset_starts_fresh() {
        let mut session = ConversationSession::new();
        let old_id = session.id();
        session.append_user("hello", "english");
        session.record_failure();
        session.set_escalation_state(EscalationState::FirstFailure);
        session.reset();
        assert!(session.is_empty());
        assert_eq!(session.escalation_state(), EscalationState::Normal);
        assert_eq!(session.failure_count(), 0);
        assert_ne!(session.id(), old_id);
        assert_eq!(session.append_user("again", "english"), 1);
    }
}
