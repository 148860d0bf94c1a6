//! Triage Orchestrator — one patient message in, one bot reply out
//!
//! ```text
//! submit(session, text, language)
//!   1. snapshot the last six turns as context
//!   2. append the patient turn
//!   3. await AnalysisClient::analyze            (only suspension point)
//!   4. EscalationController::process            (fatal errors return here)
//!   5. append the bot turn
//!   6. on a new escalation: InterpreterHandoff::connect, append its message
//! ```
//!
//! The session is borrowed mutably for the whole submission, so the failure
//! counter is read and written only after the analysis has resolved.

use crate::client::AnalysisClient;
use crate::config::TriageConfig;
use crate::error::AnalysisResult;
use crate::escalation::{EscalationController, EscalationDecision};
use crate::handoff::{HandoffReceipt, HandoffRequest, InterpreterHandoff, TelephonyHandoff};
use crate::language::Language;
use crate::session::{ConversationSession, HISTORY_WINDOW};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info};

/// Everything a frontend needs to render one turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnReply {
    /// Patient turn this reply answers; compare with
    /// [`ConversationSession::is_current`] before rendering
    pub user_turn_id: u64,
    pub bot_turn_id: u64,
    pub decision: EscalationDecision,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handoff: Option<HandoffReceipt>,
}

impl TurnReply {
    pub fn message(&self) -> &str {
        &self.decision.message
    }

    pub fn escalated(&self) -> bool {
        self.decision.trigger_handoff
    }
}

pub struct TriageOrchestrator {
    client: AnalysisClient,
    controller: EscalationController,
    handoff: Arc<dyn InterpreterHandoff>,
}

impl TriageOrchestrator {
    pub fn new(
        client: AnalysisClient,
        controller: EscalationController,
        handoff: Arc<dyn InterpreterHandoff>,
    ) -> Self {
        Self {
            client,
            controller,
            handoff,
        }
    }

    /// Wire the HTTPS client, the configured ladder and the telephony handoff.
    pub fn from_config(config: &TriageConfig) -> AnalysisResult<Self> {
        Ok(Self::new(
            AnalysisClient::new(config.analysis.clone())?,
            EscalationController::with_config(config.escalation.clone()),
            Arc::new(TelephonyHandoff::new(config.interpreter.clone())),
        ))
    }

    pub fn is_configured(&self) -> bool {
        self.client.is_configured()
    }

    pub fn controller(&self) -> &EscalationController {
        &self.controller
    }

    /// Process one patient message.
    ///
    /// Recoverable analysis failures come back as an escalation decision.
    /// Only fatal configuration errors are returned as `Err`; the patient
    /// turn stays in the log in that case.
    pub async fn submit(
        &self,
        session: &mut ConversationSession,
        text: &str,
        preferred_language: &str,
    ) -> AnalysisResult<TurnReply> {
        let history = session.recent_history(HISTORY_WINDOW).to_vec();
        let user_turn_id = session.append_user(text, preferred_language);
        debug!(
            session_id = %session.short_id(),
            user_turn_id,
            history = history.len(),
            "Submitting patient turn"
        );

        let analysis = self
            .client
            .analyze(text, preferred_language, &history)
            .await;

        let decision = self.controller.process(session, analysis).map_err(|err| {
            error!(
                session_id = %session.short_id(),
                code = err.code(),
                error = %err,
                "Fatal analysis error"
            );
            err
        })?;

        let bot_turn_id = session.append_bot(
            decision.message.clone(),
            decision.analysis.clone(),
            !decision.understood,
        );

        let handoff = if decision.trigger_handoff {
            self.connect_interpreter(session, preferred_language, decision.failure_count)
                .await
        } else {
            None
        };

        Ok(TurnReply {
            user_turn_id,
            bot_turn_id,
            decision,
            handoff,
        })
    }

    async fn connect_interpreter(
        &self,
        session: &mut ConversationSession,
        preferred_language: &str,
        failure_count: u32,
    ) -> Option<HandoffReceipt> {
        let request = HandoffRequest {
            session_id: session.id(),
            language: Language::normalize(preferred_language),
            failure_count,
        };

        match self.handoff.connect(&request).await {
            Ok(receipt) => {
                info!(
                    session_id = %session.short_id(),
                    dial_uri = %receipt.dial_uri,
                    "Interpreter handoff connected"
                );
                session.append_bot(receipt.message.clone(), None, true);
                Some(receipt)
            }
            Err(err) => {
                error!(
                    session_id = %session.short_id(),
                    error = %err,
                    "Interpreter handoff failed; session remains escalated"
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{ChatRequest, ChatTransport, TransportError, TransportResponse};
    use crate::config::AnalysisConfig;
    use crate::escalation::{EscalationState, FIRST_FAILURE_MESSAGE, HANDOFF_MESSAGE};
    use crate::handoff::{HandoffError, RecordingHandoff};
    use crate::session::Role;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Replays a fixed sequence of statuses and bodies.
    struct ScriptedTransport {
        replies: Mutex<Vec<(u16, String)>>,
        histories: Mutex<Vec<usize>>,
    }

    impl ScriptedTransport {
        fn new(mut replies: Vec<(u16, String)>) -> Arc<Self> {
            replies.reverse();
            Arc::new(Self {
                replies: Mutex::new(replies),
                histories: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl ChatTransport for ScriptedTransport {
        async fn send(&self, request: &ChatRequest) -> Result<TransportResponse, TransportError> {
            // system + history + new user message
            self.histories
                .lock()
                .unwrap()
                .push(request.messages.len() - 2);
            let (status, body) = self
                .replies
                .lock()
                .unwrap()
                .pop()
                .unwrap_or((500, "script exhausted".into()));
            Ok(TransportResponse { status, body })
        }
    }

    fn orchestrator(
        transport: Arc<ScriptedTransport>,
        handoff: Arc<RecordingHandoff>,
    ) -> TriageOrchestrator {
        TriageOrchestrator::new(
            AnalysisClient::with_transport(AnalysisConfig::with_api_key("k"), transport),
            EscalationController::new(),
            handoff,
        )
    }

    fn garbage() -> (u16, String) {
        (200, "not json at all".into())
    }

    #[tokio::test]
    async fn test_turns_are_appended_in_order() {
        let handoff = Arc::new(RecordingHandoff::new());
        let orch = orchestrator(ScriptedTransport::new(vec![garbage()]), handoff);
        let mut session = ConversationSession::new();

        let reply = orch.submit(&mut session, "fever", "english").await.unwrap();
        assert_eq!(reply.user_turn_id, 1);
        assert_eq!(reply.bot_turn_id, 2);
        assert_eq!(reply.message(), FIRST_FAILURE_MESSAGE);

        let turns = session.turns();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].role, Role::User);
        assert_eq!(turns[1].role, Role::Bot);
        assert!(turns[1].understanding_failure);
        assert!(turns[1].analysis.as_ref().unwrap().fallback_activated());
    }

    #[tokio::test]
    async fn test_history_excludes_current_message_and_is_capped() {
        let transport = ScriptedTransport::new(vec![garbage(); 5]);
        let orch = orchestrator(transport.clone(), Arc::new(RecordingHandoff::new()));
        let mut session = ConversationSession::new();
        for i in 0..5 {
            orch.submit(&mut session, &format!("message {i}"), "english")
                .await
                .unwrap();
        }
        let histories = transport.histories.lock().unwrap().clone();
        assert_eq!(histories[0], 0);
        assert_eq!(histories[1], 2);
        // The second turn escalated and appended the handoff message too.
        assert_eq!(histories[2], 5);
        assert_eq!(histories[3], HISTORY_WINDOW);
        assert_eq!(histories[4], HISTORY_WINDOW);
    }

    #[tokio::test]
    async fn test_handoff_fires_once_and_appends_connection_message() {
        let handoff = Arc::new(RecordingHandoff::new());
        let orch = orchestrator(
            ScriptedTransport::new(vec![garbage(), garbage(), garbage()]),
            handoff.clone(),
        );
        let mut session = ConversationSession::new();

        orch.submit(&mut session, "a", "tamil").await.unwrap();
        let second = orch.submit(&mut session, "b", "tamil").await.unwrap();
        assert_eq!(second.message(), HANDOFF_MESSAGE);
        assert!(second.escalated());
        let receipt = second.handoff.unwrap();
        assert_eq!(receipt.dial_uri, "tel:0287386088");
        assert_eq!(session.turns().last().unwrap().text, receipt.message);

        let third = orch.submit(&mut session, "c", "tamil").await.unwrap();
        assert_eq!(third.decision.state, EscalationState::Escalated);
        assert!(third.handoff.is_none());

        let requests = handoff.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].language, Language::Tamil);
        assert_eq!(requests[0].failure_count, 2);
        assert_eq!(requests[0].session_id, session.id());
    }

    #[tokio::test]
    async fn test_handoff_failure_keeps_escalation() {
        let handoff = Arc::new(RecordingHandoff::failing(HandoffError::Unavailable(
            "line busy".into(),
        )));
        let orch = orchestrator(
            ScriptedTransport::new(vec![garbage(), garbage()]),
            handoff.clone(),
        );
        let mut session = ConversationSession::new();

        orch.submit(&mut session, "a", "english").await.unwrap();
        let reply = orch.submit(&mut session, "b", "english").await.unwrap();
        assert!(reply.escalated());
        assert!(reply.handoff.is_none());
        assert_eq!(session.escalation_state(), EscalationState::Escalated);
        assert_eq!(session.turns().len(), 4);
    }

    #[tokio::test]
    async fn test_fatal_error_leaves_counter_untouched() {
        let orch = orchestrator(
            ScriptedTransport::new(vec![(401, String::new())]),
            Arc::new(RecordingHandoff::new()),
        );
        let mut session = ConversationSession::new();
        let err = orch
            .submit(&mut session, "fever", "english")
            .await
            .unwrap_err();
        assert!(err.is_fatal());
        assert_eq!(session.failure_count(), 0);
        assert_eq!(session.turns().len(), 1);
    }
}
