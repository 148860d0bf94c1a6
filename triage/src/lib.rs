//! TRIBOT Triage Library
//!
//! Turns one free-text patient message plus prior turns into a structured
//! emergency-department triage result, decides whether that result can be
//! trusted, and drives a deterministic escalation ladder that ends in a
//! handoff to a human interpreter.
//!
//! # Components
//!
//! - `schema`: strict validation of untrusted model output
//! - `fallback`: keyword classifier used when the model output is unusable
//! - `client`: one upstream chat-completions call per message
//! - `escalation`: Normal → FirstFailure → Escalated ladder
//! - `session`: ordered turn log and the failure counter
//! - `orchestrator`: wires the above into a single `submit` call
//! - `transcription`: speech-to-text for voice input
//! - `handoff`: the human interpreter line
//!
//! # Usage
//!
//! ```no_run
//! use triage::{ConversationSession, TriageConfig, TriageOrchestrator};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = TriageConfig::load(None)?;
//! let orchestrator = TriageOrchestrator::from_config(&config)?;
//! let mut session = ConversationSession::new();
//! let reply = orchestrator
//!     .submit(&mut session, "I have a headache and fever", "english")
//!     .await?;
//! println!("{}", reply.message());
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod escalation;
pub mod fallback;
pub mod handoff;
pub mod language;
pub mod orchestrator;
pub mod prompt;
pub mod result;
pub mod schema;
pub mod session;
pub mod transcription;

// Re-export analysis types
pub use client::{
    AnalysisClient, ChatRequest, ChatTransport, HttpChatTransport, TransportError,
    TransportResponse,
};
pub use error::{AnalysisError, AnalysisResult, ConfigError};
pub use result::{FallbackMechanism, TriageResult};
pub use schema::SchemaViolation;

// Re-export escalation types
pub use escalation::{
    EscalationConfig, EscalationController, EscalationDecision, EscalationState, TurnOutcome,
};

// Re-export session types
pub use language::Language;
pub use session::{ConversationSession, Role, Turn};

// Re-export orchestration types
pub use config::TriageConfig;
pub use orchestrator::{TriageOrchestrator, TurnReply};

// Re-export voice and handoff types
pub use handoff::{
    HandoffError, HandoffReceipt, HandoffRequest, InterpreterHandoff, RecordingHandoff,
    TelephonyHandoff,
};
pub use transcription::{Transcription, TranscriptionClient, TranscriptionError};
