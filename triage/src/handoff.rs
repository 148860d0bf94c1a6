//! Human interpreter handoff
//!
//! Invoked once each time a session enters the escalated state. The default
//! implementation only produces the published phone line and a connection
//! message; frontends decide how to dial it.

use crate::config::InterpreterConfig;
use crate::language::Language;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use thiserror::Error;
use uuid::Uuid;

/// Context passed to the interpreter service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandoffRequest {
    pub session_id: Uuid,
    /// Language the patient selected, normalised
    pub language: Language,
    /// Consecutive failures that led here
    pub failure_count: u32,
}

/// What the patient needs to reach an interpreter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandoffReceipt {
    /// Patient-facing connection message
    pub message: String,
    /// `tel:` link for the interpreter line
    pub dial_uri: String,
    pub requested_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HandoffError {
    #[error("interpreter service unavailable: {0}")]
    Unavailable(String),

    #[error("invalid interpreter number: {0:?}")]
    InvalidNumber(String),
}

/// Abstraction over interpreter-connection backends.
///
/// `TelephonyHandoff` implements this for the published phone line.
/// Tests can provide a recording implementation.
#[async_trait]
pub trait InterpreterHandoff: Send + Sync {
    async fn connect(&self, request: &HandoffRequest) -> Result<HandoffReceipt, HandoffError>;
}

/// Points the patient at the interpreter phone line.
#[derive(Debug, Clone, Default)]
pub struct TelephonyHandoff {
    config: InterpreterConfig,
}

impl TelephonyHandoff {
    pub fn new(config: InterpreterConfig) -> Self {
        Self { config }
    }

    pub fn dial_uri(&self) -> String {
        format!("tel:{}", self.config.dial_number)
    }

    pub fn connection_message(&self) -> String {
        format!(
            "You are being connected to our Human Interpreter service at {}. Please hold while we establish the connection.",
            self.config.display_number
        )
    }
}

#[async_trait]
impl InterpreterHandoff for TelephonyHandoff {
    async fn connect(&self, request: &HandoffRequest) -> Result<HandoffReceipt, HandoffError> {
        let digits = &self.config.dial_number;
        if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit() || c == '+') {
            return Err(HandoffError::InvalidNumber(digits.clone()));
        }

        tracing::info!(
            session_id = %request.session_id,
            language = %request.language,
            failure_count = request.failure_count,
            number = %self.config.display_number,
            "Interpreter handoff requested"
        );

        Ok(HandoffReceipt {
            message: self.connection_message(),
            dial_uri: self.dial_uri(),
            requested_at: Utc::now(),
        })
    }
}

/// Records every request; optionally fails.
#[derive(Debug, Default)]
pub struct RecordingHandoff {
    requests: Mutex<Vec<HandoffRequest>>,
    fail_with: Option<HandoffError>,
}

impl RecordingHandoff {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(error: HandoffError) -> Self {
        Self {
            requests: Mutex::new(Vec::new()),
            fail_with: Some(error),
        }
    }

    pub fn requests(&self) -> Vec<HandoffRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl InterpreterHandoff for RecordingHandoff {
    async fn connect(&self, request: &HandoffRequest) -> Result<HandoffReceipt, HandoffError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }
        match &self.fail_with {
            Some(err) => Err(err.clone()),
            None => TelephonyHandoff::default().connect(request).await,
        }
    }
}
