//! Analysis Client — one upstream call per patient message
//!
//! Builds the request, sends it through a [`ChatTransport`], and turns the
//! reply into either a schema-valid [`TriageResult`] or a classified
//! [`AnalysisError`].
//!
//! ```text
//! send
//!   ├─ transport failure / timeout        → Transient
//!   ├─ 401                                → Auth (fatal)
//!   ├─ 404                                → Config (fatal)
//!   ├─ 429                                → Transient
//!   ├─ 400 + content_filter               → ContentFiltered
//!   ├─ 400                                → BadRequest
//!   ├─ other non-success                  → Upstream
//!   └─ success
//!        ├─ valid result                  → Ok(result)
//!        └─ unparsable / schema mismatch  → Ok(fallback::classify(..))
//!           / blank translation
//! ```
//!
//! No retries happen here; retry policy belongs to the caller.

use crate::config::AnalysisConfig;
use crate::error::{AnalysisError, AnalysisResult};
use crate::fallback;
use crate::prompt::{self, ChatMessage};
use crate::result::TriageResult;
use crate::schema::{self, SchemaViolation};
use crate::session::Turn;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

const ERROR_EXCERPT_LEN: usize = 200;

/// Chat-completions request body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
    pub frequency_penalty: f32,
    pub presence_penalty: f32,
    pub response_format: ResponseFormat,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseFormat {
    #[serde(rename = "type")]
    pub kind: String,
}

impl ResponseFormat {
    pub fn json_object() -> Self {
        Self {
            kind: "json_object".to_string(),
        }
    }
}

/// Raw HTTP-like reply from the upstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

impl TransportResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Failures before any status code was received.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("connection failed: {0}")]
    Connection(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else {
            Self::Connection(err.to_string())
        }
    }
}

/// Seam between the client and the network.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Perform exactly one request.
    async fn send(&self, request: &ChatRequest) -> Result<TransportResponse, TransportError>;
}

/// Azure-style chat-completions over HTTPS.
pub struct HttpChatTransport {
    client: reqwest::Client,
    url: String,
    api_key: String,
}

impl HttpChatTransport {
    pub fn new(config: &AnalysisConfig) -> AnalysisResult<Self> {
        let api_key = config.api_key().ok_or(AnalysisError::NotConfigured)?;
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| AnalysisError::Config {
                message: format!("failed to create HTTP client: {e}"),
            })?;

        Ok(Self {
            client,
            url: config.completions_url(),
            api_key: api_key.to_string(),
        })
    }
}

#[async_trait]
impl ChatTransport for HttpChatTransport {
    async fn send(&self, request: &ChatRequest) -> Result<TransportResponse, TransportError> {
        let response = self
            .client
            .post(&self.url)
            .header("api-key", &self.api_key)
            .json(request)
            .send()
            .await?;

        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok(TransportResponse { status, body })
    }
}

/// Turns one patient message into a trusted-shape triage result.
pub struct AnalysisClient {
    config: AnalysisConfig,
    transport: Option<Arc<dyn ChatTransport>>,
}

impl AnalysisClient {
    /// Build a client over HTTPS. An unconfigured client is still returned so
    /// callers can probe [`Self::is_configured`].
    pub fn new(config: AnalysisConfig) -> AnalysisResult<Self> {
        let transport: Option<Arc<dyn ChatTransport>> = if config.is_configured() {
            Some(Arc::new(HttpChatTransport::new(&config)?))
        } else {
            warn!("Analysis client created without an API key; analysis is disabled");
            None
        };
        Ok(Self { config, transport })
    }

    /// Build a client over a caller-supplied transport.
    pub fn with_transport(config: AnalysisConfig, transport: Arc<dyn ChatTransport>) -> Self {
        Self {
            config,
            transport: Some(transport),
        }
    }

    /// Capability probe: true only when a credential is present.
    pub fn is_configured(&self) -> bool {
        self.config.is_configured() && self.transport.is_some()
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Request body for one analysis.
    pub fn build_request(
        &self,
        text: &str,
        preferred_language: &str,
        history: &[Turn],
    ) -> ChatRequest {
        ChatRequest {
            messages: prompt::build_messages(text, preferred_language, history),
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
            top_p: self.config.top_p,
            frequency_penalty: 0.0,
            presence_penalty: 0.0,
            response_format: ResponseFormat::json_object(),
        }
    }

    /// Analyze one patient message in the context of prior turns.
    ///
    /// Returns a schema-valid result from the model, or the deterministic
    /// fallback when the model replied successfully but unusably. Errors are
    /// reserved for transport and status failures.
    pub async fn analyze(
        &self,
        text: &str,
        preferred_language: &str,
        history: &[Turn],
    ) -> AnalysisResult<TriageResult> {
        let transport = match &self.transport {
            Some(transport) if self.config.is_configured() => transport,
            _ => return Err(AnalysisError::NotConfigured),
        };

        let request = self.build_request(text, preferred_language, history);
        debug!(
            messages = request.messages.len(),
            history = history.len(),
            text_len = text.len(),
            preferred_language,
            "Sending triage analysis request"
        );

        let response = transport.send(&request).await.map_err(|e| {
            warn!(error = %e, "Analysis transport failed");
            AnalysisError::transient(e.to_string())
        })?;

        if !response.is_success() {
            let err = classify_status(response.status, &response.body);
            warn!(
                status = response.status,
                code = err.code(),
                "Analysis API returned an error"
            );
            return Err(err);
        }

        let parsed =
            parse_reply(&response.body).and_then(|result| require_translation(result, text));
        match parsed {
            Ok(result) => {
                info!(
                    triage_level = result.triage_level,
                    confidence = result.confidence,
                    language = %result.detected_language,
                    fallback = result.fallback_activated(),
                    "Analysis succeeded"
                );
                Ok(result)
            }
            Err(violation) => {
                warn!(
                    violation = %violation,
                    "Model reply unusable; using deterministic fallback"
                );
                Ok(fallback::classify(text, preferred_language))
            }
        }
    }
}

/// Map a non-success status onto the error taxonomy.
pub fn classify_status(status: u16, body: &str) -> AnalysisError {
    match status {
        401 => AnalysisError::Auth {
            message: "Invalid API key. Please check your API key.".to_string(),
        },
        404 => AnalysisError::Config {
            message: "Deployment not found. Please check your endpoint and deployment name."
                .to_string(),
        },
        429 => AnalysisError::transient("Rate limit exceeded. Please try again in a moment."),
        400 if is_content_filtered(body) => AnalysisError::ContentFiltered {
            message: "Your message was filtered by content policy. Please rephrase your symptoms."
                .to_string(),
        },
        400 => AnalysisError::BadRequest {
            message: excerpt(body),
        },
        _ => AnalysisError::Upstream {
            status,
            message: excerpt(body),
        },
    }
}

fn is_content_filtered(body: &str) -> bool {
    let Ok(value) = serde_json::from_str::<Value>(body) else {
        return false;
    };
    let error = &value["error"];
    error["code"] == "content_filter" || error["innererror"]["code"] == "ResponsibleAIPolicyViolation"
}

/// Pull the model's content out of the completions envelope and validate it.
/// A non-blank patient message must come back with an English rendering.
fn require_translation(
    result: TriageResult,
    input: &str,
) -> Result<TriageResult, SchemaViolation> {
    if !input.trim().is_empty() && result.translated_text.trim().is_empty() {
        return Err(SchemaViolation::Empty {
            field: "translatedText",
        });
    }
    Ok(result)
}

fn parse_reply(body: &str) -> Result<TriageResult, SchemaViolation> {
    let envelope: Value =
        serde_json::from_str(body).map_err(|e| SchemaViolation::NotJson(e.to_string()))?;
    let content = envelope["choices"][0]["message"]["content"]
        .as_str()
        .filter(|c| !c.trim().is_empty())
        .ok_or(SchemaViolation::Missing {
            field: "choices[0].message.content",
        })?;
    schema::validate_str(content)
}

fn excerpt(body: &str) -> String {
    if body.chars().count() <= ERROR_EXCERPT_LEN {
        body.to_string()
    } else {
        let cut: String = body.chars().take(ERROR_EXCERPT_LEN).collect();
        format!("{cut}...")
    }
}
