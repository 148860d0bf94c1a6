//! Speech-to-text for voice input
//!
//! Uploads recorded audio to a Whisper-style endpoint and returns the text.
//! Requests are spaced by a minimum interval; a request arriving too soon is
//! refused locally with [`TranscriptionError::RateLimited`] instead of queued.

use crate::client::{TransportError, TransportResponse};
use crate::config::TranscriptionConfig;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Filename sent with every upload.
pub const AUDIO_FILENAME: &str = "audio.wav";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TranscriptionError {
    #[error("transcription credentials are not configured")]
    NotConfigured,

    #[error("no audio data to transcribe")]
    EmptyAudio,

    #[error("invalid transcription API key")]
    Auth,

    #[error("transcription endpoint not found")]
    EndpointNotFound,

    #[error("transcription rate limit exceeded, please wait a moment and try again")]
    RateLimited,

    #[error("transcription service error ({status}): {message}")]
    Upstream { status: u16, message: String },

    #[error("transcription request failed: {0}")]
    Request(String),

    #[error("unreadable transcription response: {0}")]
    Parse(String),
}

/// Text recognised from one recording.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transcription {
    pub text: String,
    /// Language reported by the service, when it reports one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

impl Transcription {
    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Seam between the client and the upload.
#[async_trait]
pub trait AudioTransport: Send + Sync {
    async fn upload(&self, audio: Vec<u8>) -> Result<TransportResponse, TransportError>;
}

/// Multipart upload over HTTPS.
pub struct HttpAudioTransport {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl HttpAudioTransport {
    pub fn new(config: &TranscriptionConfig) -> Result<Self, TranscriptionError> {
        let (Some(api_key), Some(endpoint)) = (config.api_key(), config.endpoint()) else {
            return Err(TranscriptionError::NotConfigured);
        };
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| TranscriptionError::Request(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
            api_key: api_key.to_string(),
        })
    }
}

#[async_trait]
impl AudioTransport for HttpAudioTransport {
    async fn upload(&self, audio: Vec<u8>) -> Result<TransportResponse, TransportError> {
        let part = reqwest::multipart::Part::bytes(audio)
            .file_name(AUDIO_FILENAME)
            .mime_str("audio/wav")?;
        let form = reqwest::multipart::Form::new().part("file", part);

        let response = self
            .client
            .post(&self.endpoint)
            .header("api-key", &self.api_key)
            .multipart(form)
            .send()
            .await?;

        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok(TransportResponse { status, body })
    }
}

pub struct TranscriptionClient {
    config: TranscriptionConfig,
    transport: Option<Arc<dyn AudioTransport>>,
    last_request: Mutex<Option<Instant>>,
}

impl TranscriptionClient {
    /// Build a client over HTTPS. Unconfigured clients are returned disabled.
    pub fn new(config: TranscriptionConfig) -> Result<Self, TranscriptionError> {
        let transport: Option<Arc<dyn AudioTransport>> = if config.is_configured() {
            Some(Arc::new(HttpAudioTransport::new(&config)?))
        } else {
            None
        };
        Ok(Self {
            config,
            transport,
            last_request: Mutex::new(None),
        })
    }

    pub fn with_transport(config: TranscriptionConfig, transport: Arc<dyn AudioTransport>) -> Self {
        Self {
            config,
            transport: Some(transport),
            last_request: Mutex::new(None),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.config.is_configured() && self.transport.is_some()
    }

    /// Transcribe one recording.
    pub async fn transcribe(&self, audio: Vec<u8>) -> Result<Transcription, TranscriptionError> {
        let transport = match &self.transport {
            Some(transport) if self.config.is_configured() => transport,
            _ => return Err(TranscriptionError::NotConfigured),
        };
        if audio.is_empty() {
            return Err(TranscriptionError::EmptyAudio);
        }

        {
            let mut last = self.last_request.lock().await;
            let now = Instant::now();
            if let Some(previous) = *last {
                if now.duration_since(previous) < self.config.min_interval() {
                    warn!("Transcription request refused by local rate limit");
                    return Err(TranscriptionError::RateLimited);
                }
            }
            *last = Some(now);
        }

        debug!(bytes = audio.len(), "Uploading audio for transcription");
        let response = transport
            .upload(audio)
            .await
            .map_err(|e| TranscriptionError::Request(e.to_string()))?;

        match response.status {
            200..=299 => {}
            401 => return Err(TranscriptionError::Auth),
            404 => return Err(TranscriptionError::EndpointNotFound),
            429 => return Err(TranscriptionError::RateLimited),
            status => {
                return Err(TranscriptionError::Upstream {
                    status,
                    message: response.body,
                })
            }
        }

        let value: Value = serde_json::from_str(&response.body)
            .map_err(|e| TranscriptionError::Parse(e.to_string()))?;
        let transcription = Transcription {
            text: value["text"].as_str().unwrap_or_default().trim().to_string(),
            language: value["language"].as_str().map(str::to_string),
        };
        info!(
            chars = transcription.text.chars().count(),
            language = ?transcription.language,
            "Transcription complete"
        );
        Ok(transcription)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct CannedAudio {
        status: u16,
        body: String,
        uploads: AtomicUsize,
    }

    impl CannedAudio {
        fn new(status: u16, body: &str) -> Arc<Self> {
            Arc::new(Self {
                status,
                body: body.to_string(),
                uploads: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl AudioTransport for CannedAudio {
        async fn upload(&self, _audio: Vec<u8>) -> Result<TransportResponse, TransportError> {
            self.uploads.fetch_add(1, Ordering::SeqCst);
            Ok(TransportResponse {
                status: self.status,
                body: self.body.clone(),
            })
        }
    }

    fn configured() -> TranscriptionConfig {
        TranscriptionConfig {
            api_key: Some("whisper-key".into()),
            endpoint: Some("https://whisper.example/transcribe".into()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_unconfigured_is_refused() {
        let client = TranscriptionClient::new(TranscriptionConfig::default()).unwrap();
        assert!(!client.is_configured());
        assert_eq!(
            client.transcribe(vec![1, 2, 3]).await,
            Err(TranscriptionError::NotConfigured)
        );
    }

    #[tokio::test]
    async fn test_text_is_extracted() {
        let transport = CannedAudio::new(200, r#"{"text":" I have a fever ","language":"english"}"#);
        let client = TranscriptionClient::with_transport(configured(), transport);
        let result = client.transcribe(vec![0; 16]).await.unwrap();
        assert_eq!(result.text, "I have a fever");
        assert_eq!(result.language.as_deref(), Some("english"));
    }

    #[tokio::test]
    async fn test_missing_text_is_empty() {
        let client = TranscriptionClient::with_transport(configured(), CannedAudio::new(200, "{}"));
        let result = client.transcribe(vec![0; 16]).await.unwrap();
        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn test_status_mapping() {
        let cases = [
            (401, TranscriptionError::Auth),
            (404, TranscriptionError::EndpointNotFound),
            (429, TranscriptionError::RateLimited),
            (
                500,
                TranscriptionError::Upstream {
                    status: 500,
                    message: "boom".into(),
                },
            ),
        ];
        for (status, expected) in cases {
            let client =
                TranscriptionClient::with_transport(configured(), CannedAudio::new(status, "boom"));
            assert_eq!(client.transcribe(vec![0; 16]).await, Err(expected));
        }
    }

    #[tokio::test]
    async fn test_non_json_body_is_parse_error() {
        let client =
            TranscriptionClient::with_transport(configured(), CannedAudio::new(200, "<html>"));
        assert!(matches!(
            client.transcribe(vec![0; 16]).await,
            Err(TranscriptionError::Parse(_))
        ));
    }

    #[tokio::test]
    async fn test_empty_audio_makes_no_upload() {
        let transport = CannedAudio::new(200, r#"{"text":"x"}"#);
        let client = TranscriptionClient::with_transport(configured(), transport.clone());
        assert_eq!(
            client.transcribe(Vec::new()).await,
            Err(TranscriptionError::EmptyAudio)
        );
        assert_eq!(transport.uploads.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_min_interval_gate() {
        let transport = CannedAudio::new(200, r#"{"text":"hello"}"#);
        let client = TranscriptionClient::with_transport(configured(), transport.clone());

        client.transcribe(vec![0; 16]).await.unwrap();
        assert_eq!(
            client.transcribe(vec![0; 16]).await,
            Err(TranscriptionError::RateLimited)
        );
        assert_eq!(transport.uploads.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_millis(1001)).await;
        client.transcribe(vec![0; 16]).await.unwrap();
        assert_eq!(transport.uploads.load(Ordering::SeqCst), 2);
    }
}
