//! Configuration for the analysis, transcription and handoff collaborators
//!
//! Everything is an explicit value handed to constructors. The only ambient
//! lookups are in [`TriageConfig::load`], which reads an optional TOML file
//! and then overlays `TRIBOT_*` environment variables.

use crate::error::ConfigError;
use crate::escalation::EscalationConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const ENV_OPENAI_API_KEY: &str = "TRIBOT_OPENAI_API_KEY";
pub const ENV_OPENAI_BASE_URL: &str = "TRIBOT_OPENAI_BASE_URL";
pub const ENV_OPENAI_API_VERSION: &str = "TRIBOT_OPENAI_API_VERSION";
pub const ENV_DEPLOYMENT_NAME: &str = "TRIBOT_DEPLOYMENT_NAME";
pub const ENV_REQUEST_TIMEOUT_SECS: &str = "TRIBOT_REQUEST_TIMEOUT_SECS";
pub const ENV_WHISPER_API_KEY: &str = "TRIBOT_WHISPER_API_KEY";
pub const ENV_WHISPER_API_ENDPOINT: &str = "TRIBOT_WHISPER_API_ENDPOINT";

/// Variables an operator must set before the assistant can analyze anything.
pub const REQUIRED_ENV_VARS: [&str; 3] = [
    ENV_OPENAI_API_KEY,
    ENV_OPENAI_BASE_URL,
    ENV_DEPLOYMENT_NAME,
];

/// Upstream chat-completions settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub api_version: String,
    pub deployment: String,
    pub timeout_secs: u64,
    pub max_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://triageunsw.openai.azure.com".to_string(),
            api_version: "2025-01-01-preview".to_string(),
            deployment: "gpt-4o".to_string(),
            timeout_secs: 60,
            max_tokens: 1200,
            temperature: 0.7,
            top_p: 0.95,
        }
    }
}

impl AnalysisConfig {
    /// Convenience constructor for a keyed config with default endpoint settings.
    pub fn with_api_key(api_key: impl Into<String>) -> Self {
        Self {
            api_key: Some(api_key.into()),
            ..Default::default()
        }
    }

    /// True only when a non-blank credential is present.
    pub fn is_configured(&self) -> bool {
        non_blank(self.api_key.as_deref()).is_some()
    }

    pub fn api_key(&self) -> Option<&str> {
        non_blank(self.api_key.as_deref())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Full chat-completions URL for the configured deployment.
    pub fn completions_url(&self) -> String {
        format!(
            "{}/openai/deployments/{}/chat/completions?api-version={}",
            self.base_url.trim_end_matches('/'),
            self.deployment,
            self.api_version
        )
    }
}

/// Speech-to-text settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriptionConfig {
    pub api_key: Option<String>,
    pub endpoint: Option<String>,
    /// Minimum spacing between two transcription requests
    pub min_interval_ms: u64,
    pub timeout_secs: u64,
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            endpoint: None,
            min_interval_ms: 1000,
            timeout_secs: 60,
        }
    }
}

impl TranscriptionConfig {
    /// Both the key and the endpoint must be present.
    pub fn is_configured(&self) -> bool {
        self.api_key().is_some() && self.endpoint().is_some()
    }

    pub fn api_key(&self) -> Option<&str> {
        non_blank(self.api_key.as_deref())
    }

    pub fn endpoint(&self) -> Option<&str> {
        non_blank(self.endpoint.as_deref())
    }

    pub fn min_interval(&self) -> Duration {
        Duration::from_millis(self.min_interval_ms)
    }
}

/// Published human-interpreter line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterpreterConfig {
    /// Number as shown to patients
    pub display_number: String,
    /// Digits used for the `tel:` link
    pub dial_number: String,
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        Self {
            display_number: "02 8738 6088".to_string(),
            dial_number: "0287386088".to_string(),
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TriageConfig {
    pub analysis: AnalysisConfig,
    pub transcription: TranscriptionConfig,
    pub escalation: EscalationConfig,
    pub interpreter: InterpreterConfig,
}

impl TriageConfig {
    /// Load from an optional TOML file, then overlay the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;

        if !config.analysis.is_configured() {
            tracing::warn!(
                "Analysis API key not found. Set {} to enable triage analysis.",
                ENV_OPENAI_API_KEY
            );
        }
        if !config.transcription.is_configured() {
            tracing::warn!("Transcription credentials not found. Voice input will not be available.");
        }
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let display = path.display().to_string();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: display.clone(),
            source,
        })?;
        toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: display,
            source,
        })
    }

    /// Overlay values from a key lookup. Blank values are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get(ENV_OPENAI_API_KEY) {
            self.analysis.api_key = Some(v);
        }
        if let Some(v) = get(ENV_OPENAI_BASE_URL) {
            self.analysis.base_url = v;
        }
        if let Some(v) = get(ENV_OPENAI_API_VERSION) {
            self.analysis.api_version = v;
        }
        if let Some(v) = get(ENV_DEPLOYMENT_NAME) {
            self.analysis.deployment = v;
        }
        if let Some(v) = get(ENV_REQUEST_TIMEOUT_SECS) {
            self.analysis.timeout_secs =
                v.trim().parse().map_err(|_| ConfigError::InvalidValue {
                    key: ENV_REQUEST_TIMEOUT_SECS.to_string(),
                    message: format!("expected whole seconds, got {v:?}"),
                })?;
        }
        if let Some(v) = get(ENV_WHISPER_API_KEY) {
            self.transcription.api_key = Some(v);
        }
        if let Some(v) = get(ENV_WHISPER_API_ENDPOINT) {
            self.transcription.endpoint = Some(v);
        }
        Ok(())
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_are_unconfigured() {
        let config = TriageConfig::default();
        assert!(!config.analysis.is_configured());
        assert!(!config.transcription.is_configured());
        assert_eq!(config.analysis.max_tokens, 1200);
        assert_eq!(config.interpreter.display_number, "02 8738 6088");
    }

    #[test]
    fn test_blank_key_is_not_configured() {
        let config = AnalysisConfig {
            api_key: Some("   ".into()),
            ..Default::default()
        };
        assert!(!config.is_configured());
        assert_eq!(config.api_key(), None);
    }

    #[test]
    fn test_completions_url() {
        let config = AnalysisConfig {
            base_url: "https://example.openai.azure.com/".into(),
            deployment: "gpt-4o".into(),
            api_version: "2025-01-01-preview".into(),
            ..Default::default()
        };
        assert_eq!(
            config.completions_url(),
            "https://example.openai.azure.com/openai/deployments/gpt-4o/chat/completions?api-version=2025-01-01-preview"
        );
    }

    #[test]
    fn test_overrides_apply() {
        let mut config = TriageConfig::default();
        config
            .apply_overrides(lookup(&[
                (ENV_OPENAI_API_KEY, "secret"),
                (ENV_DEPLOYMENT_NAME, "triage-4o"),
                (ENV_WHISPER_API_KEY, "w-secret"),
                (ENV_WHISPER_API_ENDPOINT, "https://whisper.example/transcribe"),
                (ENV_OPENAI_BASE_URL, ""),
            ]))
            .unwrap();

        assert!(config.analysis.is_configured());
        assert_eq!(config.analysis.deployment, "triage-4o");
        assert_eq!(
            config.analysis.base_url,
            AnalysisConfig::default().base_url,
            "blank override must be ignored"
        );
        assert!(config.transcription.is_configured());
    }

    #[test]
    fn test_invalid_timeout_override() {
        let mut config = TriageConfig::default();
        let err = config
            .apply_overrides(lookup(&[(ENV_REQUEST_TIMEOUT_SECS, "soon")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_from_file_partial_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[analysis]
api_key = "file-key"
deployment = "gpt-4o-mini"

[escalation]
confidence_threshold = 80
"#
        )
        .unwrap();

        let config = TriageConfig::from_file(file.path()).unwrap();
        assert_eq!(config.analysis.api_key(), Some("file-key"));
        assert_eq!(config.analysis.deployment, "gpt-4o-mini");
        assert_eq!(config.analysis.api_version, "2025-01-01-preview");
        assert_eq!(config.escalation.confidence_threshold, 80);
        assert_eq!(config.escalation.escalate_after, 2);
    }

    #[test]
    fn test_from_file_reports_parse_errors() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[analysis\nbroken").unwrap();
        assert!(matches!(
            TriageConfig::from_file(file.path()),
            Err(ConfigError::Parse { .. })
        ));
        assert!(matches!(
            TriageConfig::from_file(Path::new("/nonexistent/tribot.toml")),
            Err(ConfigError::Read { .. })
        ));
    }
}
