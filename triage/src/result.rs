//! Structured triage result shared by the AI path and the fallback path

use crate::language::Language;
use serde::{Deserialize, Serialize};

/// Most urgent level on the five-level acuity scale.
pub const MOST_URGENT_LEVEL: u8 = 1;
/// Least urgent level on the five-level acuity scale.
pub const LEAST_URGENT_LEVEL: u8 = 5;
/// Upper bound of the confidence score.
pub const MAX_CONFIDENCE: u8 = 100;

/// A schema-valid clinical triage assessment.
///
/// Values of this type only come out of [`crate::schema::validate`] or the
/// deterministic fallback classifier, so a partially valid result never exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriageResult {
    /// Language the patient actually used
    pub detected_language: Language,
    /// English rendering for the clinical record
    pub translated_text: String,
    /// Clinical tags, most emphasised first
    pub clinical_indicators: Vec<String>,
    /// 1 (immediately life-threatening) to 5 (non-urgent)
    pub triage_level: u8,
    pub explanation: String,
    /// 0-100
    pub confidence: u8,
    /// Reply to show the patient, in the patient's language
    pub conversational_response: String,
    pub follow_up_questions: Vec<String>,
    pub is_final_assessment: bool,
    pub next_steps: Vec<String>,
    pub cultural_considerations: Vec<String>,
    pub communication_style: String,
    pub family_involvement: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub religious_considerations: Option<String>,
    pub fallback_mechanism: FallbackMechanism,
}

/// Marks a response path as lower-trust.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FallbackMechanism {
    pub is_activated: bool,
    pub reason: String,
    pub alternative_approach: String,
}

impl TriageResult {
    /// Whether the result was flagged as lower-trust by whoever produced it.
    pub fn fallback_activated(&self) -> bool {
        self.fallback_mechanism.is_activated
    }

    /// Serialize back to the wire shape the upstream model is asked to produce.
    pub fn to_value(&self) -> serde_json::Value {
        // A struct of strings, integers, booleans and sequences cannot fail to serialize.
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}
