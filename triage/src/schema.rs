//! Schema Validator — shape and type checks for AI-produced triage results
//!
//! A candidate is accepted only when every required field is present with the
//! exact JSON type the output contract demands. There is no coercion: `3.0` is
//! not an integer, `"true"` is not a boolean, and a single violation rejects
//! the whole candidate. `explanation`, `communicationStyle` and
//! `familyInvolvement` must also be non-blank.

use crate::language::Language;
use crate::result::{
    FallbackMechanism, TriageResult, LEAST_URGENT_LEVEL, MAX_CONFIDENCE, MOST_URGENT_LEVEL,
};
use serde_json::{Map, Value};
use thiserror::Error;

/// Why a candidate was rejected. Names the first offending field.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaViolation {
    #[error("candidate is not valid JSON: {0}")]
    NotJson(String),

    #[error("candidate is not a JSON object")]
    NotAnObject,

    #[error("missing required field `{field}`")]
    Missing { field: &'static str },

    #[error("field `{field}` must be {expected}")]
    WrongType {
        field: &'static str,
        expected: &'static str,
    },

    #[error("field `{field}` must not be blank")]
    Empty { field: &'static str },

    #[error("field `{field}` must be between {min} and {max}, got {actual}")]
    OutOfRange {
        field: &'static str,
        min: i64,
        max: i64,
        actual: i64,
    },
}

impl SchemaViolation {
    /// The offending field, when the violation is tied to one.
    pub fn field(&self) -> Option<&'static str> {
        match self {
            Self::Missing { field }
            | Self::Empty { field }
            | Self::WrongType { field, .. }
            | Self::OutOfRange { field, .. } => Some(field),
            Self::NotJson(_) | Self::NotAnObject => None,
        }
    }
}

/// Parse raw model output and validate it.
pub fn validate_str(raw: &str) -> Result<TriageResult, SchemaViolation> {
    let candidate: Value =
        serde_json::from_str(raw).map_err(|e| SchemaViolation::NotJson(e.to_string()))?;
    validate(&candidate)
}

/// Validate a candidate value and build the typed result.
///
/// `detectedLanguage` must be a string; its value is normalized onto one of
/// the five canonical labels rather than rejected.
pub fn validate(candidate: &Value) -> Result<TriageResult, SchemaViolation> {
    let obj = candidate.as_object().ok_or(SchemaViolation::NotAnObject)?;

    let detected_language = Language::normalize(string_field(obj, "detectedLanguage")?);
    let translated_text = string_field(obj, "translatedText")?.to_string();
    let clinical_indicators = string_array(obj, "clinicalIndicators")?;
    let triage_level = int_in_range(
        obj,
        "triageLevel",
        MOST_URGENT_LEVEL as i64,
        LEAST_URGENT_LEVEL as i64,
    )?;
    let explanation = non_blank_string(obj, "explanation")?.to_string();
    let confidence = int_in_range(obj, "confidence", 0, MAX_CONFIDENCE as i64)?;
    let conversational_response = string_field(obj, "conversationalResponse")?.to_string();
    let follow_up_questions = string_array(obj, "followUpQuestions")?;
    let is_final_assessment = bool_field(obj, "isFinalAssessment")?;
    let next_steps = string_array(obj, "nextSteps")?;
    let cultural_considerations = string_array(obj, "culturalConsiderations")?;
    let communication_style = non_blank_string(obj, "communicationStyle")?.to_string();
    let family_involvement = non_blank_string(obj, "familyInvolvement")?.to_string();
    let religious_considerations = optional_string(obj, "religiousConsiderations")?;
    let fallback_mechanism = fallback_mechanism(obj)?;

    Ok(TriageResult {
        detected_language,
        translated_text,
        clinical_indicators,
        triage_level,
        explanation,
        confidence,
        conversational_response,
        follow_up_questions,
        is_final_assessment,
        next_steps,
        cultural_considerations,
        communication_style,
        family_involvement,
        religious_considerations,
        fallback_mechanism,
    })
}

fn fallback_mechanism(obj: &Map<String, Value>) -> Result<FallbackMechanism, SchemaViolation> {
    let inner = require(obj, "fallbackMechanism")?
        .as_object()
        .ok_or(SchemaViolation::WrongType {
            field: "fallbackMechanism",
            expected: "an object",
        })?;

    let is_activated = match inner.get("isActivated") {
        None => {
            return Err(SchemaViolation::Missing {
                field: "fallbackMechanism.isActivated",
            })
        }
        Some(v) => v.as_bool().ok_or(SchemaViolation::WrongType {
            field: "fallbackMechanism.isActivated",
            expected: "a boolean",
        })?,
    };
    let reason = nested_string(inner, "reason", "fallbackMechanism.reason")?;
    let alternative_approach = nested_string(
        inner,
        "alternativeApproach",
        "fallbackMechanism.alternativeApproach",
    )?;

    Ok(FallbackMechanism {
        is_activated,
        reason,
        alternative_approach,
    })
}

fn require<'a>(
    obj: &'a Map<String, Value>,
    field: &'static str,
) -> Result<&'a Value, SchemaViolation> {
    obj.get(field).ok_or(SchemaViolation::Missing { field })
}

fn string_field<'a>(
    obj: &'a Map<String, Value>,
    field: &'static str,
) -> Result<&'a str, SchemaViolation> {
    require(obj, field)?
        .as_str()
        .ok_or(SchemaViolation::WrongType {
            field,
            expected: "a string",
        })
}

fn non_blank_string<'a>(
    obj: &'a Map<String, Value>,
    field: &'static str,
) -> Result<&'a str, SchemaViolation> {
    let value = string_field(obj, field)?;
    if value.trim().is_empty() {
        return Err(SchemaViolation::Empty { field });
    }
    Ok(value)
}

fn nested_string(
    obj: &Map<String, Value>,
    key: &str,
    field: &'static str,
) -> Result<String, SchemaViolation> {
    obj.get(key)
        .ok_or(SchemaViolation::Missing { field })?
        .as_str()
        .map(str::to_string)
        .ok_or(SchemaViolation::WrongType {
            field,
            expected: "a string",
        })
}

fn optional_string(
    obj: &Map<String, Value>,
    field: &'static str,
) -> Result<Option<String>, SchemaViolation> {
    match obj.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(SchemaViolation::WrongType {
            field,
            expected: "a string or null",
        }),
    }
}

fn bool_field(obj: &Map<String, Value>, field: &'static str) -> Result<bool, SchemaViolation> {
    require(obj, field)?
        .as_bool()
        .ok_or(SchemaViolation::WrongType {
            field,
            expected: "a boolean",
        })
}

fn string_array(
    obj: &Map<String, Value>,
    field: &'static str,
) -> Result<Vec<String>, SchemaViolation> {
    let items = require(obj, field)?
        .as_array()
        .ok_or(SchemaViolation::WrongType {
            field,
            expected: "an array of strings",
        })?;

    items
        .iter()
        .map(|item| {
            item.as_str()
                .map(str::to_string)
                .ok_or(SchemaViolation::WrongType {
                    field,
                    expected: "an array of strings",
                })
        })
        .collect()
}

fn int_in_range(
    obj: &Map<String, Value>,
    field: &'static str,
    min: i64,
    max: i64,
) -> Result<u8, SchemaViolation> {
    // `as_i64` is `None` for floats, so `3.0` is rejected here.
    let actual = require(obj, field)?
        .as_i64()
        .ok_or(SchemaViolation::WrongType {
            field,
            expected: "an integer",
        })?;

    if actual < min || actual > max {
        return Err(SchemaViolation::OutOfRange {
            field,
            min,
            max,
            actual,
        });
    }
    u8::try_from(actual).map_err(|_| SchemaViolation::OutOfRange {
        field,
        min,
        max,
        actual,
    })
}
