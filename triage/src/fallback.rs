//! Deterministic Fallback Classifier
//!
//! Keyword-based triage estimate used when the AI path cannot produce a
//! schema-valid result. Always succeeds, never claims more than 75% confidence,
//! and always marks itself as a fallback.
//!
//! Precedence is tiered, not counted: any urgent keyword wins over any number
//! of moderate keywords.
//!
//! ```text
//! urgent match   → level 2
//! moderate match → level 4
//! neither        → level 5
//! ```

use crate::language::Language;
use crate::result::{FallbackMechanism, TriageResult};
use serde::{Deserialize, Serialize};

/// Confidence reported on every fallback result.
pub const FALLBACK_CONFIDENCE: u8 = 75;

pub const FALLBACK_REASON: &str = "AI service unavailable, using cultural-aware fallback system";

pub const FALLBACK_ALTERNATIVE: &str =
    "Providing culturally-sensitive basic triage assessment with appropriate cultural considerations";

/// Symptoms that need assessment within ten minutes.
pub const URGENT_KEYWORDS: [&str; 7] = [
    "chest pain",
    "difficulty breathing",
    "unconscious",
    "severe bleeding",
    "heart attack",
    "stroke",
    "seizure",
];

/// Symptoms that warrant timely but not urgent assessment.
pub const MODERATE_KEYWORDS: [&str; 6] = [
    "fever",
    "pain",
    "nausea",
    "vomiting",
    "headache",
    "dizziness",
];

const NEXT_STEPS: [&str; 2] = [
    "Please remain comfortable while we gather more information",
    "Let medical staff know if symptoms change",
];

/// Keyword tier matched by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UrgencyTier {
    Urgent,
    Moderate,
    Routine,
}

impl UrgencyTier {
    /// Scan lower-cased text; the first tier with any match decides.
    pub fn detect(free_text: &str) -> Self {
        let text = free_text.to_lowercase();
        if URGENT_KEYWORDS.iter().any(|kw| text.contains(kw)) {
            Self::Urgent
        } else if MODERATE_KEYWORDS.iter().any(|kw| text.contains(kw)) {
            Self::Moderate
        } else {
            Self::Routine
        }
    }

    pub fn triage_level(&self) -> u8 {
        match self {
            Self::Urgent => 2,
            Self::Moderate => 4,
            Self::Routine => 5,
        }
    }

    fn copy(&self) -> TierCopy {
        match self {
            Self::Urgent => TierCopy {
                indicators: &["Potentially serious symptoms", "Requires prompt assessment"],
                explanation: "Patient presents with symptoms that may indicate a serious condition requiring prompt medical evaluation.",
                response: "I understand you're experiencing concerning symptoms that require urgent medical attention. To help assess your condition, I need to ask you a few important questions.",
                questions: &[
                    "How long have you been experiencing these symptoms?",
                    "Have the symptoms gotten worse since they started?",
                ],
            },
            Self::Moderate => TierCopy {
                indicators: &["Moderate symptoms", "Standard assessment"],
                explanation: "Patient presents with moderate symptoms that require timely medical evaluation.",
                response: "Thank you for describing your symptoms. To provide appropriate medical guidance, I need to gather some additional information.",
                questions: &[
                    "When did these symptoms first start?",
                    "How would you rate your discomfort?",
                ],
            },
            Self::Routine => TierCopy {
                indicators: &["Mild symptoms", "Routine assessment"],
                explanation: "Patient presents with symptoms suitable for routine medical care.",
                response: "I understand you're seeking medical attention for your symptoms. To provide appropriate guidance, I need to ask you some questions about your condition.",
                questions: &[
                    "How long have you been feeling this way?",
                    "Is there anything that makes the symptoms better or worse?",
                ],
            },
        }
    }
}

impl std::fmt::Display for UrgencyTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Urgent => write!(f, "urgent"),
            Self::Moderate => write!(f, "moderate"),
            Self::Routine => write!(f, "routine"),
        }
    }
}

struct TierCopy {
    indicators: &'static [&'static str],
    explanation: &'static str,
    response: &'static str,
    questions: &'static [&'static str],
}

/// Culturally tailored guidance for one language bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CulturalProfile {
    pub considerations: &'static [&'static str],
    pub communication_style: &'static str,
    pub family_involvement: &'static str,
    pub religious_considerations: &'static str,
}

impl CulturalProfile {
    /// Profile for a recognised language. English shares the generic default.
    pub fn for_language(language: Option<Language>) -> Self {
        match language {
            Some(Language::Arabic) => Self {
                considerations: &[
                    "Islamic cultural sensitivity",
                    "Family involvement in decisions",
                    "Modesty considerations",
                    "Religious expressions",
                ],
                communication_style: "Formal, respectful tone with Islamic cultural expressions",
                family_involvement: "Family consultation and involvement is culturally expected",
                religious_considerations:
                    "Consider Islamic practices and use appropriate religious expressions",
            },
            Some(Language::Bangla) => Self {
                considerations: &[
                    "Respect for elders",
                    "Family hierarchy",
                    "Economic concerns",
                    "Traditional medicine awareness",
                ],
                communication_style: "Warm, family-inclusive, respectful of traditions",
                family_involvement: "Strong family involvement in healthcare decisions expected",
                religious_considerations: "Consider Islamic or Hindu practices as applicable",
            },
            Some(Language::Hindi) => Self {
                considerations: &[
                    "Family decision-making",
                    "Traditional medicine respect",
                    "Religious dietary restrictions",
                    "Social considerations",
                ],
                communication_style: "Respectful, family-centered, culturally aware",
                family_involvement: "Family consultation is important in healthcare decisions",
                religious_considerations: "Consider Hindu, Sikh, or other religious practices",
            },
            Some(Language::Tamil) => Self {
                considerations: &[
                    "Strong family involvement",
                    "Traditional Siddha medicine",
                    "Cultural pride",
                    "Vegetarian considerations",
                ],
                communication_style: "Respectful, tradition-aware, family-inclusive",
                family_involvement: "Family involvement is crucial in healthcare decisions",
                religious_considerations: "Consider Hindu practices and dietary restrictions",
            },
            Some(Language::English) | None => Self {
                considerations: &[
                    "Individual autonomy",
                    "Diverse cultural backgrounds",
                    "Direct communication",
                ],
                communication_style: "Professional, clear, patient-centered",
                family_involvement: "Individual decision-making with optional family involvement",
                religious_considerations: "Consider diverse religious backgrounds as needed",
            },
        }
    }
}

/// Build a schema-valid triage estimate from keywords alone.
///
/// `preferred_language` is the caller's hint; it selects the cultural copy
/// and becomes the detected language when recognised.
pub fn classify(free_text: &str, preferred_language: &str) -> TriageResult {
    let tier = UrgencyTier::detect(free_text);
    let copy = tier.copy();
    let language = Language::from_hint(preferred_language);
    let profile = CulturalProfile::for_language(language);

    tracing::debug!(
        tier = %tier,
        language = ?language,
        text_len = free_text.len(),
        "Fallback classifier produced estimate"
    );

    TriageResult {
        detected_language: language.unwrap_or_default(),
        translated_text: free_text.to_string(),
        clinical_indicators: to_owned(copy.indicators),
        triage_level: tier.triage_level(),
        explanation: copy.explanation.to_string(),
        confidence: FALLBACK_CONFIDENCE,
        conversational_response: copy.response.to_string(),
        follow_up_questions: to_owned(copy.questions),
        is_final_assessment: false,
        next_steps: to_owned(&NEXT_STEPS),
        cultural_considerations: to_owned(profile.considerations),
        communication_style: profile.communication_style.to_string(),
        family_involvement: profile.family_involvement.to_string(),
        religious_considerations: Some(profile.religious_considerations.to_string()),
        fallback_mechanism: FallbackMechanism {
            is_activated: true,
            reason: FALLBACK_REASON.to_string(),
            alternative_approach: FALLBACK_ALTERNATIVE.to_string(),
        },
    }
}

fn to_owned(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema;

    #[test]
    fn test_keyword_sets_are_disjoint() {
        for urgent in URGENT_KEYWORDS {
            assert!(!MODERATE_KEYWORDS.contains(&urgent));
        }
    }

    #[test]
    fn test_urgent_overrides_moderate() {
        for urgent in URGENT_KEYWORDS {
            let text = format!("fever, nausea, vomiting, headache and {urgent} since morning");
            let result = classify(&text, "english");
            assert_eq!(result.triage_level, 2, "input: {text}");
        }
    }

    #[test]
    fn test_moderate_only() {
        for moderate in MODERATE_KEYWORDS {
            let result = classify(&format!("I have {moderate}"), "english");
            assert_eq!(result.triage_level, 4, "keyword: {moderate}");
        }
    }

    #[test]
    fn test_no_keywords_is_routine() {
        let result = classify("I feel a bit tired today", "english");
        assert_eq!(result.triage_level, 5);
        assert_eq!(result.confidence, FALLBACK_CONFIDENCE);
        assert_eq!(result.clinical_indicators[1], "Routine assessment");
    }

    #[test]
    fn test_matching_is_case_insensitive() {
        assert_eq!(UrgencyTier::detect("SEIZURE after a fall"), UrgencyTier::Urgent);
        assert_eq!(UrgencyTier::detect("Headache"), UrgencyTier::Moderate);
    }

    #[test]
    fn test_severe_chest_pain_scenario() {
        let result = classify("I have severe chest pain and can't breathe properly", "english");
        assert_eq!(result.triage_level, 2);
        assert_eq!(result.confidence, 75);
        assert!(result.fallback_mechanism.is_activated);
        assert_eq!(result.fallback_mechanism.reason, FALLBACK_REASON);
    }

    #[test]
    fn test_cultural_copy_follows_language_not_keywords() {
        let arabic = classify("chest pain", "arabic");
        let tamil = classify("chest pain", "tamil");
        assert_eq!(arabic.triage_level, tamil.triage_level);
        assert_eq!(
            arabic.communication_style,
            "Formal, respectful tone with Islamic cultural expressions"
        );
        assert_eq!(
            tamil.communication_style,
            "Respectful, tradition-aware, family-inclusive"
        );
        assert_eq!(arabic.detected_language, Language::Arabic);
    }

    #[test]
    fn test_bengali_hint_uses_bangla_bucket() {
        let result = classify("fever", "bengali");
        assert_eq!(result.detected_language, Language::Bangla);
        assert_eq!(result.cultural_considerations[0], "Respect for elders");
    }

    #[test]
    fn test_unknown_hint_uses_default_bucket() {
        let result = classify("fever", "vietnamese");
        assert_eq!(result.detected_language, Language::English);
        assert_eq!(
            result.cultural_considerations,
            CulturalProfile::for_language(None)
                .considerations
                .iter()
                .map(|s| s.to_string())
                .collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_english_and_unknown_share_default_copy() {
        let english = CulturalProfile::for_language(Some(Language::English));
        assert_eq!(english, CulturalProfile::for_language(None));
        assert_eq!(
            english.communication_style,
            "Professional, clear, patient-centered"
        );
        assert_eq!(
            english.family_involvement,
            "Individual decision-making with optional family involvement"
        );
        assert_eq!(
            english.considerations,
            &["Individual autonomy", "Diverse cultural backgrounds", "Direct communication"]
        );
    }

    #[test]
    fn test_fallback_results_pass_schema() {
        for hint in ["english", "arabic", "hindi", "bangla", "tamil", "klingon"] {
            for text in ["stroke", "nausea", "hello", ""] {
                let result = classify(text, hint);
                let revalidated = schema::validate(&result.to_value()).unwrap();
                assert_eq!(revalidated, result);
            }
        }
    }
}
