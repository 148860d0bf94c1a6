//! Request construction for the triage model
//!
//! Builds the chat message list: fixed system instructions (scope rule,
//! cultural rules, triage scale, output schema), the prior turns role-tagged in
//! order, then the new patient message carrying the preferred-language hint.

use crate::session::{Role, Turn, HISTORY_WINDOW};
use serde::{Deserialize, Serialize};

/// Reply the model must give for non-medical questions.
pub const OUT_OF_SCOPE_REPLY: &str = "I'm sorry, but I only answer medical-related questions and queries. Please tell me about any symptoms or health concerns you're experiencing, and I'll be happy to help.";

const INITIAL_CONTEXT: &str = "This is the initial conversation with the patient.";

/// One chat-completions message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }

    fn from_turn(turn: &Turn) -> Self {
        match turn.role {
            Role::User => Self::user(turn.text.clone()),
            Role::Bot => Self::assistant(turn.text.clone()),
        }
    }
}

const IDENTITY: &str = "You are TRIBOT, a culturally-aware multilingual emergency department triage assistant. Your mission is to bridge cultural and linguistic gaps in healthcare while providing professional medical assessment.";

const CULTURAL_RULES: &str = r#"CULTURAL NUANCES & COMMUNICATION STYLES:

**Arabic-speaking patients:** formal, respectful tone with Islamic cultural sensitivity; acknowledge family involvement in decisions; be aware of modesty and gender-sensitive topics; use "إن شاء الله" (God willing) when appropriate; respect Ramadan fasting where relevant.

**Bengali/Bangla-speaking patients:** warm, relationship-building language; respect elders and family hierarchy; be sensitive to economic concerns about healthcare costs; acknowledge traditional medicine respectfully; use honorifics appropriately.

**Hindi-speaking patients:** respect family decision-making; be sensitive to social considerations; acknowledge Ayurvedic and traditional practices; use honorifics (ji, sahib/madam); consider religious dietary restrictions.

**Tamil-speaking patients:** respect strong family involvement; be aware of traditional Siddha medicine; use respectful Tamil honorifics; consider vegetarian dietary preferences; acknowledge cultural pride and identity.

**English-speaking patients:** adapt to individual preferences; consider diverse cultural backgrounds; be direct but empathetic; respect individual autonomy."#;

const FALLBACK_RULES: &str = r#"FALLBACK MECHANISMS (ALWAYS IMPLEMENT):
1. Language complexity: simplify medical terms into everyday language.
2. Cultural misunderstanding: ask clarifying questions respectfully.
3. Communication barrier: offer alternative explanations when the patient seems confused.
4. Family involvement: acknowledge family consultation needs when the patient hesitates.
5. Religious or cultural practice: find respectful compromises when advice conflicts with practice.
6. Emergency override: in life-threatening situations prioritise immediate care.
Set fallbackMechanism.isActivated to true whenever you are unsure what the patient means."#;

const LANGUAGE_RULES: &str = r#"CRITICAL LANGUAGE RULE:
- Detect the language the patient actually wrote in; the preferred language is only a hint.
- Respond ENTIRELY in that language (Arabic, Bengali/Bangla, Hindi, Tamil or English).
- conversationalResponse and followUpQuestions must be in the patient's language.
- translatedText must be an accurate English rendering for the clinical record."#;

const TRIAGE_SCALE: &str = r#"Australian Triage Scale (ATS):
- ATS 1: Immediately life-threatening (cardiac arrest, major trauma)
- ATS 2: Very urgent, within 10 minutes (severe chest pain, difficulty breathing)
- ATS 3: Urgent, within 30 minutes (moderate pain, neurological symptoms)
- ATS 4: Semi-urgent, within 60 minutes (mild systemic symptoms)
- ATS 5: Non-urgent, within 120 minutes (minor complaints)"#;

const OUTPUT_SCHEMA: &str = r#"CRITICAL JSON OUTPUT REQUIREMENTS:
Return a single JSON object and nothing else, with exactly these fields and types:
- "detectedLanguage": STRING, one of "english", "arabic", "hindi", "bangla", "tamil"
- "translatedText": STRING
- "clinicalIndicators": ARRAY of STRINGS (use [] if empty)
- "triageLevel": INTEGER between 1 and 5, never a string
- "explanation": STRING
- "confidence": INTEGER between 0 and 100, never a string
- "conversationalResponse": STRING, culturally appropriate, in the patient's language
- "followUpQuestions": ARRAY of STRINGS, 1-2 questions in the patient's language (use [] if none)
- "isFinalAssessment": BOOLEAN, never a string
- "nextSteps": ARRAY of STRINGS
- "culturalConsiderations": ARRAY of STRINGS
- "communicationStyle": STRING
- "familyInvolvement": STRING
- "religiousConsiderations": STRING (may be empty)
- "fallbackMechanism": OBJECT with "isActivated" (BOOLEAN), "reason" (STRING), "alternativeApproach" (STRING)

Do not include any text before or after the JSON object. All arrays contain only strings. All numbers are actual numbers."#;

/// Numbered transcript of prior turns, or the initial-conversation marker.
pub fn conversation_context(history: &[Turn]) -> String {
    if history.is_empty() {
        return INITIAL_CONTEXT.to_string();
    }
    history
        .iter()
        .enumerate()
        .map(|(i, turn)| {
            let speaker = match turn.role {
                Role::User => "Patient",
                Role::Bot => "Assistant",
            };
            format!("{}. {}: {}", i + 1, speaker, turn.text)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Full system instructions for one request.
pub fn system_prompt(history: &[Turn]) -> String {
    let input_context = if history.is_empty() {
        "This is an initial symptom report."
    } else {
        "This is a response to a follow-up question."
    };

    format!(
        "{IDENTITY}\n\n\
         CRITICAL SCOPE LIMITATION:\n\
         - You ONLY respond to medical-related questions, symptoms and healthcare queries.\n\
         - For non-medical topics respond with: \"{OUT_OF_SCOPE_REPLY}\"\n\n\
         {CULTURAL_RULES}\n\n\
         {FALLBACK_RULES}\n\n\
         {LANGUAGE_RULES}\n\n\
         {TRIAGE_SCALE}\n\n\
         Conversation Context:\n{context}\n\n\
         Current Input Context:\n{input_context}\n\n\
         {OUTPUT_SCHEMA}",
        context = conversation_context(history),
    )
}

/// Final user message: the patient text plus the language hint and context.
pub fn user_message(text: &str, preferred_language: &str, history: &[Turn]) -> String {
    format!(
        "Patient input: \"{}\"\nPreferred language context: {}\nConversation context: {}\nIs follow-up response: {}",
        text,
        preferred_language,
        conversation_context(history),
        !history.is_empty()
    )
}

/// Assemble the message list. History beyond the last six turns is dropped.
pub fn build_messages(text: &str, preferred_language: &str, history: &[Turn]) -> Vec<ChatMessage> {
    let start = history.len().saturating_sub(HISTORY_WINDOW);
    let history = &history[start..];

    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(ChatMessage::system(system_prompt(history)));
    messages.extend(history.iter().map(ChatMessage::from_turn));
    messages.push(ChatMessage::user(user_message(
        text,
        preferred_language,
        history,
    )));
    messages
}
