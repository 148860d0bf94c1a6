//! Patient languages and label normalization

use serde::{Deserialize, Serialize};

/// The five languages the triage assistant converses in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    English,
    Arabic,
    Hindi,
    Bangla,
    Tamil,
}

impl Language {
    pub const ALL: [Language; 5] = [
        Self::English,
        Self::Arabic,
        Self::Hindi,
        Self::Bangla,
        Self::Tamil,
    ];

    /// Canonical wire label.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::English => "english",
            Self::Arabic => "arabic",
            Self::Hindi => "hindi",
            Self::Bangla => "bangla",
            Self::Tamil => "tamil",
        }
    }

    /// Name shown on the interpreter panel.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::English => "English",
            Self::Arabic => "Arabic (العربية)",
            Self::Hindi => "Hindi (हिंदी)",
            Self::Bangla => "Bengali (বাংলা)",
            Self::Tamil => "Tamil (தமிழ்)",
        }
    }

    /// Recognise a free-form label by substring, case-insensitively.
    ///
    /// Returns `None` when the label names none of the supported languages.
    pub fn from_hint(label: &str) -> Option<Self> {
        let label = label.to_lowercase();
        if label.contains("bengali") || label.contains("bangla") {
            Some(Self::Bangla)
        } else if label.contains("hindi") {
            Some(Self::Hindi)
        } else if label.contains("arabic") {
            Some(Self::Arabic)
        } else if label.contains("tamil") {
            Some(Self::Tamil)
        } else if label.contains("english") {
            Some(Self::English)
        } else {
            None
        }
    }

    /// Map whatever the upstream model called the language onto a canonical
    /// label; anything unrecognised is English.
    pub fn normalize(label: &str) -> Self {
        Self::from_hint(label).unwrap_or(Self::English)
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
