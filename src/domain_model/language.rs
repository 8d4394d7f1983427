use serde::{Deserialize, Serialize};
use std::fmt;

/// Languages the bot can run the verification conversation in.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    English,
    Hindi,
    Hinglish,
}

impl Language {
    pub const ALL: [Language; 3] = [Language::English, Language::Hindi, Language::Hinglish];

    /// Short code carried in callback payloads and storage rows.
    pub fn code(&self) -> &'static str {
        match self {
            Language::English => "en",
            Language::Hindi => "hi",
            Language::Hinglish => "hinglish",
        }
    }

    pub fn parse(code: &str) -> Option<Language> {
        match code {
            "en" => Some(Language::English),
            "hi" => Some(Language::Hindi),
            "hinglish" => Some(Language::Hinglish),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Language::English => "English",
            Language::Hindi => "Hindi",
            Language::Hinglish => "Hinglish",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}
