use crate::domain_model::{Language, PromptToken};
use serde::{Deserialize, Serialize};

/// The options offered by the human-verification keyboard. Exactly one of
/// them is the correct answer; the rest exist to trap blind-click automation.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChallengeOption {
    Human,
    Bot,
    Skip,
    Auto,
}

impl ChallengeOption {
    pub const ALL: [ChallengeOption; 4] = [
        ChallengeOption::Human,
        ChallengeOption::Bot,
        ChallengeOption::Skip,
        ChallengeOption::Auto,
    ];

    pub fn is_correct(&self) -> bool {
        matches!(self, ChallengeOption::Human)
    }

    /// Key carried in callback payloads.
    pub fn key(&self) -> &'static str {
        match self {
            ChallengeOption::Human => "human",
            ChallengeOption::Bot => "bot",
            ChallengeOption::Skip => "skip",
            ChallengeOption::Auto => "auto",
        }
    }

    pub fn parse(key: &str) -> Option<ChallengeOption> {
        match key {
            "human" => Some(ChallengeOption::Human),
            "bot" => Some(ChallengeOption::Bot),
            "skip" => Some(ChallengeOption::Skip),
            "auto" => Some(ChallengeOption::Auto),
            _ => None,
        }
    }
}

/// Everything a gateway needs to render one challenge presentation.
///
/// The engine only decides that a fresh arrangement is needed; the actual
/// shuffling happens in the gateway, driven by `shuffle_seed`, so the core
/// stays free of presentation concerns.
#[derive(Debug, Clone)]
pub struct ChallengePrompt {
    pub token: PromptToken,
    pub language: Language,
    pub shuffle_seed: u64,
    pub attempts_left: u32,
}
