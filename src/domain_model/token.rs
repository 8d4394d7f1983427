use nanoid::nanoid;
use serde::{Deserialize, Serialize};
use std::fmt;

const TOKEN_ALPHABET: [char; 16] = [
    '1', '2', '3', '4', '5', '6', '7', '8', '9', '0', 'a', 'b', 'c', 'd', 'e', 'f',
];

/// Per-phase nonce binding a prompt (and its buttons) to one record state.
/// A callback or timer carrying a token that no longer matches the live
/// record is stale and must not take effect.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(transparent)]
pub struct PromptToken(pub String);

impl PromptToken {
    pub fn issue() -> Self {
        PromptToken(nanoid!(16, &TOKEN_ALPHABET))
    }

    pub fn matches(&self, presented: &str) -> bool {
        self.0 == presented
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PromptToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
