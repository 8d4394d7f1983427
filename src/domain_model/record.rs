use crate::domain_model::{ChatId, Language, PromptToken, RecordKey, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    AwaitingLanguage,
    AwaitingVerification,
    Approved,
    Rejected,
    PendingReview,
    Expired,
}

impl VerificationStatus {
    pub const ALL: [VerificationStatus; 6] = [
        VerificationStatus::AwaitingLanguage,
        VerificationStatus::AwaitingVerification,
        VerificationStatus::Approved,
        VerificationStatus::Rejected,
        VerificationStatus::PendingReview,
        VerificationStatus::Expired,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            VerificationStatus::AwaitingLanguage => "awaiting_language",
            VerificationStatus::AwaitingVerification => "awaiting_verification",
            VerificationStatus::Approved => "approved",
            VerificationStatus::Rejected => "rejected",
            VerificationStatus::PendingReview => "pending_review",
            VerificationStatus::Expired => "expired",
        }
    }

    pub fn parse(value: &str) -> Option<VerificationStatus> {
        match value {
            "awaiting_language" => Some(VerificationStatus::AwaitingLanguage),
            "awaiting_verification" => Some(VerificationStatus::AwaitingVerification),
            "approved" => Some(VerificationStatus::Approved),
            "rejected" => Some(VerificationStatus::Rejected),
            "pending_review" => Some(VerificationStatus::PendingReview),
            "expired" => Some(VerificationStatus::Expired),
            _ => None,
        }
    }

    /// Terminal states accept no further automatic transitions; a new join
    /// request for the same key creates a fresh record instead.
    /// `PendingReview` is terminal for automatic processing but remains
    /// admin-actionable.
    pub fn is_terminal(&self) -> bool {
        !matches!(
            self,
            VerificationStatus::AwaitingLanguage | VerificationStatus::AwaitingVerification
        )
    }
}

impl fmt::Display for VerificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Which prompt a deadline was armed for.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Language,
    Challenge,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Language => "language",
            Phase::Challenge => "challenge",
        }
    }

    pub fn parse(value: &str) -> Option<Phase> {
        match value {
            "language" => Some(Phase::Language),
            "challenge" => Some(Phase::Challenge),
            _ => None,
        }
    }
}

/// One verification pipeline for one (chat, user) join request.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct VerificationRecord {
    pub chat_id: ChatId,
    pub user_id: UserId,
    pub status: VerificationStatus,
    pub language: Option<Language>,
    pub attempts_used: u32,
    pub max_attempts: u32,
    pub token: PromptToken,
    /// When the current prompt was issued; `deadline` is derived from it.
    pub challenge_issued_at: DateTime<Utc>,
    /// Absolute instant the current phase expires, so stores can index it.
    pub deadline: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Optimistic-concurrency version; `RecordStore::put` only wins when the
    /// stored version still matches.
    pub version: i64,
}

impl VerificationRecord {
    /// Fresh record entering the pipeline at `AwaitingLanguage`.
    pub fn new_join(key: RecordKey, max_attempts: u32, lang_timeout: Duration, now: DateTime<Utc>) -> Self {
        Self {
            chat_id: key.chat_id,
            user_id: key.user_id,
            status: VerificationStatus::AwaitingLanguage,
            language: None,
            attempts_used: 0,
            max_attempts,
            token: PromptToken::issue(),
            challenge_issued_at: now,
            deadline: now + chrono::Duration::seconds(lang_timeout.as_secs() as i64),
            created_at: now,
            updated_at: now,
            version: 0,
        }
    }

    pub fn key(&self) -> RecordKey {
        RecordKey::new(self.chat_id, self.user_id)
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Phase the record is currently awaiting input for, if any.
    pub fn phase(&self) -> Option<Phase> {
        match self.status {
            VerificationStatus::AwaitingLanguage => Some(Phase::Language),
            VerificationStatus::AwaitingVerification => Some(Phase::Challenge),
            _ => None,
        }
    }

    pub fn is_past_deadline(&self, now: DateTime<Utc>) -> bool {
        now > self.deadline
    }

    pub fn attempts_left(&self) -> u32 {
        self.max_attempts.saturating_sub(self.attempts_used)
    }
}
