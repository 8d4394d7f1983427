use crate::application_port::GatewayError;
use crate::domain_model::{ChallengeOption, ChatId, Language, Phase, UserId};
use crate::domain_port::{RecordStoreError, RosterStoreError};

/// What a handled event did to the pipeline. Transports use this to answer
/// the user; tests assert on it directly.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum EventOutcome {
    LanguagePromptSent,
    ChallengeIssued { attempts_left: u32 },
    WrongAnswer { attempts_left: u32 },
    Approved,
    Rejected,
    HeldForReview,
    Expired,
    /// The event did not apply to the live record and was dropped.
    Ignored(IgnoreReason),
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum IgnoreReason {
    /// Token does not match the record's current prompt.
    StaleToken,
    /// The record is not in the phase the event targets.
    WrongPhase,
    /// The record already reached a terminal state.
    Terminal,
    /// The deadline the timer was armed for has not elapsed yet.
    NotDue,
    NotFound,
}

#[derive(Debug, thiserror::Error)]
pub enum VerificationError {
    #[error("storage rejected the event: {0}")]
    Store(String),
    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

impl From<RecordStoreError> for VerificationError {
    fn from(err: RecordStoreError) -> Self {
        match err {
            RecordStoreError::Conflict { key } => {
                VerificationError::Store(format!("concurrent update lost for {key}"))
            }
            RecordStoreError::Store(e) => VerificationError::Store(e),
            RecordStoreError::InternalError(e) => VerificationError::InternalError(e),
        }
    }
}

impl From<RosterStoreError> for VerificationError {
    fn from(err: RosterStoreError) -> Self {
        match err {
            RosterStoreError::Store(e) => VerificationError::Store(e),
            RosterStoreError::InternalError(e) => VerificationError::InternalError(e),
        }
    }
}

impl From<GatewayError> for VerificationError {
    fn from(err: GatewayError) -> Self {
        VerificationError::InternalError(anyhow::anyhow!(err))
    }
}

/// The verification pipeline. Each handler serializes per (chat, user) key,
/// performs one read-decide-write against the record store and emits gateway
/// directives; on storage failure the event is not applied.
#[async_trait::async_trait]
pub trait VerificationService: Send + Sync {
    /// A user asked to join `chat_id`. Creates (or supersedes) the record
    /// and prompts for language selection.
    async fn on_join_request(
        &self,
        chat_id: ChatId,
        user_id: UserId,
    ) -> Result<EventOutcome, VerificationError>;

    /// Language button pressed.
    async fn on_language_selected(
        &self,
        chat_id: ChatId,
        user_id: UserId,
        token: &str,
        language: Language,
    ) -> Result<EventOutcome, VerificationError>;

    /// Challenge button pressed.
    async fn on_challenge_response(
        &self,
        chat_id: ChatId,
        user_id: UserId,
        token: &str,
        choice: ChallengeOption,
    ) -> Result<EventOutcome, VerificationError>;

    /// A phase deadline elapsed. Fired by the sweep worker; a stale phase or
    /// token is discarded silently.
    async fn on_deadline(
        &self,
        chat_id: ChatId,
        user_id: UserId,
        phase: Phase,
        token: &str,
    ) -> Result<EventOutcome, VerificationError>;

    /// Re-send the current phase's prompt with a fresh token and deadline
    /// (the `/start` recovery path for users who lost the original message).
    async fn resume_prompt(
        &self,
        chat_id: ChatId,
        user_id: UserId,
    ) -> Result<EventOutcome, VerificationError>;
}
