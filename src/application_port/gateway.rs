use crate::domain_model::{ChallengePrompt, ChatId, Language, UserId};

/// User-facing notices the engine can ask the gateway to deliver. Rendering
/// (text, localization) belongs to the gateway.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Notice {
    Approved,
    Failed,
    Expired,
    HeldForReview,
}

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// No direct-message channel to the user can be established. The engine
    /// treats this as a hard verification failure.
    #[error("direct message channel unavailable")]
    Unreachable,
    #[error("transport error: {0}")]
    Transport(String),
}

/// Directive sink for the messaging platform. The gateway executes decisions;
/// it never makes them.
#[async_trait::async_trait]
pub trait JoinGateway: Send + Sync {
    /// Send the language-selection prompt to the user's DM channel. The
    /// chat id travels in the button payloads so the reply can be routed
    /// back to the right pipeline.
    async fn prompt_language(
        &self,
        chat_id: ChatId,
        user_id: UserId,
        token: &str,
    ) -> Result<(), GatewayError>;

    /// Send (or refresh) the human-verification challenge, shuffled per
    /// `prompt.shuffle_seed`.
    async fn prompt_challenge(
        &self,
        chat_id: ChatId,
        user_id: UserId,
        prompt: &ChallengePrompt,
    ) -> Result<(), GatewayError>;

    async fn approve_join(&self, chat_id: ChatId, user_id: UserId) -> Result<(), GatewayError>;

    async fn decline_join(&self, chat_id: ChatId, user_id: UserId) -> Result<(), GatewayError>;

    async fn notify(
        &self,
        user_id: UserId,
        notice: Notice,
        language: Language,
    ) -> Result<(), GatewayError>;
}
