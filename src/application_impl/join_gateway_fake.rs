use crate::application_port::{GatewayError, JoinGateway, Notice};
use crate::domain_model::{ChallengePrompt, ChatId, Language, UserId};
use std::collections::HashSet;
use std::sync::Mutex;

/// Everything a gateway was asked to do, in order.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum SentDirective {
    LanguagePrompt {
        chat_id: ChatId,
        user_id: UserId,
        token: String,
    },
    ChallengePrompt {
        chat_id: ChatId,
        user_id: UserId,
        token: String,
        attempts_left: u32,
    },
    Approve {
        chat_id: ChatId,
        user_id: UserId,
    },
    Decline {
        chat_id: ChatId,
        user_id: UserId,
    },
    Notice {
        user_id: UserId,
        notice: Notice,
        language: Language,
    },
}

/// Recording gateway for tests and the "fake" backend: executes nothing,
/// remembers everything.
#[derive(Debug, Default)]
pub struct FakeJoinGateway {
    sent: Mutex<Vec<SentDirective>>,
    unreachable: Mutex<HashSet<UserId>>,
}

impl FakeJoinGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make DM prompts to `user_id` fail with `GatewayError::Unreachable`.
    pub fn mark_unreachable(&self, user_id: UserId) {
        self.unreachable
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(user_id);
    }

    pub fn sent(&self) -> Vec<SentDirective> {
        self.sent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn record(&self, directive: SentDirective) {
        self.sent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(directive);
    }

    fn dm_channel(&self, user_id: UserId) -> Result<(), GatewayError> {
        if self
            .unreachable
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(&user_id)
        {
            return Err(GatewayError::Unreachable);
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl JoinGateway for FakeJoinGateway {
    async fn prompt_language(
        &self,
        chat_id: ChatId,
        user_id: UserId,
        token: &str,
    ) -> Result<(), GatewayError> {
        self.dm_channel(user_id)?;
        self.record(SentDirective::LanguagePrompt {
            chat_id,
            user_id,
            token: token.to_owned(),
        });
        Ok(())
    }

    async fn prompt_challenge(
        &self,
        chat_id: ChatId,
        user_id: UserId,
        prompt: &ChallengePrompt,
    ) -> Result<(), GatewayError> {
        self.dm_channel(user_id)?;
        self.record(SentDirective::ChallengePrompt {
            chat_id,
            user_id,
            token: prompt.token.as_str().to_owned(),
            attempts_left: prompt.attempts_left,
        });
        Ok(())
    }

    async fn approve_join(&self, chat_id: ChatId, user_id: UserId) -> Result<(), GatewayError> {
        self.record(SentDirective::Approve { chat_id, user_id });
        Ok(())
    }

    async fn decline_join(&self, chat_id: ChatId, user_id: UserId) -> Result<(), GatewayError> {
        self.record(SentDirective::Decline { chat_id, user_id });
        Ok(())
    }

    async fn notify(
        &self,
        user_id: UserId,
        notice: Notice,
        language: Language,
    ) -> Result<(), GatewayError> {
        if self.dm_channel(user_id).is_err() {
            // Notices to unreachable users are dropped, like the real thing.
            return Err(GatewayError::Unreachable);
        }
        self.record(SentDirective::Notice {
            user_id,
            notice,
            language,
        });
        Ok(())
    }
}
