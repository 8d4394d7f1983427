use crate::application_port::{GatewayError, JoinGateway, Notice};
use crate::domain_model::{ChallengeOption, ChallengePrompt, ChatId, Language, UserId};
use crate::server::texts;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use teloxide::Bot;
use teloxide::payloads::SendMessageSetters;
use teloxide::requests::Requester;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};
use tracing::debug;

pub const LANGUAGE_CALLBACK_PREFIX: &str = "lang";
pub const CHALLENGE_CALLBACK_PREFIX: &str = "verify";

fn tg_chat(chat_id: ChatId) -> teloxide::types::ChatId {
    teloxide::types::ChatId(chat_id.0)
}

/// A user's DM channel shares the user's numeric id.
fn tg_dm(user_id: UserId) -> teloxide::types::ChatId {
    teloxide::types::ChatId(user_id.0)
}

fn tg_user(user_id: UserId) -> teloxide::types::UserId {
    teloxide::types::UserId(user_id.0 as u64)
}

/// The platform rejecting a DM send (blocked bot, conversation never started)
/// means there is no channel to verify this user over.
fn dm_send_error(e: teloxide::RequestError) -> GatewayError {
    match &e {
        teloxide::RequestError::Api(_) => GatewayError::Unreachable,
        _ => GatewayError::Transport(e.to_string()),
    }
}

pub fn language_keyboard(chat_id: ChatId, token: &str) -> InlineKeyboardMarkup {
    let rows: Vec<Vec<InlineKeyboardButton>> = Language::ALL
        .iter()
        .map(|lang| {
            vec![InlineKeyboardButton::callback(
                lang.label(),
                format!(
                    "{LANGUAGE_CALLBACK_PREFIX}:{chat_id}:{token}:{}",
                    lang.code()
                ),
            )]
        })
        .collect();
    InlineKeyboardMarkup::new(rows)
}

/// Two buttons per row, order drawn from the prompt's seed so every
/// presentation is arranged differently.
pub fn challenge_keyboard(chat_id: ChatId, prompt: &ChallengePrompt) -> InlineKeyboardMarkup {
    let mut options = ChallengeOption::ALL;
    let mut rng = StdRng::seed_from_u64(prompt.shuffle_seed);
    options.shuffle(&mut rng);

    let rows: Vec<Vec<InlineKeyboardButton>> = options
        .chunks(2)
        .map(|pair| {
            pair.iter()
                .map(|option| {
                    InlineKeyboardButton::callback(
                        texts::challenge_button(*option),
                        format!(
                            "{CHALLENGE_CALLBACK_PREFIX}:{chat_id}:{}:{}",
                            prompt.token,
                            option.key()
                        ),
                    )
                })
                .collect()
        })
        .collect();
    InlineKeyboardMarkup::new(rows)
}

/// Executes engine directives against the Telegram Bot API.
pub struct TelegramJoinGateway {
    bot: Bot,
}

impl TelegramJoinGateway {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait::async_trait]
impl JoinGateway for TelegramJoinGateway {
    async fn prompt_language(
        &self,
        chat_id: ChatId,
        user_id: UserId,
        token: &str,
    ) -> Result<(), GatewayError> {
        // The requester has not picked a language yet.
        self.bot
            .send_message(tg_dm(user_id), texts::welcome(Language::English))
            .reply_markup(language_keyboard(chat_id, token))
            .await
            .map_err(dm_send_error)?;
        debug!(%user_id, "language prompt delivered");
        Ok(())
    }

    async fn prompt_challenge(
        &self,
        chat_id: ChatId,
        user_id: UserId,
        prompt: &ChallengePrompt,
    ) -> Result<(), GatewayError> {
        self.bot
            .send_message(tg_dm(user_id), texts::verify(prompt.language))
            .reply_markup(challenge_keyboard(chat_id, prompt))
            .await
            .map_err(dm_send_error)?;
        debug!(%user_id, "challenge prompt delivered");
        Ok(())
    }

    async fn approve_join(&self, chat_id: ChatId, user_id: UserId) -> Result<(), GatewayError> {
        self.bot
            .approve_chat_join_request(tg_chat(chat_id), tg_user(user_id))
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;
        Ok(())
    }

    async fn decline_join(&self, chat_id: ChatId, user_id: UserId) -> Result<(), GatewayError> {
        self.bot
            .decline_chat_join_request(tg_chat(chat_id), tg_user(user_id))
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;
        Ok(())
    }

    async fn notify(
        &self,
        user_id: UserId,
        notice: Notice,
        language: Language,
    ) -> Result<(), GatewayError> {
        let text = match notice {
            Notice::Approved => texts::success(language),
            Notice::Failed => texts::failed(language),
            Notice::Expired => texts::expired(language),
            Notice::HeldForReview => texts::held_for_review(language),
        };
        self.bot
            .send_message(tg_dm(user_id), text)
            .await
            .map_err(dm_send_error)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain_model::PromptToken;
    use teloxide::types::InlineKeyboardButtonKind;

    fn payloads(markup: &InlineKeyboardMarkup) -> Vec<String> {
        markup
            .inline_keyboard
            .iter()
            .flatten()
            .map(|button| match &button.kind {
                InlineKeyboardButtonKind::CallbackData(data) => data.clone(),
                other => panic!("unexpected button kind: {other:?}"),
            })
            .collect()
    }

    #[test]
    fn language_keyboard_carries_chat_and_token_per_button() {
        let markup = language_keyboard(ChatId(-1001), "abc123");
        assert_eq!(
            payloads(&markup),
            vec![
                "lang:-1001:abc123:en",
                "lang:-1001:abc123:hi",
                "lang:-1001:abc123:hinglish"
            ]
        );
    }

    #[test]
    fn challenge_keyboard_is_deterministic_per_seed() {
        let prompt = ChallengePrompt {
            token: PromptToken("deadbeef00000000".to_owned()),
            language: Language::English,
            shuffle_seed: 7,
            attempts_left: 3,
        };
        let first = payloads(&challenge_keyboard(ChatId(-1001), &prompt));
        let second = payloads(&challenge_keyboard(ChatId(-1001), &prompt));
        assert_eq!(first, second);

        let mut sorted = first.clone();
        sorted.sort();
        assert_eq!(
            sorted,
            vec![
                "verify:-1001:deadbeef00000000:auto",
                "verify:-1001:deadbeef00000000:bot",
                "verify:-1001:deadbeef00000000:human",
                "verify:-1001:deadbeef00000000:skip",
            ]
        );
    }
}
