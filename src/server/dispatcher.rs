use crate::application_port::{
    AdminError, AdminService, EventOutcome, IgnoreReason, VerificationService,
};
use crate::domain_model::{ChallengeOption, ChatId, FailureAction, Language, UserId};
use crate::server::{CHALLENGE_CALLBACK_PREFIX, LANGUAGE_CALLBACK_PREFIX};
use std::sync::Arc;
use teloxide::Bot;
use teloxide::dispatching::{UpdateFilterExt, UpdateHandler};
use teloxide::dptree;
use teloxide::payloads::AnswerCallbackQuerySetters;
use teloxide::requests::Requester;
use teloxide::types::{CallbackQuery, ChatJoinRequest, Message, Update};
use tracing::{debug, warn};

/// Update routing: join requests and button callbacks feed the verification
/// engine; messages carry the command surface.
pub fn schema() -> UpdateHandler<anyhow::Error> {
    dptree::entry()
        .branch(Update::filter_chat_join_request().endpoint(on_chat_join_request))
        .branch(Update::filter_callback_query().endpoint(on_callback_query))
        .branch(Update::filter_message().endpoint(on_message))
}

async fn on_chat_join_request(
    verification: Arc<dyn VerificationService>,
    event: ChatJoinRequest,
) -> anyhow::Result<()> {
    let chat_id = ChatId(event.chat.id.0);
    let user_id = UserId(event.from.id.0 as i64);
    let outcome = verification.on_join_request(chat_id, user_id).await?;
    debug!(%chat_id, %user_id, ?outcome, "join request handled");
    Ok(())
}

async fn on_callback_query(
    bot: Bot,
    verification: Arc<dyn VerificationService>,
    query: CallbackQuery,
) -> anyhow::Result<()> {
    let Some(data) = query.data.clone() else {
        bot.answer_callback_query(query.id).await?;
        return Ok(());
    };
    let user_id = UserId(query.from.id.0 as i64);

    let parts: Vec<&str> = data.split(':').collect();
    let &[kind, chat_raw, token, value] = parts.as_slice() else {
        bot.answer_callback_query(query.id)
            .text("Invalid selection.")
            .show_alert(true)
            .await?;
        return Ok(());
    };
    let Ok(chat_id) = chat_raw.parse::<ChatId>() else {
        bot.answer_callback_query(query.id)
            .text("Invalid selection.")
            .show_alert(true)
            .await?;
        return Ok(());
    };

    let (outcome, is_challenge) = match kind {
        LANGUAGE_CALLBACK_PREFIX => {
            let Some(language) = Language::parse(value) else {
                bot.answer_callback_query(query.id)
                    .text("Invalid selection.")
                    .show_alert(true)
                    .await?;
                return Ok(());
            };
            let outcome = verification
                .on_language_selected(chat_id, user_id, token, language)
                .await?;
            (outcome, false)
        }
        CHALLENGE_CALLBACK_PREFIX => {
            let Some(choice) = ChallengeOption::parse(value) else {
                bot.answer_callback_query(query.id)
                    .text("Invalid selection.")
                    .show_alert(true)
                    .await?;
                return Ok(());
            };
            let outcome = verification
                .on_challenge_response(chat_id, user_id, token, choice)
                .await?;
            (outcome, true)
        }
        _ => {
            bot.answer_callback_query(query.id).await?;
            return Ok(());
        }
    };

    let (text, alert) = callback_answer(&outcome, is_challenge);
    bot.answer_callback_query(query.id)
        .text(text)
        .show_alert(alert)
        .await?;
    Ok(())
}

fn callback_answer(outcome: &EventOutcome, is_challenge: bool) -> (String, bool) {
    match outcome {
        EventOutcome::ChallengeIssued { .. } if !is_challenge => {
            ("Language saved.".to_owned(), false)
        }
        EventOutcome::ChallengeIssued { .. } => ("New challenge sent.".to_owned(), false),
        EventOutcome::Approved => ("Verified.".to_owned(), false),
        EventOutcome::WrongAnswer { attempts_left } => (
            format!("Wrong choice. Attempts left: {attempts_left}."),
            true,
        ),
        EventOutcome::Rejected => ("Failed.".to_owned(), true),
        EventOutcome::Expired => ("Expired.".to_owned(), true),
        EventOutcome::HeldForReview => {
            ("Held for admin review.".to_owned(), true)
        }
        EventOutcome::LanguagePromptSent => ("Please pick a language.".to_owned(), false),
        EventOutcome::Ignored(IgnoreReason::NotFound) => ("Expired.".to_owned(), true),
        EventOutcome::Ignored(_) => ("Already handled.".to_owned(), true),
    }
}

async fn on_message(
    bot: Bot,
    verification: Arc<dyn VerificationService>,
    admin: Arc<dyn AdminService>,
    msg: Message,
) -> anyhow::Result<()> {
    let Some(text) = msg.text().map(|t| t.trim().to_owned()) else {
        return Ok(());
    };
    if !text.starts_with('/') {
        return Ok(());
    }
    let Some(from) = msg.from.as_ref() else {
        return Ok(());
    };
    let caller = UserId(from.id.0 as i64);

    let parts: Vec<&str> = text.split_whitespace().collect();
    let head = parts.first().copied().unwrap_or_default();
    // Commands in groups arrive as /cmd@botname.
    let command = head.split('@').next().unwrap_or(head);

    match command {
        "/start" => on_start(&bot, verification.as_ref(), &msg, caller, &parts).await,
        "/status" => {
            let scope = if msg.chat.is_private() {
                None
            } else {
                Some(ChatId(msg.chat.id.0))
            };
            match admin.status(caller, scope).await {
                Ok(counts) => {
                    let mut lines = vec!["Status counts:".to_owned()];
                    for (status, count) in counts {
                        lines.push(format!("{status}: {count}"));
                    }
                    reply(&bot, &msg, lines.join("\n")).await
                }
                Err(e) => reply_admin_error(&bot, &msg, e).await,
            }
        }
        "/setattempts" => match parse_number::<u32>(&parts) {
            Some(value) => match admin.set_max_attempts(caller, value).await {
                Ok(()) => reply(&bot, &msg, format!("Max attempts set to {value}.")).await,
                Err(e) => reply_admin_error(&bot, &msg, e).await,
            },
            None => reply(&bot, &msg, "Usage: /setattempts <number>".to_owned()).await,
        },
        "/settimeout" => match parse_number::<u64>(&parts) {
            Some(secs) => match admin.set_verify_timeout(caller, secs).await {
                Ok(()) => {
                    reply(&bot, &msg, format!("Verification timeout set to {secs} seconds.")).await
                }
                Err(e) => reply_admin_error(&bot, &msg, e).await,
            },
            None => reply(&bot, &msg, "Usage: /settimeout <seconds>".to_owned()).await,
        },
        "/setlangtimeout" => match parse_number::<u64>(&parts) {
            Some(secs) => match admin.set_lang_timeout(caller, secs).await {
                Ok(()) => {
                    reply(&bot, &msg, format!("Language timeout set to {secs} seconds.")).await
                }
                Err(e) => reply_admin_error(&bot, &msg, e).await,
            },
            None => reply(&bot, &msg, "Usage: /setlangtimeout <seconds>".to_owned()).await,
        },
        "/setfailure" => match parts.get(1).and_then(|v| FailureAction::parse(v)) {
            Some(action) => match admin.set_failure_action(caller, action).await {
                Ok(()) => reply(&bot, &msg, format!("Failure action set to {action}.")).await,
                Err(e) => reply_admin_error(&bot, &msg, e).await,
            },
            None => reply(&bot, &msg, "Usage: /setfailure reject|pending".to_owned()).await,
        },
        "/approve" | "/reject" => {
            let Some(user_id) = parts.get(1).and_then(|v| v.parse::<UserId>().ok()) else {
                return reply(&bot, &msg, format!("Usage: {command} <user_id> [chat_id]")).await;
            };
            let chat_id = match parts.get(2) {
                Some(raw) => match raw.parse::<ChatId>() {
                    Ok(chat) => chat,
                    Err(_) => return reply(&bot, &msg, "Invalid IDs.".to_owned()).await,
                },
                None => ChatId(msg.chat.id.0),
            };
            let result = if command == "/approve" {
                admin.approve(caller, user_id, chat_id).await
            } else {
                admin.reject(caller, user_id, chat_id).await
            };
            match result {
                Ok(()) if command == "/approve" => reply(&bot, &msg, "Approved.".to_owned()).await,
                Ok(()) => reply(&bot, &msg, "Rejected.".to_owned()).await,
                Err(e) => reply_admin_error(&bot, &msg, e).await,
            }
        }
        "/whitelist" | "/blacklist" => {
            let action = parts.get(1).copied();
            let target = parts.get(2).and_then(|v| v.parse::<UserId>().ok());
            let (Some(action), Some(user_id)) = (action, target) else {
                return reply(&bot, &msg, format!("Usage: {command} add|remove <user_id>")).await;
            };
            let result = match (command, action) {
                ("/whitelist", "add") => admin.whitelist_add(caller, user_id).await,
                ("/whitelist", "remove") => admin.whitelist_remove(caller, user_id).await,
                ("/blacklist", "add") => admin.blacklist_add(caller, user_id).await,
                ("/blacklist", "remove") => admin.blacklist_remove(caller, user_id).await,
                _ => {
                    return reply(&bot, &msg, format!("Usage: {command} add|remove <user_id>"))
                        .await;
                }
            };
            match result {
                Ok(()) => reply(&bot, &msg, "Done.".to_owned()).await,
                Err(e) => reply_admin_error(&bot, &msg, e).await,
            }
        }
        _ => Ok(()),
    }
}

/// `/start join_<chat_id>` re-sends the pending prompt for that chat; a bare
/// `/start` explains what the bot is for.
async fn on_start(
    bot: &Bot,
    verification: &dyn VerificationService,
    msg: &Message,
    caller: UserId,
    parts: &[&str],
) -> anyhow::Result<()> {
    let payload = parts.get(1).copied().unwrap_or_default();
    let Some(chat_raw) = payload.strip_prefix("join_") else {
        return reply(
            bot,
            msg,
            "Hi! Request to join a chat I protect and I will walk you through verification."
                .to_owned(),
        )
        .await;
    };
    let Ok(chat_id) = chat_raw.parse::<ChatId>() else {
        return reply(bot, msg, "Invalid link payload.".to_owned()).await;
    };

    let outcome = verification.resume_prompt(chat_id, caller).await?;
    match outcome {
        EventOutcome::LanguagePromptSent | EventOutcome::ChallengeIssued { .. } => Ok(()),
        EventOutcome::Ignored(IgnoreReason::NotFound) => {
            reply(bot, msg, "No pending join requests found.".to_owned()).await
        }
        EventOutcome::Ignored(IgnoreReason::Terminal) => {
            reply(bot, msg, "Your request has already been decided.".to_owned()).await
        }
        other => {
            debug!(?other, "resume prompt outcome");
            Ok(())
        }
    }
}

fn parse_number<T: std::str::FromStr>(parts: &[&str]) -> Option<T> {
    if parts.len() != 2 {
        return None;
    }
    parts[1].parse::<T>().ok()
}

async fn reply(bot: &Bot, msg: &Message, text: String) -> anyhow::Result<()> {
    bot.send_message(msg.chat.id, text).await?;
    Ok(())
}

async fn reply_admin_error(bot: &Bot, msg: &Message, error: AdminError) -> anyhow::Result<()> {
    let text = match &error {
        AdminError::NotAdmin => "You are not allowed to do that.".to_owned(),
        AdminError::NotWhitelisted => "User is not whitelisted for manual approval.".to_owned(),
        AdminError::InvalidValue(reason) => format!("Rejected: {reason}"),
        AdminError::Store(_) | AdminError::InternalError(_) => {
            warn!(error = %error, "admin command failed");
            "Command failed, please try again.".to_owned()
        }
    };
    reply(bot, msg, text).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn callback_answers_match_outcomes() {
        let (text, alert) =
            callback_answer(&EventOutcome::ChallengeIssued { attempts_left: 3 }, false);
        assert_eq!(text, "Language saved.");
        assert!(!alert);

        let (text, alert) = callback_answer(&EventOutcome::WrongAnswer { attempts_left: 1 }, true);
        assert_eq!(text, "Wrong choice. Attempts left: 1.");
        assert!(alert);

        let (_, alert) = callback_answer(
            &EventOutcome::Ignored(IgnoreReason::StaleToken),
            true,
        );
        assert!(alert);
    }

    #[test]
    fn numbers_parse_only_with_exactly_one_argument() {
        assert_eq!(parse_number::<u32>(&["/setattempts", "4"]), Some(4));
        assert_eq!(parse_number::<u32>(&["/setattempts"]), None);
        assert_eq!(parse_number::<u32>(&["/setattempts", "4", "5"]), None);
        assert_eq!(parse_number::<u32>(&["/setattempts", "many"]), None);
    }
}
