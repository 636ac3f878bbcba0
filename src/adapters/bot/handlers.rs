//! Summarizer bot: dispatcher wiring and command handlers.
//!
//! Every handler error is turned into a single user-facing reply; the
//! dispatch loop itself never dies on a failed LLM or storage call.

use crate::adapters::bot::commands::{Command, Route, route, split_reply};
use crate::domain::DomainError;
use crate::ports::{LlmPort, MessageStore};
use crate::usecases::{DigestOutcome, DigestService};
use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;
use tracing::{error, info};

pub struct BotDeps {
    pub llm: Arc<dyn LlmPort>,
    pub store: Arc<dyn MessageStore>,
    pub digest: Arc<DigestService>,
}

pub async fn run(bot: Bot, deps: Arc<BotDeps>) -> Result<(), DomainError> {
    let me = bot
        .get_me()
        .await
        .map_err(|e| DomainError::TgGateway(format!("getMe: {}", e)))?;
    let bot_name = me.username().to_string();
    info!(bot = %bot_name, "summarizer bot started");

    let handler = Update::filter_message().endpoint(handle_message);

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![deps, bot_name])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}

async fn handle_message(
    bot: Bot,
    msg: Message,
    deps: Arc<BotDeps>,
    bot_name: String,
) -> ResponseResult<()> {
    let Some(text) = msg.text() else {
        return Ok(());
    };
    let Some(route) = route(text, &bot_name) else {
        return Ok(());
    };

    let reply = match dispatch(&route, &deps).await {
        Ok(reply) => reply,
        Err(e) => {
            error!(chat_id = msg.chat.id.0, error = %e, "handler failed");
            error_reply(&e)
        }
    };
    for part in split_reply(&reply) {
        bot.send_message(msg.chat.id, part).await?;
    }
    Ok(())
}

async fn dispatch(route: &Route, deps: &BotDeps) -> Result<String, DomainError> {
    match route {
        Route::Command(Command::Start) => Ok(format!(
            "Привет! Я суммаризирую собранные сообщения Telegram.\n\n{}",
            Command::descriptions()
        )),
        Route::Command(Command::Help) => Ok(Command::descriptions().to_string()),
        Route::Command(Command::Status) => {
            deps.llm.verify().await?;
            Ok("GigaChat доступен.".to_string())
        }
        Route::Command(Command::Stats) => {
            let stats = deps.store.stats().await?;
            Ok(format!(
                "Всего сообщений: {}\nНеобработанных: {}\nОбработанных: {}\nЧатов: {}\nСводок: {}",
                stats.total_messages,
                stats.new_messages,
                stats.processed_messages,
                stats.distinct_chats,
                stats.summaries
            ))
        }
        Route::Command(Command::Summary) => digest_reply(deps, None).await,
        Route::Command(Command::SummaryChat(chat_id)) => digest_reply(deps, Some(*chat_id)).await,
        Route::Command(Command::History) => {
            let summaries = deps.store.recent_summaries(5).await?;
            if summaries.is_empty() {
                return Ok("Сводок пока нет.".to_string());
            }
            let blocks: Vec<String> = summaries
                .iter()
                .map(|s| {
                    format!(
                        "#{} ({} сообщ.)\n{}",
                        s.id, s.message_count, s.summary_text
                    )
                })
                .collect();
            Ok(blocks.join("\n\n"))
        }
        Route::Ask(question) => Ok(deps.llm.ask(question).await?),
    }
}

async fn digest_reply(deps: &BotDeps, chat_id: Option<i64>) -> Result<String, DomainError> {
    match deps.digest.digest(chat_id).await? {
        DigestOutcome::Empty => Ok("Новых сообщений нет.".to_string()),
        DigestOutcome::NoText => {
            Ok("Новые сообщения есть, но текста в них нет (только медиа).".to_string())
        }
        DigestOutcome::Generated {
            summary,
            message_count,
        } => Ok(format!("Сводка по {} сообщ.:\n\n{}", message_count, summary)),
    }
}

/// One short apologetic reply per error kind; LLM errors carry their own
/// user-facing wording.
fn error_reply(e: &DomainError) -> String {
    match e {
        DomainError::Llm(llm) => llm.user_message().to_string(),
        _ => "Произошла внутренняя ошибка, попробуйте позже.".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::llm::MockLlm;
    use crate::adapters::persistence::SqliteStore;
    use crate::domain::{LlmError, StoredMessage};

    async fn deps() -> BotDeps {
        let store: Arc<SqliteStore> = Arc::new(SqliteStore::connect_in_memory().await.unwrap());
        let llm = Arc::new(MockLlm::with_delay(1));
        BotDeps {
            llm: llm.clone(),
            store: store.clone(),
            digest: Arc::new(DigestService::new(llm, store)),
        }
    }

    #[tokio::test]
    async fn stats_reply_reflects_the_store() {
        let deps = deps().await;
        deps.store
            .save_message(&StoredMessage {
                id: 1,
                chat_id: 7,
                sender: Some("Alice".into()),
                text: "hi".into(),
                date: 1_700_000_000,
                summarized: false,
            })
            .await
            .unwrap();

        let reply = dispatch(&Route::Command(Command::Stats), &deps)
            .await
            .unwrap();
        assert!(reply.contains("Всего сообщений: 1"));
        assert!(reply.contains("Необработанных: 1"));
    }

    #[tokio::test]
    async fn summary_of_empty_store_says_so() {
        let deps = deps().await;
        let reply = dispatch(&Route::Command(Command::Summary), &deps)
            .await
            .unwrap();
        assert_eq!(reply, "Новых сообщений нет.");
    }

    #[tokio::test]
    async fn summary_generates_and_history_shows_it() {
        let deps = deps().await;
        deps.store
            .save_message(&StoredMessage {
                id: 1,
                chat_id: 7,
                sender: Some("Alice".into()),
                text: "обсуждение релиза".into(),
                date: 1_700_000_000,
                summarized: false,
            })
            .await
            .unwrap();

        let reply = dispatch(&Route::Command(Command::Summary), &deps)
            .await
            .unwrap();
        assert!(reply.contains("Сводка по 1 сообщ."));

        let history = dispatch(&Route::Command(Command::History), &deps)
            .await
            .unwrap();
        assert!(history.contains("#1 (1 сообщ.)"));
    }

    #[tokio::test]
    async fn free_text_is_answered_by_the_assistant() {
        let deps = deps().await;
        let reply = dispatch(&Route::Ask("вопрос".into()), &deps).await.unwrap();
        assert!(!reply.is_empty());
    }

    #[test]
    fn llm_errors_map_to_their_user_wording() {
        let reply = error_reply(&DomainError::Llm(LlmError::RateLimit("429".into())));
        assert_eq!(reply, LlmError::RateLimit("429".into()).user_message());

        let generic = error_reply(&DomainError::Storage("disk".into()));
        assert!(generic.contains("попробуйте позже"));
    }
}
