//! Minimal echo bot. Useful as a connectivity check for the bot token.

use teloxide::prelude::*;
use tracing::info;

pub async fn run(bot: Bot) {
    info!("echo bot started");
    teloxide::repl(bot, |bot: Bot, msg: Message| async move {
        if let Some(text) = msg.text() {
            bot.send_message(msg.chat.id, text.to_string()).await?;
        }
        Ok(())
    })
    .await;
}
