//! Bot command definitions and message routing.
//!
//! Routing is a pure function over the message text so it can be tested
//! without a network: a recognized command wins, anything else (including
//! unknown slash commands) falls through to the assistant.

use teloxide::utils::command::BotCommands;

/// Telegram imposes a 4096 character cap per message.
pub const MAX_REPLY_LEN: usize = 4096;

#[derive(BotCommands, Clone, Debug, PartialEq)]
#[command(rename_rule = "snake_case", description = "Поддерживаемые команды:")]
pub enum Command {
    #[command(description = "приветствие и справка")]
    Start,
    #[command(description = "список команд")]
    Help,
    #[command(description = "проверить доступность GigaChat")]
    Status,
    #[command(description = "статистика сохранённых сообщений")]
    Stats,
    #[command(description = "сводка всех необработанных сообщений")]
    Summary,
    #[command(description = "сводка одного чата: /summary_chat <chat_id>")]
    SummaryChat(i64),
    #[command(description = "последние сводки")]
    History,
}

/// Where an incoming message goes.
#[derive(Debug, PartialEq)]
pub enum Route {
    Command(Command),
    /// Free text and unrecognized commands are answered by the assistant.
    Ask(String),
}

pub fn route(text: &str, bot_name: &str) -> Option<Route> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    match Command::parse(trimmed, bot_name) {
        Ok(command) => Some(Route::Command(command)),
        Err(_) => Some(Route::Ask(trimmed.to_string())),
    }
}

/// Split a reply into Telegram-sized parts, preferring line boundaries.
/// Splits are always on char boundaries.
pub fn split_reply(text: &str) -> Vec<String> {
    if text.len() <= MAX_REPLY_LEN {
        return vec![text.to_string()];
    }

    let mut parts = Vec::new();
    let mut current = String::new();
    for line in text.split_inclusive('\n') {
        if !current.is_empty() && current.len() + line.len() > MAX_REPLY_LEN {
            parts.push(std::mem::take(&mut current));
        }
        if line.len() > MAX_REPLY_LEN {
            for ch in line.chars() {
                if current.len() + ch.len_utf8() > MAX_REPLY_LEN {
                    parts.push(std::mem::take(&mut current));
                }
                current.push(ch);
            }
        } else {
            current.push_str(line);
        }
    }
    if !current.is_empty() {
        parts.push(current);
    }
    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_commands_are_routed_as_commands() {
        assert_eq!(
            route("/summary", "digest_bot"),
            Some(Route::Command(Command::Summary))
        );
        assert_eq!(
            route("/summary_chat 42", "digest_bot"),
            Some(Route::Command(Command::SummaryChat(42)))
        );
        assert_eq!(
            route("/status@digest_bot", "digest_bot"),
            Some(Route::Command(Command::Status))
        );
    }

    #[test]
    fn free_text_goes_to_the_assistant() {
        assert_eq!(
            route("что нового?", "digest_bot"),
            Some(Route::Ask("что нового?".to_string()))
        );
    }

    #[test]
    fn unknown_command_falls_through_to_the_assistant() {
        assert_eq!(
            route("/frobnicate", "digest_bot"),
            Some(Route::Ask("/frobnicate".to_string()))
        );
    }

    #[test]
    fn blank_messages_are_dropped() {
        assert_eq!(route("   ", "digest_bot"), None);
        assert_eq!(route("", "digest_bot"), None);
    }

    #[test]
    fn short_reply_is_a_single_part() {
        assert_eq!(split_reply("hello"), vec!["hello".to_string()]);
    }

    #[test]
    fn long_reply_is_split_under_the_cap() {
        let lines: Vec<String> = (0..200).map(|i| format!("line number {i}")).collect();
        let text = lines.join("\n").repeat(4);
        let parts = split_reply(&text);

        assert!(parts.len() > 1);
        for part in &parts {
            assert!(part.len() <= MAX_REPLY_LEN);
        }
        assert_eq!(parts.concat(), text);
    }

    #[test]
    fn multibyte_text_splits_on_char_boundaries() {
        let text = "я".repeat(MAX_REPLY_LEN);
        let parts = split_reply(&text);
        assert!(parts.len() > 1);
        for part in &parts {
            assert!(part.len() <= MAX_REPLY_LEN);
            assert!(part.is_char_boundary(part.len()));
        }
        assert_eq!(parts.concat(), text);
    }
}
