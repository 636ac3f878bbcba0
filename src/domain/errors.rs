//! Domain errors. Used by ports and use cases.
//!
//! Adapters map infrastructure errors into these.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Telegram gateway error: {0}")]
    TgGateway(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    /// FloodWait error: caller should back off for `seconds` seconds.
    #[error("FloodWait: retry after {seconds} seconds")]
    FloodWait { seconds: u64 },

    /// Dashboard server failed to bind or serve.
    #[error("Web server error: {0}")]
    Serve(String),

    #[error(transparent)]
    Llm(#[from] LlmError),
}

/// Errors from the GigaChat wrapper, typed so callers can pick an
/// appropriate user-facing message instead of crashing the bot process.
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("GigaChat authentication failed: {0}")]
    Auth(String),

    #[error("GigaChat rate limit exceeded: {0}")]
    RateLimit(String),

    #[error("GigaChat transport error: {0}")]
    Transport(String),

    #[error("Malformed GigaChat response: {0}")]
    MalformedResponse(String),
}

impl LlmError {
    /// Short apologetic message shown to the bot user when a handler fails.
    /// Russian, matching the rest of the bot replies.
    pub fn user_message(&self) -> &'static str {
        match self {
            LlmError::Auth(_) => {
                "Не удалось авторизоваться в GigaChat. Проверьте CLIENT_ID и CLIENT_SECRET в .env."
            }
            LlmError::RateLimit(_) => {
                "GigaChat сейчас ограничивает запросы. Попробуйте ещё раз через минуту."
            }
            LlmError::Transport(_) => {
                "Не удалось связаться с GigaChat. Проверьте соединение и попробуйте ещё раз."
            }
            LlmError::MalformedResponse(_) => {
                "GigaChat вернул неожиданный ответ. Попробуйте ещё раз."
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn llm_error_converts_into_domain_error() {
        let err: DomainError = LlmError::RateLimit("429".into()).into();
        assert!(matches!(err, DomainError::Llm(LlmError::RateLimit(_))));
    }

    #[test]
    fn user_messages_are_distinct_per_kind() {
        let msgs = [
            LlmError::Auth(String::new()).user_message(),
            LlmError::RateLimit(String::new()).user_message(),
            LlmError::Transport(String::new()).user_message(),
            LlmError::MalformedResponse(String::new()).user_message(),
        ];
        for (i, a) in msgs.iter().enumerate() {
            for b in &msgs[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn user_messages_speak_the_bot_language() {
        for msg in [
            LlmError::Auth(String::new()).user_message(),
            LlmError::RateLimit(String::new()).user_message(),
            LlmError::Transport(String::new()).user_message(),
            LlmError::MalformedResponse(String::new()).user_message(),
        ] {
            assert!(
                msg.chars().any(|c| matches!(c, 'а'..='я' | 'А'..='Я' | 'ё' | 'Ё')),
                "expected a Russian reply, got: {msg}"
            );
        }
    }
}
