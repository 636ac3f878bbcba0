//! Outbound ports. Application calls into infrastructure.
//!
//! Implemented by adapters.

use crate::domain::{Dialog, DomainError, LlmError, SignInResult, StoredMessage, Summary};
use serde::Serialize;

/// GigaChat (or compatible LLM) port. Both calls block the handler until
/// response or timeout; the adapter enforces the timeout.
#[async_trait::async_trait]
pub trait LlmPort: Send + Sync {
    /// Produce a condensed digest of `text`.
    async fn summarize(&self, text: &str) -> Result<String, LlmError>;

    /// Answer a free-form question.
    async fn ask(&self, question: &str) -> Result<String, LlmError>;

    /// Probe the credentials without generating anything. Used by `/status`.
    async fn verify(&self) -> Result<(), LlmError>;
}

/// Aggregate counts over the message store. Shown by `/stats` and `GET /stats`.
#[derive(Debug, Default, Clone, Serialize)]
pub struct StoreStats {
    pub total_messages: u64,
    pub new_messages: u64,
    pub processed_messages: u64,
    pub distinct_chats: u64,
    pub summaries: u64,
}

/// Message store port. Single SQLite file; the collector is the only writer.
#[async_trait::async_trait]
pub trait MessageStore: Send + Sync {
    /// Insert one message. Returns `false` when the `(chat_id, id)` row
    /// already exists (duplicate delivery), `true` when a row was written.
    async fn save_message(&self, message: &StoredMessage) -> Result<bool, DomainError>;

    /// Messages not yet folded into a digest, oldest first.
    /// `chat_id = None` spans all chats.
    async fn unsummarized(&self, chat_id: Option<i64>) -> Result<Vec<StoredMessage>, DomainError>;

    /// Persist a digest and mark its source messages as processed, atomically.
    async fn save_summary(
        &self,
        chat_id: Option<i64>,
        summary_text: &str,
        messages: &[(i64, i32)],
    ) -> Result<(), DomainError>;

    /// Most recent digests, newest first.
    async fn recent_summaries(&self, limit: u32) -> Result<Vec<Summary>, DomainError>;

    /// Page through messages filtered by processed state (and optionally one
    /// chat), newest first.
    async fn messages_page(
        &self,
        chat_id: Option<i64>,
        summarized: bool,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<StoredMessage>, DomainError>;

    /// Fetch specific messages by id (any chat).
    async fn messages_by_ids(&self, ids: &[i32]) -> Result<Vec<StoredMessage>, DomainError>;

    async fn stats(&self) -> Result<StoreStats, DomainError>;

    /// Refresh the best-effort dialog metadata cache.
    async fn upsert_dialogs(&self, dialogs: &[Dialog]) -> Result<(), DomainError>;

    async fn list_dialogs(&self) -> Result<Vec<Dialog>, DomainError>;
}

/// Telegram MTProto gateway. Fetch dialogs and history, stream live messages.
#[async_trait::async_trait]
pub trait TgGateway: Send + Sync {
    /// Fetch all dialogs (chats) the account participates in.
    async fn get_dialogs(&self) -> Result<Vec<Dialog>, DomainError>;

    /// Fetch the most recent `limit` messages of a chat, newest first.
    async fn get_recent_messages(
        &self,
        chat_id: i64,
        limit: i32,
    ) -> Result<Vec<StoredMessage>, DomainError>;

    /// Wait for the next incoming message on the live session.
    /// Returns `Ok(None)` when the update stream ends.
    async fn next_message(&self) -> Result<Option<StoredMessage>, DomainError>;
}

/// Authentication port for the MTProto session login flow.
#[async_trait::async_trait]
pub trait AuthPort: Send + Sync {
    async fn is_authenticated(&self) -> Result<bool, DomainError>;

    async fn request_login_code(&self, phone: &str, api_hash: &str) -> Result<(), DomainError>;

    async fn sign_in(&self, code: &str) -> Result<SignInResult, DomainError>;

    async fn check_password(&self, password: &[u8]) -> Result<(), DomainError>;
}
