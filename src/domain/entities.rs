//! Domain entities. Pure data structures for the core business.
//!
//! No Telegram/IO types here; adapters map into these.

use serde::{Deserialize, Serialize};

/// Placeholder text stored for messages that carry only media.
pub const MEDIA_PLACEHOLDER: &str = "[media]";

/// A message record as persisted by the collector.
///
/// Uniquely identified by `(chat_id, id)`; written once when received,
/// never mutated or deleted by this process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredMessage {
    pub id: i32,
    pub chat_id: i64,
    /// Display name of the sender, when resolvable.
    pub sender: Option<String>,
    pub text: String,
    /// Unix timestamp (seconds).
    pub date: i64,
    /// True once the message has been folded into a digest.
    #[serde(default)]
    pub summarized: bool,
}

/// A Telegram dialog (user, group, or channel). Best-effort metadata cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dialog {
    pub chat_id: i64,
    pub title: String,
    pub kind: DialogKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DialogKind {
    Private,
    Group,
    Supergroup,
    Channel,
}

impl DialogKind {
    pub fn as_str(self) -> &'static str {
        match self {
            DialogKind::Private => "private",
            DialogKind::Group => "group",
            DialogKind::Supergroup => "supergroup",
            DialogKind::Channel => "channel",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "group" => DialogKind::Group,
            "supergroup" => DialogKind::Supergroup,
            "channel" => DialogKind::Channel,
            _ => DialogKind::Private,
        }
    }
}

/// A generated digest over a batch of stored messages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Summary {
    pub id: i64,
    /// None when the digest spans all chats.
    pub chat_id: Option<i64>,
    pub summary_text: String,
    /// Comma-joined message ids that were folded into this digest.
    pub message_ids: String,
    pub message_count: usize,
    /// Unix timestamp (seconds).
    pub created_at: i64,
}

/// Outcome of submitting a login code during the interactive auth flow.
#[derive(Debug)]
pub enum SignInResult {
    Success,
    /// Account has 2FA enabled; the password prompt may show this hint.
    PasswordRequired { hint: Option<String> },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dialog_kind_round_trips_through_str() {
        for kind in [
            DialogKind::Private,
            DialogKind::Group,
            DialogKind::Supergroup,
            DialogKind::Channel,
        ] {
            assert_eq!(DialogKind::parse(kind.as_str()), kind);
        }
    }

    #[test]
    fn unknown_dialog_kind_defaults_to_private() {
        assert_eq!(DialogKind::parse("bot"), DialogKind::Private);
    }
}
