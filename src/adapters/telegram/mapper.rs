//! Map grammers types to domain entities.
//!
//! Extracts Dialog and StoredMessage from grammers peers and tl types.

use crate::domain::{DialogKind, MEDIA_PLACEHOLDER, StoredMessage};
use grammers_client::peer::Peer;
use grammers_client::tl;
use std::collections::HashMap;

/// Map a grammers Peer to the domain dialog kind.
pub fn dialog_kind_from_peer(peer: &Peer) -> DialogKind {
    match peer {
        Peer::User(_) => DialogKind::Private,
        Peer::Group(g) => {
            if g.is_megagroup() {
                DialogKind::Supergroup
            } else {
                DialogKind::Group
            }
        }
        Peer::Channel(_) => DialogKind::Channel,
    }
}

/// Human-readable sender name, mirroring how the account sees it:
/// "First Last", falling back to the username, falling back to "User {id}".
pub fn display_name(first: &str, last: &str, username: Option<&str>, id: i64) -> String {
    let full = format!("{} {}", first, last).trim().to_string();
    if !full.is_empty() {
        return full;
    }
    username
        .map(String::from)
        .unwrap_or_else(|| format!("User {}", id))
}

/// Build a sender-id -> display-name map from the users and chats vectors of
/// a GetHistory response.
pub fn sender_names(
    users: &[tl::enums::User],
    chats: &[tl::enums::Chat],
) -> HashMap<i64, String> {
    let mut names = HashMap::new();
    for user in users {
        if let tl::enums::User::User(u) = user {
            names.insert(
                u.id,
                display_name(
                    u.first_name.as_deref().unwrap_or(""),
                    u.last_name.as_deref().unwrap_or(""),
                    u.username.as_deref(),
                    u.id,
                ),
            );
        }
    }
    for chat in chats {
        match chat {
            tl::enums::Chat::Chat(c) => {
                names.insert(c.id, c.title.clone());
            }
            tl::enums::Chat::Channel(c) => {
                names.insert(c.id, c.title.clone());
            }
            _ => {}
        }
    }
    names
}

/// Map a raw tl history message to a stored record. Service and empty
/// messages are skipped.
pub fn message_to_stored(
    msg: &tl::enums::Message,
    chat_id: i64,
    names: &HashMap<i64, String>,
) -> Option<StoredMessage> {
    let m = match msg {
        tl::enums::Message::Message(m) => m,
        tl::enums::Message::Empty(_) | tl::enums::Message::Service(_) => return None,
    };

    let sender_id = m.from_id.as_ref().map(|f| match f {
        tl::enums::Peer::User(u) => u.user_id,
        tl::enums::Peer::Chat(c) => c.chat_id,
        tl::enums::Peer::Channel(c) => c.channel_id,
    });
    let sender = sender_id.and_then(|id| names.get(&id).cloned());

    let text = if m.message.is_empty() && m.media.is_some() {
        MEDIA_PLACEHOLDER.to_string()
    } else {
        m.message.clone()
    };

    Some(StoredMessage {
        id: m.id,
        chat_id,
        sender,
        text,
        date: m.date as i64,
        summarized: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_name_prefers_full_name() {
        assert_eq!(display_name("Ada", "Lovelace", Some("ada"), 1), "Ada Lovelace");
    }

    #[test]
    fn display_name_falls_back_to_username_then_id() {
        assert_eq!(display_name("", "", Some("ada"), 1), "ada");
        assert_eq!(display_name("", "", None, 7), "User 7");
    }

    #[test]
    fn display_name_handles_single_half() {
        assert_eq!(display_name("Ada", "", None, 1), "Ada");
        assert_eq!(display_name("", "Lovelace", None, 1), "Lovelace");
    }
}
