//! Implements TgGateway using the grammers Client.
//!
//! Handles FloodWait by sleeping and retrying. Uses raw invoke for GetHistory
//! so the users vector can be kept for sender-name resolution; live messages
//! come from the client's update stream.

use crate::adapters::telegram::mapper;
use crate::domain::{Dialog, DomainError, MEDIA_PLACEHOLDER, StoredMessage};
use crate::ports::TgGateway;
use async_trait::async_trait;
use grammers_client::update::Update;
use grammers_client::{Client, InvocationError, tl};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Bounded FloodWait retries per history request.
const FLOOD_WAIT_RETRIES: u32 = 3;

/// Telegram gateway adapter. Wraps a grammers Client (shared with the auth
/// adapter via clone; both drive the same session).
pub struct GrammersGateway {
    client: Client,
    /// Cache InputPeer by chat_id so get_recent_messages does not re-run
    /// iter_dialogs on every call (avoids FLOOD_WAIT).
    peer_cache: Mutex<HashMap<i64, tl::enums::InputPeer>>,
}

impl GrammersGateway {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            peer_cache: Mutex::new(HashMap::new()),
        }
    }

    /// Resolve chat_id to InputPeer, using the cache to avoid repeated
    /// getDialogs round trips.
    async fn resolve_input_peer(&self, chat_id: i64) -> Result<tl::enums::InputPeer, DomainError> {
        {
            let cache = self.peer_cache.lock().await;
            if let Some(peer) = cache.get(&chat_id) {
                return Ok(peer.clone());
            }
        }
        let peer = {
            let mut dialogs = self.client.iter_dialogs();
            let mut found = None;
            while let Some(dialog) = dialogs
                .next()
                .await
                .map_err(|e| DomainError::TgGateway(e.to_string()))?
            {
                let p = dialog.peer();
                if p.id().bot_api_dialog_id() == chat_id {
                    found = Some(p.clone());
                    break;
                }
            }
            found.ok_or_else(|| {
                DomainError::TgGateway(format!("peer {} not found in dialogs", chat_id))
            })?
        };
        let peer_ref = peer
            .to_ref()
            .await
            .ok_or_else(|| DomainError::TgGateway("peer not in session cache".into()))?;
        let input_peer: tl::enums::InputPeer = peer_ref.into();
        self.peer_cache
            .lock()
            .await
            .insert(chat_id, input_peer.clone());
        Ok(input_peer)
    }
}

#[async_trait]
impl TgGateway for GrammersGateway {
    async fn get_dialogs(&self) -> Result<Vec<Dialog>, DomainError> {
        let mut dialogs = self.client.iter_dialogs();
        let mut out = Vec::new();
        while let Some(dialog) = dialogs
            .next()
            .await
            .map_err(|e| DomainError::TgGateway(e.to_string()))?
        {
            let peer = dialog.peer();
            let chat_id = peer.id().bot_api_dialog_id();
            let title = peer
                .name()
                .map(String::from)
                .unwrap_or_else(|| peer.id().to_string());
            out.push(Dialog {
                chat_id,
                title,
                kind: mapper::dialog_kind_from_peer(peer),
            });
        }
        Ok(out)
    }

    async fn get_recent_messages(
        &self,
        chat_id: i64,
        limit: i32,
    ) -> Result<Vec<StoredMessage>, DomainError> {
        use tl::enums::messages::Messages;

        let input_peer = self.resolve_input_peer(chat_id).await?;

        for attempt in 0..FLOOD_WAIT_RETRIES {
            let req = tl::functions::messages::GetHistory {
                peer: input_peer.clone(),
                offset_id: 0,
                offset_date: 0,
                add_offset: 0,
                limit,
                max_id: 0,
                min_id: 0,
                hash: 0,
            };

            match self.client.invoke(&req).await {
                Ok(raw) => {
                    let (messages, users, chats) = match raw {
                        Messages::Messages(m) => (m.messages, m.users, m.chats),
                        Messages::Slice(m) => (m.messages, m.users, m.chats),
                        Messages::ChannelMessages(m) => (m.messages, m.users, m.chats),
                        Messages::NotModified(_) => return Ok(vec![]),
                    };
                    let names = mapper::sender_names(&users, &chats);
                    let out: Vec<StoredMessage> = messages
                        .iter()
                        .filter_map(|msg| mapper::message_to_stored(msg, chat_id, &names))
                        .collect();
                    debug!(chat_id, count = out.len(), "fetched history batch");
                    return Ok(out);
                }
                Err(InvocationError::Rpc(rpc)) if rpc.code == 420 => {
                    let wait_secs = rpc.value.unwrap_or(60) as u64;
                    if attempt + 1 == FLOOD_WAIT_RETRIES {
                        return Err(DomainError::FloodWait { seconds: wait_secs });
                    }
                    warn!(attempt, wait_secs, "FloodWait, sleeping");
                    tokio::time::sleep(Duration::from_secs(wait_secs)).await;
                }
                Err(e) => return Err(DomainError::TgGateway(e.to_string())),
            }
        }
        unreachable!("FloodWait retry loop returns on the last attempt")
    }

    async fn next_message(&self) -> Result<Option<StoredMessage>, DomainError> {
        loop {
            let update = self
                .client
                .next_update()
                .await
                .map_err(|e| DomainError::TgGateway(e.to_string()))?;
            match update {
                Update::NewMessage(message) if !message.outgoing() => {
                    let chat_id = message.peer().id().bot_api_dialog_id();
                    let sender = message
                        .sender()
                        .and_then(|peer| peer.name().map(String::from));
                    let text = if message.text().is_empty() && message.media().is_some() {
                        MEDIA_PLACEHOLDER.to_string()
                    } else {
                        message.text().to_string()
                    };
                    return Ok(Some(StoredMessage {
                        id: message.id(),
                        chat_id,
                        sender,
                        text,
                        date: message.date().timestamp(),
                        summarized: false,
                    }));
                }
                // Outgoing messages, edits, deletions and raw updates are
                // not collected.
                _ => continue,
            }
        }
    }
}
