//! Message collection: live listener and idempotent history backfill.
//!
//! Each incoming message is persisted before the next update is processed.
//! A storage failure skips that one message and keeps the listener running.

use crate::domain::{Dialog, DomainError};
use crate::ports::{MessageStore, TgGateway};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Result of a single backfill run.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct CollectStats {
    pub fetched: usize,
    pub stored: usize,
}

/// Collector service. Bridges the Telegram gateway and the message store.
pub struct CollectorService {
    tg: Arc<dyn TgGateway>,
    store: Arc<dyn MessageStore>,
}

impl CollectorService {
    pub fn new(tg: Arc<dyn TgGateway>, store: Arc<dyn MessageStore>) -> Self {
        Self { tg, store }
    }

    /// Run the live listener until the update stream ends or the gateway
    /// fails. Duplicate deliveries are absorbed by the store's primary key.
    pub async fn listen(&self) -> Result<(), DomainError> {
        info!("listening for new messages");
        loop {
            match self.tg.next_message().await? {
                Some(message) => match self.store.save_message(&message).await {
                    Ok(true) => {
                        info!(
                            chat_id = message.chat_id,
                            message_id = message.id,
                            sender = message.sender.as_deref().unwrap_or("Unknown"),
                            "message stored"
                        );
                    }
                    Ok(false) => {
                        debug!(
                            chat_id = message.chat_id,
                            message_id = message.id,
                            "duplicate delivery ignored"
                        );
                    }
                    Err(e) => {
                        warn!(
                            chat_id = message.chat_id,
                            message_id = message.id,
                            error = %e,
                            "storage failed, skipping message"
                        );
                    }
                },
                None => {
                    info!("update stream ended");
                    return Ok(());
                }
            }
        }
    }

    /// Fetch the last `limit` messages of a chat and persist any not already
    /// present. Idempotent on the (chat_id, id) primary key.
    pub async fn collect_recent(
        &self,
        chat_id: i64,
        limit: i32,
    ) -> Result<CollectStats, DomainError> {
        let messages = self.tg.get_recent_messages(chat_id, limit).await?;
        let mut stored = 0usize;
        for message in &messages {
            if self.store.save_message(message).await? {
                stored += 1;
            }
        }
        info!(
            chat_id,
            fetched = messages.len(),
            stored,
            "backfill complete"
        );
        Ok(CollectStats {
            fetched: messages.len(),
            stored,
        })
    }

    /// List dialogs and refresh the metadata cache. The cache refresh is
    /// best-effort; listing still succeeds when the write fails.
    pub async fn refresh_dialogs(&self) -> Result<Vec<Dialog>, DomainError> {
        let dialogs = self.tg.get_dialogs().await?;
        if let Err(e) = self.store.upsert_dialogs(&dialogs).await {
            warn!(error = %e, "dialog cache refresh failed");
        }
        Ok(dialogs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::persistence::SqliteStore;
    use crate::domain::StoredMessage;
    use std::collections::VecDeque;
    use tokio::sync::Mutex;

    /// Gateway stub that replays a fixed script of updates.
    struct ScriptedGateway {
        updates: Mutex<VecDeque<StoredMessage>>,
        history: Vec<StoredMessage>,
        dialogs: Vec<Dialog>,
    }

    #[async_trait::async_trait]
    impl TgGateway for ScriptedGateway {
        async fn get_dialogs(&self) -> Result<Vec<Dialog>, DomainError> {
            Ok(self.dialogs.clone())
        }

        async fn get_recent_messages(
            &self,
            _chat_id: i64,
            _limit: i32,
        ) -> Result<Vec<StoredMessage>, DomainError> {
            Ok(self.history.clone())
        }

        async fn next_message(&self) -> Result<Option<StoredMessage>, DomainError> {
            Ok(self.updates.lock().await.pop_front())
        }
    }

    fn msg(chat_id: i64, id: i32, text: &str) -> StoredMessage {
        StoredMessage {
            id,
            chat_id,
            sender: Some("Bob".into()),
            text: text.into(),
            date: 1_700_000_000,
            summarized: false,
        }
    }

    #[tokio::test]
    async fn listener_absorbs_duplicate_deliveries() {
        let store = Arc::new(SqliteStore::connect_in_memory().await.unwrap());
        let gateway = Arc::new(ScriptedGateway {
            // At-least-once transport: the same message arrives twice.
            updates: Mutex::new(VecDeque::from(vec![
                msg(1, 10, "hello"),
                msg(1, 10, "hello"),
                msg(1, 11, "world"),
            ])),
            history: vec![],
            dialogs: vec![],
        });
        let collector = CollectorService::new(gateway, store.clone());

        collector.listen().await.unwrap();

        use crate::ports::MessageStore as _;
        assert_eq!(store.stats().await.unwrap().total_messages, 2);
    }

    #[tokio::test]
    async fn backfill_is_idempotent() {
        let store = Arc::new(SqliteStore::connect_in_memory().await.unwrap());
        let gateway = Arc::new(ScriptedGateway {
            updates: Mutex::new(VecDeque::new()),
            history: vec![msg(5, 1, "a"), msg(5, 2, "b")],
            dialogs: vec![],
        });
        let collector = CollectorService::new(gateway, store);

        let first = collector.collect_recent(5, 10).await.unwrap();
        assert_eq!(first, CollectStats { fetched: 2, stored: 2 });

        let second = collector.collect_recent(5, 10).await.unwrap();
        assert_eq!(second, CollectStats { fetched: 2, stored: 0 });
    }

    #[tokio::test]
    async fn dialog_listing_refreshes_the_cache() {
        let store = Arc::new(SqliteStore::connect_in_memory().await.unwrap());
        let gateway = Arc::new(ScriptedGateway {
            updates: Mutex::new(VecDeque::new()),
            history: vec![],
            dialogs: vec![Dialog {
                chat_id: 9,
                title: "Team chat".into(),
                kind: crate::domain::DialogKind::Supergroup,
            }],
        });
        let collector = CollectorService::new(gateway, store.clone());

        let listed = collector.refresh_dialogs().await.unwrap();
        assert_eq!(listed.len(), 1);

        use crate::ports::MessageStore as _;
        let cached = store.list_dialogs().await.unwrap();
        assert_eq!(cached[0].title, "Team chat");
    }
}
