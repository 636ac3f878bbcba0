//! SQLite-backed message store via libsql. Implements `MessageStore`.
//!
//! Uses the same libsql backend as grammers-session to avoid duplicate SQLite
//! symbol link errors. One `messages` table with (chat_id, id) as primary key;
//! inserts use ON CONFLICT DO NOTHING so at-least-once delivery from the
//! transport never produces duplicate rows. All chats share one database file:
//! data/messages.db

use crate::domain::{Dialog, DialogKind, DomainError, StoredMessage, Summary};
use crate::ports::{MessageStore, StoreStats};
use libsql::{Connection, params};
use std::path::Path;
use tracing::info;

const MESSAGES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS messages (
    chat_id INTEGER NOT NULL,
    id INTEGER NOT NULL,
    sender TEXT,
    text TEXT NOT NULL DEFAULT '',
    date INTEGER NOT NULL,
    summarized INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (chat_id, id)
)"#;
const MESSAGES_DATE_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_messages_chat_date ON messages (chat_id, date DESC)";
const MESSAGES_SUMMARIZED_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_messages_summarized ON messages (summarized)";

const SUMMARIES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS summaries (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    chat_id INTEGER,
    summary_text TEXT NOT NULL,
    message_ids TEXT NOT NULL,
    message_count INTEGER NOT NULL,
    created_at INTEGER NOT NULL
)"#;
const SUMMARIES_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_summaries_created_at ON summaries (created_at DESC)";

/// Best-effort dialog metadata cache, refreshed on each listing.
const DIALOGS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS dialogs (
    chat_id INTEGER PRIMARY KEY,
    title TEXT NOT NULL,
    kind TEXT NOT NULL,
    updated_at INTEGER NOT NULL
)"#;

/// SQLite message store. One database file (messages.db) in the given base
/// directory; a single connection shared by clone (single process, single
/// writer).
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Connect to (or create) the database and ensure the schema exists.
    /// Call this once at startup; the returned store is safe to share via Arc.
    pub async fn connect(base_dir: impl AsRef<Path>) -> Result<Self, DomainError> {
        let base = base_dir.as_ref();
        std::fs::create_dir_all(base).map_err(|e| DomainError::Storage(e.to_string()))?;
        let db_path = base.join("messages.db");
        let store = Self::open(&db_path.to_string_lossy()).await?;
        info!(path = %db_path.display(), "SQLite store connected");
        Ok(store)
    }

    /// In-memory database for tests.
    pub async fn connect_in_memory() -> Result<Self, DomainError> {
        Self::open(":memory:").await
    }

    async fn open(path: &str) -> Result<Self, DomainError> {
        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DomainError::Storage(e.to_string()))?;
        let conn = db.connect().map_err(|e| DomainError::Storage(e.to_string()))?;

        // WAL enables concurrent readers with the single writer; NORMAL is
        // safe with WAL. PRAGMA returns a row, so query and drain it.
        for pragma in ["PRAGMA journal_mode=WAL", "PRAGMA synchronous=NORMAL"] {
            let mut rows = conn
                .query(pragma, ())
                .await
                .map_err(|e| DomainError::Storage(format!("{pragma} failed: {e}")))?;
            while rows
                .next()
                .await
                .map_err(|e| DomainError::Storage(e.to_string()))?
                .is_some()
            {}
        }

        for ddl in [
            MESSAGES_TABLE,
            MESSAGES_DATE_INDEX,
            MESSAGES_SUMMARIZED_INDEX,
            SUMMARIES_TABLE,
            SUMMARIES_INDEX,
            DIALOGS_TABLE,
        ] {
            conn.execute(ddl, ())
                .await
                .map_err(|e| DomainError::Storage(e.to_string()))?;
        }

        Ok(Self { conn })
    }

    fn row_to_message(row: &libsql::Row) -> Result<StoredMessage, DomainError> {
        Ok(StoredMessage {
            chat_id: row.get(0).map_err(|e| DomainError::Storage(e.to_string()))?,
            id: row.get(1).map_err(|e| DomainError::Storage(e.to_string()))?,
            sender: row.get(2).ok(),
            text: row.get::<String>(3).unwrap_or_default(),
            date: row.get(4).map_err(|e| DomainError::Storage(e.to_string()))?,
            summarized: row.get::<i64>(5).unwrap_or(0) != 0,
        })
    }

    async fn collect_messages(&self, mut rows: libsql::Rows) -> Result<Vec<StoredMessage>, DomainError> {
        let mut messages = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DomainError::Storage(e.to_string()))?
        {
            messages.push(Self::row_to_message(&row)?);
        }
        Ok(messages)
    }

    async fn count(&self, sql: &str) -> Result<u64, DomainError> {
        let mut rows = self
            .conn
            .query(sql, ())
            .await
            .map_err(|e| DomainError::Storage(e.to_string()))?;
        let row = rows
            .next()
            .await
            .map_err(|e| DomainError::Storage(e.to_string()))?
            .ok_or_else(|| DomainError::Storage("count query returned no row".into()))?;
        let n: i64 = row.get(0).map_err(|e| DomainError::Storage(e.to_string()))?;
        Ok(n.max(0) as u64)
    }

    fn now_secs() -> i64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs() as i64
    }
}

#[async_trait::async_trait]
impl MessageStore for SqliteStore {
    async fn save_message(&self, message: &StoredMessage) -> Result<bool, DomainError> {
        let affected = self
            .conn
            .execute(
                r#"
                INSERT INTO messages (chat_id, id, sender, text, date)
                VALUES (?1, ?2, ?3, ?4, ?5)
                ON CONFLICT (chat_id, id) DO NOTHING
                "#,
                params![
                    message.chat_id,
                    message.id,
                    message.sender.as_deref(),
                    message.text.as_str(),
                    message.date
                ],
            )
            .await
            .map_err(|e| DomainError::Storage(e.to_string()))?;
        Ok(affected > 0)
    }

    async fn unsummarized(&self, chat_id: Option<i64>) -> Result<Vec<StoredMessage>, DomainError> {
        let rows = match chat_id {
            Some(chat_id) => self
                .conn
                .query(
                    r#"
                    SELECT chat_id, id, sender, text, date, summarized
                    FROM messages
                    WHERE summarized = 0 AND chat_id = ?1
                    ORDER BY date ASC
                    "#,
                    params![chat_id],
                )
                .await,
            None => self
                .conn
                .query(
                    r#"
                    SELECT chat_id, id, sender, text, date, summarized
                    FROM messages
                    WHERE summarized = 0
                    ORDER BY date ASC
                    "#,
                    (),
                )
                .await,
        }
        .map_err(|e| DomainError::Storage(e.to_string()))?;
        self.collect_messages(rows).await
    }

    async fn save_summary(
        &self,
        chat_id: Option<i64>,
        summary_text: &str,
        messages: &[(i64, i32)],
    ) -> Result<(), DomainError> {
        if messages.is_empty() {
            return Ok(());
        }
        let message_ids = messages
            .iter()
            .map(|(_, id)| id.to_string())
            .collect::<Vec<_>>()
            .join(",");

        let tx = self
            .conn
            .transaction()
            .await
            .map_err(|e| DomainError::Storage(e.to_string()))?;
        tx.execute(
            r#"
            INSERT INTO summaries (chat_id, summary_text, message_ids, message_count, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                chat_id,
                summary_text,
                message_ids.as_str(),
                messages.len() as i64,
                Self::now_secs()
            ],
        )
        .await
        .map_err(|e| DomainError::Storage(e.to_string()))?;
        for (chat, id) in messages {
            tx.execute(
                "UPDATE messages SET summarized = 1 WHERE chat_id = ?1 AND id = ?2",
                params![*chat, *id],
            )
            .await
            .map_err(|e| DomainError::Storage(e.to_string()))?;
        }
        tx.commit()
            .await
            .map_err(|e| DomainError::Storage(e.to_string()))?;

        info!(
            count = messages.len(),
            chat_id = chat_id.unwrap_or_default(),
            "summary saved, source messages marked processed"
        );
        Ok(())
    }

    async fn recent_summaries(&self, limit: u32) -> Result<Vec<Summary>, DomainError> {
        let mut rows = self
            .conn
            .query(
                r#"
                SELECT id, chat_id, summary_text, message_ids, message_count, created_at
                FROM summaries
                ORDER BY created_at DESC, id DESC
                LIMIT ?1
                "#,
                params![limit as i64],
            )
            .await
            .map_err(|e| DomainError::Storage(e.to_string()))?;
        let mut summaries = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DomainError::Storage(e.to_string()))?
        {
            summaries.push(Summary {
                id: row.get(0).map_err(|e| DomainError::Storage(e.to_string()))?,
                chat_id: row.get(1).ok(),
                summary_text: row.get(2).map_err(|e| DomainError::Storage(e.to_string()))?,
                message_ids: row.get(3).map_err(|e| DomainError::Storage(e.to_string()))?,
                message_count: row.get::<i64>(4).unwrap_or_default().max(0) as usize,
                created_at: row.get(5).map_err(|e| DomainError::Storage(e.to_string()))?,
            });
        }
        Ok(summaries)
    }

    async fn messages_page(
        &self,
        chat_id: Option<i64>,
        summarized: bool,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<StoredMessage>, DomainError> {
        let rows = match chat_id {
            Some(chat_id) => self
                .conn
                .query(
                    r#"
                    SELECT chat_id, id, sender, text, date, summarized
                    FROM messages
                    WHERE summarized = ?1 AND chat_id = ?2
                    ORDER BY date DESC
                    LIMIT ?3 OFFSET ?4
                    "#,
                    params![summarized as i64, chat_id, limit as i64, offset as i64],
                )
                .await,
            None => self
                .conn
                .query(
                    r#"
                    SELECT chat_id, id, sender, text, date, summarized
                    FROM messages
                    WHERE summarized = ?1
                    ORDER BY date DESC
                    LIMIT ?2 OFFSET ?3
                    "#,
                    params![summarized as i64, limit as i64, offset as i64],
                )
                .await,
        }
        .map_err(|e| DomainError::Storage(e.to_string()))?;
        self.collect_messages(rows).await
    }

    async fn messages_by_ids(&self, ids: &[i32]) -> Result<Vec<StoredMessage>, DomainError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = (1..=ids.len())
            .map(|i| format!("?{i}"))
            .collect::<Vec<_>>()
            .join(",");
        let sql = format!(
            "SELECT chat_id, id, sender, text, date, summarized \
             FROM messages WHERE id IN ({placeholders}) ORDER BY date ASC"
        );
        let rows = self
            .conn
            .query(
                &sql,
                libsql::params_from_iter(ids.iter().copied().map(i64::from)),
            )
            .await
            .map_err(|e| DomainError::Storage(e.to_string()))?;
        self.collect_messages(rows).await
    }

    async fn stats(&self) -> Result<StoreStats, DomainError> {
        Ok(StoreStats {
            total_messages: self.count("SELECT COUNT(*) FROM messages").await?,
            new_messages: self
                .count("SELECT COUNT(*) FROM messages WHERE summarized = 0")
                .await?,
            processed_messages: self
                .count("SELECT COUNT(*) FROM messages WHERE summarized = 1")
                .await?,
            distinct_chats: self
                .count("SELECT COUNT(DISTINCT chat_id) FROM messages")
                .await?,
            summaries: self.count("SELECT COUNT(*) FROM summaries").await?,
        })
    }

    async fn upsert_dialogs(&self, dialogs: &[Dialog]) -> Result<(), DomainError> {
        if dialogs.is_empty() {
            return Ok(());
        }
        let tx = self
            .conn
            .transaction()
            .await
            .map_err(|e| DomainError::Storage(e.to_string()))?;
        let now = Self::now_secs();
        for dialog in dialogs {
            tx.execute(
                r#"
                INSERT INTO dialogs (chat_id, title, kind, updated_at)
                VALUES (?1, ?2, ?3, ?4)
                ON CONFLICT (chat_id) DO UPDATE SET
                    title = excluded.title,
                    kind = excluded.kind,
                    updated_at = excluded.updated_at
                "#,
                params![
                    dialog.chat_id,
                    dialog.title.as_str(),
                    dialog.kind.as_str(),
                    now
                ],
            )
            .await
            .map_err(|e| DomainError::Storage(e.to_string()))?;
        }
        tx.commit()
            .await
            .map_err(|e| DomainError::Storage(e.to_string()))?;
        Ok(())
    }

    async fn list_dialogs(&self) -> Result<Vec<Dialog>, DomainError> {
        let mut rows = self
            .conn
            .query(
                "SELECT chat_id, title, kind FROM dialogs ORDER BY updated_at DESC",
                (),
            )
            .await
            .map_err(|e| DomainError::Storage(e.to_string()))?;
        let mut dialogs = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DomainError::Storage(e.to_string()))?
        {
            let kind: String = row.get(2).map_err(|e| DomainError::Storage(e.to_string()))?;
            dialogs.push(Dialog {
                chat_id: row.get(0).map_err(|e| DomainError::Storage(e.to_string()))?,
                title: row.get(1).map_err(|e| DomainError::Storage(e.to_string()))?,
                kind: DialogKind::parse(&kind),
            });
        }
        Ok(dialogs)
    }
}
