use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use tracing::debug;

use crate::db::{apply_migrations, open_database};
use crate::error::CoreError;
use crate::migrations::MESSAGE_MIGRATIONS;
use crate::models::{from_millis, to_millis, ChatActivity, MediaDescriptor, MessageRow};
use crate::query::check_page;

/// Chats and messages persisted for later retrieval.
///
/// Every write is a single `INSERT OR REPLACE`, so replaying the same event
/// leaves exactly one row behind. Storage errors are returned as-is.
pub struct MessageStore {
    pub path: Option<PathBuf>,
    pub conn: Connection,
}

impl MessageStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, CoreError> {
        let path = path.as_ref().to_path_buf();
        let conn = open_database(&path, MESSAGE_MIGRATIONS)?;
        Ok(Self {
            path: Some(path),
            conn,
        })
    }

    pub fn open_in_memory() -> Result<Self, CoreError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        apply_migrations(&conn, MESSAGE_MIGRATIONS)?;
        Ok(Self { path: None, conn })
    }

    pub fn store_chat(
        &self,
        jid: &str,
        name: &str,
        last_message_time: DateTime<Utc>,
    ) -> Result<(), CoreError> {
        self.conn.execute(
            "INSERT OR REPLACE INTO chats (jid, name, last_message_time) VALUES (?1, ?2, ?3);",
            params![jid, name, to_millis(&last_message_time)],
        )?;
        Ok(())
    }

    /// Returns whether a row was written. Messages with neither text nor a
    /// media type are skipped.
    #[allow(clippy::too_many_arguments)]
    pub fn store_message(
        &self,
        id: &str,
        chat_jid: &str,
        sender: &str,
        content: &str,
        timestamp: DateTime<Utc>,
        is_from_me: bool,
        media: Option<&MediaDescriptor>,
    ) -> Result<bool, CoreError> {
        let media = media.filter(|m| !m.media_type.is_empty());
        if content.is_empty() && media.is_none() {
            debug!(message_id = id, chat = chat_jid, "skipping empty message");
            return Ok(false);
        }
        let file_length = media
            .map(|m| {
                i64::try_from(m.file_length)
                    .map_err(|_| CoreError::InvalidArgument("file length out of range".to_string()))
            })
            .transpose()?;
        self.conn.execute(
            "INSERT OR REPLACE INTO messages \
             (id, chat_jid, sender, content, timestamp, is_from_me, media_type, filename, url, \
              media_key, file_sha256, file_enc_sha256, file_length) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13);",
            params![
                id,
                chat_jid,
                sender,
                content,
                to_millis(&timestamp),
                is_from_me,
                media.map(|m| m.media_type.as_str()),
                media.map(|m| m.filename.as_str()),
                media.map(|m| m.url.as_str()),
                media.map(|m| m.media_key.as_slice()),
                media.map(|m| m.file_sha256.as_slice()),
                media.map(|m| m.file_enc_sha256.as_slice()),
                file_length,
            ],
        )?;
        Ok(true)
    }

    /// Most recent first. Unknown chats yield an empty list.
    pub fn get_messages(&self, chat_jid: &str, limit: i64) -> Result<Vec<MessageRow>, CoreError> {
        check_page(limit, 0)?;
        let mut stmt = self.conn.prepare(
            "SELECT id, chat_jid, sender, content, timestamp, is_from_me, media_type, filename \
             FROM messages \
             WHERE chat_jid = ?1 \
             ORDER BY timestamp DESC, id DESC \
             LIMIT ?2;",
        )?;
        let rows = stmt.query_map(params![chat_jid, limit], map_message_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(CoreError::from)
    }

    /// Every chat with its last activity, most recently active first.
    pub fn get_chats(&self) -> Result<Vec<ChatActivity>, CoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT jid, last_message_time FROM chats \
             ORDER BY last_message_time DESC, jid ASC;",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(ChatActivity {
                jid: row.get(0)?,
                last_message_time: from_millis(row.get::<_, Option<i64>>(1)?.unwrap_or(0)),
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(CoreError::from)
    }

    pub fn chat_name(&self, jid: &str) -> Result<Option<String>, CoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT name FROM chats WHERE jid = ?1;")?;
        let mut rows = stmt.query(params![jid])?;
        match rows.next()? {
            Some(row) => Ok(row.get::<_, Option<String>>(0)?.filter(|n| !n.is_empty())),
            None => Ok(None),
        }
    }
}

/// Column order: id, chat_jid, sender, content, timestamp, is_from_me,
/// media_type, filename.
pub(crate) fn map_message_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<MessageRow> {
    Ok(MessageRow {
        id: row.get(0)?,
        chat_jid: row.get(1)?,
        sender: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
        content: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
        timestamp: from_millis(row.get::<_, Option<i64>>(4)?.unwrap_or(0)),
        is_from_me: row.get::<_, Option<bool>>(5)?.unwrap_or(false),
        media_type: row.get(6)?,
        filename: row.get(7)?,
    })
}
