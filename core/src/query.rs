use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::CoreError;
use crate::models::{
    from_millis, to_millis, ChatSort, ChatSummary, ContactNickname, MediaDescriptor,
    MessageFilter, MessageRow, StoreStats, StoredMedia,
};
use crate::protocol::Jid;
use crate::store::map_message_row;

const CHAT_SUMMARY_SELECT: &str = "SELECT c.jid, c.name, c.last_message_time, \
        m.content, m.sender, m.is_from_me \
     FROM chats c \
     LEFT JOIN messages m ON m.rowid = ( \
        SELECT m2.rowid FROM messages m2 \
        WHERE m2.chat_jid = c.jid \
        ORDER BY m2.timestamp DESC, m2.id DESC \
        LIMIT 1 \
     )";

fn map_chat_summary(row: &rusqlite::Row<'_>) -> rusqlite::Result<ChatSummary> {
    Ok(ChatSummary {
        jid: row.get(0)?,
        name: row.get(1)?,
        last_message_time: row.get::<_, Option<i64>>(2)?.map(from_millis),
        last_message: row.get(3)?,
        last_sender: row.get(4)?,
        last_is_from_me: row.get(5)?,
    })
}

pub fn get_chat(conn: &Connection, jid: &str) -> Result<Option<ChatSummary>, CoreError> {
    let sql = format!("{} WHERE c.jid = ?1;", CHAT_SUMMARY_SELECT);
    conn.query_row(&sql, params![jid], map_chat_summary)
        .optional()
        .map_err(CoreError::from)
}

/// Chats matching `filter` (case-insensitive, on name or JID).
pub fn list_chats(
    conn: &Connection,
    filter: Option<&str>,
    limit: i64,
    offset: i64,
    sort: ChatSort,
) -> Result<Vec<ChatSummary>, CoreError> {
    check_page(limit, offset)?;
    let order_by = match sort {
        ChatSort::LastActive => "c.last_message_time DESC NULLS LAST, c.jid ASC",
        ChatSort::Name => "LOWER(COALESCE(c.name, c.jid)) ASC, c.jid ASC",
    };
    let sql = format!(
        "{} \
         WHERE (?1 IS NULL OR LOWER(c.name) LIKE ?1 ESCAPE '\\' OR LOWER(c.jid) LIKE ?1 ESCAPE '\\') \
         ORDER BY {} \
         LIMIT ?2 OFFSET ?3;",
        CHAT_SUMMARY_SELECT, order_by
    );
    let pattern = filter.map(like_pattern);
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![pattern, limit, offset], map_chat_summary)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(CoreError::from)
}

pub fn search_messages(
    conn: &Connection,
    query: &str,
    chat_jid: Option<&str>,
    limit: i64,
    offset: i64,
) -> Result<Vec<MessageRow>, CoreError> {
    if query.trim().is_empty() {
        return Err(CoreError::InvalidArgument("search query is empty".to_string()));
    }
    check_page(limit, offset)?;
    let mut stmt = conn.prepare(
        "SELECT id, chat_jid, sender, content, timestamp, is_from_me, media_type, filename \
         FROM messages \
         WHERE LOWER(content) LIKE ?1 ESCAPE '\\' AND (?2 IS NULL OR chat_jid = ?2) \
         ORDER BY timestamp DESC, id DESC \
         LIMIT ?3 OFFSET ?4;",
    )?;
    let rows = stmt.query_map(
        params![like_pattern(query), chat_jid, limit, offset],
        map_message_row,
    )?;
    rows.collect::<Result<Vec<_>, _>>().map_err(CoreError::from)
}

pub fn get_message(conn: &Connection, id: &str, chat_jid: &str) -> Result<MessageRow, CoreError> {
    conn.query_row(
        "SELECT id, chat_jid, sender, content, timestamp, is_from_me, media_type, filename \
         FROM messages \
         WHERE id = ?1 AND chat_jid = ?2;",
        params![id, chat_jid],
        map_message_row,
    )
    .optional()?
    .ok_or_else(|| CoreError::NotFound(format!("message {} in {}", id, chat_jid)))
}

/// The target message surrounded by up to `before` older and `after` newer
/// messages of the same chat, oldest first.
pub fn message_context(
    conn: &Connection,
    id: &str,
    chat_jid: &str,
    before: i64,
    after: i64,
) -> Result<Vec<MessageRow>, CoreError> {
    if before < 0 || after < 0 {
        return Err(CoreError::InvalidArgument(
            "context sizes must not be negative".to_string(),
        ));
    }
    let center = get_message(conn, id, chat_jid)?;
    let center_ts = to_millis(&center.timestamp);

    let mut older_stmt = conn.prepare(
        "SELECT id, chat_jid, sender, content, timestamp, is_from_me, media_type, filename \
         FROM messages \
         WHERE chat_jid = ?1 AND (timestamp < ?2 OR (timestamp = ?2 AND id < ?3)) \
         ORDER BY timestamp DESC, id DESC \
         LIMIT ?4;",
    )?;
    let mut older = older_stmt
        .query_map(params![chat_jid, center_ts, id, before], map_message_row)?
        .collect::<Result<Vec<_>, _>>()?;
    older.reverse();

    let mut newer_stmt = conn.prepare(
        "SELECT id, chat_jid, sender, content, timestamp, is_from_me, media_type, filename \
         FROM messages \
         WHERE chat_jid = ?1 AND (timestamp > ?2 OR (timestamp = ?2 AND id > ?3)) \
         ORDER BY timestamp ASC, id ASC \
         LIMIT ?4;",
    )?;
    let newer = newer_stmt
        .query_map(params![chat_jid, center_ts, id, after], map_message_row)?
        .collect::<Result<Vec<_>, _>>()?;

    let mut result = Vec::with_capacity(older.len() + 1 + newer.len());
    result.extend(older);
    result.push(center);
    result.extend(newer);
    Ok(result)
}

/// Full media descriptor for one message, including key and hashes.
pub fn media_info(
    conn: &Connection,
    id: &str,
    chat_jid: &str,
) -> Result<Option<StoredMedia>, CoreError> {
    let media = conn
        .query_row(
            "SELECT id, chat_jid, timestamp, media_type, filename, url, media_key, \
                    file_sha256, file_enc_sha256, file_length \
             FROM messages \
             WHERE id = ?1 AND chat_jid = ?2 AND media_type IS NOT NULL AND media_type != '';",
            params![id, chat_jid],
            |row| {
                Ok(StoredMedia {
                    message_id: row.get(0)?,
                    chat_jid: row.get(1)?,
                    timestamp: from_millis(row.get::<_, Option<i64>>(2)?.unwrap_or(0)),
                    descriptor: MediaDescriptor {
                        media_type: row.get(3)?,
                        filename: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
                        url: row.get::<_, Option<String>>(5)?.unwrap_or_default(),
                        media_key: row.get::<_, Option<Vec<u8>>>(6)?.unwrap_or_default(),
                        file_sha256: row.get::<_, Option<Vec<u8>>>(7)?.unwrap_or_default(),
                        file_enc_sha256: row.get::<_, Option<Vec<u8>>>(8)?.unwrap_or_default(),
                        file_length: row.get::<_, Option<i64>>(9)?.unwrap_or(0).max(0) as u64,
                    },
                })
            },
        )
        .optional()?;
    Ok(media)
}

pub fn store_stats(conn: &Connection) -> Result<StoreStats, CoreError> {
    let chats: i64 = conn.query_row("SELECT COUNT(1) FROM chats;", [], |row| row.get(0))?;
    let messages: i64 = conn.query_row("SELECT COUNT(1) FROM messages;", [], |row| row.get(0))?;
    let media_messages: i64 = conn.query_row(
        "SELECT COUNT(1) FROM messages WHERE media_type IS NOT NULL AND media_type != '';",
        [],
        |row| row.get(0),
    )?;
    Ok(StoreStats {
        chats,
        messages,
        media_messages,
    })
}

/// Messages matching every set field of `filter`, newest first.
///
/// A sender given as a bare phone number is matched as its user JID.
pub fn list_messages(conn: &Connection, filter: &MessageFilter) -> Result<Vec<MessageRow>, CoreError> {
    if filter.page < 0 {
        return Err(CoreError::InvalidArgument("page must not be negative".to_string()));
    }
    let offset = filter
        .page
        .checked_mul(filter.limit)
        .ok_or_else(|| CoreError::InvalidArgument("page is out of range".to_string()))?;
    check_page(filter.limit, offset)?;
    let sender = match filter.sender.as_deref().map(str::trim) {
        Some(raw) if raw.contains('@') => Some(raw.to_string()),
        Some(raw) if !raw.is_empty() => Some(Jid::from_recipient(raw)?.to_string()),
        _ => None,
    };
    let pattern = filter
        .query
        .as_deref()
        .filter(|q| !q.trim().is_empty())
        .map(like_pattern);

    let mut stmt = conn.prepare(
        "SELECT id, chat_jid, sender, content, timestamp, is_from_me, media_type, filename \
         FROM messages \
         WHERE (?1 IS NULL OR timestamp > ?1) \
           AND (?2 IS NULL OR timestamp < ?2) \
           AND (?3 IS NULL OR sender = ?3) \
           AND (?4 IS NULL OR chat_jid = ?4) \
           AND (?5 IS NULL OR LOWER(content) LIKE ?5 ESCAPE '\\') \
         ORDER BY timestamp DESC, id DESC \
         LIMIT ?6 OFFSET ?7;",
    )?;
    let rows = stmt.query_map(
        params![
            filter.after.as_ref().map(to_millis),
            filter.before.as_ref().map(to_millis),
            sender,
            filter.chat_jid,
            pattern,
            filter.limit,
            offset,
        ],
        map_message_row,
    )?;
    rows.collect::<Result<Vec<_>, _>>().map_err(CoreError::from)
}

/// Chats involving a contact: its direct chat plus any chat where it sent a
/// message, most recently active first.
pub fn contact_chats(
    conn: &Connection,
    jid: &str,
    limit: i64,
    page: i64,
) -> Result<Vec<ChatSummary>, CoreError> {
    let offset = page
        .checked_mul(limit)
        .filter(|_| page >= 0)
        .ok_or_else(|| CoreError::InvalidArgument("page is out of range".to_string()))?;
    check_page(limit, offset)?;
    let sql = format!(
        "{} \
         WHERE c.jid = ?1 \
            OR EXISTS (SELECT 1 FROM messages s WHERE s.chat_jid = c.jid AND s.sender = ?1) \
         ORDER BY c.last_message_time DESC NULLS LAST, c.jid ASC \
         LIMIT ?2 OFFSET ?3;",
        CHAT_SUMMARY_SELECT
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![jid, limit, offset], map_chat_summary)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(CoreError::from)
}

/// Most recent message sent by the contact or posted in its direct chat.
pub fn last_interaction(conn: &Connection, jid: &str) -> Result<Option<MessageRow>, CoreError> {
    conn.query_row(
        "SELECT id, chat_jid, sender, content, timestamp, is_from_me, media_type, filename \
         FROM messages \
         WHERE sender = ?1 OR chat_jid = ?1 \
         ORDER BY timestamp DESC, id DESC \
         LIMIT 1;",
        params![jid],
        map_message_row,
    )
    .optional()
    .map_err(CoreError::from)
}

pub fn set_nickname(conn: &Connection, jid: &str, nickname: &str) -> Result<ContactNickname, CoreError> {
    let nickname = nickname.trim();
    if nickname.is_empty() {
        return Err(CoreError::InvalidArgument("nickname is empty".to_string()));
    }
    let updated_at = to_millis(&Utc::now());
    conn.execute(
        "INSERT OR REPLACE INTO contact_nicknames (jid, nickname, updated_at) VALUES (?1, ?2, ?3);",
        params![jid, nickname, updated_at],
    )?;
    Ok(ContactNickname {
        jid: jid.to_string(),
        nickname: nickname.to_string(),
        updated_at: from_millis(updated_at),
    })
}

pub fn get_nickname(conn: &Connection, jid: &str) -> Result<Option<String>, CoreError> {
    conn.query_row(
        "SELECT nickname FROM contact_nicknames WHERE jid = ?1;",
        params![jid],
        |row| row.get(0),
    )
    .optional()
    .map_err(CoreError::from)
}

/// Returns false when the contact had no nickname.
pub fn remove_nickname(conn: &Connection, jid: &str) -> Result<bool, CoreError> {
    let removed = conn.execute("DELETE FROM contact_nicknames WHERE jid = ?1;", params![jid])?;
    Ok(removed > 0)
}

pub fn list_nicknames(conn: &Connection) -> Result<Vec<ContactNickname>, CoreError> {
    let mut stmt = conn.prepare(
        "SELECT jid, nickname, updated_at FROM contact_nicknames ORDER BY nickname ASC, jid ASC;",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(ContactNickname {
            jid: row.get(0)?,
            nickname: row.get(1)?,
            updated_at: from_millis(row.get(2)?),
        })
    })?;
    rows.collect::<Result<Vec<_>, _>>().map_err(CoreError::from)
}

/// Rejects negative paging values before they reach a LIMIT/OFFSET clause.
pub(crate) fn check_page(limit: i64, offset: i64) -> Result<(), CoreError> {
    if limit < 0 {
        return Err(CoreError::InvalidArgument(format!("limit must not be negative: {}", limit)));
    }
    if offset < 0 {
        return Err(CoreError::InvalidArgument(format!("offset must not be negative: {}", offset)));
    }
    Ok(())
}

fn like_pattern(raw: &str) -> String {
    let escaped = raw
        .trim()
        .to_lowercase()
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}
