use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Media attached to a message, as handed over by the protocol layer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaDescriptor {
    pub media_type: String,
    pub filename: String,
    pub url: String,
    #[serde(with = "hex_bytes")]
    pub media_key: Vec<u8>,
    #[serde(with = "hex_bytes")]
    pub file_sha256: Vec<u8>,
    #[serde(with = "hex_bytes")]
    pub file_enc_sha256: Vec<u8>,
    pub file_length: u64,
}

/// Listing projection of a stored message. Media keys and hashes are left out;
/// use `query::media_info` when a download actually needs them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRow {
    pub id: String,
    pub chat_jid: String,
    pub sender: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub is_from_me: bool,
    pub media_type: Option<String>,
    pub filename: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatActivity {
    pub jid: String,
    pub last_message_time: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatSummary {
    pub jid: String,
    pub name: Option<String>,
    pub last_message_time: Option<DateTime<Utc>>,
    pub last_message: Option<String>,
    pub last_sender: Option<String>,
    pub last_is_from_me: Option<bool>,
}

impl ChatSummary {
    pub fn is_group(&self) -> bool {
        self.jid.ends_with("@g.us")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredMedia {
    pub message_id: String,
    pub chat_jid: String,
    pub timestamp: DateTime<Utc>,
    pub descriptor: MediaDescriptor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStats {
    pub chats: i64,
    pub messages: i64,
    pub media_messages: i64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatSort {
    #[default]
    LastActive,
    Name,
}

/// Filters for `query::list_messages`. Every `Some` narrows the result;
/// `page` counts in units of `limit`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageFilter {
    /// Only messages strictly newer than this.
    pub after: Option<DateTime<Utc>>,
    /// Only messages strictly older than this.
    pub before: Option<DateTime<Utc>>,
    pub sender: Option<String>,
    pub chat_jid: Option<String>,
    /// Case-insensitive substring of the content.
    pub query: Option<String>,
    pub limit: i64,
    pub page: i64,
}

impl Default for MessageFilter {
    fn default() -> Self {
        Self {
            after: None,
            before: None,
            sender: None,
            chat_jid: None,
            query: None,
            limit: 20,
            page: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactNickname {
    pub jid: String,
    pub nickname: String,
    pub updated_at: DateTime<Utc>,
}

pub(crate) fn to_millis(ts: &DateTime<Utc>) -> i64 {
    ts.timestamp_millis()
}

pub(crate) fn from_millis(ms: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .unwrap_or_default()
}

mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        hex::decode(raw).map_err(serde::de::Error::custom)
    }
}
