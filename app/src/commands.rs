use std::fs;
use std::path::Path;

use anyhow::{anyhow, Context};
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use tracing::info;
use wa_bridge_core::device::{DeviceStore, SqliteDeviceStore};
use wa_bridge_core::media::{fallback_filename, verify_plaintext};
use wa_bridge_core::models::{ChatSort, MessageFilter};
use wa_bridge_core::{query, seed, BridgeConfig, MessageStore};

fn open_store(config: &BridgeConfig) -> anyhow::Result<MessageStore> {
    let path = config.messages_path();
    MessageStore::open(&path).with_context(|| format!("opening {}", path.display()))
}

pub fn chats(
    config: &BridgeConfig,
    filter: Option<&str>,
    limit: i64,
    offset: i64,
    sort: ChatSort,
) -> anyhow::Result<Value> {
    let store = open_store(config)?;
    let chats = query::list_chats(&store.conn, filter, limit, offset, sort)?;
    Ok(serde_json::to_value(chats)?)
}

pub fn chat(config: &BridgeConfig, jid: &str) -> anyhow::Result<Value> {
    let store = open_store(config)?;
    let chat = query::get_chat(&store.conn, jid)?.ok_or_else(|| anyhow!("no chat {}", jid))?;
    Ok(serde_json::to_value(chat)?)
}

pub fn messages(config: &BridgeConfig, jid: &str, limit: i64) -> anyhow::Result<Value> {
    let store = open_store(config)?;
    Ok(serde_json::to_value(store.get_messages(jid, limit)?)?)
}

pub fn context(
    config: &BridgeConfig,
    chat: &str,
    id: &str,
    before: i64,
    after: i64,
) -> anyhow::Result<Value> {
    let store = open_store(config)?;
    let rows = query::message_context(&store.conn, id, chat, before, after)?;
    Ok(serde_json::to_value(rows)?)
}

pub fn search(
    config: &BridgeConfig,
    text: &str,
    chat: Option<&str>,
    limit: i64,
    offset: i64,
) -> anyhow::Result<Value> {
    let store = open_store(config)?;
    let rows = query::search_messages(&store.conn, text, chat, limit, offset)?;
    Ok(serde_json::to_value(rows)?)
}

pub fn parse_timestamp(raw: &str) -> anyhow::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .with_context(|| format!("invalid timestamp {:?}, expected RFC 3339", raw))
}

pub fn find(config: &BridgeConfig, filter: &MessageFilter) -> anyhow::Result<Value> {
    let store = open_store(config)?;
    Ok(serde_json::to_value(query::list_messages(&store.conn, filter)?)?)
}

pub fn contact(config: &BridgeConfig, jid: &str, limit: i64, page: i64) -> anyhow::Result<Value> {
    let store = open_store(config)?;
    let chats = query::contact_chats(&store.conn, jid, limit, page)?;
    let last = query::last_interaction(&store.conn, jid)?;
    let nickname = query::get_nickname(&store.conn, jid)?;
    Ok(json!({
        "jid": jid,
        "nickname": nickname,
        "last_interaction": last,
        "chats": chats,
    }))
}

pub fn set_nickname(config: &BridgeConfig, jid: &str, nickname: &str) -> anyhow::Result<Value> {
    let store = open_store(config)?;
    Ok(serde_json::to_value(query::set_nickname(&store.conn, jid, nickname)?)?)
}

pub fn get_nickname(config: &BridgeConfig, jid: &str) -> anyhow::Result<Value> {
    let store = open_store(config)?;
    Ok(json!({ "jid": jid, "nickname": query::get_nickname(&store.conn, jid)? }))
}

pub fn remove_nickname(config: &BridgeConfig, jid: &str) -> anyhow::Result<Value> {
    let store = open_store(config)?;
    Ok(json!({ "jid": jid, "removed": query::remove_nickname(&store.conn, jid)? }))
}

pub fn list_nicknames(config: &BridgeConfig) -> anyhow::Result<Value> {
    let store = open_store(config)?;
    Ok(serde_json::to_value(query::list_nicknames(&store.conn)?)?)
}

pub fn media(config: &BridgeConfig, chat: &str, id: &str) -> anyhow::Result<Value> {
    let store = open_store(config)?;
    let media = query::media_info(&store.conn, id, chat)?
        .ok_or_else(|| anyhow!("message {} in {} has no media", id, chat))?;
    let filename = fallback_filename(&media.descriptor, &media.message_id);
    let mut value = serde_json::to_value(&media)?;
    value["suggested_filename"] = json!(filename);
    Ok(value)
}

pub fn verify_media(config: &BridgeConfig, chat: &str, id: &str, file: &Path) -> anyhow::Result<Value> {
    let store = open_store(config)?;
    let media = query::media_info(&store.conn, id, chat)?
        .ok_or_else(|| anyhow!("message {} in {} has no media", id, chat))?;
    let bytes = fs::read(file).with_context(|| format!("reading {}", file.display()))?;
    verify_plaintext(&media.descriptor, &bytes)?;
    Ok(json!({ "message_id": media.message_id, "bytes": bytes.len(), "verified": true }))
}

pub fn stats(config: &BridgeConfig) -> anyhow::Result<Value> {
    let store = open_store(config)?;
    Ok(serde_json::to_value(query::store_stats(&store.conn)?)?)
}

pub fn device(config: &BridgeConfig) -> anyhow::Result<Value> {
    let path = config.session_path();
    let devices = SqliteDeviceStore::open(&path).with_context(|| format!("opening {}", path.display()))?;
    let value = match devices.first_device()? {
        Some(device) => json!({
            "paired": true,
            "jid": device.jid,
            "registration_id": device.registration_id,
            "created_at": device.created_at,
        }),
        None => json!({ "paired": false }),
    };
    Ok(value)
}

pub fn seed_demo(config: &BridgeConfig, chats: i64, messages: i64) -> anyhow::Result<Value> {
    if chats <= 0 || messages <= 0 {
        return Err(anyhow!("chats and messages must be positive"));
    }
    let store = open_store(config)?;
    seed::seed_demo(&store, chats, messages)?;
    info!(chats, messages, "seeded demo data");
    Ok(serde_json::to_value(query::store_stats(&store.conn)?)?)
}
