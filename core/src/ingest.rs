use tracing::debug;

use crate::error::CoreError;
use crate::protocol::{IncomingMessage, Jid, SendReceipt};
use crate::store::MessageStore;

/// Display name for a chat: the name on the event, else the stored name,
/// else the user part of the JID.
pub fn resolve_chat_name(
    store: &MessageStore,
    chat_jid: &str,
    event_name: Option<&str>,
) -> Result<String, CoreError> {
    if let Some(name) = event_name.map(str::trim).filter(|n| !n.is_empty()) {
        return Ok(name.to_string());
    }
    if let Some(existing) = store.chat_name(chat_jid)? {
        return Ok(existing);
    }
    let user = chat_jid.split('@').next().unwrap_or(chat_jid);
    Ok(user.to_string())
}

/// Records an inbound (or self-sent, synced) message. The chat row is
/// refreshed first so the message never points at a missing chat. Returns
/// whether a message row was written.
pub fn record_incoming(store: &MessageStore, msg: &IncomingMessage) -> Result<bool, CoreError> {
    let name = resolve_chat_name(store, &msg.chat_jid, msg.chat_name.as_deref())?;
    store.store_chat(&msg.chat_jid, &name, msg.timestamp)?;
    let written = store.store_message(
        &msg.id,
        &msg.chat_jid,
        &msg.sender,
        &msg.content,
        msg.timestamp,
        msg.is_from_me,
        msg.media.as_ref(),
    )?;
    debug!(chat = %msg.chat_jid, message_id = %msg.id, written, "recorded message");
    Ok(written)
}

/// Records a text message the local account just sent.
pub fn record_outgoing(
    store: &MessageStore,
    to: &Jid,
    own_jid: &str,
    receipt: &SendReceipt,
    text: &str,
) -> Result<bool, CoreError> {
    let chat_jid = to.to_string();
    let name = resolve_chat_name(store, &chat_jid, None)?;
    store.store_chat(&chat_jid, &name, receipt.timestamp)?;
    store.store_message(
        &receipt.id,
        &chat_jid,
        own_jid,
        text,
        receipt.timestamp,
        true,
        None,
    )
}
