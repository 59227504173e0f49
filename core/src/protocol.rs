//! Capability surface of the messaging-protocol client.
//!
//! The protocol implementation (noise handshake, multi-device encryption,
//! binary framing) lives outside this crate. `SessionClient` only talks to it
//! through [`Protocol`], which keeps the pairing state machine testable
//! against a scripted fake.

use std::fmt;
use std::sync::mpsc::Receiver;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::device::DeviceIdentity;
use crate::error::{CoreError, ProtocolError};
use crate::models::MediaDescriptor;

pub const USER_SERVER: &str = "s.whatsapp.net";
pub const GROUP_SERVER: &str = "g.us";

/// Events emitted while a new device is being linked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PairingEvent {
    /// A fresh pairing code. Codes rotate until one is scanned.
    Code(String),
    /// The phone accepted the link; carries the JID assigned to this device.
    Success { jid: String },
    Failure(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingMessage {
    pub id: String,
    pub chat_jid: String,
    /// Push name or group subject, when the event carried one.
    pub chat_name: Option<String>,
    pub sender: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub is_from_me: bool,
    pub media: Option<MediaDescriptor>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolEvent {
    Message(IncomingMessage),
    Connected,
    Disconnected,
    LoggedOut,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendReceipt {
    pub id: String,
    pub timestamp: DateTime<Utc>,
}

pub type EventHandler = Arc<dyn Fn(ProtocolEvent) + Send + Sync>;

pub trait Protocol: Send + Sync {
    /// Hands the loaded or freshly created identity to the client.
    fn attach_device(&self, device: &DeviceIdentity) -> Result<(), ProtocolError>;
    /// Must be opened before `connect()` so no code is missed.
    fn pairing_events(&self) -> Result<Receiver<PairingEvent>, ProtocolError>;
    fn connect(&self) -> Result<(), ProtocolError>;
    fn is_connected(&self) -> bool;
    fn disconnect(&self);
    fn send_text(&self, to: &Jid, text: &str) -> Result<SendReceipt, ProtocolError>;
    fn subscribe(&self, handler: EventHandler);
}

/// `user@server` address of an account or group.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Jid {
    pub user: String,
    pub server: String,
}

impl Jid {
    pub fn user(user: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            server: USER_SERVER.to_string(),
        }
    }

    pub fn parse(raw: &str) -> Result<Self, CoreError> {
        let raw = raw.trim();
        match raw.split_once('@') {
            Some((user, server)) if !server.is_empty() && !server.contains('@') => Ok(Self {
                user: user.to_string(),
                server: server.to_string(),
            }),
            _ => Err(CoreError::InvalidArgument(format!("invalid jid: {}", raw))),
        }
    }

    /// Accepts a full JID or a phone number (`+` and separators allowed).
    pub fn from_recipient(recipient: &str) -> Result<Self, CoreError> {
        let recipient = recipient.trim();
        if recipient.contains('@') {
            return Self::parse(recipient);
        }
        let digits: String = recipient
            .chars()
            .filter(|c| !matches!(c, '+' | ' ' | '-' | '(' | ')'))
            .collect();
        if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(CoreError::InvalidArgument(format!(
                "recipient must be a jid or phone number: {}",
                recipient
            )));
        }
        Ok(Self::user(digits))
    }

    pub fn is_group(&self) -> bool {
        self.server == GROUP_SERVER
    }
}

impl fmt::Display for Jid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.user.is_empty() {
            f.write_str(&self.server)
        } else {
            write!(f, "{}@{}", self.user, self.server)
        }
    }
}
