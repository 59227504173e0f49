#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use wa_bridge_core::device::DeviceIdentity;
use wa_bridge_core::protocol::{EventHandler, Jid, PairingEvent, Protocol, ProtocolEvent, SendReceipt};
use wa_bridge_core::qr::PairingDisplay;
use wa_bridge_core::{ConnectOptions, MessageStore, ProtocolError};

/// Scripted stand-in for the protocol client. Clones share state so a test
/// can keep one handle after moving another into a `SessionClient`.
#[derive(Clone, Default)]
pub struct FakeProtocol {
    inner: Arc<FakeState>,
}

#[derive(Default)]
struct FakeState {
    pairing_script: Mutex<Vec<PairingEvent>>,
    keep_stream_open: AtomicBool,
    held_senders: Mutex<Vec<Sender<PairingEvent>>>,
    connect_error: Mutex<Option<ProtocolError>>,
    drops_after_connect: AtomicBool,
    connected: AtomicBool,
    attached: Mutex<Vec<u32>>,
    pairing_opens: AtomicUsize,
    connect_calls: AtomicUsize,
    disconnect_calls: AtomicUsize,
    handlers: Mutex<Vec<EventHandler>>,
    sent: Mutex<Vec<(String, String)>>,
}

impl FakeProtocol {
    pub fn new() -> Self {
        Self::default()
    }

    /// Events delivered on the next pairing stream. With `keep_open` the
    /// stream stays open after the script runs out.
    pub fn script_pairing(&self, events: Vec<PairingEvent>, keep_open: bool) {
        *self.inner.pairing_script.lock().unwrap() = events;
        self.inner.keep_stream_open.store(keep_open, Ordering::SeqCst);
    }

    pub fn fail_connect(&self, msg: &str) {
        *self.inner.connect_error.lock().unwrap() = Some(ProtocolError::new(msg));
    }

    /// The socket reports disconnected right after `connect()` succeeds.
    pub fn drop_after_connect(&self, drop: bool) {
        self.inner.drops_after_connect.store(drop, Ordering::SeqCst);
    }

    pub fn attached(&self) -> Vec<u32> {
        self.inner.attached.lock().unwrap().clone()
    }

    pub fn pairing_opens(&self) -> usize {
        self.inner.pairing_opens.load(Ordering::SeqCst)
    }

    pub fn connect_calls(&self) -> usize {
        self.inner.connect_calls.load(Ordering::SeqCst)
    }

    pub fn disconnect_calls(&self) -> usize {
        self.inner.disconnect_calls.load(Ordering::SeqCst)
    }

    pub fn sent(&self) -> Vec<(String, String)> {
        self.inner.sent.lock().unwrap().clone()
    }

    pub fn handler_count(&self) -> usize {
        self.inner.handlers.lock().unwrap().len()
    }

    /// True once every pairing stream kept open by the fake has lost its
    /// receiving end.
    pub fn pairing_streams_released(&self) -> bool {
        self.inner
            .held_senders
            .lock()
            .unwrap()
            .iter()
            .all(|tx| tx.send(PairingEvent::Code("late".to_string())).is_err())
    }

    /// Delivers an event to every subscribed handler, as the protocol's
    /// receive loop would.
    pub fn emit(&self, event: ProtocolEvent) {
        let handlers = self.inner.handlers.lock().unwrap().clone();
        for handler in handlers {
            handler(event.clone());
        }
    }
}

impl Protocol for FakeProtocol {
    fn attach_device(&self, device: &DeviceIdentity) -> Result<(), ProtocolError> {
        self.inner.attached.lock().unwrap().push(device.registration_id);
        Ok(())
    }

    fn pairing_events(&self) -> Result<Receiver<PairingEvent>, ProtocolError> {
        self.inner.pairing_opens.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = mpsc::channel();
        for event in self.inner.pairing_script.lock().unwrap().iter() {
            tx.send(event.clone()).expect("send scripted event");
        }
        if self.inner.keep_stream_open.load(Ordering::SeqCst) {
            self.inner.held_senders.lock().unwrap().push(tx);
        }
        Ok(rx)
    }

    fn connect(&self) -> Result<(), ProtocolError> {
        self.inner.connect_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.inner.connect_error.lock().unwrap().clone() {
            return Err(err);
        }
        let up = !self.inner.drops_after_connect.load(Ordering::SeqCst);
        self.inner.connected.store(up, Ordering::SeqCst);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.inner.connected.load(Ordering::SeqCst)
    }

    fn disconnect(&self) {
        self.inner.disconnect_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.connected.store(false, Ordering::SeqCst);
    }

    fn send_text(&self, to: &Jid, text: &str) -> Result<SendReceipt, ProtocolError> {
        let mut sent = self.inner.sent.lock().unwrap();
        sent.push((to.to_string(), text.to_string()));
        Ok(SendReceipt {
            id: format!("SENT{}", sent.len()),
            timestamp: ts(1_700_000_500),
        })
    }

    fn subscribe(&self, handler: EventHandler) {
        self.inner.handlers.lock().unwrap().push(handler);
    }
}

#[derive(Clone, Default)]
pub struct RecordingDisplay {
    pub codes: Arc<Mutex<Vec<String>>>,
    pub paired: Arc<Mutex<Vec<String>>>,
    pub failures: Arc<Mutex<Vec<String>>>,
}

impl PairingDisplay for RecordingDisplay {
    fn show_code(&mut self, code: &str) {
        self.codes.lock().unwrap().push(code.to_string());
    }

    fn paired(&mut self, jid: &str) {
        self.paired.lock().unwrap().push(jid.to_string());
    }

    fn failed(&mut self, reason: &str) {
        self.failures.lock().unwrap().push(reason.to_string());
    }
}

pub fn fast_options(pairing_timeout: Duration) -> ConnectOptions {
    ConnectOptions {
        pairing_timeout,
        settle_delay: Duration::ZERO,
    }
}

pub fn ts(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).single().expect("valid timestamp")
}

pub fn memory_store() -> MessageStore {
    MessageStore::open_in_memory().expect("memory store")
}

/// Rows inserted, updated or deleted on this connection so far.
pub fn total_changes(store: &MessageStore) -> i64 {
    store
        .conn
        .query_row("SELECT total_changes();", [], |row| row.get(0))
        .expect("total changes")
}

pub fn message_count(store: &MessageStore) -> i64 {
    store
        .conn
        .query_row("SELECT COUNT(1) FROM messages;", [], |row| row.get(0))
        .expect("count messages")
}
