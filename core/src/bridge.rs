use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{error, info, warn};

use crate::error::CoreError;
use crate::ingest::{record_incoming, record_outgoing};
use crate::protocol::{Protocol, ProtocolEvent, SendReceipt};
use crate::session::SessionClient;
use crate::store::MessageStore;

/// Wires a session to a message store: inbound messages are recorded as they
/// arrive and outbound sends are recorded once the service accepts them.
pub struct Bridge<P: Protocol> {
    session: SessionClient<P>,
    store: Arc<Mutex<MessageStore>>,
    subscribed: bool,
}

impl<P: Protocol> Bridge<P> {
    pub fn new(session: SessionClient<P>, store: MessageStore) -> Self {
        Self {
            session,
            store: Arc::new(Mutex::new(store)),
            subscribed: false,
        }
    }

    /// Subscribes the store to inbound events, then connects. Safe to call
    /// again after a failed connect; the handler is only installed once.
    pub fn start(&mut self) -> Result<(), CoreError> {
        if !self.subscribed {
            self.subscribe_store();
            self.subscribed = true;
        }
        self.session.connect()
    }

    fn subscribe_store(&self) {
        let store = Arc::clone(&self.store);
        self.session.subscribe(Arc::new(move |event: ProtocolEvent| match event {
            ProtocolEvent::Message(msg) => {
                let Ok(guard) = store.lock() else {
                    error!("message store lock poisoned; dropping message");
                    return;
                };
                if let Err(err) = record_incoming(&guard, &msg) {
                    warn!(chat = %msg.chat_jid, message_id = %msg.id, error = %err, "failed to store message");
                }
            }
            ProtocolEvent::Connected => info!("protocol connected"),
            ProtocolEvent::Disconnected => warn!("protocol disconnected"),
            ProtocolEvent::LoggedOut => warn!("device was logged out; pairing required on next start"),
        }));
    }

    pub fn send_text(&self, recipient: &str, text: &str) -> Result<SendReceipt, CoreError> {
        let (jid, receipt) = self.session.send_text(recipient, text)?;
        let own_jid = self.session.device().jid.clone().unwrap_or_default();
        let guard = self.lock_store()?;
        record_outgoing(&guard, &jid, &own_jid, &receipt, text)?;
        Ok(receipt)
    }

    pub fn session(&self) -> &SessionClient<P> {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut SessionClient<P> {
        &mut self.session
    }

    /// Runs `f` against the store while holding its lock.
    pub fn with_store<F, T>(&self, f: F) -> Result<T, CoreError>
    where
        F: FnOnce(&MessageStore) -> Result<T, CoreError>,
    {
        let guard = self.lock_store()?;
        f(&guard)
    }

    fn lock_store(&self) -> Result<MutexGuard<'_, MessageStore>, CoreError> {
        self.store
            .lock()
            .map_err(|_| CoreError::StoreUnavailable("lock poisoned by a panicked writer".to_string()))
    }

    pub fn shutdown(&mut self) {
        self.session.disconnect();
    }
}
