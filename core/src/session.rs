//! Device session bootstrap and the pairing/connection state machine.
//!
//! `connect()` hides both branches behind one call. Without a registered
//! identity the client opens the pairing stream, connects, and keeps showing
//! rotating codes until the phone links the device or the bounded wait
//! expires. With a registered identity it connects directly. Either way it
//! then waits a short settle delay and checks the socket is still up, since a
//! link can succeed and the connection drop right after.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::device::{DeviceIdentity, DeviceStore};
use crate::error::{ConnectError, ConnectPhase, CoreError};
use crate::protocol::{EventHandler, Jid, PairingEvent, Protocol, SendReceipt};
use crate::qr::{PairingDisplay, TerminalDisplay};

pub const DEFAULT_PAIRING_TIMEOUT: Duration = Duration::from_secs(180);
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_secs(2);

/// How often the pairing forwarder checks whether the wait has ended.
const FORWARD_POLL: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectOptions {
    pub pairing_timeout: Duration,
    pub settle_delay: Duration,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            pairing_timeout: DEFAULT_PAIRING_TIMEOUT,
            settle_delay: DEFAULT_SETTLE_DELAY,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    NoSession,
    ExistingSession,
    Pairing,
    Connected,
    Failed(ConnectPhase),
}

enum PairingSignal {
    Event(PairingEvent),
    Closed,
    Cancelled,
}

/// Aborts an in-progress pairing wait. Cloneable and usable from any thread.
#[derive(Clone, Default)]
pub struct CancelHandle {
    slot: Arc<Mutex<Option<Sender<PairingSignal>>>>,
}

impl CancelHandle {
    /// Returns false when no pairing wait was running.
    pub fn cancel(&self) -> bool {
        let Ok(guard) = self.slot.lock() else {
            return false;
        };
        match guard.as_ref() {
            Some(tx) => tx.send(PairingSignal::Cancelled).is_ok(),
            None => false,
        }
    }

    fn arm(&self, tx: Sender<PairingSignal>) {
        if let Ok(mut guard) = self.slot.lock() {
            *guard = Some(tx);
        }
    }

    fn disarm(&self) {
        if let Ok(mut guard) = self.slot.lock() {
            *guard = None;
        }
    }
}

pub struct SessionClient<P: Protocol> {
    protocol: P,
    devices: Box<dyn DeviceStore>,
    device: DeviceIdentity,
    state: SessionState,
    options: ConnectOptions,
    display: Box<dyn PairingDisplay>,
    cancel: CancelHandle,
}

impl<P: Protocol> SessionClient<P> {
    /// Loads the first registered device, or creates a fresh identity when
    /// there is none, and attaches it to the protocol client.
    pub fn new(
        devices: Box<dyn DeviceStore>,
        protocol: P,
        options: ConnectOptions,
    ) -> Result<Self, CoreError> {
        let mut state = SessionState::Uninitialized;
        debug!(?state, "loading device identity");
        let device = match devices.first_device() {
            Ok(Some(device)) if device.is_registered() => {
                state = SessionState::ExistingSession;
                info!(jid = device.jid.as_deref().unwrap_or_default(), "using stored device");
                device
            }
            Ok(_) => {
                let device = devices
                    .new_device()
                    .map_err(|e| CoreError::IdentityLoad(e.to_string()))?;
                state = SessionState::NoSession;
                info!(registration_id = device.registration_id, "created new device");
                device
            }
            Err(err) => return Err(CoreError::IdentityLoad(err.to_string())),
        };
        protocol
            .attach_device(&device)
            .map_err(|e| CoreError::IdentityLoad(e.to_string()))?;
        Ok(Self {
            protocol,
            devices,
            device,
            state,
            options,
            display: Box::new(TerminalDisplay),
            cancel: CancelHandle::default(),
        })
    }

    pub fn with_display(mut self, display: Box<dyn PairingDisplay>) -> Self {
        self.display = display;
        self
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn device(&self) -> &DeviceIdentity {
        &self.device
    }

    pub fn protocol(&self) -> &P {
        &self.protocol
    }

    pub fn options(&self) -> ConnectOptions {
        self.options
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Runs the pairing/connection state machine once. A failure is terminal
    /// for this call only; calling again starts over from the current
    /// identity, which survives failed pairing attempts.
    pub fn connect(&mut self) -> Result<(), CoreError> {
        let result = if self.device.is_registered() {
            self.connect_existing()
        } else {
            self.pair()
        }
        .and_then(|()| self.verify_stable());

        match result {
            Ok(()) => {
                self.state = SessionState::Connected;
                info!(jid = self.device.jid.as_deref().unwrap_or_default(), "connected");
                Ok(())
            }
            Err(err) => {
                let phase = err.phase();
                self.state = SessionState::Failed(phase);
                warn!(%phase, error = %err, retryable = err.is_retryable(), "connect failed");
                if !matches!(err, ConnectError::Transport { .. }) {
                    self.protocol.disconnect();
                }
                Err(CoreError::Connect(err))
            }
        }
    }

    fn connect_existing(&mut self) -> Result<(), ConnectError> {
        self.state = SessionState::ExistingSession;
        self.protocol
            .connect()
            .map_err(|source| ConnectError::Transport {
                phase: ConnectPhase::Connect,
                source,
            })
    }

    fn pair(&mut self) -> Result<(), ConnectError> {
        self.state = SessionState::Pairing;
        let events = self
            .protocol
            .pairing_events()
            .map_err(|source| ConnectError::Transport {
                phase: ConnectPhase::Pairing,
                source,
            })?;
        let (tx, rx) = mpsc::channel();
        let stop = Arc::new(AtomicBool::new(false));
        let forwarder = spawn_forwarder(events, tx.clone(), Arc::clone(&stop));
        self.cancel.arm(tx);

        let outcome = match self.protocol.connect() {
            Ok(()) => self.wait_for_pairing(&rx),
            Err(source) => Err(ConnectError::Transport {
                phase: ConnectPhase::Pairing,
                source,
            }),
        };
        self.cancel.disarm();
        stop.store(true, Ordering::SeqCst);
        if forwarder.join().is_err() {
            warn!("pairing forwarder panicked");
        }
        let jid = outcome?;

        self.device.jid = Some(jid.clone());
        if let Err(err) = self.devices.save_device(&self.device) {
            warn!(error = %err, "paired device could not be persisted; next start will pair again");
        }
        self.display.paired(&jid);
        Ok(())
    }

    fn wait_for_pairing(&mut self, rx: &Receiver<PairingSignal>) -> Result<String, ConnectError> {
        let timeout = self.options.pairing_timeout;
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match rx.recv_timeout(remaining) {
                Ok(PairingSignal::Event(PairingEvent::Code(code))) => {
                    debug!("new pairing code");
                    self.display.show_code(&code);
                }
                Ok(PairingSignal::Event(PairingEvent::Success { jid })) => return Ok(jid),
                Ok(PairingSignal::Event(PairingEvent::Failure(reason))) => {
                    self.display.failed(&reason);
                    return Err(ConnectError::PairingRejected(reason));
                }
                Ok(PairingSignal::Cancelled) => return Err(ConnectError::Cancelled),
                Ok(PairingSignal::Closed) | Err(RecvTimeoutError::Disconnected) => {
                    return Err(ConnectError::PairingStreamClosed)
                }
                Err(RecvTimeoutError::Timeout) => return Err(ConnectError::PairingTimeout(timeout)),
            }
        }
    }

    fn verify_stable(&mut self) -> Result<(), ConnectError> {
        thread::sleep(self.options.settle_delay);
        if self.protocol.is_connected() {
            Ok(())
        } else {
            Err(ConnectError::Unstable)
        }
    }

    pub fn is_connected(&self) -> bool {
        self.state == SessionState::Connected && self.protocol.is_connected()
    }

    /// Sends a text message. `recipient` is a JID or a phone number.
    pub fn send_text(&self, recipient: &str, text: &str) -> Result<(Jid, SendReceipt), CoreError> {
        if text.trim().is_empty() {
            return Err(CoreError::InvalidArgument("message text is empty".to_string()));
        }
        let jid = Jid::from_recipient(recipient)?;
        if !self.is_connected() {
            return Err(CoreError::NotConnected);
        }
        let receipt = self.protocol.send_text(&jid, text)?;
        debug!(to = %jid, message_id = %receipt.id, "message sent");
        Ok((jid, receipt))
    }

    pub fn subscribe(&self, handler: EventHandler) {
        self.protocol.subscribe(handler);
    }

    pub fn disconnect(&mut self) {
        self.protocol.disconnect();
        self.state = if self.device.is_registered() {
            SessionState::ExistingSession
        } else {
            SessionState::NoSession
        };
        info!("disconnected");
    }
}

/// Moves pairing events into the wait channel until the upstream closes or
/// `stop` is raised. The upstream receiver is dropped on exit, so a protocol
/// that keeps its sender alive sees the stream go away.
fn spawn_forwarder(
    events: Receiver<PairingEvent>,
    tx: Sender<PairingSignal>,
    stop: Arc<AtomicBool>,
) -> JoinHandle<()> {
    thread::spawn(move || {
        while !stop.load(Ordering::SeqCst) {
            match events.recv_timeout(FORWARD_POLL) {
                Ok(event) => {
                    if tx.send(PairingSignal::Event(event)).is_err() {
                        return;
                    }
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    let _ = tx.send(PairingSignal::Closed);
                    return;
                }
            }
        }
    })
}
