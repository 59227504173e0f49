pub mod bridge;
pub mod config;
pub mod db;
pub mod device;
pub mod diagnostics;
pub mod error;
pub mod ingest;
pub mod media;
pub mod models;
pub mod protocol;
pub mod qr;
pub mod query;
pub mod seed;
pub mod session;
pub mod store;
mod migrations;

pub use bridge::Bridge;
pub use config::BridgeConfig;
pub use device::{DeviceIdentity, DeviceStore, SqliteDeviceStore};
pub use error::{ConnectError, ConnectPhase, CoreError, ProtocolError};
pub use protocol::{Jid, PairingEvent, Protocol, ProtocolEvent};
pub use session::{CancelHandle, ConnectOptions, SessionClient, SessionState};
pub use store::MessageStore;
