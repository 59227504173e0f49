use std::fmt;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("failed to load device identity: {0}")]
    IdentityLoad(String),
    #[error("{phase} failed: {0}", phase = .0.phase())]
    Connect(#[from] ConnectError),
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
    #[error("not connected")]
    NotConnected,
    #[error("message store unavailable: {0}")]
    StoreUnavailable(String),
    #[error("media mismatch: {0}")]
    MediaMismatch(String),
    #[error("qr render error: {0}")]
    Qr(String),
    #[error("config error: {0}")]
    Config(String),
}

/// Error reported by the messaging-protocol collaborator.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct ProtocolError(pub String);

impl ProtocolError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

/// Stage of `connect()` that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectPhase {
    Pairing,
    Connect,
    Stability,
}

impl fmt::Display for ConnectPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectPhase::Pairing => "pairing",
            ConnectPhase::Connect => "connect",
            ConnectPhase::Stability => "stability check",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("timeout waiting for pairing code scan after {secs}s", secs = .0.as_secs())]
    PairingTimeout(Duration),
    #[error("pairing rejected: {0}")]
    PairingRejected(String),
    #[error("pairing event stream closed before success")]
    PairingStreamClosed,
    #[error("pairing cancelled")]
    Cancelled,
    #[error("failed to connect: {source}")]
    Transport {
        phase: ConnectPhase,
        #[source]
        source: ProtocolError,
    },
    #[error("failed to establish stable connection")]
    Unstable,
}

impl ConnectError {
    pub fn phase(&self) -> ConnectPhase {
        match self {
            ConnectError::PairingTimeout(_)
            | ConnectError::PairingRejected(_)
            | ConnectError::PairingStreamClosed
            | ConnectError::Cancelled => ConnectPhase::Pairing,
            ConnectError::Transport { phase, .. } => *phase,
            ConnectError::Unstable => ConnectPhase::Stability,
        }
    }

    /// Whether calling `connect()` again can reasonably succeed.
    ///
    /// Timeouts need the user to scan in time, transport and stability
    /// failures are usually transient. A rejected pairing or an explicit
    /// cancel is left to the caller.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ConnectError::PairingTimeout(_)
                | ConnectError::PairingStreamClosed
                | ConnectError::Transport { .. }
                | ConnectError::Unstable
        )
    }
}

impl CoreError {
    pub fn connect_phase(&self) -> Option<ConnectPhase> {
        match self {
            CoreError::Connect(err) => Some(err.phase()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_errors_carry_phase_in_message() {
        let err = CoreError::from(ConnectError::Unstable);
        assert_eq!(err.connect_phase(), Some(ConnectPhase::Stability));
        assert_eq!(
            err.to_string(),
            "stability check failed: failed to establish stable connection"
        );

        let err = CoreError::from(ConnectError::PairingTimeout(Duration::from_secs(180)));
        assert!(err.to_string().starts_with("pairing failed: timeout"));
        assert!(err.to_string().contains("180s"));
    }

    #[test]
    fn transport_phase_follows_branch() {
        let err = ConnectError::Transport {
            phase: ConnectPhase::Connect,
            source: ProtocolError::new("socket refused"),
        };
        assert_eq!(err.phase(), ConnectPhase::Connect);
        assert!(err.is_retryable());
        assert!(!ConnectError::Cancelled.is_retryable());
    }
}
