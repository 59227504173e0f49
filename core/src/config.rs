use std::path::PathBuf;
use std::time::Duration;

use crate::error::CoreError;
use crate::session::{ConnectOptions, DEFAULT_PAIRING_TIMEOUT, DEFAULT_SETTLE_DELAY};

pub const STORE_DIR_ENV: &str = "WA_BRIDGE_STORE_DIR";
pub const PAIRING_TIMEOUT_ENV: &str = "WA_BRIDGE_PAIRING_TIMEOUT_SECS";
pub const SETTLE_MS_ENV: &str = "WA_BRIDGE_SETTLE_MS";

const MESSAGES_DB: &str = "messages.db";
const SESSION_DB: &str = "whatsapp.db";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeConfig {
    /// Directory holding both databases and the diagnostics log.
    pub store_dir: PathBuf,
    pub pairing_timeout: Duration,
    pub settle_delay: Duration,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            store_dir: PathBuf::from("store"),
            pairing_timeout: DEFAULT_PAIRING_TIMEOUT,
            settle_delay: DEFAULT_SETTLE_DELAY,
        }
    }
}

impl BridgeConfig {
    pub fn from_env() -> Result<Self, CoreError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from defaults overridden by whatever `lookup` returns.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, CoreError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(dir) = lookup(STORE_DIR_ENV).filter(|v| !v.trim().is_empty()) {
            config.store_dir = PathBuf::from(dir);
        }
        if let Some(raw) = lookup(PAIRING_TIMEOUT_ENV) {
            let secs = parse_u64(PAIRING_TIMEOUT_ENV, &raw)?;
            if secs == 0 {
                return Err(CoreError::Config(format!("{} must be positive", PAIRING_TIMEOUT_ENV)));
            }
            config.pairing_timeout = Duration::from_secs(secs);
        }
        if let Some(raw) = lookup(SETTLE_MS_ENV) {
            config.settle_delay = Duration::from_millis(parse_u64(SETTLE_MS_ENV, &raw)?);
        }
        Ok(config)
    }

    pub fn messages_path(&self) -> PathBuf {
        self.store_dir.join(MESSAGES_DB)
    }

    pub fn session_path(&self) -> PathBuf {
        self.store_dir.join(SESSION_DB)
    }

    pub fn log_dir(&self) -> PathBuf {
        self.store_dir.join("logs")
    }

    pub fn connect_options(&self) -> ConnectOptions {
        ConnectOptions {
            pairing_timeout: self.pairing_timeout,
            settle_delay: self.settle_delay,
        }
    }
}

fn parse_u64(key: &str, raw: &str) -> Result<u64, CoreError> {
    raw.trim()
        .parse()
        .map_err(|_| CoreError::Config(format!("{} is not a number: {}", key, raw)))
}
