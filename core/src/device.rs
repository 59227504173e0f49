use std::fmt;
use std::path::Path;

use chrono::Utc;
use rand::rngs::OsRng;
use rand::{Rng, RngCore};
use rusqlite::{params, Connection, OptionalExtension};
use zeroize::Zeroizing;

use crate::db::{apply_migrations, open_database};
use crate::error::CoreError;
use crate::migrations::SESSION_MIGRATIONS;

/// Registration ids are 14-bit on the wire.
const REGISTRATION_ID_MAX: u32 = 16380;

/// The local device's registration state and key material.
#[derive(Clone)]
pub struct DeviceIdentity {
    /// Account JID assigned by the service once pairing succeeded.
    pub jid: Option<String>,
    pub registration_id: u32,
    pub noise_key: Zeroizing<[u8; 32]>,
    pub identity_key: Zeroizing<[u8; 32]>,
    pub created_at: i64,
}

impl DeviceIdentity {
    pub fn generate() -> Self {
        let mut noise_key = Zeroizing::new([0u8; 32]);
        let mut identity_key = Zeroizing::new([0u8; 32]);
        OsRng.fill_bytes(&mut noise_key[..]);
        OsRng.fill_bytes(&mut identity_key[..]);
        Self {
            jid: None,
            registration_id: OsRng.gen_range(1..=REGISTRATION_ID_MAX),
            noise_key,
            identity_key,
            created_at: Utc::now().timestamp_millis(),
        }
    }

    pub fn is_registered(&self) -> bool {
        self.jid.as_deref().is_some_and(|jid| !jid.is_empty())
    }
}

impl fmt::Debug for DeviceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceIdentity")
            .field("jid", &self.jid)
            .field("registration_id", &self.registration_id)
            .field("created_at", &self.created_at)
            .finish_non_exhaustive()
    }
}

/// Persistence for the local device identity.
pub trait DeviceStore: Send {
    /// The first registered device, if any.
    fn first_device(&self) -> Result<Option<DeviceIdentity>, CoreError>;
    /// A fresh, unregistered identity. Not persisted until `save_device`.
    fn new_device(&self) -> Result<DeviceIdentity, CoreError> {
        Ok(DeviceIdentity::generate())
    }
    fn save_device(&self, device: &DeviceIdentity) -> Result<(), CoreError>;
}

pub struct SqliteDeviceStore {
    conn: Connection,
}

impl SqliteDeviceStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, CoreError> {
        let conn = open_database(path, SESSION_MIGRATIONS)?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self, CoreError> {
        let conn = Connection::open_in_memory()?;
        apply_migrations(&conn, SESSION_MIGRATIONS)?;
        Ok(Self { conn })
    }

    pub fn device_count(&self) -> Result<i64, CoreError> {
        let count = self
            .conn
            .query_row("SELECT COUNT(1) FROM devices;", [], |row| row.get(0))?;
        Ok(count)
    }
}

impl DeviceStore for SqliteDeviceStore {
    fn first_device(&self) -> Result<Option<DeviceIdentity>, CoreError> {
        let row = self
            .conn
            .query_row(
                "SELECT jid, registration_id, noise_key, identity_key, created_at \
                 FROM devices \
                 WHERE jid IS NOT NULL AND jid != '' \
                 ORDER BY created_at ASC \
                 LIMIT 1;",
                [],
                |row| {
                    Ok((
                        row.get::<_, Option<String>>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, Vec<u8>>(2)?,
                        row.get::<_, Vec<u8>>(3)?,
                        row.get::<_, i64>(4)?,
                    ))
                },
            )
            .optional()?;
        let Some((jid, registration_id, noise, identity, created_at)) = row else {
            return Ok(None);
        };
        let registration_id = u32::try_from(registration_id)
            .map_err(|_| CoreError::IdentityLoad("registration id out of range".to_string()))?;
        Ok(Some(DeviceIdentity {
            jid,
            registration_id,
            noise_key: key_from_blob(noise, "noise key")?,
            identity_key: key_from_blob(identity, "identity key")?,
            created_at,
        }))
    }

    fn save_device(&self, device: &DeviceIdentity) -> Result<(), CoreError> {
        self.conn.execute(
            "INSERT OR REPLACE INTO devices (registration_id, jid, noise_key, identity_key, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5);",
            params![
                device.registration_id,
                device.jid,
                device.noise_key.as_slice(),
                device.identity_key.as_slice(),
                device.created_at,
            ],
        )?;
        Ok(())
    }
}

fn key_from_blob(blob: Vec<u8>, what: &str) -> Result<Zeroizing<[u8; 32]>, CoreError> {
    let blob = Zeroizing::new(blob);
    if blob.len() != 32 {
        return Err(CoreError::IdentityLoad(format!(
            "{} has {} bytes, expected 32",
            what,
            blob.len()
        )));
    }
    let mut out = Zeroizing::new([0u8; 32]);
    out.copy_from_slice(&blob);
    Ok(out)
}
