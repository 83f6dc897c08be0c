use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use alloy::primitives::U256;
use dashmap::DashMap;
use rusqlite::{OptionalExtension, TransactionBehavior};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::claim::uint_repr;
use crate::{AdmissionError, Claim};

/// Last accepted state of one payment channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelState {
    #[serde(with = "uint_repr")]
    pub channel_id: U256,
    #[serde(with = "uint_repr")]
    pub cumulative_value: U256,
    /// Raw claim that produced `cumulative_value`, kept for audit.
    pub last_claim: Option<Claim>,
}

impl ChannelState {
    /// Implicit state of a channel that has never been paid on.
    pub fn zero(channel_id: U256) -> Self {
        Self {
            channel_id,
            cumulative_value: U256::ZERO,
            last_claim: None,
        }
    }

    pub fn from_claim(claim: &Claim) -> Self {
        Self {
            channel_id: claim.channel_id,
            cumulative_value: claim.value,
            last_claim: Some(claim.clone()),
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("corrupt record for channel {channel_id}: {reason}")]
    Corrupt { channel_id: String, reason: String },

    #[error("channel {channel_id} changed since it was read")]
    Conflict { channel_id: U256 },
}

impl From<StoreError> for AdmissionError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Conflict { channel_id } => AdmissionError::ConcurrentUpdate { channel_id },
            other => AdmissionError::StoreUnavailable(other.to_string()),
        }
    }
}

/// Trait for channel state backends.
///
/// Implementations must be thread-safe (`Send + Sync`). A missing channel is
/// never an error: it reads as [`ChannelState::zero`].
pub trait StateStore: Send + Sync {
    /// Stored state, or `None` if the channel has never been committed.
    fn get(&self, channel_id: U256) -> Result<Option<ChannelState>, StoreError>;

    /// Stored state, or the zero state for an unknown channel.
    fn get_or_zero(&self, channel_id: U256) -> Result<ChannelState, StoreError> {
        Ok(self
            .get(channel_id)?
            .unwrap_or_else(|| ChannelState::zero(channel_id)))
    }

    /// Atomically replace `prior` with the state produced by `claim`.
    ///
    /// Fails with [`StoreError::Conflict`] if the stored cumulative value is
    /// no longer `prior.cumulative_value`. The new state is durable once this
    /// returns `Ok`.
    fn commit(&self, prior: &ChannelState, claim: &Claim) -> Result<ChannelState, StoreError>;

    /// Administrative removal. Returns whether a record existed.
    fn delete(&self, channel_id: U256) -> Result<bool, StoreError>;

    /// Number of channels with stored state.
    fn len(&self) -> Result<usize, StoreError>;

    fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len()? == 0)
    }

    fn exists(&self, channel_id: U256) -> Result<bool, StoreError> {
        Ok(self.get(channel_id)?.is_some())
    }
}

/// In-memory channel state backed by DashMap. Fast but lost on restart.
pub struct InMemoryStateStore {
    states: DashMap<U256, ChannelState>,
}

impl InMemoryStateStore {
    pub fn new() -> Self {
        Self {
            states: DashMap::new(),
        }
    }
}

impl Default for InMemoryStateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl StateStore for InMemoryStateStore {
    fn get(&self, channel_id: U256) -> Result<Option<ChannelState>, StoreError> {
        Ok(self.states.get(&channel_id).map(|s| s.value().clone()))
    }

    fn commit(&self, prior: &ChannelState, claim: &Claim) -> Result<ChannelState, StoreError> {
        use dashmap::mapref::entry::Entry;

        let conflict = StoreError::Conflict {
            channel_id: prior.channel_id,
        };
        if claim.channel_id != prior.channel_id {
            return Err(conflict);
        }

        let next = ChannelState::from_claim(claim);
        match self.states.entry(prior.channel_id) {
            Entry::Occupied(mut current) => {
                if current.get().cumulative_value != prior.cumulative_value {
                    return Err(conflict);
                }
                current.insert(next.clone());
            }
            Entry::Vacant(slot) => {
                if !prior.cumulative_value.is_zero() {
                    return Err(conflict);
                }
                slot.insert(next.clone());
            }
        }
        Ok(next)
    }

    fn delete(&self, channel_id: U256) -> Result<bool, StoreError> {
        Ok(self.states.remove(&channel_id).is_some())
    }

    fn len(&self) -> Result<usize, StoreError> {
        Ok(self.states.len())
    }
}

/// Persistent channel state backed by SQLite. Survives restarts.
///
/// Each channel is one row; commits run in an `IMMEDIATE` transaction so
/// the compare-and-swap holds across processes sharing the file.
pub struct SqliteStateStore {
    conn: Mutex<rusqlite::Connection>,
    path: PathBuf,
}

impl SqliteStateStore {
    /// Open (or create) the channel state database at `path`.
    ///
    /// A file that SQLite does not recognize as a database is moved aside to
    /// `<path>.corrupt` and replaced by an empty store. On Unix the database
    /// file is restricted to 0600.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let conn = match Self::connect(path) {
            Ok(conn) => conn,
            Err(StoreError::Database(e)) if is_unreadable(&e) => {
                let aside = corrupt_path(path);
                tracing::warn!(
                    path = %path.display(),
                    moved_to = %aside.display(),
                    error = %e,
                    "channel state database unreadable, starting with an empty store"
                );
                std::fs::rename(path, &aside)?;
                Self::connect(path)?
            }
            Err(e) => return Err(e),
        };

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Err(e) = std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
            {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to set channel state database permissions to 0600"
                );
            }
        }

        Ok(Self {
            conn: Mutex::new(conn),
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn connect(path: &Path) -> Result<rusqlite::Connection, StoreError> {
        let conn = rusqlite::Connection::open(path)?;
        conn.execute_batch(
            "PRAGMA journal_mode=WAL;
            PRAGMA synchronous=FULL;
            CREATE TABLE IF NOT EXISTS channel_state (
                channel_id TEXT PRIMARY KEY,
                cumulative_value TEXT NOT NULL,
                last_claim TEXT,
                updated_at INTEGER NOT NULL
            );",
        )?;
        Ok(conn)
    }

    fn lock(&self) -> MutexGuard<'_, rusqlite::Connection> {
        match self.conn.lock() {
            Ok(c) => c,
            Err(poisoned) => {
                tracing::error!("channel state store mutex poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }
}

fn is_unreadable(e: &rusqlite::Error) -> bool {
    matches!(
        e.sqlite_error_code(),
        Some(rusqlite::ErrorCode::NotADatabase | rusqlite::ErrorCode::DatabaseCorrupt)
    )
}

fn corrupt_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".corrupt");
    PathBuf::from(name)
}

fn unix_now() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}

fn parse_value(channel_id: &str, text: &str) -> Result<U256, StoreError> {
    U256::from_str_radix(text, 10).map_err(|e| StoreError::Corrupt {
        channel_id: channel_id.to_string(),
        reason: format!("cumulative value '{text}': {e}"),
    })
}

impl StateStore for SqliteStateStore {
    fn get(&self, channel_id: U256) -> Result<Option<ChannelState>, StoreError> {
        let key = channel_id.to_string();
        let conn = self.lock();
        let row: Option<(String, Option<String>)> = conn
            .query_row(
                "SELECT cumulative_value, last_claim FROM channel_state WHERE channel_id = ?1",
                [&key],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let Some((value, last_claim)) = row else {
            return Ok(None);
        };
        let cumulative_value = parse_value(&key, &value)?;
        let last_claim = last_claim
            .map(|json| serde_json::from_str::<Claim>(&json))
            .transpose()
            .map_err(|e| StoreError::Corrupt {
                channel_id: key.clone(),
                reason: format!("last claim: {e}"),
            })?;

        Ok(Some(ChannelState {
            channel_id,
            cumulative_value,
            last_claim,
        }))
    }

    fn commit(&self, prior: &ChannelState, claim: &Claim) -> Result<ChannelState, StoreError> {
        let conflict = StoreError::Conflict {
            channel_id: prior.channel_id,
        };
        if claim.channel_id != prior.channel_id {
            return Err(conflict);
        }

        let key = prior.channel_id.to_string();
        let claim_json = serde_json::to_string(claim).map_err(|e| StoreError::Corrupt {
            channel_id: key.clone(),
            reason: format!("unserializable claim: {e}"),
        })?;

        let mut conn = self.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let current: Option<String> = tx
            .query_row(
                "SELECT cumulative_value FROM channel_state WHERE channel_id = ?1",
                [&key],
                |row| row.get(0),
            )
            .optional()?;
        let current = match current {
            Some(text) => parse_value(&key, &text)?,
            None => U256::ZERO,
        };
        if current != prior.cumulative_value {
            // Dropping `tx` rolls back.
            return Err(conflict);
        }

        tx.execute(
            "INSERT INTO channel_state (channel_id, cumulative_value, last_claim, updated_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(channel_id) DO UPDATE SET
                cumulative_value = excluded.cumulative_value,
                last_claim = excluded.last_claim,
                updated_at = excluded.updated_at",
            rusqlite::params![key, claim.value.to_string(), claim_json, unix_now()],
        )?;
        tx.commit()?;

        Ok(ChannelState::from_claim(claim))
    }

    fn delete(&self, channel_id: U256) -> Result<bool, StoreError> {
        let conn = self.lock();
        let removed = conn.execute(
            "DELETE FROM channel_state WHERE channel_id = ?1",
            [channel_id.to_string()],
        )?;
        Ok(removed > 0)
    }

    fn len(&self) -> Result<usize, StoreError> {
        let conn = self.lock();
        let count: i64 =
            conn.query_row("SELECT COUNT(*) FROM channel_state", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or(0))
    }
}
