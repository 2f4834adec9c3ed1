//! # VaultStore: Snapshot & Event Persistence
//!
//! Persists the vault on sled's embedded key-value store, one named tree per
//! concern:
//!
//! | Tree       | Key                   | Value                    |
//! |------------|-----------------------|--------------------------|
//! | `state`    | `vault`               | `bincode(Vault)`         |
//! | `events`   | sequence (8B BE)      | `bincode(VaultEvent)`    |
//! | `metadata` | key (UTF-8)           | value (bytes)            |
//!
//! Event sequence numbers are big-endian so sled's lexicographic order is
//! emission order.
//!
//! ## Atomicity
//!
//! [`VaultStore::commit`] writes the snapshot, the new events and the next
//! sequence number in one transaction across all three trees. A crash
//! leaves either the previous call's data or this one's, never a mix.

use std::path::Path;

use serde::{de::DeserializeOwned, Serialize};
use sled::transaction::{ConflictableTransactionResult, TransactionError};
use sled::{Db, Transactional, Tree};

use bridgepool_vault::config::SNAPSHOT_VERSION;
use bridgepool_vault::{Vault, VaultEvent};

// ---------------------------------------------------------------------------
// Error Type
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("snapshot version {found} is not supported (expected {expected})")]
    VersionMismatch { found: u16, expected: u16 },

    #[error("transaction aborted")]
    Aborted,
}

pub type StoreResult<T> = Result<T, StoreError>;

// ---------------------------------------------------------------------------
// Keys
// ---------------------------------------------------------------------------

const STATE_KEY: &[u8] = b"vault";
const META_NEXT_EVENT: &[u8] = b"next_event_seq";
const META_SNAPSHOT_VERSION: &[u8] = b"snapshot_version";

// ---------------------------------------------------------------------------
// VaultStore
// ---------------------------------------------------------------------------

/// Durable home of one vault and its event history.
#[derive(Debug, Clone)]
pub struct VaultStore {
    db: Db,
    state: Tree,
    events: Tree,
    metadata: Tree,
}

impl VaultStore {
    /// Opens or creates a store at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let db = sled::open(path)?;
        Self::from_db(db)
    }

    /// A store that lives in a temporary location and is removed on drop.
    pub fn open_temporary() -> StoreResult<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::from_db(db)
    }

    fn from_db(db: Db) -> StoreResult<Self> {
        let state = db.open_tree("state")?;
        let events = db.open_tree("events")?;
        let metadata = db.open_tree("metadata")?;
        Ok(Self {
            db,
            state,
            events,
            metadata,
        })
    }

    /// Loads the last committed snapshot, if any.
    pub fn load<B: DeserializeOwned>(&self) -> StoreResult<Option<Vault<B>>> {
        let Some(bytes) = self.state.get(STATE_KEY)? else {
            return Ok(None);
        };

        let found = match self.metadata.get(META_SNAPSHOT_VERSION)? {
            Some(raw) => u16::from_be_bytes(fixed_bytes(&raw)?),
            None => 0,
        };
        if found != SNAPSHOT_VERSION {
            return Err(StoreError::VersionMismatch {
                found,
                expected: SNAPSHOT_VERSION,
            });
        }

        let vault =
            bincode::deserialize(&bytes).map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(Some(vault))
    }

    /// Writes `vault` and appends `events` atomically. Returns the sequence
    /// number the next event will get.
    pub fn commit<B: Serialize>(&self, vault: &Vault<B>, events: &[VaultEvent]) -> StoreResult<u64> {
        let snapshot =
            bincode::serialize(vault).map_err(|e| StoreError::Serialization(e.to_string()))?;

        let first = self.next_event_seq()?;
        let encoded = events
            .iter()
            .map(|event| bincode::serialize(event).map_err(|e| StoreError::Serialization(e.to_string())))
            .collect::<StoreResult<Vec<_>>>()?;
        let next = first + encoded.len() as u64;

        (&self.state, &self.events, &self.metadata)
            .transaction(|(state, events, metadata)| -> ConflictableTransactionResult<(), ()> {
                state.insert(STATE_KEY, snapshot.as_slice())?;
                for (offset, bytes) in encoded.iter().enumerate() {
                    let seq = first + offset as u64;
                    events.insert(seq.to_be_bytes().to_vec(), bytes.as_slice())?;
                }
                metadata.insert(META_NEXT_EVENT, next.to_be_bytes().to_vec())?;
                metadata.insert(META_SNAPSHOT_VERSION, SNAPSHOT_VERSION.to_be_bytes().to_vec())?;
                Ok(())
            })
            .map_err(|err| match err {
                TransactionError::Abort(()) => StoreError::Aborted,
                TransactionError::Storage(err) => StoreError::Sled(err),
            })?;

        self.db.flush()?;
        Ok(next)
    }

    pub fn flush(&self) -> StoreResult<()> {
        self.db.flush()?;
        Ok(())
    }

    /// Number of events ever committed.
    pub fn event_count(&self) -> StoreResult<u64> {
        self.next_event_seq()
    }

    /// Events with sequence number `>= from`, oldest first, at most `limit`.
    pub fn events_from(&self, from: u64, limit: usize) -> StoreResult<Vec<(u64, VaultEvent)>> {
        let mut out = Vec::new();
        for entry in self.events.range(from.to_be_bytes()..).take(limit) {
            let (key, value) = entry?;
            let seq = u64::from_be_bytes(fixed_bytes(&key)?);
            let event: VaultEvent = bincode::deserialize(&value)
                .map_err(|e| StoreError::Serialization(e.to_string()))?;
            out.push((seq, event));
        }
        Ok(out)
    }

    fn next_event_seq(&self) -> StoreResult<u64> {
        match self.metadata.get(META_NEXT_EVENT)? {
            Some(raw) => Ok(u64::from_be_bytes(fixed_bytes(&raw)?)),
            None => Ok(0),
        }
    }
}

fn fixed_bytes<const N: usize>(raw: &[u8]) -> StoreResult<[u8; N]> {
    raw.try_into()
        .map_err(|_| StoreError::Serialization(format!("expected {N} bytes, found {}", raw.len())))
}
