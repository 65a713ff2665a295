//! Snapshots of emitted states.
//!
//! A [`SnapshotStateHolder`] records a [`Snapshot`] for every state a machine
//! emits. Snapshots encode to JSON or a compact binary form, so a later
//! process can restore the holder and launch the machine from where the
//! previous one stopped. Where snapshots are stored is up to the caller.

use crate::core::State;
use crate::machine::{InitialState, StateHolder};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

pub mod error;

pub use error::SnapshotError;

/// Version identifier for the snapshot format
pub const SNAPSHOT_VERSION: u32 = 1;

/// One emitted state with the metadata needed to restore it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Snapshot<S> {
    /// Snapshot format version
    pub version: u32,

    /// Unique snapshot identifier
    pub id: Uuid,

    /// When the state was emitted
    pub taken_at: DateTime<Utc>,

    /// Position of the state among everything the holder recorded, from 1
    pub sequence: u64,

    pub state: S,
}

impl<S> Snapshot<S> {
    pub fn new(sequence: u64, state: S) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            id: Uuid::new_v4(),
            taken_at: Utc::now(),
            sequence,
            state,
        }
    }

    fn check_version(self) -> Result<Self, SnapshotError> {
        if self.version == SNAPSHOT_VERSION {
            Ok(self)
        } else {
            Err(SnapshotError::UnsupportedVersion {
                found: self.version,
                supported: SNAPSHOT_VERSION,
            })
        }
    }
}

impl<S: Serialize + DeserializeOwned> Snapshot<S> {
    pub fn to_json(&self) -> Result<String, SnapshotError> {
        serde_json::to_string(self).map_err(|e| SnapshotError::SerializationFailed(e.to_string()))
    }

    pub fn from_json(json: &str) -> Result<Self, SnapshotError> {
        serde_json::from_str::<Self>(json)
            .map_err(|e| SnapshotError::DeserializationFailed(e.to_string()))?
            .check_version()
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, SnapshotError> {
        bincode::serialize(self).map_err(|e| SnapshotError::SerializationFailed(e.to_string()))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SnapshotError> {
        bincode::deserialize::<Self>(bytes)
            .map_err(|e| SnapshotError::DeserializationFailed(e.to_string()))?
            .check_version()
    }
}

/// State holder that snapshots every emitted state.
///
/// Launches resume from the latest snapshot, or from the supplier if there is
/// none yet.
///
/// # Example
///
/// ```rust
/// use flowstate::checkpoint::{Snapshot, SnapshotStateHolder};
/// use flowstate::machine::StateHolder;
///
/// let holder = SnapshotStateHolder::new(|| 0u32);
/// holder.save_state(&3);
///
/// let json = holder.latest_snapshot().unwrap().to_json().unwrap();
/// let restored = SnapshotStateHolder::restore(Snapshot::from_json(&json).unwrap(), || 0u32);
/// assert_eq!(restored.get_state(), 3);
/// ```
pub struct SnapshotStateHolder<S> {
    initial: InitialState<S>,
    latest: Mutex<Option<Snapshot<S>>>,
}

impl<S: State> SnapshotStateHolder<S> {
    pub fn new<F>(initial: F) -> Self
    where
        F: Fn() -> S + Send + Sync + 'static,
    {
        Self {
            initial: Arc::new(initial),
            latest: Mutex::new(None),
        }
    }

    /// Holder that resumes from `snapshot`.
    pub fn restore<F>(snapshot: Snapshot<S>, initial: F) -> Self
    where
        F: Fn() -> S + Send + Sync + 'static,
    {
        let holder = Self::new(initial);
        *holder.latest.lock() = Some(snapshot);
        holder
    }

    pub fn latest_snapshot(&self) -> Option<Snapshot<S>> {
        self.latest.lock().clone()
    }
}

impl<S: State> StateHolder<S> for SnapshotStateHolder<S> {
    fn get_state(&self) -> S {
        match self.latest.lock().as_ref() {
            Some(snapshot) => snapshot.state.clone(),
            None => (self.initial)(),
        }
    }

    fn save_state(&self, state: &S) {
        let mut latest = self.latest.lock();
        let sequence = latest.as_ref().map_or(0, |snapshot| snapshot.sequence) + 1;
        *latest = Some(Snapshot::new(sequence, state.clone()));
    }
}
