//! Credential storage
//!
//! The protocol engine only needs create, read and delete of [`DeviceRecord`]s keyed
//! by user id. Implementations use interior mutability so one store can be
//! shared between readers; operations on one user id are serialized.

mod file;
mod memory;

use std::fmt;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

pub use file::JsonFileStore;
pub use memory::MemoryStore;

/// Error type for credential stores
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A record for this user id already exists
    #[error("Record for user {0} already exists")]
    DuplicateKey(String),

    /// No record for this user id
    #[error("No record for user {0}")]
    NotFound(String),

    /// Backing file could not be read or written
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Backing file is not a valid store document
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}

/// A registered token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRecord {
    /// Token holder's id, unique within a store
    pub user_id: String,
    /// Token holder's display name
    pub user_name: String,
    /// Base64 DER public key
    pub public_key: String,
    /// Registration time, seconds since the Unix epoch
    pub registered_at: u64,
}

impl DeviceRecord {
    /// Create a record registered now
    pub fn new(
        user_id: impl Into<String>,
        user_name: impl Into<String>,
        public_key: impl Into<String>,
    ) -> Self {
        let registered_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| d.as_secs());
        Self {
            user_id: user_id.into(),
            user_name: user_name.into(),
            public_key: public_key.into(),
            registered_at,
        }
    }
}

/// Storage of registered tokens
pub trait CredentialStore: Send + Sync + fmt::Debug {
    /// Insert a record, failing with [`StoreError::DuplicateKey`] if the user exists
    fn create(&self, record: &DeviceRecord) -> Result<(), StoreError>;

    /// Remove a record; returns whether one existed
    fn delete(&self, user_id: &str) -> Result<bool, StoreError>;

    /// Fetch a record, failing with [`StoreError::NotFound`]
    fn get_record(&self, user_id: &str) -> Result<DeviceRecord, StoreError>;

    /// All records, ordered by user id
    fn list(&self) -> Result<Vec<DeviceRecord>, StoreError>;

    /// Fetch only the public key of a record
    fn get_public_key(&self, user_id: &str) -> Result<String, StoreError> {
        self.get_record(user_id).map(|record| record.public_key)
    }

    /// Whether a record exists
    fn contains(&self, user_id: &str) -> Result<bool, StoreError> {
        match self.get_record(user_id) {
            Ok(_) => Ok(true),
            Err(StoreError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

impl<S: CredentialStore + ?Sized> CredentialStore for Arc<S> {
    fn create(&self, record: &DeviceRecord) -> Result<(), StoreError> {
        (**self).create(record)
    }

    fn delete(&self, user_id: &str) -> Result<bool, StoreError> {
        (**self).delete(user_id)
    }

    fn get_record(&self, user_id: &str) -> Result<DeviceRecord, StoreError> {
        (**self).get_record(user_id)
    }

    fn list(&self) -> Result<Vec<DeviceRecord>, StoreError> {
        (**self).list()
    }
}
