use std::collections::BTreeMap;

use parking_lot::Mutex;

use super::{CredentialStore, DeviceRecord, StoreError};

/// Volatile store for tests and one-off runs
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<BTreeMap<String, DeviceRecord>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store holding `records`
    pub fn with_records(records: impl IntoIterator<Item = DeviceRecord>) -> Self {
        Self {
            records: Mutex::new(
                records
                    .into_iter()
                    .map(|r| (r.user_id.clone(), r))
                    .collect(),
            ),
        }
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    /// Whether the store is empty
    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

impl CredentialStore for MemoryStore {
    fn create(&self, record: &DeviceRecord) -> Result<(), StoreError> {
        let mut records = self.records.lock();
        if records.contains_key(&record.user_id) {
            return Err(StoreError::DuplicateKey(record.user_id.clone()));
        }
        records.insert(record.user_id.clone(), record.clone());
        Ok(())
    }

    fn delete(&self, user_id: &str) -> Result<bool, StoreError> {
        Ok(self.records.lock().remove(user_id).is_some())
    }

    fn get_record(&self, user_id: &str) -> Result<DeviceRecord, StoreError> {
        self.records
            .lock()
            .get(user_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(user_id.to_string()))
    }

    fn list(&self) -> Result<Vec<DeviceRecord>, StoreError> {
        Ok(self.records.lock().values().cloned().collect())
    }
}
