use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use fd_lock::RwLock;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use super::{CredentialStore, DeviceRecord, StoreError};

const FORMAT_VERSION: u32 = 1;

type Records = BTreeMap<String, DeviceRecord>;

#[derive(Serialize, Deserialize)]
struct StoreDocument {
    version: u32,
    devices: Vec<DeviceRecord>,
}

/// Store persisted as a JSON document
///
/// The file is the only copy of the records: every operation reads it afresh,
/// so several readers and the CLI can share one path. Mutations hold an
/// exclusive lock on `<path>.lock` across read, change and write, and replace
/// the document by writing `<path>.tmp` and renaming it over the previous one.
/// Readers never observe a half-written document and a failed write leaves
/// the store unchanged.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    lock_path: PathBuf,
    writer: Mutex<()>,
}

impl JsonFileStore {
    /// Open the store at `path`, starting empty if the file does not exist
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let records = read_records(&path)?;
        debug!(path = %path.display(), records = records.len(), "Opened credential store");

        Ok(Self {
            lock_path: sibling(&path, "lock"),
            path,
            writer: Mutex::new(()),
        })
    }

    /// Location of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run `change` on the current records under the exclusive lock
    ///
    /// `change` returns whether it modified the records; only then is the
    /// document rewritten.
    fn update<R>(
        &self,
        change: impl FnOnce(&mut Records) -> Result<(R, bool), StoreError>,
    ) -> Result<R, StoreError> {
        let _local = self.writer.lock();
        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.lock_path)?;
        let mut lock = RwLock::new(lock_file);
        let _held = lock.write()?;

        let mut records = read_records(&self.path)?;
        let (result, changed) = change(&mut records)?;
        if changed {
            self.persist(&records)?;
        }
        Ok(result)
    }

    fn persist(&self, records: &Records) -> Result<(), StoreError> {
        let document = StoreDocument {
            version: FORMAT_VERSION,
            devices: records.values().cloned().collect(),
        };
        let bytes = serde_json::to_vec_pretty(&document)?;

        let tmp = sibling(&self.path, "tmp");
        let mut file = File::create(&tmp)?;
        file.write_all(&bytes)?;
        file.sync_all()?;
        fs::rename(&tmp, &self.path)?;

        trace!(path = %self.path.display(), records = records.len(), "Persisted credential store");
        Ok(())
    }
}

/// `<path>.<suffix>`
fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".");
    name.push(suffix);
    PathBuf::from(name)
}

/// Current records on disk; a missing file is an empty store
fn read_records(path: &Path) -> Result<Records, StoreError> {
    match fs::read(path) {
        Ok(bytes) => {
            let document: StoreDocument = serde_json::from_slice(&bytes)?;
            Ok(document
                .devices
                .into_iter()
                .map(|r| (r.user_id.clone(), r))
                .collect())
        }
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(Records::new()),
        Err(e) => Err(e.into()),
    }
}

impl CredentialStore for JsonFileStore {
    fn create(&self, record: &DeviceRecord) -> Result<(), StoreError> {
        self.update(|records| {
            if records.contains_key(&record.user_id) {
                return Err(StoreError::DuplicateKey(record.user_id.clone()));
            }
            records.insert(record.user_id.clone(), record.clone());
            Ok(((), true))
        })
    }

    fn delete(&self, user_id: &str) -> Result<bool, StoreError> {
        self.update(|records| {
            let removed = records.remove(user_id).is_some();
            Ok((removed, removed))
        })
    }

    fn get_record(&self, user_id: &str) -> Result<DeviceRecord, StoreError> {
        read_records(&self.path)?
            .remove(user_id)
            .ok_or_else(|| StoreError::NotFound(user_id.to_string()))
    }

    fn list(&self) -> Result<Vec<DeviceRecord>, StoreError> {
        Ok(read_records(&self.path)?.into_values().collect())
    }
}
