//! Registration stores.
//!
//! [`TomlRegistrationStore`] keeps records in a TOML file:
//!
//! ```toml
//! [[registrations]]
//! id = "NET42"
//! title = "UPB"
//! host = "tcp://192.0.2.5:2101"
//! file_path = "/etc/upb/network.upe"
//! ```
//!
//! Every call re-reads the file so edits made by another process are seen.
//! A process-local mutex makes `create_if_absent` atomic within one process.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing::debug;
use upb_core::RegistrationRecord;

use crate::application::register_device::{RegistrationStore, StoreError};

#[derive(Debug, Default, Serialize, Deserialize)]
struct RegistryFile {
    #[serde(default)]
    registrations: Vec<RegistrationRecord>,
}

/// File-backed registration store.
#[derive(Debug)]
pub struct TomlRegistrationStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl TomlRegistrationStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<RegistryFile, StoreError> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => toml::from_str(&content).map_err(|e| {
                StoreError::Corrupt(format!("{}: {e}", self.path.display()))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(RegistryFile::default()),
            Err(source) => Err(StoreError::Io {
                path: self.path.clone(),
                source,
            }),
        }
    }

    fn write(&self, file: &RegistryFile) -> Result<(), StoreError> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).map_err(|source| StoreError::Io {
                path: dir.to_path_buf(),
                source,
            })?;
        }
        let content = toml::to_string_pretty(file)
            .map_err(|e| StoreError::Corrupt(format!("cannot serialize registrations: {e}")))?;
        std::fs::write(&self.path, content).map_err(|source| StoreError::Io {
            path: self.path.clone(),
            source,
        })
    }
}

impl RegistrationStore for TomlRegistrationStore {
    fn records(&self) -> Result<Vec<RegistrationRecord>, StoreError> {
        let _guard = self.lock.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(self.read()?.registrations)
    }

    fn create_if_absent(&self, record: RegistrationRecord) -> Result<bool, StoreError> {
        let _guard = self.lock.lock().map_err(|_| StoreError::Poisoned)?;
        let mut file = self.read()?;
        if file.registrations.iter().any(|r| r.id == record.id) {
            return Ok(false);
        }
        debug!("writing registration {} to {}", record.id, self.path.display());
        file.registrations.push(record);
        self.write(&file)?;
        Ok(true)
    }
}

/// In-memory registration store.
#[derive(Debug, Default)]
pub struct MemoryRegistrationStore {
    records: Mutex<Vec<RegistrationRecord>>,
}

impl MemoryRegistrationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: Vec<RegistrationRecord>) -> Self {
        Self {
            records: Mutex::new(records),
        }
    }
}

impl RegistrationStore for MemoryRegistrationStore {
    fn records(&self) -> Result<Vec<RegistrationRecord>, StoreError> {
        Ok(self.records.lock().map_err(|_| StoreError::Poisoned)?.clone())
    }

    fn create_if_absent(&self, record: RegistrationRecord) -> Result<bool, StoreError> {
        let mut records = self.records.lock().map_err(|_| StoreError::Poisoned)?;
        if records.iter().any(|r| r.id == record.id) {
            return Ok(false);
        }
        records.push(record);
        Ok(true)
    }
}
