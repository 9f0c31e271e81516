//! JSON tuning files.
//!
//! A tuning file is an array of entries:
//!
//! ```json
//! [
//!   {
//!     "routine": "Xgemm",
//!     "precision": "single",
//!     "device_type": "gpu",
//!     "vendor": "NVIDIA Corporation",
//!     "device": "Tesla K40m",
//!     "parameters": [["MWG", 128], ["NWG", 128], ["KWG", 16]]
//!   }
//! ]
//! ```
//!
//! `"default"` as vendor or device and `"all"` as device type are wildcards.
//! Loading is all-or-nothing: any malformed entry rejects the whole file.

use super::{DatabaseError, DeviceSelector, TuningDatabase, TuningEntry, TuningParameters};
use crate::device::DeviceType;
use crate::types::Precision;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;
use tracing::info;

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawEntry {
    routine: String,
    precision: Precision,
    device_type: DeviceType,
    vendor: String,
    device: String,
    parameters: Vec<(String, usize)>,
}

impl RawEntry {
    fn into_entry(self, index: usize) -> Result<TuningEntry, DatabaseError> {
        let mut names = BTreeSet::new();
        for (name, _) in &self.parameters {
            if name.is_empty() {
                return Err(DatabaseError::InvalidEntry {
                    index,
                    reason: "empty parameter name".to_string(),
                });
            }
            if !names.insert(name.as_str()) {
                return Err(DatabaseError::InvalidEntry {
                    index,
                    reason: format!("parameter {} listed twice", name),
                });
            }
        }
        Ok(TuningEntry {
            routine: self.routine,
            precision: self.precision,
            selector: DeviceSelector::new(self.device_type, self.vendor, self.device),
            parameters: TuningParameters::from_pairs(self.parameters),
        })
    }

    fn from_entry(entry: &TuningEntry) -> Self {
        Self {
            routine: entry.routine.clone(),
            precision: entry.precision,
            device_type: entry.selector.device_type,
            vendor: entry.selector.vendor.clone(),
            device: entry.selector.device.clone(),
            parameters: entry
                .parameters
                .iter()
                .map(|(name, value)| (name.to_string(), value))
                .collect(),
        }
    }
}

/// Parse tuning entries from JSON without requiring global defaults, for use
/// with [`TuningDatabase::with_overrides`].
pub fn parse_entries(json: &str) -> Result<Vec<TuningEntry>, DatabaseError> {
    let raw: Vec<RawEntry> = serde_json::from_str(json)?;
    raw.into_iter()
        .enumerate()
        .map(|(index, entry)| entry.into_entry(index))
        .collect()
}

fn read_file(path: &Path) -> Result<String, DatabaseError> {
    std::fs::read_to_string(path).map_err(|source| DatabaseError::Io {
        path: path.to_path_buf(),
        source,
    })
}

impl TuningDatabase {
    /// A complete, self-contained database from JSON.
    pub fn from_json_str(json: &str) -> Result<Self, DatabaseError> {
        Self::from_entries(parse_entries(json)?)
    }

    /// A complete, self-contained database from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, DatabaseError> {
        let path = path.as_ref();
        let database = Self::from_json_str(&read_file(path)?)?;
        info!(path = %path.display(), entries = database.len(), "loaded tuning database");
        Ok(database)
    }

    /// This database with the entries of a JSON file layered on top.
    pub fn with_overrides_from_path(&self, path: impl AsRef<Path>) -> Result<Self, DatabaseError> {
        let path = path.as_ref();
        let overrides = parse_entries(&read_file(path)?)?;
        info!(path = %path.display(), entries = overrides.len(), "loaded tuning overrides");
        self.with_overrides(overrides)
    }

    /// Serialize every entry in the tuning file format. Parameters are
    /// written in canonical (name) order, not the order they were loaded in.
    pub fn to_json_string(&self) -> Result<String, DatabaseError> {
        let raw: Vec<RawEntry> = self.entries().map(RawEntry::from_entry).collect();
        Ok(serde_json::to_string_pretty(&raw)?)
    }
}
