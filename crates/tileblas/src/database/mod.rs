//! Device-specific tuning parameters.
//!
//! Every kernel table (`Copy`, `Pad`, `Transpose`, `PadTranspose`, `Xgemm`,
//! `Trsm`) holds one parameter set per precision and device selector. A
//! lookup never fails: it falls back through a fixed chain until it reaches
//! the table's global default.
//!
//! ```text
//! resolve("Xgemm", Single, {gpu, "NVIDIA Corporation", "Tesla K40m"})
//!
//!   1. vendor = "NVIDIA Corporation", device = "Tesla K40m"   (Device)
//!   2. vendor = "NVIDIA Corporation", device = "default"      (VendorDefault)
//!   3. vendor = "default",            device = "default"      (GlobalDefault)
//! ```
//!
//! At every level the selector's device type must equal the device's type or
//! be [`DeviceType::All`]; an exact type wins over `All`. Names are compared
//! for exact equality only.
//!
//! The built-in tables are loaded once per process ([`TuningDatabase::builtin`]).
//! Additional entries can be layered on top from a JSON file, see
//! [`TuningDatabase::with_overrides`] and the [`loader`] module.

mod loader;
mod parameters;
mod tables;

pub use loader::parse_entries;
pub use parameters::TuningParameters;

use crate::device::{DeviceIdentity, DeviceType};
use crate::types::Precision;
use once_cell::sync::Lazy;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// Wildcard vendor or device name in a selector.
pub const DEFAULT_NAME: &str = "default";

pub const COPY: &str = "Copy";
pub const PAD: &str = "Pad";
pub const TRANSPOSE: &str = "Transpose";
pub const PAD_TRANSPOSE: &str = "PadTranspose";
pub const XGEMM: &str = "Xgemm";
pub const TRSM: &str = "Trsm";

/// Errors raised while loading or validating tuning entries.
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Failed to read tuning file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed tuning data: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid tuning entry {index}: {reason}")]
    InvalidEntry { index: usize, reason: String },

    #[error("Tuning entry {index} repeats the selector of entry {previous}")]
    Duplicate { index: usize, previous: usize },

    #[error("Routine {routine} ({precision}) has no global default entry")]
    MissingDefault { routine: String, precision: Precision },
}

/// Which devices an entry applies to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeviceSelector {
    pub device_type: DeviceType,
    pub vendor: String,
    pub device: String,
}

impl DeviceSelector {
    pub fn new(device_type: DeviceType, vendor: impl Into<String>, device: impl Into<String>) -> Self {
        Self {
            device_type,
            vendor: vendor.into(),
            device: device.into(),
        }
    }

    /// Matches every device of a vendor.
    pub fn vendor_default(device_type: DeviceType, vendor: impl Into<String>) -> Self {
        Self::new(device_type, vendor, DEFAULT_NAME)
    }

    /// Matches every device.
    pub fn global_default() -> Self {
        Self::new(DeviceType::All, DEFAULT_NAME, DEFAULT_NAME)
    }

    pub fn is_global_default(&self) -> bool {
        self.device_type == DeviceType::All
            && self.vendor == DEFAULT_NAME
            && self.device == DEFAULT_NAME
    }

    fn matches_type(&self, device_type: DeviceType) -> bool {
        self.device_type == device_type || self.device_type == DeviceType::All
    }
}

/// One row of a tuning table.
#[derive(Debug, Clone, PartialEq)]
pub struct TuningEntry {
    pub routine: String,
    pub precision: Precision,
    pub selector: DeviceSelector,
    pub parameters: TuningParameters,
}

/// Level of the fallback chain an entry was found at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatchLevel {
    Device,
    VendorDefault,
    GlobalDefault,
}

/// A resolved entry together with how it was found.
#[derive(Debug, Clone, Copy)]
pub struct Resolution<'a> {
    pub parameters: &'a TuningParameters,
    pub level: MatchLevel,
}

static BUILTIN: Lazy<Arc<TuningDatabase>> = Lazy::new(|| {
    let database = TuningDatabase::from_entries(tables::builtin_entries())
        .expect("built-in tuning tables are well formed");
    Arc::new(database)
});

/// Read-only table of tuning entries, indexed by routine and precision.
#[derive(Debug, Clone, Default)]
pub struct TuningDatabase {
    tables: BTreeMap<String, BTreeMap<Precision, Vec<TuningEntry>>>,
}

impl TuningDatabase {
    /// The tables shipped with the library, shared for the process lifetime.
    pub fn builtin() -> Arc<TuningDatabase> {
        Arc::clone(&BUILTIN)
    }

    /// Build a database from entries, rejecting the whole set if any entry is
    /// invalid, two entries share a selector, or a routine/precision pair
    /// lacks a global default.
    pub fn from_entries(entries: Vec<TuningEntry>) -> Result<Self, DatabaseError> {
        let mut tables: BTreeMap<String, BTreeMap<Precision, Vec<TuningEntry>>> = BTreeMap::new();
        let mut seen: BTreeMap<(String, Precision), Vec<(DeviceSelector, usize)>> = BTreeMap::new();

        for (index, entry) in entries.into_iter().enumerate() {
            validate_entry(index, &entry)?;

            let selectors = seen
                .entry((entry.routine.clone(), entry.precision))
                .or_default();
            if let Some((_, previous)) = selectors.iter().find(|(s, _)| *s == entry.selector) {
                return Err(DatabaseError::Duplicate {
                    index,
                    previous: *previous,
                });
            }
            selectors.push((entry.selector.clone(), index));

            tables
                .entry(entry.routine.clone())
                .or_default()
                .entry(entry.precision)
                .or_default()
                .push(entry);
        }

        for (routine, by_precision) in &tables {
            for (precision, entries) in by_precision {
                if !entries.iter().any(|e| e.selector.is_global_default()) {
                    return Err(DatabaseError::MissingDefault {
                        routine: routine.clone(),
                        precision: *precision,
                    });
                }
            }
        }

        Ok(Self { tables })
    }

    /// A new database with `overrides` layered on top: an override replaces
    /// the entry with the same routine, precision and selector, other
    /// overrides are added.
    pub fn with_overrides(&self, overrides: Vec<TuningEntry>) -> Result<Self, DatabaseError> {
        let mut entries: Vec<TuningEntry> = self.entries().cloned().collect();
        for entry in overrides {
            let existing = entries.iter_mut().find(|e| {
                e.routine == entry.routine
                    && e.precision == entry.precision
                    && e.selector == entry.selector
            });
            match existing {
                Some(slot) => *slot = entry,
                None => entries.push(entry),
            }
        }
        Self::from_entries(entries)
    }

    /// All entries, grouped by routine and precision.
    pub fn entries(&self) -> impl Iterator<Item = &TuningEntry> {
        self.tables
            .values()
            .flat_map(|by_precision| by_precision.values())
            .flatten()
    }

    pub fn len(&self) -> usize {
        self.entries().count()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn contains_routine(&self, routine: &str) -> bool {
        self.tables.contains_key(routine)
    }

    /// Look up the entry for a routine, precision and device, reporting the
    /// fallback level it was found at. `None` only when the routine/precision
    /// pair has no entries at all.
    pub fn resolve_explained(
        &self,
        routine: &str,
        precision: Precision,
        device: &DeviceIdentity,
    ) -> Option<Resolution<'_>> {
        let entries = self.tables.get(routine)?.get(&precision)?;

        let find = |vendor: &str, name: &str| {
            entries
                .iter()
                .filter(|e| {
                    e.selector.vendor == vendor
                        && e.selector.device == name
                        && e.selector.matches_type(device.device_type)
                })
                // exact device type before the `All` wildcard
                .min_by_key(|e| e.selector.device_type == DeviceType::All)
        };

        let (entry, level) = if let Some(entry) = find(&device.vendor, &device.name) {
            (entry, MatchLevel::Device)
        } else if let Some(entry) = find(&device.vendor, DEFAULT_NAME) {
            (entry, MatchLevel::VendorDefault)
        } else {
            (find(DEFAULT_NAME, DEFAULT_NAME)?, MatchLevel::GlobalDefault)
        };

        Some(Resolution {
            parameters: &entry.parameters,
            level,
        })
    }

    /// Parameters for a routine, precision and device. Unknown routines
    /// resolve to an empty set.
    pub fn resolve(
        &self,
        routine: &str,
        precision: Precision,
        device: &DeviceIdentity,
    ) -> TuningParameters {
        match self.resolve_explained(routine, precision, device) {
            Some(resolution) => {
                debug!(
                    routine,
                    %precision,
                    device = %device,
                    level = ?resolution.level,
                    "resolved tuning parameters"
                );
                resolution.parameters.clone()
            }
            None => {
                warn!(routine, %precision, "no tuning entries for routine");
                TuningParameters::new()
            }
        }
    }

    /// Resolve several tables and merge them into one parameter set.
    pub fn resolve_merged(
        &self,
        routines: &[&str],
        precision: Precision,
        device: &DeviceIdentity,
    ) -> TuningParameters {
        let mut merged = TuningParameters::new();
        for routine in routines {
            merged.extend(&self.resolve(routine, precision, device));
        }
        merged
    }
}

fn validate_entry(index: usize, entry: &TuningEntry) -> Result<(), DatabaseError> {
    let invalid = |reason: &str| DatabaseError::InvalidEntry {
        index,
        reason: reason.to_string(),
    };
    if entry.routine.trim().is_empty() {
        return Err(invalid("empty routine name"));
    }
    if entry.selector.vendor.is_empty() {
        return Err(invalid("empty vendor string"));
    }
    if entry.selector.device.is_empty() {
        return Err(invalid("empty device name"));
    }
    if entry.parameters.is_empty() {
        return Err(invalid("no parameters"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(selector: DeviceSelector, mwg: usize) -> TuningEntry {
        TuningEntry {
            routine: XGEMM.to_string(),
            precision: Precision::Single,
            selector,
            parameters: TuningParameters::from_pairs([("MWG", mwg)]),
        }
    }

    fn sample() -> TuningDatabase {
        TuningDatabase::from_entries(vec![
            entry(DeviceSelector::new(DeviceType::Gpu, "NVIDIA Corporation", "Tesla K40m"), 128),
            entry(DeviceSelector::vendor_default(DeviceType::All, "NVIDIA Corporation"), 64),
            entry(DeviceSelector::global_default(), 32),
        ])
        .unwrap()
    }

    fn nvidia(name: &str) -> DeviceIdentity {
        DeviceIdentity::new(DeviceType::Gpu, "NVIDIA Corporation", name)
    }

    #[test]
    fn test_resolve_exact_device() {
        let db = sample();
        let resolution = db
            .resolve_explained(XGEMM, Precision::Single, &nvidia("Tesla K40m"))
            .unwrap();
        assert_eq!(resolution.level, MatchLevel::Device);
        assert_eq!(resolution.parameters.get("MWG"), Some(128));
    }

    #[test]
    fn test_resolve_vendor_default() {
        let db = sample();
        let resolution = db
            .resolve_explained(XGEMM, Precision::Single, &nvidia("GeForce GTX 1080"))
            .unwrap();
        assert_eq!(resolution.level, MatchLevel::VendorDefault);
        assert_eq!(resolution.parameters.get("MWG"), Some(64));
    }

    #[test]
    fn test_resolve_global_default_for_unknown_vendor() {
        let db = sample();
        let device = DeviceIdentity::new(DeviceType::Gpu, "Some Vendor", "Some Device");
        let resolution = db
            .resolve_explained(XGEMM, Precision::Single, &device)
            .unwrap();
        assert_eq!(resolution.level, MatchLevel::GlobalDefault);
        assert_eq!(resolution.parameters.get("MWG"), Some(32));
    }

    #[test]
    fn test_no_prefix_matching() {
        let db = sample();
        // "Tesla K40" is a prefix of the tabulated "Tesla K40m"
        let resolution = db
            .resolve_explained(XGEMM, Precision::Single, &nvidia("Tesla K40"))
            .unwrap();
        assert_eq!(resolution.level, MatchLevel::VendorDefault);
    }

    #[test]
    fn test_device_type_must_match() {
        let db = sample();
        // same vendor and name, but the exact entry is GPU-only
        let cpu = DeviceIdentity::new(DeviceType::Cpu, "NVIDIA Corporation", "Tesla K40m");
        let resolution = db.resolve_explained(XGEMM, Precision::Single, &cpu).unwrap();
        assert_eq!(resolution.level, MatchLevel::VendorDefault);
    }

    #[test]
    fn test_exact_type_preferred_over_wildcard() {
        let db = TuningDatabase::from_entries(vec![
            entry(DeviceSelector::new(DeviceType::All, "V", "D"), 16),
            entry(DeviceSelector::new(DeviceType::Gpu, "V", "D"), 48),
            entry(DeviceSelector::global_default(), 32),
        ])
        .unwrap();
        let device = DeviceIdentity::new(DeviceType::Gpu, "V", "D");
        assert_eq!(db.resolve(XGEMM, Precision::Single, &device).get("MWG"), Some(48));
        let cpu = DeviceIdentity::new(DeviceType::Cpu, "V", "D");
        assert_eq!(db.resolve(XGEMM, Precision::Single, &cpu).get("MWG"), Some(16));
    }

    #[test]
    fn test_resolution_is_deterministic() {
        let db = sample();
        let device = nvidia("Tesla K40m");
        let first = db.resolve(XGEMM, Precision::Single, &device);
        for _ in 0..10 {
            assert_eq!(db.resolve(XGEMM, Precision::Single, &device), first);
        }
    }

    #[test]
    fn test_unknown_routine_resolves_empty() {
        let db = sample();
        assert!(db.resolve("Xaxpy", Precision::Single, &nvidia("Tesla K40m")).is_empty());
        assert!(db.resolve(XGEMM, Precision::Double, &nvidia("Tesla K40m")).is_empty());
    }

    #[test]
    fn test_missing_default_rejected() {
        let err = TuningDatabase::from_entries(vec![entry(
            DeviceSelector::new(DeviceType::Gpu, "V", "D"),
            16,
        )])
        .unwrap_err();
        assert!(matches!(err, DatabaseError::MissingDefault { .. }));
    }

    #[test]
    fn test_duplicate_selector_rejected() {
        let err = TuningDatabase::from_entries(vec![
            entry(DeviceSelector::global_default(), 16),
            entry(DeviceSelector::global_default(), 32),
        ])
        .unwrap_err();
        assert!(matches!(
            err,
            DatabaseError::Duplicate {
                index: 1,
                previous: 0
            }
        ));
    }

    #[test]
    fn test_empty_strings_rejected() {
        let mut bad = entry(DeviceSelector::global_default(), 16);
        bad.routine = String::new();
        let err = TuningDatabase::from_entries(vec![bad]).unwrap_err();
        assert!(matches!(err, DatabaseError::InvalidEntry { index: 0, .. }));
    }

    #[test]
    fn test_overrides_replace_and_extend() {
        let db = sample();
        let layered = db
            .with_overrides(vec![
                entry(DeviceSelector::global_default(), 8),
                entry(DeviceSelector::new(DeviceType::Gpu, "Intel", "Iris"), 96),
            ])
            .unwrap();
        assert_eq!(layered.len(), 4);
        let unknown = DeviceIdentity::new(DeviceType::Gpu, "Other", "Other");
        assert_eq!(layered.resolve(XGEMM, Precision::Single, &unknown).get("MWG"), Some(8));
        let iris = DeviceIdentity::new(DeviceType::Gpu, "Intel", "Iris");
        assert_eq!(layered.resolve(XGEMM, Precision::Single, &iris).get("MWG"), Some(96));
        // the original is unchanged
        assert_eq!(db.resolve(XGEMM, Precision::Single, &unknown).get("MWG"), Some(32));
    }

    #[test]
    fn test_resolve_merged_combines_tables() {
        let db = TuningDatabase::builtin();
        let device = DeviceIdentity::new(DeviceType::Gpu, "Unknown", "Unknown");
        let merged = db.resolve_merged(&[COPY, XGEMM], Precision::Double, &device);
        assert!(merged.get("COPY_DIMX").is_some());
        assert!(merged.get("MWG").is_some());
    }
}
