//! Compiled program cache.
//!
//! Programs are keyed by device identity, precision, routine family and the
//! hash of the assembled source (which embeds the tuning parameters). Each key
//! owns a [`OnceCell`]: concurrent callers for the same key wait on a single
//! build, callers for other keys build independently. A failed build leaves
//! the cell empty, so the failure is reported and a later call may try again.

use crate::device::{Device, DeviceIdentity, Program};
use crate::error::{BlasError, Result};
use crate::source::{source_hash, RoutineFamily};
use crate::types::Precision;
use once_cell::sync::OnceCell;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProgramKey {
    pub device: DeviceIdentity,
    pub precision: Precision,
    pub family: RoutineFamily,
    pub source_hash: u64,
}

type Slot = Arc<OnceCell<Arc<dyn Program>>>;

#[derive(Default)]
pub struct ProgramCache {
    slots: Mutex<HashMap<ProgramKey, Slot>>,
    builds: AtomicUsize,
}

impl ProgramCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached program for this key, building it on a miss.
    pub fn get_or_build(
        &self,
        device: &dyn Device,
        precision: Precision,
        family: RoutineFamily,
        source: &str,
        options: &[String],
    ) -> Result<Arc<dyn Program>> {
        let key = ProgramKey {
            device: device.identity().clone(),
            precision,
            family,
            source_hash: source_hash(source),
        };

        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(slots.entry(key.clone()).or_default())
        };

        if let Some(program) = slot.get() {
            debug!(%family, %precision, "program cache hit");
            return Ok(Arc::clone(program));
        }

        let program = slot.get_or_try_init(|| {
            info!(%family, %precision, device = %key.device, "building program");
            self.builds.fetch_add(1, Ordering::Relaxed);
            device.build_program(source, options).map_err(|err| {
                warn!(%family, %precision, error = %err, "program build failed");
                BlasError::InvalidKernel(err.to_string())
            })
        })?;
        Ok(Arc::clone(program))
    }

    /// Number of builds attempted so far (including failed ones).
    pub fn builds(&self) -> usize {
        self.builds.load(Ordering::Relaxed)
    }

    /// Number of successfully built programs held.
    pub fn len(&self) -> usize {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|slot| slot.get().is_some())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl std::fmt::Debug for ProgramCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgramCache")
            .field("programs", &self.len())
            .field("builds", &self.builds())
            .finish()
    }
}
