//! The routine engine: a device plus the shared tuning database and program
//! cache every routine call draws on.

use crate::cache::ProgramCache;
use crate::config::EngineConfig;
use crate::database::{DatabaseError, TuningDatabase, TuningParameters};
use crate::device::Device;
use crate::error::Result;
use crate::routines::Routine;
use crate::source::RoutineFamily;
use crate::types::Precision;
use std::sync::Arc;
use tracing::info;

/// Entry point for the level-3 routines on one device.
///
/// Engines are cheap to clone: the device, database and cache are shared.
/// Two engines built with [`Engine::with_cache`] over the same cache reuse
/// each other's compiled programs.
#[derive(Clone)]
pub struct Engine {
    device: Arc<dyn Device>,
    database: Arc<TuningDatabase>,
    cache: Arc<ProgramCache>,
    config: EngineConfig,
}

impl Engine {
    /// Engine with the built-in tuning tables, a fresh cache and default
    /// configuration.
    pub fn new(device: Arc<dyn Device>) -> Self {
        Self {
            device,
            database: TuningDatabase::builtin(),
            cache: Arc::new(ProgramCache::new()),
            config: EngineConfig::default(),
        }
    }

    /// Engine configured from `config`, layering its tuning file (if any)
    /// over the built-in tables.
    pub fn from_config(
        device: Arc<dyn Device>,
        config: EngineConfig,
    ) -> std::result::Result<Self, DatabaseError> {
        let database = match &config.tuning_file {
            Some(path) => {
                info!(path = %path.display(), "loading tuning overrides");
                Arc::new(TuningDatabase::builtin().with_overrides_from_path(path)?)
            }
            None => TuningDatabase::builtin(),
        };
        Ok(Self {
            device,
            database,
            cache: Arc::new(ProgramCache::new()),
            config,
        })
    }

    pub fn with_database(mut self, database: Arc<TuningDatabase>) -> Self {
        self.database = database;
        self
    }

    pub fn with_cache(mut self, cache: Arc<ProgramCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn device(&self) -> &dyn Device {
        self.device.as_ref()
    }

    pub fn database(&self) -> &Arc<TuningDatabase> {
        &self.database
    }

    pub fn cache(&self) -> &Arc<ProgramCache> {
        &self.cache
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Merged tuning parameters a family's program is compiled with on this
    /// engine's device.
    pub fn parameters(&self, family: RoutineFamily, precision: Precision) -> TuningParameters {
        self.database
            .resolve_merged(family.tuning_tables(), precision, self.device.identity())
    }

    /// Resolve parameters and fetch (or build) the family's program.
    pub fn routine(&self, family: RoutineFamily, precision: Precision) -> Result<Routine<'_>> {
        Routine::prepare(self, family, precision)
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("device", self.device.identity())
            .field("entries", &self.database.len())
            .field("cache", &self.cache)
            .field("config", &self.config)
            .finish()
    }
}
