//! Engine configuration.

use std::path::PathBuf;

/// Path of a JSON tuning file layered over the built-in tables.
pub const TUNING_FILE_ENV: &str = "TILEBLAS_TUNING_FILE";

/// Set to `0`, `false` or `off` to always stage operands through temporaries.
pub const SKIP_COPY_ENV: &str = "TILEBLAS_SKIP_COPY";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Use caller buffers directly when they already have the kernel layout.
    pub skip_copy: bool,
    pub tuning_file: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            skip_copy: true,
            tuning_file: None,
        }
    }
}

impl EngineConfig {
    /// Defaults overridden by `TILEBLAS_TUNING_FILE` and `TILEBLAS_SKIP_COPY`.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(path) = lookup(TUNING_FILE_ENV).filter(|p| !p.trim().is_empty()) {
            config.tuning_file = Some(PathBuf::from(path));
        }
        if let Some(value) = lookup(SKIP_COPY_ENV) {
            config.skip_copy = !matches!(
                value.trim().to_ascii_lowercase().as_str(),
                "0" | "false" | "off" | "no"
            );
        }
        config
    }

    pub fn with_skip_copy(mut self, skip_copy: bool) -> Self {
        self.skip_copy = skip_copy;
        self
    }

    pub fn with_tuning_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.tuning_file = Some(path.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = EngineConfig::from_lookup(lookup(&[]));
        assert_eq!(config, EngineConfig::default());
        assert!(config.skip_copy);
    }

    #[test]
    fn test_env_overrides() {
        let config = EngineConfig::from_lookup(lookup(&[
            (TUNING_FILE_ENV, "/etc/tileblas/tuning.json"),
            (SKIP_COPY_ENV, "Off"),
        ]));
        assert!(!config.skip_copy);
        assert_eq!(
            config.tuning_file,
            Some(PathBuf::from("/etc/tileblas/tuning.json"))
        );
    }

    #[test]
    fn test_blank_tuning_file_ignored() {
        let config = EngineConfig::from_lookup(lookup(&[(TUNING_FILE_ENV, "  "), (SKIP_COPY_ENV, "1")]));
        assert_eq!(config.tuning_file, None);
        assert!(config.skip_copy);
    }
}
