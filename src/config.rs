//! Configuration management with layered loading
//!
//! Precedence (lowest to highest):
//! 1. Compiled defaults
//! 2. Global config: `$XDG_CONFIG_HOME/reddot/reddot.toml`
//! 3. Local config: a host-supplied file
//! 4. Environment variables: `REDDOT_*` prefix

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use config::{Config, ConfigError, Environment};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::application::ApplicationError;

/// Order in which the initialization pipeline assigns initial values.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum InitOrder {
    /// Descending parent count, first occurrence of a key wins
    #[default]
    Heuristic,
    /// Children strictly before parents
    Topological,
}

impl FromStr for InitOrder {
    type Err = ApplicationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "heuristic" => Ok(Self::Heuristic),
            "topological" => Ok(Self::Topological),
            other => Err(ApplicationError::Config {
                message: format!("unknown init_order: {}", other),
            }),
        }
    }
}

impl fmt::Display for InitOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Heuristic => write!(f, "heuristic"),
            Self::Topological => write!(f, "topological"),
        }
    }
}

/// Graph behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    /// Reject edges that would close a cycle
    pub cycle_guard: bool,
    /// Value assignment order of the bulk loader
    pub init_order: InitOrder,
    /// Log unknown-key no-ops at warn level (debug otherwise)
    pub warn_unknown_keys: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            cycle_guard: true,
            init_order: InitOrder::default(),
            warn_unknown_keys: true,
        }
    }
}

/// Raw settings for intermediate parsing (`None` → not specified, inherit).
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawSettings {
    pub cycle_guard: Option<bool>,
    pub init_order: Option<InitOrder>,
    pub warn_unknown_keys: Option<bool>,
}

/// Get the XDG config directory for reddot.
pub fn global_config_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", "reddot").map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the path to the global config file.
pub fn global_config_path() -> Option<PathBuf> {
    global_config_dir().map(|dir| dir.join("reddot.toml"))
}

/// Load a TOML file into RawSettings for manual merging.
fn load_raw_settings(path: &Path) -> Result<RawSettings, ApplicationError> {
    let content = std::fs::read_to_string(path).map_err(|e| ApplicationError::Config {
        message: format!("read {}: {}", path.display(), e),
    })?;
    toml::from_str(&content).map_err(|e| ApplicationError::Config {
        message: format!("parse {}: {}", path.display(), e),
    })
}

impl Settings {
    /// Overlay wins wherever it specifies a value.
    fn merge_with(&self, overlay: &RawSettings) -> Self {
        Self {
            cycle_guard: overlay.cycle_guard.unwrap_or(self.cycle_guard),
            init_order: overlay.init_order.unwrap_or(self.init_order),
            warn_unknown_keys: overlay.warn_unknown_keys.unwrap_or(self.warn_unknown_keys),
        }
    }

    /// Load settings with layered precedence.
    ///
    /// # Arguments
    /// * `local` - Optional host config file, skipped if it does not exist
    pub fn load(local: Option<&Path>) -> Result<Self, ApplicationError> {
        let mut current = Self::default();

        if let Some(global_path) = global_config_path() {
            if global_path.exists() {
                current = current.merge_with(&load_raw_settings(&global_path)?);
            }
        }

        if let Some(path) = local {
            if path.exists() {
                current = current.merge_with(&load_raw_settings(path)?);
            }
        }

        Self::apply_env_overrides(current)
    }

    /// Defaults plus one file, nothing else.
    pub fn load_file(path: &Path) -> Result<Self, ApplicationError> {
        Ok(Self::default().merge_with(&load_raw_settings(path)?))
    }

    /// Apply REDDOT_* environment variables as explicit overrides.
    pub fn apply_env_overrides(mut settings: Self) -> Result<Self, ApplicationError> {
        let config = Config::builder()
            .add_source(Environment::with_prefix("REDDOT"))
            .build()
            .map_err(config_err)?;

        if let Ok(val) = config.get_bool("cycle_guard") {
            settings.cycle_guard = val;
        }
        if let Ok(val) = config.get_string("init_order") {
            settings.init_order = val.parse()?;
        }
        if let Ok(val) = config.get_bool("warn_unknown_keys") {
            settings.warn_unknown_keys = val;
        }

        Ok(settings)
    }
}

fn config_err(e: ConfigError) -> ApplicationError {
    ApplicationError::Config {
        message: e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn given_defaults_when_created_then_guard_on_and_heuristic_order() {
        let settings = Settings::default();
        assert!(settings.cycle_guard);
        assert!(settings.warn_unknown_keys);
        assert_eq!(settings.init_order, InitOrder::Heuristic);
    }

    #[test]
    fn given_partial_overlay_when_merged_then_unspecified_fields_inherit() {
        let overlay = RawSettings {
            init_order: Some(InitOrder::Topological),
            ..RawSettings::default()
        };
        let merged = Settings::default().merge_with(&overlay);
        assert_eq!(merged.init_order, InitOrder::Topological);
        assert!(merged.cycle_guard);
    }

    #[test]
    fn given_order_names_when_parsed_then_case_is_ignored() {
        assert_eq!("Topological".parse::<InitOrder>().unwrap(), InitOrder::Topological);
        assert_eq!(" heuristic ".parse::<InitOrder>().unwrap(), InitOrder::Heuristic);
        assert!("random".parse::<InitOrder>().is_err());
    }
}
