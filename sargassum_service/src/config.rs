/// Service configuration.
///
/// Settings come from an optional TOML file (`sargassum.toml` by default)
/// and the environment. `DATABASE_URL` is read from the environment after
/// loading `.env`, never from the TOML file, so credentials stay out of the
/// repository. Everything is validated once at startup; components receive
/// the parts they need by reference.

use crate::beaches::BeachRegistry;
use crate::logging::LogLevel;
use crate::model::{ConfigError, MAX_DAY_OFFSET};
use crate::staleness::DEFAULT_MAX_RUN_AGE_HOURS;
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_PATH: &str = "./sargassum.toml";

// ---------------------------------------------------------------------------
// File layout
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: String,
    pub file: Option<String>,
    pub timestamps: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
            timestamps: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineSettings {
    /// Forecast days scored per run.
    pub day_offsets: Vec<u8>,
    /// Warn when the scored run is older than this.
    pub max_run_age_hours: u64,
    /// External drift simulation command run by `compute --simulate`,
    /// program first, then its arguments.
    pub simulate_command: Option<Vec<String>>,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            day_offsets: (0..=MAX_DAY_OFFSET).collect(),
            max_run_age_hours: DEFAULT_MAX_RUN_AGE_HOURS,
            simulate_command: None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct RegistrySettings {
    /// Beach registry file replacing the built-in catalogue.
    pub beaches_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct FileConfig {
    pub logging: LoggingSettings,
    pub pipeline: PipelineSettings,
    pub registry: RegistrySettings,
}

// ---------------------------------------------------------------------------
// Validated configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub database_url: String,
    pub log_level: LogLevel,
    pub log_file: Option<String>,
    pub console_timestamps: bool,
    pub day_offsets: Vec<u8>,
    pub max_run_age_hours: u64,
    pub simulate_command: Option<Vec<String>>,
    pub beaches_file: Option<PathBuf>,
}

impl FileConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse(format!("service config: {}", e)))
    }

    /// Reads `path`. A missing file at the default location yields defaults;
    /// a missing file the operator asked for explicitly is an error.
    pub fn load(path: &Path, explicit: bool) -> Result<Self, ConfigError> {
        if !explicit && !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_toml_str(&content)
    }

    /// Validates the file settings and combines them with the database URL.
    pub fn into_service_config(self, database_url: Option<String>) -> Result<ServiceConfig, ConfigError> {
        let database_url = database_url
            .filter(|url| !url.trim().is_empty())
            .ok_or(ConfigError::MissingSetting("DATABASE_URL"))?;

        let log_level = self
            .logging
            .level
            .parse::<LogLevel>()
            .map_err(|reason| ConfigError::InvalidSetting { key: "logging.level", reason })?;

        let mut day_offsets = self.pipeline.day_offsets;
        if day_offsets.is_empty() {
            return Err(ConfigError::InvalidSetting {
                key: "pipeline.day_offsets",
                reason: "at least one forecast day is required".to_string(),
            });
        }
        if let Some(day) = day_offsets.iter().find(|d| **d > MAX_DAY_OFFSET) {
            return Err(ConfigError::InvalidSetting {
                key: "pipeline.day_offsets",
                reason: format!("j+{} is beyond the j+{} horizon", day, MAX_DAY_OFFSET),
            });
        }
        day_offsets.sort_unstable();
        day_offsets.dedup();

        if let Some(cmd) = &self.pipeline.simulate_command {
            if cmd.is_empty() {
                return Err(ConfigError::InvalidSetting {
                    key: "pipeline.simulate_command",
                    reason: "command is empty".to_string(),
                });
            }
        }

        Ok(ServiceConfig {
            database_url,
            log_level,
            log_file: self.logging.file,
            console_timestamps: self.logging.timestamps,
            day_offsets,
            max_run_age_hours: self.pipeline.max_run_age_hours,
            simulate_command: self.pipeline.simulate_command,
            beaches_file: self.registry.beaches_file,
        })
    }
}

impl ServiceConfig {
    /// Loads `.env`, the TOML file, and `DATABASE_URL`.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        let file = match path {
            Some(p) => FileConfig::load(p, true)?,
            None => FileConfig::load(Path::new(DEFAULT_CONFIG_PATH), false)?,
        };
        file.into_service_config(std::env::var("DATABASE_URL").ok())
    }

    /// Beach registry from `beaches_file`, or the built-in catalogue.
    pub fn beach_registry(&self) -> Result<BeachRegistry, ConfigError> {
        match &self.beaches_file {
            Some(path) => BeachRegistry::load(path),
            None => BeachRegistry::builtin(),
        }
    }
}
