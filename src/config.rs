//! Application configuration.
//!
//! Settings come from an optional TOML file, then `HOST` and `PORT` from the
//! environment override the server section.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use crate::demo_data::DemoData;
use crate::domain::ScheduleId;
use crate::engine::SolverConfig;
use crate::error::ConfigError;
use crate::solver::OrchestratorConfig;

/// File read when `MAINTENANCE_CONFIG` is not set.
pub const DEFAULT_CONFIG_FILE: &str = "maintenance-scheduling.toml";

/// Environment variable naming an alternative config file.
pub const CONFIG_PATH_ENV: &str = "MAINTENANCE_CONFIG";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerSettings,
    pub solver: SolverSettings,
    pub orchestrator: OrchestratorSettings,
    pub data: DataSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 7860,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverSettings {
    pub time_limit_secs: Option<u64>,
    pub step_limit: Option<u64>,
    pub unimproved_step_limit: Option<u64>,
    pub late_acceptance_size: usize,
    pub random_seed: Option<u64>,
}

impl Default for SolverSettings {
    fn default() -> Self {
        let defaults = SolverConfig::default_config();
        Self {
            time_limit_secs: defaults.time_limit.map(|d| d.as_secs()),
            step_limit: defaults.step_limit,
            unimproved_step_limit: defaults.unimproved_step_limit,
            late_acceptance_size: defaults.late_acceptance_size,
            random_seed: defaults.random_seed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorSettings {
    pub schedule_id: ScheduleId,
    pub max_consecutive_persistence_failures: u32,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        let defaults = OrchestratorConfig::default();
        Self {
            schedule_id: defaults.schedule_id,
            max_consecutive_persistence_failures: defaults.max_consecutive_persistence_failures,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSettings {
    /// Demo data set seeded into an empty store: `SMALL` or `LARGE`.
    pub demo: String,
    /// JSON snapshot file; the store is memory-only when absent.
    pub snapshot_path: Option<PathBuf>,
}

impl Default for DataSettings {
    fn default() -> Self {
        Self {
            demo: DemoData::Small.as_str().to_string(),
            snapshot_path: None,
        }
    }
}

impl AppConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Loads the config file (if any) and applies environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_FILE));

        let mut config = if path.exists() {
            info!(path = %path.display(), "Loading configuration");
            Self::from_file(&path)?
        } else {
            info!(path = %path.display(), "No configuration file, using defaults");
            Self::default()
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Overrides server settings from `HOST` and `PORT`.
    ///
    /// ```
    /// use maintenance_scheduling::config::AppConfig;
    ///
    /// let mut config = AppConfig::default();
    /// config
    ///     .apply_overrides(|key| (key == "PORT").then(|| "8080".to_string()))
    ///     .unwrap();
    /// assert_eq!(config.server.port, 8080);
    /// assert_eq!(config.server.host, "0.0.0.0");
    /// ```
    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(host) = lookup("HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("PORT") {
            self.server.port = port
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue { key: "PORT", value: port })?;
        }
        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    pub fn solver_config(&self) -> SolverConfig {
        SolverConfig {
            time_limit: self.solver.time_limit_secs.map(Duration::from_secs),
            step_limit: self.solver.step_limit,
            unimproved_step_limit: self.solver.unimproved_step_limit,
            late_acceptance_size: self.solver.late_acceptance_size,
            random_seed: self.solver.random_seed,
        }
    }

    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            schedule_id: self.orchestrator.schedule_id,
            max_consecutive_persistence_failures: self
                .orchestrator
                .max_consecutive_persistence_failures,
        }
    }

    pub fn demo_data(&self) -> Result<DemoData, ConfigError> {
        self.data
            .demo
            .parse()
            .map_err(|_| ConfigError::InvalidValue {
                key: "data.demo",
                value: self.data.demo.clone(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SINGLETON_SCHEDULE_ID;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = AppConfig::from_toml("").unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.bind_address(), "0.0.0.0:7860");
        assert_eq!(config.solver_config(), SolverConfig::default_config());
        assert_eq!(config.orchestrator_config(), OrchestratorConfig::default());
        assert_eq!(config.demo_data().unwrap(), DemoData::Small);
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
[server]
host = "127.0.0.1"
port = 9000

[solver]
time_limit_secs = 5
unimproved_step_limit = 1000
random_seed = 42

[orchestrator]
max_consecutive_persistence_failures = 3

[data]
demo = "LARGE"
snapshot_path = "/tmp/schedule.json"
"#;
        let config = AppConfig::from_toml(toml).unwrap();
        assert_eq!(config.bind_address(), "127.0.0.1:9000");

        let solver = config.solver_config();
        assert_eq!(solver.time_limit, Some(Duration::from_secs(5)));
        assert_eq!(solver.unimproved_step_limit, Some(1000));
        assert_eq!(solver.random_seed, Some(42));
        assert_eq!(solver.late_acceptance_size, 400);

        let orchestrator = config.orchestrator_config();
        assert_eq!(orchestrator.schedule_id, SINGLETON_SCHEDULE_ID);
        assert_eq!(orchestrator.max_consecutive_persistence_failures, 3);

        assert_eq!(config.demo_data().unwrap(), DemoData::Large);
        assert_eq!(config.data.snapshot_path, Some(PathBuf::from("/tmp/schedule.json")));
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(matches!(
            AppConfig::from_toml("[server]\nport = \"high\""),
            Err(ConfigError::Parse(_))
        ));

        let mut config = AppConfig::default();
        let err = config
            .apply_overrides(|key| (key == "PORT").then(|| "seventy".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { key: "PORT", .. }));

        config.data.demo = "HUGE".to_string();
        assert!(config.demo_data().is_err());
    }

    #[test]
    fn test_missing_file_is_an_io_error() {
        let err = AppConfig::from_file("/nonexistent/maintenance-scheduling.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
