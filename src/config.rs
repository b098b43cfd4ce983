use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;

use crate::core::{ColumnMap, ExtractorConfig, FuzzyConfig, PipelineConfig, SolverConfig};

/// Application configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub fuzzy: FuzzyConfig,
    #[serde(default)]
    pub solver: SolverConfig,
    #[serde(default)]
    pub columns: ColumnSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub workers: Option<usize>,
    /// Largest accepted JSON body in bytes
    #[serde(default = "default_json_limit")]
    pub json_limit: usize,
    /// Optimise requests still running after this are cancelled
    pub request_timeout_secs: Option<u64>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            workers: None,
            json_limit: default_json_limit(),
            request_timeout_secs: None,
        }
    }
}

fn default_host() -> String { "127.0.0.1".to_string() }
fn default_port() -> u16 { 8080 }
fn default_json_limit() -> usize { 4 * 1024 * 1024 }

/// Survey layout: headers for each logical column and the empty-cell markers
#[derive(Debug, Clone, Deserialize)]
pub struct ColumnSettings {
    #[serde(default = "default_first_name")]
    pub first_name: String,
    #[serde(default = "default_surname")]
    pub surname: String,
    #[serde(default = "default_choices")]
    pub choices: Vec<String>,
    #[serde(default = "default_placeholders")]
    pub placeholders: Vec<String>,
}

impl Default for ColumnSettings {
    fn default() -> Self {
        Self {
            first_name: default_first_name(),
            surname: default_surname(),
            choices: default_choices(),
            placeholders: default_placeholders(),
        }
    }
}

fn default_first_name() -> String { ColumnMap::default().first_name }
fn default_surname() -> String { ColumnMap::default().surname }
fn default_choices() -> Vec<String> { ColumnMap::default().choices }
fn default_placeholders() -> Vec<String> { ExtractorConfig::default().placeholders }

impl From<ColumnSettings> for ExtractorConfig {
    fn from(settings: ColumnSettings) -> Self {
        Self {
            columns: ColumnMap {
                first_name: settings.first_name,
                surname: settings.surname,
                choices: settings.choices,
            },
            placeholders: settings.placeholders,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String { "info".to_string() }
fn default_log_format() -> String { "json".to_string() }

impl Settings {
    /// Load configuration from file and environment variables
    ///
    /// Configuration is loaded in the following order (later overrides earlier):
    /// 1. Default values in the struct
    /// 2. Configuration file (config/default.toml)
    /// 3. Local overrides (config/local.toml)
    /// 4. Environment variables (prefixed with CAMP__)
    pub fn load() -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            // e.g., CAMP__SOLVER__TIME_LIMIT_MS -> solver.time_limit_ms
            .add_source(environment())
            .build()?
            .try_deserialize()
    }

    /// Load configuration from a custom path
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::from(path.as_ref()))
            .add_source(environment())
            .build()?
            .try_deserialize()
    }

    /// Stage settings for the pairing pipeline
    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            extractor: self.columns.clone().into(),
            fuzzy: self.fuzzy.clone(),
            solver: self.solver.clone(),
        }
    }
}

fn environment() -> Environment {
    Environment::with_prefix("CAMP")
        .prefix_separator("__")
        .separator("__")
        .try_parsing(true)
}
