//! Configuration management for the Field Health Monitoring Platform
//!
//! Supports hierarchical configuration loading:
//! 1. Default values in code
//! 2. Configuration files (development.toml, production.toml)
//! 3. Environment variable overrides with FHM_ prefix

use config::{ConfigError, Environment, File};
use serde::Deserialize;
use shared::{CropCalendar, QualityCurve, RuleThresholds, VegetationIndexAnalyzer};

/// Main application configuration
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Current environment (development, production)
    pub environment: String,

    /// Server configuration
    pub server: ServerConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// Vegetation index provider configuration
    pub provider: ProviderConfig,

    /// Boundary capture configuration
    pub capture: CaptureConfig,

    /// Analyzer and recommendation tuning
    #[serde(default)]
    pub analysis: AnalysisConfig,

    /// Log output configuration
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Server port
    pub port: u16,

    /// Server host
    pub host: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL; the in-memory repository is used when unset
    pub url: Option<String>,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Minimum number of connections in the pool
    pub min_connections: u32,
}

/// Which vegetation index provider backs analyses
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Http,
    Static,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ProviderConfig {
    pub kind: ProviderKind,

    /// Satellite index API endpoint
    pub endpoint: Option<String>,

    /// Satellite index API key
    pub api_key: Option<String>,

    /// Upper bound on a single provider call
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CaptureConfig {
    /// Jitter filter for continuous (walk-the-boundary) capture
    pub min_displacement_meters: f64,

    /// Sessions untouched this long are dropped
    pub idle_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AnalysisConfig {
    #[serde(default)]
    pub quality_curve: QualityCurve,

    /// Replaces the built-in Kharif/Rabi calendar when present
    #[serde(default)]
    pub crop_calendar: Option<CropCalendar>,

    #[serde(default)]
    pub rules: RuleThresholds,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct LogConfig {
    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
}

impl Config {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let environment = std::env::var("FHM_ENVIRONMENT").unwrap_or_else(|_| "development".into());

        let config = config::Config::builder()
            // Start with default values
            .set_default("environment", environment.clone())?
            .set_default("server.port", 3000)?
            .set_default("server.host", "0.0.0.0")?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 2)?
            .set_default("provider.kind", "static")?
            .set_default("provider.timeout_secs", 30)?
            .set_default("capture.min_displacement_meters", 5.0)?
            .set_default("capture.idle_timeout_secs", 3600)?
            .set_default("log.json", false)?
            // Load environment-specific config file
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // Override with environment variables (FHM_ prefix)
            .add_source(
                Environment::with_prefix("FHM")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Config = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the services cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        shared::validate_min_displacement(self.capture.min_displacement_meters)
            .map_err(|e| ConfigError::Message(e.to_string()))?;
        self.analysis
            .quality_curve
            .validate()
            .map_err(|e| ConfigError::Message(e.to_string()))?;
        if self.capture.idle_timeout_secs == 0 {
            return Err(ConfigError::Message(
                "capture.idle_timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.provider.timeout_secs == 0 {
            return Err(ConfigError::Message(
                "provider.timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.provider.kind == ProviderKind::Http && self.provider.endpoint.is_none() {
            return Err(ConfigError::Message(
                "provider.endpoint is required when provider.kind is http".to_string(),
            ));
        }
        Ok(())
    }
}

impl AnalysisConfig {
    /// Analyzer built from the configured calendar and quality curve
    pub fn analyzer(&self) -> Result<VegetationIndexAnalyzer, ConfigError> {
        let calendar = match &self.crop_calendar {
            Some(custom) => CropCalendar::new(custom.windows.clone())
                .map_err(|e| ConfigError::Message(e.to_string()))?,
            None => CropCalendar::default(),
        };
        Ok(VegetationIndexAnalyzer::new(calendar, self.quality_curve))
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            host: "0.0.0.0".to_string(),
        }
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            kind: ProviderKind::Static,
            endpoint: None,
            api_key: None,
            timeout_secs: 30,
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            min_displacement_meters: shared::DEFAULT_MIN_DISPLACEMENT_METERS,
            idle_timeout_secs: 3600,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            server: ServerConfig::default(),
            database: DatabaseConfig {
                url: None,
                max_connections: 10,
                min_connections: 2,
            },
            provider: ProviderConfig::default(),
            capture: CaptureConfig::default(),
            analysis: AnalysisConfig::default(),
            log: LogConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_http_provider_requires_endpoint() {
        let mut config = Config::default();
        config.provider.kind = ProviderKind::Http;
        assert!(config.validate().is_err());
        config.provider.endpoint = Some("https://indices.example.com/v1/analyze".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_falls_back_to_built_in_defaults() {
        std::env::set_var("FHM_ENVIRONMENT", "no-such-environment");
        let config = Config::load().unwrap();
        assert_eq!(config.environment, "no-such-environment");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.provider.kind, ProviderKind::Static);
        assert_eq!(config.analysis.rules, RuleThresholds::default());
        assert!(config.analysis.crop_calendar.is_none());
        assert!(config.analysis.analyzer().is_ok());
        assert!(!config.log.json);
        assert_eq!(config.capture.idle_timeout_secs, 3600);
    }

    #[test]
    fn test_rejects_negative_displacement() {
        let mut config = Config::default();
        config.capture.min_displacement_meters = -1.0;
        assert!(config.validate().is_err());
    }
}
