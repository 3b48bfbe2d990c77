//! Configuration file parsing for the Router.
//!
//! Loads cache TTL, health-check cadence, ranking tolerance and the initial
//! region fleet from TOML.

use georoute_domain::{GeoLocation, Region};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Router configuration error
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Failed to parse TOML
    #[error("Failed to parse config TOML: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// Missing required field
    #[error("Missing required configuration field: {0}")]
    MissingField(String),

    /// Field present but out of range
    #[error("Invalid configuration value: {0}")]
    Invalid(String),
}

/// Router configuration loaded from TOML
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RouterConfig {
    /// How long a routing decision stays cached (default: 300)
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_secs: u64,

    /// Seconds between background health probes (default: 30)
    #[serde(default = "default_health_check_interval")]
    pub health_check_interval_secs: u64,

    /// Upper bound on a single probe before it counts as a failure (default: 5)
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_secs: u64,

    /// Ranking tolerances
    #[serde(default)]
    pub scoring: ScoringConfig,

    /// Regions registered at startup
    #[serde(default)]
    pub regions: Vec<RegionConfig>,
}

/// Ranking tolerances
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScoringConfig {
    /// Candidates within this many km of the nearest one count as equally
    /// near and are ordered by latency, weight, id (default: 50)
    #[serde(default = "default_distance_epsilon")]
    pub distance_epsilon_km: f64,
}

/// Region configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegionConfig {
    /// Region identifier (e.g., "us-east")
    pub id: String,

    /// Display name
    pub name: String,

    /// Base URL (e.g., "https://us-east.example.com")
    pub endpoint: String,

    /// Latitude in degrees
    pub latitude: f64,

    /// Longitude in degrees
    pub longitude: f64,

    /// ISO country code
    pub country_code: String,

    /// Capacity weight (default: 1)
    #[serde(default = "default_weight")]
    pub weight: u32,

    /// Initial latency estimate in ms (default: unknown)
    #[serde(default)]
    pub latency_ms: u64,
}

fn default_cache_ttl() -> u64 {
    300
}

fn default_health_check_interval() -> u64 {
    30
}

fn default_probe_timeout() -> u64 {
    5
}

fn default_distance_epsilon() -> f64 {
    50.0
}

fn default_weight() -> u32 {
    1
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            distance_epsilon_km: default_distance_epsilon(),
        }
    }
}

impl ScoringConfig {
    /// Check that the tolerance is usable
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.distance_epsilon_km.is_finite() || self.distance_epsilon_km < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "scoring.distance_epsilon_km must be a finite non-negative number, got {}",
                self.distance_epsilon_km
            )));
        }
        Ok(())
    }
}

impl RegionConfig {
    /// Build a fresh (healthy) region from this entry
    pub fn to_region(&self) -> Region {
        Region::new(
            self.id.clone(),
            self.name.clone(),
            self.endpoint.clone(),
            GeoLocation::new(self.latitude, self.longitude, self.country_code.clone()),
        )
        .with_weight(self.weight)
        .with_latency(self.latency_ms)
    }
}

impl RouterConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse and validate configuration from a TOML string
    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        let config: RouterConfig = toml::from_str(contents)?;

        if config.regions.is_empty() {
            return Err(ConfigError::MissingField("regions".to_string()));
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate everything except the presence of regions
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.health_check_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "health_check_interval_secs must be greater than zero".to_string(),
            ));
        }
        if self.probe_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "probe_timeout_secs must be greater than zero".to_string(),
            ));
        }
        self.scoring.validate()?;

        let mut seen = HashSet::new();
        for region in &self.regions {
            region
                .to_region()
                .validate()
                .map_err(|e| ConfigError::Invalid(e.to_string()))?;
            if !seen.insert(region.id.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate region id: {}",
                    region.id
                )));
            }
        }
        Ok(())
    }

    /// The four reference regions
    pub fn default_regions() -> Vec<RegionConfig> {
        let region = |id: &str, name: &str, lat: f64, lon: f64, cc: &str| RegionConfig {
            id: id.to_string(),
            name: name.to_string(),
            endpoint: format!("https://{}.georoute.example.com", id),
            latitude: lat,
            longitude: lon,
            country_code: cc.to_string(),
            weight: 1,
            latency_ms: 0,
        };

        vec![
            region("us-east", "US East (Virginia)", 39.0438, -77.4874, "US"),
            region("eu-west", "EU West (Ireland)", 53.3498, -6.2603, "IE"),
            region("ap-south", "Asia Pacific (Mumbai)", 19.0760, 72.8777, "IN"),
            region("ru-central", "Russia Central (Moscow)", 55.7558, 37.6173, "RU"),
        ]
    }

    /// Create a default configuration for testing
    pub fn default_test_config() -> Self {
        RouterConfig {
            cache_ttl_secs: default_cache_ttl(),
            health_check_interval_secs: default_health_check_interval(),
            probe_timeout_secs: default_probe_timeout(),
            scoring: ScoringConfig::default(),
            regions: Self::default_regions(),
        }
    }

    /// Decision cache TTL
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    /// Background probe period
    pub fn health_check_interval(&self) -> Duration {
        Duration::from_secs(self.health_check_interval_secs)
    }

    /// Per-probe timeout
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }
}
