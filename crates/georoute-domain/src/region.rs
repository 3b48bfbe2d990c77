//! Region module - deployable regional endpoints

use std::fmt;

/// Approximate geographic location of a client or region
#[derive(Debug, Clone, PartialEq)]
pub struct GeoLocation {
    /// Latitude in degrees [-90, 90]
    pub latitude: f64,
    /// Longitude in degrees [-180, 180]
    pub longitude: f64,
    /// ISO 3166-1 alpha-2 country code (e.g. "US")
    pub country_code: String,
}

impl GeoLocation {
    /// Create a new location
    pub fn new(latitude: f64, longitude: f64, country_code: impl Into<String>) -> Self {
        Self {
            latitude,
            longitude,
            country_code: country_code.into(),
        }
    }

    /// Check that both coordinates are finite and in range
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

/// Validation failure for region data
#[derive(Debug, Clone, PartialEq)]
pub enum RegionError {
    /// Region id is empty
    EmptyId,

    /// Endpoint URL is empty
    EmptyEndpoint(String),

    /// Latitude/longitude out of range or not finite
    InvalidCoordinates {
        /// Region id
        id: String,
        /// Offending latitude
        latitude: f64,
        /// Offending longitude
        longitude: f64,
    },

    /// Weight must be strictly positive
    ZeroWeight(String),
}

impl fmt::Display for RegionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegionError::EmptyId => write!(f, "region id cannot be empty"),
            RegionError::EmptyEndpoint(id) => write!(f, "region {} has an empty endpoint", id),
            RegionError::InvalidCoordinates {
                id,
                latitude,
                longitude,
            } => write!(
                f,
                "region {} has invalid coordinates ({}, {})",
                id, latitude, longitude
            ),
            RegionError::ZeroWeight(id) => write!(f, "region {} must have a positive weight", id),
        }
    }
}

impl std::error::Error for RegionError {}

/// A deployed regional endpoint
///
/// `id` and `location` are fixed at registration. `healthy`, `latency_ms`
/// and `last_check` are owned by the health monitor (or an administrative
/// override) and change over the region's lifetime.
#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    /// Unique stable identifier (e.g. "us-east")
    pub id: String,

    /// Human-readable label
    pub name: String,

    /// Base URL of the regional service
    pub endpoint: String,

    /// Static location of the deployment
    pub location: GeoLocation,

    /// Capacity/preference weight, always > 0
    pub weight: u32,

    /// Whether the region currently accepts traffic
    pub healthy: bool,

    /// Last measured round-trip in milliseconds (0 = unknown)
    pub latency_ms: u64,

    /// When health was last updated (milliseconds since Unix epoch)
    pub last_check: Option<u64>,
}

impl Region {
    /// Create a healthy region with weight 1 and unknown latency
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        endpoint: impl Into<String>,
        location: GeoLocation,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            endpoint: endpoint.into(),
            location,
            weight: 1,
            healthy: true,
            latency_ms: 0,
            last_check: None,
        }
    }

    /// Set the capacity weight
    pub fn with_weight(mut self, weight: u32) -> Self {
        self.weight = weight;
        self
    }

    /// Set an initial latency estimate
    pub fn with_latency(mut self, latency_ms: u64) -> Self {
        self.latency_ms = latency_ms;
        self
    }

    /// Whether a latency measurement is available
    pub fn has_known_latency(&self) -> bool {
        self.latency_ms > 0
    }

    /// Check the registration invariants
    ///
    /// # Errors
    /// Returns the first violated invariant (empty id/endpoint,
    /// out-of-range coordinates, zero weight)
    pub fn validate(&self) -> Result<(), RegionError> {
        if self.id.trim().is_empty() {
            return Err(RegionError::EmptyId);
        }
        if self.endpoint.trim().is_empty() {
            return Err(RegionError::EmptyEndpoint(self.id.clone()));
        }
        if !self.location.is_valid() {
            return Err(RegionError::InvalidCoordinates {
                id: self.id.clone(),
                latitude: self.location.latitude,
                longitude: self.location.longitude,
            });
        }
        if self.weight == 0 {
            return Err(RegionError::ZeroWeight(self.id.clone()));
        }
        Ok(())
    }
}
