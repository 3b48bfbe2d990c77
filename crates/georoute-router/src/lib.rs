//! Georoute Router
//!
//! Selects the best healthy regional endpoint for a client address.
//!
//! The router composes a region registry, a pure scoring engine, a TTL
//! decision cache and a background health monitor behind [`GeoRouter`].
//! Geolocation and network probing are external collaborators plugged in
//! through [`georoute_domain::GeoResolver`] and [`health::HealthProbe`].
//!
//! ```no_run
//! use georoute_router::{config::RouterConfig, GeoRouter};
//! use georoute_domain::RoutingOptions;
//!
//! # fn main() -> Result<(), georoute_router::RouterError> {
//! let router = GeoRouter::with_defaults(RouterConfig::default_test_config())?;
//! let decision = router.route_request("8.8.8.8", &RoutingOptions::default())?;
//! println!("{} via {} ({})", decision.region, decision.endpoint, decision.reason);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod cache;
pub mod config;
pub mod health;
pub mod metrics;
pub mod registry;
pub mod resolver;
pub mod router;
pub mod scoring;

pub use router::GeoRouter;

use georoute_domain::RegionError;
use registry::RegistryError;

/// Router error
#[derive(Debug, thiserror::Error)]
pub enum RouterError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// Region data failed validation
    #[error("Invalid region: {0}")]
    InvalidRegion(#[from] RegionError),

    /// A region with this id is already registered
    #[error("Region already registered: {0}")]
    DuplicateRegion(String),

    /// No region with this id
    #[error("Region not found: {0}")]
    RegionNotFound(String),

    /// Every candidate was filtered out by the health requirement
    #[error("No healthy region available")]
    NoHealthyRegion,

    /// Background work could not be scheduled
    #[error("Runtime error: {0}")]
    Runtime(String),
}

impl From<RegistryError> for RouterError {
    fn from(e: RegistryError) -> Self {
        match e {
            RegistryError::DuplicateRegion(id) => RouterError::DuplicateRegion(id),
            RegistryError::RegionNotFound(id) | RegistryError::StaleRegistration(id) => {
                RouterError::RegionNotFound(id)
            }
            RegistryError::InvalidRegion(e) => RouterError::InvalidRegion(e),
        }
    }
}
