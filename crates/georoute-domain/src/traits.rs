//! Trait definitions for external interactions
//!
//! Geolocation is an external collaborator. The router depends only on
//! this seam, not on any particular geo-IP database.

use crate::GeoLocation;
use std::fmt;

/// Geolocation lookup failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolutionError {
    /// Address could not be parsed
    Malformed(String),

    /// Address parsed but has no public location (loopback, private, ...)
    Unroutable(String),

    /// Backing lookup service failed
    Unavailable(String),
}

impl fmt::Display for ResolutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolutionError::Malformed(addr) => write!(f, "malformed address: {}", addr),
            ResolutionError::Unroutable(addr) => write!(f, "address has no location: {}", addr),
            ResolutionError::Unavailable(msg) => write!(f, "geolocation unavailable: {}", msg),
        }
    }
}

impl std::error::Error for ResolutionError {}

/// Maps a client network address to an approximate location
///
/// Implemented by the infrastructure layer (georoute-router ships a
/// reference prefix table; production deployments plug in a geo-IP database)
pub trait GeoResolver: Send + Sync {
    /// Resolve an address to a location
    fn resolve(&self, address: &str) -> Result<GeoLocation, ResolutionError>;
}
