//! Georoute Domain Layer
//!
//! Core model for the geographic request router. This crate has no runtime
//! dependencies and defines the value objects, the distance math, and the
//! trait seams that the router crate builds on.
//!
//! ## Key Concepts
//!
//! - **Region**: a deployed regional endpoint with a fixed location
//! - **GeoLocation**: latitude/longitude/country of a client or region
//! - **RoutingOptions**: caller preferences for a single routing request
//! - **RoutingDecision**: the chosen region, why, and at what distance/latency
//! - **GeoResolver**: the pluggable address-to-location lookup
//!
//! ## Architecture
//!
//! - No external crate dependencies
//! - Pure logic only (no locking, no I/O)
//! - Infrastructure (registry, cache, probing) lives in `georoute-router`

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod distance;
pub mod region;
pub mod routing;
pub mod traits;

// Re-exports for convenience
pub use distance::{haversine_km, EARTH_RADIUS_KM};
pub use region::{GeoLocation, Region, RegionError};
pub use routing::{RoutingDecision, RoutingOptions, RoutingReason};
pub use traits::{GeoResolver, ResolutionError};
