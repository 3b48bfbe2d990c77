//! Reference geolocation by IPv4 first-octet ranges.
//!
//! This is a test table, not geo-IP. Production deployments implement
//! [`GeoResolver`] over a real database and pass it to the router.

use georoute_domain::{GeoLocation, GeoResolver, ResolutionError};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

/// Maps an inclusive range of first octets to a location
#[derive(Debug, Clone, PartialEq)]
pub struct PrefixRule {
    /// First octet, inclusive
    pub first: u8,
    /// Last octet, inclusive
    pub last: u8,
    /// Location reported for matching addresses
    pub location: GeoLocation,
}

impl PrefixRule {
    /// Create a rule
    pub fn new(first: u8, last: u8, location: GeoLocation) -> Self {
        Self {
            first,
            last,
            location,
        }
    }

    fn matches(&self, octet: u8) -> bool {
        (self.first..=self.last).contains(&octet)
    }
}

/// Resolver backed by a first-octet table
#[derive(Debug, Clone)]
pub struct PrefixGeoResolver {
    rules: Vec<PrefixRule>,
}

impl PrefixGeoResolver {
    /// Resolver with the reference table
    ///
    /// | First octet | Location |
    /// |---|---|
    /// | 0–79 | US east coast |
    /// | 80–149 | Western Europe |
    /// | 150–199 | South Asia |
    /// | 200–255 | Central Russia |
    pub fn new() -> Self {
        Self::with_table(vec![
            PrefixRule::new(0, 79, GeoLocation::new(39.0, -77.5, "US")),
            PrefixRule::new(80, 149, GeoLocation::new(51.51, -0.13, "GB")),
            PrefixRule::new(150, 199, GeoLocation::new(12.97, 77.59, "IN")),
            PrefixRule::new(200, 255, GeoLocation::new(55.75, 37.62, "RU")),
        ])
    }

    /// Resolver with a custom table; the first matching rule wins
    pub fn with_table(rules: Vec<PrefixRule>) -> Self {
        Self { rules }
    }

    fn lookup(&self, ip: Ipv4Addr, address: &str) -> Result<GeoLocation, ResolutionError> {
        if ip.is_loopback()
            || ip.is_private()
            || ip.is_unspecified()
            || ip.is_link_local()
            || ip.is_broadcast()
        {
            return Err(ResolutionError::Unroutable(address.to_string()));
        }

        let octet = ip.octets()[0];
        self.rules
            .iter()
            .find(|rule| rule.matches(octet))
            .map(|rule| rule.location.clone())
            .ok_or_else(|| ResolutionError::Unroutable(address.to_string()))
    }
}

impl Default for PrefixGeoResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl GeoResolver for PrefixGeoResolver {
    fn resolve(&self, address: &str) -> Result<GeoLocation, ResolutionError> {
        let trimmed = address.trim();
        let ip = trimmed
            .parse::<IpAddr>()
            .or_else(|_| trimmed.parse::<SocketAddr>().map(|sock| sock.ip()))
            .map_err(|_| ResolutionError::Malformed(address.to_string()))?;

        match ip {
            IpAddr::V4(v4) => self.lookup(v4, address),
            IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
                Some(v4) => self.lookup(v4, address),
                None => Err(ResolutionError::Unroutable(address.to_string())),
            },
        }
    }
}
