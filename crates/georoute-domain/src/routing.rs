//! Routing options and decisions

use std::fmt;

/// Caller preferences for a single routing request
///
/// All fields are optional. `require_healthy` defaults to `true` when unset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct RoutingOptions {
    /// Region id that wins outright when it is an eligible candidate
    pub preferred_region: Option<String>,

    /// Latency ceiling in milliseconds
    pub max_latency_ms: Option<u64>,

    /// Exclude unhealthy regions (default: true)
    pub require_healthy: Option<bool>,
}

impl RoutingOptions {
    /// Prefer the given region
    pub fn prefer(mut self, region_id: impl Into<String>) -> Self {
        self.preferred_region = Some(region_id.into());
        self
    }

    /// Set the latency ceiling
    pub fn max_latency(mut self, latency_ms: u64) -> Self {
        self.max_latency_ms = Some(latency_ms);
        self
    }

    /// Tolerate a fallback to unhealthy regions when nothing healthy remains
    pub fn allow_unhealthy(mut self) -> Self {
        self.require_healthy = Some(false);
        self
    }

    /// Effective health requirement after applying the default
    pub fn requires_healthy(&self) -> bool {
        self.require_healthy.unwrap_or(true)
    }

    /// Copy with defaults applied, so equivalent requests compare equal
    pub fn normalized(&self) -> Self {
        Self {
            preferred_region: self
                .preferred_region
                .as_ref()
                .map(|id| id.trim().to_string())
                .filter(|id| !id.is_empty()),
            max_latency_ms: self.max_latency_ms,
            require_healthy: Some(self.requires_healthy()),
        }
    }
}

/// Why a region was chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RoutingReason {
    /// Ranked with a resolved client location; distance dominated
    GeoNearest,
    /// Ranked without a client location (resolution failed)
    LatencyBased,
    /// The caller's preferred region was eligible
    Preferred,
    /// Served from the decision cache
    Cached,
    /// No healthy region; an unhealthy one was chosen on request
    Fallback,
    /// Alternate for another region (failover planning)
    Backup,
}

impl RoutingReason {
    /// Reason code as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            RoutingReason::GeoNearest => "geo-nearest",
            RoutingReason::LatencyBased => "latency-based",
            RoutingReason::Preferred => "preferred",
            RoutingReason::Cached => "cached",
            RoutingReason::Fallback => "fallback",
            RoutingReason::Backup => "backup",
        }
    }
}

impl fmt::Display for RoutingReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of routing one request
#[derive(Debug, Clone, PartialEq)]
pub struct RoutingDecision {
    /// Chosen region id
    pub region: String,

    /// Endpoint of the chosen region
    pub endpoint: String,

    /// Client-to-region distance in km (0 when the client could not be located)
    pub distance_km: f64,

    /// Region latency in milliseconds (0 = unknown)
    pub latency_ms: u64,

    /// Why this region was chosen
    pub reason: RoutingReason,
}

impl RoutingDecision {
    /// Same decision with a different reason
    pub fn with_reason(mut self, reason: RoutingReason) -> Self {
        self.reason = reason;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_healthy_defaults_to_true() {
        let options = RoutingOptions::default();
        assert!(options.requires_healthy());
        assert!(!RoutingOptions::default().allow_unhealthy().requires_healthy());
    }

    #[test]
    fn test_normalized_applies_defaults() {
        let implicit = RoutingOptions::default().normalized();
        let explicit = RoutingOptions {
            require_healthy: Some(true),
            ..Default::default()
        }
        .normalized();
        assert_eq!(implicit, explicit);
    }

    #[test]
    fn test_normalized_drops_blank_preference() {
        let options = RoutingOptions::default().prefer("  ").normalized();
        assert_eq!(options.preferred_region, None);

        let options = RoutingOptions::default().prefer(" eu-west ").normalized();
        assert_eq!(options.preferred_region.as_deref(), Some("eu-west"));
    }

    #[test]
    fn test_reason_strings() {
        assert_eq!(RoutingReason::GeoNearest.to_string(), "geo-nearest");
        assert_eq!(RoutingReason::Cached.as_str(), "cached");
        assert_eq!(RoutingReason::Fallback.as_str(), "fallback");
    }
}
