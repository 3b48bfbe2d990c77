//! Candidate filtering and ranking.
//!
//! Everything here is a pure function of a registry snapshot, the client
//! location (if it could be resolved) and the routing options. No locks, no
//! I/O; the orchestrator owns those concerns.
//!
//! Ranking is lexicographic. Distance comes first: the nearest remaining
//! candidate anchors a group holding every candidate within
//! `distance_epsilon_km` of it. Inside a group the order is lowest latency,
//! then highest weight, then id. The next group is anchored on the nearest
//! candidate left over, and so on, so the result is fully deterministic.
//!
//! Without a client location every distance is zero, all candidates share
//! one group, and ranking reduces to latency, weight, id.

use crate::config::ScoringConfig;
use georoute_domain::{GeoLocation, Region, RoutingDecision, RoutingOptions, RoutingReason};
use std::cmp::Ordering;
use tracing::debug;

/// One ranked candidate
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredCandidate {
    /// Region id
    pub id: String,
    /// Region endpoint
    pub endpoint: String,
    /// Distance from the client, when the client was located
    pub distance_km: Option<f64>,
    /// Measured latency (0 = unknown)
    pub latency_ms: u64,
    /// Latency used for ranking (unknown replaced by the candidate mean)
    pub effective_latency_ms: f64,
    /// Capacity weight
    pub weight: u32,
}

impl ScoredCandidate {
    fn distance(&self) -> f64 {
        self.distance_km.unwrap_or(0.0)
    }

    fn into_decision(self, reason: RoutingReason) -> RoutingDecision {
        let distance_km = self.distance();
        RoutingDecision {
            region: self.id,
            endpoint: self.endpoint,
            distance_km,
            latency_ms: self.latency_ms,
            reason,
        }
    }
}

/// Ranks regions for a request
#[derive(Debug, Clone)]
pub struct ScoringEngine {
    config: ScoringConfig,
}

impl ScoringEngine {
    /// Create an engine with the given tolerances
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    /// Pick a region for a request
    ///
    /// With `health_filter` set, unhealthy regions are excluded. Returns
    /// `None` when no candidate survives the health filter; the latency
    /// ceiling is relaxed rather than emptying the set.
    pub fn select(
        &self,
        client: Option<&GeoLocation>,
        snapshot: &[Region],
        options: &RoutingOptions,
        health_filter: bool,
    ) -> Option<RoutingDecision> {
        let mut candidates: Vec<&Region> = snapshot
            .iter()
            .filter(|region| !health_filter || region.healthy)
            .collect();

        if candidates.is_empty() {
            return None;
        }

        if let Some(max_latency) = options.max_latency_ms {
            let within: Vec<&Region> = candidates
                .iter()
                .copied()
                .filter(|region| !exceeds_latency(region, max_latency))
                .collect();

            if within.is_empty() {
                debug!(
                    max_latency_ms = max_latency,
                    "No candidate within latency ceiling, relaxing"
                );
            } else {
                candidates = within;
            }
        }

        let ranked = self.rank(client, &candidates);

        if let Some(preferred) = options.preferred_region.as_deref() {
            if let Some(candidate) = ranked.iter().find(|c| c.id == preferred) {
                return Some(candidate.clone().into_decision(RoutingReason::Preferred));
            }
            debug!(preferred, "Preferred region is not an eligible candidate");
        }

        let reason = if client.is_some() {
            RoutingReason::GeoNearest
        } else {
            RoutingReason::LatencyBased
        };

        ranked
            .into_iter()
            .next()
            .map(|winner| winner.into_decision(reason))
    }

    /// Order candidates, best first
    pub fn rank(&self, client: Option<&GeoLocation>, candidates: &[&Region]) -> Vec<ScoredCandidate> {
        if candidates.is_empty() {
            return Vec::new();
        }

        let known: Vec<f64> = candidates
            .iter()
            .filter(|region| region.has_known_latency())
            .map(|region| region.latency_ms as f64)
            .collect();
        let mean_latency = if known.is_empty() {
            0.0
        } else {
            known.iter().sum::<f64>() / known.len() as f64
        };

        let mut remaining: Vec<ScoredCandidate> = candidates
            .iter()
            .map(|region| ScoredCandidate {
                id: region.id.clone(),
                endpoint: region.endpoint.clone(),
                distance_km: client.map(|c| c.distance_to(&region.location)),
                latency_ms: region.latency_ms,
                effective_latency_ms: if region.has_known_latency() {
                    region.latency_ms as f64
                } else {
                    mean_latency
                },
                weight: region.weight,
            })
            .collect();

        remaining.sort_by(|a, b| {
            a.distance()
                .total_cmp(&b.distance())
                .then_with(|| a.id.cmp(&b.id))
        });

        // Groups are measured from their nearest member, never chained
        let epsilon = self.config.distance_epsilon_km;
        let mut ranked = Vec::with_capacity(remaining.len());
        while let Some(anchor) = remaining.first().map(ScoredCandidate::distance) {
            let split = remaining
                .iter()
                .position(|c| c.distance() - anchor > epsilon)
                .unwrap_or(remaining.len());
            let mut group: Vec<ScoredCandidate> = remaining.drain(..split).collect();
            group.sort_by(tie_break);
            ranked.extend(group);
        }
        ranked
    }

    /// Nearest other healthy region to `origin`, by region-to-region distance
    ///
    /// Ties are broken by highest weight, then id.
    pub fn nearest_backup(&self, origin: &Region, snapshot: &[Region]) -> Option<ScoredCandidate> {
        snapshot
            .iter()
            .filter(|region| region.healthy && region.id != origin.id)
            .map(|region| {
                let distance = origin.location.distance_to(&region.location);
                ScoredCandidate {
                    id: region.id.clone(),
                    endpoint: region.endpoint.clone(),
                    distance_km: Some(distance),
                    latency_ms: region.latency_ms,
                    effective_latency_ms: region.latency_ms as f64,
                    weight: region.weight,
                }
            })
            .min_by(|a, b| {
                a.distance()
                    .total_cmp(&b.distance())
                    .then_with(|| b.weight.cmp(&a.weight))
                    .then_with(|| a.id.cmp(&b.id))
            })
    }
}

impl Default for ScoringEngine {
    fn default() -> Self {
        Self::new(ScoringConfig::default())
    }
}

/// Unknown latency never exceeds a ceiling
fn exceeds_latency(region: &Region, max_latency_ms: u64) -> bool {
    region.has_known_latency() && region.latency_ms > max_latency_ms
}

/// Order inside one distance group
fn tie_break(a: &ScoredCandidate, b: &ScoredCandidate) -> Ordering {
    a.effective_latency_ms
        .total_cmp(&b.effective_latency_ms)
        .then_with(|| b.weight.cmp(&a.weight))
        .then_with(|| a.id.cmp(&b.id))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region(id: &str, lat: f64, lon: f64) -> Region {
        Region::new(
            id,
            id,
            format!("https://{}.example.com", id),
            GeoLocation::new(lat, lon, "ZZ"),
        )
    }

    fn fleet() -> Vec<Region> {
        vec![
            region("us-east", 39.04, -77.49),
            region("eu-west", 53.35, -6.26),
            region("ap-south", 19.08, 72.88),
            region("ru-central", 55.76, 37.62),
        ]
    }

    fn client(lat: f64, lon: f64) -> GeoLocation {
        GeoLocation::new(lat, lon, "ZZ")
    }

    #[test]
    fn test_geo_nearest_wins() {
        let engine = ScoringEngine::default();
        let paris = client(48.86, 2.35);

        let decision = engine
            .select(Some(&paris), &fleet(), &RoutingOptions::default(), true)
            .unwrap();

        assert_eq!(decision.region, "eu-west");
        assert_eq!(decision.reason, RoutingReason::GeoNearest);
        assert!(decision.distance_km > 0.0);
    }

    #[test]
    fn test_unhealthy_excluded() {
        let engine = ScoringEngine::default();
        let mut regions = fleet();
        regions[1].healthy = false;

        let decision = engine
            .select(Some(&client(48.86, 2.35)), &regions, &RoutingOptions::default(), true)
            .unwrap();
        assert_ne!(decision.region, "eu-west");
    }

    #[test]
    fn test_no_healthy_candidates() {
        let engine = ScoringEngine::default();
        let mut regions = fleet();
        for region in &mut regions {
            region.healthy = false;
        }

        assert!(engine
            .select(None, &regions, &RoutingOptions::default(), true)
            .is_none());
        // Without the health filter a winner is still produced
        assert!(engine
            .select(None, &regions, &RoutingOptions::default(), false)
            .is_some());
    }

    #[test]
    fn test_preferred_region_overrides_distance() {
        let engine = ScoringEngine::default();
        let options = RoutingOptions::default().prefer("ap-south");

        let decision = engine
            .select(Some(&client(48.86, 2.35)), &fleet(), &options, true)
            .unwrap();
        assert_eq!(decision.region, "ap-south");
        assert_eq!(decision.reason, RoutingReason::Preferred);
    }

    #[test]
    fn test_unhealthy_preference_ignored() {
        let engine = ScoringEngine::default();
        let mut regions = fleet();
        regions[2].healthy = false;
        let options = RoutingOptions::default().prefer("ap-south");

        let decision = engine
            .select(Some(&client(48.86, 2.35)), &regions, &options, true)
            .unwrap();
        assert_eq!(decision.region, "eu-west");
        assert_eq!(decision.reason, RoutingReason::GeoNearest);
    }

    #[test]
    fn test_max_latency_filters() {
        let engine = ScoringEngine::default();
        let mut regions = fleet();
        regions[1].latency_ms = 300;
        regions[3].latency_ms = 60;
        let options = RoutingOptions::default().max_latency(100);

        let decision = engine
            .select(Some(&client(48.86, 2.35)), &regions, &options, true)
            .unwrap();
        assert_ne!(decision.region, "eu-west");
        assert!(decision.latency_ms <= 100);
    }

    #[test]
    fn test_max_latency_relaxed_when_nothing_fits() {
        let engine = ScoringEngine::default();
        let mut regions = fleet();
        for region in &mut regions {
            region.latency_ms = 500;
        }
        let options = RoutingOptions::default().max_latency(10);

        let decision = engine
            .select(Some(&client(48.86, 2.35)), &regions, &options, true)
            .unwrap();
        assert_eq!(decision.region, "eu-west");
    }

    #[test]
    fn test_latency_based_without_location() {
        let engine = ScoringEngine::default();
        let mut regions = fleet();
        regions[0].latency_ms = 120;
        regions[1].latency_ms = 80;
        regions[2].latency_ms = 40;
        regions[3].latency_ms = 200;

        let decision = engine
            .select(None, &regions, &RoutingOptions::default(), true)
            .unwrap();
        assert_eq!(decision.region, "ap-south");
        assert_eq!(decision.reason, RoutingReason::LatencyBased);
        assert_eq!(decision.distance_km, 0.0);
    }

    #[test]
    fn test_tie_break_by_weight_then_id() {
        let engine = ScoringEngine::default();
        let regions = vec![
            region("b", 0.0, 0.0),
            region("a", 0.0, 0.0),
            region("c", 0.0, 0.0).with_weight(4),
        ];
        let refs: Vec<&Region> = regions.iter().collect();

        let ranked = engine.rank(None, &refs);
        let order: Vec<&str> = ranked.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(order, vec!["c", "a", "b"]);
    }

    #[test]
    fn test_close_distances_broken_by_latency() {
        let engine = ScoringEngine::default();
        // Two co-located regions a few hundred metres apart
        let regions = vec![
            region("near", 50.000, 10.000).with_latency(90),
            region("also-near", 50.001, 10.001).with_latency(30),
            region("far", -33.9, 151.2).with_latency(30),
        ];
        let refs: Vec<&Region> = regions.iter().collect();

        let ranked = engine.rank(Some(&client(50.0, 10.0)), &refs);
        assert_eq!(ranked[0].id, "also-near");
        assert_eq!(ranked[1].id, "near");
        assert_eq!(ranked[2].id, "far");
    }

    #[test]
    fn test_unknown_latency_treated_as_average() {
        let engine = ScoringEngine::default();
        let regions = vec![
            region("fast", 0.0, 0.0).with_latency(20),
            region("unknown", 0.0, 0.0),
            region("slow", 0.0, 0.0).with_latency(100),
        ];
        let refs: Vec<&Region> = regions.iter().collect();

        let ranked = engine.rank(None, &refs);
        let unknown = ranked.iter().find(|c| c.id == "unknown").unwrap();
        assert_eq!(unknown.effective_latency_ms, 60.0);
        assert_eq!(unknown.latency_ms, 0);
        let order: Vec<&str> = ranked.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(order, vec!["fast", "unknown", "slow"]);
    }

    #[test]
    fn test_distance_dominates_latency() {
        let engine = ScoringEngine::default();
        let london = client(51.51, -0.13);
        let regions = vec![
            region("us-east", 39.04, -77.49).with_latency(200),
            region("eu-west", 53.35, -6.26).with_latency(300),
            region("ap-south", 19.08, 72.88).with_latency(200),
            region("ru-central", 55.76, 37.62).with_latency(10),
        ];

        let decision = engine
            .select(Some(&london), &regions, &RoutingOptions::default(), true)
            .unwrap();
        assert_eq!(decision.region, "eu-west");
        assert_eq!(decision.reason, RoutingReason::GeoNearest);
        assert_eq!(decision.latency_ms, 300);
    }

    #[test]
    fn test_near_distances_tie_break_across_round_numbers() {
        let engine = ScoringEngine::new(ScoringConfig {
            distance_epsilon_km: 1.0,
        });
        let origin = client(0.0, 0.0);
        // Roughly 49.9 km and 50.1 km east of the client on the equator
        let regions = vec![
            region("slow", 0.0, 0.4488).with_latency(90),
            region("fast", 0.0, 0.4506).with_latency(30),
            region("beyond", 0.0, 0.5).with_latency(5),
        ];
        let refs: Vec<&Region> = regions.iter().collect();

        let ranked = engine.rank(Some(&origin), &refs);
        let order: Vec<&str> = ranked.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(order, vec!["fast", "slow", "beyond"]);
    }

    #[test]
    fn test_groups_are_anchored_on_nearest() {
        let engine = ScoringEngine::new(ScoringConfig {
            distance_epsilon_km: 10.0,
        });
        let origin = client(0.0, 0.0);
        // 0 km, ~8.9 km and ~17.8 km: the last one is within epsilon of the
        // middle one but not of the anchor
        let regions = vec![
            region("a", 0.0, 0.0).with_latency(50),
            region("b", 0.0, 0.08).with_latency(40),
            region("c", 0.0, 0.16).with_latency(10),
        ];
        let refs: Vec<&Region> = regions.iter().collect();

        let ranked = engine.rank(Some(&origin), &refs);
        let order: Vec<&str> = ranked.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(order, vec!["b", "a", "c"]);
    }

    #[test]
    fn test_ranking_is_deterministic() {
        let engine = ScoringEngine::default();
        let regions = fleet();
        let refs: Vec<&Region> = regions.iter().collect();
        let mut reversed = refs.clone();
        reversed.reverse();

        let location = client(0.0, 0.0);
        let a = engine.rank(Some(&location), &refs);
        let b = engine.rank(Some(&location), &reversed);
        assert_eq!(a, b);
    }

    #[test]
    fn test_nearest_backup() {
        let engine = ScoringEngine::default();
        let regions = fleet();

        let backup = engine.nearest_backup(&regions[1], &regions).unwrap();
        assert_eq!(backup.id, "ru-central");
        assert!(backup.distance_km.unwrap() > 0.0);
    }

    #[test]
    fn test_nearest_backup_skips_unhealthy_and_self() {
        let engine = ScoringEngine::default();
        let mut regions = fleet();
        regions[3].healthy = false;

        let backup = engine.nearest_backup(&regions[1], &regions).unwrap();
        assert_ne!(backup.id, "eu-west");
        assert_ne!(backup.id, "ru-central");

        for region in &mut regions {
            if region.id != "eu-west" {
                region.healthy = false;
            }
        }
        assert!(engine.nearest_backup(&regions[1], &regions).is_none());
    }

    #[test]
    fn test_nearest_backup_tie_break() {
        let engine = ScoringEngine::default();
        let origin = region("origin", 0.0, 0.0);
        let regions = vec![
            origin.clone(),
            region("z", 1.0, 0.0).with_weight(2),
            region("y", -1.0, 0.0).with_weight(2),
            region("x", 0.0, 1.0),
        ];

        let backup = engine.nearest_backup(&origin, &regions).unwrap();
        assert_eq!(backup.id, "y");
    }
}
