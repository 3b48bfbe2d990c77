//! The `GeoRouter` orchestrator.
//!
//! `route_request` flow: cache lookup, geolocation (failure tolerated),
//! registry snapshot, scoring with the health filter, optional unhealthy
//! fallback, cache write. Administrative calls mutate the registry directly
//! and invalidate the cache where a cached decision could go stale.

use crate::cache::{CacheKey, DecisionCache};
use crate::config::RouterConfig;
use crate::health::{HealthMonitor, HealthProbe, ProbeOutcome, StaticProbe};
use crate::metrics::{MetricsSnapshot, RouterMetrics};
use crate::registry::RegionRegistry;
use crate::resolver::PrefixGeoResolver;
use crate::scoring::ScoringEngine;
use crate::RouterError;
use georoute_domain::{GeoResolver, Region, RoutingDecision, RoutingOptions, RoutingReason};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Geographic request router
pub struct GeoRouter {
    config: RouterConfig,
    registry: Arc<RegionRegistry>,
    cache: Arc<DecisionCache>,
    resolver: Arc<dyn GeoResolver>,
    scoring: ScoringEngine,
    monitor: HealthMonitor,
    metrics: RouterMetrics,
}

impl GeoRouter {
    /// Build a router from configuration and the two external collaborators
    ///
    /// Regions listed in the configuration are registered immediately and
    /// start out healthy. Background probing starts with [`GeoRouter::start`].
    pub fn new(
        config: RouterConfig,
        resolver: Arc<dyn GeoResolver>,
        probe: Arc<dyn HealthProbe>,
    ) -> Result<Self, RouterError> {
        config.validate()?;

        let registry = Arc::new(RegionRegistry::new());
        for region in &config.regions {
            registry.add(region.to_region())?;
        }

        let cache = Arc::new(DecisionCache::new(config.cache_ttl()));
        let monitor = HealthMonitor::new(
            Arc::clone(&registry),
            Arc::clone(&cache),
            probe,
            config.health_check_interval(),
            config.probe_timeout(),
        );

        info!(
            "Router initialized with {} regions (cache TTL: {:?})",
            registry.len(),
            config.cache_ttl()
        );

        Ok(Self {
            scoring: ScoringEngine::new(config.scoring.clone()),
            config,
            registry,
            cache,
            resolver,
            monitor,
            metrics: RouterMetrics::new(),
        })
    }

    /// Router with the reference prefix resolver and an always-healthy probe
    pub fn with_defaults(config: RouterConfig) -> Result<Self, RouterError> {
        Self::new(
            config,
            Arc::new(PrefixGeoResolver::new()),
            Arc::new(StaticProbe::new()),
        )
    }

    /// Start background health probing
    pub fn start(&self) -> Result<(), RouterError> {
        self.monitor.start()
    }

    /// Stop background health probing
    ///
    /// Routing and administrative calls keep working on the last known state.
    pub fn stop(&self) {
        self.monitor.stop();
        info!("Router stopped: {}", self.metrics.snapshot().summary());
    }

    /// Select a region for a client address
    ///
    /// # Errors
    /// [`RouterError::NoHealthyRegion`] when nothing passes the health
    /// filter and the caller did not allow an unhealthy fallback (or the
    /// registry is empty). Geolocation failures are never surfaced.
    pub fn route_request(
        &self,
        address: &str,
        options: &RoutingOptions,
    ) -> Result<RoutingDecision, RouterError> {
        self.metrics.record_request();

        let options = options.normalized();
        let key = CacheKey::new(address, &options);

        if let Some(decision) = self.cache.get(&key) {
            self.metrics.record_cache_hit();
            debug!(address, region = %decision.region, "Cache hit");
            return Ok(decision.with_reason(RoutingReason::Cached));
        }

        let location = match self.resolver.resolve(address) {
            Ok(location) => Some(location),
            Err(e) => {
                self.metrics.record_resolution_failure();
                debug!(address, error = %e, "Geolocation failed, ranking without location");
                None
            }
        };

        // Read before the snapshot so a concurrent invalidation rejects our write
        let generation = self.cache.generation();
        let snapshot = self.registry.list();

        let decision = match self
            .scoring
            .select(location.as_ref(), &snapshot, &options, true)
        {
            Some(decision) => decision,
            None if !options.requires_healthy() => {
                let decision = self
                    .scoring
                    .select(location.as_ref(), &snapshot, &options, false)
                    .ok_or_else(|| {
                        self.metrics.record_rejection();
                        RouterError::NoHealthyRegion
                    })?;
                self.metrics.record_fallback();
                warn!(
                    address,
                    region = %decision.region,
                    "No healthy region, falling back to unhealthy region"
                );
                decision.with_reason(RoutingReason::Fallback)
            }
            None => {
                self.metrics.record_rejection();
                warn!(address, "No healthy region available");
                return Err(RouterError::NoHealthyRegion);
            }
        };

        if !self
            .cache
            .put_if_generation(generation, key, decision.clone(), self.cache.ttl())
        {
            debug!(address, "Registry changed during routing, decision not cached");
        }

        debug!(
            address,
            region = %decision.region,
            reason = %decision.reason,
            distance_km = decision.distance_km,
            "Routed request"
        );
        Ok(decision)
    }

    /// Snapshot of every region, including health, latency and last check
    pub fn regions_status(&self) -> Vec<Region> {
        self.registry.list()
    }

    /// Healthy flag of a region
    pub fn is_healthy(&self, region_id: &str) -> Result<bool, RouterError> {
        Ok(self.registry.is_healthy(region_id)?)
    }

    /// Administrative health override
    pub fn set_region_health(&self, region_id: &str, healthy: bool) -> Result<(), RouterError> {
        self.monitor.set_override(region_id, healthy)?;
        Ok(())
    }

    /// Apply a probe result produced outside the router
    pub fn record_probe(&self, region_id: &str, outcome: ProbeOutcome) -> Result<(), RouterError> {
        self.monitor.record(region_id, outcome)?;
        Ok(())
    }

    /// Register a region
    ///
    /// Clears the cache: the new region may be nearer than cached choices.
    pub fn add_region(&self, region: Region) -> Result<(), RouterError> {
        let id = region.id.clone();
        self.registry.add(region)?;
        self.cache.clear();
        info!(region = %id, "Region added");
        Ok(())
    }

    /// Remove a region and every cached decision pointing at it
    pub fn remove_region(&self, region_id: &str) -> Result<(), RouterError> {
        self.registry.remove(region_id)?;
        let dropped = self.cache.invalidate_region(region_id);
        info!(region = region_id, dropped, "Region removed");
        Ok(())
    }

    /// Id of the nearest other healthy region, if any
    pub fn backup_region(&self, region_id: &str) -> Result<Option<String>, RouterError> {
        Ok(self
            .backup_decision(region_id)?
            .map(|decision| decision.region))
    }

    /// Full decision for failing over from `region_id`
    ///
    /// `distance_km` is region-to-region. Never cached.
    pub fn backup_decision(&self, region_id: &str) -> Result<Option<RoutingDecision>, RouterError> {
        let snapshot = self.registry.list();
        let origin = snapshot
            .iter()
            .find(|region| region.id == region_id)
            .ok_or_else(|| RouterError::RegionNotFound(region_id.to_string()))?;

        Ok(self
            .scoring
            .nearest_backup(origin, &snapshot)
            .map(|candidate| RoutingDecision {
                region: candidate.id,
                endpoint: candidate.endpoint,
                distance_km: candidate.distance_km.unwrap_or(0.0),
                latency_ms: candidate.latency_ms,
                reason: RoutingReason::Backup,
            }))
    }

    /// Drop every cached decision
    pub fn clear_cache(&self) {
        self.cache.clear();
        debug!("Decision cache cleared");
    }

    /// Probe every region now
    pub async fn check_health_now(&self) -> usize {
        self.monitor.check_all().await
    }

    /// Whether background probing is active
    pub fn is_monitoring(&self) -> bool {
        self.monitor.is_running()
    }

    /// Number of cached decisions
    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    /// Routing counters
    pub fn stats(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Active configuration
    pub fn config(&self) -> &RouterConfig {
        &self.config
    }
}
