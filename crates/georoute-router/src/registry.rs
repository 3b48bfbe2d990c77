//! Region registry for tracking the regional fleet.
//!
//! All reads used for scoring go through [`RegionRegistry::list`], which
//! copies the fleet under a read lock so callers never observe a mutation
//! half-way through. Writers are serialized by the same lock.

use georoute_domain::{Region, RegionError};
use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// Registry error
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Region not found
    #[error("Region not found: {0}")]
    RegionNotFound(String),

    /// Region id already taken
    #[error("Region already registered: {0}")]
    DuplicateRegion(String),

    /// Region failed validation
    #[error("Invalid region: {0}")]
    InvalidRegion(#[from] RegionError),

    /// The region was removed (and possibly re-added) since the epoch was read
    #[error("Stale registration for region: {0}")]
    StaleRegistration(String),
}

/// Health and latency before and after an update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthUpdate {
    /// Flag before the update
    pub previous: bool,
    /// Flag after the update
    pub current: bool,
    /// Latency before the update
    pub previous_latency_ms: u64,
    /// Latency after the update
    pub current_latency_ms: u64,
}

impl HealthUpdate {
    /// Whether the update flipped the flag
    pub fn changed(&self) -> bool {
        self.previous != self.current
    }

    /// Whether the latency estimate moved
    pub fn latency_changed(&self) -> bool {
        self.previous_latency_ms != self.current_latency_ms
    }
}

/// A region together with the epoch of its registration
///
/// Every `add` gets a fresh epoch, so a region removed and re-added under
/// the same id is distinguishable from its predecessor.
#[derive(Debug, Clone, PartialEq)]
pub struct Registration {
    /// Region state at snapshot time
    pub region: Region,
    /// Registration epoch
    pub epoch: u64,
}

#[derive(Debug, Default)]
struct RegistryState {
    slots: BTreeMap<String, Registration>,
    next_epoch: u64,
}

/// Registry of regions keyed by id
pub struct RegionRegistry {
    state: RwLock<RegistryState>,
}

impl RegionRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            state: RwLock::new(RegistryState::default()),
        }
    }

    /// Create a registry from a list of regions
    pub fn from_regions(regions: Vec<Region>) -> Result<Self, RegistryError> {
        let registry = Self::new();
        for region in regions {
            registry.add(region)?;
        }
        Ok(registry)
    }

    fn read(&self) -> RwLockReadGuard<'_, RegistryState> {
        // Every mutation leaves the map consistent, so a poisoned lock is safe to reuse
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, RegistryState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a new region, returning its registration epoch
    pub fn add(&self, region: Region) -> Result<u64, RegistryError> {
        region.validate()?;

        let mut state = self.write();
        if state.slots.contains_key(&region.id) {
            return Err(RegistryError::DuplicateRegion(region.id));
        }
        state.next_epoch += 1;
        let epoch = state.next_epoch;
        state
            .slots
            .insert(region.id.clone(), Registration { region, epoch });
        Ok(epoch)
    }

    /// Remove a region, returning its last state
    pub fn remove(&self, id: &str) -> Result<Region, RegistryError> {
        self.write()
            .slots
            .remove(id)
            .map(|slot| slot.region)
            .ok_or_else(|| RegistryError::RegionNotFound(id.to_string()))
    }

    /// Set the healthy flag (administrative override)
    ///
    /// Idempotent; stamps `last_check` either way.
    pub fn set_health(&self, id: &str, healthy: bool) -> Result<HealthUpdate, RegistryError> {
        self.update(id, None, |region| region.healthy = healthy)
    }

    /// Apply a probe result: healthy flag plus latency when one was measured
    ///
    /// A latency of 0 means "not measured" and keeps the previous estimate.
    pub fn record_probe(
        &self,
        id: &str,
        healthy: bool,
        latency_ms: u64,
    ) -> Result<HealthUpdate, RegistryError> {
        self.update(id, None, probe_result(healthy, latency_ms))
    }

    /// Apply a probe result only if `id` is still the registration at `epoch`
    ///
    /// A probe started before the region was removed and re-added fails with
    /// [`RegistryError::StaleRegistration`] and leaves the new region untouched.
    pub fn record_probe_at(
        &self,
        id: &str,
        epoch: u64,
        healthy: bool,
        latency_ms: u64,
    ) -> Result<HealthUpdate, RegistryError> {
        self.update(id, Some(epoch), probe_result(healthy, latency_ms))
    }

    fn update<F>(&self, id: &str, epoch: Option<u64>, apply: F) -> Result<HealthUpdate, RegistryError>
    where
        F: FnOnce(&mut Region),
    {
        let mut state = self.write();
        let slot = state
            .slots
            .get_mut(id)
            .ok_or_else(|| RegistryError::RegionNotFound(id.to_string()))?;

        if epoch.is_some_and(|epoch| epoch != slot.epoch) {
            return Err(RegistryError::StaleRegistration(id.to_string()));
        }

        let region = &mut slot.region;
        let previous = region.healthy;
        let previous_latency_ms = region.latency_ms;
        apply(region);
        region.last_check = Some(now_millis());

        Ok(HealthUpdate {
            previous,
            current: region.healthy,
            previous_latency_ms,
            current_latency_ms: region.latency_ms,
        })
    }

    /// Get a copy of one region
    pub fn get(&self, id: &str) -> Option<Region> {
        self.read().slots.get(id).map(|slot| slot.region.clone())
    }

    /// Healthy flag of one region
    pub fn is_healthy(&self, id: &str) -> Result<bool, RegistryError> {
        self.read()
            .slots
            .get(id)
            .map(|slot| slot.region.healthy)
            .ok_or_else(|| RegistryError::RegionNotFound(id.to_string()))
    }

    /// Point-in-time copy of every region, ordered by id
    pub fn list(&self) -> Vec<Region> {
        self.read()
            .slots
            .values()
            .map(|slot| slot.region.clone())
            .collect()
    }

    /// Point-in-time copy of every region with its registration epoch
    pub fn registrations(&self) -> Vec<Registration> {
        self.read().slots.values().cloned().collect()
    }

    /// Ids of every region, ordered
    pub fn ids(&self) -> Vec<String> {
        self.read().slots.keys().cloned().collect()
    }

    /// Number of healthy regions
    pub fn healthy_count(&self) -> usize {
        self.read()
            .slots
            .values()
            .filter(|slot| slot.region.healthy)
            .count()
    }

    /// Get region count
    pub fn len(&self) -> usize {
        self.read().slots.len()
    }

    /// Whether no region is registered
    pub fn is_empty(&self) -> bool {
        self.read().slots.is_empty()
    }
}

impl Default for RegionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// A latency of 0 means "not measured" and keeps the previous estimate
fn probe_result(healthy: bool, latency_ms: u64) -> impl FnOnce(&mut Region) {
    move |region: &mut Region| {
        region.healthy = healthy;
        if latency_ms > 0 {
            region.latency_ms = latency_ms;
        }
    }
}

/// Milliseconds since the Unix epoch
pub(crate) fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use georoute_domain::GeoLocation;

    fn region(id: &str) -> Region {
        Region::new(
            id,
            id.to_uppercase(),
            format!("https://{}.example.com", id),
            GeoLocation::new(10.0, 20.0, "ZZ"),
        )
    }

    #[test]
    fn test_new_registry() {
        let registry = RegionRegistry::new();
        assert_eq!(registry.len(), 0);
        assert!(registry.is_empty());
        assert_eq!(registry.healthy_count(), 0);
    }

    #[test]
    fn test_add_region() {
        let registry = RegionRegistry::new();
        registry.add(region("us-east")).unwrap();

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.healthy_count(), 1);

        let regions = registry.list();
        assert_eq!(regions[0].id, "us-east");
        assert_eq!(regions[0].endpoint, "https://us-east.example.com");
        assert!(regions[0].healthy);
    }

    #[test]
    fn test_add_duplicate_id() {
        let registry = RegionRegistry::new();
        registry.add(region("us-east")).unwrap();

        let result = registry.add(region("us-east"));
        assert!(matches!(result, Err(RegistryError::DuplicateRegion(id)) if id == "us-east"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_add_invalid_region() {
        let registry = RegionRegistry::new();
        let result = registry.add(region("bad").with_weight(0));
        assert!(matches!(
            result,
            Err(RegistryError::InvalidRegion(RegionError::ZeroWeight(_)))
        ));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_remove_region() {
        let registry = RegionRegistry::from_regions(vec![region("a"), region("b")]).unwrap();

        let removed = registry.remove("a").unwrap();
        assert_eq!(removed.id, "a");
        assert_eq!(registry.len(), 1);
        assert!(registry.get("a").is_none());

        assert!(matches!(
            registry.remove("a"),
            Err(RegistryError::RegionNotFound(_))
        ));
    }

    #[test]
    fn test_set_health() {
        let registry = RegionRegistry::from_regions(vec![region("a")]).unwrap();

        let update = registry.set_health("a", false).unwrap();
        assert!(update.changed());
        assert!(!update.latency_changed());
        assert!(!registry.is_healthy("a").unwrap());
        assert!(registry.get("a").unwrap().last_check.is_some());

        // Idempotent
        let update = registry.set_health("a", false).unwrap();
        assert!(!update.changed());
        assert!(!registry.is_healthy("a").unwrap());
    }

    #[test]
    fn test_set_health_not_found() {
        let registry = RegionRegistry::new();
        let result = registry.set_health("nonexistent", true);
        assert!(matches!(result, Err(RegistryError::RegionNotFound(_))));
        assert!(registry.is_healthy("nonexistent").is_err());
    }

    #[test]
    fn test_record_probe_keeps_latency_when_unmeasured() {
        let registry =
            RegionRegistry::from_regions(vec![region("a").with_latency(40)]).unwrap();

        registry.record_probe("a", true, 0).unwrap();
        assert_eq!(registry.get("a").unwrap().latency_ms, 40);

        let update = registry.record_probe("a", false, 95).unwrap();
        assert!(update.latency_changed());
        assert_eq!(update.previous_latency_ms, 40);
        let a = registry.get("a").unwrap();
        assert_eq!(a.latency_ms, 95);
        assert!(!a.healthy);
    }

    #[test]
    fn test_readded_region_gets_new_epoch() {
        let registry = RegionRegistry::new();
        let first = registry.add(region("a")).unwrap();
        assert_eq!(registry.registrations()[0].epoch, first);

        registry.remove("a").unwrap();
        let second = registry.add(region("a")).unwrap();
        assert_ne!(first, second);

        let result = registry.record_probe_at("a", first, false, 500);
        assert!(matches!(result, Err(RegistryError::StaleRegistration(id)) if id == "a"));
        let a = registry.get("a").unwrap();
        assert!(a.healthy);
        assert_eq!(a.latency_ms, 0);
        assert!(a.last_check.is_none());

        registry.record_probe_at("a", second, false, 500).unwrap();
        assert!(!registry.is_healthy("a").unwrap());
    }

    #[test]
    fn test_list_is_a_snapshot() {
        let registry = RegionRegistry::from_regions(vec![region("a")]).unwrap();
        let snapshot = registry.list();

        registry.set_health("a", false).unwrap();
        registry.add(region("b")).unwrap();

        assert_eq!(snapshot.len(), 1);
        assert!(snapshot[0].healthy);
        assert_eq!(registry.ids(), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_concurrent_writers() {
        use std::sync::Arc;
        use std::thread;

        let registry = Arc::new(RegionRegistry::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || {
                    registry.add(region(&format!("r{}", i))).unwrap();
                    registry.set_health(&format!("r{}", i), i % 2 == 0).unwrap();
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(registry.len(), 8);
        assert_eq!(registry.healthy_count(), 4);
    }
}
