//! Region health monitoring.
//!
//! The monitor owns the healthy/latency fields of every region. Updates
//! arrive from the periodic probe loop, from on-demand checks, from
//! external probe callbacks ([`HealthMonitor::record`]) and from
//! administrative overrides. Every update is applied to the registry
//! synchronously, so the next routing call observes it.
//!
//! Any healthy/unhealthy transition clears the decision cache. A latency
//! change drops the cached decisions it could have altered (see
//! [`DecisionCache::invalidate_latency`]).

use crate::cache::DecisionCache;
use crate::registry::{HealthUpdate, RegionRegistry, Registration, RegistryError};
use crate::RouterError;
use async_trait::async_trait;
use georoute_domain::Region;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, timeout, Duration, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Result of probing one region
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeOutcome {
    /// Whether the region answered correctly
    pub healthy: bool,
    /// Measured round-trip in ms (0 = not measured)
    pub latency_ms: u64,
}

impl ProbeOutcome {
    /// Healthy with a measured latency
    pub fn healthy(latency_ms: u64) -> Self {
        Self {
            healthy: true,
            latency_ms,
        }
    }

    /// Unhealthy, latency not measured
    pub fn unhealthy() -> Self {
        Self {
            healthy: false,
            latency_ms: 0,
        }
    }
}

/// Probe failure; always recorded as unhealthy
#[derive(Debug, Error)]
pub enum ProbeError {
    /// Probe exceeded its deadline
    #[error("Probe timed out after {0:?}")]
    Timeout(Duration),

    /// Probe could not reach or validate the region
    #[error("Probe failed: {0}")]
    Failed(String),
}

/// Checks one region's health
///
/// The network probe itself is an external collaborator.
#[async_trait]
pub trait HealthProbe: Send + Sync {
    /// Probe a region
    async fn probe(&self, region: &Region) -> Result<ProbeOutcome, ProbeError>;
}

/// Probe with scripted outcomes per region id
///
/// Regions without a scripted outcome report the default outcome.
pub struct StaticProbe {
    outcomes: RwLock<HashMap<String, Result<ProbeOutcome, String>>>,
    default: ProbeOutcome,
}

impl StaticProbe {
    /// Every unscripted region is healthy with unknown latency
    pub fn new() -> Self {
        Self::with_default(ProbeOutcome::healthy(0))
    }

    /// Use `default` for unscripted regions
    pub fn with_default(default: ProbeOutcome) -> Self {
        Self {
            outcomes: RwLock::new(HashMap::new()),
            default,
        }
    }

    /// Script an outcome for a region
    pub fn set(&self, region_id: &str, outcome: ProbeOutcome) {
        self.outcomes
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(region_id.to_string(), Ok(outcome));
    }

    /// Script a probe failure for a region
    pub fn fail(&self, region_id: &str, message: &str) {
        self.outcomes
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(region_id.to_string(), Err(message.to_string()));
    }
}

impl Default for StaticProbe {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HealthProbe for StaticProbe {
    async fn probe(&self, region: &Region) -> Result<ProbeOutcome, ProbeError> {
        let outcomes = self.outcomes.read().unwrap_or_else(PoisonError::into_inner);
        match outcomes.get(&region.id) {
            Some(Ok(outcome)) => Ok(*outcome),
            Some(Err(message)) => Err(ProbeError::Failed(message.clone())),
            None => Ok(self.default),
        }
    }
}

/// One probe pass over the fleet; cloned into the background task
#[derive(Clone)]
struct ProbeCycle {
    registry: Arc<RegionRegistry>,
    cache: Arc<DecisionCache>,
    probe: Arc<dyn HealthProbe>,
    probe_timeout: Duration,
}

impl ProbeCycle {
    fn apply(&self, region_id: &str, outcome: ProbeOutcome) -> Result<HealthUpdate, RegistryError> {
        let update = self
            .registry
            .record_probe(region_id, outcome.healthy, outcome.latency_ms)?;
        self.invalidate(region_id, &update);
        Ok(update)
    }

    fn apply_at(
        &self,
        region_id: &str,
        epoch: u64,
        outcome: ProbeOutcome,
    ) -> Result<HealthUpdate, RegistryError> {
        let update =
            self.registry
                .record_probe_at(region_id, epoch, outcome.healthy, outcome.latency_ms)?;
        self.invalidate(region_id, &update);
        Ok(update)
    }

    fn invalidate(&self, region_id: &str, update: &HealthUpdate) {
        if update.changed() {
            self.cache.clear();
            info!(
                region = region_id,
                healthy = update.current,
                "Region health changed"
            );
        } else if update.latency_changed() {
            let dropped = self.cache.invalidate_latency(region_id);
            debug!(
                region = region_id,
                latency_ms = update.current_latency_ms,
                dropped,
                "Region latency changed"
            );
        }
    }

    async fn run(&self) -> usize {
        let registrations = self.registry.registrations();

        for Registration { region, epoch } in &registrations {
            let outcome = match timeout(self.probe_timeout, self.probe.probe(region)).await {
                Ok(Ok(outcome)) => outcome,
                Ok(Err(e)) => {
                    warn!(region = %region.id, error = %e, "Health probe failed");
                    ProbeOutcome::unhealthy()
                }
                Err(_) => {
                    let e = ProbeError::Timeout(self.probe_timeout);
                    warn!(region = %region.id, error = %e, "Health probe failed");
                    ProbeOutcome::unhealthy()
                }
            };

            // The region may have been removed, or replaced, while its probe was in flight
            if let Err(e) = self.apply_at(&region.id, *epoch, outcome) {
                debug!(region = %region.id, error = %e, "Dropping probe result");
            }
        }

        registrations.len()
    }
}

struct MonitorTask {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// Background health monitor
pub struct HealthMonitor {
    cycle: ProbeCycle,
    interval: Duration,
    task: Mutex<Option<MonitorTask>>,
}

impl HealthMonitor {
    /// Create a monitor; nothing runs until [`HealthMonitor::start`]
    pub fn new(
        registry: Arc<RegionRegistry>,
        cache: Arc<DecisionCache>,
        probe: Arc<dyn HealthProbe>,
        interval: Duration,
        probe_timeout: Duration,
    ) -> Self {
        Self {
            cycle: ProbeCycle {
                registry,
                cache,
                probe,
                probe_timeout,
            },
            interval,
            task: Mutex::new(None),
        }
    }

    /// Apply an externally produced probe result
    pub fn record(&self, region_id: &str, outcome: ProbeOutcome) -> Result<HealthUpdate, RegistryError> {
        self.cycle.apply(region_id, outcome)
    }

    /// Administrative override; holds until the next probe result
    pub fn set_override(&self, region_id: &str, healthy: bool) -> Result<HealthUpdate, RegistryError> {
        let update = self.cycle.registry.set_health(region_id, healthy)?;

        if update.changed() {
            self.cycle.cache.clear();
            info!(region = region_id, healthy, "Region health overridden");
        }
        Ok(update)
    }

    /// Probe every region now; returns how many were probed
    pub async fn check_all(&self) -> usize {
        self.cycle.run().await
    }

    /// Start the periodic probe loop on the current tokio runtime
    ///
    /// Calling `start` on a running monitor is a no-op.
    pub fn start(&self) -> Result<(), RouterError> {
        let mut task = self.task.lock().unwrap_or_else(PoisonError::into_inner);
        if task.as_ref().is_some_and(|t| !t.handle.is_finished()) {
            return Ok(());
        }

        if self.interval.is_zero() {
            return Err(RouterError::Runtime(
                "health check interval must be greater than zero".to_string(),
            ));
        }

        let runtime = Handle::try_current().map_err(|e| RouterError::Runtime(e.to_string()))?;
        let (shutdown, shutdown_rx) = watch::channel(false);
        let handle = runtime.spawn(run_loop(self.cycle.clone(), self.interval, shutdown_rx));

        *task = Some(MonitorTask { shutdown, handle });
        info!("Health monitor started (interval: {:?})", self.interval);
        Ok(())
    }

    /// Stop the probe loop; safe to call repeatedly
    pub fn stop(&self) {
        let task = self
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        if let Some(task) = task {
            // The receiver may already be gone if the loop exited
            let _ = task.shutdown.send(true);
            task.handle.abort();
            info!("Health monitor stopped");
        }
    }

    /// Whether the probe loop is running
    pub fn is_running(&self) -> bool {
        self.task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|t| !t.handle.is_finished())
    }
}

impl Drop for HealthMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn run_loop(cycle: ProbeCycle, period: Duration, mut shutdown: watch::Receiver<bool>) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let probed = cycle.run().await;
                let purged = cycle.cache.purge_expired();
                debug!(probed, purged, "Health sweep completed");
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }

    debug!("Health monitor loop exited");
}
