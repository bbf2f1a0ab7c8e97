//! The per-host mediated-device pool
//!
//! This module provides the claim manager for one host's mediated devices:
//! an in-memory registry rebuilt from driver ground truth at startup, plus
//! the claim/release/query paths with all-or-nothing claim semantics.

use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::Arc;

use api_types::AllocationClass;
use api_types::ConsumerId;
use api_types::MdevDescriptor;
use api_types::MdevId;
use api_types::MdevKind;
use api_types::StoreContext;
use tokio::sync::Mutex;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::consumer::ConsumerStore;
use crate::driver::HostDriver;
use crate::error::PoolError;
use crate::error::Result;
use crate::unit::MdevUnit;
use crate::unit::UnitClaim;

/// Claim manager for the mediated devices of one host.
///
/// Exactly one pool instance exists per host for the process lifetime. All
/// operations are serialized on an internal mutex, so a claim's
/// scan-then-mutate sequence can never interleave with another claim or
/// release on the same pool. The mutex is held across driver acquisition
/// calls; that queues claims against this one host, while other hosts run
/// their own pool instances and are unaffected.
pub struct MdevPool<D, C> {
    driver: Arc<D>,
    consumers: Arc<C>,
    /// Registry of all known mediated devices, keyed by id.
    registry: Mutex<HashMap<MdevId, MdevUnit>>,
}

impl<D, C> MdevPool<D, C>
where
    D: HostDriver,
    C: ConsumerStore,
{
    pub fn new(driver: Arc<D>, consumers: Arc<C>) -> Self {
        Self {
            driver,
            consumers,
            registry: Mutex::new(HashMap::new()),
        }
    }

    /// Rebuild the registry from driver ground truth.
    ///
    /// With discovery disabled the pool starts (and stays) empty: the host
    /// lacks the mediated-device feature. Runs once at process start;
    /// in-flight claims queue behind it on the registry mutex.
    pub async fn initialize(&self, ctx: &StoreContext, discovery_enabled: bool) -> Result<()> {
        if !discovery_enabled {
            info!("mediated device discovery disabled, pool starts empty");
            return Ok(());
        }
        self.populate_existing_units(ctx).await
    }

    /// Populate all existing mediated devices and their assignments.
    async fn populate_existing_units(&self, ctx: &StoreContext) -> Result<()> {
        let kinds = self
            .driver
            .supported_kinds()
            .await
            .map_err(PoolError::Driver)?;
        let Some(first_kind) = kinds.first() else {
            info!("host driver reports no supported mediated device kinds");
            return Ok(());
        };

        // Only one concurrent kind per host is supported for now.
        let descriptors = self
            .driver
            .list_units(first_kind)
            .await
            .map_err(PoolError::Driver)?;
        let assignments = self
            .driver
            .list_assignments()
            .await
            .map_err(PoolError::Driver)?;

        // A device reassigned between the assignment read and this lookup may
        // show a stale allocation class until the next reconciliation.
        let class_by_consumer = self.resolve_allocation_classes(ctx, &assignments).await;

        let mut registry = self.registry.lock().await;
        registry.clear();
        for descriptor in descriptors {
            let claim = assignments.get(&descriptor.id).map(|consumer| {
                UnitClaim::new(
                    consumer.clone(),
                    class_by_consumer.get(consumer).cloned().flatten(),
                )
            });
            let unit = match claim {
                Some(claim) => MdevUnit::with_claim(descriptor, claim),
                None => MdevUnit::from_descriptor(descriptor),
            };
            debug!(unit = %unit, "discovered mediated device");
            registry.insert(unit.id.clone(), unit);
        }

        info!(
            total = registry.len(),
            assigned = registry.values().filter(|unit| unit.is_assigned()).count(),
            kind = %first_kind,
            "mediated device registry populated"
        );
        Ok(())
    }

    /// Batch-resolve each assigned consumer to its allocation class.
    ///
    /// An owner the store cannot resolve leaves the class unset; discovery
    /// never fails on it.
    async fn resolve_allocation_classes(
        &self,
        ctx: &StoreContext,
        assignments: &HashMap<MdevId, ConsumerId>,
    ) -> HashMap<ConsumerId, Option<AllocationClass>> {
        let ids: Vec<ConsumerId> = assignments
            .values()
            .cloned()
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        if ids.is_empty() {
            return HashMap::new();
        }

        match self.consumers.get_consumers_by_ids(ctx, &ids).await {
            Ok(records) => {
                let resolved: HashMap<ConsumerId, Option<AllocationClass>> = records
                    .into_iter()
                    .map(|record| (record.id, record.allocation_class))
                    .collect();
                for id in &ids {
                    if !resolved.contains_key(id) {
                        warn!(consumer = %id, "consumer not found in store, leaving allocation class unset");
                    }
                }
                resolved
            }
            Err(err) => {
                warn!(error = %err, "consumer store lookup failed, leaving allocation classes unset");
                HashMap::new()
            }
        }
    }

    /// Claim `count` mediated devices for `(consumer, class)`.
    ///
    /// Either all `count` devices end up owned and are returned, or no device
    /// changes ownership and the call fails: a driver refusal surfaces as
    /// [`PoolError::ResourceUnavailable`], a driver failure as
    /// [`PoolError::Driver`], and both roll back every device claimed earlier
    /// in the same call. `kind` constrains which free devices are eligible;
    /// `None` means any kind.
    pub async fn claim(
        &self,
        consumer: &ConsumerId,
        class: &AllocationClass,
        kind: Option<&MdevKind>,
        count: usize,
    ) -> Result<Vec<MdevUnit>> {
        if count == 0 {
            return Ok(Vec::new());
        }

        let candidate_kinds: Vec<MdevKind> = kind.cloned().into_iter().collect();

        let mut registry = self.registry.lock().await;
        let mut claimed: Vec<MdevId> = Vec::with_capacity(count);

        for _ in 0..count {
            // Recomputed each round so devices committed earlier in this call
            // are no longer offered to the driver.
            let eligible_free: Vec<MdevDescriptor> = registry
                .values()
                .filter(|unit| {
                    !unit.is_assigned() && kind.map_or(true, |kind| unit.kind == *kind)
                })
                .map(MdevUnit::descriptor)
                .collect();

            match self
                .driver
                .acquire_unit(&candidate_kinds, &eligible_free)
                .await
            {
                Ok(Some(descriptor)) => {
                    let mut unit = MdevUnit::from_descriptor(descriptor);
                    unit.assign(consumer.clone(), class.clone());
                    let id = unit.id.clone();
                    debug!(unit = %unit, "committed mediated device to claim");
                    // The driver may return a refreshed view of an id we
                    // already track; the stale record is replaced, not merged.
                    if registry.insert(id.clone(), unit).is_some() {
                        debug!(id = %id, "replaced stale record with refreshed descriptor");
                    }
                    claimed.push(id);
                }
                Ok(None) => {
                    Self::rollback(&mut registry, &claimed);
                    warn!(
                        consumer = %consumer,
                        class = %class,
                        requested = count,
                        acquired = claimed.len(),
                        "claim rolled back, no mediated device available"
                    );
                    return Err(PoolError::ResourceUnavailable {
                        reason: "no mediated device available on this host".to_string(),
                    });
                }
                Err(err) => {
                    Self::rollback(&mut registry, &claimed);
                    warn!(
                        consumer = %consumer,
                        class = %class,
                        requested = count,
                        acquired = claimed.len(),
                        error = %err,
                        "claim rolled back after driver failure"
                    );
                    return Err(PoolError::Driver(err));
                }
            }
        }

        let units: Vec<MdevUnit> = claimed.iter().map(|id| registry[id].clone()).collect();
        info!(
            consumer = %consumer,
            class = %class,
            count = units.len(),
            "claimed mediated devices"
        );
        Ok(units)
    }

    /// Clear ownership on every device committed earlier in a failed claim.
    /// Only ownership fields are touched; identity, kind and parent keep
    /// whatever (possibly refreshed) values the registry holds.
    fn rollback(registry: &mut HashMap<MdevId, MdevUnit>, claimed: &[MdevId]) {
        for id in claimed {
            if let Some(unit) = registry.get_mut(id) {
                unit.clear_claim();
            }
        }
    }

    /// Release every device owned by `(consumer, class)`.
    ///
    /// Devices the same consumer holds under a different allocation class are
    /// untouched. Idempotent: releasing with no match is a no-op, never an
    /// error. Returns the number of devices released.
    pub async fn release(&self, consumer: &ConsumerId, class: &AllocationClass) -> usize {
        let mut registry = self.registry.lock().await;
        let mut released = 0;
        for unit in registry.values_mut() {
            if unit.is_claimed_by(consumer, class) {
                unit.clear_claim();
                released += 1;
            }
        }

        if released > 0 {
            info!(consumer = %consumer, class = %class, released, "released mediated devices");
        } else {
            debug!(consumer = %consumer, class = %class, "release matched no mediated devices");
        }
        released
    }

    /// Devices currently owned by `(consumer, class)`.
    pub async fn query(&self, consumer: &ConsumerId, class: &AllocationClass) -> Vec<MdevUnit> {
        let registry = self.registry.lock().await;
        registry
            .values()
            .filter(|unit| unit.is_claimed_by(consumer, class))
            .cloned()
            .collect()
    }

    /// Snapshot of the full registry, for diagnostics.
    pub async fn list(&self) -> Vec<MdevUnit> {
        let registry = self.registry.lock().await;
        registry.values().cloned().collect()
    }
}
