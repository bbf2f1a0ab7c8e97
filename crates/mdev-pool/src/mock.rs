//! Mock collaborators implementing the driver and store seams
//!
//! This module provides scriptable in-memory implementations of
//! [`HostDriver`] and [`ConsumerStore`] for unit tests and for integration
//! suites of daemons embedding the pool.

use std::collections::HashMap;
use std::sync::Mutex;

use api_types::ConsumerId;
use api_types::ConsumerRecord;
use api_types::MdevDescriptor;
use api_types::MdevId;
use api_types::MdevKind;
use api_types::StoreContext;
use async_trait::async_trait;

use crate::consumer::ConsumerStore;
use crate::driver::HostDriver;

#[derive(Default)]
struct DriverState {
    kinds: Vec<MdevKind>,
    units: Vec<MdevDescriptor>,
    assignments: HashMap<MdevId, ConsumerId>,
    /// Remaining successful acquisitions; `None` means unlimited.
    acquire_budget: Option<usize>,
    /// Successful acquisitions before `acquire_unit` starts failing hard.
    fail_after: Option<usize>,
    /// Descriptors handed out before the eligible list is consulted; used to
    /// script driver-side refreshes and freshly created devices.
    fresh_units: Vec<MdevDescriptor>,
    error_mode: bool,
}

/// Scriptable host driver.
///
/// Serves inventory and assignment ground truth from in-memory tables.
/// `acquire_unit` hands out scripted fresh descriptors first, then picks the
/// first eligible free device matching the candidate kinds, until the
/// acquisition budget (if any) runs out.
#[derive(Default)]
pub struct MockHostDriver {
    state: Mutex<DriverState>,
}

impl MockHostDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_kinds(&self, kinds: Vec<MdevKind>) {
        self.state.lock().unwrap().kinds = kinds;
    }

    pub fn set_units(&self, units: Vec<MdevDescriptor>) {
        self.state.lock().unwrap().units = units;
    }

    pub fn set_assignment(&self, id: MdevId, consumer: ConsumerId) {
        self.state.lock().unwrap().assignments.insert(id, consumer);
    }

    /// Limit how many acquisitions succeed; further requests report that no
    /// device is available.
    pub fn set_acquire_budget(&self, budget: usize) {
        self.state.lock().unwrap().acquire_budget = Some(budget);
    }

    /// Let `count` acquisitions succeed, then fail hard with a driver error.
    pub fn set_fail_after(&self, count: usize) {
        self.state.lock().unwrap().fail_after = Some(count);
    }

    /// Queue a descriptor `acquire_unit` returns ahead of the eligible list,
    /// e.g. a refreshed view of an already-tracked id.
    pub fn push_fresh_unit(&self, descriptor: MdevDescriptor) {
        self.state.lock().unwrap().fresh_units.push(descriptor);
    }

    /// Enable or disable failing every driver call.
    pub fn set_error_mode(&self, enabled: bool) {
        self.state.lock().unwrap().error_mode = enabled;
    }
}

#[async_trait]
impl HostDriver for MockHostDriver {
    async fn supported_kinds(&self) -> anyhow::Result<Vec<MdevKind>> {
        let state = self.state.lock().unwrap();
        if state.error_mode {
            anyhow::bail!("mock driver error mode enabled");
        }
        Ok(state.kinds.clone())
    }

    async fn list_units(&self, kind: &MdevKind) -> anyhow::Result<Vec<MdevDescriptor>> {
        let state = self.state.lock().unwrap();
        if state.error_mode {
            anyhow::bail!("mock driver error mode enabled");
        }
        Ok(state
            .units
            .iter()
            .filter(|descriptor| descriptor.kind == *kind)
            .cloned()
            .collect())
    }

    async fn list_assignments(&self) -> anyhow::Result<HashMap<MdevId, ConsumerId>> {
        let state = self.state.lock().unwrap();
        if state.error_mode {
            anyhow::bail!("mock driver error mode enabled");
        }
        Ok(state.assignments.clone())
    }

    async fn acquire_unit(
        &self,
        candidate_kinds: &[MdevKind],
        eligible_free: &[MdevDescriptor],
    ) -> anyhow::Result<Option<MdevDescriptor>> {
        let mut state = self.state.lock().unwrap();
        if state.error_mode {
            anyhow::bail!("mock driver error mode enabled");
        }

        if let Some(remaining) = state.fail_after {
            if remaining == 0 {
                anyhow::bail!("mock driver acquisition failure");
            }
            state.fail_after = Some(remaining - 1);
        }

        if let Some(budget) = state.acquire_budget {
            if budget == 0 {
                return Ok(None);
            }
        }

        let picked = if state.fresh_units.is_empty() {
            eligible_free
                .iter()
                .find(|descriptor| {
                    candidate_kinds.is_empty() || candidate_kinds.contains(&descriptor.kind)
                })
                .cloned()
        } else {
            Some(state.fresh_units.remove(0))
        };

        if picked.is_some() {
            if let Some(budget) = state.acquire_budget {
                state.acquire_budget = Some(budget - 1);
            }
        }
        Ok(picked)
    }
}

#[derive(Default)]
struct StoreState {
    records: HashMap<ConsumerId, ConsumerRecord>,
    /// Principal of every lookup performed, in call order.
    principals_seen: Vec<String>,
    error_mode: bool,
}

/// Scriptable consumer store recording the contexts it was queried with.
#[derive(Default)]
pub struct MockConsumerStore {
    state: Mutex<StoreState>,
}

impl MockConsumerStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_record(&self, record: ConsumerRecord) {
        self.state
            .lock()
            .unwrap()
            .records
            .insert(record.id.clone(), record);
    }

    /// Enable or disable failing every lookup.
    pub fn set_error_mode(&self, enabled: bool) {
        self.state.lock().unwrap().error_mode = enabled;
    }

    /// Principals of the lookups performed so far.
    pub fn principals_seen(&self) -> Vec<String> {
        self.state.lock().unwrap().principals_seen.clone()
    }
}

#[async_trait]
impl ConsumerStore for MockConsumerStore {
    async fn get_consumers_by_ids(
        &self,
        ctx: &StoreContext,
        ids: &[ConsumerId],
    ) -> anyhow::Result<Vec<ConsumerRecord>> {
        let mut state = self.state.lock().unwrap();
        state.principals_seen.push(ctx.principal.clone());
        if state.error_mode {
            anyhow::bail!("mock consumer store error mode enabled");
        }
        Ok(ids
            .iter()
            .filter_map(|id| state.records.get(id).cloned())
            .collect())
    }
}
