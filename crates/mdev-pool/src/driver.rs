//! Host driver seam

use std::collections::HashMap;

use api_types::ConsumerId;
use api_types::MdevDescriptor;
use api_types::MdevId;
use api_types::MdevKind;
use async_trait::async_trait;

/// Interface to the lower-level host driver that enumerates, creates and
/// reports assignment of mediated devices on real hardware.
///
/// Calls may be slow, hardware-backed I/O; the pool imposes no timeouts of
/// its own, callers wrap their own deadlines around claims.
#[async_trait]
pub trait HostDriver: Send + Sync {
    /// Mediated-device kinds this host supports, in the driver's preference
    /// order. Empty means the feature is unsupported on this host.
    async fn supported_kinds(&self) -> anyhow::Result<Vec<MdevKind>>;

    /// Existing mediated devices of the given kind.
    async fn list_units(&self, kind: &MdevKind) -> anyhow::Result<Vec<MdevDescriptor>>;

    /// Current device-to-consumer assignments as the hardware reports them,
    /// independent of this process's memory.
    async fn list_assignments(&self) -> anyhow::Result<HashMap<MdevId, ConsumerId>>;

    /// Supply one mediated device for a claim, either by picking one of
    /// `eligible_free` or by creating a fresh one on a parent of its choice.
    /// Selection policy (affinity, bin-packing) belongs to the driver and is
    /// opaque to the pool. `Ok(None)` means nothing is available.
    ///
    /// The returned descriptor may be a refreshed view of an id the caller
    /// already tracks; the caller replaces its stale record in that case.
    async fn acquire_unit(
        &self,
        candidate_kinds: &[MdevKind],
        eligible_free: &[MdevDescriptor],
    ) -> anyhow::Result<Option<MdevDescriptor>>;
}
