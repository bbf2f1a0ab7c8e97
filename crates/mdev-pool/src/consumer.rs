//! Consumer store seam

use api_types::ConsumerId;
use api_types::ConsumerRecord;
use api_types::StoreContext;
use async_trait::async_trait;

/// Interface to the store holding consumer (workload) records.
///
/// The pool only ever reads from it, in batch, during discovery; lookups run
/// under the explicit [`StoreContext`] the embedding daemon hands to
/// `initialize`.
#[async_trait]
pub trait ConsumerStore: Send + Sync {
    /// Batch-resolve consumer records by id. Ids without a record are simply
    /// absent from the result, not an error.
    async fn get_consumers_by_ids(
        &self,
        ctx: &StoreContext,
        ids: &[ConsumerId],
    ) -> anyhow::Result<Vec<ConsumerRecord>>;
}
