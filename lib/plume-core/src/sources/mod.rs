//! Metric sources.
//!
//! The export scheduler pulls one snapshot per cycle from a [`MetricSource`]. Assembling metric sets from raw
//! collection happens elsewhere; [`SnapshotStore`] is the hand-off point between that assembly and every reader.

use std::sync::Arc;

use arc_swap::ArcSwap;
use plume_error::GenericError;

use crate::data_model::MetricBatch;

/// A source of metric snapshots.
pub trait MetricSource: Send + Sync {
    /// Returns the most recent complete batch.
    ///
    /// The batch is shared, not copied: every sink in a cycle reads the same snapshot.
    ///
    /// # Errors
    ///
    /// If no snapshot can be produced, an error is returned and the caller skips this cycle.
    fn latest_batch(&self) -> Result<Arc<MetricBatch>, GenericError>;
}

impl<T> MetricSource for Arc<T>
where
    T: MetricSource + ?Sized,
{
    fn latest_batch(&self) -> Result<Arc<MetricBatch>, GenericError> {
        (**self).latest_batch()
    }
}

/// Holds the latest published batch.
///
/// Publishing swaps the whole batch atomically: readers see either the previous batch or the new one, never a mix.
/// Clones share the same underlying slot.
#[derive(Clone, Debug)]
pub struct SnapshotStore {
    latest: Arc<ArcSwap<MetricBatch>>,
}

impl SnapshotStore {
    /// Creates a new `SnapshotStore` holding an empty batch.
    pub fn new() -> Self {
        Self {
            latest: Arc::new(ArcSwap::from_pointee(MetricBatch::default())),
        }
    }

    /// Replaces the latest batch.
    pub fn publish(&self, batch: MetricBatch) {
        self.latest.store(Arc::new(batch));
    }

    /// Returns the latest batch.
    pub fn load(&self) -> Arc<MetricBatch> {
        self.latest.load_full()
    }
}

impl Default for SnapshotStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricSource for SnapshotStore {
    fn latest_batch(&self) -> Result<Arc<MetricBatch>, GenericError> {
        Ok(self.load())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::data_model::MetricSet;

    #[test]
    fn clones_observe_published_batch() {
        let store = SnapshotStore::new();
        let reader = store.clone();
        assert!(reader.load().is_empty());

        let now = Utc::now();
        let set = MetricSet::builder(now, now).with_metric("uptime", 1_i64).build().unwrap();
        store.publish(MetricBatch::new(now).with_metric_set("node:a", set));

        let batch = reader.latest_batch().unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch.timestamp(), now);
        assert!(Arc::ptr_eq(&batch, &store.load()));
    }

    #[test]
    fn earlier_loads_keep_their_snapshot() {
        let store = SnapshotStore::new();
        let now = Utc::now();
        store.publish(MetricBatch::new(now));

        let held = store.load();
        let set = MetricSet::builder(now, now).with_metric("uptime", 1_i64).build().unwrap();
        store.publish(MetricBatch::new(now).with_metric_set("node:a", set));

        assert!(held.is_empty());
        assert_eq!(store.load().len(), 1);
    }
}
