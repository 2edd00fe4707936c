//! Translation of internal metric samples into backend time series.
//!
//! A [`Translator`] maps one sample, together with the identity labels and time bounds of the metric set it came
//! from, to zero or one [`TimeSeries`]. Translation is pure: the result depends only on the inputs, so a translator
//! can be shared across tasks and called concurrently without locking.
//!
//! Returning `None` is not an error. It means there is nothing to export for that sample, either because the metric
//! is unknown to the backend or because the backend's rules suppress it for the sample's resource type.

use std::{
    collections::{hash_map::Entry, HashMap},
    sync::Arc,
};

use chrono::{DateTime, Utc};

use crate::data_model::{
    LabeledMetric, Labels, MetricBatch, MetricType, MetricValue, Point, TimeInterval, TimeSeries, TypedValue,
};

mod mapping;
pub use self::mapping::{MappingTable, MetricMapping, ValueTransform};

mod passthrough;
pub use self::passthrough::PassthroughTranslator;

mod table;
pub use self::table::{LabelRules, TableTranslator};

/// Maps internal metric samples to backend time series.
pub trait Translator: Send + Sync {
    /// Translates a scalar sample.
    ///
    /// `labels` are the resource-identity labels of the owning metric set, and `[create_time, timestamp]` are its
    /// time bounds.
    fn translate_metric(
        &self, timestamp: DateTime<Utc>, labels: &Labels, name: &str, value: &MetricValue, create_time: DateTime<Utc>,
    ) -> Option<TimeSeries>;

    /// Translates a labeled sample.
    fn translate_labeled_metric(
        &self, timestamp: DateTime<Utc>, labels: &Labels, metric: &LabeledMetric, create_time: DateTime<Utc>,
    ) -> Option<TimeSeries>;
}

impl<T> Translator for Arc<T>
where
    T: Translator + ?Sized,
{
    fn translate_metric(
        &self, timestamp: DateTime<Utc>, labels: &Labels, name: &str, value: &MetricValue, create_time: DateTime<Utc>,
    ) -> Option<TimeSeries> {
        (**self).translate_metric(timestamp, labels, name, value, create_time)
    }

    fn translate_labeled_metric(
        &self, timestamp: DateTime<Utc>, labels: &Labels, metric: &LabeledMetric, create_time: DateTime<Utc>,
    ) -> Option<TimeSeries> {
        (**self).translate_labeled_metric(timestamp, labels, metric, create_time)
    }
}

/// Result of translating a whole batch.
#[derive(Debug, Default)]
pub struct Translated {
    /// Series to export.
    pub series: Vec<TimeSeries>,

    /// Samples for which the translator produced nothing, or whose series was replaced by a later sample with the
    /// same type and labels.
    pub dropped: usize,
}

impl Translated {
    fn insert(&mut self, positions: &mut HashMap<(String, Labels), usize>, series: TimeSeries) {
        let identity = (series.metric_type().to_string(), series.labels().clone());
        match positions.entry(identity) {
            Entry::Occupied(entry) => {
                self.series[*entry.get()] = series;
                self.dropped += 1;
            }
            Entry::Vacant(entry) => {
                entry.insert(self.series.len());
                self.series.push(series);
            }
        }
    }
}

/// Translates every sample of every metric set in `batch`.
///
/// Scalar samples go through [`Translator::translate_metric`], and every entry of every labeled metric goes through
/// [`Translator::translate_labeled_metric`]. Samples are independent, so the order of the resulting series carries no
/// meaning beyond being stable for a given batch.
///
/// A backend rejects a request that carries two series with the same type and labels, so the result holds at most one
/// series per identity: a later sample replaces the series of an earlier one, keeping its position.
pub fn translate_batch<T>(translator: &T, batch: &MetricBatch) -> Translated
where
    T: Translator + ?Sized,
{
    let mut translated = Translated::default();
    let mut positions = HashMap::new();

    for metric_set in batch.metric_sets().values() {
        let labels = metric_set.labels();
        let timestamp = metric_set.timestamp();
        let create_time = metric_set.create_time();

        for (name, value) in metric_set.metric_values() {
            match translator.translate_metric(timestamp, labels, name, value, create_time) {
                Some(series) => translated.insert(&mut positions, series),
                None => translated.dropped += 1,
            }
        }

        for metric in metric_set.labeled_metrics().values().flatten() {
            match translator.translate_labeled_metric(timestamp, labels, metric, create_time) {
                Some(series) => translated.insert(&mut positions, series),
                None => translated.dropped += 1,
            }
        }
    }

    translated
}

/// Builds the single point for a sample of the given kind.
///
/// Returns `None` when the creation time is after the timestamp.
pub(crate) fn build_point(
    kind: MetricType, value: TypedValue, timestamp: DateTime<Utc>, create_time: DateTime<Utc>,
) -> Option<Point> {
    if create_time > timestamp {
        return None;
    }

    let interval = match kind {
        MetricType::Gauge => TimeInterval::instant(timestamp),
        MetricType::Cumulative => TimeInterval::between(create_time, timestamp)?,
    };

    Some(Point::new(interval, value))
}
