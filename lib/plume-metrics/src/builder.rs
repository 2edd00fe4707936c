use metrics::{counter, gauge, histogram, Counter, Gauge, Histogram, Label, SharedString};

mod private {
    use metrics::SharedString;

    pub trait Sealed {}

    impl Sealed for &'static str {}
    impl Sealed for String {}
    impl<T> Sealed for (&'static str, T) where T: Into<SharedString> {}
}

/// A metric tag.
///
/// Tags can be given as `"key:value"` strings (static or owned) or as `("key", value)` tuples. A string without a colon
/// becomes a tag with an empty value.
///
/// This trait is sealed and cannot be implemented outside of this crate.
pub trait MetricTag: private::Sealed {
    /// Consumes `self` and converts it to a label.
    fn into_label(self) -> Label;
}

impl MetricTag for &'static str {
    fn into_label(self) -> Label {
        match self.split_once(':') {
            Some((key, value)) => Label::from_static_parts(key, value),
            None => Label::from_static_parts(self, ""),
        }
    }
}

impl MetricTag for String {
    fn into_label(self) -> Label {
        match self.split_once(':') {
            Some((key, value)) => Label::new(key.to_string(), value.to_string()),
            None => Label::new(self, ""),
        }
    }
}

impl<T> MetricTag for (&'static str, T)
where
    T: Into<SharedString>,
{
    fn into_label(self) -> Label {
        Label::new(SharedString::const_str(self.0), self.1.into())
    }
}

/// Builder for registering metrics with a shared set of default tags.
#[derive(Clone, Default)]
pub struct MetricsBuilder {
    default_tags: Vec<Label>,
}

impl MetricsBuilder {
    /// Adds a default tag, included on every metric registered through this builder afterwards.
    pub fn add_default_tag<T>(mut self, tag: T) -> Self
    where
        T: MetricTag,
    {
        self.default_tags.push(tag.into_label());
        self
    }

    fn tags_with<I, T>(&self, additional_tags: I) -> Vec<Label>
    where
        I: IntoIterator<Item = T>,
        T: MetricTag,
    {
        let mut tags = self.default_tags.clone();
        tags.extend(additional_tags.into_iter().map(MetricTag::into_label));
        tags
    }

    /// Registers a counter.
    pub fn register_counter(&self, metric_name: &'static str) -> Counter {
        counter!(metric_name, self.default_tags.clone())
    }

    /// Registers a counter with additional tags.
    pub fn register_counter_with_tags<I, T>(&self, metric_name: &'static str, additional_tags: I) -> Counter
    where
        I: IntoIterator<Item = T>,
        T: MetricTag,
    {
        counter!(metric_name, self.tags_with(additional_tags))
    }

    /// Registers a gauge.
    pub fn register_gauge(&self, metric_name: &'static str) -> Gauge {
        gauge!(metric_name, self.default_tags.clone())
    }

    /// Registers a histogram.
    pub fn register_histogram(&self, metric_name: &'static str) -> Histogram {
        histogram!(metric_name, self.default_tags.clone())
    }
}
