use std::sync::Arc;

use metrics::{
    Counter, CounterFn, Gauge, GaugeFn, Histogram, HistogramFn, Key, KeyName, Metadata, Recorder, SharedString, Unit,
};
use tracing::debug;

use crate::{
    client::StatsdClient,
    facade::Metrics,
    name::{Bucket, MetricName, Segment},
    payload::{MetricType, MetricValue, Payload, SampleRate},
};

/// A recorder that sends every `metrics` update straight to a statsd server.
///
/// Nothing is aggregated locally: each counter increment, gauge update, and histogram observation becomes one statsd
/// line. Labels are folded into the bucket, so `counter!("requests", "method" => "GET")` is sent as
/// `requests.method.get`.
#[derive(Clone, Debug)]
pub struct StatsdRecorder {
    client: StatsdClient,
}

impl StatsdRecorder {
    /// Creates a new `StatsdRecorder` that sends through the given client.
    pub fn from_client(client: StatsdClient) -> Self {
        StatsdRecorder { client }
    }

    /// Returns the client this recorder sends through.
    pub fn client(&self) -> &StatsdClient {
        &self.client
    }

    fn handle(&self, key: &Key) -> Arc<Handle> {
        let mut segments = vec![Segment::from(key.name())];
        for label in key.labels() {
            segments.push(Segment::from(label.key()));
            segments.push(Segment::from(label.value()));
        }

        let bucket = match MetricName::from(segments).to_bucket() {
            Ok(bucket) => Some(bucket),
            Err(e) => {
                debug!(error = %e, "Dropping updates for metric with an invalid name.");
                None
            }
        };

        Arc::new(Handle { client: self.client.clone(), bucket })
    }
}

impl Recorder for StatsdRecorder {
    fn describe_counter(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}
    fn describe_gauge(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}
    fn describe_histogram(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}

    fn register_counter(&self, key: &Key, _: &Metadata<'_>) -> Counter {
        Counter::from_arc(self.handle(key))
    }

    fn register_gauge(&self, key: &Key, _: &Metadata<'_>) -> Gauge {
        Gauge::from_arc(self.handle(key))
    }

    fn register_histogram(&self, key: &Key, _: &Metadata<'_>) -> Histogram {
        Histogram::from_arc(self.handle(key))
    }
}

// The bucket is normalized once at registration. A handle without one silently drops every update.
struct Handle {
    client: StatsdClient,
    bucket: Option<Bucket>,
}

impl Handle {
    fn send<V: Into<MetricValue>>(&self, value: V, metric_type: MetricType) {
        if let Some(bucket) = &self.bucket {
            self.client.submit(Payload::new(bucket.clone(), value, metric_type, SampleRate::ALWAYS));
        }
    }

    fn send_float(&self, value: f64, metric_type: MetricType) {
        if value.is_finite() {
            self.send(value, metric_type);
        } else {
            debug!(bucket = ?self.bucket, value, "Dropping non-finite value.");
        }
    }
}

impl CounterFn for Handle {
    fn increment(&self, value: u64) {
        self.send(value, MetricType::Count);
    }

    fn absolute(&self, value: u64) {
        self.send(value, MetricType::Gauge);
    }
}

impl GaugeFn for Handle {
    fn increment(&self, value: f64) {
        if !value.is_finite() {
            debug!(bucket = ?self.bucket, value, "Dropping non-finite value.");
            return;
        }

        // Statsd reads a signed gauge value as a delta rather than an absolute value.
        let sign = if value < 0.0 { '-' } else { '+' };
        let delta = format!("{sign}{}", ryu::Buffer::new().format_finite(value.abs()));
        self.send(delta, MetricType::Gauge);
    }

    fn decrement(&self, value: f64) {
        GaugeFn::increment(self, -value);
    }

    fn set(&self, value: f64) {
        self.send_float(value, MetricType::Gauge);
    }
}

impl HistogramFn for Handle {
    fn record(&self, value: f64) {
        self.send_float(value, MetricType::Histogram);
    }
}
