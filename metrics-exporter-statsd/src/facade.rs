use std::time::{SystemTime, UNIX_EPOCH};

use quanta::Clock;

use crate::{
    error::MetricResult,
    name::{MetricName, Segment},
    payload::{MetricType, MetricValue, Payload, SampleRate},
};

/// Current time's sub-second component, in microseconds.
///
/// Events are gauges whose value only needs to differ between calls, not carry any meaning.
fn event_stamp() -> u32 {
    SystemTime::now().duration_since(UNIX_EPOCH).map_or(0, |d| d.subsec_micros())
}

/// The vocabulary for emitting metrics.
///
/// Implementors only decide what happens to a finished [`Payload`]: [`StatsdClient`][crate::StatsdClient] sends it
/// immediately, [`Batch`][crate::Batch] buffers it until the end of a bulk block. Every other method is built on top of
/// [`submit`][Metrics::submit].
///
/// Methods return `Ok(true)` when the metric was sent (or buffered), and `Ok(false)` when it was sampled out or failed to
/// send. Only a malformed name produces an error.
pub trait Metrics {
    /// Sends, or buffers, a payload.
    fn submit(&self, payload: Payload) -> bool;

    /// Clock used to measure [`time`][Metrics::time].
    fn clock(&self) -> &Clock;

    /// Sample rate applied to every metric emitted through this implementor.
    fn sample_rate(&self) -> SampleRate {
        SampleRate::ALWAYS
    }

    /// Returns a view of this implementor which emits every metric with the given sample rate.
    ///
    /// ```no_run
    /// # use metrics_exporter_statsd::{Metrics, SampleRate, StatsdBuilder};
    /// # fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let client = StatsdBuilder::default().build()?;
    /// client.sampled(SampleRate::new(0.1)?).increment("cache.lookups")?;
    /// # Ok(())
    /// # }
    /// ```
    fn sampled(&self, sample_rate: SampleRate) -> Sampled<'_, Self>
    where
        Self: Sized,
    {
        Sampled { inner: self, sample_rate }
    }

    /// Emits a metric of an arbitrary type.
    ///
    /// # Errors
    ///
    /// If the name normalizes to an empty bucket, [`MetricError::InvalidMetricName`][crate::MetricError] is returned.
    fn record<N, V>(&self, name: N, value: V, metric_type: MetricType) -> MetricResult<bool>
    where
        N: Into<MetricName>,
        V: Into<MetricValue>,
    {
        let bucket = name.into().to_bucket()?;
        Ok(self.submit(Payload::new(bucket, value, metric_type, self.sample_rate())))
    }

    /// Increments a counter by one.
    ///
    /// # Errors
    ///
    /// If the name normalizes to an empty bucket, an error is returned.
    fn increment<N: Into<MetricName>>(&self, name: N) -> MetricResult<bool> {
        self.count(name, 1)
    }

    /// Decrements a counter by one.
    ///
    /// # Errors
    ///
    /// If the name normalizes to an empty bucket, an error is returned.
    fn decrement<N: Into<MetricName>>(&self, name: N) -> MetricResult<bool> {
        self.count(name, -1)
    }

    /// Adds `delta` to a counter.
    ///
    /// # Errors
    ///
    /// If the name normalizes to an empty bucket, an error is returned.
    fn count<N: Into<MetricName>>(&self, name: N, delta: i64) -> MetricResult<bool> {
        self.record(name, delta, MetricType::Count)
    }

    /// Sets a gauge to an arbitrary value.
    ///
    /// # Errors
    ///
    /// If the name normalizes to an empty bucket, an error is returned.
    fn gauge<N, V>(&self, name: N, value: V) -> MetricResult<bool>
    where
        N: Into<MetricName>,
        V: Into<MetricValue>,
    {
        self.record(name, value, MetricType::Gauge)
    }

    /// Records a histogram value.
    ///
    /// # Errors
    ///
    /// If the name normalizes to an empty bucket, an error is returned.
    fn histogram<N, V>(&self, name: N, value: V) -> MetricResult<bool>
    where
        N: Into<MetricName>,
        V: Into<MetricValue>,
    {
        self.record(name, value, MetricType::Histogram)
    }

    /// Records a timing, in milliseconds.
    ///
    /// # Errors
    ///
    /// If the name normalizes to an empty bucket, an error is returned.
    fn timing<N, V>(&self, name: N, ms: V) -> MetricResult<bool>
    where
        N: Into<MetricName>,
        V: Into<MetricValue>,
    {
        self.record(name, ms, MetricType::Timing)
    }

    /// Runs `f`, records how long it took in milliseconds, and returns its result.
    ///
    /// `f` is called exactly once. The name is checked before `f` runs, and a failure to send the timing has no effect
    /// on the result. If `f` panics, nothing is recorded and the panic continues to unwind.
    ///
    /// # Errors
    ///
    /// If the name normalizes to an empty bucket, an error is returned and `f` is not called.
    fn time<N, F, T>(&self, name: N, f: F) -> MetricResult<T>
    where
        N: Into<MetricName>,
        F: FnOnce() -> T,
    {
        let bucket = name.into().to_bucket()?;

        let start = self.clock().now();
        let result = f();
        let elapsed = self.clock().now().duration_since(start);

        let ms = (elapsed.as_secs_f64() * 1000.0).round() as u64;
        self.submit(Payload::new(bucket, ms, MetricType::Timing, self.sample_rate()));

        Ok(result)
    }

    /// Alias for [`time`][Metrics::time].
    ///
    /// # Errors
    ///
    /// If the name normalizes to an empty bucket, an error is returned and `f` is not called.
    fn time_to_do<N, F, T>(&self, name: N, f: F) -> MetricResult<T>
    where
        N: Into<MetricName>,
        F: FnOnce() -> T,
    {
        self.time(name, f)
    }

    /// Alias for [`time`][Metrics::time].
    ///
    /// # Errors
    ///
    /// If the name normalizes to an empty bucket, an error is returned and `f` is not called.
    fn time_for<N, F, T>(&self, name: N, f: F) -> MetricResult<T>
    where
        N: Into<MetricName>,
        F: FnOnce() -> T,
    {
        self.time(name, f)
    }

    /// Registers an event of any kind, optionally for a specific application.
    ///
    /// Events are sent as a gauge named `event.<kind>[.<app>]`.
    ///
    /// # Errors
    ///
    /// If `kind` and `app` are both empty, an error is returned.
    fn event<K: Into<Segment>>(&self, kind: K, app: Option<&str>) -> MetricResult<bool> {
        let name = MetricName::from(vec![Segment::from("event"), kind.into(), Segment::from(app)]);
        self.gauge(name, event_stamp())
    }

    /// Registers a commit.
    ///
    /// # Errors
    ///
    /// Never fails in practice, as the name is fixed.
    fn commit(&self) -> MetricResult<bool> {
        self.event("commit", None)
    }

    /// Alias for [`commit`][Metrics::commit].
    ///
    /// # Errors
    ///
    /// Never fails in practice, as the name is fixed.
    fn committed(&self) -> MetricResult<bool> {
        self.commit()
    }

    /// Registers a build.
    ///
    /// # Errors
    ///
    /// Never fails in practice, as the name is fixed.
    fn build(&self) -> MetricResult<bool> {
        self.event("build", None)
    }

    /// Alias for [`build`][Metrics::build].
    ///
    /// # Errors
    ///
    /// Never fails in practice, as the name is fixed.
    fn built(&self) -> MetricResult<bool> {
        self.build()
    }

    /// Registers a deployment, optionally for a specific application.
    ///
    /// # Errors
    ///
    /// Never fails in practice, as the name is fixed.
    fn deploy(&self, app: Option<&str>) -> MetricResult<bool> {
        self.event("deploy", app)
    }

    /// Alias for [`deploy`][Metrics::deploy].
    ///
    /// # Errors
    ///
    /// Never fails in practice, as the name is fixed.
    fn deployed(&self, app: Option<&str>) -> MetricResult<bool> {
        self.deploy(app)
    }

    /// Increments `<name>.success` when `outcome` is `true`, or `<name>.fail` otherwise, and hands `outcome` back.
    ///
    /// This makes it possible to count outcomes inline:
    ///
    /// ```no_run
    /// # use metrics_exporter_statsd::{Metrics, StatsdBuilder};
    /// # fn save() -> bool { true }
    /// # fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let client = StatsdBuilder::default().build()?;
    /// if client.increment_on("user.save", save())? {
    ///     // ...
    /// }
    /// # Ok(())
    /// # }
    /// ```
    ///
    /// Only a `bool` is accepted. Anything else has to be mapped at the call site, e.g. `option.is_some()`.
    ///
    /// # Errors
    ///
    /// If the name normalizes to an empty bucket, an error is returned.
    fn increment_on<N: Into<MetricName>>(&self, name: N, outcome: bool) -> MetricResult<bool> {
        let name: MetricName = name.into();
        let suffix = if outcome { "success" } else { "fail" };
        self.increment(vec![Segment::from(name), Segment::from(suffix)])?;
        Ok(outcome)
    }
}

/// A view over another [`Metrics`] implementor that applies a fixed sample rate.
///
/// Created by [`Metrics::sampled`].
pub struct Sampled<'a, M> {
    inner: &'a M,
    sample_rate: SampleRate,
}

impl<M: Metrics> Metrics for Sampled<'_, M> {
    fn submit(&self, payload: Payload) -> bool {
        self.inner.submit(payload)
    }

    fn clock(&self) -> &Clock {
        self.inner.clock()
    }

    fn sample_rate(&self) -> SampleRate {
        self.sample_rate
    }
}
