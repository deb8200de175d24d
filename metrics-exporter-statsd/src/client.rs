use std::{cell::RefCell, fmt, sync::Arc};

use quanta::Clock;

use crate::{
    facade::Metrics,
    payload::Payload,
    telemetry::TransportStats,
    transport::Transport,
};

struct Inner {
    prefix: Option<String>,
    transport: Transport,
    clock: Clock,
}

/// A statsd client.
///
/// Every metric is rendered and sent on the calling thread as soon as it is emitted. Clones are cheap and share the
/// same underlying socket.
///
/// See [`Metrics`] for the full set of operations, and [`StatsdBuilder`][crate::StatsdBuilder] for how to create one.
#[derive(Clone)]
pub struct StatsdClient {
    inner: Arc<Inner>,
}

impl StatsdClient {
    pub(crate) fn new(prefix: Option<String>, transport: Transport, clock: Clock) -> Self {
        StatsdClient { inner: Arc::new(Inner { prefix, transport, clock }) }
    }

    /// Returns the prefix prepended to every bucket, if any.
    pub fn prefix(&self) -> Option<&str> {
        self.inner.prefix.as_deref()
    }

    /// Returns the transport telemetry for this client.
    ///
    /// The telemetry is shared between all clones of the client.
    pub fn stats(&self) -> &TransportStats {
        self.inner.transport.stats()
    }

    /// Runs `f` with a batch, then sends everything emitted to the batch in as few payloads as possible.
    ///
    /// Metrics emitted to the batch go through the sampling decision straight away, and only the ones sampled in are
    /// buffered. The buffered lines are sent, in order, once `f` returns. If `f` panics, the batch is discarded.
    ///
    /// Returns `true` if every buffered line was sent.
    ///
    /// ```no_run
    /// # use metrics_exporter_statsd::{Metrics, StatsdBuilder};
    /// # fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let client = StatsdBuilder::default().build()?;
    /// client.bulk(|batch| {
    ///     let _ = batch.increment("wat");
    ///     let _ = batch.decrement("wot");
    /// });
    /// # Ok(())
    /// # }
    /// ```
    pub fn bulk<F>(&self, f: F) -> bool
    where
        F: FnOnce(&Batch<'_>),
    {
        let batch = Batch::new(self);
        f(&batch);
        batch.flush()
    }

    /// Like [`bulk`][StatsdClient::bulk], but for a fallible block.
    ///
    /// If `f` returns an error, the batch is discarded and the error is returned as-is.
    ///
    /// # Errors
    ///
    /// Returns whatever error `f` returns.
    pub fn try_bulk<F, E>(&self, f: F) -> Result<bool, E>
    where
        F: FnOnce(&Batch<'_>) -> Result<(), E>,
    {
        let batch = Batch::new(self);
        f(&batch)?;
        Ok(batch.flush())
    }
}

impl Metrics for StatsdClient {
    fn submit(&self, payload: Payload) -> bool {
        let line = payload.render(self.prefix());
        self.inner.transport.send(&line, payload.sample_rate())
    }

    fn clock(&self) -> &Clock {
        &self.inner.clock
    }
}

impl fmt::Debug for StatsdClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatsdClient").field("prefix", &self.inner.prefix).finish_non_exhaustive()
    }
}

/// Metrics buffered during a [`StatsdClient::bulk`] block.
pub struct Batch<'a> {
    client: &'a StatsdClient,
    lines: RefCell<Vec<String>>,
}

impl<'a> Batch<'a> {
    fn new(client: &'a StatsdClient) -> Self {
        Batch { client, lines: RefCell::new(Vec::new()) }
    }

    /// Returns the number of lines buffered so far.
    pub fn len(&self) -> usize {
        self.lines.borrow().len()
    }

    /// Returns `true` if nothing has been buffered.
    pub fn is_empty(&self) -> bool {
        self.lines.borrow().is_empty()
    }

    fn flush(self) -> bool {
        let lines = self.lines.into_inner();
        if lines.is_empty() {
            return true;
        }

        self.client.inner.transport.send_batch(lines.iter().map(String::as_str))
    }
}

impl Metrics for Batch<'_> {
    fn submit(&self, payload: Payload) -> bool {
        if !self.client.inner.transport.should_send(payload.sample_rate()) {
            return false;
        }

        self.lines.borrow_mut().push(payload.render(self.client.prefix()));
        true
    }

    fn clock(&self) -> &Clock {
        self.client.clock()
    }
}

#[cfg(test)]
mod tests {
    use std::{
        panic::{catch_unwind, AssertUnwindSafe},
        time::Duration,
    };

    use quanta::Clock;

    use crate::{
        error::MetricError,
        facade::Metrics,
        name::{MetricName, Segment},
        payload::SampleRate,
        test_util::{client_with, CaptureSink},
    };

    fn draw_low() -> f64 {
        0.1
    }

    fn draw_high() -> f64 {
        0.9
    }

    #[test]
    fn basic_vocabulary() {
        let sink = CaptureSink::default();
        let client = client_with(&sink, None);

        assert!(client.increment("wat").unwrap());
        assert!(client.decrement("wat").unwrap());
        assert!(client.count("wat", 5).unwrap());
        assert!(client.timing("wat", 500).unwrap());
        assert!(client.gauge("mystat", 99).unwrap());
        assert!(client.histogram("mystat", 99).unwrap());

        assert_eq!(
            sink.payloads(),
            ["wat:1|c", "wat:-1|c", "wat:5|c", "wat:500|ms", "mystat:99|g", "mystat:99|h"]
        );
    }

    #[test]
    fn increment_is_count_of_one() {
        let sink = CaptureSink::default();
        let client = client_with(&sink, Some("app"));

        client.increment("wat").unwrap();
        client.count("wat", 1).unwrap();
        client.decrement("wat").unwrap();
        client.count("wat", -1).unwrap();

        let payloads = sink.payloads();
        assert_eq!(payloads[0], payloads[1]);
        assert_eq!(payloads[2], payloads[3]);
        assert_eq!(payloads[0], "app.wat:1|c");
    }

    #[test]
    fn invalid_names_propagate() {
        let sink = CaptureSink::default();
        let client = client_with(&sink, None);

        let result = client.increment("");
        assert!(matches!(result, Err(MetricError::InvalidMetricName { .. })));
        assert!(sink.payloads().is_empty());
    }

    #[test]
    fn increment_on() {
        let sink = CaptureSink::default();
        let client = client_with(&sink, None);

        assert!(client.increment_on("event.increment", true).unwrap());
        assert!(!client.increment_on("event.increment", false).unwrap());

        let missing: Option<()> = None;
        assert!(!client.increment_on("event.increment", missing.is_some()).unwrap());

        assert_eq!(
            sink.payloads(),
            ["event.increment.success:1|c", "event.increment.fail:1|c", "event.increment.fail:1|c"]
        );
    }

    #[test]
    fn increment_on_nested_in_time() {
        let sink = CaptureSink::default();
        let client = client_with(&sink, None);

        let result = client.time("event.run", || client.increment_on("event.increment", true).unwrap()).unwrap();
        assert!(result);

        let payloads = sink.payloads();
        assert_eq!(payloads.len(), 2);
        assert_eq!(payloads[0], "event.increment.success:1|c");
        assert!(payloads[1].starts_with("event.run:"));
        assert!(payloads[1].ends_with("|ms"));
    }

    #[test]
    fn time_records_elapsed_milliseconds() {
        let (clock, mock) = Clock::mock();
        let sink = CaptureSink::default();
        let client = crate::test_util::client_with_clock(&sink, clock);

        let mut calls = 0;
        let result = client
            .time("data.bin", || {
                calls += 1;
                mock.increment(Duration::from_micros(10_600));
                "done"
            })
            .unwrap();

        assert_eq!(result, "done");
        assert_eq!(calls, 1);
        assert_eq!(sink.payloads(), ["data.bin:11|ms"]);
    }

    #[test]
    fn time_with_invalid_name_never_runs() {
        let sink = CaptureSink::default();
        let client = client_with(&sink, None);

        let mut called = false;
        let result = client.time("", || called = true);
        assert!(result.is_err());
        assert!(!called);
    }

    #[test]
    fn time_propagates_panics_without_recording() {
        let sink = CaptureSink::default();
        let client = client_with(&sink, None);

        let result = catch_unwind(AssertUnwindSafe(|| {
            client.time("data.bin", || -> u32 { panic!("boom") }).unwrap()
        }));

        assert!(result.is_err());
        assert!(sink.payloads().is_empty());
    }

    #[test]
    fn time_result_survives_send_failure() {
        let sink = CaptureSink::failing();
        let client = client_with(&sink, None);

        assert_eq!(client.time("data.bin", || 42).unwrap(), 42);
        assert_eq!(client.stats().packets_dropped(), 1);
    }

    #[test]
    fn events() {
        let sink = CaptureSink::default();
        let client = client_with(&sink, None);

        client.commit().unwrap();
        client.build().unwrap();
        client.deploy(None).unwrap();
        client.deploy(Some("fozzie")).unwrap();
        client.event("foo", None).unwrap();

        let buckets: Vec<String> = sink
            .payloads()
            .iter()
            .map(|line| {
                let (bucket, rest) = line.split_once(':').unwrap();
                let value = rest.strip_suffix("|g").unwrap();
                assert!(value.parse::<u32>().unwrap() < 1_000_000);
                bucket.to_string()
            })
            .collect();

        assert_eq!(buckets, ["event.commit", "event.build", "event.deploy", "event.deploy.fozzie", "event.foo"]);
    }

    #[test]
    fn aliases() {
        let (clock, mock) = Clock::mock();
        let sink = CaptureSink::default();
        let client = crate::test_util::client_with_clock(&sink, clock);

        client.committed().unwrap();
        client.built().unwrap();
        client.deployed(Some("fozzie")).unwrap();
        client.time_to_do("task", || mock.increment(Duration::from_millis(5))).unwrap();
        let result = client
            .time_for("task", || {
                mock.increment(Duration::from_millis(7));
                "done"
            })
            .unwrap();
        assert_eq!(result, "done");

        let payloads = sink.payloads();
        let buckets: Vec<&str> = payloads.iter().map(|line| line.split(':').next().unwrap()).collect();
        assert_eq!(buckets, ["event.commit", "event.build", "event.deploy.fozzie", "task", "task"]);
        assert_eq!(&payloads[3..], ["task:5|ms", "task:7|ms"]);
    }

    #[test]
    fn sampled_view() {
        let sink = CaptureSink::default();
        let client = crate::test_util::client_with_sampler(&sink, draw_low);

        let half = SampleRate::new(0.5).unwrap();
        assert!(client.sampled(half).increment("wat").unwrap());
        assert!(client.sampled(SampleRate::ALWAYS).increment("wat").unwrap());

        assert_eq!(sink.payloads(), ["wat:1|c@0.5", "wat:1|c"]);
    }

    #[test]
    fn sampled_out() {
        let sink = CaptureSink::default();
        let client = crate::test_util::client_with_sampler(&sink, draw_high);

        let half = SampleRate::new(0.5).unwrap();
        assert!(!client.sampled(half).increment("wat").unwrap());
        assert!(sink.payloads().is_empty());
        assert_eq!(client.stats().points_sampled_out(), 1);
    }

    #[test]
    fn bulk_flushes_single_write_in_order() {
        let sink = CaptureSink::default();
        let client = client_with(&sink, None);

        let sent = client.bulk(|batch| {
            batch.increment("wat").unwrap();
            batch.decrement("wot").unwrap();
            assert_eq!(batch.len(), 2);
            assert!(sink.payloads().is_empty());
        });

        assert!(sent);
        assert_eq!(sink.payloads(), ["wat:1|c\nwot:-1|c"]);
    }

    #[test]
    fn bulk_applies_sampling_when_buffering() {
        let sink = CaptureSink::default();
        let client = crate::test_util::client_with_sampler(&sink, draw_high);

        let half = SampleRate::new(0.5).unwrap();
        let sent = client.bulk(|batch| {
            assert!(!batch.sampled(half).increment("dropped").unwrap());
            assert!(batch.gauge("kept", 1).unwrap());
        });

        assert!(sent);
        assert_eq!(sink.payloads(), ["kept:1|g"]);
    }

    #[test]
    fn empty_bulk_sends_nothing() {
        let sink = CaptureSink::default();
        let client = client_with(&sink, None);

        assert!(client.bulk(|batch| assert!(batch.is_empty())));
        assert!(sink.payloads().is_empty());
    }

    #[test]
    fn bulk_discards_on_panic() {
        let sink = CaptureSink::default();
        let client = client_with(&sink, None);

        let result = catch_unwind(AssertUnwindSafe(|| {
            client.bulk(|batch| {
                batch.increment("wat").unwrap();
                panic!("boom");
            })
        }));

        assert!(result.is_err());
        assert!(sink.payloads().is_empty());
    }

    #[test]
    fn try_bulk_discards_on_error() {
        let sink = CaptureSink::default();
        let client = client_with(&sink, None);

        let result: Result<bool, &str> = client.try_bulk(|batch| {
            batch.increment("wat").unwrap();
            Err("nope")
        });
        assert_eq!(result, Err("nope"));
        assert!(sink.payloads().is_empty());

        let result: Result<bool, &str> = client.try_bulk(|batch| {
            batch.increment("wat").unwrap();
            Ok(())
        });
        assert_eq!(result, Ok(true));
        assert_eq!(sink.payloads(), ["wat:1|c"]);
    }

    #[test]
    fn composite_names() {
        let sink = CaptureSink::default();
        let client = client_with(&sink, Some("myapp"));

        client.gauge(["Event", "Deploy"], 1234).unwrap();
        client.increment(vec![Segment::from("a b:c")]).unwrap();
        client.increment(MetricName::from("req").with_segment(Some("GET")).with_segment(None::<&str>)).unwrap();

        assert_eq!(sink.payloads(), ["myapp.event.deploy:1234|g", "myapp.a_b_c:1|c", "myapp.req.get:1|c"]);
    }
}
