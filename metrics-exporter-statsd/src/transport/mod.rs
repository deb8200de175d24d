use std::{
    io,
    net::{SocketAddr, ToSocketAddrs as _},
    sync::Arc,
};

use tracing::{debug, trace};

use crate::{payload::SampleRate, telemetry::TransportStats, writer::PayloadWriter};

mod udp;
pub use self::udp::UdpMetricSink;

/// Draws a uniform random number in `[0, 1)` for the sampling decision.
pub(crate) type Sampler = fn() -> f64;

pub(crate) fn random_draw() -> f64 {
    rand::random::<f64>()
}

/// Resolves a `<host>:<port>` address into the socket addresses to send to.
pub(crate) fn resolve_remote_addr(addr: &str) -> Result<Vec<SocketAddr>, String> {
    let addrs: Vec<SocketAddr> = addr.to_socket_addrs().map_err(|e| e.to_string())?.collect();
    if addrs.is_empty() {
        return Err(format!("'{addr}' did not resolve to any socket addresses"));
    }
    Ok(addrs)
}

/// A destination for rendered statsd payloads.
///
/// A payload is one line, or several newline-delimited lines when flushing a batch, and never has a trailing newline.
/// Implementations return the number of bytes written: anything other than the full length of the payload is treated
/// as a failed send.
pub trait MetricSink: Send + Sync {
    /// Writes the payload, returning the number of bytes written or an I/O error.
    ///
    /// # Errors
    ///
    /// Any error is treated as a dropped payload by the caller. It is never retried.
    fn emit(&self, payload: &[u8]) -> io::Result<usize>;
}

impl<S: MetricSink + ?Sized> MetricSink for Arc<S> {
    fn emit(&self, payload: &[u8]) -> io::Result<usize> {
        (**self).emit(payload)
    }
}

impl<S: MetricSink + ?Sized> MetricSink for Box<S> {
    fn emit(&self, payload: &[u8]) -> io::Result<usize> {
        (**self).emit(payload)
    }
}

/// A sink that discards every payload.
///
/// Payloads are reported as written in full, so sends through this sink always succeed. Useful for disabling metrics
/// without touching call sites.
#[derive(Clone, Copy, Debug, Default)]
pub struct NopMetricSink;

impl MetricSink for NopMetricSink {
    fn emit(&self, payload: &[u8]) -> io::Result<usize> {
        Ok(payload.len())
    }
}

/// Sampling, writing, and failure handling in front of a sink.
///
/// Every public operation returns a plain `bool`: I/O errors and partial writes are logged, counted, and swallowed.
pub(crate) struct Transport {
    sink: Box<dyn MetricSink>,
    sampler: Sampler,
    max_payload_len: usize,
    stats: TransportStats,
}

impl Transport {
    pub fn new(sink: Box<dyn MetricSink>, sampler: Sampler, max_payload_len: usize) -> Self {
        Transport { sink, sampler, max_payload_len, stats: TransportStats::default() }
    }

    pub fn stats(&self) -> &TransportStats {
        &self.stats
    }

    /// Makes the sampling decision for a single metric.
    ///
    /// A rate of 1 always sends without drawing. Otherwise, exactly one number is drawn and the metric is sent if it is
    /// less than or equal to the rate.
    pub fn should_send(&self, sample_rate: SampleRate) -> bool {
        if !sample_rate.is_sampling() {
            return true;
        }

        if (self.sampler)() <= sample_rate.get() {
            true
        } else {
            self.stats.track_sampled_out();
            false
        }
    }

    /// Sends a single line, subject to sampling.
    ///
    /// Returns `true` only if the line was sampled in and written in full.
    pub fn send(&self, line: &str, sample_rate: SampleRate) -> bool {
        self.should_send(sample_rate) && self.write(line.as_bytes())
    }

    /// Sends lines that have already passed sampling, packed into as few payloads as possible.
    ///
    /// Returns `true` only if every line was written. Payloads are sent independently, so a failure part way through
    /// does not stop the remaining payloads from being sent.
    pub fn send_batch<'a, I>(&self, lines: I) -> bool
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut writer = PayloadWriter::new(self.max_payload_len);
        let result = writer.write_lines(lines);
        if result.any_failures() {
            debug!(
                lines_dropped = result.lines_dropped(),
                max_payload_len = self.max_payload_len,
                "Dropped lines exceeding the maximum payload length."
            );
        }

        let mut all_sent = !result.any_failures();
        let mut payloads = writer.payloads();
        trace!(num_payloads = payloads.len(), "Flushing batch.");
        while let Some(payload) = payloads.next_payload() {
            all_sent &= self.write(payload);
        }

        all_sent
    }

    fn write(&self, payload: &[u8]) -> bool {
        match self.sink.emit(payload) {
            Ok(written) if written == payload.len() => {
                trace!(payload = %String::from_utf8_lossy(payload), "Sent payload.");
                self.stats.track_packet_send_succeeded(payload.len());
                true
            }
            Ok(written) => {
                debug!(written, payload_len = payload.len(), "Partial write of payload.");
                self.stats.track_packet_send_failed(payload.len());
                false
            }
            Err(e) => {
                debug!(error = %e, "Failed to send payload.");
                self.stats.track_packet_send_failed(payload.len());
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        io,
        time::{Duration, Instant},
    };

    use mockall::{mock, Sequence};

    use super::{MetricSink, NopMetricSink, Transport};
    use crate::payload::SampleRate;

    mock! {
        pub Sink {}

        impl MetricSink for Sink {
            fn emit(&self, payload: &[u8]) -> io::Result<usize>;
        }
    }

    fn draw_low() -> f64 {
        0.25
    }

    fn draw_half() -> f64 {
        0.5
    }

    fn draw_high() -> f64 {
        0.99
    }

    fn draw_unreachable() -> f64 {
        panic!("sampler should not be consulted for a rate of 1")
    }

    fn half() -> SampleRate {
        SampleRate::new(0.5).unwrap()
    }

    #[test]
    fn full_write_succeeds() {
        let mut sink = MockSink::new();
        sink.expect_emit()
            .times(1)
            .withf(|payload| payload.to_vec() == b"wat:1|c".to_vec())
            .returning(|payload| Ok(payload.len()));

        let transport = Transport::new(Box::new(sink), draw_unreachable, 1432);
        assert!(transport.send("wat:1|c", SampleRate::ALWAYS));
        assert_eq!(transport.stats().packets_sent(), 1);
        assert_eq!(transport.stats().bytes_sent(), 7);
    }

    #[test]
    fn partial_write_fails() {
        let mut sink = MockSink::new();
        sink.expect_emit().times(1).returning(|payload| Ok(payload.len() - 1));

        let transport = Transport::new(Box::new(sink), draw_unreachable, 1432);
        assert!(!transport.send("wat:1|c", SampleRate::ALWAYS));
        assert_eq!(transport.stats().packets_dropped(), 1);
    }

    // The UDP sink sets the write timeout on its socket, so a send that times out surfaces here as an error from `emit`.
    #[test]
    fn sink_error_fails() {
        let mut sink = MockSink::new();
        sink.expect_emit()
            .times(1)
            .returning(|_| Err(io::Error::new(io::ErrorKind::TimedOut, "write timed out")));

        let transport = Transport::new(Box::new(sink), draw_unreachable, 1432);
        assert!(!transport.send("wat:1|c", SampleRate::ALWAYS));
        assert_eq!(transport.stats().packets_dropped(), 1);
        assert_eq!(transport.stats().bytes_dropped(), 7);
    }

    #[test]
    fn slow_sink_timing_out_returns_within_bound() {
        let timeout = Duration::from_millis(50);
        let mut sink = MockSink::new();
        sink.expect_emit().times(1).returning(move |_| {
            std::thread::sleep(timeout);
            Err(io::Error::new(io::ErrorKind::WouldBlock, "write timed out"))
        });

        let transport = Transport::new(Box::new(sink), draw_unreachable, 1432);
        let start = Instant::now();
        assert!(!transport.send("wat:1|c", SampleRate::ALWAYS));
        assert!(start.elapsed() < timeout * 20);
        assert_eq!(transport.stats().packets_dropped(), 1);
    }

    #[test]
    fn sampled_out_never_touches_sink() {
        let mut sink = MockSink::new();
        sink.expect_emit().never();

        let transport = Transport::new(Box::new(sink), draw_high, 1432);
        assert!(!transport.send("wat:1|c@0.5", half()));
        assert_eq!(transport.stats().points_sampled_out(), 1);
    }

    #[test]
    fn sampled_in_at_or_below_rate() {
        for sampler in [draw_low as fn() -> f64, draw_half] {
            let mut sink = MockSink::new();
            sink.expect_emit().times(1).returning(|payload| Ok(payload.len()));

            let transport = Transport::new(Box::new(sink), sampler, 1432);
            assert!(transport.send("wat:1|c@0.5", half()));
            assert_eq!(transport.stats().points_sampled_out(), 0);
        }
    }

    #[test]
    fn batch_fits_in_one_payload() {
        let mut sink = MockSink::new();
        sink.expect_emit()
            .times(1)
            .withf(|payload| payload.to_vec() == b"wat:1|c\nwot:-1|c".to_vec())
            .returning(|payload| Ok(payload.len()));

        let transport = Transport::new(Box::new(sink), draw_unreachable, 1432);
        assert!(transport.send_batch(["wat:1|c", "wot:-1|c"]));
    }

    #[test]
    fn batch_splits_in_order_and_reports_partial_failure() {
        let mut seq = Sequence::new();
        let mut sink = MockSink::new();
        sink.expect_emit()
            .times(1)
            .in_sequence(&mut seq)
            .withf(|payload| payload.to_vec() == b"aaa:1|c".to_vec())
            .returning(|_| Err(io::Error::new(io::ErrorKind::Other, "boom")));
        sink.expect_emit()
            .times(1)
            .in_sequence(&mut seq)
            .withf(|payload| payload.to_vec() == b"bbb:2|c".to_vec())
            .returning(|payload| Ok(payload.len()));

        let transport = Transport::new(Box::new(sink), draw_unreachable, 10);
        assert!(!transport.send_batch(["aaa:1|c", "bbb:2|c"]));
        assert_eq!(transport.stats().packets_sent(), 1);
        assert_eq!(transport.stats().packets_dropped(), 1);
    }

    #[test]
    fn batch_with_oversized_line_fails() {
        let mut sink = MockSink::new();
        sink.expect_emit().times(1).returning(|payload| Ok(payload.len()));

        let transport = Transport::new(Box::new(sink), draw_unreachable, 10);
        assert!(!transport.send_batch(["a:1|c", "far_too_long_for_this:1|c"]));
    }

    #[test]
    fn nop_sink_reports_full_writes() {
        let transport = Transport::new(Box::new(NopMetricSink), draw_unreachable, 1432);
        assert!(transport.send("wat:1|c", SampleRate::ALWAYS));
    }
}
