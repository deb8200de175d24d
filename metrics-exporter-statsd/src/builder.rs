use std::{net::SocketAddr, time::Duration};

use quanta::Clock;
use thiserror::Error;

use crate::{
    client::StatsdClient,
    namespace::Namespaces,
    recorder::StatsdRecorder,
    transport::{self, MetricSink, Sampler, Transport, UdpMetricSink},
    writer::SMALLEST_VALID_LINE,
};

const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(1);
const DEFAULT_MAX_PAYLOAD_LEN: usize = 1432;
const DEFAULT_NAMESPACES: [&str; 2] = ["Stats", "S"];

/// Errors that could occur while building or installing a statsd client.
#[derive(Debug, Error)]
pub enum BuildError {
    /// Failed to parse or resolve the remote address.
    #[error("invalid remote address: {reason}")]
    InvalidRemoteAddress {
        /// Details about the failure.
        reason: String,
    },

    /// The write timeout was zero.
    #[error("invalid write timeout: must be non-zero")]
    InvalidWriteTimeout,

    /// The maximum payload length was too small to hold even a single metric.
    #[error("invalid maximum payload length {len}: must be at least {minimum} bytes")]
    InvalidMaximumPayloadLength {
        /// The rejected length.
        len: usize,

        /// The smallest length allowed.
        minimum: usize,
    },

    /// Failed to install the recorder due to an existing global recorder already being installed.
    #[error("failed to install statsd recorder as global recorder")]
    FailedToInstall,
}

/// Builder for a statsd client.
///
/// ```no_run
/// # use std::time::Duration;
/// # use metrics_exporter_statsd::{Metrics, StatsdBuilder};
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let client = StatsdBuilder::default()
///     .with_remote_address("statsd.internal:8125")?
///     .with_write_timeout(Duration::from_millis(100))
///     .with_prefix("myapp")
///     .build()?;
///
/// client.increment("requests")?;
/// # Ok(())
/// # }
/// ```
pub struct StatsdBuilder {
    remote_addrs: Vec<SocketAddr>,
    write_timeout: Duration,
    prefix: Option<String>,
    max_payload_len: usize,
    namespaces: Vec<String>,
    sampler: Sampler,
}

impl StatsdBuilder {
    /// Set the remote address to send metrics to.
    ///
    /// The address needs to be in the format of `<host>:<port>`, and is resolved immediately.
    ///
    /// Defaults to `127.0.0.1:8125`.
    ///
    /// # Errors
    ///
    /// If the given address cannot be parsed or resolved, an error will be returned indicating the reason.
    pub fn with_remote_address<A>(mut self, addr: A) -> Result<Self, BuildError>
    where
        A: AsRef<str>,
    {
        self.remote_addrs = transport::resolve_remote_addr(addr.as_ref())
            .map_err(|reason| BuildError::InvalidRemoteAddress { reason })?;
        Ok(self)
    }

    /// Set the write timeout for sending metrics.
    ///
    /// When the write timeout is reached, the payload being sent is dropped without retrying, and the send reports
    /// failure.
    ///
    /// Defaults to 1 second.
    #[must_use]
    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// Set the prefix prepended to every bucket.
    ///
    /// The prefix is joined to the bucket with a `.`, and is not normalized. An empty prefix is the same as no prefix.
    ///
    /// Defaults to no prefix.
    #[must_use]
    pub fn with_prefix<P: Into<String>>(mut self, prefix: P) -> Self {
        let prefix = prefix.into();
        self.prefix = if prefix.is_empty() { None } else { Some(prefix) };
        self
    }

    /// Set the maximum payload length for batches.
    ///
    /// Lines emitted within [`StatsdClient::bulk`] are packed into payloads of at most this many bytes. A line that is
    /// longer than this by itself is dropped. Lines sent outside of a batch are never checked against this limit.
    ///
    /// The default leaves room for the IP and UDP headers within a standard Ethernet MTU.
    ///
    /// Defaults to 1432 bytes.
    #[must_use]
    pub fn with_maximum_payload_length(mut self, max_payload_len: usize) -> Self {
        self.max_payload_len = max_payload_len;
        self
    }

    /// Set the namespaces the client is made available under.
    ///
    /// See [`build_namespaces`][StatsdBuilder::build_namespaces].
    ///
    /// Defaults to `Stats` and `S`.
    #[must_use]
    pub fn with_namespaces<I, S>(mut self, namespaces: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.namespaces = namespaces.into_iter().map(Into::into).collect();
        self
    }

    #[cfg(test)]
    pub(crate) fn with_sampler(mut self, sampler: Sampler) -> Self {
        self.sampler = sampler;
        self
    }

    fn validate_max_payload_len(&self) -> Result<(), BuildError> {
        let minimum = SMALLEST_VALID_LINE.len();
        if self.max_payload_len < minimum {
            return Err(BuildError::InvalidMaximumPayloadLength { len: self.max_payload_len, minimum });
        }

        Ok(())
    }

    /// Builds the client.
    ///
    /// No socket is created until the first metric is sent.
    ///
    /// # Errors
    ///
    /// If the write timeout is zero, or the maximum payload length is too small, an error will be returned.
    pub fn build(self) -> Result<StatsdClient, BuildError> {
        if self.write_timeout.is_zero() {
            return Err(BuildError::InvalidWriteTimeout);
        }

        let sink = UdpMetricSink::from_resolved(self.remote_addrs.clone(), self.write_timeout);
        self.build_with_clock(sink, Clock::new())
    }

    /// Builds a client that sends to the given sink instead of over UDP.
    ///
    /// The remote address and write timeout are ignored.
    ///
    /// # Errors
    ///
    /// If the maximum payload length is too small, an error will be returned.
    pub fn build_with_sink<S>(self, sink: S) -> Result<StatsdClient, BuildError>
    where
        S: MetricSink + 'static,
    {
        self.build_with_clock(sink, Clock::new())
    }

    pub(crate) fn build_with_clock<S>(self, sink: S, clock: Clock) -> Result<StatsdClient, BuildError>
    where
        S: MetricSink + 'static,
    {
        self.validate_max_payload_len()?;

        let transport = Transport::new(Box::new(sink), self.sampler, self.max_payload_len);
        Ok(StatsdClient::new(self.prefix, transport, clock))
    }

    /// Builds the client and registers it under every configured namespace.
    ///
    /// # Errors
    ///
    /// If the client cannot be built, an error will be returned.
    pub fn build_namespaces(mut self) -> Result<Namespaces, BuildError> {
        let names = std::mem::take(&mut self.namespaces);
        let client = self.build()?;
        Ok(Namespaces::new(&client, names))
    }

    /// Builds a [`metrics`] recorder backed by the client.
    ///
    /// The recorder must be manually installed by the caller.
    ///
    /// # Errors
    ///
    /// If the client cannot be built, an error will be returned.
    pub fn build_recorder(self) -> Result<StatsdRecorder, BuildError> {
        self.build().map(StatsdRecorder::from_client)
    }

    /// Builds the recorder and installs it as the global recorder.
    ///
    /// # Errors
    ///
    /// If the client cannot be built, or if a global recorder is already installed, an error will be returned.
    pub fn install(self) -> Result<(), BuildError> {
        let recorder = self.build_recorder()?;

        metrics::set_global_recorder(recorder).map_err(|_| BuildError::FailedToInstall)
    }
}

impl Default for StatsdBuilder {
    fn default() -> Self {
        StatsdBuilder {
            remote_addrs: vec![SocketAddr::from(([127, 0, 0, 1], 8125))],
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            prefix: None,
            max_payload_len: DEFAULT_MAX_PAYLOAD_LEN,
            namespaces: DEFAULT_NAMESPACES.iter().map(|name| (*name).to_string()).collect(),
            sampler: transport::random_draw,
        }
    }
}
