//! A client for sending metrics to a [statsd][statsd] server over UDP, with an optional [`metrics`]-compatible
//! recorder.
//!
//! [statsd]: https://github.com/statsd/statsd
//!
//! # Usage
//!
//! ```no_run
//! # use metrics_exporter_statsd::{Metrics, SampleRate, StatsdBuilder};
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // First, create a builder, and configure where metrics should be sent to.
//! let client = StatsdBuilder::default()
//!     .with_remote_address("127.0.0.1:8125")?
//!     .with_prefix("myapp")
//!     .build()?;
//!
//! // The client sends every metric as soon as it's emitted.
//! client.increment("users.signup")?;
//! client.gauge(["queue", "depth"], 42)?;
//! let rows = client.time("db.query", || 7)?;
//!
//! // Sampled metrics are only sent some of the time, and carry their rate so the server can scale them back up.
//! client.sampled(SampleRate::new(0.1)?).increment("cache.lookups")?;
//!
//! // Several metrics can be sent together, in as few datagrams as possible.
//! client.bulk(|batch| {
//!     let _ = batch.increment("jobs.started");
//!     let _ = batch.timing("jobs.wait", 120);
//! });
//! # let _ = rows;
//! # Ok(())
//! # }
//! ```
//!
//! # Metric names
//!
//! Names can be given as a single string, or as a list of segments which are joined with `.`. Segments can be nested,
//! optional, or integers. Every name is lower-cased, and the reserved characters `:`, `|`, `@`, as well as whitespace,
//! are replaced with `_`. A name that ends up empty is rejected with [`MetricError::InvalidMetricName`].
//!
//! # Failure handling
//!
//! Sending metrics is best-effort. A send that fails, is only partially written, or times out is logged at the
//! `debug` level, counted in [`TransportStats`], and reported as `false`. It is never retried and never surfaced as an
//! error.
//!
//! # `metrics` integration
//!
//! [`StatsdRecorder`] implements [`metrics::Recorder`], sending every update through a [`StatsdClient`]:
//!
//! ```no_run
//! # use metrics_exporter_statsd::StatsdBuilder;
//! StatsdBuilder::default().install().expect("failed to install recorder");
//!
//! metrics::counter!("requests", "method" => "GET").increment(1);
//! ```
//!
//! Nothing is aggregated locally: every update becomes one statsd line.

#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::module_name_repetitions)]
#![deny(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg), deny(rustdoc::broken_intra_doc_links))]

mod builder;
pub use self::builder::{BuildError, StatsdBuilder};

mod client;
pub use self::client::{Batch, StatsdClient};

mod error;
pub use self::error::{MetricError, MetricResult};

mod facade;
pub use self::facade::{Metrics, Sampled};

mod name;
pub use self::name::{Bucket, MetricName, Segment};

mod namespace;
pub use self::namespace::Namespaces;

mod payload;
pub use self::payload::{render, MetricType, MetricValue, Payload, SampleRate};

mod recorder;
pub use self::recorder::StatsdRecorder;

mod telemetry;
pub use self::telemetry::TransportStats;

mod transport;
pub use self::transport::{MetricSink, NopMetricSink, UdpMetricSink};

mod writer;

#[cfg(test)]
mod test_util;
