use thiserror::Error;

/// Errors that could occur while building a metric payload.
///
/// These indicate a malformed call site rather than a problem talking to the statsd server: transport failures are
/// never surfaced as errors.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum MetricError {
    /// The metric name normalized to an empty bucket.
    #[error("invalid metric name {name:?}: name must not be empty")]
    InvalidMetricName {
        /// Debug rendering of the name that was given.
        name: String,
    },

    /// The sample rate was outside of `(0, 1]`.
    #[error("invalid sample rate {rate}: must be greater than 0 and at most 1")]
    InvalidSampleRate {
        /// The rejected rate.
        rate: f64,
    },
}

/// Result type returned by the metrics facade.
pub type MetricResult<T> = Result<T, MetricError>;
