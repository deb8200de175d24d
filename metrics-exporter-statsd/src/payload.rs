use std::{borrow::Cow, convert::Infallible, fmt, fmt::Write as _, str::FromStr};

use crate::{
    error::{MetricError, MetricResult},
    name::{is_reserved, Bucket, MetricName, RESERVED_REPLACEMENT},
};

/// Statsd metric type.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum MetricType {
    /// A counter, sent as `c`.
    Count,

    /// A gauge, sent as `g`.
    #[default]
    Gauge,

    /// A timing in milliseconds, sent as `ms`.
    Timing,

    /// A histogram, sent as `h`.
    Histogram,
}

impl MetricType {
    /// Returns the wire code for this metric type.
    pub const fn as_str(self) -> &'static str {
        match self {
            MetricType::Count => "c",
            MetricType::Gauge => "g",
            MetricType::Timing => "ms",
            MetricType::Histogram => "h",
        }
    }

    /// Parses a metric type from either its wire code or its name.
    ///
    /// Anything unrecognized is treated as a gauge.
    pub fn from_code(code: &str) -> Self {
        match code {
            "c" | "count" => MetricType::Count,
            "ms" | "timing" => MetricType::Timing,
            "h" | "histogram" => MetricType::Histogram,
            _ => MetricType::Gauge,
        }
    }
}

impl FromStr for MetricType {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(MetricType::from_code(s))
    }
}

/// Probability that a metric is sent, in the range `(0, 1]`.
///
/// A rate below 1 is both written into the line (so the server can scale the value back up) and used to decide locally
/// whether the line is sent at all.
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd)]
pub struct SampleRate(f64);

impl SampleRate {
    /// Always send.
    pub const ALWAYS: SampleRate = SampleRate(1.0);

    /// Creates a new `SampleRate`.
    ///
    /// # Errors
    ///
    /// If `rate` is not greater than 0 and at most 1, [`MetricError::InvalidSampleRate`] is returned.
    pub fn new(rate: f64) -> MetricResult<Self> {
        if rate > 0.0 && rate <= 1.0 {
            Ok(SampleRate(rate))
        } else {
            Err(MetricError::InvalidSampleRate { rate })
        }
    }

    /// Returns the rate as a floating-point number.
    pub const fn get(self) -> f64 {
        self.0
    }

    /// Returns `true` if this rate drops any metrics, which is to say it is below 1.
    pub fn is_sampling(self) -> bool {
        self.0 < 1.0
    }
}

impl Default for SampleRate {
    fn default() -> Self {
        SampleRate::ALWAYS
    }
}

impl TryFrom<f64> for SampleRate {
    type Error = MetricError;

    fn try_from(rate: f64) -> Result<Self, Self::Error> {
        SampleRate::new(rate)
    }
}

/// A metric value: a number, or a preformatted string.
#[derive(Clone, Debug, PartialEq)]
pub enum MetricValue {
    /// A signed integer.
    Signed(i64),

    /// An unsigned integer.
    Unsigned(u64),

    /// A double-precision floating-point number.
    Float(f64),

    /// A single-precision floating-point number, written at its own precision rather than widened.
    Float32(f32),

    /// Preformatted text, such as the `+1`/`-1` deltas of a gauge.
    ///
    /// Reserved characters (`:`, `|`, `@`, whitespace) are replaced with `_` when written, so text can never break out
    /// of its line.
    Text(Cow<'static, str>),
}

impl MetricValue {
    fn write_to(&self, buf: &mut String) {
        match self {
            MetricValue::Signed(v) => buf.push_str(itoa::Buffer::new().format(*v)),
            MetricValue::Unsigned(v) => buf.push_str(itoa::Buffer::new().format(*v)),
            MetricValue::Float(v) => buf.push_str(ryu::Buffer::new().format(*v)),
            MetricValue::Float32(v) => buf.push_str(ryu::Buffer::new().format(*v)),
            MetricValue::Text(v) => {
                buf.extend(v.chars().map(|c| if is_reserved(c) { RESERVED_REPLACEMENT } else { c }));
            }
        }
    }
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut buf = String::new();
        self.write_to(&mut buf);
        f.write_str(&buf)
    }
}

macro_rules! value_from {
    ($variant:ident <- $($ty:ty),*) => {
        $(
            impl From<$ty> for MetricValue {
                fn from(value: $ty) -> Self {
                    MetricValue::$variant(value.into())
                }
            }
        )*
    };
}

value_from!(Signed <- i8, i16, i32, i64);
value_from!(Unsigned <- u8, u16, u32, u64);
value_from!(Float32 <- f32);
value_from!(Float <- f64);

impl From<usize> for MetricValue {
    fn from(value: usize) -> Self {
        MetricValue::Unsigned(value as u64)
    }
}

impl From<&str> for MetricValue {
    fn from(value: &str) -> Self {
        MetricValue::Text(Cow::Owned(value.to_owned()))
    }
}

impl From<String> for MetricValue {
    fn from(value: String) -> Self {
        MetricValue::Text(Cow::Owned(value))
    }
}

impl From<Cow<'static, str>> for MetricValue {
    fn from(value: Cow<'static, str>) -> Self {
        MetricValue::Text(value)
    }
}

/// A single metric observation, ready to be rendered into a statsd line.
#[derive(Clone, Debug, PartialEq)]
pub struct Payload {
    bucket: Bucket,
    value: MetricValue,
    metric_type: MetricType,
    sample_rate: SampleRate,
}

impl Payload {
    /// Creates a new `Payload`.
    pub fn new<V>(bucket: Bucket, value: V, metric_type: MetricType, sample_rate: SampleRate) -> Self
    where
        V: Into<MetricValue>,
    {
        Payload { bucket, value: value.into(), metric_type, sample_rate }
    }

    /// Returns the bucket of this payload.
    pub fn bucket(&self) -> &Bucket {
        &self.bucket
    }

    /// Returns the value of this payload.
    pub fn value(&self) -> &MetricValue {
        &self.value
    }

    /// Returns the metric type of this payload.
    pub fn metric_type(&self) -> MetricType {
        self.metric_type
    }

    /// Returns the sample rate of this payload.
    pub fn sample_rate(&self) -> SampleRate {
        self.sample_rate
    }

    /// Writes the statsd line for this payload into `buf`, without a trailing newline.
    ///
    /// The line has the form `[prefix.]bucket:value|type[@rate]`. An empty prefix is the same as no prefix.
    pub fn write_to(&self, prefix: Option<&str>, buf: &mut String) {
        if let Some(prefix) = prefix.filter(|p| !p.is_empty()) {
            buf.push_str(prefix);
            buf.push('.');
        }

        buf.push_str(self.bucket.as_str());
        buf.push(':');
        self.value.write_to(buf);
        buf.push('|');
        buf.push_str(self.metric_type.as_str());

        // A rate of 1 is implied, so it's only written when we're actually sampling.
        //
        // `Display` for floats never switches to exponent notation, which keeps tiny rates in plain decimal form.
        if self.sample_rate.is_sampling() {
            let _ = write!(buf, "@{}", self.sample_rate.get());
        }
    }

    /// Renders the statsd line for this payload.
    pub fn render(&self, prefix: Option<&str>) -> String {
        let mut line = String::with_capacity(self.bucket.as_str().len() + 16);
        self.write_to(prefix, &mut line);
        line
    }
}

/// Renders a single statsd line.
///
/// # Errors
///
/// If the name normalizes to an empty bucket, [`MetricError::InvalidMetricName`] is returned.
pub fn render<N, V>(
    name: N,
    value: V,
    metric_type: MetricType,
    sample_rate: SampleRate,
    prefix: Option<&str>,
) -> MetricResult<String>
where
    N: Into<MetricName>,
    V: Into<MetricValue>,
{
    let bucket = name.into().to_bucket()?;
    Ok(Payload::new(bucket, value, metric_type, sample_rate).render(prefix))
}
