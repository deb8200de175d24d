use std::{borrow::Cow, fmt};

use crate::error::{MetricError, MetricResult};

const DELIMITER: &str = ".";
pub(crate) const RESERVED_REPLACEMENT: char = '_';

/// Returns `true` if the character cannot appear in a statsd bucket.
pub(crate) fn is_reserved(c: char) -> bool {
    matches!(c, ':' | '|' | '@') || c.is_whitespace()
}

/// A single segment of a metric name.
///
/// Segments can be nested, which allows composite keys such as `["event", kind, app]` to be built up from smaller
/// parts. Absent segments, and segments that are empty strings, are skipped when the name is normalized.
#[derive(Clone, Debug, PartialEq)]
pub enum Segment {
    /// A plain text segment.
    Text(Cow<'static, str>),

    /// A list of segments, flattened in order during normalization.
    Nested(Vec<Segment>),

    /// A missing segment.
    Absent,
}

impl Segment {
    fn flatten_into<'a>(&'a self, parts: &mut Vec<&'a str>) {
        match self {
            Segment::Text(text) => {
                if !text.is_empty() {
                    parts.push(text);
                }
            }
            Segment::Nested(segments) => {
                for segment in segments {
                    segment.flatten_into(parts);
                }
            }
            Segment::Absent => {}
        }
    }
}

impl From<&str> for Segment {
    fn from(text: &str) -> Self {
        Segment::Text(Cow::Owned(text.to_owned()))
    }
}

impl From<&String> for Segment {
    fn from(text: &String) -> Self {
        Segment::Text(Cow::Owned(text.clone()))
    }
}

impl From<String> for Segment {
    fn from(text: String) -> Self {
        Segment::Text(Cow::Owned(text))
    }
}

impl From<Cow<'static, str>> for Segment {
    fn from(text: Cow<'static, str>) -> Self {
        Segment::Text(text)
    }
}

impl<T: Into<Segment>> From<Option<T>> for Segment {
    fn from(segment: Option<T>) -> Self {
        segment.map_or(Segment::Absent, Into::into)
    }
}

impl<T: Into<Segment>> From<Vec<T>> for Segment {
    fn from(segments: Vec<T>) -> Self {
        Segment::Nested(segments.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Segment>, const N: usize> From<[T; N]> for Segment {
    fn from(segments: [T; N]) -> Self {
        Segment::Nested(segments.into_iter().map(Into::into).collect())
    }
}

impl From<MetricName> for Segment {
    fn from(name: MetricName) -> Self {
        Segment::Nested(name.segments)
    }
}

macro_rules! integer_segment {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Segment {
                fn from(value: $ty) -> Self {
                    Segment::Text(Cow::Owned(itoa::Buffer::new().format(value).to_owned()))
                }
            }
        )*
    };
}

integer_segment!(i32, i64, u32, u64, usize);

/// A metric name, made up of one or more segments.
///
/// Names are normalized into a [`Bucket`] before being sent: segments are flattened and joined with `.`, the result is
/// lower-cased, and any reserved characters (`:`, `|`, `@`, whitespace) are replaced with `_`.
#[derive(Clone, Debug, PartialEq)]
pub struct MetricName {
    segments: Vec<Segment>,
}

impl MetricName {
    /// Creates a metric name from the given segments.
    pub fn from_segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Segment>,
    {
        MetricName { segments: segments.into_iter().map(Into::into).collect() }
    }

    /// Appends a segment to the end of this name.
    #[must_use]
    pub fn with_segment<S: Into<Segment>>(mut self, segment: S) -> Self {
        self.segments.push(segment.into());
        self
    }

    /// Normalizes this name into a bucket.
    ///
    /// # Errors
    ///
    /// If every segment is absent or empty, [`MetricError::InvalidMetricName`] is returned.
    pub fn to_bucket(&self) -> MetricResult<Bucket> {
        let mut parts = Vec::with_capacity(self.segments.len());
        for segment in &self.segments {
            segment.flatten_into(&mut parts);
        }

        let bucket: String = parts
            .join(DELIMITER)
            .to_lowercase()
            .chars()
            .map(|c| if is_reserved(c) { RESERVED_REPLACEMENT } else { c })
            .collect();

        if bucket.is_empty() {
            return Err(MetricError::InvalidMetricName { name: format!("{:?}", self.segments) });
        }

        Ok(Bucket(bucket))
    }
}

impl From<Segment> for MetricName {
    fn from(segment: Segment) -> Self {
        MetricName { segments: vec![segment] }
    }
}

impl From<&str> for MetricName {
    fn from(name: &str) -> Self {
        Segment::from(name).into()
    }
}

impl From<&String> for MetricName {
    fn from(name: &String) -> Self {
        Segment::from(name).into()
    }
}

impl From<String> for MetricName {
    fn from(name: String) -> Self {
        Segment::from(name).into()
    }
}

impl From<Cow<'static, str>> for MetricName {
    fn from(name: Cow<'static, str>) -> Self {
        Segment::from(name).into()
    }
}

impl<T: Into<Segment>> From<Vec<T>> for MetricName {
    fn from(segments: Vec<T>) -> Self {
        MetricName::from_segments(segments)
    }
}

impl<T: Into<Segment>, const N: usize> From<[T; N]> for MetricName {
    fn from(segments: [T; N]) -> Self {
        MetricName::from_segments(segments)
    }
}

impl<T: Into<Segment> + Clone> From<&[T]> for MetricName {
    fn from(segments: &[T]) -> Self {
        MetricName::from_segments(segments.iter().cloned())
    }
}

/// A normalized, non-empty statsd bucket, without any prefix applied.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Bucket(String);

impl Bucket {
    /// Returns the bucket as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<MetricName> for Bucket {
    type Error = MetricError;

    fn try_from(name: MetricName) -> Result<Self, Self::Error> {
        name.to_bucket()
    }
}
