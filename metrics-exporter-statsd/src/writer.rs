use std::{
    ops::Deref,
    vec::Drain,
};

/// The shortest line that is still a valid statsd metric.
pub(crate) const SMALLEST_VALID_LINE: &[u8] = b"a:0|c";

/// Outcome of writing lines into a [`PayloadWriter`].
#[derive(Debug, Default, PartialEq, Eq)]
pub struct WriteResult {
    lines_written: u64,
    lines_dropped: u64,
}

impl WriteResult {
    fn track(&mut self, written: bool) {
        if written {
            self.lines_written += 1;
        } else {
            self.lines_dropped += 1;
        }
    }

    pub const fn any_failures(&self) -> bool {
        self.lines_dropped != 0
    }

    #[cfg(test)]
    pub const fn lines_written(&self) -> u64 {
        self.lines_written
    }

    pub const fn lines_dropped(&self) -> u64 {
        self.lines_dropped
    }
}

/// Packs statsd lines into datagram-sized payloads.
///
/// Lines inside a payload are separated by a newline, and there is no trailing newline. A payload never exceeds the
/// maximum payload length: when the next line would not fit, the current payload is finalized and a new one started.
/// Lines that are longer than the maximum payload length by themselves can never be sent and are dropped.
pub(crate) struct PayloadWriter {
    max_payload_len: usize,
    payloads_buf: Vec<u8>,
    offsets: Vec<usize>,
}

impl PayloadWriter {
    /// Creates a new `PayloadWriter` with the given maximum payload length.
    pub fn new(max_payload_len: usize) -> Self {
        // NOTE: The builder rejects anything smaller, so this only guards against internal misuse.
        debug_assert!(
            max_payload_len >= SMALLEST_VALID_LINE.len(),
            "maximum payload length is too small to allow any metrics to be written"
        );

        Self { max_payload_len, payloads_buf: Vec::new(), offsets: Vec::new() }
    }

    fn last_offset(&self) -> usize {
        self.offsets.last().copied().unwrap_or(0)
    }

    fn current_payload_len(&self) -> usize {
        self.payloads_buf.len() - self.last_offset()
    }

    fn finalize_current_payload(&mut self) {
        if self.current_payload_len() == 0 {
            return;
        }

        self.offsets.push(self.payloads_buf.len());
    }

    /// Writes a single line.
    ///
    /// Returns `false` if the line was dropped for being larger than the maximum payload length.
    pub fn write_line(&mut self, line: &str) -> bool {
        if line.len() > self.max_payload_len {
            return false;
        }

        // Account for the newline separator when the current payload already holds a line.
        let current_payload_len = self.current_payload_len();
        if current_payload_len > 0 && current_payload_len + 1 + line.len() > self.max_payload_len {
            self.finalize_current_payload();
        }

        if self.current_payload_len() > 0 {
            self.payloads_buf.push(b'\n');
        }
        self.payloads_buf.extend_from_slice(line.as_bytes());

        true
    }

    /// Writes all of the given lines, in order.
    pub fn write_lines<'a, I>(&mut self, lines: I) -> WriteResult
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut result = WriteResult::default();
        for line in lines {
            result.track(self.write_line(line));
        }
        result
    }

    /// Returns a consuming iterator over all payloads written by this writer.
    ///
    /// Payloads are yielded in the order they were written, and are cleared from the writer once the iterator is
    /// dropped.
    pub fn payloads(&mut self) -> Payloads<'_> {
        self.finalize_current_payload();
        Payloads::new(&mut self.payloads_buf, &mut self.offsets)
    }
}

/// Iterator over all payloads written by a `PayloadWriter`.
pub(crate) struct Payloads<'a> {
    payloads_buf: ConsumingBufferSwap<'a, u8>,
    start: usize,
    offsets: Drain<'a, usize>,
}

impl<'a> Payloads<'a> {
    fn new(payloads_buf: &'a mut Vec<u8>, offsets: &'a mut Vec<usize>) -> Self {
        Self { payloads_buf: ConsumingBufferSwap::new(payloads_buf), start: 0, offsets: offsets.drain(..) }
    }

    /// Returns the number of remaining payloads.
    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    /// Returns the next payload, or `None` once every payload has been returned.
    pub fn next_payload(&mut self) -> Option<&[u8]> {
        let offset = self.offsets.next()?;

        let payload = &self.payloads_buf[self.start..offset];
        self.start = offset;

        Some(payload)
    }
}

// Takes the buffer out of the writer for the lifetime of `Payloads`, so the writer is already empty even if the
// iterator is leaked, and hands the (cleared) allocation back on drop.
struct ConsumingBufferSwap<'a, T> {
    source: &'a mut Vec<T>,
    original: Vec<T>,
}

impl<'a, T> ConsumingBufferSwap<'a, T> {
    fn new(source: &'a mut Vec<T>) -> Self {
        let original = std::mem::take(source);
        Self { source, original }
    }
}

impl<T> Drop for ConsumingBufferSwap<'_, T> {
    fn drop(&mut self) {
        self.original.clear();
        std::mem::swap(self.source, &mut self.original);
    }
}

impl<T> Deref for ConsumingBufferSwap<'_, T> {
    type Target = Vec<T>;

    fn deref(&self) -> &Self::Target {
        &self.original
    }
}
