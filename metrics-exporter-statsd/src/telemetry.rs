use std::sync::atomic::{AtomicU64, Ordering};

/// Transport telemetry.
///
/// `TransportStats` tracks what happened to every line handed to the transport: whether it was sent, dropped because the
/// write failed, or never sent because it was sampled out. Counters only ever go up.
#[derive(Debug, Default)]
pub struct TransportStats {
    packets_sent: AtomicU64,
    packets_dropped: AtomicU64,
    bytes_sent: AtomicU64,
    bytes_dropped: AtomicU64,
    points_sampled_out: AtomicU64,
}

impl TransportStats {
    /// Number of payloads written in full.
    pub fn packets_sent(&self) -> u64 {
        self.packets_sent.load(Ordering::Relaxed)
    }

    /// Number of payloads that failed to send, or were only partially written.
    pub fn packets_dropped(&self) -> u64 {
        self.packets_dropped.load(Ordering::Relaxed)
    }

    /// Number of bytes in payloads written in full.
    pub fn bytes_sent(&self) -> u64 {
        self.bytes_sent.load(Ordering::Relaxed)
    }

    /// Number of bytes in payloads that failed to send.
    pub fn bytes_dropped(&self) -> u64 {
        self.bytes_dropped.load(Ordering::Relaxed)
    }

    /// Number of metrics skipped by the sampling decision.
    pub fn points_sampled_out(&self) -> u64 {
        self.points_sampled_out.load(Ordering::Relaxed)
    }

    pub(crate) fn track_packet_send_succeeded(&self, bytes_len: usize) {
        self.packets_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(bytes_len as u64, Ordering::Relaxed);
    }

    pub(crate) fn track_packet_send_failed(&self, bytes_len: usize) {
        self.packets_dropped.fetch_add(1, Ordering::Relaxed);
        self.bytes_dropped.fetch_add(bytes_len as u64, Ordering::Relaxed);
    }

    pub(crate) fn track_sampled_out(&self) {
        self.points_sampled_out.fetch_add(1, Ordering::Relaxed);
    }
}
