use std::{
    io,
    sync::{Arc, Mutex},
};

use quanta::Clock;

use crate::{
    client::StatsdClient,
    transport::{MetricSink, Sampler, Transport},
};

/// A sink that captures every payload it is handed.
#[derive(Clone, Default)]
pub struct CaptureSink {
    payloads: Arc<Mutex<Vec<String>>>,
    failing: bool,
}

impl CaptureSink {
    /// A sink that fails every write, capturing nothing.
    pub fn failing() -> Self {
        CaptureSink { payloads: Arc::default(), failing: true }
    }

    pub fn payloads(&self) -> Vec<String> {
        self.payloads.lock().unwrap().clone()
    }
}

impl MetricSink for CaptureSink {
    fn emit(&self, payload: &[u8]) -> io::Result<usize> {
        if self.failing {
            return Err(io::Error::new(io::ErrorKind::ConnectionRefused, "connection refused"));
        }

        self.payloads.lock().unwrap().push(String::from_utf8(payload.to_vec()).unwrap());
        Ok(payload.len())
    }
}

fn never_sampled() -> f64 {
    panic!("sampler should not be consulted for a rate of 1")
}

fn build(sink: &CaptureSink, prefix: Option<&str>, sampler: Sampler, clock: Clock) -> StatsdClient {
    let transport = Transport::new(Box::new(sink.clone()), sampler, 1432);
    StatsdClient::new(prefix.map(str::to_string), transport, clock)
}

pub fn client_with(sink: &CaptureSink, prefix: Option<&str>) -> StatsdClient {
    build(sink, prefix, never_sampled, Clock::new())
}

pub fn client_with_clock(sink: &CaptureSink, clock: Clock) -> StatsdClient {
    build(sink, None, never_sampled, clock)
}

pub fn client_with_sampler(sink: &CaptureSink, sampler: Sampler) -> StatsdClient {
    build(sink, None, sampler, Clock::new())
}
