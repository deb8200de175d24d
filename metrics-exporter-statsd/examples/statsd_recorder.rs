use std::time::Duration;

use metrics::{counter, gauge, histogram};
use metrics_exporter_statsd::StatsdBuilder;

fn main() {
    tracing_subscriber::fmt().with_max_level(tracing::Level::TRACE).init();

    StatsdBuilder::default()
        .with_remote_address("localhost:9125")
        .expect("failed to parse remote address")
        .with_prefix("demo")
        .install()
        .expect("failed to install statsd recorder");

    counter!("idle_metric").increment(1);
    gauge!("testing").set(42.0);

    let server_loops = counter!("tcp_server_loops", "system" => "foo");
    let server_loops_delta_secs = histogram!("tcp_server_loop_delta_secs", "system" => "foo");

    // Loop over and over, pretending to do some work.
    loop {
        server_loops.increment(1);
        server_loops_delta_secs.record(rand::random::<f64>());

        let gauge = gauge!("lucky_iterations");
        if rand::random_bool(0.75) {
            gauge.increment(1.0);
        } else {
            gauge.decrement(1.0);
        }

        std::thread::sleep(Duration::from_millis(250));
    }
}
