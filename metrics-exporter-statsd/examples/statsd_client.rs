use std::time::Duration;

use metrics_exporter_statsd::{Metrics, SampleRate, StatsdBuilder};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().with_max_level(tracing::Level::TRACE).init();

    let namespaces = StatsdBuilder::default()
        .with_remote_address("localhost:9125")?
        .with_write_timeout(Duration::from_millis(100))
        .with_prefix("demo")
        .build_namespaces()?;
    let stats = namespaces.get("Stats").ok_or("missing default namespace")?;

    stats.deploy(Some("demo"))?;

    let sampled = SampleRate::new(0.5)?;
    for iteration in 0u64..20 {
        let took_a_while = stats.time(["work", "iteration"], || {
            std::thread::sleep(Duration::from_millis(10 * (iteration % 5)));
            iteration % 5 > 2
        })?;
        stats.increment_on("work.slow", took_a_while)?;
        stats.sampled(sampled).increment("work.sampled")?;

        stats.bulk(|batch| {
            let _ = batch.gauge("work.iteration", iteration);
            let _ = batch.histogram(["work", "size"], iteration * 3);
        });
    }

    let telemetry = stats.stats();
    println!(
        "sent {} packets ({} bytes), dropped {}, sampled out {}",
        telemetry.packets_sent(),
        telemetry.bytes_sent(),
        telemetry.packets_dropped(),
        telemetry.points_sampled_out()
    );

    Ok(())
}
