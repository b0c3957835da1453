//! Example: Logging from simulated meters
//!
//! Runs a session against the in-memory mock transport, feeds it a few
//! thermometer frames, then prints the readings and their statistics.
//! No Bluetooth hardware is needed.
//!
//! Run with: `cargo run --example mock_session`

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use blemeter_core::{
    DeviceConfig, DeviceRegistry, FlushOptions, MockTransport, Orchestrator, SessionOptions,
    aggregate, reading_channel,
};

// 23.5 °C, 45 %RH
const TP357_FRAME: [u8; 7] = [0xC2, 0x00, 0x00, 0xEB, 0x00, 0x2D, 0x2C];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let mock = MockTransport::new();
    let address = MockTransport::random_address("48:7E:48:");

    let mut registry = DeviceRegistry::new();
    registry.register(DeviceConfig::for_model("TP357", address.as_str())?.alias("bench"));

    let cancel = CancellationToken::new();
    let (sink, mut stream) = reading_channel(cancel.clone());
    let orchestrator = Orchestrator::new(
        Arc::new(mock.clone()),
        registry,
        sink,
        cancel.clone(),
        SessionOptions::default(),
    );
    let session = tokio::spawn(orchestrator.run());

    tokio::time::sleep(Duration::from_secs(1)).await;
    for _ in 0..5 {
        mock.notify(&address, &TP357_FRAME);
        tokio::time::sleep(Duration::from_millis(200)).await;
    }

    let batch = stream.flush(FlushOptions::default());
    println!("Received {} reading(s):", batch.readings.len());
    for reading in &batch.readings {
        if let Some(m) = &reading.measurement {
            println!("  {} {} {}", reading.address, m.value, m.unit);
        }
    }
    for stats in aggregate(&batch) {
        println!(
            "{} {}: n={} mean={:.2} min={} max={}",
            stats.address, stats.unit, stats.samples, stats.mean, stats.minimum, stats.maximum
        );
    }

    cancel.cancel();
    for report in session.await? {
        println!("{}: {:?}", report.address, report.outcome);
    }
    Ok(())
}
