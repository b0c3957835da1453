//! Example: Scanning for supported meters
//!
//! Listens for advertisements on the first Bluetooth adapter and reports
//! which of them look like supported meters.
//!
//! Run with: `cargo run --example scan_meters`

use std::time::Duration;

use blemeter_core::{BleTransport, ConnectionConfig, Transport, match_meters};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    println!("Scanning for meters...");
    let transport = BleTransport::new(ConnectionConfig::default()).await?;
    let advertisements = transport.scan(Duration::from_secs(10)).await?;
    let meters = match_meters(&advertisements);

    if meters.is_empty() {
        println!("No supported meters found among {} device(s).", advertisements.len());
        println!();
        println!("Make sure:");
        println!("  - The meter is switched on and its Bluetooth is enabled");
        println!("  - No phone app is holding the connection");
    } else {
        for meter in &meters {
            let adv = &meter.advertisement;
            println!(
                "  {} [{}] {}",
                adv.name.as_deref().unwrap_or("Unknown"),
                meter.model,
                adv.address
            );
        }
    }
    Ok(())
}
