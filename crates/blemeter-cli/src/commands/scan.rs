//! Scan command implementation.

use std::time::Duration;

use anyhow::{Context, Result};
use tracing::info;

use blemeter_core::{BleTransport, ConnectionConfig, MeterMatch, Transport, match_meters};

/// Scan for `duration` and keep only recognised meters.
pub async fn detect_meters(duration: Duration) -> Result<Vec<MeterMatch>> {
    let transport = BleTransport::new(ConnectionConfig::default())
        .await
        .context("Failed to open Bluetooth adapter")?;
    info!("Scanning for meters for {}s", duration.as_secs());
    let advertisements = transport
        .scan(duration)
        .await
        .context("Failed to scan for devices")?;
    Ok(match_meters(&advertisements))
}

/// Render scan matches as a table.
pub fn format_matches(meters: &[MeterMatch]) -> String {
    if meters.is_empty() {
        return "No supported meters found.\n".to_string();
    }
    let mut out = format!("{:<20} {:<12} {:<24} {}\n", "ADDRESS", "MODEL", "NAME", "RSSI");
    for meter in meters {
        let adv = &meter.advertisement;
        out.push_str(&format!(
            "{:<20} {:<12} {:<24} {}\n",
            adv.address,
            meter.model,
            adv.name.as_deref().unwrap_or("-"),
            adv.rssi.map_or_else(|| "-".to_string(), |r| format!("{} dBm", r)),
        ));
    }
    out
}

pub async fn cmd_scan(timeout: u64, quiet: bool) -> Result<()> {
    if !quiet {
        eprintln!("Scanning for {}s...", timeout);
    }
    let meters = detect_meters(Duration::from_secs(timeout)).await?;
    print!("{}", format_matches(&meters));
    Ok(())
}
