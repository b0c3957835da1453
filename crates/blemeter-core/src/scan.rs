//! Bluetooth adapter access and scanning.

use std::time::Duration;

use btleplug::api::{Central, Manager as _, Peripheral as _, ScanFilter};
use btleplug::platform::{Adapter, Manager, Peripheral};
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::error::{DeviceNotFoundReason, Error, Result};
use crate::traits::Advertisement;
use crate::util::{addresses_match, create_identifier, format_peripheral_id};

/// Scan attempts made by [`find_peripheral`] before giving up.
const FIND_ATTEMPTS: u32 = 3;

/// Get the first available Bluetooth adapter.
pub async fn get_adapter() -> Result<Adapter> {
    let manager = Manager::new().await?;
    let adapters = manager.adapters().await?;

    adapters
        .into_iter()
        .next()
        .ok_or(Error::DeviceNotFound(DeviceNotFoundReason::NoAdapter))
}

/// Listen for advertisements for `duration` and report everything seen.
///
/// Peripherals without properties are skipped. An empty list is not an
/// error.
pub async fn scan_with_adapter(adapter: &Adapter, duration: Duration) -> Result<Vec<Advertisement>> {
    info!("Scanning for {} seconds...", duration.as_secs());

    adapter.start_scan(ScanFilter::default()).await?;
    sleep(duration).await;
    adapter.stop_scan().await?;

    let mut seen = Vec::new();
    for peripheral in adapter.peripherals().await? {
        match peripheral.properties().await {
            Ok(Some(props)) => {
                let address = props.address.to_string();
                seen.push(Advertisement {
                    address: create_identifier(&address, &peripheral.id()),
                    name: props.local_name,
                    rssi: props.rssi,
                });
            }
            Ok(None) => {}
            Err(e) => debug!("Error reading peripheral properties: {}", e),
        }
    }

    info!("Scan complete. Saw {} device(s)", seen.len());
    Ok(seen)
}

/// Find a peripheral by address or peripheral ID.
///
/// Checks peripherals the adapter already knows first, then scans up to
/// three times with growing windows (`scan_time`, at least 2 s, times the
/// attempt number).
pub async fn find_peripheral(
    adapter: &Adapter,
    identifier: &str,
    scan_time: Duration,
) -> Result<Peripheral> {
    if let Some(peripheral) = known_peripheral(adapter, identifier).await? {
        debug!("Found {} in cache (no scan needed)", identifier);
        return Ok(peripheral);
    }

    let base = scan_time.max(Duration::from_secs(2));
    for attempt in 1..=FIND_ATTEMPTS {
        let window = base * attempt;
        debug!(
            "Scan attempt {}/{} for {} ({}s)",
            attempt,
            FIND_ATTEMPTS,
            identifier,
            window.as_secs()
        );

        adapter.start_scan(ScanFilter::default()).await?;
        sleep(window).await;
        adapter.stop_scan().await?;

        if let Some(peripheral) = known_peripheral(adapter, identifier).await? {
            return Ok(peripheral);
        }
    }

    warn!(
        "Device not found after {} attempts: {}",
        FIND_ATTEMPTS, identifier
    );
    Err(Error::device_not_found(identifier))
}

async fn known_peripheral(adapter: &Adapter, identifier: &str) -> Result<Option<Peripheral>> {
    let wanted = identifier.to_lowercase();
    for peripheral in adapter.peripherals().await? {
        // macOS connects by peripheral UUID
        if format_peripheral_id(&peripheral.id()).to_lowercase() == wanted {
            return Ok(Some(peripheral));
        }
        if let Ok(Some(props)) = peripheral.properties().await
            && addresses_match(&props.address.to_string(), identifier)
        {
            return Ok(Some(peripheral));
        }
    }
    Ok(None)
}
