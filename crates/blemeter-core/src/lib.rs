//! Core library for Bluetooth LCD-mirror meters.
//!
//! Cheap multimeters, light meters, thermometers and scales stream a copy of
//! their display over BLE notifications. This crate turns those frames into
//! readings and keeps any number of meters connected at once.
//!
//! # Features
//!
//! - **Decoding**: one table-driven engine for every supported model
//! - **Discovery**: recognise meters by advertised name and address prefix
//! - **Connection management**: per-device state machine with liveness
//!   watchdog, polling and unbounded reconnects
//! - **Serialised handshakes**: at most one device connects at a time
//! - **Reading stream**: live iteration or periodic batches with statistics
//! - **Testing**: an in-memory [`MockTransport`] in place of Bluetooth
//!
//! # Supported Models
//!
//! | Model | Kind |
//! |-------|------|
//! | TS04 | Multimeter |
//! | HP90EPD (90EPD) | Multimeter |
//! | AN9002 (ZT300AB), V05B (ZT5B) | Multimeter |
//! | BT7200_APP | Multimeter |
//! | WT81B | Light meter (polled) |
//! | UT383BT | Light meter |
//! | BT980D | IR thermometer (polled) |
//! | BT985C_APP | IR thermometer (polled) |
//! | TP357 | Thermometer / hygrometer |
//! | TS02 | Angle finder |
//! | K1705 | Kitchen scale |
//!
//! # Quick Start
//!
//! ```no_run
//! use blemeter_core::{
//!     BleTransport, ConnectionConfig, DeviceConfig, DeviceRegistry, Session, SessionOptions,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut registry = DeviceRegistry::new();
//!     registry.register(DeviceConfig::for_model("AN9002", "FC:58:FA:12:34:56")?.alias("supply"));
//!
//!     let (handle, mut stream) = Session::start_with(registry, SessionOptions::default(), || {
//!         BleTransport::new(ConnectionConfig::default())
//!     })?;
//!
//!     while let Some(reading) = stream.next().await {
//!         if let Some(m) = &reading.measurement {
//!             println!("{} {}", reading.address, m);
//!         }
//!     }
//!     handle.shutdown().await?;
//!     Ok(())
//! }
//! ```

pub mod connection;
pub mod decoder;
pub mod device;
pub mod discovery;
pub mod error;
pub mod gate;
pub mod mock;
pub mod registry;
pub mod scan;
pub mod session;
pub mod stats;
pub mod stream;
pub mod traits;
pub mod util;

pub use connection::{ConnectionState, DeviceOutcome, DeviceTask};
pub use decoder::{
    DecodeOutput, Decoder, MODEL_ALIASES, MODEL_NAMES, ModelConfig, canonical_model,
};
pub use device::{BleLink, BleTransport, ConnectionConfig};
pub use discovery::{KNOWN_DEVICES, KnownDevice, MeterMatch, match_meters};
pub use error::{DeviceNotFoundReason, Error, Result};
pub use gate::AdmissionGate;
pub use mock::{MockLink, MockTransport, WrittenMessage};
pub use registry::{DeviceConfig, DeviceRegistry, LastSeen};
pub use session::{DeviceReport, Orchestrator, Session, SessionHandle, SessionOptions};
pub use stats::{Statistics, aggregate};
pub use stream::{Batch, FlushOptions, LiveCounter, ReadingSink, ReadingStream, reading_channel};
pub use traits::{Advertisement, Link, NotificationCallback, Transport};
pub use util::{create_identifier, format_peripheral_id};

// Re-export from blemeter-types
pub use blemeter_types::uuid as uuids;
pub use blemeter_types::{DecodedLcd, Measurement, MessageSpec, ParseError, Reading, base_unit};
