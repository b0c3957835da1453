//! Meter configuration file.
//!
//! ```toml
//! mode = "summary"      # or "live"
//! duration = "30s"      # seconds, "<n> minutes", or "manual"
//! format = "tsv"        # "csv", "unix" or "json"; also spelled `dialect`
//! columns = "timestamp name unit mean"
//!
//! [[meter]]
//! alias = "Supply voltage"
//! address = "FC:58:FA:12:34:56"
//! model = "AN9002"
//! recycle = false
//!
//! # typed in after every summary window
//! [[meter]]
//! alias = "Room temperature"
//! model = "keyboard"
//! unit = "celsius"
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::Deserialize;

use blemeter_core::{DeviceConfig, DeviceRegistry, canonical_model};

use crate::cli::RecordFormat;

/// What the log command writes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// One record per reading.
    #[default]
    Live,
    /// One statistics record per meter and unit for every window.
    Summary,
}

/// Length of a summary window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Window {
    Fixed(Duration),
    /// Until the user presses ENTER.
    Manual,
}

impl Default for Window {
    fn default() -> Self {
        Window::Fixed(Duration::from_secs(1))
    }
}

/// Parse `"manual"`, `"30"`, `"30s"`, `"2.5 minutes"`.
pub fn parse_window(text: &str) -> Result<Window> {
    let text = text.trim().to_lowercase();
    if text == "manual" {
        return Ok(Window::Manual);
    }
    let end = text
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(text.len());
    let number: f64 = text[..end]
        .parse()
        .with_context(|| format!("Invalid duration '{}'", text))?;
    let seconds = if text[end..].contains("minute") {
        number * 60.0
    } else {
        number
    };
    if !seconds.is_finite() || seconds <= 0.0 {
        bail!("Duration must be positive, got '{}'", text);
    }
    Ok(Window::Fixed(Duration::from_secs_f64(seconds)))
}

/// One `[[meter]]` table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MeterEntry {
    #[serde(default)]
    pub alias: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    pub model: String,
    #[serde(default)]
    pub recycle: bool,
    /// Unit of a keyboard meter.
    #[serde(default)]
    pub unit: Option<String>,
}

impl MeterEntry {
    /// A value typed in by hand rather than a Bluetooth device.
    pub fn is_keyboard(&self) -> bool {
        self.model.to_ascii_lowercase().starts_with("keyboard")
    }
}

/// A meter whose value is typed in after every summary window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyboardMeter {
    pub name: String,
    pub unit: String,
}

/// Either `"timestamp name mean"` or `["timestamp", "name", "mean"]`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawColumns {
    Words(String),
    List(Vec<String>),
}

impl RawColumns {
    fn into_vec(self) -> Vec<String> {
        match self {
            RawColumns::Words(text) => text.split_whitespace().map(String::from).collect(),
            RawColumns::List(list) => list,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    #[serde(default)]
    mode: Mode,
    #[serde(default)]
    duration: Option<String>,
    #[serde(default, alias = "dialect")]
    format: RecordFormat,
    #[serde(default)]
    columns: Option<RawColumns>,
    #[serde(default, rename = "meter")]
    meters: Vec<MeterEntry>,
}

/// A validated configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub mode: Mode,
    pub window: Window,
    pub format: RecordFormat,
    /// Output columns; every field of the record layout when `None`.
    pub columns: Option<Vec<String>>,
    pub meters: Vec<MeterEntry>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mode: Mode::Live,
            window: Window::default(),
            format: RecordFormat::Tsv,
            columns: None,
            meters: Vec::new(),
        }
    }
}

impl Config {
    /// Default location, used when `--config` is not given and the file exists.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("blemeter")
            .join("meters.toml")
    }

    /// Read and validate a config file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Invalid config: {}", path.display()))
    }

    /// Parse and validate config text.
    pub fn parse(content: &str) -> Result<Self> {
        let raw: RawConfig = toml::from_str(content).context("Failed to parse TOML")?;
        let window = match raw.duration.as_deref() {
            Some(text) => parse_window(text)?,
            None => Window::default(),
        };
        for (index, meter) in raw.meters.iter().enumerate() {
            let name = meter.alias.clone().unwrap_or_else(|| format!("meter #{}", index + 1));
            if meter.is_keyboard() {
                if meter.alias.is_none() {
                    bail!("{} is a keyboard meter and needs an alias", name);
                }
                if meter.unit.as_deref().is_none_or(|u| u.trim().is_empty()) {
                    bail!("{} is a keyboard meter and needs a unit", name);
                }
                if meter.address.is_some() {
                    bail!("{} is a keyboard meter and cannot have an address", name);
                }
                continue;
            }
            if meter.address.as_deref().is_none_or(|a| a.trim().is_empty()) {
                bail!("{} has no address", name);
            }
            if canonical_model(&meter.model).is_none() {
                bail!("{} has unknown model '{}'", name, meter.model);
            }
        }
        let columns = raw.columns.map(RawColumns::into_vec);
        if columns.as_ref().is_some_and(Vec::is_empty) {
            bail!("columns must name at least one field");
        }
        Ok(Self {
            mode: raw.mode,
            window,
            format: raw.format,
            columns,
            meters: raw.meters,
        })
    }

    /// Meters typed in by hand, in config order.
    pub fn keyboard_meters(&self) -> Vec<KeyboardMeter> {
        self.meters
            .iter()
            .filter(|meter| meter.is_keyboard())
            .map(|meter| KeyboardMeter {
                name: meter.alias.clone().unwrap_or_default(),
                unit: meter.unit.clone().unwrap_or_default(),
            })
            .collect()
    }

    /// Register every configured Bluetooth meter.
    pub fn registry(&self) -> Result<DeviceRegistry> {
        let mut registry = DeviceRegistry::new();
        for meter in self.meters.iter().filter(|meter| !meter.is_keyboard()) {
            let address = meter.address.clone().unwrap_or_default();
            let mut device = DeviceConfig::for_model(&meter.model, address)?.recycle(meter.recycle);
            if let Some(alias) = &meter.alias {
                device = device.alias(alias);
            }
            registry.register(device);
        }
        Ok(registry)
    }
}
