//! Record formatting for the log command.
//!
//! Every record is a row of text cells. TSV and CSV write the cells
//! directly; JSON writes one object per line keyed by field name. Numbers
//! use four significant digits, and an overloaded reading is `+Infinity`.

use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde_json::{Map, Value};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use tracing::warn;

use blemeter_core::{DeviceConfig, Reading, Statistics};

use crate::cli::RecordFormat;

/// Columns of a live record.
pub const LIVE_FIELDS: &[&str] = &["timestamp", "model", "address", "name", "value", "unit"];

/// Columns of a summary record.
pub const SUMMARY_FIELDS: &[&str] = &[
    "timestamp",
    "duration",
    "model",
    "address",
    "name",
    "unit",
    "samples",
    "mean",
    "deviation",
    "minimum",
    "quartile1",
    "median",
    "quartile3",
    "maximum",
];

/// Format a number with four significant digits, `%g` style.
#[must_use]
pub fn format_number(value: f64) -> String {
    if value.is_nan() {
        return "NaN".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "+Infinity" } else { "-Infinity" }.to_string();
    }
    if value == 0.0 {
        return "0".to_string();
    }

    // exponent after rounding to four significant digits
    let scientific = format!("{:.3e}", value);
    let (mantissa, exponent) = scientific.split_once('e').unwrap_or((&scientific, "0"));
    let exponent: i32 = exponent.parse().unwrap_or(0);

    if (-4..4).contains(&exponent) {
        let decimals = (3 - exponent) as usize;
        trim_zeros(&format!("{:.*}", decimals, value))
    } else {
        let sign = if exponent < 0 { '-' } else { '+' };
        format!("{}e{}{:02}", trim_zeros(mantissa), sign, exponent.abs())
    }
}

fn trim_zeros(text: &str) -> String {
    if text.contains('.') {
        text.trim_end_matches('0').trim_end_matches('.').to_string()
    } else {
        text.to_string()
    }
}

/// RFC 3339 timestamp in UTC.
#[must_use]
pub fn format_timestamp(timestamp: OffsetDateTime) -> String {
    timestamp
        .format(&Rfc3339)
        .unwrap_or_else(|_| timestamp.to_string())
}

/// Escape a string for CSV output.
/// Wraps the value in quotes if it contains commas, quotes, or newlines.
/// Double quotes are escaped by doubling them.
#[must_use]
pub fn csv_escape(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') || s.contains('\r') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

fn csv_quote(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

fn tsv_escape(s: &str) -> String {
    s.replace(['\t', '\n', '\r'], " ")
}

/// Row for one reading, or `None` for frames that never decoded.
pub fn live_row(reading: &Reading, device: &DeviceConfig) -> Option<Vec<String>> {
    reading.lcd.as_ref()?;
    let (value, unit) = match &reading.measurement {
        Some(m) => (format_number(m.value), m.unit.clone()),
        None => (String::new(), String::new()),
    };
    Some(vec![
        format_timestamp(reading.timestamp),
        device.model().to_string(),
        reading.address.clone(),
        device.display_name().to_string(),
        value,
        unit,
    ])
}

/// Row for one statistics group.
pub fn summary_row(stats: &Statistics, device: Option<&DeviceConfig>) -> Vec<String> {
    let (model, name) = match device {
        Some(d) => (d.model(), d.display_name()),
        None => ("", stats.address.as_str()),
    };
    vec![
        format_timestamp(stats.timestamp),
        format_number(stats.duration),
        model.to_string(),
        stats.address.clone(),
        name.to_string(),
        stats.unit.clone(),
        stats.samples.to_string(),
        format_number(stats.mean),
        format_number(stats.deviation),
        format_number(stats.minimum),
        format_number(stats.quartile1),
        format_number(stats.median),
        format_number(stats.quartile3),
        format_number(stats.maximum),
    ]
}

/// Row for one value typed in for a keyboard meter, in summary layout.
pub fn keyboard_row(
    timestamp: OffsetDateTime,
    duration: f64,
    name: &str,
    unit: &str,
    value: &str,
) -> Vec<String> {
    let mut row = vec![String::new(); SUMMARY_FIELDS.len()];
    row[0] = format_timestamp(timestamp);
    row[1] = format_number(duration);
    row[2] = "keyboard".to_string();
    row[3] = "keyboard".to_string();
    row[4] = name.to_string();
    row[5] = unit.to_string();
    row[6] = "1".to_string();
    row[7] = value.to_string();
    row
}

/// Writes header and rows in one record format, flushing every row.
///
/// Rows are always built with every field of the layout; the writer
/// picks the selected columns out of them.
pub struct RecordWriter<W: Write> {
    out: W,
    format: RecordFormat,
    columns: Vec<String>,
    /// Position of each column in a full row; `None` writes an empty cell.
    picks: Vec<Option<usize>>,
}

impl<W: Write> RecordWriter<W> {
    pub fn new<S: AsRef<str>>(out: W, format: RecordFormat, fields: &[S]) -> Self {
        let columns: Vec<String> = fields.iter().map(|f| f.as_ref().to_string()).collect();
        let picks = (0..columns.len()).map(Some).collect();
        Self {
            out,
            format,
            columns,
            picks,
        }
    }

    /// Write only `columns`, in that order.
    ///
    /// Names outside the layout are kept as always-empty columns.
    #[must_use]
    pub fn select(mut self, columns: &[String]) -> Self {
        let picks = columns
            .iter()
            .map(|name| {
                let index = self.columns.iter().position(|field| field == name);
                if index.is_none() {
                    warn!("Column '{}' is not a record field and stays empty", name);
                }
                index
            })
            .collect();
        self.picks = picks;
        self.columns = columns.to_vec();
        self
    }

    /// Column names; JSON lines have none.
    pub fn write_header(&mut self) -> Result<()> {
        if self.format == RecordFormat::Json {
            return Ok(());
        }
        let line = self.line(&self.columns)?;
        self.emit(&line)
    }

    pub fn write_row(&mut self, cells: &[String]) -> Result<()> {
        let picked: Vec<String> = self
            .picks
            .iter()
            .map(|pick| pick.and_then(|i| cells.get(i)).cloned().unwrap_or_default())
            .collect();
        let line = self.line(&picked)?;
        self.emit(&line)
    }

    fn line(&self, cells: &[String]) -> Result<String> {
        let line = match self.format {
            RecordFormat::Tsv => cells
                .iter()
                .map(|c| tsv_escape(c))
                .collect::<Vec<_>>()
                .join("\t"),
            RecordFormat::Csv => cells
                .iter()
                .map(|c| csv_escape(c))
                .collect::<Vec<_>>()
                .join(","),
            RecordFormat::Unix => cells
                .iter()
                .map(|c| csv_quote(c))
                .collect::<Vec<_>>()
                .join(","),
            RecordFormat::Json => {
                let object: Map<String, Value> = self
                    .columns
                    .iter()
                    .zip(cells)
                    .map(|(field, cell)| (field.clone(), Value::String(cell.clone())))
                    .collect();
                serde_json::to_string(&object).context("Failed to serialize record")?
            }
        };
        Ok(line)
    }

    fn emit(&mut self, line: &str) -> Result<()> {
        writeln!(self.out, "{}", line).context("Failed to write record")?;
        self.out.flush().context("Failed to flush output")?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

/// Summary means pivoted to one row per window and one column per
/// `name (unit)`, for pasting into a spreadsheet.
#[derive(Debug, Default)]
pub struct SimpleSummary {
    rows: BTreeMap<String, BTreeMap<String, String>>,
    headers: BTreeSet<String>,
}

impl SimpleSummary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the mean out of a full summary row.
    pub fn add(&mut self, row: &[String]) {
        let [timestamp, name, unit, mean] =
            [0, 4, 5, 7].map(|i| row.get(i).cloned().unwrap_or_default());
        let header = format!("{} ({})", name, unit);
        self.headers.insert(header.clone());
        self.rows.entry(timestamp).or_default().insert(header, mean);
    }

    /// `timestamp` plus the sorted headers, then one row per timestamp in order.
    pub fn write<W: Write>(&self, out: W, format: RecordFormat) -> Result<W> {
        let mut fields = vec!["timestamp".to_string()];
        fields.extend(self.headers.iter().cloned());
        let mut writer = RecordWriter::new(out, format, fields.as_slice());
        writer.write_header()?;
        for (timestamp, means) in &self.rows {
            let row: Vec<String> = fields
                .iter()
                .map(|field| match field.as_str() {
                    "timestamp" => timestamp.clone(),
                    header => means.get(header).cloned().unwrap_or_default(),
                })
                .collect();
            writer.write_row(&row)?;
        }
        Ok(writer.into_inner())
    }

    /// Write next to the log as `simple <file name>`.
    pub fn write_beside(&self, log: &Path, format: RecordFormat) -> Result<PathBuf> {
        let path = simple_path(log)?;
        let file = File::create(&path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        self.write(file, format)?;
        Ok(path)
    }
}

/// `dir/log.tsv` becomes `dir/simple log.tsv`.
pub fn simple_path(log: &Path) -> Result<PathBuf> {
    let name = log
        .file_name()
        .with_context(|| format!("{} has no file name", log.display()))?;
    let mut simple = std::ffi::OsString::from("simple ");
    simple.push(name);
    Ok(log.with_file_name(simple))
}

/// The live counter line shown on stderr while logging to a file.
///
/// Shrinks itself to `width` by narrowing separators and dropping vowels,
/// then pads so it overwrites the previous line completely.
#[must_use]
pub fn status_line(seconds: u64, counts: &[(String, u64)], width: usize) -> String {
    let mut report = format!("seconds: {}", seconds);
    for (label, count) in counts {
        report.push_str(&format!("    {}: {}", label, count));
    }
    for (long, short) in [("    ", "  "), ("u", ""), ("o", ""), ("e", ""), ("a", ""), ("i", "")] {
        if report.chars().count() < width {
            break;
        }
        report = report.replace(long, short);
    }
    let len = report.chars().count();
    if len < width {
        report.push_str(&" ".repeat(width - len));
    }
    report
}
