//! Log command implementation.
//!
//! Connects to every configured meter, waits until each one reports, then
//! writes either one record per reading (live mode) or one statistics
//! record per meter and unit for every window (summary mode) until ^C.
//!
//! In summary mode keyboard meters are asked for after every window, and
//! a log file gets a `simple <file>` companion with one column of means
//! per meter and unit.

use std::fs::File;
use std::io::{self, BufRead, Write};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior, interval, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use blemeter_core::{
    Batch, BleTransport, ConnectionConfig, DeviceOutcome, DeviceRegistry, FlushOptions,
    LiveCounter, Reading, ReadingStream, Session, SessionOptions, aggregate,
};

use super::{detect_meters, terminal_width};
use crate::cli::LogArgs;
use crate::config::{Config, KeyboardMeter, MeterEntry, Mode, Window};
use crate::format::{
    LIVE_FIELDS, RecordWriter, SUMMARY_FIELDS, SimpleSummary, keyboard_row, live_row,
    status_line, summary_row,
};

const AUTO_DETECT_SCAN: Duration = Duration::from_secs(10);
const WAIT_FOR_METERS: Duration = Duration::from_secs(30);
const STATUS_INTERVAL: Duration = Duration::from_secs(1);

pub async fn cmd_log(args: LogArgs, quiet: bool) -> Result<()> {
    if let Some(path) = &args.output
        && path.exists()
    {
        bail!("{} already exists, refusing to overwrite it", path.display());
    }

    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => {
            let default = Config::default_path();
            if default.exists() {
                info!("Using config {}", default.display());
                Config::load(&default)?
            } else {
                detect_config(quiet).await?
            }
        }
    };
    if let Some(format) = args.format {
        config.format = format;
    }

    let registry = config.registry()?;
    if registry.is_empty() {
        bail!("No meters configured");
    }
    let addresses: Vec<String> = registry.iter().map(|d| d.address.clone()).collect();
    let devices = registry.clone();

    let (handle, mut stream) =
        Session::start_with(registry, SessionOptions::default(), || {
            BleTransport::new(ConnectionConfig::default())
        })
        .context("Failed to start logging session")?;
    let cancel = handle.cancel_token();
    spawn_ctrl_c(cancel.clone());

    if !quiet {
        eprintln!("Waiting for meters....");
    }
    let missing = stream.wait_for_devices(&addresses, WAIT_FOR_METERS).await;
    let result = if cancel.is_cancelled() {
        Ok(())
    } else if !missing.is_empty() {
        for address in &addresses {
            if missing.contains(address)
                && let Some(device) = devices.get(address)
            {
                eprintln!(
                    "No data from {} ({} at {})",
                    device.display_name(),
                    device.model(),
                    address
                );
            }
        }
        Err(anyhow::anyhow!("Not every meter is reporting"))
    } else {
        if !quiet {
            eprintln!("Connected to meters.");
        }
        let mut recorder = Recorder::new(&devices, cancel.clone());
        recorder.status = (args.output.is_some() && !quiet)
            .then(|| StatusLine::new(Arc::clone(stream.counter())));
        record(recorder, &config, args.output.as_deref(), &mut stream).await
    };

    cancel.cancel();
    let reports = handle.shutdown().await?;
    result?;

    let failures: Vec<String> = reports
        .into_iter()
        .filter_map(|report| match report.outcome {
            DeviceOutcome::Failed(e) => Some(format!("{}: {}", report.address, e)),
            DeviceOutcome::Stopped => None,
        })
        .collect();
    if !failures.is_empty() {
        bail!("Logging stopped by a device failure:\n  {}", failures.join("\n  "));
    }
    Ok(())
}

/// Build a config from whatever meters are advertising nearby.
async fn detect_config(quiet: bool) -> Result<Config> {
    if !quiet {
        eprintln!("No config file, scanning for meters....");
    }
    let meters = detect_meters(AUTO_DETECT_SCAN).await?;
    if meters.is_empty() {
        bail!("No supported meters found");
    }
    let meters = meters
        .into_iter()
        .map(|m| MeterEntry {
            alias: m.advertisement.name.clone(),
            address: Some(m.advertisement.address),
            model: m.model.to_string(),
            recycle: false,
            unit: None,
        })
        .collect();
    Ok(Config {
        meters,
        ..Config::default()
    })
}

fn spawn_ctrl_c(cancel: CancellationToken) {
    tokio::spawn(async move {
        tokio::select! {
            _ = cancel.cancelled() => {}
            signal = tokio::signal::ctrl_c() => {
                if signal.is_ok() {
                    eprintln!("\nCleaning up connections.  Please wait....");
                }
                cancel.cancel();
            }
        }
    });
}

async fn record(
    mut recorder: Recorder<'_>,
    config: &Config,
    output: Option<&Path>,
    stream: &mut ReadingStream,
) -> Result<()> {
    let out: Box<dyn Write + Send> = match output {
        Some(path) => Box::new(
            File::create_new(path)
                .with_context(|| format!("Failed to create {}", path.display()))?,
        ),
        None => Box::new(io::stdout()),
    };
    let keyboard = config.keyboard_meters();

    let window = match config.mode {
        Mode::Live => {
            if !keyboard.is_empty() {
                warn!("Keyboard meters are only asked for in summary mode");
            }
            let writer = record_writer(out, config, LIVE_FIELDS);
            return recorder.live(stream, writer).await;
        }
        Mode::Summary => config.window,
    };

    let writer = record_writer(out, config, SUMMARY_FIELDS);
    recorder.keyboard = keyboard.into_iter().map(KeyboardEntry::new).collect();
    if window == Window::Manual || !recorder.keyboard.is_empty() {
        recorder.input = Some(spawn_line_reader()?);
    }
    if output.is_some() {
        recorder.simple = Some(SimpleSummary::new());
    }
    match window {
        Window::Fixed(length) => recorder.fixed_windows(stream, writer, length).await?,
        Window::Manual => recorder.manual_windows(stream, writer).await?,
    }

    if let (Some(path), Some(simple)) = (output, recorder.simple.take()) {
        match simple.write_beside(path, config.format) {
            Ok(written) => info!("Simplified summary in {}", written.display()),
            Err(e) => warn!("Unable to produce simplified summary: {:#}", e),
        }
    }
    Ok(())
}

fn record_writer<W: Write>(out: W, config: &Config, fields: &[&str]) -> RecordWriter<W> {
    let writer = RecordWriter::new(out, config.format, fields);
    match &config.columns {
        Some(columns) => writer.select(columns),
        None => writer,
    }
}

/// Per-label counts on stderr, redrawn in place.
struct StatusLine {
    counter: Arc<LiveCounter>,
    started: Instant,
}

impl StatusLine {
    fn new(counter: Arc<LiveCounter>) -> Self {
        Self {
            counter,
            started: Instant::now(),
        }
    }

    fn restart(&mut self) {
        self.started = Instant::now();
    }

    fn show(&self) {
        let line = status_line(
            self.started.elapsed().as_secs(),
            &self.counter.snapshot(),
            terminal_width().saturating_sub(1),
        );
        eprint!("\r{}", line);
        io::stderr().flush().ok();
    }

    fn finish(&self) {
        eprintln!();
    }
}

/// Lines typed on stdin.
///
/// Read on a plain thread so a pending read never holds up runtime shutdown.
fn spawn_line_reader() -> Result<mpsc::UnboundedReceiver<String>> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::Builder::new()
        .name("blemeter-stdin".to_string())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if tx.send(line).is_err() {
                    break;
                }
            }
        })
        .context("Failed to start stdin reader")?;
    Ok(rx)
}

/// A keyboard meter and the value typed in last time.
struct KeyboardEntry {
    meter: KeyboardMeter,
    previous: Option<String>,
}

impl KeyboardEntry {
    fn new(meter: KeyboardMeter) -> Self {
        Self {
            meter,
            previous: None,
        }
    }

    fn prompt(&self) -> String {
        match &self.previous {
            Some(previous) => format!(
                "    {} in {} (blank to keep {}): ",
                self.meter.name, self.meter.unit, previous
            ),
            None => format!("    {} in {}: ", self.meter.name, self.meter.unit),
        }
    }

    /// A blank line keeps the previous value.
    fn accept(&mut self, line: &str) -> String {
        let typed = line.trim();
        let value = match &self.previous {
            Some(previous) if typed.is_empty() => previous.clone(),
            _ => typed.to_string(),
        };
        self.previous = Some(value.clone());
        value
    }
}

struct Recorder<'a> {
    devices: &'a DeviceRegistry,
    cancel: CancellationToken,
    status: Option<StatusLine>,
    warned_auto_off: bool,
    /// Needed for manual windows and keyboard meters.
    input: Option<mpsc::UnboundedReceiver<String>>,
    keyboard: Vec<KeyboardEntry>,
    simple: Option<SimpleSummary>,
}

impl<'a> Recorder<'a> {
    fn new(devices: &'a DeviceRegistry, cancel: CancellationToken) -> Self {
        Self {
            devices,
            cancel,
            status: None,
            warned_auto_off: false,
            input: None,
            keyboard: Vec::new(),
            simple: None,
        }
    }

    /// Warn the first time any meter shows auto power off; true if it warned now.
    fn check_auto_off(&mut self, reading: &Reading) -> bool {
        if self.warned_auto_off {
            return false;
        }
        if reading.lcd.as_ref().is_some_and(|lcd| lcd.has("auto_off")) {
            let name = self
                .devices
                .get(&reading.address)
                .map_or(reading.address.as_str(), |d| d.display_name());
            warn!(
                "{} has auto power off enabled and may switch itself off; see `blemeter --help`",
                name
            );
            self.warned_auto_off = true;
        }
        self.warned_auto_off
    }

    fn show_status(&self) {
        if let Some(status) = &self.status {
            status.show();
        }
    }

    fn finish_status(&self) {
        if let Some(status) = &self.status {
            status.finish();
        }
    }

    /// One record per decoded reading until the stream ends.
    async fn live<W: Write>(
        &mut self,
        stream: &mut ReadingStream,
        mut writer: RecordWriter<W>,
    ) -> Result<()> {
        writer.write_header()?;
        let mut ticker = interval(STATUS_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                reading = stream.next() => {
                    let Some(reading) = reading else { break };
                    self.check_auto_off(&reading);
                    let row = self
                        .devices
                        .get(&reading.address)
                        .and_then(|device| live_row(&reading, device));
                    if let Some(row) = row {
                        writer.write_row(&row)?;
                    }
                }
                _ = ticker.tick(), if self.status.is_some() => self.show_status(),
            }
        }
        self.finish_status();
        Ok(())
    }

    fn summarize(
        &self,
        stream: &mut ReadingStream,
        options: FlushOptions,
    ) -> (Batch, Vec<Vec<String>>) {
        let batch = stream.flush(options);
        let rows = aggregate(&batch)
            .iter()
            .map(|stats| summary_row(stats, self.devices.get(&stats.address).map(Arc::as_ref)))
            .collect();
        (batch, rows)
    }

    fn write_rows<W: Write>(
        &mut self,
        writer: &mut RecordWriter<W>,
        rows: Vec<Vec<String>>,
    ) -> Result<()> {
        for row in rows {
            writer.write_row(&row)?;
            if let Some(simple) = &mut self.simple {
                simple.add(&row);
            }
        }
        Ok(())
    }

    /// Statistics of one window, then the keyboard meters.
    ///
    /// False once cancelled or stdin is closed during the prompts.
    async fn write_window<W: Write>(
        &mut self,
        writer: &mut RecordWriter<W>,
        batch: &Batch,
        rows: Vec<Vec<String>>,
    ) -> Result<bool> {
        for reading in &batch.readings {
            self.check_auto_off(reading);
        }
        self.write_rows(writer, rows)?;
        if self.keyboard.is_empty() {
            return Ok(true);
        }

        eprintln!("Manual entries for previous data point:");
        let duration = batch.duration().as_secs_f64();
        for index in 0..self.keyboard.len() {
            eprint!("{}", self.keyboard[index].prompt());
            io::stderr().flush().ok();
            let Some(line) = self.next_line(false).await else {
                return Ok(false);
            };
            let entry = &mut self.keyboard[index];
            let value = entry.accept(&line);
            let row = keyboard_row(
                batch.stopped,
                duration,
                &entry.meter.name,
                &entry.meter.unit,
                &value,
            );
            self.write_rows(writer, vec![row])?;
        }
        eprintln!("Data point saved.");
        Ok(true)
    }

    /// Back-to-back windows of a fixed length; a window cut short by ^C is dropped.
    async fn fixed_windows<W: Write>(
        &mut self,
        stream: &mut ReadingStream,
        mut writer: RecordWriter<W>,
        window: Duration,
    ) -> Result<()> {
        writer.write_header()?;
        stream.flush(FlushOptions::discarding());
        let mut ticker = interval(STATUS_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut deadline = Instant::now() + window;
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = sleep_until(deadline) => {
                    let (batch, rows) =
                        self.summarize(stream, FlushOptions::default().reset_counter(false));
                    if !self.keyboard.is_empty() {
                        self.finish_status();
                    }
                    if !self.write_window(&mut writer, &batch, rows).await? {
                        break;
                    }
                    // typing can outlast a window; the next one starts afterwards
                    deadline = if self.keyboard.is_empty() {
                        deadline + window
                    } else {
                        Instant::now() + window
                    };
                }
                _ = ticker.tick(), if self.status.is_some() => self.show_status(),
            }
        }
        self.finish_status();
        Ok(())
    }

    /// Windows delimited by ENTER presses.
    async fn manual_windows<W: Write>(
        &mut self,
        stream: &mut ReadingStream,
        mut writer: RecordWriter<W>,
    ) -> Result<()> {
        writer.write_header()?;
        loop {
            eprintln!("Press ENTER to start logging a data point or control-C to exit.");
            if self.next_line(false).await.is_none() {
                break;
            }
            stream.flush(FlushOptions::discarding());
            if let Some(status) = &mut self.status {
                status.restart();
            }

            eprintln!("Press ENTER when the data point is complete.");
            let completed = self.next_line(true).await.is_some();
            self.finish_status();
            if !completed {
                break;
            }
            let (batch, rows) = self.summarize(stream, FlushOptions::default());
            if !self.write_window(&mut writer, &batch, rows).await? {
                break;
            }
        }
        Ok(())
    }

    /// The next line typed; `None` once cancelled or stdin is closed.
    async fn next_line(&mut self, show_status: bool) -> Option<String> {
        let input = self.input.as_mut()?;
        let mut ticker = interval(STATUS_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => return None,
                line = input.recv() => return line,
                _ = ticker.tick(), if show_status && self.status.is_some() => {
                    if let Some(status) = &self.status {
                        status.show();
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::RecordFormat;
    use blemeter_core::{DecodedLcd, DeviceConfig, Measurement, reading_channel};
    use time::OffsetDateTime;

    const ADDRESS: &str = "48:7E:48:00:00:01";

    fn registry() -> DeviceRegistry {
        let mut registry = DeviceRegistry::new();
        registry.register(DeviceConfig::for_model("TP357", ADDRESS).unwrap().alias("bench"));
        registry
    }

    fn reading(value: f64, lcd: Option<DecodedLcd>) -> Reading {
        Reading {
            timestamp: OffsetDateTime::now_utc(),
            address: ADDRESS.to_string(),
            lcd,
            measurement: Some(Measurement::new(value, "celsius")),
        }
    }

    fn room() -> KeyboardEntry {
        KeyboardEntry::new(KeyboardMeter {
            name: "room".into(),
            unit: "celsius".into(),
        })
    }

    fn cancel_after(cancel: &CancellationToken, after: Duration) {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(after).await;
            cancel.cancel();
        });
    }

    #[tokio::test(start_paused = true)]
    async fn test_live_writes_decoded_readings() {
        let devices = registry();
        let cancel = CancellationToken::new();
        let (sink, mut stream) = reading_channel(cancel.clone());
        sink.push("bench", reading(21.5, Some(DecodedLcd::default())));
        sink.push("bench", reading(0.0, None));
        sink.push("bench", reading(22.0, Some(DecodedLcd::default())));
        cancel_after(&cancel, Duration::from_secs(1));

        let mut out = Vec::new();
        {
            let writer = RecordWriter::new(&mut out, RecordFormat::Csv, LIVE_FIELDS);
            Recorder::new(&devices, cancel.clone())
                .live(&mut stream, writer)
                .await
                .unwrap();
        }
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "timestamp,model,address,name,value,unit");
        assert!(lines[1].ends_with(",TP357,48:7E:48:00:00:01,bench,21.5,celsius"));
        assert!(lines[2].ends_with(",bench,22,celsius"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_live_warns_about_auto_off_once() {
        let devices = registry();
        let cancel = CancellationToken::new();
        let (sink, mut stream) = reading_channel(cancel.clone());
        let mut lcd = DecodedLcd::default();
        lcd.set("auto_off");
        sink.push("bench", reading(21.5, Some(DecodedLcd::default())));
        sink.push("bench", reading(21.5, Some(lcd.clone())));
        sink.push("bench", reading(21.5, Some(lcd)));

        let mut recorder = Recorder::new(&devices, cancel.clone());
        let plain = stream.next().await.unwrap();
        assert!(!recorder.check_auto_off(&plain));
        assert!(!recorder.warned_auto_off);

        let first = stream.next().await.unwrap();
        assert!(recorder.check_auto_off(&first));
        assert!(recorder.warned_auto_off);

        let second = stream.next().await.unwrap();
        assert!(!recorder.check_auto_off(&second));
        assert!(recorder.warned_auto_off);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fixed_windows_write_statistics() {
        let devices = registry();
        let cancel = CancellationToken::new();
        let (sink, mut stream) = reading_channel(cancel.clone());

        let producer = sink.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            for value in [20.0, 21.0, 22.0] {
                producer.push("bench", reading(value, Some(DecodedLcd::default())));
            }
            tokio::time::sleep(Duration::from_secs(1)).await;
            producer.push("bench", reading(30.0, Some(DecodedLcd::default())));
        });
        cancel_after(&cancel, Duration::from_millis(2500));

        let mut out = Vec::new();
        {
            let writer = RecordWriter::new(&mut out, RecordFormat::Tsv, SUMMARY_FIELDS);
            Recorder::new(&devices, cancel.clone())
                .fixed_windows(&mut stream, writer, Duration::from_secs(1))
                .await
                .unwrap();
        }
        drop(sink);
        let text = String::from_utf8(out).unwrap();
        let rows: Vec<Vec<&str>> = text.lines().map(|l| l.split('\t').collect()).collect();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0][0], "timestamp");
        assert_eq!(&rows[1][2..8], ["TP357", ADDRESS, "bench", "celsius", "3", "21"]);
        assert_eq!(rows[1][9], "20");
        assert_eq!(rows[1][13], "22");
        assert_eq!(&rows[2][6..8], ["1", "30"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_manual_windows() {
        let devices = registry();
        let cancel = CancellationToken::new();
        let (sink, mut stream) = reading_channel(cancel.clone());
        let (enter_tx, enter_rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            // discarded: arrives before the window starts
            sink.push("bench", reading(99.0, Some(DecodedLcd::default())));
            tokio::time::sleep(Duration::from_millis(100)).await;
            enter_tx.send(String::new()).unwrap();
            tokio::time::sleep(Duration::from_millis(100)).await;
            sink.push("bench", reading(1.0, Some(DecodedLcd::default())));
            sink.push("bench", reading(3.0, Some(DecodedLcd::default())));
            tokio::time::sleep(Duration::from_millis(100)).await;
            enter_tx.send(String::new()).unwrap();
            tokio::time::sleep(Duration::from_millis(100)).await;
            // stdin closed
            drop(enter_tx);
        });

        let mut out = Vec::new();
        {
            let writer = RecordWriter::new(&mut out, RecordFormat::Csv, SUMMARY_FIELDS);
            let mut recorder = Recorder::new(&devices, cancel.clone());
            recorder.input = Some(enter_rx);
            recorder.manual_windows(&mut stream, writer).await.unwrap();
        }
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        let cells: Vec<&str> = lines[1].split(',').collect();
        assert_eq!(cells[6], "2");
        assert_eq!(cells[7], "2");
    }

    #[test]
    fn test_keyboard_entry_keeps_previous_on_blank() {
        let mut entry = room();
        assert_eq!(entry.prompt(), "    room in celsius: ");
        assert_eq!(entry.accept(" 21.5 \n"), "21.5");
        assert_eq!(entry.prompt(), "    room in celsius (blank to keep 21.5): ");
        assert_eq!(entry.accept(""), "21.5");
        assert_eq!(entry.accept("22"), "22");
    }

    #[tokio::test(start_paused = true)]
    async fn test_keyboard_values_follow_each_window() {
        let devices = registry();
        let cancel = CancellationToken::new();
        let (sink, mut stream) = reading_channel(cancel.clone());
        let (input_tx, input_rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            for typed in ["21.5", ""] {
                tokio::time::sleep(Duration::from_millis(100)).await;
                input_tx.send(String::new()).unwrap();
                tokio::time::sleep(Duration::from_millis(100)).await;
                sink.push("bench", reading(20.0, Some(DecodedLcd::default())));
                tokio::time::sleep(Duration::from_millis(100)).await;
                input_tx.send(String::new()).unwrap();
                tokio::time::sleep(Duration::from_millis(100)).await;
                input_tx.send(typed.to_string()).unwrap();
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
            drop(input_tx);
        });

        let mut out = Vec::new();
        let mut recorder = Recorder::new(&devices, cancel.clone());
        recorder.input = Some(input_rx);
        recorder.keyboard = vec![room()];
        recorder.simple = Some(SimpleSummary::new());
        {
            let writer = RecordWriter::new(&mut out, RecordFormat::Tsv, SUMMARY_FIELDS);
            recorder.manual_windows(&mut stream, writer).await.unwrap();
        }

        let text = String::from_utf8(out).unwrap();
        let rows: Vec<Vec<&str>> = text.lines().map(|l| l.split('\t').collect()).collect();
        assert_eq!(rows.len(), 5);
        assert_eq!(&rows[1][4..8], ["bench", "celsius", "1", "20"]);
        assert_eq!(&rows[2][2..8], ["keyboard", "keyboard", "room", "celsius", "1", "21.5"]);
        assert_eq!(rows[2][0], rows[1][0]);
        assert_eq!(&rows[3][4..8], ["bench", "celsius", "1", "20"]);
        // blank keeps the previous value
        assert_eq!(rows[4][7], "21.5");

        let simple = recorder.simple.take().unwrap();
        let pivot = String::from_utf8(simple.write(Vec::new(), RecordFormat::Tsv).unwrap()).unwrap();
        let lines: Vec<&str> = pivot.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "timestamp\tbench (celsius)\troom (celsius)");
        assert!(lines[1].ends_with("\t20\t21.5"));
        assert!(lines[2].ends_with("\t20\t21.5"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fixed_windows_stop_when_input_closes_mid_prompt() {
        let devices = registry();
        let cancel = CancellationToken::new();
        let (sink, mut stream) = reading_channel(cancel.clone());
        let (input_tx, input_rx) = mpsc::unbounded_channel::<String>();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            sink.push("bench", reading(20.0, Some(DecodedLcd::default())));
            tokio::time::sleep(Duration::from_millis(1400)).await;
            input_tx.send("7".to_string()).unwrap();
            tokio::time::sleep(Duration::from_secs(3)).await;
            drop(input_tx);
        });

        let mut out = Vec::new();
        let mut recorder = Recorder::new(&devices, cancel.clone());
        recorder.input = Some(input_rx);
        recorder.keyboard = vec![room()];
        {
            let writer = RecordWriter::new(&mut out, RecordFormat::Tsv, SUMMARY_FIELDS);
            recorder
                .fixed_windows(&mut stream, writer, Duration::from_secs(1))
                .await
                .unwrap();
        }
        assert!(!cancel.is_cancelled());

        let text = String::from_utf8(out).unwrap();
        let rows: Vec<Vec<&str>> = text.lines().map(|l| l.split('\t').collect()).collect();
        // first window and its typed value; the second window's prompt sees stdin close
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[1][4], "bench");
        assert_eq!(&rows[2][4..8], ["room", "celsius", "1", "7"]);
    }
}
