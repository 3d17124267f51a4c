use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use logger_core::capabilities::{
    Clock, ClockUnavailable, Display, Indicator, Input, SensorReader, Storage,
};
use logger_core::config::{LoggerConfig, SessionConfig};
use logger_core::console::commands::{
    self, BenchControls, CommandError, CommandExecutor, CommandOutcome,
};
use logger_core::console::grammar::{CardCommand, ClockCommand, SensorCommand};
use logger_core::controller::Logger;
use logger_core::status::{StatusFormatter, status_lines};
use logger_core::telemetry::EventId;
use logger_core::time::{CalendarTime, Instant};

/// Simulated time between dispatcher ticks.
pub const TICK: Duration = Duration::from_millis(10);

/// What the clock reads after losing power: 2000-01-01 00:00:00.
const POWER_LOSS_EPOCH: u32 = 946_684_800;

const DEFAULT_READING: (f32, f32) = (22.0, 40.0);

#[derive(Clone, Debug)]
pub struct SessionOptions {
    pub card_dir: PathBuf,
    pub dedup: bool,
    pub clock_healthy: bool,
    /// Transcript destination; `None` keeps the session unrecorded.
    pub transcript: Option<PathBuf>,
}

impl SessionOptions {
    pub fn new(card_dir: impl Into<PathBuf>) -> Self {
        Self {
            card_dir: card_dir.into(),
            dedup: false,
            clock_healthy: true,
            transcript: None,
        }
    }
}

/// Scripted bench setups whose transcripts are kept under `transcripts/`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TranscriptProfile {
    Logging,
    Recovery,
    Faults,
}

impl TranscriptProfile {
    pub fn tag(self) -> &'static str {
        match self {
            TranscriptProfile::Logging => "logging",
            TranscriptProfile::Recovery => "recovery",
            TranscriptProfile::Faults => "faults",
        }
    }

    pub fn log_path(self) -> PathBuf {
        PathBuf::from(format!("transcripts/emulator-{}.log", self.tag()))
    }

    /// Options for a fresh card directory and this profile's transcript.
    pub fn options(self) -> SessionOptions {
        let card = std::env::temp_dir().join(format!("logger-emulator-card-{}", self.tag()));
        SessionOptions {
            clock_healthy: self != TranscriptProfile::Recovery,
            transcript: Some(self.log_path()),
            ..SessionOptions::new(card)
        }
    }

    pub fn from_tag(tag: &str) -> Result<Self, String> {
        match tag.to_ascii_lowercase().as_str() {
            "logging" => Ok(TranscriptProfile::Logging),
            "recovery" => Ok(TranscriptProfile::Recovery),
            "faults" => Ok(TranscriptProfile::Faults),
            other => Err(format!("Unknown transcript profile `{other}`")),
        }
    }
}

pub type EmulatedLogger = Logger<SimClock, CardStorage, LcdMirror, BenchButton, SimSensor, LedIndicator>;

pub struct Session {
    executor: CommandExecutor<Bench>,
    transcript: Option<TranscriptLogger>,
    next_event: EventId,
    last_frame: String,
    led: bool,
    backlight: bool,
}

impl Session {
    pub fn new(options: &SessionOptions) -> io::Result<Self> {
        let config = LoggerConfig {
            session: SessionConfig::DEFAULT.with_dedup(options.dedup),
            ..LoggerConfig::DEFAULT
        };
        let logger = Logger::new(
            config,
            SimClock::new(options.clock_healthy),
            CardStorage::new(&options.card_dir)?,
            LcdMirror::default(),
            BenchButton::default(),
            SimSensor::default(),
        )
        .map_err(|error: ClockUnavailable| io::Error::other(error.to_string()))?
        .with_indicator(LedIndicator::default());

        let transcript = options
            .transcript
            .as_deref()
            .map(TranscriptLogger::new)
            .transpose()?;

        let mut session = Self {
            executor: CommandExecutor::new(Bench { logger, now_ms: 0 }),
            transcript,
            next_event: 0,
            last_frame: String::new(),
            led: false,
            backlight: false,
        };
        // Clock check, then the opening prompt.
        session.executor.bench_mut().advance(TICK * 2);
        let mut opening = Vec::new();
        session.collect_changes(&mut opening);
        session.record(TranscriptRole::Emulator, &opening)?;
        Ok(session)
    }

    #[cfg(test)]
    pub fn logger(&self) -> &EmulatedLogger {
        &self.executor.bench().logger
    }

    /// Simulated milliseconds since power-on.
    pub fn elapsed_ms(&self) -> u64 {
        self.executor.bench().now_ms
    }

    /// Runs one console line and returns the response lines.
    pub fn handle_command(&mut self, line: &str) -> io::Result<Vec<String>> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Ok(Vec::new());
        }
        self.record(TranscriptRole::Host, &[trimmed.to_string()])?;

        let mut lines = match self.executor.execute(trimmed) {
            Ok(CommandOutcome::Status) => status_lines(&self.executor.bench().logger.status()),
            Ok(CommandOutcome::Help(topic)) => {
                let mut text = String::new();
                // Writing into a String cannot fail.
                let _ = commands::write_help(&mut text, topic);
                text.lines().map(str::to_string).collect()
            }
            Ok(outcome) => vec![describe(&outcome)],
            Err(CommandError::Parse(err)) => vec![format!("ERR syntax {err}")],
            Err(CommandError::UnknownTopic(topic)) => {
                vec![format!("ERR no help for `{topic}`; try `help`")]
            }
            Err(CommandError::Bench(err)) => vec![format!("ERR bench {err}")],
        };

        self.collect_changes(&mut lines);
        self.record(TranscriptRole::Emulator, &lines)?;
        Ok(lines)
    }

    /// Appends new telemetry, display frames and indicator changes.
    fn collect_changes(&mut self, lines: &mut Vec<String>) {
        let logger = &self.executor.bench().logger;
        for record in logger.telemetry().since(self.next_event) {
            lines.push(format!(
                "EVT #{} +{}ms {}",
                record.id,
                record.timestamp.as_millis(),
                record.event
            ));
        }
        self.next_event = logger.telemetry().next_id();

        let snapshot = logger.status();
        let mut frame = String::new();
        let _ = StatusFormatter::new(&snapshot).write_screen_line(&mut frame);
        if frame != self.last_frame {
            lines.push(frame.clone());
            self.last_frame = frame;
        }

        let led = logger.indicator().on;
        if led != self.led {
            lines.push(format!("led {}", if led { "on" } else { "off" }));
            self.led = led;
        }

        let backlight = logger.display().backlight();
        if backlight != self.backlight {
            lines.push(format!("backlight {}", if backlight { "on" } else { "off" }));
            self.backlight = backlight;
        }
    }

    fn record(&mut self, role: TranscriptRole, lines: &[String]) -> io::Result<()> {
        let elapsed = self.elapsed_ms();
        if let Some(transcript) = self.transcript.as_mut() {
            for line in lines {
                transcript.append_line(elapsed, role, line)?;
            }
        }
        Ok(())
    }
}

fn describe(outcome: &CommandOutcome<'_>) -> String {
    match outcome {
        CommandOutcome::Button { down: true } => "OK button down".to_string(),
        CommandOutcome::Button { down: false } => "OK button up".to_string(),
        CommandOutcome::Clicked => "OK click".to_string(),
        CommandOutcome::Waited(duration) => format!("OK waited {}ms", duration.as_millis()),
        CommandOutcome::Sensor(SensorCommand::Reading {
            temperature_c,
            humidity_pct,
        }) => format!("OK sensor {temperature_c:.2}C {humidity_pct:.2}%RH"),
        CommandOutcome::Sensor(SensorCommand::Fail) => "OK sensor reads nan".to_string(),
        CommandOutcome::Clock(ClockCommand::Lose) => "OK clock lost power".to_string(),
        CommandOutcome::Clock(ClockCommand::Keep) => "OK clock healthy".to_string(),
        CommandOutcome::Card(CardCommand::Insert) => "OK card inserted".to_string(),
        CommandOutcome::Card(CardCommand::Eject) => "OK card ejected".to_string(),
        CommandOutcome::RecoveryWritten { record } => format!("OK recovery record \"{record}\""),
        CommandOutcome::Status | CommandOutcome::Help(_) => "OK".to_string(),
    }
}

/// Logger plus the simulated timeline the console advances.
pub struct Bench {
    logger: EmulatedLogger,
    now_ms: u64,
}

impl BenchControls for Bench {
    type Error = io::Error;

    fn tick_period(&self) -> Duration {
        TICK
    }

    fn set_button(&mut self, down: bool) {
        self.logger.input_mut().down = down;
    }

    fn advance(&mut self, duration: Duration) {
        let tick_ms = u64::try_from(TICK.as_millis()).unwrap_or(u64::MAX);
        let end = self
            .now_ms
            .saturating_add(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX));
        while self.now_ms < end {
            self.logger.clock_mut().elapsed_ms = self.now_ms;
            self.logger.tick(Instant::from_millis(self.now_ms));
            self.now_ms += tick_ms;
        }
    }

    fn set_sensor(&mut self, command: SensorCommand) {
        self.logger.sensor_mut().reading = match command {
            SensorCommand::Reading {
                temperature_c,
                humidity_pct,
            } => Some((temperature_c, humidity_pct)),
            SensorCommand::Fail => None,
        };
    }

    fn set_clock(&mut self, command: ClockCommand) {
        let clock = self.logger.clock_mut();
        match command {
            ClockCommand::Lose => clock.lose_power(),
            ClockCommand::Keep => clock.restore(),
        }
    }

    fn set_card(&mut self, command: CardCommand) {
        self.logger.storage_mut().inserted = command == CardCommand::Insert;
    }

    fn write_recovery_record(&mut self, record: &str) -> io::Result<()> {
        let name = self.logger.session().config().recovery_record;
        let storage = self.logger.storage_mut();
        let path = storage.path(name)?;
        fs::write(path, format!("{record}\n"))
    }
}

/// Calendar clock that follows host time until it is told to lose power.
#[derive(Debug)]
pub struct SimClock {
    base_epoch: u32,
    elapsed_ms: u64,
    healthy: bool,
}

impl SimClock {
    fn new(healthy: bool) -> Self {
        let mut clock = Self {
            base_epoch: 0,
            elapsed_ms: 0,
            healthy,
        };
        if healthy {
            clock.restore();
        } else {
            clock.lose_power();
        }
        clock
    }

    fn elapsed_secs(&self) -> u32 {
        u32::try_from(self.elapsed_ms / 1_000).unwrap_or(u32::MAX)
    }

    fn lose_power(&mut self) {
        self.base_epoch = POWER_LOSS_EPOCH.saturating_sub(self.elapsed_secs());
        self.healthy = false;
    }

    fn restore(&mut self) {
        self.base_epoch = host_epoch().saturating_sub(self.elapsed_secs());
        self.healthy = true;
    }
}

fn host_epoch() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(POWER_LOSS_EPOCH, |since| {
            u32::try_from(since.as_secs()).unwrap_or(u32::MAX)
        })
}

impl Clock for SimClock {
    fn probe(&mut self) -> Result<(), ClockUnavailable> {
        Ok(())
    }

    fn now(&mut self) -> u32 {
        self.base_epoch.saturating_add(self.elapsed_secs())
    }

    fn health_ok(&mut self) -> bool {
        self.healthy
    }

    fn adjust(&mut self, time: CalendarTime) {
        if let Some(epoch) = time.epoch_seconds() {
            self.base_epoch = epoch.saturating_sub(self.elapsed_secs());
            self.healthy = true;
        }
    }
}

/// Storage card backed by a host directory.
#[derive(Debug)]
pub struct CardStorage {
    root: PathBuf,
    inserted: bool,
}

impl CardStorage {
    fn new(root: &Path) -> io::Result<Self> {
        fs::create_dir_all(root)?;
        Ok(Self {
            root: root.to_path_buf(),
            inserted: true,
        })
    }

    fn path(&self, name: &str) -> io::Result<PathBuf> {
        if self.inserted {
            Ok(self.root.join(name))
        } else {
            Err(io::Error::other("card ejected"))
        }
    }
}

impl Storage for CardStorage {
    type Error = io::Error;
    type Reader = BufReader<File>;
    type Writer = BufWriter<File>;

    fn is_available(&mut self) -> bool {
        self.inserted && self.root.is_dir()
    }

    fn exists(&mut self, name: &str) -> bool {
        self.path(name).is_ok_and(|path| path.exists())
    }

    fn open_read(&mut self, name: &str) -> io::Result<Self::Reader> {
        File::open(self.path(name)?).map(BufReader::new)
    }

    fn read_until(
        &mut self,
        reader: &mut Self::Reader,
        delimiter: u8,
        buf: &mut [u8],
    ) -> io::Result<usize> {
        let mut len = 0;
        let mut byte = [0u8; 1];
        while len < buf.len() {
            if reader.read(&mut byte)? == 0 || byte[0] == delimiter {
                break;
            }
            buf[len] = byte[0];
            len += 1;
        }
        Ok(len)
    }

    fn open_append(&mut self, name: &str) -> io::Result<Self::Writer> {
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.path(name)?)
            .map(BufWriter::new)
    }

    fn write(&mut self, writer: &mut Self::Writer, bytes: &[u8]) -> io::Result<usize> {
        if !self.inserted {
            return Err(io::Error::other("card ejected"));
        }
        writer.write_all(bytes)?;
        Ok(bytes.len())
    }

    fn flush(&mut self, writer: &mut Self::Writer) -> io::Result<()> {
        writer.flush()
    }

    fn close(&mut self, writer: Self::Writer) -> io::Result<()> {
        writer
            .into_inner()
            .map_err(io::IntoInnerError::into_error)?
            .sync_all()
    }

    fn remove(&mut self, name: &str) -> io::Result<()> {
        fs::remove_file(self.path(name)?)
    }
}

/// Remembers what the logger drew on the two-line display.
#[derive(Debug, Default)]
pub struct LcdMirror {
    rows: [String; 2],
    row: usize,
    backlight: bool,
}

impl LcdMirror {
    #[cfg(test)]
    pub fn rows(&self) -> [&str; 2] {
        [self.rows[0].as_str(), self.rows[1].as_str()]
    }

    pub fn backlight(&self) -> bool {
        self.backlight
    }
}

impl Display for LcdMirror {
    fn clear(&mut self) {
        self.rows = Default::default();
        self.row = 0;
    }

    fn set_cursor(&mut self, _column: u8, row: u8) {
        self.row = usize::from(row).min(1);
    }

    fn write_text(&mut self, text: &str) {
        self.rows[self.row].push_str(text);
    }

    fn backlight_on(&mut self) {
        self.backlight = true;
    }

    fn backlight_off(&mut self) {
        self.backlight = false;
    }
}

#[derive(Debug, Default)]
pub struct BenchButton {
    down: bool,
}

impl Input for BenchButton {
    fn button_down(&mut self) -> bool {
        self.down
    }
}

#[derive(Debug)]
pub struct SimSensor {
    reading: Option<(f32, f32)>,
}

impl Default for SimSensor {
    fn default() -> Self {
        Self {
            reading: Some(DEFAULT_READING),
        }
    }
}

impl SensorReader for SimSensor {
    fn read_humidity(&mut self) -> f32 {
        self.reading.map_or(f32::NAN, |(_, humidity)| humidity)
    }

    fn read_temperature(&mut self) -> f32 {
        self.reading.map_or(f32::NAN, |(temperature, _)| temperature)
    }
}

#[derive(Debug, Default)]
pub struct LedIndicator {
    on: bool,
}

impl Indicator for LedIndicator {
    fn set_recording(&mut self, active: bool) {
        self.on = active;
    }
}

struct TranscriptLogger {
    writer: BufWriter<File>,
}

impl TranscriptLogger {
    fn new(path: &Path) -> io::Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;

        let mut logger = Self {
            writer: BufWriter::new(file),
        };
        logger.write_header()?;
        Ok(logger)
    }

    fn write_header(&mut self) -> io::Result<()> {
        writeln!(self.writer, "# Data logger emulator transcript")?;
        writeln!(
            self.writer,
            "# Timestamps are simulated milliseconds since power-on"
        )?;
        writeln!(self.writer)?;
        self.writer.flush()
    }

    fn append_line(&mut self, elapsed_ms: u64, role: TranscriptRole, line: &str) -> io::Result<()> {
        writeln!(self.writer, "[+{elapsed_ms:>6} ms] {} {line}", role.prefix())?;
        self.writer.flush()
    }
}

#[derive(Clone, Copy)]
enum TranscriptRole {
    Host,
    Emulator,
}

impl TranscriptRole {
    fn prefix(self) -> &'static str {
        match self {
            TranscriptRole::Host => "HOST>",
            TranscriptRole::Emulator => "EMU <",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn card_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "logger-emulator-{name}-{}",
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    fn log_files(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .filter(|name| name.ends_with(".csv"))
            .collect();
        names.sort();
        names
    }

    #[test]
    fn click_starts_a_log_on_the_card() {
        let dir = card_dir("click");
        let mut session = Session::new(&SessionOptions::new(&dir)).unwrap();

        let lines = session.handle_command("click").unwrap();
        assert_eq!(lines[0], "OK click");
        assert!(lines.iter().any(|line| line == "led on"));
        session.handle_command("wait 2s").unwrap();

        let files = log_files(&dir);
        assert_eq!(files.len(), 1);
        let contents = fs::read_to_string(dir.join(&files[0])).unwrap();
        let mut rows = contents.lines();
        assert_eq!(
            rows.next(),
            Some("Time (Seconds),Temperature (Celcius), Humidity (%RH)")
        );
        assert_eq!(rows.next(), Some("0,22.00,40.00"));
    }

    #[test]
    fn lost_clock_recovers_from_a_written_record() {
        let dir = card_dir("recovery");
        let mut session = Session::new(&SessionOptions {
            clock_healthy: false,
            ..SessionOptions::new(&dir)
        })
        .unwrap();

        session
            .handle_command("recovery \"06_01_24_10_30\"")
            .unwrap();
        session.handle_command("click").unwrap();

        assert_eq!(log_files(&dir), ["06_01_24_10_30.csv"]);
        assert!(session.logger().session().is_active());
    }

    #[test]
    fn ejected_card_blocks_the_start() {
        let dir = card_dir("eject");
        let mut session = Session::new(&SessionOptions::new(&dir)).unwrap();

        session.handle_command("card eject").unwrap();
        let lines = session.handle_command("click").unwrap();

        assert!(lines.iter().any(|line| line.contains("No SD card")));
        assert_eq!(session.logger().display().rows(), ["No SD card", "Press to retry"]);
        assert!(log_files(&dir).is_empty());
    }

    #[test]
    fn status_reports_the_running_session() {
        let dir = card_dir("status");
        let mut session = Session::new(&SessionOptions::new(&dir)).unwrap();
        session.handle_command("click").unwrap();

        let lines = session.handle_command("status").unwrap();
        assert!(lines.iter().any(|line| line.starts_with("mode temperature")), "{lines:?}");
        assert!(lines.iter().any(|line| line.starts_with("telemetry records=")));
    }

    #[test]
    fn syntax_errors_are_reported_without_ticking() {
        let dir = card_dir("syntax");
        let mut session = Session::new(&SessionOptions::new(&dir)).unwrap();
        let before = session.elapsed_ms();

        let lines = session.handle_command("wait forever").unwrap();
        assert!(lines[0].starts_with("ERR syntax"));
        assert_eq!(session.elapsed_ms(), before);
    }
}
