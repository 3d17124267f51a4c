#![allow(dead_code)]

use std::collections::BTreeMap;

use logger_core::capabilities::{Clock, ClockUnavailable, Display, Input, SensorReader, Storage};
use logger_core::config::LoggerConfig;
use logger_core::controller::Logger;
use logger_core::time::{CalendarTime, Instant};

pub const TICK_MS: u64 = 10;

/// 2024-06-01 10:30:00 UTC.
pub const JUNE_FIRST: u32 = 1_717_237_800;

#[derive(Debug)]
pub struct MockClock {
    /// Epoch at bench time zero.
    pub base_epoch: u32,
    pub elapsed_ms: u64,
    pub healthy: bool,
    pub adjusted: Vec<CalendarTime>,
}

impl MockClock {
    pub fn healthy(base_epoch: u32) -> Self {
        Self {
            base_epoch,
            elapsed_ms: 0,
            healthy: true,
            adjusted: Vec::new(),
        }
    }

    pub fn lost_power() -> Self {
        Self {
            healthy: false,
            ..Self::healthy(0)
        }
    }

    fn elapsed_secs(&self) -> u32 {
        u32::try_from(self.elapsed_ms / 1_000).unwrap()
    }
}

impl Clock for MockClock {
    fn probe(&mut self) -> Result<(), ClockUnavailable> {
        Ok(())
    }

    fn now(&mut self) -> u32 {
        self.base_epoch + self.elapsed_secs()
    }

    fn health_ok(&mut self) -> bool {
        self.healthy
    }

    fn adjust(&mut self, time: CalendarTime) {
        self.base_epoch = time.epoch_seconds().unwrap() - self.elapsed_secs();
        self.healthy = true;
        self.adjusted.push(time);
    }
}

#[derive(Debug, Default)]
pub struct MemoryStorage {
    pub files: BTreeMap<String, Vec<u8>>,
    pub missing_media: bool,
    /// Caps every write at this many bytes.
    pub write_limit: Option<usize>,
    pub fail_writes: bool,
    pub flushes: usize,
    pub closes: usize,
}

#[derive(Debug)]
pub struct MemoryError;

impl MemoryStorage {
    pub fn with_file(mut self, name: &str, contents: &str) -> Self {
        self.files.insert(name.to_owned(), contents.as_bytes().to_vec());
        self
    }

    pub fn text(&self, name: &str) -> &str {
        std::str::from_utf8(&self.files[name]).unwrap()
    }
}

impl Storage for MemoryStorage {
    type Error = MemoryError;
    type Reader = (String, usize);
    type Writer = String;

    fn is_available(&mut self) -> bool {
        !self.missing_media
    }

    fn exists(&mut self, name: &str) -> bool {
        self.files.contains_key(name)
    }

    fn open_read(&mut self, name: &str) -> Result<Self::Reader, Self::Error> {
        if self.files.contains_key(name) {
            Ok((name.to_owned(), 0))
        } else {
            Err(MemoryError)
        }
    }

    fn read_until(
        &mut self,
        reader: &mut Self::Reader,
        delimiter: u8,
        buf: &mut [u8],
    ) -> Result<usize, Self::Error> {
        let data = self.files.get(&reader.0).ok_or(MemoryError)?;
        let mut written = 0;
        while written < buf.len() && reader.1 < data.len() {
            let byte = data[reader.1];
            reader.1 += 1;
            if byte == delimiter {
                break;
            }
            buf[written] = byte;
            written += 1;
        }
        Ok(written)
    }

    fn open_append(&mut self, name: &str) -> Result<Self::Writer, Self::Error> {
        if self.missing_media {
            return Err(MemoryError);
        }
        self.files.entry(name.to_owned()).or_default();
        Ok(name.to_owned())
    }

    fn write(&mut self, writer: &mut Self::Writer, bytes: &[u8]) -> Result<usize, Self::Error> {
        if self.fail_writes {
            return Err(MemoryError);
        }
        let len = self.write_limit.map_or(bytes.len(), |limit| limit.min(bytes.len()));
        self.files
            .get_mut(writer.as_str())
            .ok_or(MemoryError)?
            .extend_from_slice(&bytes[..len]);
        Ok(len)
    }

    fn flush(&mut self, _writer: &mut Self::Writer) -> Result<(), Self::Error> {
        self.flushes += 1;
        Ok(())
    }

    fn close(&mut self, _writer: Self::Writer) -> Result<(), Self::Error> {
        self.closes += 1;
        Ok(())
    }

    fn remove(&mut self, name: &str) -> Result<(), Self::Error> {
        self.files.remove(name).map(|_| ()).ok_or(MemoryError)
    }
}

#[derive(Debug, Default)]
pub struct RecordingDisplay {
    pub rows: [String; 2],
    row: usize,
    pub backlight: Option<bool>,
    pub frames: usize,
}

impl Display for RecordingDisplay {
    fn clear(&mut self) {
        self.rows = Default::default();
        self.row = 0;
        self.frames += 1;
    }

    fn set_cursor(&mut self, _column: u8, row: u8) {
        self.row = usize::from(row).min(1);
    }

    fn write_text(&mut self, text: &str) {
        self.rows[self.row].push_str(text);
    }

    fn backlight_on(&mut self) {
        self.backlight = Some(true);
    }

    fn backlight_off(&mut self) {
        self.backlight = Some(false);
    }
}

#[derive(Debug, Default)]
pub struct ScriptedButton {
    pub down: bool,
}

impl Input for ScriptedButton {
    fn button_down(&mut self) -> bool {
        self.down
    }
}

#[derive(Debug)]
pub struct FixedSensor {
    pub temperature_c: f32,
    pub humidity_pct: f32,
}

impl FixedSensor {
    pub fn new(temperature_c: f32, humidity_pct: f32) -> Self {
        Self {
            temperature_c,
            humidity_pct,
        }
    }
}

impl SensorReader for FixedSensor {
    fn read_humidity(&mut self) -> f32 {
        self.humidity_pct
    }

    fn read_temperature(&mut self) -> f32 {
        self.temperature_c
    }
}

pub type TestLogger = Logger<MockClock, MemoryStorage, RecordingDisplay, ScriptedButton, FixedSensor>;

/// Logger plus a millisecond clock advanced in fixed ticks.
pub struct Bench {
    pub logger: TestLogger,
    pub now_ms: u64,
}

impl Bench {
    pub fn new(clock: MockClock, storage: MemoryStorage) -> Self {
        Self::with_config(LoggerConfig::DEFAULT, clock, storage)
    }

    pub fn with_config(config: LoggerConfig, clock: MockClock, storage: MemoryStorage) -> Self {
        let logger = Logger::new(
            config,
            clock,
            storage,
            RecordingDisplay::default(),
            ScriptedButton::default(),
            FixedSensor::new(23.5, 45.0),
        )
        .expect("mock clock always answers");
        Self { logger, now_ms: 0 }
    }

    pub fn tick(&mut self) {
        self.logger.clock_mut().elapsed_ms = self.now_ms;
        self.logger.tick(Instant::from_millis(self.now_ms));
        self.now_ms += TICK_MS;
    }

    pub fn run_ms(&mut self, millis: u64) {
        for _ in 0..millis / TICK_MS {
            self.tick();
        }
    }

    pub fn press(&mut self) {
        self.logger.input_mut().down = true;
        self.run_ms(50);
    }

    pub fn release(&mut self) {
        self.logger.input_mut().down = false;
        self.run_ms(50);
    }

    pub fn click(&mut self) {
        self.press();
        self.release();
    }

    /// Clicks and keeps ticking long enough for the menu suppression window to pass.
    pub fn menu_click(&mut self) {
        self.click();
        self.run_ms(200);
    }

    pub fn rows(&self) -> [&str; 2] {
        let rows = &self.logger.display().rows;
        [rows[0].as_str(), rows[1].as_str()]
    }

    pub fn storage(&mut self) -> &mut MemoryStorage {
        self.logger.storage_mut()
    }
}
