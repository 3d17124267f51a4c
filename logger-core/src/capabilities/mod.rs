//! Capability contracts the control core consumes.
//!
//! Each trait describes the narrow surface the core needs from one external
//! collaborator (calendar clock, removable storage, character display,
//! button, sensor, indicator). Board support code or the host emulator
//! provides the concrete implementations; the core never reaches past these
//! traits.

use core::fmt;

use crate::time::CalendarTime;

/// Reported when the calendar clock peripheral does not answer at startup.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ClockUnavailable;

impl fmt::Display for ClockUnavailable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("calendar clock unavailable")
    }
}

/// Battery-backed calendar clock.
pub trait Clock {
    /// Confirms the clock peripheral is reachable.
    fn probe(&mut self) -> Result<(), ClockUnavailable>;

    /// Current time as Unix epoch seconds.
    fn now(&mut self) -> u32;

    /// Returns `false` after the clock lost power or was never set.
    fn health_ok(&mut self) -> bool;

    /// Sets the clock, clearing any lost-power condition.
    fn adjust(&mut self, time: CalendarTime);
}

/// Removable storage holding the recovery record and the output logs.
pub trait Storage {
    /// Driver-specific failure detail.
    type Error: fmt::Debug;
    /// Handle for a file opened for reading.
    type Reader;
    /// Handle for a file opened for appending.
    type Writer;

    /// Returns `true` when media is present and mounted.
    fn is_available(&mut self) -> bool;

    /// Returns `true` when a file with `name` exists.
    fn exists(&mut self, name: &str) -> bool;

    /// Opens `name` for reading.
    fn open_read(&mut self, name: &str) -> Result<Self::Reader, Self::Error>;

    /// Reads bytes into `buf` until `delimiter`, end of file, or a full buffer.
    ///
    /// The delimiter is consumed but not stored. Returns the number of bytes
    /// written into `buf`.
    fn read_until(
        &mut self,
        reader: &mut Self::Reader,
        delimiter: u8,
        buf: &mut [u8],
    ) -> Result<usize, Self::Error>;

    /// Opens (creating when needed) `name` for appending.
    fn open_append(&mut self, name: &str) -> Result<Self::Writer, Self::Error>;

    /// Appends `bytes`, returning how many were written.
    fn write(&mut self, writer: &mut Self::Writer, bytes: &[u8]) -> Result<usize, Self::Error>;

    /// Forces buffered data onto the media.
    fn flush(&mut self, writer: &mut Self::Writer) -> Result<(), Self::Error>;

    /// Closes an append handle.
    fn close(&mut self, writer: Self::Writer) -> Result<(), Self::Error>;

    /// Deletes `name`.
    fn remove(&mut self, name: &str) -> Result<(), Self::Error>;
}

/// Two-line character display with a switchable backlight.
pub trait Display {
    fn clear(&mut self);

    fn set_cursor(&mut self, column: u8, row: u8);

    fn write_text(&mut self, text: &str);

    fn backlight_on(&mut self);

    fn backlight_off(&mut self);
}

/// Single push button, read as a raw level once per tick.
pub trait Input {
    /// Returns `true` while the button is held down.
    fn button_down(&mut self) -> bool;
}

/// Temperature/humidity sensor. Failed reads return `NaN`.
pub trait SensorReader {
    fn read_humidity(&mut self) -> f32;

    fn read_temperature(&mut self) -> f32;
}

/// Output signalling that a recording session is active (typically an LED).
pub trait Indicator {
    fn set_recording(&mut self, active: bool);
}

/// Indicator that performs no hardware interaction.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoopIndicator;

impl NoopIndicator {
    /// Creates a new no-op indicator.
    pub const fn new() -> Self {
        Self
    }
}

impl Indicator for NoopIndicator {
    fn set_recording(&mut self, _: bool) {}
}
