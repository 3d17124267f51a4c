//! Snapshot of dispatcher state and its text rendering.
//!
//! [`StatusSnapshot`] is captured by [`Logger::status`] and rendered by
//! [`StatusFormatter`] so every host front-end prints the same lines.
//!
//! [`Logger::status`]: crate::controller::Logger::status

use core::fmt;

use crate::controller::{MenuSelection, OffModeState, OperatingMode, ScreenLine, WakePhase};
use crate::session::{FileName, Sample, StartError};
use crate::time::CalendarTime;

/// Counters of the running session.
#[derive(Clone, Debug, PartialEq)]
pub struct SessionStatus {
    pub name: FileName,
    pub bytes_written: u64,
    pub sample_count: u64,
    pub reference_epoch: u32,
    pub last_sample: Option<Sample>,
}

/// Point-in-time view of the logger.
#[derive(Clone, Debug, PartialEq)]
pub struct StatusSnapshot {
    pub mode: OperatingMode,
    pub off_mode: OffModeState,
    pub wake_phase: WakePhase,
    pub backlight_lit: bool,
    /// Present while the menu is open.
    pub menu: Option<MenuSelection>,
    pub session: Option<SessionStatus>,
    pub last_start_error: Option<StartError>,
    /// Rows last written to the display.
    pub screen: Option<[ScreenLine; 2]>,
    pub telemetry_records: usize,
}

/// Helper that renders a [`StatusSnapshot`] into human-readable lines.
#[derive(Clone, Copy, Debug)]
pub struct StatusFormatter<'a> {
    snapshot: &'a StatusSnapshot,
}

impl<'a> StatusFormatter<'a> {
    #[must_use]
    pub const fn new(snapshot: &'a StatusSnapshot) -> Self {
        Self { snapshot }
    }

    /// Writes the mode line (e.g. `mode temperature backlight=on wake=released`).
    pub fn write_mode_line<W: fmt::Write>(&self, writer: &mut W) -> fmt::Result {
        write!(writer, "mode {}", self.snapshot.mode)?;
        writer.write_str(" backlight=")?;
        writer.write_str(if self.snapshot.backlight_lit { "on" } else { "off" })?;
        writer.write_str(" wake=")?;
        writer.write_str(match self.snapshot.wake_phase {
            WakePhase::Quiescent => "quiescent",
            WakePhase::Pressed => "pressed",
            WakePhase::Released => "released",
        })?;
        if let Some(menu) = self.snapshot.menu {
            write!(writer, " menu={}", menu.ordinal)?;
        }
        Ok(())
    }

    /// Writes the off-mode line (e.g. `off-mode error(no recovery record)`).
    pub fn write_off_mode_line<W: fmt::Write>(&self, writer: &mut W) -> fmt::Result {
        writer.write_str("off-mode ")?;
        match self.snapshot.off_mode {
            OffModeState::CheckClock => writer.write_str("check-clock")?,
            OffModeState::DefaultPrompt => writer.write_str("default-prompt")?,
            OffModeState::RtcLostPowerWarning { .. } => writer.write_str("clock-warning")?,
            OffModeState::ReadyForInput => writer.write_str("ready")?,
            OffModeState::ButtonPressed => writer.write_str("pressed")?,
            OffModeState::Error(error) => write!(writer, "error({error})")?,
            OffModeState::DoneMayRemoveMedia => writer.write_str("done")?,
        }
        if let Some(error) = self.snapshot.last_start_error {
            write!(writer, " last-error={error}")?;
        }
        Ok(())
    }

    /// Writes the session line (e.g. `session 06_01_24_10_30.csv samples=3 bytes=72`).
    pub fn write_session_line<W: fmt::Write>(&self, writer: &mut W) -> fmt::Result {
        let Some(session) = &self.snapshot.session else {
            return writer.write_str("session none");
        };
        write!(
            writer,
            "session {} samples={} bytes={} started={}",
            session.name,
            session.sample_count,
            session.bytes_written,
            CalendarTime::from_epoch(session.reference_epoch)
        )?;
        if let Some(sample) = session.last_sample {
            write!(
                writer,
                " last={}s,{:.2}C,{:.2}%",
                sample.elapsed_seconds, sample.temperature_c, sample.humidity_pct
            )?;
        }
        Ok(())
    }

    /// Writes the display line (e.g. `lcd [Press button    |to start log    ]`).
    pub fn write_screen_line<W: fmt::Write>(&self, writer: &mut W) -> fmt::Result {
        match &self.snapshot.screen {
            Some([top, bottom]) => write!(
                writer,
                "lcd [{:<16}|{:<16}]",
                top.as_str(),
                bottom.as_str()
            ),
            None => writer.write_str("lcd blank"),
        }
    }

    /// Writes every line, each terminated by `\n`.
    pub fn write_all<W: fmt::Write>(&self, writer: &mut W) -> fmt::Result {
        self.write_mode_line(writer)?;
        writer.write_char('\n')?;
        self.write_off_mode_line(writer)?;
        writer.write_char('\n')?;
        self.write_session_line(writer)?;
        writer.write_char('\n')?;
        self.write_screen_line(writer)?;
        writer.write_char('\n')?;
        write!(writer, "telemetry records={}", self.snapshot.telemetry_records)?;
        writer.write_char('\n')
    }
}

/// Renders the snapshot as owned lines for hosts with an allocator.
#[cfg(feature = "alloc")]
#[must_use]
pub fn status_lines(snapshot: &StatusSnapshot) -> alloc::vec::Vec<alloc::string::String> {
    let mut text = alloc::string::String::new();
    // Writing into a String cannot fail.
    let _ = StatusFormatter::new(snapshot).write_all(&mut text);
    text.lines().map(alloc::string::ToString::to_string).collect()
}
