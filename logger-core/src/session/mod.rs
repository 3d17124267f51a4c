//! Recording session lifecycle: naming, the open output stream and counters.
//!
//! At most one session exists. [`SessionManager::begin`] names and opens the
//! output log (taking the recovery path when the clock lost power),
//! [`SessionManager::sample`] appends one CSV record per accepted reading, and
//! [`SessionManager::end`] closes the stream.

use core::fmt::{self, Write as _};

use heapless::String;

use crate::capabilities::{Clock, SensorReader, Storage};
use crate::config::{CSV_HEADER, SessionConfig};
use crate::recovery::{self, LogStem, Recovery, RecoveryError};
use crate::time::CalendarTime;

/// Capacity of a full output file name, extension included.
pub const MAX_FILE_NAME_LEN: usize = 32;
const MAX_RECORD_LINE_LEN: usize = 112;

/// Output file name including extension.
pub type FileName = String<MAX_FILE_NAME_LEN>;

/// Joins a stem and extension into a file name; `None` when it does not fit.
#[must_use]
pub fn file_name(stem: &str, extension: &str) -> Option<FileName> {
    let mut name = FileName::new();
    write!(name, "{stem}.{extension}").ok()?;
    Some(name)
}

/// Name of a log started from a healthy clock: `MM_DD_YY_HH_mm`.
#[must_use]
pub fn stem_from_calendar(time: &CalendarTime) -> Option<LogStem> {
    let mut stem = LogStem::new();
    write!(
        stem,
        "{:02}_{:02}_{:02}_{:02}_{:02}",
        time.month,
        time.day,
        time.year_two_digit(),
        time.hour,
        time.minute
    )
    .ok()?;
    Some(stem)
}

/// Reasons a session could not be started.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum StartError {
    StorageUnavailable,
    NoRecoveryRecord,
    MalformedRecoveryFormat,
    AmbiguousRecoveryName,
    OutputOpenFailed,
    /// `begin` was called while a session is still open.
    SessionActive,
}

impl fmt::Display for StartError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StartError::StorageUnavailable => f.write_str("storage unavailable"),
            StartError::NoRecoveryRecord => f.write_str("no recovery record"),
            StartError::MalformedRecoveryFormat => f.write_str("malformed recovery record"),
            StartError::AmbiguousRecoveryName => f.write_str("ambiguous recovery name"),
            StartError::OutputOpenFailed => f.write_str("output open failed"),
            StartError::SessionActive => f.write_str("session already active"),
        }
    }
}

impl From<RecoveryError> for StartError {
    fn from(error: RecoveryError) -> Self {
        match error {
            RecoveryError::NoRecoveryRecord => StartError::NoRecoveryRecord,
            RecoveryError::MalformedRecoveryFormat => StartError::MalformedRecoveryFormat,
            RecoveryError::AmbiguousRecoveryName => StartError::AmbiguousRecoveryName,
        }
    }
}

/// Failures while logging a sample.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SampleError {
    NoActiveSession,
    WriteFailed,
}

impl fmt::Display for SampleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SampleError::NoActiveSession => f.write_str("no active session"),
            SampleError::WriteFailed => f.write_str("sample write failed"),
        }
    }
}

/// One accepted reading.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Sample {
    pub elapsed_seconds: u32,
    pub temperature_c: f32,
    pub humidity_pct: f32,
}

impl Sample {
    fn same_reading(&self, other: &Sample) -> bool {
        self.temperature_c.to_bits() == other.temperature_c.to_bits()
            && self.humidity_pct.to_bits() == other.humidity_pct.to_bits()
    }
}

/// Periodic durability flush result.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum FlushOutcome {
    NotDue,
    Flushed,
    Failed,
}

/// What happened to one sampling attempt.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum SampleOutcome {
    Logged { sample: Sample, flush: FlushOutcome },
    /// The sensor returned `NaN`; nothing was written.
    Discarded,
    /// Identical to the previous reading while deduplication is enabled.
    Duplicate,
}

/// Details of a freshly started session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Started {
    pub name: FileName,
    pub reference_epoch: u32,
    pub header_bytes: u64,
    /// Present when the clock was corrected from a recovery record.
    pub recovery: Option<Recovery>,
}

/// Final counters of a closed session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionSummary {
    pub name: FileName,
    pub reference_epoch: u32,
    pub bytes_written: u64,
    pub sample_count: u64,
    /// `false` when storage reported an error while closing the stream.
    pub closed_cleanly: bool,
}

/// The one open recording session.
pub struct ActiveSession<W> {
    writer: W,
    name: FileName,
    bytes_written: u64,
    sample_count: u64,
    reference_epoch: u32,
    last_sample: Option<Sample>,
}

impl<W> ActiveSession<W> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    pub fn sample_count(&self) -> u64 {
        self.sample_count
    }

    pub fn reference_epoch(&self) -> u32 {
        self.reference_epoch
    }

    /// Most recently logged sample.
    pub fn last_sample(&self) -> Option<Sample> {
        self.last_sample
    }
}

/// Owns the session slot and its output policy.
pub struct SessionManager<S: Storage> {
    config: SessionConfig,
    active: Option<ActiveSession<S::Writer>>,
}

impl<S: Storage> SessionManager<S> {
    #[must_use]
    pub const fn new(config: SessionConfig) -> Self {
        Self {
            config,
            active: None,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    pub fn active(&self) -> Option<&ActiveSession<S::Writer>> {
        self.active.as_ref()
    }

    /// Names and opens a new output log and writes its header.
    ///
    /// A healthy clock names the log from the current time. A clock that lost
    /// power is first corrected from the recovery record, which also supplies
    /// the name. Either way the reference epoch is read from the clock after
    /// any correction.
    ///
    /// # Errors
    ///
    /// Returns [`StartError::SessionActive`] while a session is open, leaving
    /// it untouched. Otherwise returns the [`StartError`] matching the first
    /// failed step and the session slot stays empty. A header that reaches
    /// storage only partially fails with [`StartError::OutputOpenFailed`].
    pub fn begin<C: Clock>(&mut self, clock: &mut C, storage: &mut S) -> Result<Started, StartError> {
        if self.active.is_some() {
            return Err(StartError::SessionActive);
        }
        if !storage.is_available() {
            return Err(StartError::StorageUnavailable);
        }

        let (stem, recovery) = if clock.health_ok() {
            let stem = stem_from_calendar(&CalendarTime::from_epoch(clock.now()))
                .ok_or(StartError::OutputOpenFailed)?;
            (stem, None)
        } else {
            let recovery = recovery::recover(clock, storage, &self.config)?;
            (recovery.stem.clone(), Some(recovery))
        };
        let reference_epoch = clock.now();

        let name = file_name(&stem, self.config.extension).ok_or(StartError::OutputOpenFailed)?;
        let mut writer = storage
            .open_append(&name)
            .map_err(|_| StartError::OutputOpenFailed)?;
        let header_bytes = match storage.write(&mut writer, CSV_HEADER.as_bytes()) {
            Ok(written) if written == CSV_HEADER.len() => written as u64,
            Ok(_) | Err(_) => {
                // The start already failed; a close error adds nothing.
                storage.close(writer).ok();
                return Err(StartError::OutputOpenFailed);
            }
        };

        self.active = Some(ActiveSession {
            writer,
            name: name.clone(),
            bytes_written: header_bytes,
            sample_count: 0,
            reference_epoch,
            last_sample: None,
        });

        Ok(Started {
            name,
            reference_epoch,
            header_bytes,
            recovery,
        })
    }

    /// Reads the sensor once and appends a record when the reading is usable.
    ///
    /// # Errors
    ///
    /// [`SampleError::NoActiveSession`] outside a session and
    /// [`SampleError::WriteFailed`] when storage rejects the record. A failed
    /// write leaves the sample count untouched.
    pub fn sample<C: Clock, R: SensorReader>(
        &mut self,
        clock: &mut C,
        storage: &mut S,
        sensor: &mut R,
    ) -> Result<SampleOutcome, SampleError> {
        let active = self.active.as_mut().ok_or(SampleError::NoActiveSession)?;

        let humidity_pct = sensor.read_humidity();
        let temperature_c = sensor.read_temperature();
        if humidity_pct.is_nan() || temperature_c.is_nan() {
            return Ok(SampleOutcome::Discarded);
        }

        let sample = Sample {
            elapsed_seconds: clock.now().saturating_sub(active.reference_epoch),
            temperature_c,
            humidity_pct,
        };
        if self.config.dedup_identical_samples
            && active
                .last_sample
                .is_some_and(|previous| previous.same_reading(&sample))
        {
            return Ok(SampleOutcome::Duplicate);
        }

        let mut line: String<MAX_RECORD_LINE_LEN> = String::new();
        writeln!(
            line,
            "{},{:.2},{:.2}",
            sample.elapsed_seconds, sample.temperature_c, sample.humidity_pct
        )
        .map_err(|_| SampleError::WriteFailed)?;

        let written = storage
            .write(&mut active.writer, line.as_bytes())
            .map_err(|_| SampleError::WriteFailed)?;
        // Partial writes still reached the media and are counted.
        active.bytes_written += written as u64;
        if written < line.len() {
            return Err(SampleError::WriteFailed);
        }
        active.sample_count += 1;
        active.last_sample = Some(sample);

        let flush_every = u64::from(self.config.flush_every);
        let flush = if flush_every != 0 && active.sample_count % flush_every == 0 {
            match storage.flush(&mut active.writer) {
                Ok(()) => FlushOutcome::Flushed,
                Err(_) => FlushOutcome::Failed,
            }
        } else {
            FlushOutcome::NotDue
        };

        Ok(SampleOutcome::Logged { sample, flush })
    }

    /// Closes the output stream; afterwards no session exists.
    pub fn end(&mut self, storage: &mut S) -> Option<SessionSummary> {
        let active = self.active.take()?;
        let closed_cleanly = storage.close(active.writer).is_ok();
        Some(SessionSummary {
            name: active.name,
            reference_epoch: active.reference_epoch,
            bytes_written: active.bytes_written,
            sample_count: active.sample_count,
            closed_cleanly,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_names_use_two_digit_fields() {
        let stem = stem_from_calendar(&CalendarTime::new(2024, 6, 1, 9, 5, 42));
        assert_eq!(stem.as_deref(), Some("06_01_24_09_05"));
    }

    #[test]
    fn file_name_appends_extension() {
        assert_eq!(
            file_name("06_01_24_10__1", "csv").as_deref(),
            Some("06_01_24_10__1.csv")
        );
        let long = "0123456789012345678901234567890";
        assert!(file_name(long, "csv").is_none());
    }

    #[test]
    fn recovery_errors_map_onto_start_errors() {
        assert_eq!(
            StartError::from(RecoveryError::NoRecoveryRecord),
            StartError::NoRecoveryRecord
        );
        assert_eq!(
            StartError::from(RecoveryError::MalformedRecoveryFormat),
            StartError::MalformedRecoveryFormat
        );
        assert_eq!(
            StartError::from(RecoveryError::AmbiguousRecoveryName),
            StartError::AmbiguousRecoveryName
        );
    }

    #[test]
    fn identical_readings_compare_by_bits() {
        let first = Sample {
            elapsed_seconds: 2,
            temperature_c: 21.5,
            humidity_pct: 40.0,
        };
        let later = Sample {
            elapsed_seconds: 4,
            ..first
        };
        let warmer = Sample {
            temperature_c: 21.51,
            ..first
        };
        assert!(first.same_reading(&later));
        assert!(!first.same_reading(&warmer));
    }
}
