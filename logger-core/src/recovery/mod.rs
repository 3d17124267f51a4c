//! Timestamp recovery from the one-line record left on the storage card.
//!
//! When the calendar clock has lost power the operator drops a `time.txt`
//! file on the card containing `MM_DD_YY[__X | _HH[__X | _mm[_SS]]]`. The
//! record is parsed in a single left-to-right scan driven by two lookup
//! tables: one maps the current format position to the next position after a
//! single underscore, the other to the position after a double underscore
//! (the disambiguator marker). The record both sets the clock and names the
//! output log; it is consumed once.

use core::fmt;

use heapless::{String, Vec};

use crate::capabilities::{Clock, Storage};
use crate::config::SessionConfig;
use crate::session::{FileName, file_name};
use crate::time::CalendarTime;

/// Longest record line accepted from storage.
pub const MAX_RECORD_LEN: usize = 32;
/// Capacity of a recovered base name.
pub const MAX_STEM_LEN: usize = 24;
/// Highest `__N` suffix tried when the recovered name collides.
pub const MAX_PROBE_SUFFIX: u8 = 99;

/// Output log name without extension.
pub type LogStem = String<MAX_STEM_LEN>;

/// Failures of the recovery path, each surfaced to the operator.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum RecoveryError {
    NoRecoveryRecord,
    MalformedRecoveryFormat,
    AmbiguousRecoveryName,
}

impl fmt::Display for RecoveryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecoveryError::NoRecoveryRecord => f.write_str("recovery record missing"),
            RecoveryError::MalformedRecoveryFormat => f.write_str("recovery record malformed"),
            RecoveryError::AmbiguousRecoveryName => {
                f.write_str("recovered name collides with an existing log")
            }
        }
    }
}

/// Calendar fields exactly as written in the record (two-digit year).
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct RecoveredTimestamp {
    pub month: u8,
    pub day: u8,
    pub year: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

impl RecoveredTimestamp {
    /// Expands the two-digit year into the 2000s.
    #[must_use]
    pub fn to_calendar(self) -> CalendarTime {
        CalendarTime::new(
            2000 + u16::from(self.year),
            self.month,
            self.day,
            self.hour,
            self.minute,
            self.second,
        )
    }
}

/// Record position reached by the scan.
///
/// [`RecordFormat::YEAR`] and [`RecordFormat::HOUR`] are the only precisions where a collision cannot
/// be settled by probing; the operator must add a disambiguator.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub struct RecordFormat(u8);

impl RecordFormat {
    pub const START: Self = Self(0);
    pub const DAY: Self = Self(1);
    pub const YEAR: Self = Self(2);
    pub const DATE_SUFFIX: Self = Self(3);
    pub const HOUR: Self = Self(4);
    pub const HOUR_SUFFIX: Self = Self(5);
    pub const MINUTE: Self = Self(6);
    pub const SECOND: Self = Self(7);

    #[must_use]
    pub const fn raw(self) -> u8 {
        self.0
    }

    /// Returns `true` when a colliding name has to be rejected rather than probed.
    ///
    /// Only bare `MM_DD_YY` and `MM_DD_YY_HH` records qualify: at that
    /// precision the user must add `__N` to tell sessions apart, so
    /// `06_01_24_10` over an existing `06_01_24_10.csv` is ambiguous. A record
    /// that already carries `__N` (format 3 or 5) or reaches minutes probes
    /// `__1`, `__2`, ... instead.
    #[must_use]
    pub const fn requires_disambiguator(self) -> bool {
        matches!(self.0, 2 | 4)
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum Field {
    Month,
    Day,
    Year,
    Hour,
    Minute,
    Second,
    Disambiguator,
}

const AFTER_SINGLE_UNDERSCORE: [Option<RecordFormat>; 8] = [
    Some(RecordFormat::DAY),
    Some(RecordFormat::YEAR),
    Some(RecordFormat::HOUR),
    None,
    Some(RecordFormat::MINUTE),
    None,
    Some(RecordFormat::SECOND),
    None,
];

const AFTER_DOUBLE_UNDERSCORE: [Option<RecordFormat>; 8] = [
    None,
    None,
    Some(RecordFormat::DATE_SUFFIX),
    None,
    Some(RecordFormat::HOUR_SUFFIX),
    None,
    None,
    None,
];

const FIELD_AT: [Field; 8] = [
    Field::Month,
    Field::Day,
    Field::Year,
    Field::Disambiguator,
    Field::Hour,
    Field::Disambiguator,
    Field::Minute,
    Field::Second,
];

const MAX_FIELD_DIGITS: u8 = 2;
const MAX_UNDERSCORE_RUN: u8 = 2;

/// Successfully parsed record.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ParsedRecord {
    pub timestamp: RecoveredTimestamp,
    pub format: RecordFormat,
    pub disambiguator: Option<u8>,
    /// Record text without line terminators, cut before any `__X` suffix.
    pub stem: LogStem,
}

#[derive(Default)]
struct Scan {
    format: u8,
    run_start: u8,
    underscores: u8,
    digits: u8,
    timestamp: RecoveredTimestamp,
    disambiguator: Option<u8>,
    text: LogStem,
    stem_len: Option<usize>,
}

impl Scan {
    fn underscore(&mut self) -> Result<(), RecoveryError> {
        if self.text.is_empty() {
            return Err(RecoveryError::MalformedRecoveryFormat);
        }
        self.push('_')?;
        self.digits = 0;
        self.underscores += 1;

        let next = match self.underscores {
            1 => {
                self.run_start = self.format;
                AFTER_SINGLE_UNDERSCORE[usize::from(self.format)]
            }
            MAX_UNDERSCORE_RUN => {
                let next = AFTER_DOUBLE_UNDERSCORE[usize::from(self.run_start)];
                if next.is_some() {
                    self.stem_len = Some(self.text.len() - 2);
                }
                next
            }
            _ => None,
        };
        let next = next.ok_or(RecoveryError::MalformedRecoveryFormat)?;
        self.format = next.raw();
        Ok(())
    }

    fn digit(&mut self, byte: u8) -> Result<(), RecoveryError> {
        self.push(char::from(byte))?;
        self.underscores = 0;
        self.digits += 1;
        if self.digits > MAX_FIELD_DIGITS {
            return Err(RecoveryError::MalformedRecoveryFormat);
        }

        let value = byte - b'0';
        let slot = match FIELD_AT[usize::from(self.format)] {
            Field::Month => &mut self.timestamp.month,
            Field::Day => &mut self.timestamp.day,
            Field::Year => &mut self.timestamp.year,
            Field::Hour => &mut self.timestamp.hour,
            Field::Minute => &mut self.timestamp.minute,
            Field::Second => &mut self.timestamp.second,
            Field::Disambiguator => self.disambiguator.get_or_insert(0),
        };
        // The first digit lands in the low position; a second one shifts it up.
        *slot = if self.digits == 1 {
            value
        } else {
            *slot * 10 + value
        };
        Ok(())
    }

    fn push(&mut self, ch: char) -> Result<(), RecoveryError> {
        self.text
            .push(ch)
            .map_err(|_| RecoveryError::MalformedRecoveryFormat)
    }

    fn finish(mut self) -> Result<ParsedRecord, RecoveryError> {
        let format = RecordFormat(self.format);
        if self.underscores > 0 || format < RecordFormat::YEAR {
            return Err(RecoveryError::MalformedRecoveryFormat);
        }
        if !self.timestamp.to_calendar().is_valid() {
            return Err(RecoveryError::MalformedRecoveryFormat);
        }
        if let Some(len) = self.stem_len {
            self.text.truncate(len);
        }

        Ok(ParsedRecord {
            timestamp: self.timestamp,
            format,
            disambiguator: self.disambiguator,
            stem: self.text,
        })
    }
}

/// Parses one recovery record.
///
/// Carriage returns and line feeds are ignored wherever they appear. A
/// record must reach at least the year field, must not end in an underscore
/// and must name a real calendar date and time.
///
/// # Errors
///
/// Returns [`RecoveryError::MalformedRecoveryFormat`] for any deviation from
/// the record grammar.
pub fn parse_record(bytes: &[u8]) -> Result<ParsedRecord, RecoveryError> {
    let mut scan = Scan::default();
    for &byte in bytes {
        match byte {
            b'\r' | b'\n' => {}
            b'_' => scan.underscore()?,
            b'0'..=b'9' => scan.digit(byte)?,
            _ => return Err(RecoveryError::MalformedRecoveryFormat),
        }
    }
    scan.finish()
}

/// Output name chosen for a recovered record.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ResolvedName {
    pub stem: LogStem,
    /// `__N` suffix picked by probing, when the plain stem was taken.
    pub probed_suffix: Option<u8>,
}

/// Picks the output name for `record` without touching the clock.
///
/// # Errors
///
/// Returns [`RecoveryError::AmbiguousRecoveryName`] when the stem is taken
/// and the record precision does not allow probing, or when every probe
/// suffix is taken.
pub fn resolve_name<S: Storage>(
    storage: &mut S,
    record: &ParsedRecord,
    extension: &str,
) -> Result<ResolvedName, RecoveryError> {
    if !exists_with_extension(storage, &record.stem, extension)? {
        return Ok(ResolvedName {
            stem: record.stem.clone(),
            probed_suffix: None,
        });
    }
    if record.format.requires_disambiguator() {
        return Err(RecoveryError::AmbiguousRecoveryName);
    }

    for suffix in 1..=MAX_PROBE_SUFFIX {
        let mut candidate = LogStem::new();
        fmt::Write::write_fmt(
            &mut candidate,
            format_args!("{}__{suffix}", record.stem.as_str()),
        )
        .map_err(|_| RecoveryError::AmbiguousRecoveryName)?;

        if !exists_with_extension(storage, &candidate, extension)? {
            return Ok(ResolvedName {
                stem: candidate,
                probed_suffix: Some(suffix),
            });
        }
    }
    Err(RecoveryError::AmbiguousRecoveryName)
}

fn exists_with_extension<S: Storage>(
    storage: &mut S,
    stem: &str,
    extension: &str,
) -> Result<bool, RecoveryError> {
    let name: FileName =
        file_name(stem, extension).ok_or(RecoveryError::AmbiguousRecoveryName)?;
    Ok(storage.exists(&name))
}

/// Reads the first line of the recovery record.
///
/// # Errors
///
/// Missing or unreadable records report [`RecoveryError::NoRecoveryRecord`];
/// a line longer than [`MAX_RECORD_LEN`] is malformed.
pub fn read_record<S: Storage>(
    storage: &mut S,
    record_name: &str,
) -> Result<Vec<u8, MAX_RECORD_LEN>, RecoveryError> {
    if !storage.exists(record_name) {
        return Err(RecoveryError::NoRecoveryRecord);
    }
    let mut reader = storage
        .open_read(record_name)
        .map_err(|_| RecoveryError::NoRecoveryRecord)?;

    let mut buf = [0u8; MAX_RECORD_LEN];
    let len = storage
        .read_until(&mut reader, b'\n', &mut buf)
        .map_err(|_| RecoveryError::NoRecoveryRecord)?;
    if len >= MAX_RECORD_LEN {
        return Err(RecoveryError::MalformedRecoveryFormat);
    }

    Vec::from_slice(&buf[..len]).map_err(|_| RecoveryError::MalformedRecoveryFormat)
}

/// Result of a completed recovery.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Recovery {
    pub stem: LogStem,
    pub adjusted_to: CalendarTime,
    pub disambiguator: Option<u8>,
    pub probed_suffix: Option<u8>,
    /// `false` when the record could not be deleted after use.
    pub record_removed: bool,
}

/// Runs the whole recovery path: read, parse, name, adjust clock, consume record.
///
/// Nothing is changed unless every step up to naming succeeds.
///
/// # Errors
///
/// Propagates the first [`RecoveryError`] from reading, parsing or naming.
pub fn recover<C: Clock, S: Storage>(
    clock: &mut C,
    storage: &mut S,
    config: &SessionConfig,
) -> Result<Recovery, RecoveryError> {
    let bytes = read_record(storage, config.recovery_record)?;
    let record = parse_record(&bytes)?;
    let resolved = resolve_name(storage, &record, config.extension)?;

    let adjusted_to = record.timestamp.to_calendar();
    clock.adjust(adjusted_to);
    let record_removed = storage.remove(config.recovery_record).is_ok();

    Ok(Recovery {
        stem: resolved.stem,
        adjusted_to,
        disambiguator: record.disambiguator,
        probed_suffix: resolved.probed_suffix,
        record_removed,
    })
}
