//! Telemetry event catalog and the bounded ring that stores it.
//!
//! The core has no logging backend of its own. Every notable state change is
//! recorded here as a compact event with an optional payload, and host
//! front-ends (the emulator transcript, a debug probe) drain the ring in
//! chronological order. Event kinds encode to stable numeric codes so they can
//! travel over narrow diagnostics channels.

use core::{fmt, time::Duration};

use heapless::{HistoryBuf, OldestOrdered};

use crate::controller::OperatingMode;
use crate::session::StartError;

/// Monotonic identifier assigned to each recorded event.
pub type EventId = u32;

/// Total number of telemetry entries retained in memory.
pub const TELEMETRY_RING_CAPACITY: usize = 64;

/// Discriminated telemetry events emitted by the control core.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TelemetryEventKind {
    SessionStarted,
    SessionEnded,
    StartFailed(StartError),
    SampleLogged,
    SampleDiscarded,
    SampleDuplicate,
    WriteFailed,
    FlushCompleted,
    FlushFailed,
    ModeChanged(OperatingMode),
    ClockRecovered,
    RecoveryRecordRetained,
    Custom(u16),
}

impl fmt::Display for TelemetryEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TelemetryEventKind::SessionStarted => f.write_str("session-started"),
            TelemetryEventKind::SessionEnded => f.write_str("session-ended"),
            TelemetryEventKind::StartFailed(error) => write!(f, "start-failed {error}"),
            TelemetryEventKind::SampleLogged => f.write_str("sample-logged"),
            TelemetryEventKind::SampleDiscarded => f.write_str("sample-discarded"),
            TelemetryEventKind::SampleDuplicate => f.write_str("sample-duplicate"),
            TelemetryEventKind::WriteFailed => f.write_str("write-failed"),
            TelemetryEventKind::FlushCompleted => f.write_str("flush-completed"),
            TelemetryEventKind::FlushFailed => f.write_str("flush-failed"),
            TelemetryEventKind::ModeChanged(mode) => write!(f, "mode-changed {mode}"),
            TelemetryEventKind::ClockRecovered => f.write_str("clock-recovered"),
            TelemetryEventKind::RecoveryRecordRetained => f.write_str("recovery-record-retained"),
            TelemetryEventKind::Custom(code) => write!(f, "custom({code})"),
        }
    }
}

impl TelemetryEventKind {
    const SESSION_STARTED_CODE: u16 = 0x0001;
    const SESSION_ENDED_CODE: u16 = 0x0002;
    const START_FAILED_BASE: u16 = 0x0010;
    const SAMPLE_LOGGED_CODE: u16 = 0x0020;
    const SAMPLE_DISCARDED_CODE: u16 = 0x0021;
    const SAMPLE_DUPLICATE_CODE: u16 = 0x0022;
    const WRITE_FAILED_CODE: u16 = 0x0023;
    const FLUSH_COMPLETED_CODE: u16 = 0x0024;
    const FLUSH_FAILED_CODE: u16 = 0x0025;
    const MODE_CHANGED_BASE: u16 = 0x0030;
    const CLOCK_RECOVERED_CODE: u16 = 0x0040;
    const RECORD_RETAINED_CODE: u16 = 0x0041;

    /// Encodes the event into a compact transport-friendly discriminant.
    #[must_use]
    pub const fn to_raw(self) -> u16 {
        match self {
            TelemetryEventKind::SessionStarted => Self::SESSION_STARTED_CODE,
            TelemetryEventKind::SessionEnded => Self::SESSION_ENDED_CODE,
            TelemetryEventKind::StartFailed(error) => {
                Self::START_FAILED_BASE + start_error_index(error)
            }
            TelemetryEventKind::SampleLogged => Self::SAMPLE_LOGGED_CODE,
            TelemetryEventKind::SampleDiscarded => Self::SAMPLE_DISCARDED_CODE,
            TelemetryEventKind::SampleDuplicate => Self::SAMPLE_DUPLICATE_CODE,
            TelemetryEventKind::WriteFailed => Self::WRITE_FAILED_CODE,
            TelemetryEventKind::FlushCompleted => Self::FLUSH_COMPLETED_CODE,
            TelemetryEventKind::FlushFailed => Self::FLUSH_FAILED_CODE,
            TelemetryEventKind::ModeChanged(mode) => Self::MODE_CHANGED_BASE + mode_index(mode),
            TelemetryEventKind::ClockRecovered => Self::CLOCK_RECOVERED_CODE,
            TelemetryEventKind::RecoveryRecordRetained => Self::RECORD_RETAINED_CODE,
            TelemetryEventKind::Custom(code) => code,
        }
    }

    /// Decodes a raw discriminant into a telemetry event, falling back to [`Custom`].
    ///
    /// [`Custom`]: TelemetryEventKind::Custom
    #[must_use]
    pub fn from_raw(code: u16) -> Self {
        match code {
            Self::SESSION_STARTED_CODE => TelemetryEventKind::SessionStarted,
            Self::SESSION_ENDED_CODE => TelemetryEventKind::SessionEnded,
            Self::SAMPLE_LOGGED_CODE => TelemetryEventKind::SampleLogged,
            Self::SAMPLE_DISCARDED_CODE => TelemetryEventKind::SampleDiscarded,
            Self::SAMPLE_DUPLICATE_CODE => TelemetryEventKind::SampleDuplicate,
            Self::WRITE_FAILED_CODE => TelemetryEventKind::WriteFailed,
            Self::FLUSH_COMPLETED_CODE => TelemetryEventKind::FlushCompleted,
            Self::FLUSH_FAILED_CODE => TelemetryEventKind::FlushFailed,
            Self::CLOCK_RECOVERED_CODE => TelemetryEventKind::ClockRecovered,
            Self::RECORD_RETAINED_CODE => TelemetryEventKind::RecoveryRecordRetained,
            value if (Self::START_FAILED_BASE..Self::SAMPLE_LOGGED_CODE).contains(&value) => {
                start_error_from_index(value - Self::START_FAILED_BASE)
                    .map_or(TelemetryEventKind::Custom(value), |error| {
                        TelemetryEventKind::StartFailed(error)
                    })
            }
            value if (Self::MODE_CHANGED_BASE..Self::CLOCK_RECOVERED_CODE).contains(&value) => {
                mode_from_index(value - Self::MODE_CHANGED_BASE)
                    .map_or(TelemetryEventKind::Custom(value), |mode| {
                        TelemetryEventKind::ModeChanged(mode)
                    })
            }
            other => TelemetryEventKind::Custom(other),
        }
    }
}

/// Payloads carried alongside telemetry events.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TelemetryPayload {
    /// No additional metadata accompanies the event.
    None,
    /// Counters of the session a sample or flush belongs to.
    Sample(SampleTelemetry),
    /// Start or end of a recording session.
    Session(SessionTelemetry),
    /// Clock correction applied from a recovery record.
    Recovery(RecoveryTelemetry),
    /// Mode transition timing.
    Mode(ModeTelemetry),
}

impl TelemetryPayload {
    /// Convenience constructor when no payload data is needed.
    #[must_use]
    pub const fn none() -> Self {
        TelemetryPayload::None
    }
}

/// Per-sample counters.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SampleTelemetry {
    pub elapsed_seconds: u32,
    pub sample_count: u64,
    pub bytes_written: u64,
}

impl SampleTelemetry {
    #[must_use]
    pub const fn new(elapsed_seconds: u32, sample_count: u64, bytes_written: u64) -> Self {
        Self {
            elapsed_seconds,
            sample_count,
            bytes_written,
        }
    }
}

/// Session lifecycle payload.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SessionTelemetry {
    pub reference_epoch: u32,
    pub sample_count: u64,
    pub bytes_written: u64,
    /// Tick time between start and end; `None` on the start event.
    pub duration: Option<Duration>,
}

impl SessionTelemetry {
    #[must_use]
    pub const fn new(
        reference_epoch: u32,
        sample_count: u64,
        bytes_written: u64,
        duration: Option<Duration>,
    ) -> Self {
        Self {
            reference_epoch,
            sample_count,
            bytes_written,
            duration,
        }
    }
}

/// Clock correction payload.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RecoveryTelemetry {
    pub adjusted_epoch: u32,
    /// Disambiguator carried by the record, if any.
    pub disambiguator: Option<u8>,
    /// Suffix index chosen by collision probing, if any.
    pub probed_suffix: Option<u8>,
}

impl RecoveryTelemetry {
    #[must_use]
    pub const fn new(
        adjusted_epoch: u32,
        disambiguator: Option<u8>,
        probed_suffix: Option<u8>,
    ) -> Self {
        Self {
            adjusted_epoch,
            disambiguator,
            probed_suffix,
        }
    }
}

/// Mode transition payload.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ModeTelemetry {
    pub previous: OperatingMode,
    pub time_in_previous: Option<Duration>,
}

/// Trait implemented by monotonic instant wrappers used for telemetry tracking.
pub trait TelemetryInstant: Copy {
    /// Returns the saturating duration from `earlier` to `self`.
    fn saturating_duration_since(&self, earlier: Self) -> Duration;
}

/// Telemetry record stored in the ring buffer.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TelemetryRecord<TInstant>
where
    TInstant: Copy,
{
    pub id: EventId,
    pub timestamp: TInstant,
    pub event: TelemetryEventKind,
    pub details: TelemetryPayload,
}

/// Telemetry ring buffer type alias.
pub type TelemetryRing<TInstant, const CAPACITY: usize = TELEMETRY_RING_CAPACITY> =
    HistoryBuf<TelemetryRecord<TInstant>, CAPACITY>;

/// Records telemetry events into a fixed-size ring buffer.
pub struct TelemetryRecorder<TInstant, const CAPACITY: usize = TELEMETRY_RING_CAPACITY>
where
    TInstant: Copy,
{
    ring: TelemetryRing<TInstant, CAPACITY>,
    session_started_at: Option<TInstant>,
    mode_entered_at: Option<TInstant>,
    next_event_id: EventId,
}

impl<TInstant, const CAPACITY: usize> TelemetryRecorder<TInstant, CAPACITY>
where
    TInstant: Copy + TelemetryInstant,
{
    /// Creates a new telemetry recorder with an empty history.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            ring: HistoryBuf::new(),
            session_started_at: None,
            mode_entered_at: None,
            next_event_id: 0,
        }
    }

    /// Returns an iterator over the recorded telemetry in chronological order.
    pub fn oldest_first(&self) -> OldestOrdered<'_, TelemetryRecord<TInstant>> {
        self.ring.oldest_ordered()
    }

    /// Returns the records whose id is at least `first`, oldest first.
    ///
    /// Hosts keep the id following the last record they printed and pass it
    /// back here to drain only new entries.
    pub fn since(&self, first: EventId) -> impl Iterator<Item = &TelemetryRecord<TInstant>> {
        self.ring
            .oldest_ordered()
            .filter(move |record| record.id >= first)
    }

    /// Returns the most recent telemetry record, if available.
    pub fn latest(&self) -> Option<&TelemetryRecord<TInstant>> {
        self.ring.recent()
    }

    /// Identifier the next recorded event will receive.
    pub fn next_id(&self) -> EventId {
        self.next_event_id
    }

    /// Returns the number of records currently stored.
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    /// Returns `true` when no telemetry records are stored.
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    /// Records an arbitrary telemetry event with the supplied payload.
    pub fn record(
        &mut self,
        event: TelemetryEventKind,
        payload: TelemetryPayload,
        timestamp: TInstant,
    ) -> EventId {
        let id = self.next_event_id;
        self.next_event_id = self.next_event_id.wrapping_add(1);

        self.ring.write(TelemetryRecord {
            id,
            timestamp,
            event,
            details: payload,
        });

        id
    }

    /// Records the start of a session and remembers when it began.
    pub fn record_session_started(&mut self, reference_epoch: u32, timestamp: TInstant) -> EventId {
        self.session_started_at = Some(timestamp);
        let payload =
            TelemetryPayload::Session(SessionTelemetry::new(reference_epoch, 0, 0, None));
        self.record(TelemetryEventKind::SessionStarted, payload, timestamp)
    }

    /// Records the end of a session together with its final counters.
    pub fn record_session_ended(
        &mut self,
        reference_epoch: u32,
        sample_count: u64,
        bytes_written: u64,
        timestamp: TInstant,
    ) -> EventId {
        let duration = self
            .session_started_at
            .take()
            .map(|start| timestamp.saturating_duration_since(start));
        let payload = TelemetryPayload::Session(SessionTelemetry::new(
            reference_epoch,
            sample_count,
            bytes_written,
            duration,
        ));
        self.record(TelemetryEventKind::SessionEnded, payload, timestamp)
    }

    /// Records a mode transition and the time spent in the previous mode.
    pub fn record_mode_change(
        &mut self,
        previous: OperatingMode,
        next: OperatingMode,
        timestamp: TInstant,
    ) -> EventId {
        let time_in_previous = self
            .mode_entered_at
            .map(|entered| timestamp.saturating_duration_since(entered));
        self.mode_entered_at = Some(timestamp);

        let payload = TelemetryPayload::Mode(ModeTelemetry {
            previous,
            time_in_previous,
        });
        self.record(TelemetryEventKind::ModeChanged(next), payload, timestamp)
    }

    /// Records a sample-path event (logged, duplicate, flush) with counters.
    pub fn record_sample(
        &mut self,
        event: TelemetryEventKind,
        counters: SampleTelemetry,
        timestamp: TInstant,
    ) -> EventId {
        self.record(event, TelemetryPayload::Sample(counters), timestamp)
    }
}

impl<TInstant, const CAPACITY: usize> Default for TelemetryRecorder<TInstant, CAPACITY>
where
    TInstant: Copy + TelemetryInstant,
{
    fn default() -> Self {
        Self::new()
    }
}

const fn start_error_index(error: StartError) -> u16 {
    match error {
        StartError::StorageUnavailable => 0,
        StartError::NoRecoveryRecord => 1,
        StartError::MalformedRecoveryFormat => 2,
        StartError::AmbiguousRecoveryName => 3,
        StartError::OutputOpenFailed => 4,
        StartError::SessionActive => 5,
    }
}

fn start_error_from_index(index: u16) -> Option<StartError> {
    match index {
        0 => Some(StartError::StorageUnavailable),
        1 => Some(StartError::NoRecoveryRecord),
        2 => Some(StartError::MalformedRecoveryFormat),
        3 => Some(StartError::AmbiguousRecoveryName),
        4 => Some(StartError::OutputOpenFailed),
        5 => Some(StartError::SessionActive),
        _ => None,
    }
}

const fn mode_index(mode: OperatingMode) -> u16 {
    match mode {
        OperatingMode::Idle => 0,
        OperatingMode::MenuSelect => 1,
        OperatingMode::TemperatureView => 2,
        OperatingMode::DurationView => 3,
    }
}

fn mode_from_index(index: u16) -> Option<OperatingMode> {
    match index {
        0 => Some(OperatingMode::Idle),
        1 => Some(OperatingMode::MenuSelect),
        2 => Some(OperatingMode::TemperatureView),
        3 => Some(OperatingMode::DurationView),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd)]
    struct MillisInstant(u64);

    impl TelemetryInstant for MillisInstant {
        fn saturating_duration_since(&self, earlier: Self) -> Duration {
            Duration::from_millis(self.0.saturating_sub(earlier.0))
        }
    }

    #[test]
    fn event_codes_decode_to_the_same_event() {
        let fixtures = [
            TelemetryEventKind::SessionStarted,
            TelemetryEventKind::StartFailed(StartError::AmbiguousRecoveryName),
            TelemetryEventKind::StartFailed(StartError::OutputOpenFailed),
            TelemetryEventKind::StartFailed(StartError::SessionActive),
            TelemetryEventKind::FlushFailed,
            TelemetryEventKind::ModeChanged(OperatingMode::DurationView),
            TelemetryEventKind::RecoveryRecordRetained,
        ];

        for event in fixtures {
            assert_eq!(TelemetryEventKind::from_raw(event.to_raw()), event);
        }
    }

    #[test]
    fn unknown_codes_fall_back_to_custom() {
        assert_eq!(
            TelemetryEventKind::from_raw(0x0015),
            TelemetryEventKind::Custom(0x0015)
        );
        assert_eq!(
            TelemetryEventKind::from_raw(0x0034),
            TelemetryEventKind::Custom(0x0034)
        );
        assert_eq!(TelemetryEventKind::Custom(0xBEEF).to_raw(), 0xBEEF);
    }

    #[test]
    fn session_end_reports_duration_since_start() {
        let mut recorder = TelemetryRecorder::<MillisInstant>::new();
        let id = recorder.record_session_started(1_717_237_800, MillisInstant(1_000));
        assert_eq!(id, 0);

        recorder.record_session_ended(1_717_237_800, 4, 200, MillisInstant(9_500));
        let record = recorder.latest().copied().unwrap();
        assert_eq!(record.event, TelemetryEventKind::SessionEnded);
        match record.details {
            TelemetryPayload::Session(details) => {
                assert_eq!(details.sample_count, 4);
                assert_eq!(details.bytes_written, 200);
                assert_eq!(details.duration, Some(Duration::from_millis(8_500)));
            }
            _ => panic!("expected session payload"),
        }
    }

    #[test]
    fn mode_changes_track_time_in_previous_mode() {
        let mut recorder = TelemetryRecorder::<MillisInstant>::new();
        recorder.record_mode_change(
            OperatingMode::Idle,
            OperatingMode::TemperatureView,
            MillisInstant(100),
        );
        recorder.record_mode_change(
            OperatingMode::TemperatureView,
            OperatingMode::MenuSelect,
            MillisInstant(2_600),
        );

        let records: heapless::Vec<_, 4> = recorder.oldest_first().copied().collect();
        match (records[0].details, records[1].details) {
            (TelemetryPayload::Mode(first), TelemetryPayload::Mode(second)) => {
                assert_eq!(first.time_in_previous, None);
                assert_eq!(second.previous, OperatingMode::TemperatureView);
                assert_eq!(second.time_in_previous, Some(Duration::from_millis(2_500)));
            }
            _ => panic!("expected mode payloads"),
        }
    }

    #[test]
    fn ring_keeps_only_the_newest_records() {
        let mut recorder = TelemetryRecorder::<MillisInstant, 4>::new();
        for tick in 0..10 {
            recorder.record(
                TelemetryEventKind::SampleDiscarded,
                TelemetryPayload::none(),
                MillisInstant(tick),
            );
        }

        assert_eq!(recorder.len(), 4);
        assert_eq!(recorder.next_id(), 10);
        let first = recorder.oldest_first().next().map(|record| record.id);
        assert_eq!(first, Some(6));
        assert_eq!(recorder.since(8).count(), 2);
    }
}
