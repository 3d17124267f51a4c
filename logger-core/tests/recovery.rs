mod support;

use logger_core::config::{RECOVERY_RECORD_NAME, SessionConfig};
use logger_core::recovery::{self, RecoveryError};
use logger_core::session::{SessionManager, StartError};
use logger_core::time::CalendarTime;
use support::{JUNE_FIRST, MemoryStorage, MockClock};

fn card(record: &str) -> MemoryStorage {
    MemoryStorage::default().with_file(RECOVERY_RECORD_NAME, record)
}

fn begin(
    storage: &mut MemoryStorage,
    clock: &mut MockClock,
) -> Result<logger_core::session::Started, StartError> {
    SessionManager::new(SessionConfig::DEFAULT).begin(clock, storage)
}

#[test]
fn lost_clock_is_set_from_the_record_and_names_the_log() {
    let mut clock = MockClock::lost_power();
    let mut storage = card("06_01_24_10_30\r\n");

    let started = begin(&mut storage, &mut clock).unwrap();

    assert_eq!(started.name.as_str(), "06_01_24_10_30.csv");
    assert_eq!(started.reference_epoch, JUNE_FIRST);
    assert_eq!(clock.adjusted, vec![CalendarTime::new(2024, 6, 1, 10, 30, 0)]);
    assert!(clock.healthy);

    let recovery = started.recovery.unwrap();
    assert!(recovery.record_removed);
    assert_eq!(recovery.probed_suffix, None);
    assert!(!storage.files.contains_key(RECOVERY_RECORD_NAME));
}

#[test]
fn disambiguated_record_probes_past_an_existing_log() {
    let mut clock = MockClock::lost_power();
    let mut storage = card("06_01_24_10__7").with_file("06_01_24_10.csv", "old");

    let started = begin(&mut storage, &mut clock).unwrap();

    assert_eq!(started.name.as_str(), "06_01_24_10__1.csv");
    let recovery = started.recovery.unwrap();
    assert_eq!(recovery.disambiguator, Some(7));
    assert_eq!(recovery.probed_suffix, Some(1));
    assert_eq!(storage.text("06_01_24_10.csv"), "old");
}

#[test]
fn disambiguated_record_uses_the_plain_stem_when_free() {
    let mut clock = MockClock::lost_power();
    let mut storage = card("06_01_24__3");

    let started = begin(&mut storage, &mut clock).unwrap();
    assert_eq!(started.name.as_str(), "06_01_24.csv");
    assert_eq!(clock.adjusted, vec![CalendarTime::new(2024, 6, 1, 0, 0, 0)]);
}

#[test]
fn probing_skips_every_taken_suffix() {
    let mut clock = MockClock::lost_power();
    let mut storage = card("06_01_24_10_30")
        .with_file("06_01_24_10_30.csv", "")
        .with_file("06_01_24_10_30__1.csv", "");

    let started = begin(&mut storage, &mut clock).unwrap();
    assert_eq!(started.name.as_str(), "06_01_24_10_30__2.csv");
}

#[test]
fn colliding_hour_record_without_suffix_is_ambiguous() {
    let mut clock = MockClock::lost_power();
    let mut storage = card("06_01_24_10").with_file("06_01_24_10.csv", "");

    assert_eq!(
        begin(&mut storage, &mut clock).unwrap_err(),
        StartError::AmbiguousRecoveryName
    );
    assert!(clock.adjusted.is_empty());
    assert!(!clock.healthy);
    assert!(storage.files.contains_key(RECOVERY_RECORD_NAME));
}

#[test]
fn colliding_date_record_without_suffix_is_ambiguous() {
    let mut clock = MockClock::lost_power();
    let mut storage = card("06_01_24").with_file("06_01_24.csv", "");

    assert_eq!(
        begin(&mut storage, &mut clock).unwrap_err(),
        StartError::AmbiguousRecoveryName
    );
    assert!(clock.adjusted.is_empty());
    assert!(!clock.healthy);
    assert_eq!(storage.text("06_01_24.csv"), "");
}

#[test]
fn missing_record_is_reported() {
    let mut clock = MockClock::lost_power();
    let mut storage = MemoryStorage::default();

    assert_eq!(
        begin(&mut storage, &mut clock).unwrap_err(),
        StartError::NoRecoveryRecord
    );
}

#[test]
fn malformed_records_leave_the_clock_alone() {
    for record in ["06-01-24", "06_01", "13_01_24", "06_01_24_10_30_00_00_00_00_00_00_00"] {
        let mut clock = MockClock::lost_power();
        let mut storage = card(record);

        assert_eq!(
            begin(&mut storage, &mut clock).unwrap_err(),
            StartError::MalformedRecoveryFormat,
            "record {record:?}"
        );
        assert!(clock.adjusted.is_empty());
    }
}

#[test]
fn only_the_first_line_is_read() {
    let mut storage = card("06_01_24_10_30\nignored text");
    let bytes = recovery::read_record(&mut storage, RECOVERY_RECORD_NAME).unwrap();
    assert_eq!(bytes.as_slice(), b"06_01_24_10_30");

    let mut empty = MemoryStorage::default();
    assert_eq!(
        recovery::read_record(&mut empty, RECOVERY_RECORD_NAME),
        Err(RecoveryError::NoRecoveryRecord)
    );
}
