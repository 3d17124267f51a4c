mod support;

use logger_core::config::{CSV_HEADER, RECOVERY_RECORD_NAME};
use logger_core::controller::{OffModeState, OperatingMode};
use logger_core::session::StartError;
use logger_core::telemetry::TelemetryEventKind;
use support::{Bench, JUNE_FIRST, MemoryStorage, MockClock};

const LOG_NAME: &str = "06_01_24_10_30.csv";

fn healthy_bench() -> Bench {
    Bench::new(MockClock::healthy(JUNE_FIRST), MemoryStorage::default())
}

fn recorded(bench: &Bench, kind: TelemetryEventKind) -> bool {
    bench
        .logger
        .telemetry()
        .oldest_first()
        .any(|record| record.event == kind)
}

/// Press, release, press: the gesture that opens the menu while recording.
fn open_menu(bench: &mut Bench) {
    bench.click();
    bench.press();
    bench.release();
    bench.run_ms(200);
}

#[test]
fn power_on_shows_the_ready_prompt() {
    let mut bench = healthy_bench();
    bench.run_ms(20);

    assert_eq!(bench.rows(), ["Press button", "to start log"]);
    assert_eq!(bench.logger.mode(), OperatingMode::Idle);
    assert_eq!(bench.logger.status().off_mode, OffModeState::ReadyForInput);
}

#[test]
fn release_starts_recording_and_samples_on_the_next_tick() {
    let mut bench = healthy_bench();
    bench.run_ms(20);
    bench.press();
    assert!(!bench.logger.session().is_active());

    bench.release();

    assert_eq!(bench.logger.mode(), OperatingMode::TemperatureView);
    assert_eq!(bench.rows(), ["T: 23.50 C", "H: 45.00 %RH"]);
    assert_eq!(
        bench.storage().text(LOG_NAME),
        format!("{CSV_HEADER}0,23.50,45.00\n")
    );
    assert!(recorded(&bench, TelemetryEventKind::SessionStarted));
}

#[test]
fn samples_follow_the_interval() {
    let mut bench = healthy_bench();
    bench.run_ms(20);
    bench.click();
    bench.run_ms(6_000);

    let text = bench.storage().text(LOG_NAME).to_owned();
    let elapsed: Vec<&str> = text
        .lines()
        .skip(1)
        .map(|line| line.split(',').next().unwrap())
        .collect();
    assert_eq!(elapsed, ["0", "2", "4", "6"]);

    let session = bench.logger.status().session.unwrap();
    assert_eq!(session.sample_count, 4);
    assert_eq!(session.bytes_written, text.len() as u64);
}

#[test]
fn failed_readings_are_not_written() {
    let mut bench = healthy_bench();
    bench.run_ms(20);
    bench.logger.sensor_mut().temperature_c = f32::NAN;
    bench.click();
    bench.run_ms(4_000);

    assert_eq!(bench.storage().text(LOG_NAME), CSV_HEADER);
    assert_eq!(bench.rows(), ["T: --.-- C", "H: --.-- %RH"]);
    assert!(recorded(&bench, TelemetryEventKind::SampleDiscarded));
}

#[test]
fn menu_cycles_through_its_choices() {
    let mut bench = healthy_bench();
    bench.run_ms(20);
    bench.click();

    open_menu(&mut bench);
    assert_eq!(bench.logger.mode(), OperatingMode::MenuSelect);
    assert_eq!(bench.rows(), ["Select option:", ">Temp  Dur  Stop"]);

    bench.menu_click();
    assert_eq!(bench.rows()[1], " Temp >Dur  Stop");
    bench.menu_click();
    assert_eq!(bench.rows()[1], " Temp  Dur >Stop");
    bench.menu_click();
    assert_eq!(bench.rows()[1], ">Temp  Dur  Stop");
}

#[test]
fn menu_auto_confirms_the_highlighted_view() {
    let mut bench = healthy_bench();
    bench.run_ms(20);
    bench.click();
    open_menu(&mut bench);
    bench.menu_click();

    bench.run_ms(3_000);

    assert_eq!(bench.logger.mode(), OperatingMode::DurationView);
    let [top, bottom] = bench.rows();
    assert!(top.starts_with("Time 0:00:"), "{top}");
    assert!(bottom.starts_with("Samples "), "{bottom}");
}

#[test]
fn stop_closes_the_session_and_says_goodbye() {
    let mut bench = healthy_bench();
    bench.run_ms(20);
    bench.click();
    open_menu(&mut bench);
    bench.menu_click();
    bench.menu_click();

    bench.run_ms(3_000);

    assert_eq!(bench.logger.mode(), OperatingMode::Idle);
    assert!(!bench.logger.session().is_active());
    assert_eq!(bench.rows(), ["Logging stopped", "Safe to remove"]);
    assert!(recorded(&bench, TelemetryEventKind::SessionEnded));
    assert_eq!(bench.storage().closes, 1);

    // The goodbye stays up until the next start press.
    bench.run_ms(1_000);
    assert_eq!(bench.rows(), ["Logging stopped", "Safe to remove"]);
    assert_eq!(bench.logger.status().off_mode, OffModeState::ReadyForInput);
}

#[test]
fn backlight_times_out_and_the_waking_press_does_not_open_the_menu() {
    let mut bench = healthy_bench();
    bench.run_ms(20);
    bench.click();

    bench.run_ms(10_100);
    assert_eq!(bench.logger.display().backlight, Some(false));

    bench.press();
    assert_eq!(bench.logger.display().backlight, Some(true));
    assert_eq!(bench.logger.mode(), OperatingMode::TemperatureView);
    bench.release();
    bench.press();
    assert_eq!(bench.logger.mode(), OperatingMode::MenuSelect);
}

#[test]
fn start_failure_is_shown_until_acknowledged() {
    let mut bench = healthy_bench();
    bench.storage().missing_media = true;
    bench.run_ms(20);
    bench.click();

    assert_eq!(bench.rows(), ["No SD card", "Press to retry"]);
    assert_eq!(
        bench.logger.status().last_start_error,
        Some(StartError::StorageUnavailable)
    );
    assert!(recorded(
        &bench,
        TelemetryEventKind::StartFailed(StartError::StorageUnavailable)
    ));

    bench.click();
    assert_eq!(bench.rows(), ["Press button", "to start log"]);

    bench.storage().missing_media = false;
    bench.click();
    assert!(bench.logger.session().is_active());
    assert_eq!(bench.logger.status().last_start_error, None);
}

#[test]
fn lost_clock_warns_then_recovers_from_the_card() {
    let storage = MemoryStorage::default().with_file(RECOVERY_RECORD_NAME, "06_01_24_10_30");
    let mut bench = Bench::new(MockClock::lost_power(), storage);
    bench.tick();
    assert_eq!(bench.rows(), ["Clock lost power", "Need time file"]);

    bench.click();

    assert!(bench.logger.session().is_active());
    assert!(bench.storage().files.contains_key(LOG_NAME));
    assert!(!bench.storage().files.contains_key(RECOVERY_RECORD_NAME));
    assert!(recorded(&bench, TelemetryEventKind::ClockRecovered));
}

#[test]
fn lost_clock_warning_gives_way_to_the_ready_prompt() {
    let mut bench = Bench::new(MockClock::lost_power(), MemoryStorage::default());
    bench.run_ms(3_100);
    assert_eq!(bench.rows(), ["Press button", "to start log"]);

    bench.click();
    assert_eq!(bench.rows(), ["No time file", "Press to retry"]);
}

#[test]
fn press_on_the_tick_the_warning_expires_still_starts() {
    let storage = MemoryStorage::default().with_file(RECOVERY_RECORD_NAME, "06_01_24_10_30");
    let mut bench = Bench::new(MockClock::lost_power(), storage);
    bench.run_ms(3_010);
    assert_eq!(bench.logger.status().off_mode, OffModeState::DefaultPrompt);

    bench.click();

    assert!(bench.logger.session().is_active());
    assert!(bench.storage().files.contains_key(LOG_NAME));
}

#[test]
fn press_right_after_stopping_starts_a_new_log() {
    let mut bench = healthy_bench();
    bench.run_ms(20);
    bench.click();
    open_menu(&mut bench);
    bench.menu_click();
    bench.menu_click();
    for _ in 0..400 {
        if bench.logger.status().off_mode == OffModeState::DoneMayRemoveMedia {
            break;
        }
        bench.tick();
    }
    assert_eq!(bench.logger.status().off_mode, OffModeState::DoneMayRemoveMedia);

    bench.click();

    assert!(bench.logger.session().is_active());
    assert_eq!(bench.logger.mode(), OperatingMode::TemperatureView);
    assert_eq!(bench.storage().closes, 1);
}
