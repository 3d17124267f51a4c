use core::fmt::{self, Write as _};

use heapless::String;

use crate::capabilities::{
    Clock, ClockUnavailable, Display, Indicator, Input, NoopIndicator, SensorReader, Storage,
};
use crate::config::LoggerConfig;
use crate::session::{
    FlushOutcome, SampleError, SampleOutcome, SessionManager, StartError, Started,
};
use crate::status::{SessionStatus, StatusSnapshot};
use crate::telemetry::{
    RecoveryTelemetry, SampleTelemetry, TelemetryEventKind, TelemetryPayload, TelemetryRecorder,
};
use crate::time::Instant;

use super::idle::{IdleAction, IdleController};
use super::menu::{self, MenuAction, MenuChoice, MenuController};
use super::off_mode::{OffModeAction, OffModeController, Prompt};
use super::screen::ScreenCache;
use super::{ButtonEdge, EdgeDetector, OperatingMode};

type TextBuffer = String<32>;

/// The logger: capabilities, controllers and the session, driven by [`Logger::tick`].
pub struct Logger<C, S, D, I, R, L = NoopIndicator>
where
    S: Storage,
{
    config: LoggerConfig,
    clock: C,
    storage: S,
    display: D,
    input: I,
    sensor: R,
    indicator: L,
    mode: OperatingMode,
    off_mode: OffModeController,
    menu: MenuController,
    idle: IdleController,
    session: SessionManager<S>,
    edges: EdgeDetector,
    screen: ScreenCache,
    last_sample_at: Option<Instant>,
    last_start_error: Option<StartError>,
    telemetry: TelemetryRecorder<Instant>,
}

impl<C, S, D, I, R> Logger<C, S, D, I, R, NoopIndicator>
where
    C: Clock,
    S: Storage,
    D: Display,
    I: Input,
    R: SensorReader,
{
    /// Probes the clock and assembles an idle logger.
    ///
    /// # Errors
    ///
    /// Returns [`ClockUnavailable`] when the clock does not answer; the logger
    /// cannot run without it.
    pub fn new(
        config: LoggerConfig,
        mut clock: C,
        storage: S,
        display: D,
        input: I,
        sensor: R,
    ) -> Result<Self, ClockUnavailable> {
        clock.probe()?;
        Ok(Self {
            config,
            clock,
            storage,
            display,
            input,
            sensor,
            indicator: NoopIndicator::new(),
            mode: OperatingMode::Idle,
            off_mode: OffModeController::new(config.off_mode),
            menu: MenuController::new(config.menu),
            idle: IdleController::new(config.idle),
            session: SessionManager::new(config.session),
            edges: EdgeDetector::new(),
            screen: ScreenCache::new(),
            last_sample_at: None,
            last_start_error: None,
            telemetry: TelemetryRecorder::new(),
        })
    }
}

impl<C, S, D, I, R, L> Logger<C, S, D, I, R, L>
where
    C: Clock,
    S: Storage,
    D: Display,
    I: Input,
    R: SensorReader,
    L: Indicator,
{
    /// Replaces the recording indicator.
    pub fn with_indicator<L2: Indicator>(self, indicator: L2) -> Logger<C, S, D, I, R, L2> {
        Logger {
            config: self.config,
            clock: self.clock,
            storage: self.storage,
            display: self.display,
            input: self.input,
            sensor: self.sensor,
            indicator,
            mode: self.mode,
            off_mode: self.off_mode,
            menu: self.menu,
            idle: self.idle,
            session: self.session,
            edges: self.edges,
            screen: self.screen,
            last_sample_at: self.last_sample_at,
            last_start_error: self.last_start_error,
            telemetry: self.telemetry,
        }
    }

    /// Runs one scheduling pass.
    ///
    /// The button is read once. While recording, a due sample is taken and
    /// the idle controller runs (outside the menu) before the handler of the
    /// current mode.
    pub fn tick(&mut self, now: Instant) {
        let mut edge = self.edges.update(self.input.button_down());

        if self.session.is_active() {
            self.sample_if_due(now);
            if self.mode != OperatingMode::MenuSelect {
                match self.idle.tick(now, edge) {
                    IdleAction::EnterMenu => {
                        self.enter_menu(now);
                        // The press that opened the menu is not a menu press.
                        edge = None;
                    }
                    action => self.apply_idle(action),
                }
            }
        }

        match self.mode {
            OperatingMode::Idle => self.run_off_mode(now, edge),
            OperatingMode::MenuSelect => self.run_menu(now, edge),
            OperatingMode::TemperatureView => self.show_temperature(),
            OperatingMode::DurationView => self.show_duration(),
        }
    }

    pub fn mode(&self) -> OperatingMode {
        self.mode
    }

    pub fn telemetry(&self) -> &TelemetryRecorder<Instant> {
        &self.telemetry
    }

    pub fn session(&self) -> &SessionManager<S> {
        &self.session
    }

    pub fn clock_mut(&mut self) -> &mut C {
        &mut self.clock
    }

    pub fn storage_mut(&mut self) -> &mut S {
        &mut self.storage
    }

    pub fn display(&self) -> &D {
        &self.display
    }

    pub fn input_mut(&mut self) -> &mut I {
        &mut self.input
    }

    pub fn sensor_mut(&mut self) -> &mut R {
        &mut self.sensor
    }

    pub fn indicator(&self) -> &L {
        &self.indicator
    }

    /// Captures the state shown by the bench `status` command.
    pub fn status(&self) -> StatusSnapshot {
        let session = self.session.active().map(|active| SessionStatus {
            name: String::try_from(active.name()).unwrap_or_default(),
            bytes_written: active.bytes_written(),
            sample_count: active.sample_count(),
            reference_epoch: active.reference_epoch(),
            last_sample: active.last_sample(),
        });

        StatusSnapshot {
            mode: self.mode,
            off_mode: self.off_mode.state(),
            wake_phase: self.idle.phase(),
            backlight_lit: self.idle.is_lit(),
            menu: (self.mode == OperatingMode::MenuSelect).then(|| self.menu.selection()),
            session,
            last_start_error: self.last_start_error,
            screen: self.screen.rows().cloned(),
            telemetry_records: self.telemetry.len(),
        }
    }

    fn run_off_mode(&mut self, now: Instant, edge: Option<ButtonEdge>) {
        let clock = &mut self.clock;
        match self.off_mode.tick(now, edge, || clock.health_ok()) {
            OffModeAction::None => {}
            OffModeAction::Show(prompt) => self.show_prompt(prompt),
            OffModeAction::BeginSession => self.start_session(now),
        }
    }

    fn start_session(&mut self, now: Instant) {
        match self.session.begin(&mut self.clock, &mut self.storage) {
            Ok(started) => {
                self.record_started(&started, now);
                self.last_start_error = None;
                self.off_mode.finish_start(Ok(()));
                self.indicator.set_recording(true);
                self.last_sample_at = None;
                let action = self.idle.wake(now);
                self.apply_idle(action);
                self.set_mode(OperatingMode::TemperatureView, now);
                self.show_temperature();
            }
            Err(error) => {
                self.last_start_error = Some(error);
                self.telemetry.record(
                    TelemetryEventKind::StartFailed(error),
                    TelemetryPayload::none(),
                    now,
                );
                if let Some(prompt) = self.off_mode.finish_start(Err(error)) {
                    self.show_prompt(prompt);
                }
            }
        }
    }

    fn record_started(&mut self, started: &Started, now: Instant) {
        if let Some(recovery) = &started.recovery {
            let details = RecoveryTelemetry::new(
                started.reference_epoch,
                recovery.disambiguator,
                recovery.probed_suffix,
            );
            self.telemetry.record(
                TelemetryEventKind::ClockRecovered,
                TelemetryPayload::Recovery(details),
                now,
            );
            if !recovery.record_removed {
                self.telemetry.record(
                    TelemetryEventKind::RecoveryRecordRetained,
                    TelemetryPayload::none(),
                    now,
                );
            }
        }
        self.telemetry
            .record_session_started(started.reference_epoch, now);
    }

    fn sample_if_due(&mut self, now: Instant) {
        let interval = self.config.sample_interval;
        if !self
            .last_sample_at
            .is_none_or(|last| now.has_elapsed(last, interval))
        {
            return;
        }
        self.last_sample_at = Some(now);

        let result = self
            .session
            .sample(&mut self.clock, &mut self.storage, &mut self.sensor);
        let counters = self.session.active().map_or(
            SampleTelemetry::new(0, 0, 0),
            |active| {
                let elapsed = active
                    .last_sample()
                    .map_or(0, |sample| sample.elapsed_seconds);
                SampleTelemetry::new(elapsed, active.sample_count(), active.bytes_written())
            },
        );

        match result {
            Ok(SampleOutcome::Logged { flush, .. }) => {
                self.telemetry
                    .record_sample(TelemetryEventKind::SampleLogged, counters, now);
                match flush {
                    FlushOutcome::NotDue => {}
                    FlushOutcome::Flushed => {
                        self.telemetry
                            .record_sample(TelemetryEventKind::FlushCompleted, counters, now);
                    }
                    FlushOutcome::Failed => {
                        self.telemetry
                            .record_sample(TelemetryEventKind::FlushFailed, counters, now);
                    }
                }
            }
            Ok(SampleOutcome::Discarded) => {
                self.telemetry.record(
                    TelemetryEventKind::SampleDiscarded,
                    TelemetryPayload::none(),
                    now,
                );
            }
            Ok(SampleOutcome::Duplicate) => {
                self.telemetry
                    .record_sample(TelemetryEventKind::SampleDuplicate, counters, now);
            }
            Err(SampleError::WriteFailed) => {
                self.telemetry
                    .record_sample(TelemetryEventKind::WriteFailed, counters, now);
            }
            Err(SampleError::NoActiveSession) => {}
        }
    }

    fn enter_menu(&mut self, now: Instant) {
        let choice = self.menu.enter(now);
        self.set_mode(OperatingMode::MenuSelect, now);
        self.show_menu(choice);
    }

    fn run_menu(&mut self, now: Instant, edge: Option<ButtonEdge>) {
        match self.menu.tick(now, edge) {
            MenuAction::None => {}
            MenuAction::Redraw(choice) => self.show_menu(choice),
            MenuAction::Commit(MenuChoice::Temperature) => {
                self.resume_view(OperatingMode::TemperatureView, now);
            }
            MenuAction::Commit(MenuChoice::Duration) => {
                self.resume_view(OperatingMode::DurationView, now);
            }
            MenuAction::Commit(MenuChoice::Stop) => self.stop_session(now),
        }
    }

    fn resume_view(&mut self, mode: OperatingMode, now: Instant) {
        let action = self.idle.wake(now);
        self.apply_idle(action);
        self.set_mode(mode, now);
        match mode {
            OperatingMode::DurationView => self.show_duration(),
            _ => self.show_temperature(),
        }
    }

    fn stop_session(&mut self, now: Instant) {
        if let Some(summary) = self.session.end(&mut self.storage) {
            self.telemetry.record_session_ended(
                summary.reference_epoch,
                summary.sample_count,
                summary.bytes_written,
                now,
            );
        }
        self.indicator.set_recording(false);
        self.set_mode(OperatingMode::Idle, now);
        let prompt = self.off_mode.session_stopped();
        self.show_prompt(prompt);
        let action = self.idle.wake(now);
        self.apply_idle(action);
    }

    fn set_mode(&mut self, mode: OperatingMode, now: Instant) {
        if self.mode != mode {
            self.telemetry.record_mode_change(self.mode, mode, now);
            self.mode = mode;
        }
    }

    fn apply_idle(&mut self, action: IdleAction) {
        match action {
            IdleAction::BacklightOn => self.display.backlight_on(),
            IdleAction::BacklightOff => self.display.backlight_off(),
            IdleAction::None | IdleAction::EnterMenu => {}
        }
    }

    fn show_prompt(&mut self, prompt: Prompt) {
        let (top, bottom) = prompt.lines();
        self.screen.show(&mut self.display, top, bottom);
    }

    fn show_menu(&mut self, choice: MenuChoice) {
        let row = menu::selection_row(choice);
        self.screen.show(&mut self.display, menu::MENU_TITLE, &row);
    }

    fn show_temperature(&mut self) {
        let last = self.session.active().and_then(|active| active.last_sample());
        let mut top = TextBuffer::new();
        let mut bottom = TextBuffer::new();
        let written = match last {
            Some(sample) => write!(top, "T: {:.2} C", sample.temperature_c)
                .and_then(|()| write!(bottom, "H: {:.2} %RH", sample.humidity_pct)),
            None => write!(top, "T: --.-- C").and_then(|()| write!(bottom, "H: --.-- %RH")),
        };
        self.show_rows(written, &top, &bottom);
    }

    fn show_duration(&mut self) {
        let Some(active) = self.session.active() else {
            return;
        };
        let elapsed = self.clock.now().saturating_sub(active.reference_epoch());
        let samples = active.sample_count();

        let mut top = TextBuffer::new();
        let mut bottom = TextBuffer::new();
        let written = write!(
            top,
            "Time {}:{:02}:{:02}",
            elapsed / 3_600,
            (elapsed / 60) % 60,
            elapsed % 60
        )
        .and_then(|()| write!(bottom, "Samples {samples}"));
        self.show_rows(written, &top, &bottom);
    }

    /// Shows a formatted frame; a frame that overflowed its rows leaves the
    /// previous one on screen.
    fn show_rows(&mut self, written: fmt::Result, top: &str, bottom: &str) {
        if written.is_ok() {
            self.screen.show(&mut self.display, top, bottom);
        }
    }
}
