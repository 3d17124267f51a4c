//! Pre-recording state machine: clock check, prompts and the start press.

use crate::config::OffModeConfig;
use crate::session::StartError;
use crate::time::Instant;

use super::ButtonEdge;

/// Off-mode progress.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum OffModeState {
    /// Power-on: the clock has not been inspected yet.
    CheckClock,
    /// The ready prompt is due on the next tick.
    DefaultPrompt,
    /// Clock lost power; the warning stays up until `since + clock_warning`.
    RtcLostPowerWarning { since: Instant },
    ReadyForInput,
    /// Start press held; the session begins on release.
    ButtonPressed,
    /// The last start attempt failed; a press acknowledges it.
    Error(StartError),
    /// A session just ended; the goodbye message stays up.
    DoneMayRemoveMedia,
}

/// Fixed two-line messages shown while no session runs.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Prompt {
    Ready,
    ClockLostPower,
    StartFailed(StartError),
    MayRemoveMedia,
}

impl Prompt {
    /// Text of both display rows; each fits a 16-column row.
    #[must_use]
    pub const fn lines(self) -> (&'static str, &'static str) {
        match self {
            Prompt::Ready => ("Press button", "to start log"),
            Prompt::ClockLostPower => ("Clock lost power", "Need time file"),
            Prompt::StartFailed(StartError::StorageUnavailable) => ("No SD card", "Press to retry"),
            Prompt::StartFailed(StartError::NoRecoveryRecord) => ("No time file", "Press to retry"),
            Prompt::StartFailed(StartError::MalformedRecoveryFormat) => {
                ("Bad time file", "Press to retry")
            }
            Prompt::StartFailed(StartError::AmbiguousRecoveryName) => {
                ("Name taken, add", "__N to time file")
            }
            Prompt::StartFailed(StartError::OutputOpenFailed) => {
                ("File open failed", "Press to retry")
            }
            Prompt::StartFailed(StartError::SessionActive) => ("Already logging", "Stop from menu"),
            Prompt::MayRemoveMedia => ("Logging stopped", "Safe to remove"),
        }
    }
}

/// What the dispatcher should do after an off-mode tick.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum OffModeAction {
    None,
    Show(Prompt),
    BeginSession,
}

/// Drives the screen and start button while no session is active.
#[derive(Clone, Debug)]
pub struct OffModeController {
    config: OffModeConfig,
    state: OffModeState,
}

impl OffModeController {
    #[must_use]
    pub const fn new(config: OffModeConfig) -> Self {
        Self {
            config,
            state: OffModeState::CheckClock,
        }
    }

    #[must_use]
    pub const fn state(&self) -> OffModeState {
        self.state
    }

    /// Advances by one tick.
    ///
    /// `clock_healthy` is only consulted while the clock check is pending.
    pub fn tick(
        &mut self,
        now: Instant,
        edge: Option<ButtonEdge>,
        clock_healthy: impl FnOnce() -> bool,
    ) -> OffModeAction {
        match (self.state, edge) {
            (OffModeState::CheckClock, _) => {
                if clock_healthy() {
                    self.state = OffModeState::DefaultPrompt;
                    OffModeAction::None
                } else {
                    self.state = OffModeState::RtcLostPowerWarning { since: now };
                    OffModeAction::Show(Prompt::ClockLostPower)
                }
            }
            (OffModeState::DefaultPrompt, Some(ButtonEdge::Down)) => {
                self.state = OffModeState::ButtonPressed;
                OffModeAction::Show(Prompt::Ready)
            }
            (OffModeState::DefaultPrompt, _) => {
                self.state = OffModeState::ReadyForInput;
                OffModeAction::Show(Prompt::Ready)
            }
            (
                OffModeState::ReadyForInput | OffModeState::RtcLostPowerWarning { .. },
                Some(ButtonEdge::Down),
            ) => {
                self.state = OffModeState::ButtonPressed;
                OffModeAction::None
            }
            (OffModeState::RtcLostPowerWarning { since }, _) => {
                if now.has_elapsed(since, self.config.clock_warning) {
                    self.state = OffModeState::DefaultPrompt;
                }
                OffModeAction::None
            }
            (OffModeState::ButtonPressed, Some(ButtonEdge::Up)) => OffModeAction::BeginSession,
            (OffModeState::Error(_), Some(ButtonEdge::Down)) => {
                self.state = OffModeState::ReadyForInput;
                OffModeAction::Show(Prompt::Ready)
            }
            (OffModeState::DoneMayRemoveMedia, Some(ButtonEdge::Down)) => {
                self.state = OffModeState::ButtonPressed;
                OffModeAction::None
            }
            (OffModeState::DoneMayRemoveMedia, _) => {
                // The goodbye message stays on screen until the next start.
                self.state = OffModeState::ReadyForInput;
                OffModeAction::None
            }
            _ => OffModeAction::None,
        }
    }

    /// Records the outcome of a [`OffModeAction::BeginSession`] request.
    ///
    /// Returns the prompt to show for a failure.
    pub fn finish_start(&mut self, result: Result<(), StartError>) -> Option<Prompt> {
        match result {
            Ok(()) => {
                self.state = OffModeState::DefaultPrompt;
                None
            }
            Err(error) => {
                self.state = OffModeState::Error(error);
                Some(Prompt::StartFailed(error))
            }
        }
    }

    /// Called after the session stopped from the menu.
    pub fn session_stopped(&mut self) -> Prompt {
        self.state = OffModeState::DoneMayRemoveMedia;
        Prompt::MayRemoveMedia
    }
}
