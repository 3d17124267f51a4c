//! Button-driven controllers and the dispatcher that composes them.
//!
//! Each controller is a pure state machine: it receives the current tick time
//! and at most one button edge, and answers with an action for the dispatcher
//! to carry out against the capabilities. Only [`Logger`] touches hardware.

use core::fmt;

mod dispatcher;
pub mod idle;
pub mod menu;
pub mod off_mode;
mod screen;

pub use dispatcher::Logger;
pub use idle::{IdleAction, IdleController, WakePhase};
pub use menu::{MenuAction, MenuChoice, MenuController, MenuSelection, PressPhase};
pub use off_mode::{OffModeAction, OffModeController, OffModeState, Prompt};
pub use screen::{DISPLAY_COLUMNS, ScreenLine};

/// Top-level operating mode selected by the dispatcher.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum OperatingMode {
    /// No session; the off-mode controller owns the screen.
    #[default]
    Idle,
    MenuSelect,
    TemperatureView,
    DurationView,
}

impl fmt::Display for OperatingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OperatingMode::Idle => "idle",
            OperatingMode::MenuSelect => "menu",
            OperatingMode::TemperatureView => "temperature",
            OperatingMode::DurationView => "duration",
        })
    }
}

/// Level change of the button between two ticks.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ButtonEdge {
    Down,
    Up,
}

/// Turns the raw level sampled once per tick into edges.
#[derive(Copy, Clone, Debug, Default)]
pub struct EdgeDetector {
    was_down: bool,
}

impl EdgeDetector {
    #[must_use]
    pub const fn new() -> Self {
        Self { was_down: false }
    }

    /// Feeds the level read this tick and returns the edge, if any.
    pub fn update(&mut self, down: bool) -> Option<ButtonEdge> {
        let edge = match (self.was_down, down) {
            (false, true) => Some(ButtonEdge::Down),
            (true, false) => Some(ButtonEdge::Up),
            _ => None,
        };
        self.was_down = down;
        edge
    }

    /// Level seen on the last update.
    #[must_use]
    pub const fn is_down(&self) -> bool {
        self.was_down
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edge_detector_reports_each_transition_once() {
        let mut edges = EdgeDetector::new();
        assert_eq!(edges.update(false), None);
        assert_eq!(edges.update(true), Some(ButtonEdge::Down));
        assert_eq!(edges.update(true), None);
        assert!(edges.is_down());
        assert_eq!(edges.update(false), Some(ButtonEdge::Up));
        assert_eq!(edges.update(false), None);
    }
}
