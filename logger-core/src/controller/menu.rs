//! In-session menu: cycle with presses, commit by waiting.

use core::fmt::{self, Write as _};

use crate::config::MenuConfig;
use crate::time::Instant;

use super::ButtonEdge;
use super::screen::ScreenLine;

/// Menu entries in display order.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum MenuChoice {
    #[default]
    Temperature,
    Duration,
    Stop,
}

impl MenuChoice {
    pub const ALL: [MenuChoice; 3] = [
        MenuChoice::Temperature,
        MenuChoice::Duration,
        MenuChoice::Stop,
    ];

    #[must_use]
    pub const fn ordinal(self) -> u8 {
        match self {
            MenuChoice::Temperature => 0,
            MenuChoice::Duration => 1,
            MenuChoice::Stop => 2,
        }
    }

    /// Following entry, wrapping after the last one.
    #[must_use]
    pub const fn next(self) -> Self {
        match self {
            MenuChoice::Temperature => MenuChoice::Duration,
            MenuChoice::Duration => MenuChoice::Stop,
            MenuChoice::Stop => MenuChoice::Temperature,
        }
    }

    /// Short label used on the selection row.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            MenuChoice::Temperature => "Temp",
            MenuChoice::Duration => "Dur",
            MenuChoice::Stop => "Stop",
        }
    }
}

impl fmt::Display for MenuChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MenuChoice::Temperature => "temperature",
            MenuChoice::Duration => "duration",
            MenuChoice::Stop => "stop",
        })
    }
}

/// Button phase as seen by the menu.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum PressPhase {
    Up,
    #[default]
    Down,
}

/// Highlighted entry plus the button phase.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct MenuSelection {
    pub ordinal: MenuChoice,
    pub phase: PressPhase,
}

/// Result of one menu tick.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum MenuAction {
    None,
    /// The highlight moved; redraw the selection row.
    Redraw(MenuChoice),
    /// The auto-confirm timer ran out.
    Commit(MenuChoice),
}

/// Menu navigation with bounce suppression and auto-confirm.
#[derive(Clone, Debug)]
pub struct MenuController {
    config: MenuConfig,
    selection: MenuSelection,
    select_since: Instant,
    suppress_since: Option<Instant>,
    /// A suppressed press is still held.
    bounce_held: bool,
}

impl MenuController {
    #[must_use]
    pub const fn new(config: MenuConfig) -> Self {
        Self {
            config,
            selection: MenuSelection {
                ordinal: MenuChoice::Temperature,
                phase: PressPhase::Down,
            },
            select_since: Instant::ZERO,
            suppress_since: None,
            bounce_held: false,
        }
    }

    #[must_use]
    pub const fn selection(&self) -> MenuSelection {
        self.selection
    }

    /// Opens the menu on the first entry; the entering press is still held.
    pub fn enter(&mut self, now: Instant) -> MenuChoice {
        self.selection = MenuSelection::default();
        self.select_since = now;
        self.suppress_since = None;
        self.bounce_held = false;
        self.selection.ordinal
    }

    pub fn tick(&mut self, now: Instant, edge: Option<ButtonEdge>) -> MenuAction {
        match (self.selection.phase, edge) {
            (PressPhase::Up, Some(ButtonEdge::Down)) => {
                if self.suppressed(now) {
                    self.bounce_held = true;
                    self.select_since = now;
                    return MenuAction::None;
                }
                self.selection.ordinal = self.selection.ordinal.next();
                self.selection.phase = PressPhase::Down;
                self.select_since = now;
                MenuAction::Redraw(self.selection.ordinal)
            }
            (PressPhase::Down, Some(ButtonEdge::Up)) => {
                self.selection.phase = PressPhase::Up;
                self.suppress_since = Some(now);
                MenuAction::None
            }
            (PressPhase::Up, Some(ButtonEdge::Up)) => {
                self.bounce_held = false;
                MenuAction::None
            }
            (PressPhase::Up, None)
                if !self.bounce_held
                    && now.has_elapsed(self.select_since, self.config.auto_confirm) =>
            {
                MenuAction::Commit(self.selection.ordinal)
            }
            _ => MenuAction::None,
        }
    }

    fn suppressed(&self, now: Instant) -> bool {
        self.suppress_since
            .is_some_and(|since| !now.has_elapsed(since, self.config.repress_suppression))
    }
}

/// Heading row of the menu screen.
pub const MENU_TITLE: &str = "Select option:";

/// Selection row with a pointer beside the highlighted entry, e.g. `>Temp  Dur  Stop`.
#[must_use]
pub fn selection_row(current: MenuChoice) -> ScreenLine {
    let mut row = ScreenLine::new();
    for (index, choice) in MenuChoice::ALL.into_iter().enumerate() {
        let pointer = if choice == current { '>' } else { ' ' };
        let separator = if index == 0 { "" } else { " " };
        // Three labels and pointers total 16 columns.
        if write!(row, "{separator}{pointer}{}", choice.label()).is_err() {
            break;
        }
    }
    row
}
