//! Backlight idle timing and the double-press gesture that opens the menu.

use crate::config::IdleConfig;
use crate::time::Instant;

use super::ButtonEdge;

/// Press tracking between idle periods.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum WakePhase {
    #[default]
    Quiescent,
    Pressed,
    Released,
}

/// Result of one idle tick.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum IdleAction {
    None,
    BacklightOn,
    BacklightOff,
    /// Press, release, press inside the active window.
    EnterMenu,
}

#[derive(Clone, Debug)]
pub struct IdleController {
    config: IdleConfig,
    phase: WakePhase,
    idle_since: Instant,
    lit: bool,
}

impl IdleController {
    #[must_use]
    pub const fn new(config: IdleConfig) -> Self {
        Self {
            config,
            phase: WakePhase::Quiescent,
            idle_since: Instant::ZERO,
            lit: true,
        }
    }

    #[must_use]
    pub const fn phase(&self) -> WakePhase {
        self.phase
    }

    #[must_use]
    pub const fn is_lit(&self) -> bool {
        self.lit
    }

    /// Restarts the idle period without a press, e.g. after leaving the menu.
    pub fn wake(&mut self, now: Instant) -> IdleAction {
        self.idle_since = now;
        self.phase = WakePhase::Quiescent;
        self.light()
    }

    pub fn tick(&mut self, now: Instant, edge: Option<ButtonEdge>) -> IdleAction {
        let active = !now.has_elapsed(self.idle_since, self.config.backlight_timeout);
        match (self.phase, edge) {
            (WakePhase::Released, Some(ButtonEdge::Down)) if active && self.lit => {
                self.phase = WakePhase::Quiescent;
                IdleAction::EnterMenu
            }
            (WakePhase::Quiescent | WakePhase::Released, Some(ButtonEdge::Down)) => {
                self.idle_since = now;
                self.phase = WakePhase::Pressed;
                self.light()
            }
            (WakePhase::Pressed, Some(ButtonEdge::Up)) => {
                self.phase = WakePhase::Released;
                IdleAction::None
            }
            _ if self.lit && !active => {
                self.lit = false;
                self.phase = WakePhase::Quiescent;
                IdleAction::BacklightOff
            }
            _ => IdleAction::None,
        }
    }

    fn light(&mut self) -> IdleAction {
        if self.lit {
            IdleAction::None
        } else {
            self.lit = true;
            IdleAction::BacklightOn
        }
    }
}

#[cfg(test)]
mod tests {
    use core::time::Duration;

    use super::*;

    fn controller() -> IdleController {
        IdleController::new(IdleConfig::new(Duration::from_secs(10)))
    }

    #[test]
    fn backlight_goes_dark_exactly_once() {
        let mut idle = controller();
        idle.wake(Instant::ZERO);

        assert_eq!(idle.tick(Instant::from_millis(9_999), None), IdleAction::None);
        assert_eq!(idle.tick(Instant::from_secs(10), None), IdleAction::BacklightOff);
        for secs in 11..60 {
            assert_eq!(idle.tick(Instant::from_secs(secs), None), IdleAction::None);
        }
        assert!(!idle.is_lit());
    }

    #[test]
    fn press_release_press_opens_the_menu() {
        let mut idle = controller();
        idle.wake(Instant::ZERO);

        assert_eq!(
            idle.tick(Instant::from_millis(1_000), Some(ButtonEdge::Down)),
            IdleAction::None
        );
        assert_eq!(
            idle.tick(Instant::from_millis(1_100), Some(ButtonEdge::Up)),
            IdleAction::None
        );
        assert_eq!(idle.phase(), WakePhase::Released);
        assert_eq!(
            idle.tick(Instant::from_millis(1_400), Some(ButtonEdge::Down)),
            IdleAction::EnterMenu
        );
    }

    #[test]
    fn press_in_the_dark_only_wakes_the_backlight() {
        let mut idle = controller();
        idle.wake(Instant::ZERO);
        idle.tick(Instant::from_millis(500), Some(ButtonEdge::Down));
        idle.tick(Instant::from_millis(600), Some(ButtonEdge::Up));
        assert_eq!(idle.tick(Instant::from_secs(11), None), IdleAction::BacklightOff);

        assert_eq!(
            idle.tick(Instant::from_secs(20), Some(ButtonEdge::Down)),
            IdleAction::BacklightOn
        );
        assert_eq!(idle.phase(), WakePhase::Pressed);
        idle.tick(Instant::from_millis(20_100), Some(ButtonEdge::Up));
        assert_eq!(
            idle.tick(Instant::from_millis(20_300), Some(ButtonEdge::Down)),
            IdleAction::EnterMenu
        );
    }

    #[test]
    fn stale_release_does_not_open_the_menu() {
        let mut idle = controller();
        idle.wake(Instant::ZERO);
        idle.tick(Instant::from_millis(100), Some(ButtonEdge::Down));
        idle.tick(Instant::from_millis(200), Some(ButtonEdge::Up));

        // The same tick that crosses the timeout carries the press.
        assert_eq!(
            idle.tick(Instant::from_secs(12), Some(ButtonEdge::Down)),
            IdleAction::None
        );
        assert_eq!(idle.phase(), WakePhase::Pressed);
    }
}
