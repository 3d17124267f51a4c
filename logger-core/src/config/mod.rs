//! Compiled-in timing and storage constants.
//!
//! The logger has no runtime configuration surface; every knob lives here as
//! a const-constructible struct so the dispatcher and the tests can share the
//! same defaults while still overriding individual values.

use core::time::Duration;

/// Interval between sensor samples while a session is active.
pub const DEFAULT_SAMPLE_INTERVAL: Duration = Duration::from_secs(2);
/// Inactivity period after which the backlight is extinguished.
pub const DEFAULT_BACKLIGHT_TIMEOUT: Duration = Duration::from_secs(10);
/// Menu commits the highlighted entry after this long without a press.
pub const DEFAULT_MENU_AUTO_CONFIRM: Duration = Duration::from_secs(3);
/// Presses arriving this soon after a release are treated as contact bounce.
pub const DEFAULT_REPRESS_SUPPRESSION: Duration = Duration::from_millis(150);
/// How long the lost-power warning stays up before the ready prompt returns.
pub const DEFAULT_CLOCK_WARNING: Duration = Duration::from_secs(3);
/// Number of accepted samples between durability flushes.
pub const DEFAULT_FLUSH_EVERY: u8 = 5;
/// Extension appended to every output log name.
pub const OUTPUT_EXTENSION: &str = "csv";
/// File holding the one-line recovery timestamp.
pub const RECOVERY_RECORD_NAME: &str = "time.txt";
/// First line of every output log.
pub const CSV_HEADER: &str = "Time (Seconds),Temperature (Celcius), Humidity (%RH)\n";

/// Backlight idle/wake timing.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct IdleConfig {
    pub backlight_timeout: Duration,
}

impl IdleConfig {
    pub const DEFAULT: Self = Self::new(DEFAULT_BACKLIGHT_TIMEOUT);

    #[must_use]
    pub const fn new(backlight_timeout: Duration) -> Self {
        Self { backlight_timeout }
    }
}

impl Default for IdleConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Menu navigation timing.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct MenuConfig {
    pub auto_confirm: Duration,
    pub repress_suppression: Duration,
}

impl MenuConfig {
    pub const DEFAULT: Self = Self::new(DEFAULT_MENU_AUTO_CONFIRM, DEFAULT_REPRESS_SUPPRESSION);

    #[must_use]
    pub const fn new(auto_confirm: Duration, repress_suppression: Duration) -> Self {
        Self {
            auto_confirm,
            repress_suppression,
        }
    }
}

impl Default for MenuConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Pre-recording prompt timing.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct OffModeConfig {
    pub clock_warning: Duration,
}

impl OffModeConfig {
    pub const DEFAULT: Self = Self::new(DEFAULT_CLOCK_WARNING);

    #[must_use]
    pub const fn new(clock_warning: Duration) -> Self {
        Self { clock_warning }
    }
}

impl Default for OffModeConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Output stream policy for a recording session.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct SessionConfig {
    /// Skip writing a sample whose readings are bit-identical to the previous one.
    pub dedup_identical_samples: bool,
    /// Flush after this many accepted samples; zero disables periodic flushes.
    pub flush_every: u8,
    pub extension: &'static str,
    pub recovery_record: &'static str,
}

impl SessionConfig {
    pub const DEFAULT: Self = Self {
        dedup_identical_samples: false,
        flush_every: DEFAULT_FLUSH_EVERY,
        extension: OUTPUT_EXTENSION,
        recovery_record: RECOVERY_RECORD_NAME,
    };

    /// Returns a copy with sample deduplication switched on or off.
    #[must_use]
    pub const fn with_dedup(mut self, enabled: bool) -> Self {
        self.dedup_identical_samples = enabled;
        self
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Aggregate configuration consumed by the dispatcher.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct LoggerConfig {
    pub sample_interval: Duration,
    pub idle: IdleConfig,
    pub menu: MenuConfig,
    pub off_mode: OffModeConfig,
    pub session: SessionConfig,
}

impl LoggerConfig {
    pub const DEFAULT: Self = Self {
        sample_interval: DEFAULT_SAMPLE_INTERVAL,
        idle: IdleConfig::DEFAULT,
        menu: MenuConfig::DEFAULT,
        off_mode: OffModeConfig::DEFAULT,
        session: SessionConfig::DEFAULT,
    };
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}
