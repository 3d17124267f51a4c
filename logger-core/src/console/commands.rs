//! Bench command executor.
//!
//! Parsed commands drive a [`BenchControls`] implementation that owns the
//! simulated peripherals and the logger. The executor is `no_std` so a
//! hardware-in-the-loop rig can reuse it next to the host emulator.

use core::fmt;
use core::time::Duration;

use super::catalog::{self, CommandSpec};
use super::grammar::{self, CardCommand, ClockCommand, Command, HelpCommand, SensorCommand};

/// Simulated peripherals and clock the console manipulates.
pub trait BenchControls {
    type Error;

    /// Length of one logger tick.
    fn tick_period(&self) -> Duration;

    /// Sets the button level seen by the next tick.
    fn set_button(&mut self, down: bool);

    /// Advances simulated time, ticking the logger once per period.
    fn advance(&mut self, duration: Duration);

    fn set_sensor(&mut self, command: SensorCommand);

    fn set_clock(&mut self, command: ClockCommand);

    fn set_card(&mut self, command: CardCommand);

    /// Stores `record` as the recovery record on the card.
    fn write_recovery_record(&mut self, record: &str) -> Result<(), Self::Error>;
}

#[derive(Clone, Debug, PartialEq)]
pub enum CommandOutcome<'a> {
    Button { down: bool },
    Clicked,
    Waited(Duration),
    Sensor(SensorCommand),
    Clock(ClockCommand),
    Card(CardCommand),
    RecoveryWritten { record: &'a str },
    /// The host should print a status snapshot.
    Status,
    /// The host should print help; `None` lists every command.
    Help(Option<&'static CommandSpec>),
}

#[derive(Debug, PartialEq)]
pub enum CommandError<'a, E> {
    Parse(grammar::ParseError<'a>),
    UnknownTopic(&'a str),
    Bench(E),
}

impl<'a, E> From<grammar::ParseError<'a>> for CommandError<'a, E> {
    fn from(error: grammar::ParseError<'a>) -> Self {
        Self::Parse(error)
    }
}

impl<E: fmt::Display> fmt::Display for CommandError<'_, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandError::Parse(error) => error.fmt(f),
            CommandError::UnknownTopic(topic) => write!(f, "no help for `{topic}`"),
            CommandError::Bench(error) => error.fmt(f),
        }
    }
}

type CommandResult<'a, B> = Result<CommandOutcome<'a>, CommandError<'a, <B as BenchControls>::Error>>;

pub struct CommandExecutor<B> {
    bench: B,
}

impl<B> CommandExecutor<B> {
    #[must_use]
    pub const fn new(bench: B) -> Self {
        Self { bench }
    }

    #[must_use]
    pub fn bench(&self) -> &B {
        &self.bench
    }

    pub fn bench_mut(&mut self) -> &mut B {
        &mut self.bench
    }

    pub fn into_inner(self) -> B {
        self.bench
    }
}

impl<B: BenchControls> CommandExecutor<B> {
    /// Parses and executes one console line.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError::Parse`] for malformed lines,
    /// [`CommandError::UnknownTopic`] for help on a missing command and
    /// [`CommandError::Bench`] when the bench rejects the change.
    pub fn execute<'a>(&mut self, line: &'a str) -> CommandResult<'a, B> {
        let command = grammar::parse(line)?;
        self.dispatch(command)
    }

    fn dispatch<'a>(&mut self, command: Command<'a>) -> CommandResult<'a, B> {
        match command {
            Command::Press => {
                self.step(true);
                Ok(CommandOutcome::Button { down: true })
            }
            Command::Release => {
                self.step(false);
                Ok(CommandOutcome::Button { down: false })
            }
            Command::Click => {
                self.step(true);
                self.step(false);
                Ok(CommandOutcome::Clicked)
            }
            Command::Wait(duration) => {
                if !duration.is_zero() {
                    self.bench.advance(duration);
                }
                Ok(CommandOutcome::Waited(duration))
            }
            Command::Sensor(sensor) => {
                self.bench.set_sensor(sensor);
                Ok(CommandOutcome::Sensor(sensor))
            }
            Command::Clock(clock) => {
                self.bench.set_clock(clock);
                Ok(CommandOutcome::Clock(clock))
            }
            Command::Card(card) => {
                self.bench.set_card(card);
                Ok(CommandOutcome::Card(card))
            }
            Command::Recovery { record } => {
                self.bench
                    .write_recovery_record(record)
                    .map_err(CommandError::Bench)?;
                Ok(CommandOutcome::RecoveryWritten { record })
            }
            Command::Status => Ok(CommandOutcome::Status),
            Command::Help(HelpCommand { topic: None }) => Ok(CommandOutcome::Help(None)),
            Command::Help(HelpCommand { topic: Some(topic) }) => catalog::find(topic)
                .map(|spec| CommandOutcome::Help(Some(spec)))
                .ok_or(CommandError::UnknownTopic(topic)),
        }
    }

    fn step(&mut self, down: bool) {
        self.bench.set_button(down);
        let period = self.bench.tick_period();
        self.bench.advance(period);
    }
}

/// Writes the command list, or usage for one command.
///
/// # Errors
///
/// Propagates writer failures.
pub fn write_help<W: fmt::Write>(writer: &mut W, topic: Option<&CommandSpec>) -> fmt::Result {
    match topic {
        Some(spec) => writeln!(writer, "usage: {}\n  {}", spec.usage, spec.summary),
        None => {
            for spec in catalog::commands() {
                writeln!(writer, "{:<10}{}", spec.name, spec.summary)?;
            }
            Ok(())
        }
    }
}
