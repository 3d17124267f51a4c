mod session;

use std::env;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process;

use crossterm::style::Stylize;
use crossterm::tty::IsTty;

use session::{Session, SessionOptions, TranscriptProfile};

const USAGE: &str = "Usage: logger-emulator [--card <dir>] [--dedup] [--clock-lost] [--profile <logging|recovery|faults>]";

fn main() -> io::Result<()> {
    let options = parse_options(env::args().skip(1)).unwrap_or_else(|err| {
        eprintln!("{err}");
        eprintln!("{USAGE}");
        process::exit(2);
    });

    let stdin = io::stdin();
    let mut reader = stdin.lock();
    let stdout = io::stdout();
    let styled = stdout.is_tty();
    let mut writer = stdout.lock();
    let mut session = Session::new(&options)?;
    let mut line = String::new();

    writeln!(
        writer,
        "Data logger emulator ready (card at {}). Type `help` for commands or `exit` to quit.",
        options.card_dir.display()
    )?;

    loop {
        line.clear();
        write!(writer, "> ")?;
        writer.flush()?;

        let bytes_read = reader.read_line(&mut line)?;
        if bytes_read == 0 {
            writeln!(writer)?;
            break;
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        if should_terminate(trimmed) {
            writeln!(writer, "Session closed.")?;
            break;
        }

        for response in session.handle_command(trimmed)? {
            if styled {
                writeln!(writer, "{}", style_line(&response))?;
            } else {
                writeln!(writer, "{response}")?;
            }
        }
    }

    Ok(())
}

fn style_line(line: &str) -> String {
    if line.starts_with("ERR") {
        line.red().to_string()
    } else if line.starts_with("OK") {
        line.green().to_string()
    } else if line.starts_with("EVT") {
        line.dark_grey().to_string()
    } else if line.starts_with("lcd") {
        line.cyan().bold().to_string()
    } else if line.starts_with("led") || line.starts_with("backlight") {
        line.yellow().to_string()
    } else {
        line.to_string()
    }
}

fn should_terminate(input: &str) -> bool {
    input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit")
}

fn parse_options(mut args: impl Iterator<Item = String>) -> Result<SessionOptions, String> {
    let mut options = SessionOptions::new("card");
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--card" => {
                let value = args.next().ok_or("Expected directory after --card")?;
                options.card_dir = PathBuf::from(value);
            }
            "--dedup" => options.dedup = true,
            "--clock-lost" => options.clock_healthy = false,
            "--profile" => {
                let value = args.next().ok_or("Expected value after --profile")?;
                options = TranscriptProfile::from_tag(&value)?.options();
            }
            other => {
                if let Some(value) = other.strip_prefix("--card=") {
                    options.card_dir = PathBuf::from(value);
                } else if let Some(value) = other.strip_prefix("--profile=") {
                    options = TranscriptProfile::from_tag(value)?.options();
                } else {
                    return Err(format!("Unexpected argument `{other}`"));
                }
            }
        }
    }
    Ok(options)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(values: &[&str]) -> impl Iterator<Item = String> {
        values
            .iter()
            .map(|value| (*value).to_string())
            .collect::<Vec<_>>()
            .into_iter()
    }

    #[test]
    fn defaults_to_a_local_card_with_a_healthy_clock() {
        let options = parse_options(args(&[])).unwrap();
        assert_eq!(options.card_dir, PathBuf::from("card"));
        assert!(!options.dedup);
        assert!(options.clock_healthy);
        assert!(options.transcript.is_none());
    }

    #[test]
    fn flags_override_the_defaults() {
        let options = parse_options(args(&["--card", "/tmp/sd", "--dedup", "--clock-lost"])).unwrap();
        assert_eq!(options.card_dir, PathBuf::from("/tmp/sd"));
        assert!(options.dedup);
        assert!(!options.clock_healthy);
    }

    #[test]
    fn profile_selects_a_transcript() {
        let options = parse_options(args(&["--profile=recovery"])).unwrap();
        assert_eq!(
            options.transcript,
            Some(PathBuf::from("transcripts/emulator-recovery.log"))
        );
        assert!(!options.clock_healthy);
    }

    #[test]
    fn rejects_unknown_arguments() {
        assert!(parse_options(args(&["--card"])).is_err());
        assert!(parse_options(args(&["--fast"])).is_err());
        assert!(parse_options(args(&["--profile", "reboot"])).is_err());
    }

    #[test]
    fn exit_and_quit_end_the_loop() {
        assert!(should_terminate("EXIT"));
        assert!(should_terminate("quit"));
        assert!(!should_terminate("status"));
    }
}
