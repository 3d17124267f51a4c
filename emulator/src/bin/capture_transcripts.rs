use std::fs;
use std::io;

#[allow(dead_code)]
#[path = "../session.rs"]
mod session;

use session::{Session, TranscriptProfile};

fn main() -> io::Result<()> {
    record_profile(TranscriptProfile::Logging)?;
    record_profile(TranscriptProfile::Recovery)?;
    record_profile(TranscriptProfile::Faults)?;
    Ok(())
}

fn record_profile(profile: TranscriptProfile) -> io::Result<()> {
    let options = profile.options();
    match fs::remove_dir_all(&options.card_dir) {
        Err(err) if err.kind() != io::ErrorKind::NotFound => return Err(err),
        _ => {}
    }

    let mut session = Session::new(&options)?;
    let script: &[&str] = match profile {
        TranscriptProfile::Logging => &[
            "help",
            "sensor 21.5 48",
            "click",
            "wait 4s",
            "sensor 22.25 47.5",
            "wait 2s",
            "press",
            "release",
            "press",
            "release",
            "wait 200ms",
            "click",
            "wait 3s",
            "status",
            "press",
            "release",
            "press",
            "release",
            "wait 200ms",
            "click",
            "wait 200ms",
            "click",
            "wait 3s",
            "status",
        ],
        TranscriptProfile::Recovery => &[
            "status",
            "click",
            "click",
            "recovery \"06_01_24_10__7\"",
            "click",
            "wait 2s",
            "status",
        ],
        TranscriptProfile::Faults => &[
            "card eject",
            "click",
            "click",
            "card insert",
            "click",
            "sensor nan",
            "wait 4s",
            "sensor 20 55",
            "wait 2s",
            "wait 12s",
            "help wait",
            "help reboot",
            "wait forever",
            "status",
        ],
    };

    for line in script {
        let _ = session.handle_command(line)?;
    }
    Ok(())
}
