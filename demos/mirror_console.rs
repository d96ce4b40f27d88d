//! Find a Microwave on the raw MIDI ports and mirror its display to stdout.
//!
//! Usage: cargo run --example mirror_console -- [continuous|demand|direct] [seconds]
//!
//! Requires: a Microwave II/XT on an ALSA raw MIDI port (Linux).

#[cfg(target_os = "linux")]
fn main() {
    use std::path::Path;
    use std::process;
    use std::sync::Arc;
    use std::time::Duration;

    use mwsd::rawmidi::RawMidi;
    use mwsd::{DeviceProfile, EngineConfig, Mode, Session, Update, resource};

    let mut args = std::env::args().skip(1);
    let mode = match args.next().as_deref() {
        None | Some("continuous") => Mode::ContinuousDisplay,
        Some("demand") => Mode::DisplayOnDemand,
        Some("direct") => Mode::Direct,
        Some(other) => {
            eprintln!("unknown mode {other:?} (continuous, demand, direct)");
            process::exit(2);
        }
    };
    let seconds: u64 = args.next().and_then(|s| s.parse().ok()).unwrap_or(30);

    let backend = match RawMidi::new() {
        Ok(b) => b,
        Err(e) => {
            eprintln!("cannot list MIDI devices: {e}");
            process::exit(1);
        }
    };
    for (i, dev) in backend.devices().iter().enumerate() {
        println!("port {i}: {} ({})", dev.name, dev.path.display());
    }

    let mut session = Session::new(backend, DeviceProfile::microwave(), EngineConfig::default());
    let found = match session.discover() {
        Ok(found) => found,
        Err(e) => {
            eprintln!("discovery failed: {e}");
            process::exit(1);
        }
    };
    let Some(&pair) = found.pairs.first() else {
        eprintln!("no Microwave answered the identity request");
        process::exit(1);
    };
    println!(
        "Microwave on input {} / output {}, device id {}",
        pair.input,
        pair.output,
        session.engine().device_id()
    );

    if let Err(e) = session.connect(pair) {
        eprintln!("connect failed: {e}");
        process::exit(1);
    }

    let engine = Arc::clone(session.engine());
    let printer = Arc::clone(&engine);
    engine.set_on_update(move |update| match update {
        Update::Display => {
            println!("+{}+", "-".repeat(40));
            for line in printer.decoded_lines() {
                println!("|{line:<40}|");
            }
            println!("+{}+", "-".repeat(40));
        }
        Update::Plain => {
            if let Some(text) = printer.describe_last_plain() {
                println!("{text}");
            }
        }
    });
    engine.set_mode(mode);

    if let Err(e) = session.start() {
        eprintln!("cannot start polling: {e}");
        process::exit(1);
    }
    for _ in 0..seconds * 10 {
        if engine.quit_requested() {
            break;
        }
        std::thread::sleep(Duration::from_millis(100));
    }
    session.shutdown();

    if let Some(error) = engine.error() {
        eprintln!("stopped: {error}");
        process::exit(1);
    }

    // Keep the last dump the device sent, if it is worth keeping.
    let root = Path::new("mwsd-dumps");
    let profile = engine.profile();
    let msg = engine.last_plain_message();
    if let Some(kind) = profile.catalog().classify(&msg).filter(|k| k.is_savable()) {
        let saved = resource::prepare_dirs(root, profile.catalog())
            .and_then(|_| engine.suggested_filename())
            .and_then(|name| {
                let path = resource::dump_path(root, kind, &name);
                engine.save_last_dump(&path).map(|()| path)
            });
        match saved {
            Ok(path) => println!("saved {}", path.display()),
            Err(e) => eprintln!("save failed: {e}"),
        }
    }
}

#[cfg(not(target_os = "linux"))]
fn main() {
    eprintln!("mirror_console needs the Linux raw MIDI backend");
}
