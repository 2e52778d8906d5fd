mod console;

use std::fs::File;
use std::io::{self, BufRead, Write};

use console::ConsoleCommand;
use tonnetz_core::config::Config;
use tonnetz_core::midi;
use tonnetz_core::settings::{self, Settings};
use tonnetz_core::Controller;

fn init_logging(verbose: bool) -> Result<(), String> {
    use simplelog::{Config as LogConfig, LevelFilter, WriteLogger};

    let log_level = if verbose { LevelFilter::Debug } else { LevelFilter::Info };

    let log_path = dirs::config_dir()
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join("tonnetz")
        .join("tonnetz.log");

    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let log_file = File::create(&log_path)
        .or_else(|_| File::create("/tmp/tonnetz.log"))
        .map_err(|e| format!("cannot create log file: {}", e))?;

    WriteLogger::init(log_level, LogConfig::default(), log_file).map_err(|e| e.to_string())?;

    log::info!("tonnetz starting (log level: {:?})", log_level);
    Ok(())
}

fn print_ports() {
    match midi::list_input_ports() {
        Ok(ports) => {
            println!("inputs:");
            for port in ports {
                println!("  {}: {}", port.index, port.name);
            }
        }
        Err(e) => println!("inputs unavailable: {}", e),
    }
    match midi::list_output_ports() {
        Ok(ports) => {
            println!("outputs:");
            for port in ports {
                println!("  {}: {}", port.index, port.name);
            }
        }
        Err(e) => println!("outputs unavailable: {}", e),
    }
}

fn print_status(controller: &Controller) {
    let snap = controller.selection().snapshot();
    let arp = controller.arp_config().snapshot();
    let cells: Vec<&str> = snap.cells.iter().map(|p| p.name()).collect();
    let triads: Vec<String> = snap.triads.iter().map(|id| id.to_string()).collect();
    println!(
        "cells [{}]  triads [{}]  hold {}  velocity {}",
        cells.join(" "),
        triads.join(" "),
        if snap.hold { "on" } else { "off" },
        snap.velocity
    );
    println!(
        "arpeggiator {}  tempo {}  meter {}  octaves {}  order {}",
        if controller.is_arpeggiator_running() { "running" } else { "stopped" },
        arp.tempo(),
        arp.time_signature().name(),
        arp.octave_span(),
        arp.order.name()
    );
    let settings = controller.settings();
    println!(
        "in {}  out {}  sounding {:?}",
        settings.port_in,
        controller.emitter().sink_name().unwrap_or_else(|| "simulated".to_string()),
        controller.emitter().sounding()
    );
}

fn main() {
    let args: Vec<String> = std::env::args().collect();
    let verbose = args.iter().any(|a| a == "--verbose" || a == "-v");
    if let Err(e) = init_logging(verbose) {
        eprintln!("tonnetz: logging disabled: {}", e);
    }

    if args.iter().any(|a| a == "--list-ports") {
        print_ports();
        return;
    }

    let settings_path = settings::default_path();
    let settings = match &settings_path {
        Some(path) => match Settings::load(path) {
            Ok(settings) => settings,
            Err(e) => {
                log::error!(target: "config", "{}", e);
                eprintln!("tonnetz: {}", e);
                std::process::exit(1);
            }
        },
        None => Settings::default(),
    };

    let mut controller = Controller::new(Config::load(), settings, settings_path);
    if let Err(e) = controller.start() {
        log::error!(target: "supervisor", "{}", e);
        eprintln!("tonnetz: {}", e);
        std::process::exit(1);
    }

    println!("tonnetz ready; type help for commands");
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    loop {
        print!("> ");
        let _ = stdout.flush();
        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                log::error!(target: "console", "stdin: {}", e);
                break;
            }
        }
        match console::parse(&line) {
            Ok(None) => {}
            Ok(Some(ConsoleCommand::Quit)) => break,
            Ok(Some(ConsoleCommand::Help)) => println!("{}", console::HELP),
            Ok(Some(ConsoleCommand::Status)) => print_status(&controller),
            Ok(Some(ConsoleCommand::Ports)) => print_ports(),
            Ok(Some(ConsoleCommand::Chord(notes))) => {
                if controller.selection().select_chord(&notes).is_empty() {
                    println!("no triad with those notes");
                }
            }
            Ok(Some(ConsoleCommand::Control(command))) => {
                if let Err(e) = controller.dispatch(command) {
                    println!("error: {}", e);
                }
            }
            Err(e) => println!("{}", e),
        }
    }

    controller.shutdown();
    log::info!("tonnetz stopped");
}
