//! Line-oriented console commands.

use tonnetz_types::{ArpOrder, ControlCommand, Direction, PitchClass, ShapeId};

#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleCommand {
    Control(ControlCommand),
    /// Select the triad made of exactly these notes.
    Chord(Vec<PitchClass>),
    Status,
    Ports,
    Help,
    Quit,
}

pub const HELP: &str = "\
commands:
  cell <note> | uncell <note>          select / deselect a cell (e.g. cell Bb)
  triad <id> | release <id> | untriad <id>
  chord <note> <note> <note>           select the triad with these notes
  clear                                clear the lattice, all notes off
  hold                                 toggle hold mode
  left | right | up | down             move the last triad
  tempo <bpm> | meter <n/d> | octaves <n> | order <up|down|random>
  start | stop                         arpeggiator on / off
  in <port> | out <port>               select MIDI ports (no-midi for none)
  press <note> [velocity] | lift <note>   virtual keyboard
  size <factor> | dark <on|off>
  status | ports | help | quit";

pub fn parse(line: &str) -> Result<Option<ConsoleCommand>, String> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };
    let args: Vec<&str> = rest.split_whitespace().collect();

    let control = |cmd: ControlCommand| -> Result<Option<ConsoleCommand>, String> {
        Ok(Some(ConsoleCommand::Control(cmd)))
    };

    match word.to_ascii_lowercase().as_str() {
        "cell" => control(ControlCommand::SelectCell(pitch_arg(&args, 0)?)),
        "uncell" => control(ControlCommand::DeselectCell(pitch_arg(&args, 0)?)),
        "triad" => control(ControlCommand::SelectTriad(shape_arg(&args)?)),
        "release" => control(ControlCommand::ReleaseTriad(shape_arg(&args)?)),
        "untriad" => control(ControlCommand::DeselectTriad(shape_arg(&args)?)),
        "chord" => {
            if args.len() != 3 {
                return Err("chord needs three notes".to_string());
            }
            let notes = (0..3).map(|i| pitch_arg(&args, i)).collect::<Result<_, _>>()?;
            Ok(Some(ConsoleCommand::Chord(notes)))
        }
        "clear" => control(ControlCommand::ClearAll),
        "hold" => control(ControlCommand::ToggleHold),
        "left" | "right" | "up" | "down" => {
            let direction = Direction::parse(word).ok_or("bad direction")?;
            control(ControlCommand::Navigate(direction))
        }
        "nav" => {
            let direction = args
                .first()
                .and_then(|a| Direction::parse(a))
                .ok_or("nav needs left, right, up or down")?;
            control(ControlCommand::Navigate(direction))
        }
        "tempo" => control(ControlCommand::SetTempo(number_arg(&args, "tempo")?)),
        "meter" => {
            let (beats, unit) = rest
                .split_once('/')
                .ok_or_else(|| "meter needs n/d, e.g. 3/4".to_string())?;
            let beats = beats.trim().parse().map_err(|_| format!("bad meter: {}", rest))?;
            let unit = unit.trim().parse().map_err(|_| format!("bad meter: {}", rest))?;
            control(ControlCommand::SetTimeSignature(beats, unit))
        }
        "octaves" => control(ControlCommand::SetOctaveSpan(number_arg(&args, "octaves")?)),
        "order" => {
            let order = args
                .first()
                .and_then(|a| ArpOrder::parse(a))
                .ok_or("order needs up, down or random")?;
            control(ControlCommand::SetOrderMode(order))
        }
        "start" => control(ControlCommand::StartArpeggiator),
        "stop" => control(ControlCommand::StopArpeggiator),
        "in" => control(ControlCommand::SelectInputPort(port_arg(rest)?)),
        "out" => control(ControlCommand::SelectOutputPort(port_arg(rest)?)),
        "press" => {
            let velocity = match args.get(1) {
                Some(v) => v.parse().map_err(|_| format!("bad velocity: {}", v))?,
                None => 100,
            };
            control(ControlCommand::PressKey(pitch_arg(&args, 0)?, velocity))
        }
        "lift" => control(ControlCommand::ReleaseKey(pitch_arg(&args, 0)?)),
        "size" => control(ControlCommand::SetSizeFactor(number_arg(&args, "size")?)),
        "dark" => match args.first().copied() {
            Some("on") => control(ControlCommand::SetDarkMode(true)),
            Some("off") => control(ControlCommand::SetDarkMode(false)),
            _ => Err("dark needs on or off".to_string()),
        },
        "status" => Ok(Some(ConsoleCommand::Status)),
        "ports" => Ok(Some(ConsoleCommand::Ports)),
        "help" | "?" => Ok(Some(ConsoleCommand::Help)),
        "quit" | "exit" => Ok(Some(ConsoleCommand::Quit)),
        other => Err(format!("unknown command '{}' (try help)", other)),
    }
}

fn pitch_arg(args: &[&str], index: usize) -> Result<PitchClass, String> {
    let raw = args.get(index).ok_or("missing note")?;
    PitchClass::parse(raw).ok_or_else(|| format!("unknown note: {}", raw))
}

fn shape_arg(args: &[&str]) -> Result<ShapeId, String> {
    let id: u32 = number_arg(args, "triad id")?;
    Ok(ShapeId::new(id))
}

fn number_arg<T: std::str::FromStr>(args: &[&str], what: &str) -> Result<T, String> {
    let raw = args.first().ok_or_else(|| format!("missing {}", what))?;
    raw.parse().map_err(|_| format!("bad {}: {}", what, raw))
}

/// Port names may contain spaces; take the whole remainder.
fn port_arg(rest: &str) -> Result<String, String> {
    if rest.is_empty() {
        Err("missing port name".to_string())
    } else {
        Ok(rest.to_string())
    }
}
