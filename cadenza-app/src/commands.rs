//! Terminal command parsing.

use cadenza_core::PlayerAction;

/// A line typed at the prompt
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Player(PlayerAction),
    List,
    Help,
    Quit,
}

pub const HELP: &str = "\
Commands:
  p, play, pause     toggle play/pause
  n, next            skip forward
  b, back, prev      skip back
  s, stop            stop playback
  <number>           play track <number> from the list
  v, volume <0-100>  set volume
  l, list            list tracks
  h, help            show this help
  q, quit            exit";

/// Parse one input line. Returns `None` for blank lines and `Err` with a
/// message for anything unrecognized.
pub fn parse(line: &str) -> Result<Option<Command>, String> {
    let mut words = line.split_whitespace();
    let Some(word) = words.next() else {
        return Ok(None);
    };
    let arg = words.next();

    let command = match word.to_ascii_lowercase().as_str() {
        "p" | "play" | "pause" => Command::Player(PlayerAction::TogglePlay),
        "n" | "next" => Command::Player(PlayerAction::SkipForward),
        "b" | "back" | "prev" => Command::Player(PlayerAction::SkipBack),
        "s" | "stop" => Command::Player(PlayerAction::Stop),
        "l" | "list" => Command::List,
        "h" | "help" | "?" => Command::Help,
        "q" | "quit" | "exit" => Command::Quit,
        "v" | "volume" => {
            let percent: u8 = arg
                .ok_or("volume needs a value between 0 and 100")?
                .parse()
                .map_err(|_| "volume must be a whole number between 0 and 100")?;
            if percent > 100 {
                return Err("volume must be between 0 and 100".to_string());
            }
            Command::Player(PlayerAction::SetVolume(f32::from(percent) / 100.0))
        }
        other => match other.parse::<usize>() {
            Ok(0) => return Err("tracks are numbered from 1".to_string()),
            Ok(number) => Command::Player(PlayerAction::Select(number - 1)),
            Err(_) => return Err(format!("unknown command {other:?}, type 'help'")),
        },
    };
    Ok(Some(command))
}
