use clap::Parser;
use std::path::PathBuf;

pub mod status;
pub use status::StatusDisplay;

/// Longest command line accepted in command mode, in bytes
pub const MAX_COMMAND_LEN: usize = 255;

/// Terminal WAV player
#[derive(Debug, Parser)]
#[command(name = "wavplay")]
#[command(about = "Play the .wav files of a directory from the terminal")]
#[command(version)]
pub struct CliArgs {
    /// Directory to scan for .wav files
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Descend into subdirectories (0 = no, anything else = yes)
    #[arg(default_value_t = 1, allow_negative_numbers = true)]
    pub recursive: i64,
}

impl CliArgs {
    pub fn is_recursive(&self) -> bool {
        self.recursive != 0
    }
}

/// A command-mode instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Play a 1-based track number; `None` means the first track
    Play(Option<usize>),
    List,
    /// Toggle playlist looping
    Loop,
    /// Set the volume in percent
    Volume(i32),
    Clear,
    Help,
    About,
    Quit,
}

/// A single-keystroke player-mode instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerKey {
    TogglePause,
    Next,
    ToggleTrackLoop,
    Quit,
}

impl PlayerKey {
    pub fn from_char(c: char) -> Option<Self> {
        match c {
            ' ' => Some(PlayerKey::TogglePause),
            'n' => Some(PlayerKey::Next),
            'l' => Some(PlayerKey::ToggleTrackLoop),
            'q' => Some(PlayerKey::Quit),
            _ => None,
        }
    }

    /// Every recognised key in `line`, in order; other characters are ignored
    pub fn parse_line(line: &str) -> Vec<Self> {
        line.chars().filter_map(Self::from_char).collect()
    }
}

/// Parse one command-mode input line
pub fn parse_command(input: &str) -> Result<Command, ParseError> {
    if input.len() > MAX_COMMAND_LEN {
        return Err(ParseError::CommandTooLong {
            len: input.len(),
            max: MAX_COMMAND_LEN,
        });
    }

    let args: Vec<&str> = input.split_whitespace().collect();
    let Some(&name) = args.first() else {
        return Err(ParseError::EmptyCommand);
    };

    let max_args = match name {
        "play" | "volume" => 2,
        _ => 1,
    };
    if args.len() > max_args {
        return Err(ParseError::UnknownCommand {
            command: input.trim().to_string(),
        });
    }

    match name {
        "play" => match args.get(1) {
            None => Ok(Command::Play(None)),
            Some(value) => match value.parse::<usize>() {
                Ok(n) if n >= 1 => Ok(Command::Play(Some(n))),
                _ => Err(ParseError::InvalidArgument {
                    argument: "track number".to_string(),
                    value: value.to_string(),
                    expected: "a number from 1".to_string(),
                }),
            },
        },
        "volume" => {
            let value = args.get(1).ok_or_else(|| ParseError::MissingArgument {
                command: "volume".to_string(),
                argument: "percent".to_string(),
            })?;
            value
                .parse::<i32>()
                .map(Command::Volume)
                .map_err(|_| ParseError::InvalidArgument {
                    argument: "volume".to_string(),
                    value: value.to_string(),
                    expected: "integer 0-199".to_string(),
                })
        }
        "list" => Ok(Command::List),
        "loop" => Ok(Command::Loop),
        "clear" => Ok(Command::Clear),
        "help" => Ok(Command::Help),
        "about" => Ok(Command::About),
        "quit" | "exit" => Ok(Command::Quit),
        _ => Err(ParseError::UnknownCommand {
            command: input.trim().to_string(),
        }),
    }
}

/// Command parsing errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("Empty command")]
    EmptyCommand,

    #[error("Command is {len} bytes long (limit {max})")]
    CommandTooLong { len: usize, max: usize },

    #[error("Unknown command: {command}")]
    UnknownCommand { command: String },

    #[error("Missing argument for {command}: {argument}")]
    MissingArgument { command: String, argument: String },

    #[error("Invalid argument {argument}: got '{value}', expected {expected}")]
    InvalidArgument {
        argument: String,
        value: String,
        expected: String,
    },
}

impl ParseError {
    pub fn user_message(&self) -> String {
        match self {
            ParseError::EmptyCommand => String::new(),
            ParseError::CommandTooLong { max, .. } => {
                format!("command too long (at most {} characters)", max)
            }
            ParseError::UnknownCommand { command } => {
                format!("invalid command: {}\n(help) for possible commands", command)
            }
            ParseError::MissingArgument { command, argument } => {
                format!("{} needs a {}", command, argument)
            }
            ParseError::InvalidArgument {
                argument,
                value,
                expected,
            } => format!("invalid {}: {} (expected {})", argument, value, expected),
        }
    }
}
