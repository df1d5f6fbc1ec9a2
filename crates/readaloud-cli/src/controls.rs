//! Interactive playback commands typed on the terminal.

use std::str::FromStr;

use readaloud_player::PlaybackController;

use crate::error::CliError;

/// One line of terminal input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Play,
    Pause,
    Resume,
    Skip,
    Reset,
    /// Zero-based segment index.
    PlayAt(usize),
    Help,
    Quit,
}

/// What the input loop should do after a control was applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

pub const HELP: &str = "\
Commands: p pause | r resume | s skip | x stop | g play from start | <n> play sentence n | q quit";

impl FromStr for Control {
    type Err = CliError;

    /// Sentence numbers are 1-based on the terminal.
    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let control = match line.to_ascii_lowercase().as_str() {
            "g" | "play" => Self::Play,
            "p" | "pause" => Self::Pause,
            "r" | "resume" => Self::Resume,
            "s" | "skip" | "n" | "next" => Self::Skip,
            "x" | "stop" | "reset" => Self::Reset,
            "h" | "?" | "help" => Self::Help,
            "q" | "quit" | "exit" => Self::Quit,
            other => match other.parse::<usize>() {
                Ok(n) if n > 0 => Self::PlayAt(n - 1),
                Ok(_) => {
                    return Err(CliError::Arguments("sentences are numbered from 1".into()));
                }
                Err(_) => return Err(CliError::Arguments(format!("unknown command '{line}'"))),
            },
        };
        Ok(control)
    }
}

/// Parse a terminal line; blank lines yield `None`.
pub fn parse_line(line: &str) -> Result<Option<Control>, CliError> {
    if line.trim().is_empty() {
        return Ok(None);
    }
    line.parse().map(Some)
}

/// Forward `control` to the controller.
pub async fn apply(controller: &PlaybackController, control: Control) -> Flow {
    tracing::debug!(?control, "Terminal command");
    match control {
        Control::Play => controller.play().await,
        Control::Pause => controller.pause().await,
        Control::Resume => controller.resume().await,
        Control::Skip => controller.skip().await,
        Control::Reset => controller.reset().await,
        Control::PlayAt(index) => {
            let total = controller.segments().len();
            if index < total {
                controller.play_at(index).await;
            } else {
                println!("There are only {total} sentences.");
            }
        }
        Control::Help => println!("{HELP}"),
        Control::Quit => {
            controller.reset().await;
            return Flow::Quit;
        }
    }
    Flow::Continue
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_letters_and_words() {
        assert_eq!("p".parse::<Control>().unwrap(), Control::Pause);
        assert_eq!(" Resume ".parse::<Control>().unwrap(), Control::Resume);
        assert_eq!("next".parse::<Control>().unwrap(), Control::Skip);
        assert_eq!("x".parse::<Control>().unwrap(), Control::Reset);
        assert_eq!("Q".parse::<Control>().unwrap(), Control::Quit);
    }

    #[test]
    fn test_parse_sentence_numbers_are_one_based() {
        assert_eq!("1".parse::<Control>().unwrap(), Control::PlayAt(0));
        assert_eq!("12".parse::<Control>().unwrap(), Control::PlayAt(11));
        assert!("0".parse::<Control>().is_err());
    }

    #[test]
    fn test_parse_unknown_and_blank() {
        let err = "jump".parse::<Control>().unwrap_err();
        assert!(err.to_string().contains("jump"));
        assert_eq!(parse_line("   ").unwrap(), None);
        assert_eq!(parse_line("s\n").unwrap(), Some(Control::Skip));
    }
}
