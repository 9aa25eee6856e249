//! Pipeline commands
//!
//! The configuration surface of the pipeline, as messages sent from a
//! [`PipelineHandle`](super::PipelineHandle) to the processing loop. Also
//! parses the text commands accepted by the interactive CLI.

use thiserror::Error;
use tokio::sync::oneshot;

use crate::acquisition::SourceError;
use crate::config::FftWindowSize;
use crate::types::{Point, SelectionRect};

#[derive(Debug)]
pub enum PipelineCommand {
    Pause,
    /// Leave Paused or ZoomHeld; also clears the selection and resets axes
    Resume,
    TogglePause,
    SetFftEnabled(bool),
    SetFftWindow(FftWindowSize),
    /// Raw user-entered size; clamped, then applied after the debounce
    SetBufferSize(i64),
    /// Enter ZoomHeld on a data-space rectangle
    SelectRegion(SelectionRect),
    /// Drop the selection, reset axes and return to Running
    ResetSelection,
    /// Empty every buffer, keeping the channels
    ClearPoints,
    /// Send text to the source, one character at a time
    Post {
        text: String,
        reply: Option<oneshot::Sender<Result<(), SourceError>>>,
    },
    /// Reply once everything queued before this command has been processed
    Flush(oneshot::Sender<()>),
    Shutdown,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum CommandParseError {
    #[error("empty command")]
    Empty,

    #[error("unknown command '{0}' (try: pause, resume, fft on|off|SIZE, buffer N, zoom X0 Y0 X1 Y1, reset, clear, send TEXT, quit)")]
    Unknown(String),

    #[error("invalid argument for '{command}': {reason}")]
    InvalidArgument {
        command: &'static str,
        reason: String,
    },
}

fn invalid(command: &'static str, reason: impl Into<String>) -> CommandParseError {
    CommandParseError::InvalidArgument {
        command,
        reason: reason.into(),
    }
}

impl std::str::FromStr for PipelineCommand {
    type Err = CommandParseError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let input = input.trim();
        let (verb, rest) = input
            .split_once(char::is_whitespace)
            .map_or((input, ""), |(v, r)| (v, r.trim()));
        if verb.is_empty() {
            return Err(CommandParseError::Empty);
        }

        match verb.to_ascii_lowercase().as_str() {
            "pause" => Ok(Self::Pause),
            "resume" | "run" => Ok(Self::Resume),
            "toggle" | "p" => Ok(Self::TogglePause),
            "reset" | "reset-axis" | "unzoom" => Ok(Self::ResetSelection),
            "clear" => Ok(Self::ClearPoints),
            "quit" | "exit" | "q" => Ok(Self::Shutdown),
            "fft" => match rest.to_ascii_lowercase().as_str() {
                "on" => Ok(Self::SetFftEnabled(true)),
                "off" => Ok(Self::SetFftEnabled(false)),
                size => size
                    .parse::<FftWindowSize>()
                    .map(Self::SetFftWindow)
                    .map_err(|e| invalid("fft", e.to_string())),
            },
            "buffer" => rest
                .parse::<i64>()
                .map(Self::SetBufferSize)
                .map_err(|_| invalid("buffer", format!("'{rest}' is not an integer"))),
            "zoom" => {
                let values = rest
                    .split(|c: char| c == ',' || c.is_whitespace())
                    .filter(|t| !t.is_empty())
                    .map(str::parse::<f64>)
                    .collect::<Result<Vec<f64>, _>>()
                    .map_err(|e| invalid("zoom", e.to_string()))?;
                match values.as_slice() {
                    &[x0, y0, x1, y1] => Ok(Self::SelectRegion(SelectionRect::from_corners(
                        Point::new(x0, y0),
                        Point::new(x1, y1),
                    ))),
                    _ => Err(invalid("zoom", "expected four numbers: X0 Y0 X1 Y1")),
                }
            }
            "send" => {
                if rest.is_empty() {
                    Err(invalid("send", "nothing to send"))
                } else {
                    Ok(Self::Post {
                        text: rest.to_string(),
                        reply: None,
                    })
                }
            }
            _ => Err(CommandParseError::Unknown(verb.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_verbs() {
        assert!(matches!("pause".parse::<PipelineCommand>(), Ok(PipelineCommand::Pause)));
        assert!(matches!(" Resume ".parse::<PipelineCommand>(), Ok(PipelineCommand::Resume)));
        assert!(matches!("reset".parse::<PipelineCommand>(), Ok(PipelineCommand::ResetSelection)));
        assert!(matches!("clear".parse::<PipelineCommand>(), Ok(PipelineCommand::ClearPoints)));
        assert!(matches!("quit".parse::<PipelineCommand>(), Ok(PipelineCommand::Shutdown)));
    }

    #[test]
    fn parses_fft_variants() {
        assert!(matches!("fft on".parse::<PipelineCommand>(), Ok(PipelineCommand::SetFftEnabled(true))));
        assert!(matches!("fft OFF".parse::<PipelineCommand>(), Ok(PipelineCommand::SetFftEnabled(false))));
        match "fft 512".parse::<PipelineCommand>() {
            Ok(PipelineCommand::SetFftWindow(w)) => assert_eq!(w.get(), 512),
            other => panic!("unexpected: {other:?}"),
        }
        assert!("fft 500".parse::<PipelineCommand>().is_err());
    }

    #[test]
    fn buffer_accepts_out_of_range_integers() {
        assert!(matches!("buffer 1000".parse::<PipelineCommand>(), Ok(PipelineCommand::SetBufferSize(1000))));
        assert!(matches!("buffer -3".parse::<PipelineCommand>(), Ok(PipelineCommand::SetBufferSize(-3))));
        assert!("buffer lots".parse::<PipelineCommand>().is_err());
    }

    #[test]
    fn parses_zoom_rectangle() {
        match "zoom 10 -1, 2 3".parse::<PipelineCommand>() {
            Ok(PipelineCommand::SelectRegion(rect)) => {
                assert_eq!(rect.left(), 2.0);
                assert_eq!(rect.right(), 10.0);
            }
            other => panic!("unexpected: {other:?}"),
        }
        assert!("zoom 1 2 3".parse::<PipelineCommand>().is_err());
    }

    #[test]
    fn send_keeps_inner_spacing() {
        match "send hello  world".parse::<PipelineCommand>() {
            Ok(PipelineCommand::Post { text, reply: None }) => assert_eq!(text, "hello  world"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn rejects_unknown_and_empty() {
        assert_eq!(
            "dance".parse::<PipelineCommand>().unwrap_err(),
            CommandParseError::Unknown("dance".into())
        );
        assert_eq!("  ".parse::<PipelineCommand>().unwrap_err(), CommandParseError::Empty);
    }
}
