//! Command classification and execution.
//!
//! Inbound text is classified into a command namespace by its first
//! character and routed to a handler. Handlers never take the session
//! down: every failure is an error value the dispatcher renders into a
//! reply.

pub mod dispatch;
pub mod math;
pub mod shell;
pub mod structured;

use thiserror::Error;

use crate::transport::{OutboundAttachment, OutboundPayload, TransportError};

/// The classified form of an inbound text payload.
///
/// Exactly one variant per payload, selected solely by the first character.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `$`: the remainder is a raw shell command line
    Shell(String),
    /// `/`: the remainder is a named subcommand with space-separated args
    Structured { name: String, args: Vec<String> },
    /// `£`: the remainder is an arithmetic expression
    Math(String),
    /// Anything else (including empty text)
    Unrecognized(String),
}

impl Command {
    /// Short label for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Shell(_) => "shell",
            Self::Structured { .. } => "structured",
            Self::Math(_) => "math",
            Self::Unrecognized(_) => "unrecognized",
        }
    }
}

/// Classify one text payload. Pure and total: every input maps to exactly
/// one command variant.
pub fn classify(text: &str) -> Command {
    let mut chars = text.chars();
    match chars.next() {
        Some('$') => Command::Shell(chars.as_str().to_string()),
        Some('/') => {
            let mut parts = chars.as_str().split(' ');
            let name = parts.next().unwrap_or("").to_string();
            let args = parts.map(str::to_string).collect();
            Command::Structured { name, args }
        }
        Some('£') => Command::Math(chars.as_str().to_string()),
        _ => Command::Unrecognized(text.to_string()),
    }
}

/// Errors produced by command handlers.
///
/// All of these are non-fatal: the dispatcher converts them into a reply to
/// the sender and carries on.
#[derive(Error, Debug)]
pub enum CommandError {
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("{0}")]
    Argument(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("execution failed: {0}")]
    Execution(String),

    #[error("could not evaluate expression: {0}")]
    Evaluation(String),

    #[error("unknown command: {0}")]
    UnknownCommand(String),

    #[error("unknown message format: use $ for shell commands, / for structured commands, or £ for math")]
    Format,

    #[error("file not found: {0}")]
    NotFound(String),
}

/// Successful outcome of executing a command.
#[derive(Debug, Clone)]
pub enum CommandReply {
    /// A text block
    Text(String),
    /// A file attachment referencing a local path
    File(OutboundAttachment),
}

impl CommandReply {
    /// Convert into the transport payload for the outbound send.
    pub fn into_payload(self) -> OutboundPayload {
        match self {
            Self::Text(text) => OutboundPayload::Text(text),
            Self::File(attachment) => OutboundPayload::File(attachment),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_shell() {
        assert_eq!(
            classify("$ls -la"),
            Command::Shell("ls -la".to_string())
        );
        // An empty remainder is still a shell command.
        assert_eq!(classify("$"), Command::Shell(String::new()));
    }

    #[test]
    fn test_classify_structured() {
        assert_eq!(
            classify("/readfile /tmp/a.txt"),
            Command::Structured {
                name: "readfile".to_string(),
                args: vec!["/tmp/a.txt".to_string()],
            }
        );
        assert_eq!(
            classify("/sysinfo"),
            Command::Structured {
                name: "sysinfo".to_string(),
                args: vec![],
            }
        );
    }

    #[test]
    fn test_classify_math() {
        assert_eq!(classify("£2+2"), Command::Math("2+2".to_string()));
    }

    #[test]
    fn test_classify_unrecognized() {
        assert_eq!(
            classify("hello there"),
            Command::Unrecognized("hello there".to_string())
        );
        assert_eq!(classify(""), Command::Unrecognized(String::new()));
        // Prefix characters only count in the first position.
        assert_eq!(
            classify("say $hi"),
            Command::Unrecognized("say $hi".to_string())
        );
    }

    #[test]
    fn test_classify_is_total_over_first_char() {
        for text in ["$x", "/x", "£x", "!x", " x", "x"] {
            let command = classify(text);
            let expected = match text.chars().next().unwrap() {
                '$' => "shell",
                '/' => "structured",
                '£' => "math",
                _ => "unrecognized",
            };
            assert_eq!(command.kind(), expected, "payload {text:?}");
        }
    }

    #[test]
    fn test_structured_args_split_on_single_spaces() {
        // Consecutive spaces yield empty args, matching a split on every
        // single space.
        assert_eq!(
            classify("/listfiles  /tmp"),
            Command::Structured {
                name: "listfiles".to_string(),
                args: vec![String::new(), "/tmp".to_string()],
            }
        );
    }
}
