//! Client input parsing.
//!
//! Each client line is either a chat message or a slash command. Parsing
//! happens on the trimmed line; empty lines carry no input at all.

use crate::error::ProtocolError;
use crate::COMMAND_MARKER;

/// A parsed client line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientInput {
    /// A plain chat line, broadcast to everyone.
    Chat(String),
    /// A slash command.
    Command(Command),
}

/// Commands a client can issue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `/pm <user> <text...>`: private message.
    Private {
        /// Recipient username.
        target: String,
        /// Message body, whitespace-normalized.
        body: String,
    },
    /// `/history`: replay the recent message history to the requester.
    History,
    /// `/users`: list online usernames to the requester.
    Users,
}

/// Parse one raw client line.
///
/// Returns `Ok(None)` when the trimmed line is empty.
///
/// # Errors
///
/// Returns the [`ProtocolError`] to report back to the issuing client
/// when the line is a malformed or unknown command.
pub fn parse_line(raw: &str) -> Result<Option<ClientInput>, ProtocolError> {
    let line = raw.trim();
    if line.is_empty() {
        return Ok(None);
    }
    if !line.starts_with(COMMAND_MARKER) {
        return Ok(Some(ClientInput::Chat(line.to_string())));
    }

    let parts: Vec<&str> = line.split_whitespace().collect();
    let name = parts[0];
    if name.len() == 1 {
        // A bare marker names no command at all.
        return Err(ProtocolError::InvalidCommand);
    }

    match name {
        "/pm" => {
            if parts.len() < 3 {
                return Err(ProtocolError::MalformedPrivate);
            }
            Ok(Some(ClientInput::Command(Command::Private {
                target: parts[1].to_string(),
                body: parts[2..].join(" "),
            })))
        }
        "/history" => Ok(Some(ClientInput::Command(Command::History))),
        "/users" => Ok(Some(ClientInput::Command(Command::Users))),
        other => Err(ProtocolError::UnknownCommand(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_line() {
        assert_eq!(parse_line(""), Ok(None));
        assert_eq!(parse_line("   \t  "), Ok(None));
        assert_eq!(parse_line("\n"), Ok(None));
    }

    #[test]
    fn test_chat_line() {
        assert_eq!(
            parse_line("hello everyone"),
            Ok(Some(ClientInput::Chat("hello everyone".to_string())))
        );
        // Leading/trailing whitespace is stripped, inner kept.
        assert_eq!(
            parse_line("  hi  there \n"),
            Ok(Some(ClientInput::Chat("hi  there".to_string())))
        );
    }

    #[test]
    fn test_private_command() {
        assert_eq!(
            parse_line("/pm bob secret plan"),
            Ok(Some(ClientInput::Command(Command::Private {
                target: "bob".to_string(),
                body: "secret plan".to_string(),
            })))
        );
    }

    #[test]
    fn test_private_requires_target_and_body() {
        assert_eq!(parse_line("/pm"), Err(ProtocolError::MalformedPrivate));
        assert_eq!(parse_line("/pm bob"), Err(ProtocolError::MalformedPrivate));
    }

    #[test]
    fn test_history_and_users() {
        assert_eq!(
            parse_line("/history"),
            Ok(Some(ClientInput::Command(Command::History)))
        );
        assert_eq!(
            parse_line("/users"),
            Ok(Some(ClientInput::Command(Command::Users)))
        );
    }

    #[test]
    fn test_bare_marker_is_invalid() {
        assert_eq!(parse_line("/"), Err(ProtocolError::InvalidCommand));
        assert_eq!(parse_line("/ pm bob hi"), Err(ProtocolError::InvalidCommand));
    }

    #[test]
    fn test_unknown_command() {
        assert_eq!(
            parse_line("/nick alice"),
            Err(ProtocolError::UnknownCommand("/nick".to_string()))
        );
    }
}
