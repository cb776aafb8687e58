//! Command protocol parser.
//!
//! The wire protocol is one text message per command:
//!
//! ```text
//! <command> <arguments>
//! ```
//!
//! The command name is one or more ASCII letters (case-insensitive), followed
//! by exactly one space, followed by the arguments running to the end of the
//! message. There is no quoting and no escaping; the first space is the only
//! delimiter the parser knows about.

/// Maximum accepted message length in bytes, including any NUL padding.
pub const MAX_MESSAGE_LENGTH: usize = 1024;

/// Parsed command: lowercased name plus the untouched argument text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    /// Lowercased command name, ASCII letters only.
    pub name: String,
    /// Everything after the first space, byte for byte.
    pub arguments: String,
}

/// Severity class attached to a command failure when it is logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Caller mistake, expected to recur benignly.
    Warning,
    /// Server-side or protocol-contract violation.
    Error,
}

/// Failures raised while parsing, routing, or executing one command.
///
/// These never reach the client; the session logs them and keeps serving.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// Message was empty.
    Empty,
    /// Message length reached the protocol limit.
    Oversized(usize),
    /// Message did not match `<letters><space><arguments>`.
    Malformed(String),
    /// Command name is not in the dispatch table.
    Unknown(String),
    /// Launch handler could not start the requested process.
    Launch { command: String, reason: String },
    /// Sending a reply on the connection channel failed.
    Send { command: String, reason: String },
}

impl CommandError {
    /// Severity used when logging this failure.
    pub fn severity(&self) -> Severity {
        match self {
            CommandError::Empty | CommandError::Oversized(_) | CommandError::Malformed(_) => {
                Severity::Warning
            }
            CommandError::Unknown(_)
            | CommandError::Launch { .. }
            | CommandError::Send { .. } => Severity::Error,
        }
    }

    /// The offending command label carried for diagnostics.
    ///
    /// For grammar failures this is the raw input, since no name was ever
    /// extracted from it.
    pub fn label(&self) -> &str {
        match self {
            CommandError::Empty | CommandError::Oversized(_) => "",
            CommandError::Malformed(raw) => raw,
            CommandError::Unknown(name) => name,
            CommandError::Launch { command, .. } => command,
            CommandError::Send { command, .. } => command,
        }
    }
}

impl std::fmt::Display for CommandError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CommandError::Empty => write!(f, "empty message"),
            CommandError::Oversized(len) => write!(
                f,
                "message of {} bytes exceeds {} byte limit",
                len, MAX_MESSAGE_LENGTH
            ),
            CommandError::Malformed(raw) => write!(f, "malformed command line: {:?}", raw),
            CommandError::Unknown(name) => write!(f, "unknown command: {}", name),
            CommandError::Launch { reason, .. } => write!(f, "launch failed: {}", reason),
            CommandError::Send { reason, .. } => write!(f, "reply send failed: {}", reason),
        }
    }
}

impl std::error::Error for CommandError {}

/// Parse one raw inbound message into a command.
///
/// Empty and oversized messages are rejected before any grammar work.
/// Trailing NUL padding and line terminators are trimmed once; whatever
/// follows the first space is preserved exactly, trailing spaces included.
pub fn parse(raw: &str) -> Result<Command, CommandError> {
    if raw.is_empty() {
        return Err(CommandError::Empty);
    }
    if raw.len() >= MAX_MESSAGE_LENGTH {
        return Err(CommandError::Oversized(raw.len()));
    }

    let message = raw.trim_end_matches(['\0', '\r', '\n']);
    if message.is_empty() {
        return Err(CommandError::Empty);
    }

    let (name, arguments) = match message.split_once(' ') {
        Some(parts) => parts,
        None => return Err(CommandError::Malformed(message.to_string())),
    };

    if name.is_empty() || !name.bytes().all(|b| b.is_ascii_alphabetic()) {
        return Err(CommandError::Malformed(message.to_string()));
    }

    if arguments.is_empty() {
        return Err(CommandError::Malformed(message.to_string()));
    }

    Ok(Command {
        name: name.to_ascii_lowercase(),
        arguments: arguments.to_string(),
    })
}
