//! Command routing and the fixed handler set.
//!
//! The dispatch table is closed at build time: `echo` replies with its
//! arguments, `exec` starts a detached process. Adding a command is one arm
//! in [`Handler::lookup`] plus a variant here.

use std::process::Stdio;

use tokio::process;
use tracing::info;

use crate::protocol::{Command, CommandError};

/// The fixed set of command handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handler {
    /// Send the arguments back verbatim.
    Echo,
    /// Start the named program as a detached process.
    Launch,
}

impl Handler {
    /// Look up the handler bound to a command name.
    pub fn lookup(name: &str) -> Option<Handler> {
        match name {
            "echo" => Some(Handler::Echo),
            "exec" => Some(Handler::Launch),
            _ => None,
        }
    }
}

/// Route a parsed command to its handler and execute it.
///
/// Returns the reply payload the session should send back, if the handler
/// produces one. Unknown names and handler failures come back as
/// [`CommandError`] values and never produce a reply.
pub fn dispatch(command: &Command) -> Result<Option<String>, CommandError> {
    let handler = match Handler::lookup(&command.name) {
        Some(handler) => handler,
        None => return Err(CommandError::Unknown(command.name.clone())),
    };

    match handler {
        Handler::Echo => Ok(Some(command.arguments.clone())),
        Handler::Launch => {
            launch(&command.arguments)?;
            Ok(None)
        }
    }
}

/// Start `command_line` as a detached child process.
///
/// The first whitespace-separated token is the program, the remaining tokens
/// its arguments. The child is not awaited and its output is not captured;
/// the handle is dropped so the process simply outlives the session. The
/// command line is executed exactly as the client named it.
fn launch(command_line: &str) -> Result<(), CommandError> {
    let mut parts = command_line.split_whitespace();
    let program = match parts.next() {
        Some(program) => program,
        None => {
            return Err(CommandError::Launch {
                command: "exec".to_string(),
                reason: "empty command line".to_string(),
            })
        }
    };

    match process::Command::new(program)
        .args(parts)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
    {
        Ok(child) => {
            info!(program, pid = ?child.id(), "launched external process");
            Ok(())
        }
        Err(e) => Err(CommandError::Launch {
            command: "exec".to_string(),
            reason: e.to_string(),
        }),
    }
}
