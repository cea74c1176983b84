//! Command dispatch.
//!
//! Classifies one inbound text payload, runs the matching handler, and
//! sends exactly one reply to the originating sender. Handler failures are
//! rendered into the reply at this boundary; nothing a command does can
//! take the dispatch loop or the session down.

use tracing::{debug, error};
use uuid::Uuid;

use super::{classify, math, shell, structured, Command, CommandError, CommandReply};
use crate::session::SessionHandle;

/// Execute one classified command.
pub async fn execute(command: Command) -> Result<CommandReply, CommandError> {
    match command {
        Command::Shell(line) => shell::run(&line).await,
        Command::Structured { name, args } => structured::run(&name, &args).await,
        Command::Math(expr) => math::run(&expr),
        Command::Unrecognized(_) => Err(CommandError::Format),
    }
}

/// Render a handler error into the reply text sent back to the sender.
pub fn render_error(err: &CommandError) -> String {
    format!("Error: {err}")
}

/// Dispatch one inbound text payload end to end.
///
/// Intended to run in its own spawned task; a slow handler suspends only
/// its own command.
pub async fn dispatch_text(session: SessionHandle, sender_id: String, text: String) {
    let run_id = Uuid::new_v4();
    let command = classify(&text);
    debug!(
        target: "commands",
        run_id = %run_id,
        sender = %sender_id,
        kind = command.kind(),
        "dispatching inbound command"
    );

    let payload = match execute(command).await {
        Ok(reply) => reply.into_payload(),
        Err(err) => crate::transport::OutboundPayload::Text(render_error(&err)),
    };

    if let Err(err) = session.send(&sender_id, payload).await {
        error!(
            target: "commands",
            run_id = %run_id,
            sender = %sender_id,
            "failed to deliver command reply: {err}"
        );
    }
}
