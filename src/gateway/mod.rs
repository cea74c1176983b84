//! Gateway run loop.
//!
//! Consumes session events and turns them into work: text payloads go to
//! the command dispatcher, document payloads to the upload store. Each
//! inbound message is handled in its own task, so one slow command never
//! stalls delivery of the next event.

use std::sync::Arc;

use tracing::{debug, error};

use crate::commands::dispatch;
use crate::session::{SessionEvent, SessionHandle};
use crate::transport::{InboundMessage, MessagePayload, OutboundPayload};
use crate::uploads::UploadStore;

/// Wires session events into command dispatch and file transfer.
pub struct Gateway {
    session: SessionHandle,
    uploads: Arc<UploadStore>,
}

impl Gateway {
    pub fn new(session: SessionHandle, uploads: Arc<UploadStore>) -> Self {
        Self { session, uploads }
    }

    /// Run until the session event stream ends.
    pub async fn run(self, mut events: tokio::sync::mpsc::UnboundedReceiver<SessionEvent>) {
        while let Some(event) = events.recv().await {
            match event {
                SessionEvent::StateChanged(state) => {
                    debug!(target: "gateway", state = %state, "session state observed");
                }
                SessionEvent::Message(message) => self.handle_message(message),
            }
        }
        debug!(target: "gateway", "session event stream ended");
    }

    fn handle_message(&self, message: InboundMessage) {
        let InboundMessage {
            sender_id, payload, ..
        } = message;
        match payload {
            MessagePayload::Text(text) => {
                tokio::spawn(dispatch::dispatch_text(
                    self.session.clone(),
                    sender_id,
                    text,
                ));
            }
            MessagePayload::Document { name, reference } => {
                tokio::spawn(handle_document(
                    self.session.clone(),
                    self.uploads.clone(),
                    sender_id,
                    name,
                    reference,
                ));
            }
        }
    }
}

/// Persist one inbound document and confirm (or report failure) to the
/// sender as text.
async fn handle_document(
    session: SessionHandle,
    uploads: Arc<UploadStore>,
    sender_id: String,
    name: String,
    reference: String,
) {
    let reply = match receive_document(&session, &uploads, &name, &reference).await {
        Ok(stored_path) => format!("File uploaded successfully. Path: {stored_path}"),
        Err(message) => format!("Error uploading file: {message}"),
    };
    if let Err(err) = session.send(&sender_id, OutboundPayload::Text(reply)).await {
        error!(
            target: "gateway",
            sender = %sender_id,
            "failed to deliver upload confirmation: {err}"
        );
    }
}

async fn receive_document(
    session: &SessionHandle,
    uploads: &UploadStore,
    name: &str,
    reference: &str,
) -> Result<String, String> {
    let bytes = session
        .fetch_document(reference)
        .await
        .map_err(|e| e.to_string())?;
    let upload = uploads
        .receive(name, &bytes)
        .await
        .map_err(|e| e.to_string())?;
    debug!(
        target: "uploads",
        name = %upload.name,
        path = %upload.stored_path.display(),
        bytes = bytes.len(),
        "inbound document stored"
    );
    Ok(upload.stored_path.display().to_string())
}
