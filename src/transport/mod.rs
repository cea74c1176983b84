//! Transport capability boundary.
//!
//! The gateway rides on top of an external chat-messaging connection. This
//! module defines the capability traits and event types the rest of the
//! system consumes; the wire protocol behind them is a collaborator's
//! concern. An in-process implementation lives in [`channel`] for tests and
//! local development.

pub mod channel;

use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;

/// Opaque credential material issued by the transport.
///
/// The gateway never inspects the contents; it only loads, forwards, and
/// persists them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials(pub Vec<u8>);

impl Credentials {
    /// Credentials for a fresh, never-paired session.
    pub fn empty() -> Self {
        Self(Vec::new())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A pairing challenge to be rendered out-of-band (QR code or pair code).
#[derive(Debug, Clone)]
pub struct PairingChallenge {
    /// Challenge payload to render
    pub code: String,
    /// How long the challenge remains valid
    pub timeout_secs: u32,
}

/// Why the transport connection closed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    /// The server invalidated the session. Terminal: no reconnect may ever
    /// be attempted after this.
    LoggedOut,
    /// A transient failure (network drop, stream error). Reconnect expected.
    ConnectionLost { message: String },
}

impl DisconnectReason {
    /// Whether the session may be re-established after this disconnect.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::LoggedOut)
    }
}

impl std::fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LoggedOut => write!(f, "logged out"),
            Self::ConnectionLost { message } => write!(f, "connection lost: {}", message),
        }
    }
}

/// Where a message originated relative to our own account.
///
/// Messages we sent ourselves come back on the same stream on some
/// transports; they must never be dispatched as commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageOrigin {
    /// Sent by our own account (echo)
    Me,
    /// Sent by a remote contact
    Remote,
}

/// Payload of one received message.
#[derive(Debug, Clone)]
pub enum MessagePayload {
    /// Plain text
    Text(String),
    /// Document attachment. The bytes are fetched lazily through
    /// [`TransportHandle::fetch_document`] using the opaque reference.
    Document { name: String, reference: String },
}

/// One message received from the transport.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    /// Opaque conversation identifier replies are addressed to
    pub sender_id: String,
    /// Echo classification
    pub origin: MessageOrigin,
    /// Message content
    pub payload: MessagePayload,
}

/// A file attachment referencing a local path, for outbound delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundAttachment {
    /// File name shown to the recipient
    pub name: String,
    /// Local path the transport reads the bytes from
    pub source_path: PathBuf,
    /// MIME type of the attachment
    pub mime_type: String,
}

/// Payload of one outbound message.
#[derive(Debug, Clone)]
pub enum OutboundPayload {
    Text(String),
    File(OutboundAttachment),
}

impl OutboundPayload {
    /// Create a text payload.
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }
}

/// Events emitted by a live transport connection.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// The transport requires out-of-band pairing before it can open
    PairingRequired(PairingChallenge),
    /// The connection is open and authenticated
    Connected,
    /// The transport issued new credential material; it must be persisted
    /// before any reconnect attempt
    CredentialsUpdate(Credentials),
    /// A message arrived
    Message(InboundMessage),
    /// The connection closed
    Disconnected(DisconnectReason),
}

/// Transport errors
#[derive(Error, Debug, Clone)]
pub enum TransportError {
    #[error("no session is connected")]
    NotConnected,
    #[error("connect failed: {0}")]
    ConnectFailed(String),
    #[error("send failed: {0}")]
    SendFailed(String),
    #[error("attachment fetch failed: {0}")]
    FetchFailed(String),
}

/// Handle to a live transport connection.
#[async_trait]
pub trait TransportHandle: Send + Sync {
    /// Deliver an outbound message. Returns once the transport client layer
    /// has acknowledged the send. Not retried automatically.
    async fn send(&self, recipient_id: &str, payload: OutboundPayload)
        -> Result<(), TransportError>;

    /// Materialize the bytes of an inbound document attachment.
    async fn fetch_document(&self, reference: &str) -> Result<Vec<u8>, TransportError>;
}

/// Capability interface to the chat network.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Open a connection with the given credentials (empty for a fresh,
    /// never-paired session). Returns a handle for outbound operations and
    /// the connection's event stream; the stream ends when the connection
    /// closes.
    async fn connect(
        &self,
        credentials: Credentials,
    ) -> Result<
        (
            Box<dyn TransportHandle>,
            mpsc::UnboundedReceiver<TransportEvent>,
        ),
        TransportError,
    >;
}

/// Generic MIME type used for all outbound attachments.
pub const OCTET_STREAM: &str = "application/octet-stream";
