//! In-process channel transport.
//!
//! Delivers events and outbound messages over tokio channels instead of a
//! network. Used by the integration tests and by `pincer start`'s local
//! console loop; no network calls are made.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc;
use uuid::Uuid;

use super::{
    Credentials, InboundMessage, MessageOrigin, MessagePayload, OutboundPayload, Transport,
    TransportError, TransportEvent, TransportHandle,
};

/// One outbound message observed by the controller.
#[derive(Debug, Clone)]
pub struct OutboundRecord {
    pub recipient_id: String,
    pub payload: OutboundPayload,
}

struct ChannelShared {
    /// Event sender for the currently open connection, if any
    event_tx: Mutex<Option<mpsc::UnboundedSender<TransportEvent>>>,
    /// Observed outbound messages
    outbound_tx: mpsc::UnboundedSender<OutboundRecord>,
    /// Staged document bytes, keyed by opaque reference
    documents: RwLock<HashMap<String, Vec<u8>>>,
    /// Credentials each connect call was given, in order
    connect_credentials: Mutex<Vec<Credentials>>,
}

/// The transport half: handed to the session manager.
pub struct ChannelTransport {
    shared: Arc<ChannelShared>,
}

/// The controller half: drives the fake network from tests or the console
/// loop. Injects events, stages documents, observes outbound messages.
pub struct ChannelController {
    shared: Arc<ChannelShared>,
    outbound_rx: Mutex<Option<mpsc::UnboundedReceiver<OutboundRecord>>>,
}

impl ChannelTransport {
    /// Create a connected transport/controller pair.
    pub fn pair() -> (Self, ChannelController) {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let shared = Arc::new(ChannelShared {
            event_tx: Mutex::new(None),
            outbound_tx,
            documents: RwLock::new(HashMap::new()),
            connect_credentials: Mutex::new(Vec::new()),
        });
        (
            Self {
                shared: shared.clone(),
            },
            ChannelController {
                shared,
                outbound_rx: Mutex::new(Some(outbound_rx)),
            },
        )
    }
}

#[async_trait]
impl Transport for ChannelTransport {
    async fn connect(
        &self,
        credentials: Credentials,
    ) -> Result<
        (
            Box<dyn TransportHandle>,
            mpsc::UnboundedReceiver<TransportEvent>,
        ),
        TransportError,
    > {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        *self.shared.event_tx.lock() = Some(event_tx);
        // Recorded after the event stream is live, so a caller that polls
        // the connect count can emit immediately.
        self.shared.connect_credentials.lock().push(credentials);

        let handle = ChannelHandle {
            shared: self.shared.clone(),
        };
        Ok((Box::new(handle), event_rx))
    }
}

struct ChannelHandle {
    shared: Arc<ChannelShared>,
}

#[async_trait]
impl TransportHandle for ChannelHandle {
    async fn send(
        &self,
        recipient_id: &str,
        payload: OutboundPayload,
    ) -> Result<(), TransportError> {
        self.shared
            .outbound_tx
            .send(OutboundRecord {
                recipient_id: recipient_id.to_string(),
                payload,
            })
            .map_err(|e| TransportError::SendFailed(e.to_string()))
    }

    async fn fetch_document(&self, reference: &str) -> Result<Vec<u8>, TransportError> {
        self.shared
            .documents
            .read()
            .get(reference)
            .cloned()
            .ok_or_else(|| TransportError::FetchFailed(format!("unknown reference: {reference}")))
    }
}

impl ChannelController {
    /// Push a raw transport event into the current connection's stream.
    ///
    /// Returns false if no connection is open or the stream was dropped.
    pub fn emit(&self, event: TransportEvent) -> bool {
        match self.shared.event_tx.lock().as_ref() {
            Some(tx) => tx.send(event).is_ok(),
            None => false,
        }
    }

    /// Close the current connection's event stream without a disconnect
    /// event (simulates the stream going away mid-flight).
    pub fn drop_stream(&self) {
        *self.shared.event_tx.lock() = None;
    }

    /// Inject an inbound text message from a remote contact.
    pub fn inject_text(&self, sender_id: &str, text: &str) -> bool {
        self.emit(TransportEvent::Message(InboundMessage {
            sender_id: sender_id.to_string(),
            origin: MessageOrigin::Remote,
            payload: MessagePayload::Text(text.to_string()),
        }))
    }

    /// Stage document bytes and inject the matching inbound message.
    pub fn inject_document(&self, sender_id: &str, name: &str, bytes: Vec<u8>) -> bool {
        let reference = Uuid::new_v4().to_string();
        self.shared
            .documents
            .write()
            .insert(reference.clone(), bytes);
        self.emit(TransportEvent::Message(InboundMessage {
            sender_id: sender_id.to_string(),
            origin: MessageOrigin::Remote,
            payload: MessagePayload::Document {
                name: name.to_string(),
                reference,
            },
        }))
    }

    /// Take ownership of the outbound message stream.
    ///
    /// Only one taker is allowed; subsequent calls return `None`.
    pub fn take_outbound(&self) -> Option<mpsc::UnboundedReceiver<OutboundRecord>> {
        self.outbound_rx.lock().take()
    }

    /// Await the next outbound message. Unusable after `take_outbound`.
    pub async fn next_outbound(&mut self) -> Option<OutboundRecord> {
        self.outbound_rx.get_mut().as_mut()?.recv().await
    }

    /// How many times the transport has been connected.
    pub fn connect_count(&self) -> usize {
        self.shared.connect_credentials.lock().len()
    }

    /// The credentials passed to connect attempt `index` (0-based).
    pub fn connect_credentials(&self, index: usize) -> Option<Credentials> {
        self.shared.connect_credentials.lock().get(index).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connect_records_credentials() {
        let (transport, controller) = ChannelTransport::pair();
        let creds = Credentials(vec![7, 7, 7]);
        let (_handle, _events) = transport.connect(creds.clone()).await.unwrap();
        assert_eq!(controller.connect_count(), 1);
        assert_eq!(controller.connect_credentials(0), Some(creds));
    }

    #[tokio::test]
    async fn test_send_is_observed_by_controller() {
        let (transport, mut controller) = ChannelTransport::pair();
        let (handle, _events) = transport.connect(Credentials::empty()).await.unwrap();

        handle
            .send("contact-1", OutboundPayload::text("hello"))
            .await
            .unwrap();

        let record = controller.next_outbound().await.unwrap();
        assert_eq!(record.recipient_id, "contact-1");
        match record.payload {
            OutboundPayload::Text(text) => assert_eq!(text, "hello"),
            other => panic!("expected text payload, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_document_staging_round_trip() {
        let (transport, controller) = ChannelTransport::pair();
        let (handle, mut events) = transport.connect(Credentials::empty()).await.unwrap();

        assert!(controller.inject_document("contact-1", "notes.txt", b"contents".to_vec()));

        let event = events.recv().await.unwrap();
        let reference = match event {
            TransportEvent::Message(InboundMessage {
                payload: MessagePayload::Document { reference, .. },
                ..
            }) => reference,
            other => panic!("expected document message, got {other:?}"),
        };

        let bytes = handle.fetch_document(&reference).await.unwrap();
        assert_eq!(bytes, b"contents");
    }

    #[tokio::test]
    async fn test_fetch_unknown_reference_fails() {
        let (transport, _controller) = ChannelTransport::pair();
        let (handle, _events) = transport.connect(Credentials::empty()).await.unwrap();
        let result = handle.fetch_document("missing").await;
        assert!(matches!(result, Err(TransportError::FetchFailed(_))));
    }
}
