//! Session lifecycle.
//!
//! Owns the one live transport connection, drives pairing, persists
//! credential updates, and re-establishes dropped connections. The
//! reconnect policy is an explicit loop with bounded exponential backoff;
//! an explicit logout is terminal and stops the loop for good.

use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

use crate::config::ReconnectSettings;
use crate::credentials::CredentialStore;
use crate::pairing::PairingDisplay;
use crate::transport::{
    Credentials, DisconnectReason, InboundMessage, MessageOrigin, OutboundPayload, Transport,
    TransportError, TransportEvent, TransportHandle,
};

/// Lifecycle state of the logical session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No credentials yet; the transport has not asked for pairing
    Unauthenticated,
    /// A pairing challenge has been issued and awaits out-of-band scanning
    AwaitingPairing,
    /// The transport connection is open and authenticated
    Connected,
    /// The connection dropped for a retryable reason; re-establishing
    Reconnecting,
    /// The server invalidated the session. Terminal.
    LoggedOut,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unauthenticated => write!(f, "unauthenticated"),
            Self::AwaitingPairing => write!(f, "awaiting_pairing"),
            Self::Connected => write!(f, "connected"),
            Self::Reconnecting => write!(f, "reconnecting"),
            Self::LoggedOut => write!(f, "logged_out"),
        }
    }
}

/// Events the session manager fans out to the gateway.
#[derive(Debug)]
pub enum SessionEvent {
    /// The session state changed
    StateChanged(SessionState),
    /// An inbound message from a remote contact (echoes already filtered)
    Message(InboundMessage),
}

struct SessionShared {
    state: RwLock<SessionState>,
    handle: RwLock<Option<Arc<dyn TransportHandle>>>,
    last_disconnect: RwLock<Option<DisconnectReason>>,
}

/// Cloneable read/send view of the session.
///
/// Everything outside the session manager uses this: it can observe the
/// state and send outbound messages, but never mutate the lifecycle.
#[derive(Clone)]
pub struct SessionHandle {
    shared: Arc<SessionShared>,
}

impl SessionHandle {
    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        *self.shared.state.read()
    }

    /// Reason for the most recent disconnect, if any.
    pub fn last_disconnect(&self) -> Option<DisconnectReason> {
        self.shared.last_disconnect.read().clone()
    }

    /// Deliver an outbound message through the live connection.
    ///
    /// Fails with [`TransportError::NotConnected`] unless the session is
    /// Connected. Never retried automatically; the caller decides.
    pub async fn send(
        &self,
        recipient_id: &str,
        payload: OutboundPayload,
    ) -> Result<(), TransportError> {
        let handle = {
            if self.state() != SessionState::Connected {
                return Err(TransportError::NotConnected);
            }
            // Clone the Arc out of the lock; the send itself awaits.
            self.shared
                .handle
                .read()
                .clone()
                .ok_or(TransportError::NotConnected)?
        };
        handle.send(recipient_id, payload).await
    }

    /// Materialize the bytes of an inbound document attachment.
    pub async fn fetch_document(&self, reference: &str) -> Result<Vec<u8>, TransportError> {
        let handle = self
            .shared
            .handle
            .read()
            .clone()
            .ok_or(TransportError::NotConnected)?;
        handle.fetch_document(reference).await
    }
}

/// Drives the session lifecycle state machine.
pub struct SessionManager {
    transport: Arc<dyn Transport>,
    credential_store: Arc<dyn CredentialStore>,
    pairing_display: Arc<dyn PairingDisplay>,
    reconnect: ReconnectSettings,
    shared: Arc<SessionShared>,
    events_tx: mpsc::UnboundedSender<SessionEvent>,
}

impl SessionManager {
    /// Create a session manager plus the handle and event stream the rest
    /// of the system consumes.
    pub fn new(
        transport: Arc<dyn Transport>,
        credential_store: Arc<dyn CredentialStore>,
        pairing_display: Arc<dyn PairingDisplay>,
        reconnect: ReconnectSettings,
    ) -> (
        Self,
        SessionHandle,
        mpsc::UnboundedReceiver<SessionEvent>,
    ) {
        let shared = Arc::new(SessionShared {
            state: RwLock::new(SessionState::Unauthenticated),
            handle: RwLock::new(None),
            last_disconnect: RwLock::new(None),
        });
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let manager = Self {
            transport,
            credential_store,
            pairing_display,
            reconnect,
            shared: shared.clone(),
            events_tx,
        };
        (manager, SessionHandle { shared }, events_rx)
    }

    fn set_state(&self, state: SessionState) {
        {
            let mut current = self.shared.state.write();
            if *current == state {
                return;
            }
            *current = state;
        }
        info!(target: "session", state = %state, "session state changed");
        let _ = self.events_tx.send(SessionEvent::StateChanged(state));
    }

    /// Run the connection loop until shutdown or logout.
    ///
    /// Reconnects with exponential backoff (reset on every successful
    /// connect) on retryable disconnects. Returns after an explicit logout
    /// or when the shutdown signal flips; never reconnects past a logout.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut backoff = self.reconnect.initial_delay();

        loop {
            if *shutdown.borrow() {
                break;
            }

            let credentials = match self.credential_store.load() {
                Ok(Some(credentials)) => credentials,
                Ok(None) => Credentials::empty(),
                Err(e) => {
                    warn!(target: "session", "failed to load credentials, starting fresh: {e}");
                    Credentials::empty()
                }
            };

            match self.transport.connect(credentials).await {
                Ok((handle, mut events)) => {
                    backoff = self.reconnect.initial_delay();
                    *self.shared.handle.write() = Some(Arc::from(handle));

                    let reason = self.consume_events(&mut events, &mut shutdown).await;

                    *self.shared.handle.write() = None;
                    *self.shared.last_disconnect.write() = reason.clone();

                    match reason {
                        Some(DisconnectReason::LoggedOut) => {
                            info!(target: "session", "logged out; reconnect disabled");
                            self.set_state(SessionState::LoggedOut);
                            return;
                        }
                        Some(reason) => {
                            warn!(target: "session", reason = %reason, "connection closed");
                        }
                        None => {
                            if *shutdown.borrow() {
                                break;
                            }
                            warn!(target: "session", "event stream ended without a disconnect reason");
                        }
                    }
                }
                Err(e) => {
                    warn!(target: "session", "connect failed: {e}");
                }
            }

            if *shutdown.borrow() {
                break;
            }

            self.set_state(SessionState::Reconnecting);
            debug!(target: "session", delay_ms = backoff.as_millis() as u64, "reconnecting after backoff");
            tokio::time::sleep(backoff).await;
            backoff = (backoff * 2).min(self.reconnect.max_delay());
        }

        info!(target: "session", "session loop exited");
    }

    /// Consume one connection's event stream.
    ///
    /// Returns the disconnect reason, or `None` if the stream ended bare or
    /// shutdown was requested.
    async fn consume_events(
        &self,
        events: &mut mpsc::UnboundedReceiver<TransportEvent>,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Option<DisconnectReason> {
        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        return None;
                    }
                }
                event = events.recv() => {
                    let Some(event) = event else { return None; };
                    match event {
                        TransportEvent::PairingRequired(challenge) => {
                            self.set_state(SessionState::AwaitingPairing);
                            self.pairing_display.show(&challenge);
                        }
                        TransportEvent::Connected => {
                            self.set_state(SessionState::Connected);
                        }
                        TransportEvent::CredentialsUpdate(credentials) => {
                            // Persisted before the loop advances: a later
                            // reconnect can never pick up a stale blob.
                            if let Err(e) = self.credential_store.persist(&credentials) {
                                error!(target: "session", "failed to persist credentials: {e}");
                            }
                        }
                        TransportEvent::Message(message) => {
                            if message.origin == MessageOrigin::Me {
                                // Echo of our own send; dispatching it would
                                // loop the gateway against itself.
                                continue;
                            }
                            let _ = self.events_tx.send(SessionEvent::Message(message));
                        }
                        TransportEvent::Disconnected(reason) => {
                            return Some(reason);
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::MemoryCredentialStore;
    use crate::pairing::NullPairingDisplay;
    use crate::transport::channel::{ChannelController, ChannelTransport};
    use crate::transport::{MessagePayload, PairingChallenge};
    use std::time::Duration;

    fn fast_reconnect() -> ReconnectSettings {
        ReconnectSettings {
            initial_delay_ms: 10,
            max_delay_ms: 40,
        }
    }

    struct Fixture {
        controller: ChannelController,
        handle: SessionHandle,
        events: mpsc::UnboundedReceiver<SessionEvent>,
        shutdown_tx: watch::Sender<bool>,
        run_task: tokio::task::JoinHandle<()>,
    }

    fn start_session(store: Arc<dyn CredentialStore>) -> Fixture {
        let (transport, controller) = ChannelTransport::pair();
        let (manager, handle, events) = SessionManager::new(
            Arc::new(transport),
            store,
            Arc::new(NullPairingDisplay),
            fast_reconnect(),
        );
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let run_task = tokio::spawn(manager.run(shutdown_rx));
        Fixture {
            controller,
            handle,
            events,
            shutdown_tx,
            run_task,
        }
    }

    async fn wait_for_connects(controller: &ChannelController, count: usize) {
        for _ in 0..200 {
            if controller.connect_count() >= count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("transport never reached {count} connects");
    }

    #[tokio::test]
    async fn test_connected_event_updates_state() {
        let mut fx = start_session(Arc::new(MemoryCredentialStore::new()));
        wait_for_connects(&fx.controller, 1).await;

        fx.controller.emit(TransportEvent::Connected);

        match fx.events.recv().await.unwrap() {
            SessionEvent::StateChanged(SessionState::Connected) => {}
            other => panic!("expected Connected state change, got {other:?}"),
        }
        assert_eq!(fx.handle.state(), SessionState::Connected);

        let _ = fx.shutdown_tx.send(true);
    }

    #[tokio::test]
    async fn test_pairing_challenge_moves_state() {
        let mut fx = start_session(Arc::new(MemoryCredentialStore::new()));
        wait_for_connects(&fx.controller, 1).await;

        fx.controller
            .emit(TransportEvent::PairingRequired(PairingChallenge {
                code: "scan-me".to_string(),
                timeout_secs: 30,
            }));

        match fx.events.recv().await.unwrap() {
            SessionEvent::StateChanged(SessionState::AwaitingPairing) => {}
            other => panic!("expected AwaitingPairing, got {other:?}"),
        }

        let _ = fx.shutdown_tx.send(true);
    }

    #[tokio::test]
    async fn test_logout_is_terminal() {
        let fx = start_session(Arc::new(MemoryCredentialStore::new()));
        wait_for_connects(&fx.controller, 1).await;

        fx.controller.emit(TransportEvent::Connected);
        fx.controller
            .emit(TransportEvent::Disconnected(DisconnectReason::LoggedOut));

        // The run loop must return on its own, without a shutdown signal.
        tokio::time::timeout(Duration::from_secs(2), fx.run_task)
            .await
            .expect("session loop should exit after logout")
            .unwrap();

        assert_eq!(fx.handle.state(), SessionState::LoggedOut);
        assert_eq!(fx.controller.connect_count(), 1, "no reconnect after logout");
    }

    #[tokio::test]
    async fn test_retryable_disconnect_reconnects() {
        let fx = start_session(Arc::new(MemoryCredentialStore::new()));
        wait_for_connects(&fx.controller, 1).await;

        fx.controller.emit(TransportEvent::Connected);
        fx.controller
            .emit(TransportEvent::Disconnected(DisconnectReason::ConnectionLost {
                message: "stream reset".to_string(),
            }));

        wait_for_connects(&fx.controller, 2).await;
        assert!(fx.handle.state() != SessionState::LoggedOut);

        let _ = fx.shutdown_tx.send(true);
    }

    #[tokio::test]
    async fn test_credentials_persisted_before_reconnect() {
        let store = Arc::new(MemoryCredentialStore::new());
        let fx = start_session(store.clone());
        wait_for_connects(&fx.controller, 1).await;
        assert_eq!(
            fx.controller.connect_credentials(0),
            Some(Credentials::empty())
        );

        let issued = Credentials(vec![42, 42]);
        fx.controller
            .emit(TransportEvent::CredentialsUpdate(issued.clone()));
        fx.controller
            .emit(TransportEvent::Disconnected(DisconnectReason::ConnectionLost {
                message: "flap".to_string(),
            }));

        wait_for_connects(&fx.controller, 2).await;
        // The reconnect must have observed the persisted update, not the
        // empty credentials it started with.
        assert_eq!(fx.controller.connect_credentials(1), Some(issued));

        let _ = fx.shutdown_tx.send(true);
    }

    #[tokio::test]
    async fn test_self_messages_are_filtered() {
        let mut fx = start_session(Arc::new(MemoryCredentialStore::new()));
        wait_for_connects(&fx.controller, 1).await;

        fx.controller.emit(TransportEvent::Connected);
        fx.controller.emit(TransportEvent::Message(InboundMessage {
            sender_id: "me".to_string(),
            origin: MessageOrigin::Me,
            payload: MessagePayload::Text("$echo loop".to_string()),
        }));
        fx.controller.emit(TransportEvent::Message(InboundMessage {
            sender_id: "contact-1".to_string(),
            origin: MessageOrigin::Remote,
            payload: MessagePayload::Text("hello".to_string()),
        }));

        // Skip the Connected state change, then the first message event we
        // see must be the remote one; the echo never surfaces.
        loop {
            match fx.events.recv().await.unwrap() {
                SessionEvent::StateChanged(_) => continue,
                SessionEvent::Message(message) => {
                    assert_eq!(message.sender_id, "contact-1");
                    break;
                }
            }
        }

        let _ = fx.shutdown_tx.send(true);
    }

    #[tokio::test]
    async fn test_send_requires_connected_state() {
        let fx = start_session(Arc::new(MemoryCredentialStore::new()));
        wait_for_connects(&fx.controller, 1).await;

        // Connection is open but the transport has not reported Connected.
        let result = fx
            .handle
            .send("contact-1", OutboundPayload::text("too early"))
            .await;
        assert!(matches!(result, Err(TransportError::NotConnected)));

        let _ = fx.shutdown_tx.send(true);
    }

    #[tokio::test]
    async fn test_bare_stream_end_is_retryable() {
        let fx = start_session(Arc::new(MemoryCredentialStore::new()));
        wait_for_connects(&fx.controller, 1).await;

        fx.controller.emit(TransportEvent::Connected);
        fx.controller.drop_stream();

        wait_for_connects(&fx.controller, 2).await;

        let _ = fx.shutdown_tx.send(true);
    }
}
