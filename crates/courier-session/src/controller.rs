use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{RwLock, mpsc, watch};
use tracing::{debug, info, warn};

use courier_db::Database;
use courier_gateway::Dispatcher;
use courier_types::events::{ClientEvent, CloseReason, GatewayEvent};
use courier_types::session::SessionStatus;

use crate::client::{ChatClient, ClientFactory, ClientSession, ConnectError};
use crate::inbound::InboundRouter;

/// Fixed reconnect delay after a non-logout disconnect. Not exponential:
/// the protocol server tolerates the retry rate, and a flat delay keeps the
/// restart window predictable for operators.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// How long an issued pairing code stays valid in the cache.
pub const DEFAULT_PAIRING_CODE_TTL: Duration = Duration::from_secs(120);

#[derive(Debug, Clone)]
pub struct ControllerConfig {
    pub session_id: String,
    pub reconnect_delay: Duration,
    pub pairing_code_ttl: Duration,
}

impl ControllerConfig {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            pairing_code_ttl: DEFAULT_PAIRING_CODE_TTL,
        }
    }
}

/// Shared view of the controller's session: the live client handle and the
/// in-memory authoritative status. Cheap to clone; handed to the HTTP
/// gateway instead of any process-wide singleton.
#[derive(Clone)]
pub struct SessionHandle {
    live: Arc<RwLock<Option<Arc<dyn ChatClient>>>>,
    status_tx: Arc<watch::Sender<SessionStatus>>,
}

impl SessionHandle {
    fn new() -> Self {
        let (status_tx, _) = watch::channel(SessionStatus::Unknown);
        Self {
            live: Arc::new(RwLock::new(None)),
            status_tx: Arc::new(status_tx),
        }
    }

    /// The live client, if the session is currently usable for sends.
    pub async fn client(&self) -> Option<Arc<dyn ChatClient>> {
        self.live.read().await.clone()
    }

    pub fn status(&self) -> SessionStatus {
        *self.status_tx.borrow()
    }

    /// Operator escape hatch: force the session into `logged_out`. A pending
    /// scheduled restart observes the change and suppresses itself.
    pub fn mark_logged_out(&self) {
        self.status_tx.send_replace(SessionStatus::LoggedOut);
    }

    async fn set_client(&self, client: Option<Arc<dyn ChatClient>>) {
        *self.live.write().await = client;
    }

    fn set_status(&self, status: SessionStatus) {
        self.status_tx.send_replace(status);
    }

    fn watch(&self) -> watch::Receiver<SessionStatus> {
        self.status_tx.subscribe()
    }
}

/// Owns the single protocol-client connection and keeps the stores and the
/// notification channel consistent with its true state.
///
/// There is never more than one live handle: the previous handle is cleared
/// before any restart is even scheduled, so no send can be dispatched
/// against a connection mid-teardown.
pub struct LifecycleController {
    db: Arc<Database>,
    dispatcher: Dispatcher,
    factory: Arc<dyn ClientFactory>,
    router: InboundRouter,
    handle: SessionHandle,
    config: ControllerConfig,
}

impl LifecycleController {
    pub fn new(
        db: Arc<Database>,
        dispatcher: Dispatcher,
        factory: Arc<dyn ClientFactory>,
        config: ControllerConfig,
    ) -> (Self, SessionHandle) {
        let handle = SessionHandle::new();
        let router = InboundRouter::new(
            db.clone(),
            dispatcher.clone(),
            Some(config.session_id.clone()),
        );
        let controller = Self {
            db,
            dispatcher,
            factory,
            router,
            handle: handle.clone(),
            config,
        };
        (controller, handle)
    }

    pub fn spawn(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Drive the session until it logs out. Connection losses loop back
    /// through a fixed-delay restart; logout is terminal.
    pub async fn run(self) {
        loop {
            self.transition(SessionStatus::Connecting, None);

            let ClientSession { client, mut events } = match self.factory.connect().await {
                Ok(session) => session,
                Err(ConnectError::LoggedOut) => {
                    self.finish_logged_out().await;
                    return;
                }
                Err(ConnectError::Other(e)) => {
                    warn!("client connect failed: {e:#}");
                    self.transition(SessionStatus::Reconnecting, None);
                    if !self.wait_for_restart().await {
                        self.finish_logged_out().await;
                        return;
                    }
                    continue;
                }
            };

            self.handle.set_client(Some(client)).await;
            let reason = self.drive(&mut events).await;

            // Discard the handle and its event stream before deciding what
            // comes next. Required so a restart never overlaps the old
            // connection.
            self.handle.set_client(None).await;
            drop(events);

            if reason.is_logout() {
                self.finish_logged_out().await;
                return;
            }

            warn!(
                "connection lost ({reason:?}), restarting in {:?}",
                self.config.reconnect_delay
            );
            self.transition(SessionStatus::Reconnecting, None);
            if !self.wait_for_restart().await {
                self.finish_logged_out().await;
                return;
            }
        }
    }

    /// Process events from one connection until it closes.
    async fn drive(&self, events: &mut mpsc::Receiver<ClientEvent>) -> CloseReason {
        let session_id = &self.config.session_id;

        while let Some(event) = events.recv().await {
            match event {
                ClientEvent::PairingCode(code) => {
                    debug!("pairing code issued");
                    if let Err(e) =
                        self.db
                            .put_pairing_code(session_id, &code, self.config.pairing_code_ttl)
                    {
                        warn!("pairing code store failed: {e:#}");
                    }
                    self.dispatcher.broadcast(GatewayEvent::Qr(code));
                }
                ClientEvent::Connected { phone } => {
                    info!(phone = ?phone, "session connected");
                    self.transition(SessionStatus::Connected, phone.as_deref());

                    // Re-push the code for observers that connected before
                    // this transition. Read from the store, not a local
                    // copy, so an expired code is never re-surfaced.
                    match self.db.get_pairing_code(session_id) {
                        Ok(Some(code)) => self.dispatcher.broadcast(GatewayEvent::Qr(code)),
                        Ok(None) => {}
                        Err(e) => warn!("pairing code lookup failed: {e:#}"),
                    }

                    self.dispatcher.broadcast(GatewayEvent::Connected);
                }
                ClientEvent::CredentialsUpdated => {
                    if let Err(e) = self.db.ensure_session(session_id) {
                        warn!("session upsert failed: {e:#}");
                    }
                }
                ClientEvent::Message(envelope) => {
                    self.router.handle(envelope).await;
                }
                ClientEvent::Closed { reason } => return reason,
            }
        }

        // Stream ended without a close event; treat as a transient loss.
        CloseReason::Other("event stream ended".into())
    }

    /// Wait out the fixed reconnect delay. Returns false when a logout
    /// arrived in the interim, in which case the restart must be suppressed.
    async fn wait_for_restart(&self) -> bool {
        let mut status_rx = self.handle.watch();
        let sleep = tokio::time::sleep(self.config.reconnect_delay);
        tokio::pin!(sleep);

        loop {
            tokio::select! {
                _ = &mut sleep => break,
                changed = status_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    if *status_rx.borrow() == SessionStatus::LoggedOut {
                        info!("logout during restart window, suppressing reconnect");
                        return false;
                    }
                }
            }
        }

        // Re-check at wake-up; suppression is an invariant, not a courtesy.
        self.handle.status() != SessionStatus::LoggedOut
    }

    /// Terminal transition: persist, drop the cached pairing code, tell the
    /// observers. No restart follows; only an operator can revive the
    /// session from here.
    async fn finish_logged_out(&self) {
        self.transition(SessionStatus::LoggedOut, None);
        if let Err(e) = self.db.delete_pairing_code(&self.config.session_id) {
            warn!("pairing code delete failed: {e:#}");
        }
        self.dispatcher.broadcast(GatewayEvent::SessionLoggedOut);
        info!("session logged out, automatic restart disabled");
    }

    /// Flip the in-memory status first (it is what readers race against),
    /// then persist. A failed persist is logged and swallowed.
    fn transition(&self, status: SessionStatus, phone: Option<&str>) {
        self.handle.set_status(status);
        debug!(status = %status, "lifecycle transition");
        if let Err(e) = self
            .db
            .set_session_status(&self.config.session_id, status, phone)
        {
            warn!("status persist failed: {e:#}");
        }
    }
}
