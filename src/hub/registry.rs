use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{AppError, WebSocketError};
use crate::hub::Event;

/// Which sessions a dispatch targets.
#[derive(Debug, Clone, PartialEq)]
pub enum Scope {
    All,
    User(String),
}

/// Non-owning view of a live session held by the registry. The session's own
/// reader/writer tasks own the transport and the mailbox receiver; the registry
/// holds the only sender, so removal from the map closes the mailbox exactly
/// once.
#[derive(Debug)]
pub struct SessionHandle {
    pub user_id: Option<String>,
    pub client_id: String,
    pub connected_at: DateTime<Utc>,
    tx: mpsc::Sender<Arc<str>>,
}

impl SessionHandle {
    pub fn new(user_id: Option<String>, client_id: String, tx: mpsc::Sender<Arc<str>>) -> Self {
        Self {
            user_id,
            client_id,
            connected_at: Utc::now(),
            tx,
        }
    }

    fn matches(&self, scope: &Scope) -> bool {
        match scope {
            Scope::All => true,
            Scope::User(user_id) => self.user_id.as_deref() == Some(user_id.as_str()),
        }
    }
}

/// Sole source of truth for which sessions are connected. The map is the only
/// state shared across tasks; the lock is held around map access only, never
/// across transport I/O.
#[derive(Debug)]
pub struct Registry {
    sessions: RwLock<HashMap<Uuid, SessionHandle>>,
    closed: AtomicBool,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            closed: AtomicBool::new(false),
        }
    }

    /// Insert a session and return its id. The entry is visible to dispatch
    /// before this returns, so the caller may start the session tasks
    /// immediately afterwards. Session ids are never reused.
    pub async fn register(&self, handle: SessionHandle) -> crate::Result<Uuid> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(AppError::WebSocketError(WebSocketError::HubClosed));
        }

        let id = Uuid::new_v4();
        let mut sessions = self.sessions.write().await;
        info!(
            "Session {} connected (client {}, user {:?}, total {})",
            id,
            handle.client_id,
            handle.user_id,
            sessions.len() + 1
        );
        sessions.insert(id, handle);
        Ok(id)
    }

    /// Remove a session if present. Idempotent; the second call is a no-op.
    /// Dropping the handle drops the mailbox sender, which is what closes the
    /// mailbox and lets the writer task wind down.
    pub async fn unregister(&self, id: &Uuid) -> bool {
        let removed = {
            let mut sessions = self.sessions.write().await;
            sessions.remove(id).is_some()
        };
        if removed {
            info!("Session {} disconnected", id);
        }
        removed
    }

    /// Fan a pre-serialized frame out to every session matching `scope`,
    /// taken at the moment of the call. Enqueueing is strictly non-blocking:
    /// a full or closed mailbox marks that session dead and it is unregistered
    /// after the lock is released, without stalling the other recipients.
    /// Returns the number of mailboxes the frame was enqueued into.
    pub async fn dispatch(&self, frame: &Arc<str>, scope: &Scope) -> usize {
        let mut delivered = 0;
        let mut stale = Vec::new();

        {
            let sessions = self.sessions.read().await;
            for (id, handle) in sessions.iter() {
                if !handle.matches(scope) {
                    continue;
                }
                match handle.tx.try_send(frame.clone()) {
                    Ok(()) => delivered += 1,
                    Err(mpsc::error::TrySendError::Full(_)) => {
                        warn!("Session {} mailbox saturated, dropping it", id);
                        stale.push(*id);
                    }
                    Err(mpsc::error::TrySendError::Closed(_)) => {
                        debug!("Session {} mailbox already closed", id);
                        stale.push(*id);
                    }
                }
            }
        }

        for id in stale {
            self.unregister(&id).await;
        }

        delivered
    }

    /// Deliver an event to every session of one user (0, 1, or N devices).
    /// Zero matches is not an error; offline users simply miss the hint and
    /// re-fetch state through the ordinary read path.
    pub async fn notify(&self, user_id: &str, event: &Event) -> usize {
        match event.to_frame() {
            Ok(frame) => {
                let delivered = self
                    .dispatch(&frame, &Scope::User(user_id.to_string()))
                    .await;
                debug!(
                    "Event {} for user {} delivered to {} session(s)",
                    event.event_type, user_id, delivered
                );
                delivered
            }
            Err(e) => {
                warn!("Skipping undeliverable event {}: {}", event.event_type, e);
                0
            }
        }
    }

    /// Deliver an event to every session registered at the moment of the
    /// call, anonymous sessions included.
    pub async fn broadcast(&self, event: &Event) -> usize {
        match event.to_frame() {
            Ok(frame) => self.dispatch(&frame, &Scope::All).await,
            Err(e) => {
                warn!("Skipping undeliverable event {}: {}", event.event_type, e);
                0
            }
        }
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Stop accepting registrations and drop every session. Closing the
    /// mailboxes makes each writer task send a Close frame and shut its
    /// transport down.
    pub async fn shutdown(&self) {
        self.closed.store(true, Ordering::SeqCst);
        let drained = {
            let mut sessions = self.sessions.write().await;
            std::mem::take(&mut *sessions)
        };
        info!("Registry shut down, dropped {} session(s)", drained.len());
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}
