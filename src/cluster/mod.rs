//! Cross-process fan-out over Redis pub/sub.
//!
//! A single process only knows its local sessions. Every process publishes
//! dispatched events on a shared channel and re-injects what it receives into
//! its own registry, so a notification reaches a user no matter which process
//! holds their connection. Delivery stays best-effort and duplicate-tolerant;
//! every event here is an idempotent UI hint.

use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::config::ClusterConfig;
use crate::hub::{Event, Registry, Scope};

/// Wire format on the shared channel.
#[derive(Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "scope", rename_all = "snake_case")]
pub enum ClusterEnvelope {
    User { user_id: String, event: Event },
    All { event: Event },
}

impl ClusterEnvelope {
    fn from_dispatch(scope: &Scope, event: &Event) -> Self {
        match scope {
            Scope::User(user_id) => Self::User {
                user_id: user_id.clone(),
                event: event.clone(),
            },
            Scope::All => Self::All {
                event: event.clone(),
            },
        }
    }
}

/// Seam between the dispatcher and whatever carries events across processes.
/// `publish` must be non-blocking and failure-tolerant from the caller's side.
#[async_trait]
pub trait FanOut: Send + Sync {
    async fn publish(&self, scope: &Scope, event: &Event);
}

/// Stand-in when no cluster channel is configured; keeps call sites free of
/// presence checks.
pub struct NoopFanOut;

#[async_trait]
impl FanOut for NoopFanOut {
    async fn publish(&self, _scope: &Scope, _event: &Event) {}
}

/// Publishes envelopes on the shared Redis channel. The Redis I/O runs on a
/// background task fed through a bounded queue, so a slow or absent broker
/// never stalls a `notify` caller; an overflowing queue drops the envelope,
/// the same policy as a saturated session mailbox.
pub struct RedisFanOut {
    tx: mpsc::Sender<String>,
}

impl RedisFanOut {
    pub async fn connect(config: &ClusterConfig) -> crate::Result<Self> {
        let client = redis::Client::open(config.redis_url.as_str())?;
        let mut conn = redis::aio::ConnectionManager::new(client).await?;
        let channel = config.channel.clone();
        let (tx, mut rx) = mpsc::channel::<String>(config.publish_queue);

        tokio::spawn(async move {
            while let Some(payload) = rx.recv().await {
                if let Err(e) = conn.publish::<_, _, ()>(&channel, payload).await {
                    error!("Cluster publish failed: {}", e);
                }
            }
        });

        Ok(Self { tx })
    }
}

#[async_trait]
impl FanOut for RedisFanOut {
    async fn publish(&self, scope: &Scope, event: &Event) {
        let envelope = ClusterEnvelope::from_dispatch(scope, event);
        let payload = match serde_json::to_string(&envelope) {
            Ok(payload) => payload,
            Err(e) => {
                warn!("Skipping unserializable cluster event {}: {}", event.event_type, e);
                return;
            }
        };
        if self.tx.try_send(payload).is_err() {
            warn!(
                "Cluster publish queue full, dropping {} event",
                event.event_type
            );
        }
    }
}

/// Deliver one received envelope into the local registry.
async fn reinject(registry: &Registry, payload: &str) {
    match serde_json::from_str::<ClusterEnvelope>(payload) {
        Ok(ClusterEnvelope::User { user_id, event }) => {
            registry.notify(&user_id, &event).await;
        }
        Ok(ClusterEnvelope::All { event }) => {
            registry.broadcast(&event).await;
        }
        Err(e) => warn!("Ignoring malformed cluster message: {}", e),
    }
}

/// Subscribe to the shared channel and re-inject everything received,
/// the publisher's own messages included. Runs until the connection ends.
pub async fn run_subscriber(config: ClusterConfig, registry: Arc<Registry>) -> crate::Result<()> {
    let client = redis::Client::open(config.redis_url.as_str())?;
    // Pub/sub needs a dedicated connection, not the multiplexed one
    let conn = client.get_async_connection().await?;
    let mut pubsub = conn.into_pubsub();
    pubsub.subscribe(&config.channel).await?;
    info!("Subscribed to cluster channel {}", config.channel);

    let mut stream = pubsub.on_message();
    while let Some(msg) = stream.next().await {
        let payload: String = match msg.get_payload() {
            Ok(payload) => payload,
            Err(e) => {
                warn!("Unreadable cluster message: {}", e);
                continue;
            }
        };
        reinject(&registry, &payload).await;
    }

    warn!("Cluster subscription on {} ended", config.channel);
    Ok(())
}
