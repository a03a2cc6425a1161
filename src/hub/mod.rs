//! Connection registry and fan-out hub.
//!
//! One `Hub` owns the session registry for a process. Transport connections
//! come in through `handle_connection`; business modules publish through the
//! `Notifier` facade and never touch the transport.

mod dispatcher;
mod event;
pub(crate) mod registry;
mod server;
mod session;

pub use dispatcher::Notifier;
pub use event::Event;
pub use registry::{Registry, Scope, SessionHandle};

use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite};

use crate::cluster::{FanOut, NoopFanOut};
use crate::config::HubConfig;

/// An explicit hub instance with its own lifecycle. Construct one per process
/// (or several under test) and inject its `Notifier` into the modules that
/// publish; there is no process-wide singleton.
pub struct Hub {
    registry: Arc<Registry>,
    config: HubConfig,
    fan_out: Arc<dyn FanOut>,
}

impl Hub {
    /// A standalone hub with no cross-process channel.
    pub fn new(config: HubConfig) -> Self {
        Self::with_fan_out(config, Arc::new(NoopFanOut))
    }

    /// A hub wired to a cluster fan-out adapter.
    pub fn with_fan_out(config: HubConfig, fan_out: Arc<dyn FanOut>) -> Self {
        Self {
            registry: Arc::new(Registry::new()),
            config,
            fan_out,
        }
    }

    /// The publishing facade business collaborators hold on to.
    pub fn notifier(&self) -> Notifier {
        Notifier::new(self.registry.clone(), self.fan_out.clone())
    }

    /// Shared registry handle, used to wire the cluster subscriber.
    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    /// Admit one accepted transport: perform the WebSocket upgrade, register
    /// the session, and drive it until teardown. Runs for the lifetime of the
    /// connection; callers normally spawn it.
    pub async fn handle_connection<S>(&self, stream: S, peer: String)
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        server::handle_connection(self.registry.clone(), self.config.clone(), stream, peer).await;
    }

    pub async fn session_count(&self) -> usize {
        self.registry.len().await
    }

    /// Close every live session and refuse new registrations. Dispatching
    /// afterwards delivers to nothing.
    pub async fn shutdown(&self) {
        self.registry.shutdown().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HubConfig;
    use serde_json::json;
    use tokio::sync::mpsc;

    fn test_config() -> HubConfig {
        HubConfig {
            mailbox_capacity: 4,
            probe_interval_secs: 30,
            liveness_timeout_secs: 40,
            max_frame_bytes: 1024,
        }
    }

    #[tokio::test]
    async fn test_hubs_are_independent() {
        let hub_a = Hub::new(test_config());
        let hub_b = Hub::new(test_config());

        let (tx, mut rx_a) = mpsc::channel(4);
        hub_a
            .registry()
            .register(SessionHandle::new(Some("u1".into()), "c1".into(), tx))
            .await
            .unwrap();

        hub_b.notifier().notify("u1", "order_update", json!({})).await;
        assert!(rx_a.try_recv().is_err());

        hub_a.notifier().notify("u1", "order_update", json!({})).await;
        assert!(rx_a.try_recv().is_ok());

        assert_eq!(hub_a.session_count().await, 1);
        assert_eq!(hub_b.session_count().await, 0);
    }

    #[tokio::test]
    async fn test_shutdown_closes_sessions_and_stops_admission() {
        let hub = Hub::new(test_config());
        let (tx, mut rx) = mpsc::channel(4);
        hub.registry()
            .register(SessionHandle::new(None, "c1".into(), tx))
            .await
            .unwrap();

        hub.shutdown().await;
        assert_eq!(hub.session_count().await, 0);
        assert!(rx.recv().await.is_none());

        let (tx2, _rx2) = mpsc::channel(4);
        assert!(hub
            .registry()
            .register(SessionHandle::new(None, "c2".into(), tx2))
            .await
            .is_err());
    }
}
