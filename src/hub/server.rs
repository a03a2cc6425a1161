use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use futures::{SinkExt, StreamExt};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::HubConfig;
use crate::hub::registry::{Registry, SessionHandle};
use crate::hub::session::{run_reader, run_writer};

/// Identity supplied by the client at handshake time. Authorization of who may
/// connect happens upstream; an absent `userId` is an anonymous session that
/// receives broadcasts only.
#[derive(Debug)]
struct Identity {
    user_id: Option<String>,
    client_id: String,
}

fn identity_from_query(query: Option<&str>) -> Identity {
    let mut user_id = None;
    let mut client_id = None;

    if let Some(query) = query {
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            match key.as_ref() {
                "userId" if !value.is_empty() => user_id = Some(value.into_owned()),
                "clientId" if !value.is_empty() => client_id = Some(value.into_owned()),
                _ => {}
            }
        }
    }

    Identity {
        user_id,
        client_id: client_id.unwrap_or_else(|| format!("anon-{}", Uuid::new_v4())),
    }
}

/// Upgrade one accepted transport to a WebSocket, register the session, and
/// drive its reader/writer pumps until either ends. Whatever the teardown
/// trigger, the session leaves the registry exactly once (unregister is
/// idempotent) and the transport is closed.
pub(crate) async fn handle_connection<S>(
    registry: Arc<Registry>,
    config: HubConfig,
    stream: S,
    peer: String,
) where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    info!("New WebSocket connection from: {}", peer);

    let mut identity = Identity {
        user_id: None,
        client_id: String::new(),
    };
    let callback = |req: &Request, response: Response| -> Result<Response, ErrorResponse> {
        identity = identity_from_query(req.uri().query());
        Ok(response)
    };
    let ws_config = WebSocketConfig {
        max_message_size: Some(config.max_frame_bytes),
        max_frame_size: Some(config.max_frame_bytes),
        ..Default::default()
    };

    let ws_stream = match tokio_tungstenite::accept_hdr_async_with_config(
        stream,
        callback,
        Some(ws_config),
    )
    .await
    {
        Ok(ws) => ws,
        Err(e) => {
            error!("Error during WebSocket handshake with {}: {}", peer, e);
            return;
        }
    };

    let (mut sink, stream) = ws_stream.split();
    let (tx, mailbox) = mpsc::channel(config.mailbox_capacity);
    let handle = SessionHandle::new(identity.user_id, identity.client_id, tx);

    let session_id = match registry.register(handle).await {
        Ok(id) => id,
        Err(e) => {
            warn!("Rejecting connection from {}: {}", peer, e);
            let _ = sink.close().await;
            return;
        }
    };

    let writer = tokio::spawn(run_writer(
        session_id,
        sink,
        mailbox,
        config.probe_interval(),
    ));
    let reader = tokio::spawn(run_reader(
        session_id,
        stream,
        config.liveness_timeout(),
        config.max_frame_bytes,
    ));

    // Either pump ending tears the session down; unregistration closes the
    // mailbox, which lets the surviving writer wind down on its own.
    tokio::select! {
        _ = writer => {
            debug!("Writer finished for session {}", session_id);
        }
        _ = reader => {
            debug!("Reader finished for session {}", session_id);
        }
    }

    registry.unregister(&session_id).await;
}
