use std::sync::Arc;
use std::time::Duration;

use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio::time::{interval_at, timeout, Instant};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;
use tracing::{debug, error, warn};
use uuid::Uuid;

/// Sole writer to the transport. Drains the mailbox in FIFO order, one frame
/// per event, and sends a liveness probe on a fixed interval regardless of
/// traffic. Ends on mailbox-closed (registry dropped the session), write
/// error, or probe failure, and closes the sink on the way out.
pub(crate) async fn run_writer<S>(
    session_id: Uuid,
    mut sink: SplitSink<WebSocketStream<S>, Message>,
    mut mailbox: mpsc::Receiver<Arc<str>>,
    probe_interval: Duration,
) where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut probe = interval_at(Instant::now() + probe_interval, probe_interval);

    loop {
        tokio::select! {
            maybe_frame = mailbox.recv() => match maybe_frame {
                Some(frame) => {
                    if let Err(e) = sink.send(Message::Text(frame.to_string())).await {
                        error!("Session {} write error: {}", session_id, e);
                        break;
                    }
                }
                None => {
                    // Mailbox closed by unregistration; say goodbye cleanly.
                    let _ = sink.send(Message::Close(None)).await;
                    break;
                }
            },
            _ = probe.tick() => {
                if let Err(e) = sink.send(Message::Ping(Vec::new())).await {
                    error!("Session {} probe failed: {}", session_id, e);
                    break;
                }
            }
        }
    }

    if let Err(e) = sink.close().await {
        debug!("Session {} close: {}", session_id, e);
    }
}

/// Sole reader from the transport. Every received frame, probe answers
/// included, resets the liveness deadline; expiry, a read error, or an
/// oversized frame ends the session. Inbound application data carries no
/// command protocol today and is logged only.
pub(crate) async fn run_reader<S>(
    session_id: Uuid,
    mut stream: SplitStream<WebSocketStream<S>>,
    liveness_timeout: Duration,
    max_frame_bytes: usize,
) where
    S: AsyncRead + AsyncWrite + Unpin,
{
    loop {
        let message = match timeout(liveness_timeout, stream.next()).await {
            Err(_) => {
                warn!("Session {} liveness deadline expired", session_id);
                break;
            }
            Ok(None) => {
                debug!("Session {} transport ended", session_id);
                break;
            }
            Ok(Some(Err(e))) => {
                warn!("Session {} read error: {}", session_id, e);
                break;
            }
            Ok(Some(Ok(message))) => message,
        };

        match message {
            Message::Text(text) => {
                if text.len() > max_frame_bytes {
                    warn!(
                        "Session {} sent {} bytes (limit {}), disconnecting",
                        session_id,
                        text.len(),
                        max_frame_bytes
                    );
                    break;
                }
                debug!("Session {} sent: {}", session_id, text);
            }
            Message::Binary(data) => {
                if data.len() > max_frame_bytes {
                    warn!(
                        "Session {} sent {} bytes (limit {}), disconnecting",
                        session_id,
                        data.len(),
                        max_frame_bytes
                    );
                    break;
                }
                debug!("Session {} sent {} binary bytes", session_id, data.len());
            }
            // Pings and pongs only matter as proof of life, handled above.
            Message::Ping(_) | Message::Pong(_) => {}
            Message::Close(_) => {
                debug!("Session {} closed by client", session_id);
                break;
            }
            Message::Frame(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::DuplexStream;
    use tokio_tungstenite::tungstenite::protocol::Role;

    async fn ws_pair() -> (
        WebSocketStream<DuplexStream>,
        WebSocketStream<DuplexStream>,
    ) {
        let (server_io, client_io) = tokio::io::duplex(64 * 1024);
        let server = WebSocketStream::from_raw_socket(server_io, Role::Server, None).await;
        let client = WebSocketStream::from_raw_socket(client_io, Role::Client, None).await;
        (server, client)
    }

    #[tokio::test]
    async fn test_writer_drains_mailbox_in_order() {
        let (server, mut client) = ws_pair().await;
        let (sink, _stream) = server.split();
        let (tx, rx) = mpsc::channel::<Arc<str>>(8);

        let writer = tokio::spawn(run_writer(
            Uuid::new_v4(),
            sink,
            rx,
            Duration::from_secs(30),
        ));

        tx.send(Arc::from("first")).await.unwrap();
        tx.send(Arc::from("second")).await.unwrap();

        let m1 = client.next().await.unwrap().unwrap();
        let m2 = client.next().await.unwrap().unwrap();
        assert_eq!(m1, Message::Text("first".to_string()));
        assert_eq!(m2, Message::Text("second".to_string()));

        // Closing the mailbox ends the writer with a Close frame
        drop(tx);
        let m3 = client.next().await.unwrap().unwrap();
        assert!(matches!(m3, Message::Close(_)));
        writer.await.unwrap();
    }

    #[tokio::test]
    async fn test_writer_sends_probes_without_traffic() {
        let (server, mut client) = ws_pair().await;
        let (sink, _stream) = server.split();
        let (_tx, rx) = mpsc::channel::<Arc<str>>(8);

        let _writer = tokio::spawn(run_writer(
            Uuid::new_v4(),
            sink,
            rx,
            Duration::from_millis(50),
        ));

        let message = timeout(Duration::from_secs(2), client.next())
            .await
            .expect("expected a probe before the timeout")
            .unwrap()
            .unwrap();
        assert!(matches!(message, Message::Ping(_)));
    }

    #[tokio::test]
    async fn test_reader_times_out_silent_peer() {
        let (server, _client) = ws_pair().await;
        let (_sink, stream) = server.split();

        let started = std::time::Instant::now();
        run_reader(
            Uuid::new_v4(),
            stream,
            Duration::from_millis(100),
            1024,
        )
        .await;
        let elapsed = started.elapsed();

        assert!(elapsed >= Duration::from_millis(100));
        assert!(elapsed < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_reader_disconnects_on_oversized_frame() {
        let (server, mut client) = ws_pair().await;
        let (_sink, stream) = server.split();

        let reader = tokio::spawn(run_reader(
            Uuid::new_v4(),
            stream,
            Duration::from_secs(5),
            16,
        ));

        client
            .send(Message::Text("x".repeat(64)))
            .await
            .unwrap();

        timeout(Duration::from_secs(2), reader)
            .await
            .expect("reader should stop on an oversized frame")
            .unwrap();
    }

    #[tokio::test]
    async fn test_reader_treats_frames_as_liveness() {
        let (server, mut client) = ws_pair().await;
        let (_sink, stream) = server.split();

        let reader = tokio::spawn(run_reader(
            Uuid::new_v4(),
            stream,
            Duration::from_millis(200),
            1024,
        ));

        // Keep the deadline fresh past several windows, then go silent
        for _ in 0..4 {
            tokio::time::sleep(Duration::from_millis(100)).await;
            client.send(Message::Pong(Vec::new())).await.unwrap();
        }
        let started = std::time::Instant::now();
        timeout(Duration::from_secs(2), reader)
            .await
            .expect("reader should stop once the peer goes silent")
            .unwrap();
        assert!(started.elapsed() >= Duration::from_millis(150));
    }
}
