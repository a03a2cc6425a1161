use std::sync::Arc;

use anyhow::Context;
use dotenv::dotenv;
use finedine_realtime::cluster::{self, FanOut, NoopFanOut, RedisFanOut};
use finedine_realtime::{Hub, Settings};
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenv().ok();

    // Initialize logging
    FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_thread_ids(true)
        .pretty()
        .init();

    let settings = Settings::new().context("Failed to load configuration")?;
    info!("Starting notification hub ({})", settings.environment);

    let fan_out: Arc<dyn FanOut> = if settings.cluster.enabled {
        info!(
            "Cluster fan-out enabled on channel {}",
            settings.cluster.channel
        );
        Arc::new(
            RedisFanOut::connect(&settings.cluster)
                .await
                .context("Failed to connect cluster fan-out")?,
        )
    } else {
        Arc::new(NoopFanOut)
    };

    let hub = Arc::new(Hub::with_fan_out(settings.hub.clone(), fan_out));

    if settings.cluster.enabled {
        let cluster_config = settings.cluster.clone();
        let registry = hub.registry();
        tokio::spawn(async move {
            if let Err(e) = cluster::run_subscriber(cluster_config, registry).await {
                error!("Cluster subscriber failed: {}", e);
            }
        });
    }

    let bind_addr = format!("{}:{}", settings.server.host, settings.server.port);
    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", bind_addr))?;
    info!("Listening for WebSocket connections on {}", bind_addr);

    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, addr)) => {
                    let hub = hub.clone();
                    tokio::spawn(async move {
                        hub.handle_connection(stream, addr.to_string()).await;
                    });
                }
                Err(e) => {
                    warn!("Failed to accept connection: {}", e);
                }
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
                break;
            }
        }
    }

    hub.shutdown().await;
    info!("Hub stopped");
    Ok(())
}
