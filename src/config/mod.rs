use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Tunables for the connection hub. Timeouts and capacities are configuration,
/// never constants at the call site.
#[derive(Debug, Deserialize, Clone)]
pub struct HubConfig {
    pub mailbox_capacity: usize,
    pub probe_interval_secs: u64,
    pub liveness_timeout_secs: u64,
    pub max_frame_bytes: usize,
}

impl HubConfig {
    pub fn probe_interval(&self) -> Duration {
        Duration::from_secs(self.probe_interval_secs)
    }

    pub fn liveness_timeout(&self) -> Duration {
        Duration::from_secs(self.liveness_timeout_secs)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ClusterConfig {
    pub enabled: bool,
    pub redis_url: String,
    pub channel: String,
    pub publish_queue: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub environment: String,
    pub server: ServerConfig,
    pub hub: HubConfig,
    pub cluster: ClusterConfig,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            // Start with default values
            .set_default("environment", "development")?
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("hub.mailbox_capacity", 256)?
            .set_default("hub.probe_interval_secs", 30)?
            .set_default("hub.liveness_timeout_secs", 40)?
            .set_default("hub.max_frame_bytes", 1024)?
            .set_default("cluster.enabled", false)?
            .set_default("cluster.redis_url", "redis://127.0.0.1:6379")?
            .set_default("cluster.channel", "finedine:events")?
            .set_default("cluster.publish_queue", 256)?
            // Add in settings from the config file if it exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Add in settings from environment variables (with prefix "APP_")
            // E.g., `APP_SERVER__PORT=5001` would set `Settings.server.port`
            .add_source(
                Environment::with_prefix("app")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        s.try_deserialize()
    }

    #[cfg(test)]
    pub fn new_for_test() -> Result<Self, ConfigError> {
        Config::builder()
            .set_default("environment", "test")?
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("hub.mailbox_capacity", 4)?
            .set_default("hub.probe_interval_secs", 1)?
            .set_default("hub.liveness_timeout_secs", 2)?
            .set_default("hub.max_frame_bytes", 1024)?
            .set_default("cluster.enabled", false)?
            .set_default("cluster.redis_url", "redis://127.0.0.1:6379")?
            .set_default("cluster.channel", "finedine:events:test")?
            .set_default("cluster.publish_queue", 16)?
            .add_source(
                Environment::with_prefix("app")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;

    // Env vars are process-wide; serialize the tests that touch them.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn cleanup_env() {
        env::remove_var("APP_SERVER__PORT");
        env::remove_var("APP_HUB__MAILBOX_CAPACITY");
        env::remove_var("APP_HUB__PROBE_INTERVAL_SECS");
        env::remove_var("APP_CLUSTER__ENABLED");
        env::remove_var("APP_CLUSTER__REDIS_URL");
    }

    #[test]
    fn test_settings_defaults() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        cleanup_env();
        let settings = Settings::new_for_test().expect("Failed to load settings");
        assert_eq!(settings.environment, "test");
        assert_eq!(settings.server.host, "127.0.0.1");
        assert_eq!(settings.server.port, 8080);
        assert_eq!(settings.hub.mailbox_capacity, 4);
        assert_eq!(settings.hub.probe_interval(), Duration::from_secs(1));
        assert_eq!(settings.hub.liveness_timeout(), Duration::from_secs(2));
        assert_eq!(settings.hub.max_frame_bytes, 1024);
        assert!(!settings.cluster.enabled);
    }

    #[test]
    fn test_environment_override() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        cleanup_env();

        env::set_var("APP_SERVER__PORT", "9000");
        env::set_var("APP_HUB__MAILBOX_CAPACITY", "512");
        env::set_var("APP_CLUSTER__ENABLED", "true");
        env::set_var("APP_CLUSTER__REDIS_URL", "redis://cache:6379");

        let settings = Settings::new_for_test().expect("Failed to load settings");
        assert_eq!(settings.server.port, 9000);
        assert_eq!(settings.hub.mailbox_capacity, 512);
        assert!(settings.cluster.enabled);
        assert_eq!(settings.cluster.redis_url, "redis://cache:6379");

        cleanup_env();
    }

    #[test]
    fn test_invalid_port() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        cleanup_env();

        env::set_var("APP_SERVER__PORT", "invalid");

        let result = Settings::new_for_test();
        assert!(result.is_err(), "Expected error for invalid port");

        cleanup_env();
    }
}
