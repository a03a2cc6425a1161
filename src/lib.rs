pub mod cluster;
pub mod config;
pub mod error;
pub mod hub;

pub use error::AppError;
pub type Result<T> = std::result::Result<T, AppError>;
pub use config::Settings;

pub use cluster::{FanOut, NoopFanOut, RedisFanOut};
pub use hub::{Event, Hub, Notifier, Registry, Scope};
