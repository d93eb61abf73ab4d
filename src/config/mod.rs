//! Configuration loading and management.
//!
//! This module is split into logical submodules:
//! - [`types`]: Core config struct definitions (Config, ServerConfig)
//! - [`push`]: Offline-push provider selection and vendor credentials
//! - [`discovery`]: Gateway discovery mode (k8s / zookeeper)
//! - [`bus`]: Message log topic, consumer group, worker pool sizing
//! - [`message_verify`]: Friend-verification toggle for single-chat sends
//! - [`manager`]: Admin / manager user-id allow-list

mod bus;
mod discovery;
mod manager;
mod message_verify;
mod push;
mod types;
mod validation;

pub use bus::BusConfig;
pub use discovery::{DiscoveryConfig, DiscoveryMode};
pub use manager::ManagerConfig;
pub use message_verify::MessageVerifyConfig;
pub use push::{FcmConfig, GetuiConfig, JPushConfig, PushConfig, PushProvider};
pub use types::{Config, ConfigError, ServerConfig};
pub use validation::{validate, ValidationError};
