//! HTTP API handlers — exposes orderer state as JSON.

pub mod status;
pub mod streams;

use std::sync::Arc;

use orderer_core::config::OrdererConfig;
use orderer_services::Broadcaster;

#[derive(Clone)]
pub struct ApiState {
    pub broadcaster: Broadcaster,
    /// Effective configuration, after env overrides.
    pub config: Arc<OrdererConfig>,
    /// Signals graceful daemon shutdown.
    pub shutdown_tx: tokio::sync::broadcast::Sender<()>,
}

pub use status::{handle_config, handle_shutdown, handle_status};
pub use streams::handle_streams;
