//! Render section of the runner configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::coordinator::CoordinatorConfig;

/// Number of sibling sessions created per `Start`
pub const DEFAULT_FAN_OUT: usize = 4;
/// Bound on the initializer handoff and the readiness wait
pub const DEFAULT_HANDSHAKE_TIMEOUT_SECS: u64 = 10;
/// Period of the idle-session sweep
pub const DEFAULT_REAPER_INTERVAL_SECS: u64 = 6;
/// Host the worker websockets listen on
pub const DEFAULT_WORKER_HOST: &str = "127.0.0.1";
/// Path of the worker websocket endpoint
pub const DEFAULT_WORKER_PATH: &str = "/ws";

/// Settings for the port pool, the coordinator and the worker dialer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Local ports the workers listen on
    pub ports: Vec<u16>,
    pub worker_host: String,
    pub worker_path: String,
    pub fan_out: usize,
    pub handshake_timeout_secs: u64,
    pub reaper_interval_secs: u64,
    /// Number of batches that may wait for the initializer
    pub handoff_capacity: usize,
    /// Stop a session as soon as its relay ends
    pub release_on_disconnect: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            ports: Vec::new(),
            worker_host: DEFAULT_WORKER_HOST.to_string(),
            worker_path: DEFAULT_WORKER_PATH.to_string(),
            fan_out: DEFAULT_FAN_OUT,
            handshake_timeout_secs: DEFAULT_HANDSHAKE_TIMEOUT_SECS,
            reaper_interval_secs: DEFAULT_REAPER_INTERVAL_SECS,
            handoff_capacity: 1,
            release_on_disconnect: false,
        }
    }
}

impl RenderConfig {
    /// Build the coordinator settings for the given instance id
    pub fn coordinator_config(&self, server_id: impl Into<String>) -> CoordinatorConfig {
        CoordinatorConfig {
            server_id: server_id.into(),
            fan_out: self.fan_out.max(1),
            handshake_timeout: Duration::from_secs(self.handshake_timeout_secs),
            reaper_interval: Duration::from_secs(self.reaper_interval_secs.max(1)),
            handoff_capacity: self.handoff_capacity.max(1),
            release_on_disconnect: self.release_on_disconnect,
        }
    }
}
