use runner_core::RenderConfig;
use serde::{Deserialize, Serialize};

/// Configuration as stored in TOML files (with optional fields for merging)
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawRunnerConfig {
    #[serde(default)]
    pub server: RawServerConfig,

    #[serde(default)]
    pub render: RawRenderConfig,
}

/// Server config as stored in TOML (optional fields for proper merging)
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawServerConfig {
    /// Host to bind to
    pub host: Option<String>,

    /// Port for the render-runner server
    pub port: Option<u16>,

    /// Id embedded in issued stream and stop URLs
    pub instance_id: Option<String>,
}

/// Render config as stored in TOML
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawRenderConfig {
    pub ports: Option<Vec<u16>>,
    pub worker_host: Option<String>,
    pub worker_path: Option<String>,
    pub fan_out: Option<usize>,
    pub handshake_timeout_secs: Option<u64>,
    pub reaper_interval_secs: Option<u64>,
    pub handoff_capacity: Option<usize>,
    pub release_on_disconnect: Option<bool>,
}

/// Final configuration with defaults applied
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RunnerConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub render: RenderConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,

    /// Port for the render-runner server
    pub port: u16,

    /// Id embedded in issued URLs; a random id is used when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_id: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            instance_id: None,
        }
    }
}

/// Default host for the render-runner server
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default port for the render-runner server
pub const DEFAULT_PORT: u16 = 7743;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let config = RunnerConfig::default();
        assert_eq!(config.server.host, DEFAULT_HOST);
        assert_eq!(config.server.port, DEFAULT_PORT);
        assert!(config.server.instance_id.is_none());
        assert_eq!(config.render.fan_out, 4);
        assert!(config.render.ports.is_empty());
    }

    #[test]
    fn test_toml_round_trip() {
        let config = RunnerConfig {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
                instance_id: Some("render-a".to_string()),
            },
            render: RenderConfig {
                ports: vec![9001, 9002, 9003, 9004],
                release_on_disconnect: true,
                ..RenderConfig::default()
            },
        };

        let toml_str = toml::to_string(&config).unwrap();
        let parsed: RunnerConfig = toml::from_str(&toml_str).unwrap();

        assert_eq!(parsed.server, config.server);
        assert_eq!(parsed.render, config.render);
    }

    #[test]
    fn test_raw_config_partial_parsing() {
        let toml_str = r#"
[server]
port = 9000

[render]
ports = [9101, 9102]
"#;
        let raw: RawRunnerConfig = toml::from_str(toml_str).unwrap();

        assert_eq!(raw.server.port, Some(9000));
        assert!(raw.server.host.is_none());
        assert_eq!(raw.render.ports, Some(vec![9101, 9102]));
        assert!(raw.render.fan_out.is_none());
    }

    #[test]
    fn test_raw_config_empty_uses_none() {
        let raw: RawRunnerConfig = toml::from_str("").unwrap();

        assert!(raw.server.port.is_none());
        assert!(raw.server.instance_id.is_none());
        assert!(raw.render.ports.is_none());
        assert!(raw.render.release_on_disconnect.is_none());
    }
}
