use super::types::{
    DEFAULT_HOST, DEFAULT_PORT, RawRenderConfig, RawRunnerConfig, RawServerConfig, RunnerConfig,
    ServerConfig,
};
use anyhow::{Context, Result};
use directories::ProjectDirs;
use runner_core::RenderConfig;
use std::path::{Path, PathBuf};

/// Env var overriding the project config directory
pub const PROJECT_CONFIG_DIR_ENV: &str = "RENDER_RUNNER_CONFIG_DIR";

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load merged configuration (user + project)
    pub fn load() -> Result<RunnerConfig> {
        let mut layers = Vec::new();
        if let Some(user_path) = Self::user_config_path() {
            layers.push(user_path);
        }
        layers.push(Self::project_config_path());

        Self::load_layers(&layers)
    }

    /// Merge the given files in order, later files overriding earlier ones
    ///
    /// Missing files are skipped.
    pub fn load_layers(paths: &[PathBuf]) -> Result<RunnerConfig> {
        let mut raw = RawRunnerConfig::default();
        for path in paths {
            if let Some(layer) = Self::read_raw(path)? {
                raw = Self::merge_raw(raw, layer);
            }
        }

        Ok(Self::finalize(raw))
    }

    /// Get user config path (platform-specific)
    pub fn user_config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "render-runner").map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Get project config path
    /// Can be overridden with RENDER_RUNNER_CONFIG_DIR
    pub fn project_config_path() -> PathBuf {
        if let Ok(dir) = std::env::var(PROJECT_CONFIG_DIR_ENV) {
            PathBuf::from(dir).join("config.toml")
        } else {
            PathBuf::from(".render-runner/config.toml")
        }
    }

    fn read_raw(path: &Path) -> Result<Option<RawRunnerConfig>> {
        if !path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let raw = toml::from_str(&contents)
            .with_context(|| format!("invalid config in {}", path.display()))?;
        Ok(Some(raw))
    }

    /// Merge two raw configs (overlay values override base only if explicitly set)
    fn merge_raw(base: RawRunnerConfig, overlay: RawRunnerConfig) -> RawRunnerConfig {
        RawRunnerConfig {
            server: RawServerConfig {
                host: overlay.server.host.or(base.server.host),
                port: overlay.server.port.or(base.server.port),
                instance_id: overlay.server.instance_id.or(base.server.instance_id),
            },
            render: RawRenderConfig {
                ports: overlay.render.ports.or(base.render.ports),
                worker_host: overlay.render.worker_host.or(base.render.worker_host),
                worker_path: overlay.render.worker_path.or(base.render.worker_path),
                fan_out: overlay.render.fan_out.or(base.render.fan_out),
                handshake_timeout_secs: overlay
                    .render
                    .handshake_timeout_secs
                    .or(base.render.handshake_timeout_secs),
                reaper_interval_secs: overlay
                    .render
                    .reaper_interval_secs
                    .or(base.render.reaper_interval_secs),
                handoff_capacity: overlay
                    .render
                    .handoff_capacity
                    .or(base.render.handoff_capacity),
                release_on_disconnect: overlay
                    .render
                    .release_on_disconnect
                    .or(base.render.release_on_disconnect),
            },
        }
    }

    /// Convert raw config to final config with defaults applied
    fn finalize(raw: RawRunnerConfig) -> RunnerConfig {
        let defaults = RenderConfig::default();
        RunnerConfig {
            server: ServerConfig {
                host: raw.server.host.unwrap_or_else(|| DEFAULT_HOST.to_string()),
                port: raw.server.port.unwrap_or(DEFAULT_PORT),
                instance_id: raw.server.instance_id,
            },
            render: RenderConfig {
                ports: raw.render.ports.unwrap_or(defaults.ports),
                worker_host: raw.render.worker_host.unwrap_or(defaults.worker_host),
                worker_path: raw.render.worker_path.unwrap_or(defaults.worker_path),
                fan_out: raw.render.fan_out.unwrap_or(defaults.fan_out),
                handshake_timeout_secs: raw
                    .render
                    .handshake_timeout_secs
                    .unwrap_or(defaults.handshake_timeout_secs),
                reaper_interval_secs: raw
                    .render
                    .reaper_interval_secs
                    .unwrap_or(defaults.reaper_interval_secs),
                handoff_capacity: raw
                    .render
                    .handoff_capacity
                    .unwrap_or(defaults.handoff_capacity),
                release_on_disconnect: raw
                    .render
                    .release_on_disconnect
                    .unwrap_or(defaults.release_on_disconnect),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_load_nonexistent_returns_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nonexistent.toml");

        let config = ConfigLoader::load_layers(&[path]).unwrap();

        assert_eq!(config.server.port, 7743);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.render, RenderConfig::default());
    }

    #[test]
    fn test_load_from_valid_toml() {
        let temp_dir = TempDir::new().unwrap();
        let path = write(
            &temp_dir,
            "config.toml",
            r#"
[server]
port = 9999
instance_id = "render-a"

[render]
ports = [9001, 9002]
fan_out = 2
worker_path = "/render"
"#,
        );

        let config = ConfigLoader::load_layers(&[path]).unwrap();

        assert_eq!(config.server.port, 9999);
        assert_eq!(config.server.instance_id.as_deref(), Some("render-a"));
        assert_eq!(config.render.ports, vec![9001, 9002]);
        assert_eq!(config.render.fan_out, 2);
        assert_eq!(config.render.worker_path, "/render");
        assert_eq!(config.render.handshake_timeout_secs, 10);
    }

    #[test]
    fn test_load_invalid_toml_returns_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = write(&temp_dir, "invalid.toml", "this is not valid toml {{{{");

        let result = ConfigLoader::load_layers(&[path]);
        assert!(result.is_err());
    }

    #[test]
    fn test_later_layer_overrides_earlier() {
        let temp_dir = TempDir::new().unwrap();
        let user = write(
            &temp_dir,
            "user.toml",
            r#"
[server]
host = "127.0.0.1"
port = 8000

[render]
ports = [9001, 9002, 9003, 9004]
release_on_disconnect = true
"#,
        );
        let project = write(
            &temp_dir,
            "project.toml",
            r#"
[server]
port = 8100

[render]
ports = [9101, 9102]
"#,
        );

        let config = ConfigLoader::load_layers(&[user, project]).unwrap();

        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 8100);
        assert_eq!(config.render.ports, vec![9101, 9102]);
        assert!(config.render.release_on_disconnect);
    }

    #[test]
    fn test_merge_raw_none_preserves_base() {
        let base = RawRunnerConfig {
            server: RawServerConfig {
                host: Some("0.0.0.0".to_string()),
                port: Some(9000),
                instance_id: Some("render-a".to_string()),
            },
            render: RawRenderConfig {
                fan_out: Some(2),
                ..Default::default()
            },
        };

        let merged = ConfigLoader::merge_raw(base, RawRunnerConfig::default());

        assert_eq!(merged.server.host, Some("0.0.0.0".to_string()));
        assert_eq!(merged.server.port, Some(9000));
        assert_eq!(merged.server.instance_id, Some("render-a".to_string()));
        assert_eq!(merged.render.fan_out, Some(2));
    }

    #[test]
    fn test_user_config_path_returns_some() {
        let path = ConfigLoader::user_config_path();
        assert!(path.is_some());
        let path = path.unwrap();
        assert!(path.to_string_lossy().contains("render-runner"));
        assert!(path.to_string_lossy().contains("config.toml"));
    }

    #[test]
    #[serial]
    fn test_project_config_path() {
        // SAFETY: serialized with the other env-mutating test.
        unsafe { std::env::remove_var(PROJECT_CONFIG_DIR_ENV) };
        let path = ConfigLoader::project_config_path();
        assert_eq!(path, PathBuf::from(".render-runner/config.toml"));
    }

    #[test]
    #[serial]
    fn test_project_config_dir_env_override() {
        let temp_dir = TempDir::new().unwrap();
        // SAFETY: serialized with the other env-mutating test.
        unsafe { std::env::set_var(PROJECT_CONFIG_DIR_ENV, temp_dir.path()) };
        let path = ConfigLoader::project_config_path();
        unsafe { std::env::remove_var(PROJECT_CONFIG_DIR_ENV) };

        assert_eq!(path, temp_dir.path().join("config.toml"));
    }
}
