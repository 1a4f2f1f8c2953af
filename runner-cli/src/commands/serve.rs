//! Serve command for running the render-runner server
//!
//! Configuration comes from the merged config files; flags given here
//! override them.

use anyhow::{Result, bail};
use clap::Args;
use runner_server::{RunnerServer, ServerConfig};
use tracing::{info, warn};

use crate::config::{ConfigLoader, RunnerConfig};

/// Arguments for the serve command
#[derive(Debug, Default, Args)]
pub struct ServeArgs {
    /// Port to listen on
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Host to bind to
    #[arg(long)]
    pub host: Option<String>,

    /// Instance id embedded in issued URLs
    #[arg(long)]
    pub instance_id: Option<String>,

    /// Worker ports, comma separated
    #[arg(long, value_delimiter = ',')]
    pub ports: Option<Vec<u16>>,

    /// Sessions created per start request
    #[arg(long)]
    pub fan_out: Option<usize>,

    /// Release a session as soon as its stream ends
    #[arg(long)]
    pub release_on_disconnect: bool,
}

/// Run the serve command
pub async fn run(args: ServeArgs) -> Result<()> {
    let config = apply_args(ConfigLoader::load()?, args);
    check(&config)?;

    let server_config = ServerConfig {
        host: config.server.host.clone(),
        port: config.server.port,
        instance_id: config.server.instance_id.clone(),
    };
    info!(
        addr = %server_config.addr(),
        ports = config.render.ports.len(),
        fan_out = config.render.fan_out,
        "Starting render-runner"
    );

    let server = RunnerServer::new(server_config, &config.render);
    server.run().await.map_err(Into::into)
}

fn apply_args(mut config: RunnerConfig, args: ServeArgs) -> RunnerConfig {
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if args.instance_id.is_some() {
        config.server.instance_id = args.instance_id;
    }
    if let Some(ports) = args.ports {
        config.render.ports = ports;
    }
    if let Some(fan_out) = args.fan_out {
        config.render.fan_out = fan_out;
    }
    if args.release_on_disconnect {
        config.render.release_on_disconnect = true;
    }
    config
}

fn check(config: &RunnerConfig) -> Result<()> {
    let render = &config.render;
    if render.ports.is_empty() {
        bail!("no worker ports configured; set [render].ports or pass --ports");
    }
    if render.fan_out == 0 {
        bail!("fan_out must be at least 1");
    }
    if render.ports.len() < render.fan_out {
        warn!(
            ports = render.ports.len(),
            fan_out = render.fan_out,
            "Fewer ports than fan_out, every start request will be rejected"
        );
    }
    Ok(())
}
