use clap::Parser;
use std::process::exit;
use tokio::fs;
use tokio::net::TcpListener;

use canela::config::{
    config_listen_or_default, config_port_or_default, config_prom_listen_or_default,
    config_prom_port_or_default, set_global_config, Config, LOGGER,
};
use canela::metrics::PrometheusServer;
use canela::server;
use slog::{error, info};

#[tokio::main]
pub async fn main() -> canela::Result<()> {
    let cli = Cli::parse();
    let mut config: Option<Config> = None;

    if let Some(config_file_name) = cli.config {
        let config_content = fs::read_to_string(config_file_name)
            .await
            .expect("Failed to read config file");

        // deserialize toml config
        config = match toml::from_str(&config_content) {
            Ok(d) => Some(d),
            Err(e) => {
                println!("Unable to load config file {e}");
                exit(1);
            }
        };
    };

    if let Some(c) = &config {
        set_global_config(c.clone())
    }

    let c_port = config_port_or_default();
    let port = cli.port.as_deref().unwrap_or(&c_port);
    let c_listen = config_listen_or_default();
    let listen_addr = cli.listen_addr.as_deref().unwrap_or(&c_listen);

    // The metrics exporter only runs when a port is configured for it.
    if let Some(prom_port) = cli.prom_port.or_else(config_prom_port_or_default) {
        let prom_listen = cli
            .prom_listen_addr
            .unwrap_or_else(config_prom_listen_or_default);
        let prom_server = PrometheusServer::new(format!("{}:{}", prom_listen, prom_port));
        tokio::spawn(async move {
            if let Err(err) = prom_server.run().await {
                error!(LOGGER, "prometheus exporter error: {}", err);
            }
        });
    }

    // Bind a TCP listener. A failure here (port in use, no permission)
    // propagates out of `main` for a non-zero exit.
    let listener = TcpListener::bind(&format!("{}:{}", listen_addr, port)).await?;
    info!(LOGGER, "listening on {}:{}", listen_addr, port);

    server::run(listener, shutdown_signal()).await;

    Ok(())
}

/// Completes on SIGINT or SIGTERM; both trigger the same orderly shutdown.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut term = signal(SignalKind::terminate()).expect("failed to install signal handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = term.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

#[derive(Parser, Debug)]
#[clap(name = "canela-server", version, about = "An in-memory key/value server")]
struct Cli {
    #[clap(name = "listen", long = "listen")]
    listen_addr: Option<String>,

    #[clap(name = "port", long = "port")]
    port: Option<String>,

    #[clap(name = "promlisten", long = "promlisten")]
    prom_listen_addr: Option<String>,

    #[clap(name = "promport", long = "promport")]
    prom_port: Option<u16>,

    #[clap(name = "config", long = "config")]
    config: Option<String>,
}
