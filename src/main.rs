use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info, warn};

use ws_stdio_proxy::args::Args;
use ws_stdio_proxy::logging::init_dual_logging;
use ws_stdio_proxy::{WsStdioProxy, create_default_config, load_config};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing first
    init_dual_logging();

    let args = Args::parse();

    // Load configuration
    let config = if std::path::Path::new(&args.config).exists() {
        // File exists, try to load it
        match load_config(&args.config) {
            Ok(config) => config,
            Err(e) => {
                error!(
                    "Failed to load existing config file '{}': {}",
                    args.config, e
                );
                error!("Please check your config file syntax and try again");
                return Err(e);
            }
        }
    } else {
        // File doesn't exist, create default
        warn!(
            "Config file '{}' not found, creating default config",
            args.config
        );
        let default_config = create_default_config();
        let config_toml = toml::to_string_pretty(&default_config)?;
        std::fs::write(&args.config, &config_toml)?;
        info!("Created default config file: {}", args.config);
        default_config
    };

    let routes = config.route_table()?;
    info!("Loaded {} routes:", routes.len());
    for (key, entry) in routes.iter() {
        info!("  - /{} -> {}", key, entry);
    }

    // Create proxy (wrapped in Arc for sharing across tasks)
    let proxy = Arc::new(WsStdioProxy::new(routes)?);

    // Start listening
    let listen_addr = args.listen_addr(&config);
    let listener = TcpListener::bind(&listen_addr).await?;
    info!("WebSocket proxy listening on {}", listen_addr);

    // Set up graceful shutdown
    let proxy_for_shutdown = proxy.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("Shutdown signal received");
        proxy_for_shutdown.graceful_shutdown();
        info!("Graceful shutdown complete");
        std::process::exit(0);
    });

    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let proxy_clone = proxy.clone();
                tokio::spawn(async move {
                    if let Err(e) = proxy_clone.handle_connection(stream, addr).await {
                        error!("Error handling client {}: {}", addr, e);
                    }
                });
            }
            Err(e) => {
                error!("Failed to accept connection: {}", e);
            }
        }
    }
}

/// Wait for shutdown signal
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
