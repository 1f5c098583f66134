//! CloudFauxnt edge binary.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use cloudfauxnt::config::load_config;
use cloudfauxnt::config::watcher::ConfigWatcher;
use cloudfauxnt::lifecycle::signals::run_signal_loop;
use cloudfauxnt::lifecycle::StartupError;
use cloudfauxnt::observability::{logging, metrics};
use cloudfauxnt::{HttpServer, Shutdown};

#[derive(Parser)]
#[command(name = "cloudfauxnt")]
#[command(about = "CloudFront-style edge proxy for local development", long_about = None)]
struct Args {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "cloudfauxnt.toml")]
    config: PathBuf,

    /// Reload the configuration when the file changes
    #[arg(short, long)]
    watch: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = load_config(&args.config).map_err(StartupError::from)?;
    logging::init(&config.observability)?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %args.config.display(),
        bind_address = %config.server.bind_address,
        origins = config.origins.len(),
        "cloudfauxnt starting"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => metrics::init_metrics(addr)?,
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.server.bind_address)
        .await
        .map_err(StartupError::from)?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let server = HttpServer::new(config)?;

    let shutdown = Shutdown::new();
    let (config_tx, config_rx) = mpsc::unbounded_channel();

    // Keep the watcher alive for the life of the process.
    let _watcher = if args.watch {
        Some(ConfigWatcher::new(&args.config, config_tx.clone()).run()?)
    } else {
        None
    };

    let mut server_task = tokio::spawn(server.run(listener, config_rx, shutdown.subscribe()));

    tokio::select! {
        result = run_signal_loop(&shutdown, &args.config, &config_tx) => {
            result?;
            server_task.await??;
        }
        result = &mut server_task => {
            // The server stopped on its own; surface why.
            result??;
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
