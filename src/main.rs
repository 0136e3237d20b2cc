//! camrelay server binary
//!
//! Run with: cargo run -- [--bind ADDR] [--port PORT] [--config-path FILE]
//!
//! ## Producer (camera)
//!
//!   Connect to ws://HOST:8080/ws and send {"type":"producer"}
//!   Upload frames with: curl --data-binary @frame.jpg http://HOST:8080/upload
//!
//! ## Consumer (viewer)
//!
//!   Connect to ws://HOST:8080/ws and send {"type":"consumer"}
//!   Each upload arrives as {"type":"image","data":"<base64>"}

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use clap::Parser;

use camrelay::server::config::{DEFAULT_MAX_UPLOAD_SIZE, DEFAULT_PORT};
use camrelay::{DeliveryMode, RelayServer, ServerConfig};

/// Relay camera images from one device to many viewers
#[derive(Debug, Parser)]
#[command(name = "camrelay", version, about)]
struct Args {
    /// Interface to bind
    #[arg(long, env = "BIND_ADDR", default_value = "0.0.0.0")]
    bind: IpAddr,

    /// Port for HTTP and WebSocket traffic
    #[arg(short, long, env = "PORT", default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Device configuration document
    #[arg(long, env = "CONFIG_PATH", default_value = "config.json")]
    config_path: PathBuf,

    /// How images reach consumers: inline or reference
    #[arg(long, env = "DELIVERY_MODE", default_value = "inline")]
    delivery: DeliveryMode,

    /// Largest accepted upload in bytes
    #[arg(long, default_value_t = DEFAULT_MAX_UPLOAD_SIZE)]
    max_upload_size: usize,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("camrelay=debug".parse()?),
        )
        .init();

    let config = ServerConfig::with_addr(SocketAddr::new(args.bind, args.port))
        .config_path(args.config_path)
        .delivery_mode(args.delivery)
        .max_upload_size(args.max_upload_size);

    let server = RelayServer::new(config).await;

    server
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for shutdown signal");
                std::future::pending::<()>().await;
            }
        })
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}
