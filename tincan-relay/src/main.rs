use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use anyhow::Result;
use axum::Router;
use axum::routing::get;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use tincan_relay::{RelayService, stats_handler, ws_handler};

#[derive(Parser)]
#[command(name = "tincan-relay")]
#[command(about = "Signaling relay that pairs participants and routes their negotiation")]
struct Args {
    /// Address to bind.
    #[arg(long, default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    host: IpAddr,

    /// Port to listen on.
    #[arg(long, default_value_t = 3000)]
    port: u16,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let service = RelayService::spawn();

    let app = Router::new()
        .route("/ws/{participant_id}", get(ws_handler))
        .route("/stats", get(stats_handler))
        .with_state(service);

    let addr = SocketAddr::from((args.host, args.port));
    info!("relay listening on http://{addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
