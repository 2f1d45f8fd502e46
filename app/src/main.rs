use std::net::{IpAddr, SocketAddr};

use anyhow::Result;
use dotenvy::dotenv;
use mm_importer::{config::config::Config, core::server::create_server, supervisor};
use tokio::signal;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Config::load_envs().expect("Failed to load envs");

    let port: u16 = config.port;
    let server_ip_str: String = config.server_ip.clone();
    let server_ip: IpAddr = server_ip_str.parse().unwrap_or(IpAddr::from([0, 0, 0, 0]));
    let addr = SocketAddr::new(server_ip, port);

    let (app, _db_conn, runtime) = create_server(config.clone()).await?;

    if !config.test_run {
        let resume_runtime = runtime.clone();
        tokio::spawn(async move {
            if let Err(e) = supervisor::resume_on_startup(&resume_runtime).await {
                error!("startup resume failed: {e}");
            }
        });
    }

    let server = axum_server::bind(addr).serve(app.into_make_service());
    info!("Server starting on {}", addr);

    tokio::select! {
        result = server => {
            if let Err(e) = result {
                error!("Server failed: {}", e);
            }
        }
        _ = signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down gracefully...");
        }
    }

    Ok(())
}
