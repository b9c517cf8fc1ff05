use clap::Parser;
use cmdb::Cmdb;
use cmdb_server::{router, ServerConfig};
use log::{error, info, warn};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = ServerConfig::parse();

    let cmdb = match Cmdb::open_with_config(&config.data_file, config.store_config()) {
        Ok(cmdb) => Arc::new(cmdb),
        Err(e) => {
            error!("Failed to open {}: {e}", config.data_file.display());
            std::process::exit(1);
        }
    };
    info!(
        "Loaded {} CI(s) and {} relationship(s) from {}",
        cmdb.ci_count(),
        cmdb.relationship_count(),
        cmdb.path()
    );

    let listener = tokio::net::TcpListener::bind(config.bind).await?;
    info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, router(Arc::clone(&cmdb)))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shutting down");
    match Arc::try_unwrap(cmdb) {
        Ok(cmdb) => cmdb.close()?,
        // Dropping the last handle still saves pending changes.
        Err(_) => warn!("Store still referenced at shutdown, deferring final save"),
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
}
