//! Serve a document loaded from an upstream dependency, accepting traffic
//! before the first load succeeded.
use envconfig::Envconfig;
use eyre::Result;
use tracing::{error, info};

use deferred_server::config::Config;
use deferred_server::server::serve;

async fn shutdown() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("received ctrl-c, shutting down"),
        Err(e) => {
            error!("failed to listen for ctrl-c, running until killed: {}", e);
            std::future::pending::<()>().await
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let config = Config::init_from_env().expect("failed to load configuration from env");

    let listener = tokio::net::TcpListener::bind(config.bind()).await?;

    serve(config, listener, shutdown()).await
}
