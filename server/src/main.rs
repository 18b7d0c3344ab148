use clap::Parser;
use tokio::select;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use server::{Args, ChatError, Server, ServerConfig};

#[tokio::main]
async fn main() -> Result<(), ChatError> {
    let args = Args::parse();

    // RUST_LOG wins over --log-level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    fmt()
        .compact() // use abbreviated log format
        .with_env_filter(filter)
        .with_thread_ids(true) // display thread id where event happens
        .init(); // set as default subscriber

    let config = ServerConfig::from(&args);
    let server = Server::bind(config).await
        .map_err(|e| { error!("Error starting server: {}", e); e })?;

    info!("Chat room started. Listening on {}...", server.local_addr()?);

    let mut sessions = server.run(async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Unable to listen for ctrl-c: {}", e);
            std::future::pending::<()>().await;
        }
    }).await;

    // first ctrl-c only stops accepting, a second one exits regardless
    info!("Waiting for {} open sessions, ctrl-c again to exit now", sessions.len());
    select! {
        _ = async { while sessions.join_next().await.is_some() {} } => {
            info!("All sessions finished");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Exiting with {} sessions still open", sessions.len());
        }
    }

    Ok(())
}
