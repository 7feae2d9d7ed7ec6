use anyhow::{Context, Result};
use clap::Parser;
use lineup_server::{logging, Cli, PidFile, QueueServer};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let config = Cli::parse().into_config();
    logging::init(config.log_format);

    if let Some(dir) = &config.work_dir {
        std::env::set_current_dir(dir)
            .with_context(|| format!("could not change to {}", dir.display()))?;
    }

    let _pid_file = config
        .pid_file
        .as_ref()
        .map(PidFile::create)
        .transpose()
        .context("could not write pid file")?;

    let server = QueueServer::bind(config).await?;
    info!(address = %server.local_addr()?, "Waiting for connections");

    server
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "Could not listen for ctrl-c");
                std::future::pending::<()>().await;
            }
            info!("Received ctrl-c");
        })
        .await?;

    Ok(())
}
