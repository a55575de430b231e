use std::{process::ExitCode, sync::Arc};

use colored::Colorize;
use log::{error, info};
use prodhub_collab::{Collab, Config, ConfigError, FileStore, PgDatabase};
use prodhub_server::run_server;
use thiserror::Error;

mod logging;

#[derive(Debug, Error)]
enum StartupError {
    #[error("Could not read configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Could not initialize database: {0}")]
    Database(String),
}

impl StartupError {
    fn hint(&self) -> String {
        match self {
            StartupError::Config(_) => {
                "Check that the PRODHUB_* environment variables are set.".to_string()
            }
            StartupError::Database(_) => {
                "This is a database error. Make sure the Postgres instance is running and reachable at PRODHUB_DATABASE_URL, then try again."
                    .to_string()
            }
        }
    }
}

async fn init() -> Result<(Arc<Collab<PgDatabase>>, u16), StartupError> {
    let config = Config::from_env()?;

    info!("Connecting to database...");

    let database = PgDatabase::new(&config.database_url)
        .await
        .map_err(|e| StartupError::Database(e.to_string()))?;

    let files = FileStore::new(&config.storage_dir);
    let port = config.port;

    Ok((Arc::new(Collab::new(database, files, &config)), port))
}

#[tokio::main]
async fn main() -> ExitCode {
    logging::init_logger();

    match init().await {
        Ok((collab, port)) => {
            info!("Initialized successfully.");
            run_server(collab, port).await;
            ExitCode::SUCCESS
        }
        Err(error) => {
            error!(
                "{} Read the error below to troubleshoot the issue.",
                "prodhub failed to start!".bold().red()
            );
            error!("{}", error);
            error!("{}", format!("Hint: {}", error.hint()).dimmed().italic());
            ExitCode::FAILURE
        }
    }
}
