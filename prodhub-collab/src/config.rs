use std::env;

use thiserror::Error;

/// The default port the server will listen on.
pub const DEFAULT_PORT: u16 = 8080;
/// Session tokens expire after an hour unless configured otherwise.
const DEFAULT_TOKEN_EXPIRY_SECONDS: u64 = 3600;
const DEFAULT_STORAGE_DIR: &str = "uploads";

/// Environment-provided configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub jwt_secret: String,
    pub token_expiry_seconds: u64,
    pub storage_dir: String,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} is not set in the environment")]
    Missing(&'static str),
    #[error("{0} must be a number")]
    NotANumber(&'static str),
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = env::var("PRODHUB_DATABASE_URL")
            .map_err(|_| ConfigError::Missing("PRODHUB_DATABASE_URL"))?;

        let jwt_secret =
            env::var("PRODHUB_JWT_SECRET").map_err(|_| ConfigError::Missing("PRODHUB_JWT_SECRET"))?;

        let port = env::var("PRODHUB_SERVER_PORT")
            .ok()
            .map(|x| {
                x.parse()
                    .map_err(|_| ConfigError::NotANumber("PRODHUB_SERVER_PORT"))
            })
            .transpose()?
            .unwrap_or(DEFAULT_PORT);

        let token_expiry_seconds = env::var("PRODHUB_TOKEN_EXPIRY_SECONDS")
            .ok()
            .map(|x| {
                x.parse()
                    .map_err(|_| ConfigError::NotANumber("PRODHUB_TOKEN_EXPIRY_SECONDS"))
            })
            .transpose()?
            .unwrap_or(DEFAULT_TOKEN_EXPIRY_SECONDS);

        let storage_dir =
            env::var("PRODHUB_STORAGE_DIR").unwrap_or_else(|_| DEFAULT_STORAGE_DIR.to_string());

        Ok(Self {
            database_url,
            port,
            jwt_secret,
            token_expiry_seconds,
            storage_dir,
        })
    }
}
