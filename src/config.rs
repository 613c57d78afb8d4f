use std::{env, net::{SocketAddr, ToSocketAddrs as _}, time::Duration};

use sea_orm::ConnectOptions;
use thiserror::Error;
use tracing::info;

pub struct Config {
    pub host_address: SocketAddr,

    pub database_opt: ConnectOptions,

    pub jwt_key: String,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("environment `{0}` is required to be set")]
    Missing(&'static str),

    #[error("environment `{name}` is invalid: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Everything the HTTP server needs
pub fn load() -> Result<Config, ConfigError> {
    Ok(Config {
        host_address: load_host_address()?,
        database_opt: load_database_opt()?,
        jwt_key: required("JWT_SECRET")?,
    })
}

/// The CLI only talks to the database, it never checks tokens
pub fn load_cli() -> Result<ConnectOptions, ConfigError> {
    load_database_opt()
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    info!("Loading environment `{name}`");

    env::var(name).map_err(|_| ConfigError::Missing(name))
}

fn load_host_address() -> Result<SocketAddr, ConfigError> {
    info!("Loading environment `HOST_ADDRESS`");

    let var = env::var("HOST_ADDRESS").unwrap_or_else(|_| "127.0.0.1:0".to_string());

    let invalid = |reason: String| ConfigError::Invalid { name: "HOST_ADDRESS", reason };

    var.to_socket_addrs()
        .map_err(|err| invalid(err.to_string()))?
        .next()
        .ok_or_else(|| invalid("unable to resolve host".to_owned()))
}

/// `DATABASE_URL` plus an optional `DATABASE_MAX_CONNECTIONS`
///
/// A payroll run holds one connection for its whole transaction, so the pool
/// must leave room for the HTTP handlers.
fn load_database_opt() -> Result<ConnectOptions, ConfigError> {
    let mut opt = ConnectOptions::new(required("DATABASE_URL")?);
    opt.connect_timeout(Duration::from_secs(10));

    if let Ok(raw) = env::var("DATABASE_MAX_CONNECTIONS") {
        let max = raw.trim().parse::<u32>()
            .ok()
            .filter(|max| *max > 0)
            .ok_or_else(|| ConfigError::Invalid {
                name: "DATABASE_MAX_CONNECTIONS",
                reason: format!("`{raw}` is not a positive number"),
            })?;

        opt.max_connections(max);
    }

    Ok(opt)
}
