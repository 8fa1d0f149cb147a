//! Server Configuration

use anyhow::{Context, Result};

/// Settings owned by the HTTP layer; collaborator settings live with
/// their clients in `simufolio-runtime`
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Listen address
    pub bind_addr: String,

    /// Shared secret the periodic trigger must present as a bearer token
    pub cron_secret: String,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());
        let cron_secret = std::env::var("CRON_SECRET").context("CRON_SECRET is unset")?;

        Ok(Self {
            bind_addr,
            cron_secret,
        })
    }
}
