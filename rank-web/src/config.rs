use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context;

const DEFAULT_PORT: u16 = 5000;

/// Process-level settings taken from the environment.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub addr: SocketAddr,
    /// Explicit `config.json`; `None` means the per-user config dir.
    pub config_path: Option<PathBuf>,
    /// Directory holding `snapshot.json`; `None` means the per-user config dir.
    pub data_dir: Option<PathBuf>,
}

impl ServerConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let addr = match lookup("RANKWATCH_ADDR").filter(|v| !v.is_empty()) {
            Some(raw) => raw
                .parse()
                .with_context(|| format!("RANKWATCH_ADDR is not a socket address: {raw}"))?,
            None => {
                let port = lookup("PORT")
                    .and_then(|p| p.parse().ok())
                    .unwrap_or(DEFAULT_PORT);
                SocketAddr::from(([0, 0, 0, 0], port))
            }
        };

        Ok(Self {
            addr,
            config_path: lookup("RANKWATCH_CONFIG")
                .filter(|v| !v.is_empty())
                .map(PathBuf::from),
            data_dir: lookup("RANKWATCH_DATA_DIR")
                .filter(|v| !v.is_empty())
                .map(PathBuf::from),
        })
    }

    pub fn snapshot_path(&self) -> anyhow::Result<PathBuf> {
        let dir = match &self.data_dir {
            Some(dir) => dir.clone(),
            None => rank_core::config::app_dir().context("no data directory available")?,
        };
        Ok(dir.join("snapshot.json"))
    }
}
