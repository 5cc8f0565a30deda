use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};

use threadline_db::synthetic::DEFAULT_SEED;

const DEFAULT_CORS_ORIGINS: &str = "http://localhost:3000,http://127.0.0.1:3000";

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub seed: String,
    pub cors_origins: Vec<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let host = get("THREADLINE_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port: u16 = get("THREADLINE_PORT")
            .unwrap_or_else(|| "8000".into())
            .parse()
            .context("THREADLINE_PORT must be a port number")?;
        let db_path: PathBuf = get("THREADLINE_DB_PATH")
            .unwrap_or_else(|| "threadline.db".into())
            .into();
        let seed = get("THREADLINE_SEED")
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_SEED.into());
        let cors_origins = parse_origins(&get("THREADLINE_CORS_ORIGINS").unwrap_or_else(|| DEFAULT_CORS_ORIGINS.into()));

        Ok(Self { host, port, db_path, seed, cors_origins })
    }

    pub fn addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("Invalid listen address {}:{}", self.host, self.port))
    }
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
