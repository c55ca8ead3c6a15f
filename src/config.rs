use std::{env, net::SocketAddr, path::PathBuf};

use url::Url;

use crate::error::AppError;

/// Which relational store the repository talks to, derived from the
/// scheme of `DATABASE_URL`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Sqlite,
    Postgres,
}

impl Backend {
    pub fn from_url(database_url: &str) -> Result<Self, AppError> {
        let url = Url::parse(database_url)
            .map_err(|err| AppError::Config(format!("invalid DATABASE_URL: {err}")))?;
        match url.scheme() {
            "sqlite" => Ok(Backend::Sqlite),
            "postgres" | "postgresql" => Ok(Backend::Postgres),
            other => Err(AppError::Config(format!(
                "unsupported DATABASE_URL scheme `{other}`"
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub backend: Backend,
    pub listen_addr: SocketAddr,
    pub static_dir: PathBuf,
    pub cookie_secret: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let database_url =
            env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://ecoshift.db".to_string());
        let backend = Backend::from_url(&database_url)?;
        let listen_addr: SocketAddr = env::var("APP_LISTEN_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:3000".to_string())
            .parse()
            .map_err(|err| AppError::Config(format!("invalid APP_LISTEN_ADDR: {err}")))?;

        let static_dir = env::var("STATIC_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("static"));

        let cookie_secret = env::var("COOKIE_SECRET")
            .unwrap_or_else(|_| "change-me-ecoshift-session-cookie-secret".to_string());

        Ok(Self {
            database_url,
            backend,
            listen_addr,
            static_dir,
            cookie_secret,
        })
    }
}
