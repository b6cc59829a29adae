use std::{env, net::SocketAddr, path::PathBuf};

use crate::error::AppError;

const DEFAULT_MAX_PHOTO_BYTES: usize = 8 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub listen_addr: SocketAddr,
    pub static_root: PathBuf,
    /// Upper bound on an uploaded photo before it is encoded inline.
    pub max_photo_bytes: usize,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let database_url = env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://mileage_tracker.db".to_string());
        let listen_addr: SocketAddr = env::var("APP_LISTEN_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:3000".to_string())
            .parse()
            .map_err(|err| AppError::Config(format!("invalid APP_LISTEN_ADDR: {err}")))?;

        let static_root = env::var("STATIC_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("static"));

        let max_photo_bytes = match env::var("MAX_PHOTO_BYTES") {
            Ok(raw) => raw
                .parse::<usize>()
                .map_err(|err| AppError::Config(format!("invalid MAX_PHOTO_BYTES: {err}")))?,
            Err(_) => DEFAULT_MAX_PHOTO_BYTES,
        };

        Ok(Self {
            database_url,
            listen_addr,
            static_root,
            max_photo_bytes,
        })
    }
}
