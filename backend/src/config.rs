//! Runtime configuration, read once from the environment at startup.

use std::path::PathBuf;

/// Largest batch accepted by `POST /api/v1/batches` unless overridden.
pub const DEFAULT_MAX_BATCH_SIZE: usize = 100_000;

/// Request body limit for `POST /api/v1/batches` unless overridden. Large enough that
/// a full batch of short records is bounded by `MAX_BATCH_SIZE`, not by the body size.
pub const DEFAULT_MAX_BATCH_BODY_BYTES: usize = 64 * 1024 * 1024;

#[derive(Clone, Debug)]
pub struct Config {
    /// Listen address (`BACKEND_ADDR`).
    pub addr: String,
    /// Directory holding the SQLite ledger (`DATA_DIR`).
    pub data_dir: PathBuf,
    /// Key that authenticates the admin role (`ADMIN_API_KEY`).
    pub admin_api_key: String,
    /// Upper bound on records per published batch (`MAX_BATCH_SIZE`).
    pub max_batch_size: usize,
    /// Upper bound on the batch request body in bytes (`MAX_BATCH_BODY_BYTES`).
    pub max_batch_body_bytes: usize,
}

impl Config {
    pub fn from_env() -> Self {
        let addr = std::env::var("BACKEND_ADDR").unwrap_or_else(|_| "127.0.0.1:8080".to_string());
        let data_dir = std::env::var("DATA_DIR").map(PathBuf::from).unwrap_or_else(|_| PathBuf::from("data"));

        // In production, this should be a strong secret from environment.
        let admin_api_key = std::env::var("ADMIN_API_KEY").unwrap_or_else(|_| "dev-admin-key".to_string());

        let max_batch_size = std::env::var("MAX_BATCH_SIZE")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_MAX_BATCH_SIZE);

        let max_batch_body_bytes = std::env::var("MAX_BATCH_BODY_BYTES")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_MAX_BATCH_BODY_BYTES);

        Self {
            addr,
            data_dir,
            admin_api_key,
            max_batch_size,
            max_batch_body_bytes,
        }
    }

    /// SQLite URL for the ledger file inside `data_dir`; the file is created if missing.
    pub fn database_url(&self) -> String {
        let db_path = self.data_dir.join("ledger.sqlite");
        format!("sqlite:{}?mode=rwc", db_path.to_string_lossy())
    }
}
