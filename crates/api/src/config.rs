//! Application configuration loaded from environment variables.

use std::path::PathBuf;

use view_engine::{DEFAULT_CACHE_COLLECTION, DEFAULT_PAGE_SIZE, EngineConfig};

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default: `"0.0.0.0"`)
/// - `PORT`: listen port (default: `3000`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `DATABASE_URL`: PostgreSQL connection string; unset runs on the in-memory store
/// - `VIEWS_PATH`: JSON view definition file; unset loads the bundled sample views
/// - `PAGE_SIZE`: items per cached page (default: `20`)
/// - `CACHE_COLLECTION`: collection holding pages and summaries (default: `"viewCache"`)
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub database_url: Option<String>,
    pub views_path: Option<PathBuf>,
    pub page_size: usize,
    pub cache_collection: String,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self {
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(3000),
            log_level: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            database_url: std::env::var("DATABASE_URL").ok().filter(|u| !u.is_empty()),
            views_path: std::env::var("VIEWS_PATH")
                .ok()
                .filter(|p| !p.is_empty())
                .map(PathBuf::from),
            page_size: std::env::var("PAGE_SIZE")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(DEFAULT_PAGE_SIZE),
            cache_collection: std::env::var("CACHE_COLLECTION")
                .unwrap_or_else(|_| DEFAULT_CACHE_COLLECTION.to_string()),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Engine settings derived from this configuration.
    pub fn engine_config(&self) -> view_engine::Result<EngineConfig> {
        EngineConfig::new(self.page_size, self.cache_collection.as_str())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            database_url: None,
            views_path: None,
            page_size: DEFAULT_PAGE_SIZE,
            cache_collection: DEFAULT_CACHE_COLLECTION.to_string(),
        }
    }
}
