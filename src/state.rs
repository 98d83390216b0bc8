use crate::config::Config;
use crate::db::open_connection;
use crate::import::exif::MetadataExtractor;
use crate::import::thumbnails::DerivativeSizes;
use crate::pictures::browse::parse_locale;
use crate::storage::StorageLayout;
use chrono::Locale;
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Shared by every request. Database connections are opened per request;
/// SQLite in WAL mode serialises writers itself.
#[derive(Clone)]
pub struct AppState {
    pub home: PathBuf,
    pub config: Arc<Config>,
    pub layout: StorageLayout,
    pub db_path: PathBuf,
    pub extractor: Arc<MetadataExtractor>,
    pub sizes: DerivativeSizes,
    pub locale: Locale,
}

impl AppState {
    pub fn new(home: &Path, config: Config) -> Self {
        Self {
            home: home.to_path_buf(),
            layout: StorageLayout::new(&config.storage_root(home)),
            db_path: config.database_path(home),
            extractor: Arc::new(MetadataExtractor::from_config(&config)),
            sizes: DerivativeSizes::from_config(&config),
            locale: parse_locale(&config.month_locale),
            config: Arc::new(config),
        }
    }

    pub fn connect(&self) -> anyhow::Result<Connection> {
        open_connection(&self.db_path)
    }
}
