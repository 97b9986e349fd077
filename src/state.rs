use std::sync::Arc;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use tokio::sync::Mutex;

use crate::config::Config;
use crate::media::MediaStore;
use crate::oauth::{OAuthStateStore, ProviderRegistry};

pub type DbPool = Pool<SqliteConnectionManager>;

#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub config: Config,
    pub media: MediaStore,
    pub oauth_states: Arc<Mutex<OAuthStateStore>>,
    pub providers: ProviderRegistry,
}

impl AppState {
    /// Build state with providers derived from `config.oauth`.
    pub fn new(db: DbPool, config: Config) -> anyhow::Result<Self> {
        let providers = ProviderRegistry::from_config(&config.oauth, &config.sync)?;
        Ok(Self::with_providers(db, config, providers))
    }

    pub fn with_providers(db: DbPool, config: Config, providers: ProviderRegistry) -> Self {
        Self {
            media: MediaStore::new(config.media_path()),
            db,
            config,
            oauth_states: Arc::new(Mutex::new(OAuthStateStore::new())),
            providers,
        }
    }
}
