//! Service facade owning every component

use crate::config::Config;
use crate::download::{
    ByteBudgetQuota, DownloadOrchestrator, MediaEngine, QuotaGate, UnlimitedQuota, YtDlpEngine,
};
use crate::error::Result;
use crate::files::FileGateway;
use crate::keys::KeyRegistry;
use crate::store::DocumentStore;
use crate::tasks::TaskRegistry;
use crate::types::permissions;
use std::sync::Arc;

/// Name under which the configured admin key is installed
pub const ADMIN_KEY_NAME: &str = "admin";

/// The media service: task and key registries, file gateway and download
/// orchestrator over one shared document store
///
/// # Example
///
/// ```no_run
/// use media_dl::{Config, MediaService};
///
/// # async fn example() -> media_dl::Result<()> {
/// let service = MediaService::new(Config::default()).await?;
/// let tasks = service.tasks().list().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct MediaService {
    config: Arc<Config>,
    store: DocumentStore,
    tasks: TaskRegistry,
    keys: KeyRegistry,
    files: FileGateway,
    downloads: DownloadOrchestrator,
}

impl MediaService {
    /// Build the service with the yt-dlp engine and the quota gate the
    /// configuration selects
    pub async fn new(config: Config) -> Result<Self> {
        let engine: Arc<dyn MediaEngine> = Arc::new(YtDlpEngine::from_config(&config.engine));
        let quota: Arc<dyn QuotaGate> = match config.quota.max_bytes_per_key {
            Some(limit) => Arc::new(ByteBudgetQuota::new(limit)),
            None => Arc::new(UnlimitedQuota),
        };
        Self::with_collaborators(config, engine, quota).await
    }

    /// Build the service with explicit engine and quota implementations
    ///
    /// Creates the download directory and installs the admin key from
    /// `config.auth.admin_key`, if any.
    pub async fn with_collaborators(
        config: Config,
        engine: Arc<dyn MediaEngine>,
        quota: Arc<dyn QuotaGate>,
    ) -> Result<Self> {
        config.validate()?;

        tokio::fs::create_dir_all(config.download_dir()).await?;

        let store = DocumentStore::from_config(&config.storage);
        let tasks = TaskRegistry::new(store.clone());
        let keys = KeyRegistry::new(store.clone());
        let files = FileGateway::new(config.download_dir().clone());

        tracing::info!(
            engine = engine.name(),
            quota = quota.name(),
            download_dir = %config.download_dir().display(),
            "media service initialized"
        );

        let downloads = DownloadOrchestrator::new(
            engine,
            quota,
            config.download_dir().clone(),
            config.download.clone(),
        );

        if let Some(admin_key) = &config.auth.admin_key {
            keys.ensure(ADMIN_KEY_NAME, admin_key, &permissions::ALL)
                .await?;
        }

        Ok(Self {
            config: Arc::new(config),
            store,
            tasks,
            keys,
            files,
            downloads,
        })
    }

    /// Active configuration
    pub fn config(&self) -> &Arc<Config> {
        &self.config
    }

    /// Underlying document store
    pub fn store(&self) -> &DocumentStore {
        &self.store
    }

    /// Task registry
    pub fn tasks(&self) -> &TaskRegistry {
        &self.tasks
    }

    /// Key registry
    pub fn keys(&self) -> &KeyRegistry {
        &self.keys
    }

    /// File gateway over the download directory
    pub fn files(&self) -> &FileGateway {
        &self.files
    }

    /// Synchronous download orchestrator
    pub fn downloads(&self) -> &DownloadOrchestrator {
        &self.downloads
    }
}
