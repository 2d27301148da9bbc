use arc_swap::ArcSwap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info};

use super::AppConfig;
use crate::error::{AppError, Result};

/// Default configuration file name inside the data directory
pub const CONFIG_FILE_NAME: &str = "ptz-director.toml";

/// Configuration store backed by a TOML file
///
/// Uses `ArcSwap` for lock-free reads, so the control loop and the dispatcher
/// can read configuration on every step without contention.
#[derive(Clone)]
pub struct ConfigStore {
    path: PathBuf,
    /// Lock-free cache using ArcSwap for zero-cost reads
    cache: Arc<ArcSwap<AppConfig>>,
    change_tx: broadcast::Sender<ConfigChange>,
}

/// Configuration change event
#[derive(Debug, Clone)]
pub struct ConfigChange {
    pub key: String,
}

impl ConfigStore {
    /// Open the configuration file at `path`
    ///
    /// A missing file yields the defaults; the file is only created on the
    /// first `set`/`update`.
    pub async fn new(path: &Path) -> Result<Self> {
        let config = Self::load_config(path).await?;
        config.validate()?;
        let cache = Arc::new(ArcSwap::from_pointee(config));

        let (change_tx, _) = broadcast::channel(16);

        Ok(Self {
            path: path.to_path_buf(),
            cache,
            change_tx,
        })
    }

    /// Store that never touches the disk until written to
    pub fn with_config(path: &Path, config: AppConfig) -> Self {
        let (change_tx, _) = broadcast::channel(16);
        Self {
            path: path.to_path_buf(),
            cache: Arc::new(ArcSwap::from_pointee(config)),
            change_tx,
        }
    }

    /// Load configuration from file
    async fn load_config(path: &Path) -> Result<AppConfig> {
        match tokio::fs::read_to_string(path).await {
            Ok(text) => {
                let config: AppConfig = toml::from_str(&text)
                    .map_err(|e| AppError::Config(format!("{}: {}", path.display(), e)))?;
                info!("Loaded configuration from {}", path.display());
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(
                    "No configuration at {}, using defaults",
                    path.display()
                );
                Ok(AppConfig::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Save configuration to file
    ///
    /// Written to a sibling temporary file first and renamed over the target,
    /// so a reader never sees a half-written file.
    async fn save_config_to_file(path: &Path, config: &AppConfig) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let text = toml::to_string_pretty(config)
            .map_err(|e| AppError::Config(format!("Failed to serialize config: {}", e)))?;

        let tmp = path.with_extension("toml.tmp");
        tokio::fs::write(&tmp, text).await?;
        tokio::fs::rename(&tmp, path).await?;

        debug!("Saved configuration to {}", path.display());
        Ok(())
    }

    /// Get current configuration (lock-free, zero-copy)
    pub fn get(&self) -> Arc<AppConfig> {
        self.cache.load_full()
    }

    /// Set entire configuration
    pub async fn set(&self, config: AppConfig) -> Result<()> {
        config.validate()?;
        Self::save_config_to_file(&self.path, &config).await?;
        self.cache.store(Arc::new(config));

        let _ = self.change_tx.send(ConfigChange {
            key: "app_config".to_string(),
        });

        Ok(())
    }

    /// Update configuration with a closure
    ///
    /// Read-modify-write: for concurrent updates the last write wins.
    pub async fn update<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce(&mut AppConfig),
    {
        let mut config = (*self.cache.load_full()).clone();
        f(&mut config);
        config.validate()?;

        // Persist first, then publish
        Self::save_config_to_file(&self.path, &config).await?;
        self.cache.store(Arc::new(config));

        let _ = self.change_tx.send(ConfigChange {
            key: "app_config".to_string(),
        });

        Ok(())
    }

    /// Subscribe to configuration changes
    pub fn subscribe(&self) -> broadcast::Receiver<ConfigChange> {
        self.change_tx.subscribe()
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }
}
