use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use tokio::sync::RwLock;

use crate::event_bus::{AppEvent, EventBus};
use crate::models::{AppConfig, PersistedAppConfig};

pub struct SettingsManager {
    path: PathBuf,
    data: RwLock<PersistedAppConfig>,
    event_bus: Option<Arc<EventBus>>,
}

impl SettingsManager {
    pub async fn new(path: PathBuf) -> Result<Self> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let initial = match tokio::fs::read(&path).await {
            Ok(bytes) if !bytes.is_empty() => {
                serde_json::from_slice::<PersistedAppConfig>(&bytes).unwrap_or_else(|e| {
                    tracing::warn!("配置文件无法解析，使用默认配置: {}", e);
                    PersistedAppConfig::default()
                })
            }
            _ => {
                let default = PersistedAppConfig::default();
                let json = serde_json::to_string_pretty(&default)?;
                tokio::fs::write(&path, json).await?;
                default
            }
        };

        Ok(Self {
            path,
            data: RwLock::new(initial),
            event_bus: None,
        })
    }

    pub fn with_event_bus(mut self, event_bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    pub async fn get(&self) -> PersistedAppConfig {
        self.data.read().await.clone()
    }

    pub async fn update(&self, update: AppConfig) -> Result<PersistedAppConfig> {
        let mut config = self.data.write().await;

        if let Some(dir) = update.photos_dir {
            config.photos_dir = dir;
        }
        if let Some(ext) = update.default_extension {
            config.default_extension = ext.trim_start_matches('.').to_string();
        }
        if let Some(delete) = update.delete_staged_after_commit {
            config.delete_staged_after_commit = delete;
        }
        if let Some(platform) = update.platform {
            config.platform = Some(platform);
        }
        if let Some(reminder) = update.reminder {
            config.reminder = reminder;
        }
        if let Some(cleanup) = update.cleanup {
            config.cleanup = cleanup;
        }

        self.save(&config).await?;

        if let Some(bus) = &self.event_bus {
            bus.publish(AppEvent::ConfigUpdated);
        }
        Ok(config.clone())
    }

    async fn save(&self, config: &PersistedAppConfig) -> Result<()> {
        let json = serde_json::to_string_pretty(config)?;
        tokio::fs::write(&self.path, json).await?;
        Ok(())
    }
}
