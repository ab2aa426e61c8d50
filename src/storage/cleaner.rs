// 存储清理模块 - 清理未进入索引的照片和被放弃的临时文件

use super::gallery::GalleryStore;
use crate::error::{AppError, Result};
use crate::event_bus::{AppEvent, EventBus};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::time::{interval, Duration};
use tracing::{error, info, warn};

/// 存储清理器
pub struct StorageCleaner {
    store: Arc<GalleryStore>,
    /// 孤立文件保留时长（小时）
    retention_hours: Arc<RwLock<u64>>,
    /// 最大保留时长（小时）
    max_retention_hours: u64,
    /// 拍照设备的临时目录
    staging_dir: Option<PathBuf>,
    event_bus: Option<Arc<EventBus>>,
}

impl StorageCleaner {
    /// 创建新的清理器
    pub fn new(store: Arc<GalleryStore>, retention_hours: u64, staging_dir: Option<PathBuf>) -> Self {
        Self {
            store,
            retention_hours: Arc::new(RwLock::new(retention_hours.max(1))),
            max_retention_hours: 24 * 30,
            staging_dir,
            event_bus: None,
        }
    }

    pub fn with_event_bus(mut self, event_bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    /// 设置保留时长
    pub async fn set_retention_hours(&self, hours: u64) -> Result<()> {
        if hours < 1 {
            return Err(AppError::Validation("保留时长必须至少为1小时".to_string()));
        }
        if hours > self.max_retention_hours {
            return Err(AppError::Validation(format!(
                "保留时长不能超过{}小时",
                self.max_retention_hours
            )));
        }

        *self.retention_hours.write().await = hours;
        info!("孤立文件保留时长已更新为: {}小时", hours);
        Ok(())
    }

    /// 获取当前保留时长
    pub async fn get_retention_hours(&self) -> u64 {
        *self.retention_hours.read().await
    }

    /// 启动自动清理任务
    pub fn start_cleanup_task(self: Arc<Self>) {
        tokio::spawn(async move {
            let mut interval = interval(Duration::from_secs(3600)); // 每小时检查一次
            info!("存储清理任务已启动，每小时检查一次");

            loop {
                interval.tick().await;

                if let Err(e) = self.perform_cleanup().await {
                    error!("清理任务执行失败: {}", e);
                }
            }
        });
    }

    /// 执行清理操作
    pub async fn perform_cleanup(&self) -> Result<CleanupResult> {
        let retention_secs = self.get_retention_hours().await.saturating_mul(3600);
        let mut result = CleanupResult::default();

        // 1. 相册目录中没有索引记录的文件（提交中途失败留下的）
        //    索引读不出来时无法区分孤立文件和已提交的照片，跳过
        match self.store.indexed_paths().await? {
            Some(indexed) => {
                let photos_dir = self.store.photos_dir().to_path_buf();
                self.sweep_dir(&photos_dir, retention_secs, |path| !indexed.contains(path), &mut result)
                    .await?;
            }
            None => {
                warn!("相册索引不存在或已损坏，跳过相册目录的孤立文件清理");
            }
        }

        // 2. 临时目录中被放弃的拍照结果
        if let Some(staging) = &self.staging_dir {
            self.sweep_dir(staging, retention_secs, |_| true, &mut result)
                .await?;
        }

        if !result.failed_files.is_empty() {
            error!("清理完成，但有 {} 个文件删除失败", result.failed_files.len());
            for (path, err) in &result.failed_files {
                error!("  - {}: {}", path, err);
            }
        }

        info!(
            "清理完成，删除了 {} 个文件，释放 {} 字节",
            result.files_deleted, result.space_freed
        );

        if let Some(bus) = &self.event_bus {
            bus.publish(AppEvent::StorageCleaned {
                files_deleted: result.files_deleted,
                space_freed: result.space_freed,
            });
        }

        Ok(result)
    }

    /// 删除目录中超过保留期限且满足条件的文件
    async fn sweep_dir<F>(
        &self,
        dir: &Path,
        retention_secs: u64,
        should_delete: F,
        result: &mut CleanupResult,
    ) -> Result<()>
    where
        F: Fn(&Path) -> bool,
    {
        let mut entries = match tokio::fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(AppError::Storage(format!("读取目录失败 {:?}: {}", dir, e))),
        };

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| AppError::Storage(format!("遍历目录失败 {:?}: {}", dir, e)))?
        {
            let path = entry.path();

            let Ok(metadata) = tokio::fs::metadata(&path).await else {
                continue;
            };
            if !metadata.is_file() || !should_delete(&path) {
                continue;
            }

            let age = metadata
                .modified()
                .ok()
                .and_then(|modified| std::time::SystemTime::now().duration_since(modified).ok())
                .unwrap_or_default();
            if age.as_secs() <= retention_secs {
                continue;
            }

            match tokio::fs::remove_file(&path).await {
                Ok(()) => {
                    info!("删除孤立文件: {:?}", path);
                    result.files_deleted += 1;
                    result.space_freed += metadata.len();
                }
                Err(e) => {
                    warn!("删除孤立文件失败 {:?}: {}", path, e);
                    result
                        .failed_files
                        .push((path.to_string_lossy().to_string(), e.to_string()));
                }
            }
        }

        Ok(())
    }

    /// 获取存储统计信息
    pub async fn get_storage_stats(&self) -> Result<StorageStats> {
        let photo_count = self.store.list_entries().await?.len();
        let photos_size = calculate_dir_size(self.store.photos_dir()).await?;
        let staging_size = match &self.staging_dir {
            Some(dir) => calculate_dir_size(dir).await?,
            None => 0,
        };

        Ok(StorageStats {
            photo_count,
            photos_size,
            staging_size,
            total_size: photos_size + staging_size,
            retention_hours: self.get_retention_hours().await,
        })
    }
}

/// 计算目录大小
async fn calculate_dir_size(dir: &Path) -> Result<u64> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(AppError::Storage(format!("读取目录失败 {:?}: {}", dir, e))),
    };

    let mut total_size = 0u64;
    while let Ok(Some(entry)) = entries.next_entry().await {
        if let Ok(metadata) = entry.metadata().await {
            if metadata.is_file() {
                total_size += metadata.len();
            }
        }
    }

    Ok(total_size)
}

/// 清理结果
#[derive(Debug, Default)]
pub struct CleanupResult {
    /// 删除的文件数
    pub files_deleted: usize,
    /// 释放的空间
    pub space_freed: u64,
    /// 删除失败的文件列表（路径，错误信息）
    pub failed_files: Vec<(String, String)>,
}

/// 存储统计信息
#[derive(Debug, serde::Serialize)]
pub struct StorageStats {
    pub photo_count: usize,
    pub photos_size: u64,
    pub staging_size: u64,
    pub total_size: u64,
    pub retention_hours: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::fs::LocalFileSystem;
    use crate::storage::kv::{KeyValueStore, MemoryStore};
    use std::time::SystemTime;
    use tempfile::tempdir;

    fn age_file(path: &Path, hours: u64) {
        let file = std::fs::OpenOptions::new().write(true).open(path).unwrap();
        file.set_modified(SystemTime::now() - Duration::from_secs(hours * 3600))
            .unwrap();
    }

    #[tokio::test]
    async fn test_cleanup_removes_unindexed_old_files_only() {
        let dir = tempdir().unwrap();
        let staging = dir.path().join("staging");
        tokio::fs::create_dir_all(&staging).await.unwrap();

        let store = Arc::new(GalleryStore::spawn(
            dir.path().join("photos"),
            "jpg",
            "k",
            Arc::new(LocalFileSystem),
            Arc::new(MemoryStore::new()),
        ));

        let temp = staging.join("capture.jpg");
        tokio::fs::write(&temp, b"12345").await.unwrap();

        let kept = store.persist(&temp).await.unwrap();
        store.append_entry(&kept).await.unwrap();
        let orphan = store.persist(&temp).await.unwrap();

        let fresh_orphan = store.persist(&temp).await.unwrap();

        age_file(Path::new(&kept), 48);
        age_file(Path::new(&orphan), 48);
        age_file(&temp, 48);

        let bus = Arc::new(EventBus::new(8));
        let mut events = bus.subscribe();
        let cleaner = StorageCleaner::new(store.clone(), 24, Some(staging.clone()))
            .with_event_bus(bus);

        let result = cleaner.perform_cleanup().await.unwrap();
        assert_eq!(result.files_deleted, 2);
        assert_eq!(result.space_freed, 10);
        assert!(Path::new(&kept).exists());
        assert!(!Path::new(&orphan).exists());
        assert!(!temp.exists());
        // 未超过保留期限的孤立文件保留
        assert!(Path::new(&fresh_orphan).exists());

        assert!(matches!(
            events.try_recv(),
            Ok(AppEvent::StorageCleaned { files_deleted: 2, .. })
        ));

        let stats = cleaner.get_storage_stats().await.unwrap();
        assert_eq!(stats.photo_count, 1);
        assert_eq!(stats.photos_size, 10);
        assert_eq!(stats.staging_size, 0);
    }

    #[tokio::test]
    async fn test_unreadable_index_keeps_committed_photos() {
        let dir = tempdir().unwrap();
        let staging = dir.path().join("staging");
        tokio::fs::create_dir_all(&staging).await.unwrap();
        let kv = Arc::new(MemoryStore::new());

        let store = Arc::new(GalleryStore::spawn(
            dir.path().join("photos"),
            "jpg",
            "k",
            Arc::new(LocalFileSystem),
            kv.clone(),
        ));

        let temp = staging.join("capture.jpg");
        tokio::fs::write(&temp, b"12345").await.unwrap();

        let mut committed = Vec::new();
        for _ in 0..3 {
            let id = store.persist(&temp).await.unwrap();
            store.append_entry(&id).await.unwrap();
            age_file(Path::new(&id), 48);
            committed.push(id);
        }
        age_file(&temp, 48);

        // 索引被截断
        kv.set("k", "[\"truncated").await.unwrap();

        let cleaner = StorageCleaner::new(store.clone(), 24, Some(staging.clone()));
        let result = cleaner.perform_cleanup().await.unwrap();

        // 只清理了临时目录
        assert_eq!(result.files_deleted, 1);
        assert!(!temp.exists());
        for id in &committed {
            assert!(Path::new(id).exists(), "已提交的照片不应被删除: {}", id);
        }

        // 索引键不存在时同样跳过
        let other = Arc::new(GalleryStore::spawn(
            dir.path().join("photos"),
            "jpg",
            "renamed",
            Arc::new(LocalFileSystem),
            kv,
        ));
        let result = StorageCleaner::new(other, 24, None)
            .perform_cleanup()
            .await
            .unwrap();
        assert_eq!(result.files_deleted, 0);
        assert_eq!(std::fs::read_dir(dir.path().join("photos")).unwrap().count(), 3);
    }

    #[tokio::test]
    async fn test_cleanup_without_directories_is_noop() {
        let dir = tempdir().unwrap();
        let store = Arc::new(GalleryStore::spawn(
            dir.path().join("photos"),
            "jpg",
            "k",
            Arc::new(LocalFileSystem),
            Arc::new(MemoryStore::new()),
        ));
        let cleaner = StorageCleaner::new(store, 24, Some(dir.path().join("missing")));

        let result = cleaner.perform_cleanup().await.unwrap();
        assert_eq!(result.files_deleted, 0);
    }

    #[tokio::test]
    async fn test_retention_bounds() {
        let dir = tempdir().unwrap();
        let store = Arc::new(GalleryStore::spawn(
            dir.path().join("photos"),
            "jpg",
            "k",
            Arc::new(LocalFileSystem),
            Arc::new(MemoryStore::new()),
        ));
        let cleaner = StorageCleaner::new(store, 24, None);

        assert!(cleaner.set_retention_hours(0).await.is_err());
        assert!(cleaner.set_retention_hours(24 * 31).await.is_err());
        cleaner.set_retention_hours(6).await.unwrap();
        assert_eq!(cleaner.get_retention_hours().await, 6);
    }
}
