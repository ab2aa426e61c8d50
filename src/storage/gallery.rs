// 相册存储 - 持久化照片文件并维护有序索引

use super::fs::FileSystem;
use super::index::{load_index, load_index_strict};
use super::kv::KeyValueStore;
use crate::actors::{IndexWriterActor, IndexWriterHandle};
use crate::error::{AppError, Result};
use crate::models::GalleryEntry;
use crate::utils::extension_or_default;
use chrono::Utc;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

/// 同一毫秒内最多尝试的文件名数量
const MAX_NAME_ATTEMPTS: u32 = 1000;

/// 相册存储
///
/// 照片文件保存在 `{文档根目录}/{photos_dir}/{epochMillis}[-N].{ext}`，
/// 文件路径即为持久化标识；索引以JSON数组的形式整体保存在一个固定键下
pub struct GalleryStore {
    /// 照片目录
    photos_dir: PathBuf,
    /// 默认扩展名
    default_extension: String,
    /// 索引存储键
    key: String,
    fs: Arc<dyn FileSystem>,
    kv: Arc<dyn KeyValueStore>,
    /// 索引写入Actor
    writer: IndexWriterHandle,
    /// 上一次使用的 (毫秒时间戳, 序号)
    last_stamp: Mutex<(i64, u32)>,
}

impl GalleryStore {
    /// 创建相册存储并启动索引写入Actor
    ///
    /// 需要在 tokio 运行时中调用
    pub fn spawn(
        photos_dir: PathBuf,
        default_extension: impl Into<String>,
        key: impl Into<String>,
        fs: Arc<dyn FileSystem>,
        kv: Arc<dyn KeyValueStore>,
    ) -> Self {
        let key = key.into();
        let (actor, writer) = IndexWriterActor::new(kv.clone(), key.clone());
        tokio::spawn(actor.run());

        Self {
            photos_dir,
            default_extension: default_extension.into(),
            key,
            fs,
            kv,
            writer,
            last_stamp: Mutex::new((i64::MIN, 0)),
        }
    }

    /// 照片目录
    pub fn photos_dir(&self) -> &Path {
        &self.photos_dir
    }

    /// 确保照片目录存在，可重复调用
    pub async fn ensure_storage_location(&self) -> Result<()> {
        self.fs
            .create_dir_all(&self.photos_dir)
            .await
            .map_err(|e| AppError::Storage(format!("创建照片目录失败 {:?}: {:#}", self.photos_dir, e)))
    }

    /// 生成下一个文件名，同一毫秒内追加递增序号
    fn next_file_name(&self, extension: &str) -> String {
        let now = Utc::now().timestamp_millis();
        let (millis, seq) = {
            let mut last = self
                .last_stamp
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            // 时钟回拨时沿用上一次的时间戳，保证标识单调
            *last = if now > last.0 { (now, 0) } else { (last.0, last.1 + 1) };
            *last
        };

        if seq == 0 {
            format!("{}.{}", millis, extension)
        } else {
            format!("{}-{}.{}", millis, seq, extension)
        }
    }

    /// 将临时文件复制到相册目录，返回持久化标识
    ///
    /// 不会删除临时文件，由调用方负责清理
    pub async fn persist(&self, temp: &Path) -> Result<String> {
        self.ensure_storage_location().await?;

        let extension = extension_or_default(temp, &self.default_extension);

        let mut dest = None;
        for _ in 0..MAX_NAME_ATTEMPTS {
            let candidate = self.photos_dir.join(self.next_file_name(&extension));
            let taken = self
                .fs
                .exists(&candidate)
                .await
                .map_err(|e| AppError::Storage(format!("检查文件失败 {:?}: {:#}", candidate, e)))?;
            if !taken {
                dest = Some(candidate);
                break;
            }
            debug!("文件名已被占用，重新生成: {:?}", candidate);
        }
        let dest = dest.ok_or_else(|| AppError::Storage("无法生成唯一的文件名".to_string()))?;

        let bytes = self
            .fs
            .copy(temp, &dest)
            .await
            .map_err(|e| AppError::Storage(format!("复制照片失败 {:?} -> {:?}: {:#}", temp, dest, e)))?;

        info!("照片已保存: {:?} ({} 字节)", dest, bytes);
        Ok(dest.to_string_lossy().to_string())
    }

    /// 把标识插入索引头部
    pub async fn append_entry(&self, id: &str) -> Result<()> {
        let inserted = self.writer.prepend(id.to_string()).await?;
        if !inserted {
            warn!("相册索引中已存在该标识，未重复添加: {}", id);
        }
        Ok(())
    }

    /// 读取当前相册，最新的在前
    ///
    /// 每次都重新读取存储，不做缓存
    pub async fn list_entries(&self) -> Result<Vec<GalleryEntry>> {
        let list = load_index(self.kv.as_ref(), &self.key).await?;
        Ok(list.into_iter().map(GalleryEntry::from).collect())
    }

    /// 索引中记录的全部文件路径
    ///
    /// 索引不存在或已损坏时返回 `Ok(None)`
    pub async fn indexed_paths(&self) -> Result<Option<HashSet<PathBuf>>> {
        let list = load_index_strict(self.kv.as_ref(), &self.key).await?;
        Ok(list.map(|ids| ids.into_iter().map(PathBuf::from).collect()))
    }

    /// 删除未进入索引的持久化文件，失败只记录日志
    pub async fn remove_durable(&self, id: &str) {
        match self.fs.remove_file(Path::new(id)).await {
            Ok(_) => debug!("已回滚持久化文件: {}", id),
            Err(e) => warn!("回滚持久化文件失败 {}: {:#}", id, e),
        }
    }

    /// 索引写入Actor是否正常
    pub async fn health_check(&self) -> bool {
        self.writer.health_check().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::fs::LocalFileSystem;
    use crate::storage::kv::MemoryStore;
    use tempfile::tempdir;

    fn store_in(root: &Path, kv: Arc<dyn KeyValueStore>) -> GalleryStore {
        GalleryStore::spawn(
            root.join("photos"),
            "jpg",
            "GALLERY_PHOTOS_URIS",
            Arc::new(LocalFileSystem),
            kv,
        )
    }

    async fn temp_photo(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        tokio::fs::write(&path, b"fake image bytes").await.unwrap();
        path
    }

    #[tokio::test]
    async fn test_persist_append_list_puts_new_entry_first() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path(), Arc::new(MemoryStore::new()));

        let first = temp_photo(dir.path(), "a.jpg").await;
        let id1 = store.persist(&first).await.unwrap();
        store.append_entry(&id1).await.unwrap();

        let second = temp_photo(dir.path(), "b.png").await;
        let id2 = store.persist(&second).await.unwrap();
        store.append_entry(&id2).await.unwrap();

        let entries = store.list_entries().await.unwrap();
        assert_eq!(entries[0].id(), id2);
        assert_eq!(entries[1].id(), id1);
        assert!(id2.ends_with(".png"));

        // 临时文件不会被 persist 删除
        assert!(first.exists());
        assert_eq!(tokio::fs::read(&id1).await.unwrap(), b"fake image bytes");
    }

    #[tokio::test]
    async fn test_identifiers_unique_within_same_millisecond() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path(), Arc::new(MemoryStore::new()));
        let temp = temp_photo(dir.path(), "burst.jpg").await;

        let mut ids = Vec::new();
        for _ in 0..20 {
            let id = store.persist(&temp).await.unwrap();
            store.append_entry(&id).await.unwrap();
            ids.push(id);
        }

        let entries = store.list_entries().await.unwrap();
        assert_eq!(entries.len(), 20);

        let unique: HashSet<_> = entries.iter().map(|e| e.id().to_string()).collect();
        assert_eq!(unique.len(), 20);

        // 倒序：最后提交的在最前面
        ids.reverse();
        let listed: Vec<_> = entries.iter().map(|e| e.id().to_string()).collect();
        assert_eq!(listed, ids);

        let stamps: Vec<_> = entries.iter().map(|e| e.captured_at().unwrap()).collect();
        assert!(stamps.windows(2).all(|w| w[0] >= w[1]));
    }

    #[test]
    fn test_same_millisecond_gets_suffix() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let _guard = rt.enter();
        let dir = tempdir().unwrap();
        let store = store_in(dir.path(), Arc::new(MemoryStore::new()));

        // 把上一次时间戳设到未来，模拟同一毫秒
        let future = Utc::now().timestamp_millis() + 60_000;
        *store.last_stamp.lock().unwrap() = (future, 0);

        assert_eq!(store.next_file_name("jpg"), format!("{}-1.jpg", future));
        assert_eq!(store.next_file_name("jpg"), format!("{}-2.jpg", future));
    }

    #[tokio::test]
    async fn test_missing_extension_uses_default() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path(), Arc::new(MemoryStore::new()));
        let temp = temp_photo(dir.path(), "noext").await;

        let id = store.persist(&temp).await.unwrap();
        assert!(id.ends_with(".jpg"));
        assert!(Path::new(&id).starts_with(store.photos_dir()));
    }

    #[tokio::test]
    async fn test_persist_missing_temp_is_storage_error() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path(), Arc::new(MemoryStore::new()));

        let err = store.persist(&dir.path().join("gone.jpg")).await.unwrap_err();
        assert!(err.is_storage());
    }

    #[tokio::test]
    async fn test_malformed_index_is_repaired_by_append() {
        let dir = tempdir().unwrap();
        let kv = Arc::new(MemoryStore::new());
        kv.set("GALLERY_PHOTOS_URIS", "garbage").await.unwrap();
        let store = store_in(dir.path(), kv.clone());

        assert!(store.list_entries().await.unwrap().is_empty());
        store.append_entry("/x/1.jpg").await.unwrap();

        let entries = store.list_entries().await.unwrap();
        assert_eq!(entries, vec![GalleryEntry::new("/x/1.jpg")]);
    }

    #[tokio::test]
    async fn test_list_sees_external_mutation() {
        let dir = tempdir().unwrap();
        let kv = Arc::new(MemoryStore::new());
        let store = store_in(dir.path(), kv.clone());

        store.append_entry("/x/1.jpg").await.unwrap();
        kv.set("GALLERY_PHOTOS_URIS", "[\"/x/9.jpg\"]").await.unwrap();

        let entries = store.list_entries().await.unwrap();
        assert_eq!(entries, vec![GalleryEntry::new("/x/9.jpg")]);
    }

    #[tokio::test]
    async fn test_remove_durable_twice() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path(), Arc::new(MemoryStore::new()));
        let temp = temp_photo(dir.path(), "a.jpg").await;
        let id = store.persist(&temp).await.unwrap();

        store.remove_durable(&id).await;
        store.remove_durable(&id).await;
        assert!(!Path::new(&id).exists());
    }
}
