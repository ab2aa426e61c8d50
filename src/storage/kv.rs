// 键值存储 - 相册索引持久化在一个固定键下

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::sync::{Mutex, RwLock};
use tracing::warn;

/// 键值存储接口
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// 读取键对应的值，不存在时返回 None
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// 写入键值，整体替换旧值
    async fn set(&self, key: &str, value: &str) -> Result<()>;
}

/// 基于单个 JSON 文件的键值存储
///
/// 写入时先写临时文件再重命名，读者不会看到写了一半的文件
pub struct JsonFileStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    pub async fn new(path: PathBuf) -> Result<Self> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        Ok(Self {
            path,
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<HashMap<String, String>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) if !bytes.is_empty() => {
                Ok(serde_json::from_slice(&bytes).unwrap_or_else(|e| {
                    warn!("键值存储文件损坏，按空处理 {:?}: {}", self.path, e);
                    HashMap::new()
                }))
            }
            Ok(_) => Ok(HashMap::new()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(e).with_context(|| format!("读取键值存储失败: {:?}", self.path)),
        }
    }

    async fn store(&self, map: &HashMap<String, String>) -> Result<()> {
        let json = serde_json::to_vec_pretty(map)?;
        let path = self.path.clone();

        tokio::task::spawn_blocking(move || -> Result<()> {
            let dir = path
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from("."));
            let mut temp = tempfile::NamedTempFile::new_in(&dir)?;
            temp.write_all(&json)?;
            temp.as_file().sync_all()?;
            temp.persist(&path)
                .map_err(|e| anyhow::anyhow!("替换键值存储文件失败: {}", e.error))?;
            Ok(())
        })
        .await?
    }
}

#[async_trait]
impl KeyValueStore for JsonFileStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.load().await?.remove(key))
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut map = self.load().await?;
        map.insert(key.to_string(), value.to_string());
        self.store(&map).await
    }
}

/// 内存键值存储，进程退出后数据丢失
#[derive(Default)]
pub struct MemoryStore {
    data: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.data.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.data
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}
