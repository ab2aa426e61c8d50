// 文件系统抽象 - 相册存储只通过此接口访问磁盘

use anyhow::Result;
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::Path;

/// 文件系统操作接口
#[async_trait]
pub trait FileSystem: Send + Sync {
    /// 文件或目录是否存在
    async fn exists(&self, path: &Path) -> Result<bool>;

    /// 复制文件，返回复制的字节数
    async fn copy(&self, from: &Path, to: &Path) -> Result<u64>;

    /// 删除文件，文件不存在时视为成功，返回是否真的删除了文件
    async fn remove_file(&self, path: &Path) -> Result<bool>;

    /// 递归创建目录，已存在时视为成功
    async fn create_dir_all(&self, path: &Path) -> Result<()>;
}

/// 基于 tokio::fs 的本地文件系统
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalFileSystem;

#[async_trait]
impl FileSystem for LocalFileSystem {
    async fn exists(&self, path: &Path) -> Result<bool> {
        Ok(tokio::fs::try_exists(path).await?)
    }

    async fn copy(&self, from: &Path, to: &Path) -> Result<u64> {
        Ok(tokio::fs::copy(from, to).await?)
    }

    async fn remove_file(&self, path: &Path) -> Result<bool> {
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn create_dir_all(&self, path: &Path) -> Result<()> {
        tokio::fs::create_dir_all(path).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_remove_file_is_idempotent() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.jpg");
        tokio::fs::write(&path, b"bytes").await.unwrap();

        let fs = LocalFileSystem;
        assert!(fs.remove_file(&path).await.unwrap());
        assert!(!fs.remove_file(&path).await.unwrap());
        assert!(!fs.exists(&path).await.unwrap());
    }

    #[tokio::test]
    async fn test_create_dir_all_twice() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("a/b/c");

        let fs = LocalFileSystem;
        fs.create_dir_all(&nested).await.unwrap();
        fs.create_dir_all(&nested).await.unwrap();
        assert!(fs.exists(&nested).await.unwrap());
    }
}
