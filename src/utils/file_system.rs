//! 文件系统操作工具
//!
//! 提供扩展名提取、日志目录与文档目录定位等功能

use std::path::{Path, PathBuf};

/// 提取文件扩展名，没有扩展名时使用默认值
pub fn extension_or_default(path: &Path, default: &str) -> String {
    path.extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty())
        .map(|ext| ext.to_string())
        .unwrap_or_else(|| default.to_string())
}

/// 获取日志目录路径（跨平台）
///
/// - macOS: ~/Library/Logs/photo-keeper
/// - Windows: %APPDATA%/photo-keeper/logs
/// - Linux: ~/.local/share/photo-keeper/logs
pub fn get_log_dir() -> PathBuf {
    if cfg!(target_os = "macos") {
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        PathBuf::from(home).join("Library/Logs/photo-keeper")
    } else if cfg!(target_os = "windows") {
        let appdata = std::env::var("APPDATA").unwrap_or_else(|_| ".".to_string());
        PathBuf::from(appdata).join("photo-keeper").join("logs")
    } else {
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        PathBuf::from(home).join(".local/share/photo-keeper/logs")
    }
}

/// 获取默认的文档根目录（跨平台）
pub fn get_documents_dir() -> PathBuf {
    if cfg!(target_os = "windows") {
        let appdata = std::env::var("APPDATA").unwrap_or_else(|_| ".".to_string());
        PathBuf::from(appdata).join("photo-keeper")
    } else {
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        PathBuf::from(home).join(".local/share/photo-keeper")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_fallback() {
        assert_eq!(extension_or_default(Path::new("/tmp/a.png"), "jpg"), "png");
        assert_eq!(extension_or_default(Path::new("/tmp/a"), "jpg"), "jpg");
        assert_eq!(extension_or_default(Path::new("/tmp/a."), "jpg"), "jpg");
        assert_eq!(extension_or_default(Path::new("/tmp/a.tar.HEIC"), "jpg"), "HEIC");
    }

    #[test]
    fn test_app_dirs_are_namespaced() {
        let log_dir = get_log_dir();
        let docs_dir = get_documents_dir();
        assert!(log_dir.to_string_lossy().contains("photo-keeper"));
        assert!(docs_dir.to_string_lossy().contains("photo-keeper"));
        assert_ne!(log_dir, docs_dir);
    }
}
