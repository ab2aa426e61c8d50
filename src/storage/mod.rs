// 存储模块 - 照片文件、相册索引与维护清理

// 子模块
pub mod cleaner;
pub mod feed;
pub mod fs;
pub mod gallery;
pub mod index;
pub mod kv;

// 重新导出主要类型
pub use cleaner::{CleanupResult, StorageCleaner, StorageStats};
pub use feed::GalleryFeed;
pub use fs::{FileSystem, LocalFileSystem};
pub use gallery::GalleryStore;
pub use kv::{JsonFileStore, KeyValueStore, MemoryStore};
