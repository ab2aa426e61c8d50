//! 应用程序初始化
//!
//! 负责核心模块的完整装配流程，包括：
//! - 配置加载
//! - 相册存储与索引写入 Actor 启动
//! - 拍照协调器与提醒调度器创建
//! - 后台清理任务启动

use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use crate::capture::{CaptureDevice, CaptureStager};
use crate::coordinator::PersistenceCoordinator;
use crate::error::{AppError, Result};
use crate::event_bus::EventBus;
use crate::reminder::{LocalNotificationService, NotificationService, ReminderScheduler};
use crate::settings::SettingsManager;
use crate::storage::{
    FileSystem, GalleryFeed, GalleryStore, JsonFileStore, KeyValueStore, LocalFileSystem,
    StorageCleaner,
};
use crate::utils::get_documents_dir;
use crate::AppState;

/// 设置文件名
const SETTINGS_FILE: &str = "settings.json";
/// 键值存储文件名
const KV_FILE: &str = "storage.json";

/// 外部协作者
pub struct Collaborators {
    /// 拍照设备
    pub device: Arc<dyn CaptureDevice>,
    /// 通知服务，为空时使用进程内实现
    pub notifier: Option<Arc<dyn NotificationService>>,
    /// 键值存储，为空时使用文档目录下的 JSON 文件
    pub kv: Option<Arc<dyn KeyValueStore>>,
}

/// 初始化应用状态
///
/// 1. 加载配置
/// 2. 创建相册存储（启动索引写入 Actor）
/// 3. 创建拍照协调器
/// 4. 创建提醒调度器并检查通知权限
/// 5. 创建存储清理器
pub async fn init(documents_root: PathBuf, collaborators: Collaborators) -> Result<AppState> {
    info!("初始化相册应用: {:?}", documents_root);

    let event_bus = Arc::new(EventBus::new(256));

    let settings = Arc::new(
        SettingsManager::new(documents_root.join(SETTINGS_FILE))
            .await
            .map_err(|e| AppError::Config(format!("{:#}", e)))?
            .with_event_bus(event_bus.clone()),
    );
    let config = settings.get().await;
    let platform = config.effective_platform();
    info!("当前平台: {:?}", platform);

    let kv: Arc<dyn KeyValueStore> = match collaborators.kv {
        Some(kv) => kv,
        None => Arc::new(
            JsonFileStore::new(documents_root.join(KV_FILE))
                .await
                .map_err(|e| AppError::Storage(format!("{:#}", e)))?,
        ),
    };
    let fs: Arc<dyn FileSystem> = Arc::new(LocalFileSystem);

    let store = Arc::new(GalleryStore::spawn(
        documents_root.join(&config.photos_dir),
        config.default_extension.clone(),
        config.gallery_key.clone(),
        fs.clone(),
        kv,
    ));
    store.ensure_storage_location().await?;

    let feed = Arc::new(GalleryFeed::new(store.clone()));

    let stager = Arc::new(CaptureStager::new(collaborators.device, fs));
    let coordinator = Arc::new(
        PersistenceCoordinator::new(stager, store.clone())
            .with_staged_cleanup(config.delete_staged_after_commit)
            .with_event_bus(event_bus.clone()),
    );

    let notifier: Arc<dyn NotificationService> = match collaborators.notifier {
        Some(notifier) => notifier,
        None => Arc::new(LocalNotificationService::new(event_bus.clone())),
    };
    let reminders = Arc::new(
        ReminderScheduler::new(notifier, platform, config.reminder.clone())
            .with_event_bus(event_bus.clone()),
    );
    match reminders.prepare().await {
        Ok(true) => {}
        Ok(false) => warn!("通知权限未授予，提醒功能不可用"),
        Err(e) => warn!("通知服务初始化失败: {}", e),
    }

    let cleaner = Arc::new(
        StorageCleaner::new(
            store.clone(),
            config.cleanup.orphan_retention_hours,
            config.cleanup.staging_dir.clone(),
        )
        .with_event_bus(event_bus.clone()),
    );

    info!("相册应用初始化完成");

    Ok(AppState {
        settings,
        event_bus,
        store,
        feed,
        coordinator,
        reminders,
        cleaner,
    })
}

/// 在平台默认的文档目录下初始化应用状态
pub async fn init_default(collaborators: Collaborators) -> Result<AppState> {
    init(get_documents_dir(), collaborators).await
}

/// 启动后台任务
pub fn start_background_tasks(state: &AppState) {
    state.cleaner.clone().start_cleanup_task();
}
