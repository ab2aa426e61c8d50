// 拍照相册 - 核心库

// 声明模块
pub mod actors;
pub mod app;
pub mod capture;
pub mod coordinator;
pub mod error;
pub mod event_bus;
pub mod logger;
pub mod models;
pub mod reminder;
pub mod settings;
pub mod storage;
pub mod utils;

use std::sync::Arc;

pub use app::{init, init_default, start_background_tasks, Collaborators};
pub use capture::{CaptureDevice, CaptureOptions, CaptureStager};
pub use coordinator::{CaptureOutcome, CoordinatorState, PersistenceCoordinator};
pub use error::{AppError, Result};
pub use event_bus::{AppEvent, EventBus};
pub use reminder::{LocalNotificationService, NotificationService, ReminderScheduler, ReminderState};
pub use settings::SettingsManager;
pub use storage::{GalleryFeed, GalleryStore, StorageCleaner};

/// 应用状态
///
/// - 相册存储：持久化照片并维护索引
/// - 拍照协调器：驱动 拍照 -> 预览 -> 保存/丢弃 流程
/// - 提醒调度器：管理周期性提醒
/// - 事件总线：用于模块间解耦通信
#[derive(Clone)]
pub struct AppState {
    /// 配置管理
    pub settings: Arc<SettingsManager>,
    /// 事件总线
    pub event_bus: Arc<EventBus>,
    /// 相册存储
    pub store: Arc<GalleryStore>,
    /// 相册界面数据源
    pub feed: Arc<GalleryFeed>,
    /// 拍照协调器
    pub coordinator: Arc<PersistenceCoordinator>,
    /// 提醒调度器
    pub reminders: Arc<ReminderScheduler>,
    /// 存储清理器
    pub cleaner: Arc<StorageCleaner>,
}
