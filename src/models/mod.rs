// 数据模型模块 - 定义所有的数据结构

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// 相册索引的默认存储键
pub const DEFAULT_GALLERY_KEY: &str = "GALLERY_PHOTOS_URIS";

/// 没有扩展名时使用的默认扩展名
pub const DEFAULT_EXTENSION: &str = "jpg";

/// 一次尚未确认的拍照结果
///
/// 只持有临时文件的路径，同一个协调器里最多只存在一个实例
#[derive(Debug)]
pub struct CapturedImage {
    /// 临时文件路径
    temp_path: PathBuf,
    /// 拍照时间
    captured_at: DateTime<Utc>,
}

impl CapturedImage {
    pub fn new(temp_path: PathBuf) -> Self {
        Self {
            temp_path,
            captured_at: Utc::now(),
        }
    }

    /// 临时文件路径
    pub fn temp_path(&self) -> &Path {
        &self.temp_path
    }

    /// 拍照时间
    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }
}

/// 相册中的一条记录，只包含持久化文件的标识
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GalleryEntry(String);

impl GalleryEntry {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// 持久化标识（即文件路径）
    pub fn id(&self) -> &str {
        &self.0
    }

    /// 从文件名中的毫秒时间戳恢复创建时间
    ///
    /// 文件名格式: `{epochMillis}[-N].{ext}`
    pub fn captured_at(&self) -> Option<DateTime<Utc>> {
        let stem = Path::new(&self.0).file_stem()?.to_str()?;
        let millis = stem.split('-').next()?.parse::<i64>().ok()?;
        Utc.timestamp_millis_opt(millis).single()
    }
}

impl From<String> for GalleryEntry {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// 平台类型，决定重复通知的最小间隔等约束
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlatformFamily {
    Ios,
    Android,
    Desktop,
}

impl PlatformFamily {
    /// 根据编译目标检测当前平台
    pub fn current() -> Self {
        if cfg!(target_os = "ios") {
            PlatformFamily::Ios
        } else if cfg!(target_os = "android") {
            PlatformFamily::Android
        } else {
            PlatformFamily::Desktop
        }
    }

    /// 重复通知的最小间隔（秒），没有限制时返回 None
    pub fn min_repeat_interval_secs(&self) -> Option<u64> {
        match self {
            PlatformFamily::Ios => Some(3600),
            PlatformFamily::Android | PlatformFamily::Desktop => None,
        }
    }

    /// 是否需要在调度前创建通知渠道
    pub fn requires_channel(&self) -> bool {
        matches!(self, PlatformFamily::Android)
    }
}

/// 通知触发条件
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationTrigger {
    pub seconds: u64,
    pub repeats: bool,
}

/// 提交给通知服务的注册请求
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationRequest {
    pub title: String,
    pub body: String,
    pub trigger: NotificationTrigger,
}

impl NotificationRequest {
    /// 创建一个重复触发的请求
    pub fn repeating(title: impl Into<String>, body: impl Into<String>, seconds: u64) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            trigger: NotificationTrigger {
                seconds,
                repeats: true,
            },
        }
    }
}

/// Android 通知渠道
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationChannel {
    pub id: String,
    pub name: String,
    pub importance: ChannelImportance,
}

impl Default for NotificationChannel {
    fn default() -> Self {
        Self {
            id: "default".to_string(),
            name: "Default".to_string(),
            importance: ChannelImportance::Default,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelImportance {
    Low,
    Default,
    High,
}

/// 已注册的提醒任务
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReminderJob {
    /// 通知服务分配的ID
    pub id: String,
    /// 间隔（秒）
    pub interval_secs: u64,
    /// 总是 true
    pub repeats: bool,
}

impl ReminderJob {
    pub fn new(id: String, interval_secs: u64) -> Self {
        Self {
            id,
            interval_secs,
            repeats: true,
        }
    }

    /// 以小时显示的间隔，保留两位小数，整数时去掉 ".00"
    pub fn interval_label(&self) -> String {
        let hours = format!("{:.2}", self.interval_secs as f64 / 3600.0);
        match hours.strip_suffix(".00") {
            Some(whole) => whole.to_string(),
            None => hours,
        }
    }
}

/// 提醒通知的文案与默认值
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReminderSettings {
    /// 通知标题
    pub title: String,
    /// 通知正文
    pub body: String,
    /// 输入框默认小时数
    pub default_hours: String,
}

impl Default for ReminderSettings {
    fn default() -> Self {
        Self {
            title: "Photo reminder".to_string(),
            body: "Review the images you just took in the Gallery tab.".to_string(),
            default_hours: "1".to_string(),
        }
    }
}

/// 存储清理设置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanupSettings {
    /// 孤立文件保留时长（小时）
    pub orphan_retention_hours: u64,
    /// 拍照设备的临时目录，设置后清理时一并扫描
    pub staging_dir: Option<PathBuf>,
}

impl Default for CleanupSettings {
    fn default() -> Self {
        Self {
            orphan_retention_hours: 24,
            staging_dir: None,
        }
    }
}

/// 应用配置（部分更新）
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// 相册目录名
    pub photos_dir: Option<String>,
    /// 默认扩展名
    pub default_extension: Option<String>,
    /// 提交成功后是否删除临时文件
    pub delete_staged_after_commit: Option<bool>,
    /// 平台覆盖
    pub platform: Option<PlatformFamily>,
    /// 提醒设置
    pub reminder: Option<ReminderSettings>,
    /// 清理设置
    pub cleanup: Option<CleanupSettings>,
}

/// 持久化的应用配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistedAppConfig {
    /// 相册目录名（位于文档根目录下）
    pub photos_dir: String,
    /// 默认扩展名
    pub default_extension: String,
    /// 相册索引的存储键
    pub gallery_key: String,
    /// 提交成功后是否删除临时文件
    pub delete_staged_after_commit: bool,
    /// 平台覆盖，为空时自动检测
    pub platform: Option<PlatformFamily>,
    /// 提醒设置
    pub reminder: ReminderSettings,
    /// 清理设置
    pub cleanup: CleanupSettings,
}

impl Default for PersistedAppConfig {
    fn default() -> Self {
        Self {
            photos_dir: "photos".to_string(),
            default_extension: DEFAULT_EXTENSION.to_string(),
            gallery_key: DEFAULT_GALLERY_KEY.to_string(),
            delete_staged_after_commit: true,
            platform: None,
            reminder: ReminderSettings::default(),
            cleanup: CleanupSettings::default(),
        }
    }
}

impl PersistedAppConfig {
    /// 实际生效的平台
    pub fn effective_platform(&self) -> PlatformFamily {
        self.platform.unwrap_or_else(PlatformFamily::current)
    }
}
