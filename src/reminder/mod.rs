// 提醒调度模块 - 保证同一时间最多只有一个重复提醒处于激活状态
//
// 输入校验与平台限制在调用通知服务之前完成

pub mod local;

use crate::error::{AppError, Result};
use crate::event_bus::{AppEvent, EventBus};
use crate::models::{
    NotificationChannel, NotificationRequest, PlatformFamily, ReminderJob, ReminderSettings,
};
use crate::utils::{hours_to_interval_secs, parse_positive_hours, validate_repeat_interval};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

pub use local::LocalNotificationService;

/// 通知服务接口
#[async_trait]
pub trait NotificationService: Send + Sync {
    /// 是否已获得通知权限
    async fn permission_granted(&self) -> anyhow::Result<bool>;

    /// 请求通知权限，返回是否获得
    async fn request_permission(&self) -> anyhow::Result<bool>;

    /// 创建通知渠道（仅部分平台需要）
    async fn ensure_channel(&self, _channel: &NotificationChannel) -> anyhow::Result<()> {
        Ok(())
    }

    /// 注册通知，返回服务分配的ID
    async fn schedule(&self, request: &NotificationRequest) -> anyhow::Result<String>;

    /// 取消指定通知
    async fn cancel(&self, id: &str) -> anyhow::Result<()>;

    /// 取消所有已注册的通知
    async fn cancel_all(&self) -> anyhow::Result<()>;
}

/// 调度器状态
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReminderState {
    Unarmed,
    Armed(ReminderJob),
}

/// 提醒调度器
///
/// 只在内存中记录当前任务ID，进程重启后需要用 `cancel_all` 清理遗留任务
pub struct ReminderScheduler {
    notifier: Arc<dyn NotificationService>,
    platform: PlatformFamily,
    settings: ReminderSettings,
    state: Mutex<ReminderState>,
    event_bus: Option<Arc<EventBus>>,
}

impl ReminderScheduler {
    pub fn new(
        notifier: Arc<dyn NotificationService>,
        platform: PlatformFamily,
        settings: ReminderSettings,
    ) -> Self {
        Self {
            notifier,
            platform,
            settings,
            state: Mutex::new(ReminderState::Unarmed),
            event_bus: None,
        }
    }

    pub fn with_event_bus(mut self, event_bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    fn publish(&self, event: AppEvent) {
        if let Some(bus) = &self.event_bus {
            bus.publish(event);
        }
    }

    pub fn platform(&self) -> PlatformFamily {
        self.platform
    }

    /// 输入框的默认小时数
    pub fn default_hours(&self) -> &str {
        &self.settings.default_hours
    }

    /// 当前状态
    pub async fn state(&self) -> ReminderState {
        self.state.lock().await.clone()
    }

    /// 当前激活的任务
    pub async fn current_job(&self) -> Option<ReminderJob> {
        match &*self.state.lock().await {
            ReminderState::Armed(job) => Some(job.clone()),
            ReminderState::Unarmed => None,
        }
    }

    pub async fn is_armed(&self) -> bool {
        self.current_job().await.is_some()
    }

    /// 检查并请求通知权限；Android 上同时创建默认通知渠道
    ///
    /// 返回是否已获得权限
    pub async fn prepare(&self) -> Result<bool> {
        let mut granted = self
            .notifier
            .permission_granted()
            .await
            .map_err(|e| AppError::PlatformRejection(format!("查询通知权限失败: {:#}", e)))?;

        if !granted {
            granted = self
                .notifier
                .request_permission()
                .await
                .map_err(|e| AppError::PlatformRejection(format!("请求通知权限失败: {:#}", e)))?;
            if !granted {
                warn!("未获得通知权限，提醒将无法送达");
            }
        }

        if self.platform.requires_channel() {
            self.notifier
                .ensure_channel(&NotificationChannel::default())
                .await
                .map_err(|e| AppError::PlatformRejection(format!("创建通知渠道失败: {:#}", e)))?;
        }

        Ok(granted)
    }

    /// 校验输入并换算为秒，不产生任何副作用
    pub fn validate_hours(&self, hours_input: &str) -> Result<u64> {
        let hours = parse_positive_hours(hours_input)?;
        let seconds = hours_to_interval_secs(hours);
        validate_repeat_interval(seconds, self.platform.min_repeat_interval_secs())?;
        Ok(seconds)
    }

    /// 设置重复提醒
    ///
    /// 已有任务时先取消旧任务，再注册新任务
    pub async fn schedule(&self, hours_input: &str) -> Result<ReminderJob> {
        let seconds = self.validate_hours(hours_input)?;

        let mut state = self.state.lock().await;

        if let ReminderState::Armed(previous) = &*state {
            self.notifier.cancel(&previous.id).await.map_err(|e| {
                AppError::PlatformRejection(format!("取消旧提醒失败: {:#}", e))
            })?;
            info!("已取消旧提醒: {}", previous.id);
            self.publish(AppEvent::ReminderCancelled {
                job_id: previous.id.clone(),
            });
            *state = ReminderState::Unarmed;
        }

        let request =
            NotificationRequest::repeating(&self.settings.title, &self.settings.body, seconds);
        let id = self
            .notifier
            .schedule(&request)
            .await
            .map_err(|e| AppError::PlatformRejection(format!("注册提醒失败: {:#}", e)))?;

        let job = ReminderJob::new(id, seconds);
        info!("提醒已设置: 每 {} 小时 (任务 {})", job.interval_label(), job.id);
        self.publish(AppEvent::ReminderScheduled {
            job_id: job.id.clone(),
            interval_secs: seconds,
        });
        *state = ReminderState::Armed(job.clone());
        Ok(job)
    }

    /// 取消当前提醒，未激活时为空操作
    pub async fn cancel(&self) -> Result<()> {
        let mut state = self.state.lock().await;

        let ReminderState::Armed(job) = &*state else {
            return Ok(());
        };

        self.notifier
            .cancel(&job.id)
            .await
            .map_err(|e| AppError::PlatformRejection(format!("取消提醒失败: {:#}", e)))?;

        info!("提醒已取消: {}", job.id);
        self.publish(AppEvent::ReminderCancelled {
            job_id: job.id.clone(),
        });
        *state = ReminderState::Unarmed;
        Ok(())
    }

    /// 取消通知服务中的所有提醒，包括之前进程遗留的任务
    pub async fn cancel_all(&self) -> Result<()> {
        let mut state = self.state.lock().await;

        self.notifier
            .cancel_all()
            .await
            .map_err(|e| AppError::PlatformRejection(format!("取消所有提醒失败: {:#}", e)))?;

        info!("所有提醒已取消");
        self.publish(AppEvent::AllRemindersCancelled);
        *state = ReminderState::Unarmed;
        Ok(())
    }
}
