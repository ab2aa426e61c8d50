// 进程内通知服务 - 用 tokio 定时任务模拟系统的本地通知

use super::NotificationService;
use crate::event_bus::{AppEvent, EventBus};
use crate::models::NotificationRequest;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Duration, Instant};
use tracing::{debug, info, trace};

/// 进程内通知服务
///
/// 每个注册的通知对应一个定时任务，触发时在事件总线上发布 `ReminderFired`
pub struct LocalNotificationService {
    jobs: Mutex<HashMap<String, JoinHandle<()>>>,
    event_bus: Arc<EventBus>,
}

impl LocalNotificationService {
    pub fn new(event_bus: Arc<EventBus>) -> Self {
        Self {
            jobs: Mutex::new(HashMap::new()),
            event_bus,
        }
    }

    fn jobs(&self) -> std::sync::MutexGuard<'_, HashMap<String, JoinHandle<()>>> {
        self.jobs
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// 已注册的通知数量
    pub fn pending_count(&self) -> usize {
        self.jobs().len()
    }
}

#[async_trait]
impl NotificationService for LocalNotificationService {
    async fn permission_granted(&self) -> anyhow::Result<bool> {
        Ok(true)
    }

    async fn request_permission(&self) -> anyhow::Result<bool> {
        Ok(true)
    }

    async fn schedule(&self, request: &NotificationRequest) -> anyhow::Result<String> {
        if request.trigger.seconds == 0 {
            anyhow::bail!("通知间隔必须大于0秒");
        }

        let period = Duration::from_secs(request.trigger.seconds);
        // 第一次触发在一个周期之后，之后的触发时间也必须可表示
        let start = Instant::now()
            .checked_add(period)
            .filter(|start| start.checked_add(period).is_some())
            .ok_or_else(|| anyhow::anyhow!("通知间隔过大: {} 秒", request.trigger.seconds))?;

        let id = uuid::Uuid::new_v4().to_string();
        let repeats = request.trigger.repeats;
        let bus = self.event_bus.clone();
        let job_id = id.clone();
        let title = request.title.clone();
        let body = request.body.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(start, period);
            loop {
                ticker.tick().await;
                trace!("本地通知触发: {}", job_id);
                bus.publish(AppEvent::ReminderFired {
                    job_id: job_id.clone(),
                    title: title.clone(),
                    body: body.clone(),
                });
                if !repeats {
                    break;
                }
            }
        });

        self.jobs().insert(id.clone(), handle);
        info!("本地通知已注册: {} (间隔 {} 秒)", id, request.trigger.seconds);
        Ok(id)
    }

    async fn cancel(&self, id: &str) -> anyhow::Result<()> {
        match self.jobs().remove(id) {
            Some(handle) => {
                handle.abort();
                debug!("本地通知已取消: {}", id);
            }
            None => debug!("本地通知不存在，忽略取消: {}", id),
        }
        Ok(())
    }

    async fn cancel_all(&self) -> anyhow::Result<()> {
        let drained: Vec<_> = self.jobs().drain().collect();
        for (_, handle) in drained.iter() {
            handle.abort();
        }
        info!("已取消 {} 个本地通知", drained.len());
        Ok(())
    }
}

impl Drop for LocalNotificationService {
    fn drop(&mut self) {
        for (_, handle) in self.jobs().drain() {
            handle.abort();
        }
    }
}
