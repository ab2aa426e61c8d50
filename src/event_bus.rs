// 事件总线 - 用于模块间解耦通信
//
// 实现发布/订阅模式,界面层通过订阅事件刷新相册和提醒状态
// 使用 tokio::sync::broadcast 实现高效的事件分发

use chrono::{DateTime, Utc};
use std::path::PathBuf;
use tokio::sync::broadcast;

/// 应用事件枚举 - 定义所有可能的系统事件
#[derive(Debug, Clone)]
pub enum AppEvent {
    // --- 拍照事件 ---

    /// 拍照完成，进入预览
    PhotoCaptured {
        temp_path: PathBuf,
        timestamp: DateTime<Utc>,
    },

    /// 拍照失败
    CaptureFailed {
        error: String,
    },

    /// 照片已保存到相册
    PhotoCommitted {
        id: String,
    },

    /// 保存失败
    CommitFailed {
        error: String,
    },

    /// 照片已丢弃
    PhotoDiscarded {
        temp_path: PathBuf,
    },

    /// 放弃预览，重新拍照
    CaptureRetaken {
        temp_path: PathBuf,
    },

    // --- 提醒事件 ---

    /// 提醒已设置
    ReminderScheduled {
        job_id: String,
        interval_secs: u64,
    },

    /// 提醒已取消
    ReminderCancelled {
        job_id: String,
    },

    /// 所有提醒已取消
    AllRemindersCancelled,

    /// 提醒触发（本地通知服务）
    ReminderFired {
        job_id: String,
        title: String,
        body: String,
    },

    // --- 系统事件 ---

    /// 配置更新事件
    ConfigUpdated,

    /// 存储清理完成事件
    StorageCleaned {
        files_deleted: usize,
        space_freed: u64,
    },
}

/// 事件总线 - 用于模块间解耦通信
///
/// 使用 broadcast channel 实现发布/订阅模式
/// 支持多个订阅者同时接收事件
pub struct EventBus {
    sender: broadcast::Sender<AppEvent>,
}

impl EventBus {
    /// 创建新的事件总线
    ///
    /// # 参数
    /// - `capacity`: 事件缓冲区大小,建议 100-1000
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// 发布事件
    ///
    /// 如果没有订阅者,事件会被丢弃(这是正常的)
    pub fn publish(&self, event: AppEvent) {
        match self.sender.send(event) {
            Ok(receiver_count) => {
                tracing::trace!("事件已发布，订阅者数量: {}", receiver_count);
            }
            Err(_) => {
                tracing::trace!("事件已发布但无订阅者");
            }
        }
    }

    /// 订阅事件
    ///
    /// 返回一个接收器,可以用 `.recv().await` 接收事件
    pub fn subscribe(&self) -> broadcast::Receiver<AppEvent> {
        self.sender.subscribe()
    }

    /// 获取当前订阅者数量
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_event_bus_basic() {
        let bus = EventBus::new(100);

        let mut receiver = bus.subscribe();

        bus.publish(AppEvent::PhotoCommitted {
            id: "/docs/photos/1.jpg".to_string(),
        });

        match receiver.recv().await {
            Ok(AppEvent::PhotoCommitted { id }) => {
                assert_eq!(id, "/docs/photos/1.jpg");
            }
            _ => panic!("未收到预期事件"),
        }
    }

    #[tokio::test]
    async fn test_multiple_subscribers() {
        let bus = EventBus::new(100);

        let mut receiver1 = bus.subscribe();
        let mut receiver2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);

        bus.publish(AppEvent::AllRemindersCancelled);

        // 两个订阅者都应该收到事件
        assert!(receiver1.try_recv().is_ok());
        assert!(receiver2.try_recv().is_ok());
    }

    #[test]
    fn test_publish_without_subscribers() {
        let bus = EventBus::new(8);
        bus.publish(AppEvent::ConfigUpdated);
        assert_eq!(bus.subscriber_count(), 0);
    }
}
