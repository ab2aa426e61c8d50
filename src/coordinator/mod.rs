// 持久化协调器 - 拍照 → 预览 → 保存/丢弃/重拍 的状态机

use crate::capture::CaptureStager;
use crate::error::{AppError, Result};
use crate::event_bus::{AppEvent, EventBus};
use crate::models::CapturedImage;
use crate::storage::GalleryStore;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{info, warn};

/// 协调器状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatorState {
    Idle,
    Capturing,
    Previewing,
    Committing,
    Discarding,
}

impl CoordinatorState {
    pub fn name(&self) -> &'static str {
        match self {
            CoordinatorState::Idle => "Idle",
            CoordinatorState::Capturing => "Capturing",
            CoordinatorState::Previewing => "Previewing",
            CoordinatorState::Committing => "Committing",
            CoordinatorState::Discarding => "Discarding",
        }
    }
}

/// 状态及预览中的照片，照片只在 Previewing 时存在
enum Slot {
    Idle,
    Capturing,
    Previewing(CapturedImage),
    Committing,
    Discarding,
}

impl Slot {
    fn state(&self) -> CoordinatorState {
        match self {
            Slot::Idle => CoordinatorState::Idle,
            Slot::Capturing => CoordinatorState::Capturing,
            Slot::Previewing(_) => CoordinatorState::Previewing,
            Slot::Committing => CoordinatorState::Committing,
            Slot::Discarding => CoordinatorState::Discarding,
        }
    }
}

/// 拍照请求的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureOutcome {
    /// 拍照成功，进入预览
    Previewing { temp_path: PathBuf },
    /// 请求被丢弃（设备未就绪、已有拍照在进行或当前不在 Idle）
    Dropped,
}

/// 离开作用域时把状态复位为 Idle，除非已解除
struct ReturnToIdle<'a> {
    slot: &'a Mutex<Slot>,
    armed: bool,
}

impl ReturnToIdle<'_> {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for ReturnToIdle<'_> {
    fn drop(&mut self) {
        if self.armed {
            *lock(self.slot) = Slot::Idle;
        }
    }
}

fn lock(slot: &Mutex<Slot>) -> MutexGuard<'_, Slot> {
    slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// 持久化协调器
///
/// 同一时间最多只有一张预览中的照片；从 Previewing 回到 Capturing 必须先经过 Idle
pub struct PersistenceCoordinator {
    stager: Arc<CaptureStager>,
    store: Arc<GalleryStore>,
    slot: Mutex<Slot>,
    /// 提交后是否删除临时文件
    delete_staged_after_commit: bool,
    event_bus: Option<Arc<EventBus>>,
}

impl PersistenceCoordinator {
    pub fn new(stager: Arc<CaptureStager>, store: Arc<GalleryStore>) -> Self {
        Self {
            stager,
            store,
            slot: Mutex::new(Slot::Idle),
            delete_staged_after_commit: true,
            event_bus: None,
        }
    }

    pub fn with_staged_cleanup(mut self, delete_staged_after_commit: bool) -> Self {
        self.delete_staged_after_commit = delete_staged_after_commit;
        self
    }

    pub fn with_event_bus(mut self, event_bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    /// 当前状态
    pub fn state(&self) -> CoordinatorState {
        lock(&self.slot).state()
    }

    /// 预览中照片的临时路径
    pub fn preview_path(&self) -> Option<PathBuf> {
        match &*lock(&self.slot) {
            Slot::Previewing(image) => Some(image.temp_path().to_path_buf()),
            _ => None,
        }
    }

    fn publish(&self, event: AppEvent) {
        if let Some(bus) = &self.event_bus {
            bus.publish(event);
        }
    }

    /// 取出预览中的照片并切换到 `next`；不在 Previewing 时不做任何修改
    fn take_preview(&self, action: &'static str, next: Slot) -> Result<CapturedImage> {
        let mut slot = lock(&self.slot);
        match std::mem::replace(&mut *slot, next) {
            Slot::Previewing(image) => Ok(image),
            other => {
                let state = other.state().name();
                *slot = other;
                Err(AppError::InvalidTransition { action, state })
            }
        }
    }

    /// 拍照：Idle → Capturing → Previewing，失败或被丢弃时回到 Idle
    pub async fn capture(&self) -> Result<CaptureOutcome> {
        {
            let mut slot = lock(&self.slot);
            if !matches!(*slot, Slot::Idle) {
                info!("当前状态 {} 不允许拍照，丢弃请求", slot.state().name());
                return Ok(CaptureOutcome::Dropped);
            }
            *slot = Slot::Capturing;
        }
        let guard = ReturnToIdle {
            slot: &self.slot,
            armed: true,
        };

        match self.stager.acquire().await {
            Ok(Some(image)) => {
                let temp_path = image.temp_path().to_path_buf();
                let timestamp = image.captured_at();
                guard.disarm();
                *lock(&self.slot) = Slot::Previewing(image);

                self.publish(AppEvent::PhotoCaptured {
                    temp_path: temp_path.clone(),
                    timestamp,
                });
                Ok(CaptureOutcome::Previewing { temp_path })
            }
            Ok(None) => Ok(CaptureOutcome::Dropped),
            Err(e) => {
                self.publish(AppEvent::CaptureFailed {
                    error: e.to_string(),
                });
                Err(e)
            }
        }
    }

    /// 保存：Previewing → Committing → Idle
    ///
    /// 先复制文件再写索引；任一步失败都会回到 Idle 并返回错误，
    /// 已复制但未写入索引的文件会被删除
    pub async fn commit(&self) -> Result<String> {
        let image = self.take_preview("commit", Slot::Committing)?;
        let _guard = ReturnToIdle {
            slot: &self.slot,
            armed: true,
        };

        let result = self.persist_and_index(&image).await;

        if self.delete_staged_after_commit {
            self.stager.discard(&image).await;
        }

        match &result {
            Ok(id) => {
                info!("照片已加入相册: {}", id);
                self.publish(AppEvent::PhotoCommitted { id: id.clone() });
            }
            Err(e) => {
                warn!("保存照片失败: {}", e);
                self.publish(AppEvent::CommitFailed {
                    error: e.to_string(),
                });
            }
        }
        result
    }

    async fn persist_and_index(&self, image: &CapturedImage) -> Result<String> {
        let id = self.store.persist(image.temp_path()).await?;
        if let Err(e) = self.store.append_entry(&id).await {
            self.store.remove_durable(&id).await;
            return Err(e);
        }
        Ok(id)
    }

    /// 丢弃：Previewing → Discarding → Idle，无论删除是否成功
    pub async fn discard(&self) -> Result<()> {
        let image = self.take_preview("discard", Slot::Discarding)?;
        let _guard = ReturnToIdle {
            slot: &self.slot,
            armed: true,
        };

        self.stager.discard(&image).await;
        self.publish(AppEvent::PhotoDiscarded {
            temp_path: image.temp_path().to_path_buf(),
        });
        Ok(())
    }

    /// 重拍：Previewing → Idle，不删除临时文件
    ///
    /// 遗留的临时文件由 StorageCleaner 按保留期限清理
    pub fn retake(&self) -> Result<()> {
        let image = self.take_preview("retake", Slot::Idle)?;
        info!("放弃预览，临时文件保留: {:?}", image.temp_path());
        self.publish(AppEvent::CaptureRetaken {
            temp_path: image.temp_path().to_path_buf(),
        });
        Ok(())
    }
}
