// 相册视图数据源 - 每次激活时重新加载索引
//
// 视图失活后仍在进行的加载结果会被丢弃，不会覆盖新的状态

use super::gallery::GalleryStore;
use crate::models::GalleryEntry;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// 激活状态，检查与发布结果都在同一把锁内完成
struct Gate {
    /// 每次激活/失活都递增，加载完成时用于判断结果是否过期
    generation: u64,
    active: bool,
}

struct FeedState {
    gate: Mutex<Gate>,
    sender: watch::Sender<Vec<GalleryEntry>>,
}

impl FeedState {
    fn gate(&self) -> MutexGuard<'_, Gate> {
        self.gate
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// 相册视图数据源
pub struct GalleryFeed {
    store: Arc<GalleryStore>,
    state: Arc<FeedState>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl GalleryFeed {
    pub fn new(store: Arc<GalleryStore>) -> Self {
        let (sender, _) = watch::channel(Vec::new());
        Self {
            store,
            state: Arc::new(FeedState {
                gate: Mutex::new(Gate {
                    generation: 0,
                    active: false,
                }),
                sender,
            }),
            task: Mutex::new(None),
        }
    }

    /// 视图激活：启动一次重新加载，取消尚未完成的上一次加载
    pub fn activate(&self) {
        let generation = {
            let mut gate = self.state.gate();
            gate.generation += 1;
            gate.active = true;
            gate.generation
        };

        let store = self.store.clone();
        let state = self.state.clone();
        let handle = tokio::spawn(async move {
            let entries = match store.list_entries().await {
                Ok(entries) => entries,
                Err(e) => {
                    warn!("加载相册失败: {}", e);
                    Vec::new()
                }
            };

            // 持锁发布，失活返回后不会再有结果落地
            let gate = state.gate();
            if !gate.active || gate.generation != generation {
                debug!(
                    "丢弃过期的相册加载结果 (第 {} 次, 当前 {})",
                    generation, gate.generation
                );
                return;
            }

            debug!("相册已加载 {} 张照片", entries.len());
            state.sender.send_replace(entries);
        });

        self.replace_task(Some(handle));
    }

    /// 视图失活：正在进行的加载结果不会再被应用
    pub fn deactivate(&self) {
        {
            let mut gate = self.state.gate();
            gate.active = false;
            gate.generation += 1;
        }
        self.replace_task(None);
    }

    fn replace_task(&self, next: Option<JoinHandle<()>>) {
        let mut task = self
            .task
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(previous) = task.take() {
            previous.abort();
        }
        *task = next;
    }

    pub fn is_active(&self) -> bool {
        self.state.gate().active
    }

    /// 当前已应用的相册列表
    pub fn entries(&self) -> Vec<GalleryEntry> {
        self.state.sender.borrow().clone()
    }

    /// 订阅相册列表变化
    pub fn subscribe(&self) -> watch::Receiver<Vec<GalleryEntry>> {
        self.state.sender.subscribe()
    }
}

impl Drop for GalleryFeed {
    fn drop(&mut self) {
        self.deactivate();
    }
}
