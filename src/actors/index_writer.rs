// Index Writer Actor - 使用Actor模式串行化相册索引写入
//
// 所有"读取完整列表-内存修改-写回完整列表"都在这一个Actor里顺序执行，
// 并发调用方不会互相覆盖

use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

use crate::error::{AppError, Result};
use crate::storage::index::{load_index, store_index};
use crate::storage::kv::KeyValueStore;

/// 索引写入命令
pub enum IndexWriterCommand {
    /// 在列表头部插入新标识
    Prepend {
        id: String,
        reply: oneshot::Sender<Result<bool>>,
    },

    /// 健康检查
    HealthCheck {
        reply: oneshot::Sender<()>,
    },
}

/// 索引写入Actor
pub struct IndexWriterActor {
    receiver: mpsc::Receiver<IndexWriterCommand>,
    kv: Arc<dyn KeyValueStore>,
    key: String,
}

impl IndexWriterActor {
    /// 创建新的Actor
    pub fn new(kv: Arc<dyn KeyValueStore>, key: String) -> (Self, IndexWriterHandle) {
        let (sender, receiver) = mpsc::channel(32);
        let actor = Self { receiver, kv, key };
        let handle = IndexWriterHandle { sender };
        (actor, handle)
    }

    /// 运行Actor
    pub async fn run(mut self) {
        tracing::info!("Index Writer Actor 已启动");

        while let Some(cmd) = self.receiver.recv().await {
            match cmd {
                IndexWriterCommand::Prepend { id, reply } => {
                    let result = self.prepend(id).await;
                    let _ = reply.send(result);
                }

                IndexWriterCommand::HealthCheck { reply } => {
                    let _ = reply.send(());
                }
            }
        }

        tracing::info!("Index Writer Actor 已停止");
    }

    async fn prepend(&self, id: String) -> Result<bool> {
        let mut list = load_index(self.kv.as_ref(), &self.key).await?;

        if list.iter().any(|existing| existing == &id) {
            tracing::debug!("相册索引中已存在 {}，跳过", id);
            return Ok(false);
        }

        // 最新的放在最前面
        list.insert(0, id);
        store_index(self.kv.as_ref(), &self.key, &list).await?;
        tracing::debug!("相册索引已更新，共 {} 条", list.len());
        Ok(true)
    }
}

/// 索引写入Handle
#[derive(Clone)]
pub struct IndexWriterHandle {
    sender: mpsc::Sender<IndexWriterCommand>,
}

impl IndexWriterHandle {
    /// 在索引头部插入标识，已存在时返回 Ok(false)
    pub async fn prepend(&self, id: String) -> Result<bool> {
        let (reply, rx) = oneshot::channel();
        self.sender
            .send(IndexWriterCommand::Prepend { id, reply })
            .await
            .map_err(|_| AppError::Storage("索引写入器已停止".to_string()))?;

        rx.await
            .map_err(|_| AppError::Storage("索引写入器未返回结果".to_string()))?
    }

    /// 健康检查
    pub async fn health_check(&self) -> bool {
        let (reply, rx) = oneshot::channel();

        if self
            .sender
            .send(IndexWriterCommand::HealthCheck { reply })
            .await
            .is_err()
        {
            tracing::warn!("Index Writer Actor 健康检查失败: 通道已关闭");
            return false;
        }

        // 等待响应，超时5秒
        match tokio::time::timeout(std::time::Duration::from_secs(5), rx).await {
            Ok(Ok(())) => true,
            Ok(Err(_)) => {
                tracing::warn!("Index Writer Actor 健康检查失败: Actor已停止");
                false
            }
            Err(_) => {
                tracing::warn!("Index Writer Actor 健康检查失败: 超时(5秒)");
                false
            }
        }
    }
}
