// Actor模块 - 使用Actor模式管理并发状态
//
// 用消息传递替代Arc<Mutex<T>>，相册索引的写入全部经过同一个Actor

pub mod index_writer;

pub use index_writer::{IndexWriterActor, IndexWriterCommand, IndexWriterHandle};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::index::load_index;
    use crate::storage::kv::{KeyValueStore, MemoryStore};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_index_writer_health_check() {
        let kv: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let (actor, handle) = IndexWriterActor::new(kv, "k".to_string());

        tokio::spawn(async move {
            actor.run().await;
        });

        assert!(handle.health_check().await, "IndexWriterActor应该是健康的");
    }

    #[tokio::test]
    async fn test_health_check_fails_when_stopped() {
        let kv: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let (actor, handle) = IndexWriterActor::new(kv, "k".to_string());

        // 不运行Actor，直接drop
        drop(actor);

        assert!(!handle.health_check().await, "停止的Actor应该健康检查失败");
        assert!(handle.prepend("a".to_string()).await.unwrap_err().is_storage());
    }

    #[tokio::test]
    async fn test_prepend_orders_newest_first_and_skips_duplicates() {
        let kv: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let (actor, handle) = IndexWriterActor::new(kv.clone(), "k".to_string());
        tokio::spawn(actor.run());

        assert!(handle.prepend("a".to_string()).await.unwrap());
        assert!(handle.prepend("b".to_string()).await.unwrap());
        assert!(!handle.prepend("a".to_string()).await.unwrap());

        let list = load_index(kv.as_ref(), "k").await.unwrap();
        assert_eq!(list, vec!["b".to_string(), "a".to_string()]);
    }

    #[tokio::test]
    async fn test_concurrent_prepends_lose_nothing() {
        let kv: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let (actor, handle) = IndexWriterActor::new(kv.clone(), "k".to_string());
        tokio::spawn(actor.run());

        let mut tasks = Vec::new();
        for i in 0..50 {
            let handle = handle.clone();
            tasks.push(tokio::spawn(async move {
                handle.prepend(format!("id-{}", i)).await
            }));
        }
        for task in tasks {
            assert!(task.await.unwrap().unwrap());
        }

        let list = load_index(kv.as_ref(), "k").await.unwrap();
        assert_eq!(list.len(), 50);
    }
}
