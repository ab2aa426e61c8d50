// 相册索引读写 - 整体读取、整体写回，从不做增量修改

use super::kv::KeyValueStore;
use crate::error::{AppError, Result};
use tracing::warn;

/// 读取完整索引
///
/// 键不存在或内容无法解析时返回空列表；只有底层读取失败才报错
pub async fn load_index(kv: &dyn KeyValueStore, key: &str) -> Result<Vec<String>> {
    let raw = kv
        .get(key)
        .await
        .map_err(|e| AppError::Storage(format!("读取相册索引失败: {:#}", e)))?;

    let Some(raw) = raw else {
        return Ok(Vec::new());
    };

    match serde_json::from_str::<Vec<String>>(&raw) {
        Ok(list) => Ok(list),
        Err(e) => {
            warn!("相册索引无法解析，按空列表处理: {}", e);
            Ok(Vec::new())
        }
    }
}

/// 严格读取索引，用于会删除文件的场景
///
/// 键不存在或内容无法解析时返回 `Ok(None)`，调用方不能把它当作空相册
pub async fn load_index_strict(kv: &dyn KeyValueStore, key: &str) -> Result<Option<Vec<String>>> {
    let raw = kv
        .get(key)
        .await
        .map_err(|e| AppError::Storage(format!("读取相册索引失败: {:#}", e)))?;

    Ok(raw.and_then(|raw| serde_json::from_str::<Vec<String>>(&raw).ok()))
}

/// 整体写回索引
pub async fn store_index(kv: &dyn KeyValueStore, key: &str, list: &[String]) -> Result<()> {
    let json = serde_json::to_string(list)
        .map_err(|e| AppError::Storage(format!("序列化相册索引失败: {}", e)))?;
    kv.set(key, &json)
        .await
        .map_err(|e| AppError::Storage(format!("写入相册索引失败: {:#}", e)))
}
