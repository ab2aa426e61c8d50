// 拍照模块 - 把一次进行中的拍照包装成可撤销的临时资源

use crate::error::{AppError, Result};
use crate::models::CapturedImage;
use crate::storage::FileSystem;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

/// 拍照参数
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureOptions {
    /// 图片质量 (0.0-1.0)
    pub quality: f32,
    /// 是否附带 EXIF
    pub include_exif: bool,
}

impl Default for CaptureOptions {
    fn default() -> Self {
        Self {
            quality: 1.0,
            include_exif: false,
        }
    }
}

/// 拍照设备接口
///
/// 设备把照片写到自己的临时文件里，并返回路径
#[async_trait]
pub trait CaptureDevice: Send + Sync {
    /// 设备是否已就绪
    fn is_ready(&self) -> bool;

    /// 拍一张照片
    async fn acquire(&self, options: &CaptureOptions) -> anyhow::Result<PathBuf>;
}

/// 拍照暂存器
///
/// 同一时间最多只有一次拍照在进行，期间到达的请求直接丢弃
pub struct CaptureStager {
    device: Arc<dyn CaptureDevice>,
    fs: Arc<dyn FileSystem>,
    options: CaptureOptions,
    in_flight: AtomicBool,
}

/// 离开作用域时清除进行中标记（包括 future 被取消的情况）
struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl CaptureStager {
    pub fn new(device: Arc<dyn CaptureDevice>, fs: Arc<dyn FileSystem>) -> Self {
        Self {
            device,
            fs,
            options: CaptureOptions::default(),
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn with_options(mut self, options: CaptureOptions) -> Self {
        self.options = options;
        self
    }

    /// 是否有拍照正在进行
    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// 设备是否就绪且空闲
    pub fn can_capture(&self) -> bool {
        self.device.is_ready() && !self.is_busy()
    }

    /// 拍照
    ///
    /// 设备未就绪或已有拍照在进行时返回 `Ok(None)`；设备失败返回 `CaptureFailure`
    pub async fn acquire(&self) -> Result<Option<CapturedImage>> {
        if !self.device.is_ready() {
            debug!("拍照设备未就绪，忽略本次请求");
            return Ok(None);
        }

        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("已有拍照在进行，丢弃本次请求");
            return Ok(None);
        }
        let _guard = InFlightGuard(&self.in_flight);

        match self.device.acquire(&self.options).await {
            Ok(path) => {
                info!("拍照成功，临时文件: {:?}", path);
                Ok(Some(CapturedImage::new(path)))
            }
            Err(e) => {
                warn!("拍照失败: {:#}", e);
                Err(AppError::CaptureFailure(format!("{:#}", e)))
            }
        }
    }

    /// 删除临时文件
    ///
    /// 文件已不存在视为成功；任何失败只记录日志，不会返回错误。
    /// 返回是否真的删除了文件
    pub async fn discard(&self, image: &CapturedImage) -> bool {
        let path = image.temp_path();

        match self.fs.exists(path).await {
            Ok(false) => {
                trace!("临时文件已不存在: {:?}", path);
                return false;
            }
            Ok(true) => {}
            Err(e) => {
                warn!("检查临时文件失败 {:?}: {:#}", path, e);
            }
        }

        match self.fs.remove_file(path).await {
            Ok(removed) => {
                if removed {
                    debug!("临时文件已删除: {:?}", path);
                }
                removed
            }
            Err(e) => {
                warn!("删除临时文件失败 {:?}: {:#}", path, e);
                false
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::path::Path;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::Notify;

    /// 测试用拍照设备：在指定目录写入临时文件
    pub struct FakeDevice {
        pub dir: PathBuf,
        pub ready: AtomicBool,
        pub fail: AtomicBool,
        pub gate: Option<Notify>,
        pub calls: AtomicUsize,
    }

    impl FakeDevice {
        pub fn new(dir: &Path) -> Self {
            Self {
                dir: dir.to_path_buf(),
                ready: AtomicBool::new(true),
                fail: AtomicBool::new(false),
                gate: None,
                calls: AtomicUsize::new(0),
            }
        }

        pub fn gated(dir: &Path) -> Self {
            Self {
                gate: Some(Notify::new()),
                ..Self::new(dir)
            }
        }
    }

    #[async_trait]
    impl CaptureDevice for FakeDevice {
        fn is_ready(&self) -> bool {
            self.ready.load(Ordering::SeqCst)
        }

        async fn acquire(&self, _options: &CaptureOptions) -> anyhow::Result<PathBuf> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            if self.fail.load(Ordering::SeqCst) {
                anyhow::bail!("camera unavailable");
            }
            let path = self.dir.join(format!("capture-{}.jpg", n));
            tokio::fs::write(&path, b"jpeg").await?;
            Ok(path)
        }
    }
}
