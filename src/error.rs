// 领域错误类型 - 区分输入校验、存储、平台拒绝等错误来源

use thiserror::Error;

/// 应用错误
///
/// 所有错误都不是致命的：出错后状态机会回到一个稳定的、之前合法的状态
#[derive(Debug, Error)]
pub enum AppError {
    /// 用户输入不合法（非正数、非有限数、低于平台最小间隔）
    #[error("输入无效: {0}")]
    Validation(String),

    /// 文件或索引读写失败
    #[error("存储错误: {0}")]
    Storage(String),

    /// 通知服务拒绝了请求
    #[error("平台拒绝: {0}")]
    PlatformRejection(String),

    /// 拍照设备失败
    #[error("拍照失败: {0}")]
    CaptureFailure(String),

    /// 当前状态下不允许该操作
    #[error("状态 {state} 下不允许执行 {action}")]
    InvalidTransition {
        action: &'static str,
        state: &'static str,
    },

    /// 配置读写失败
    #[error("配置错误: {0}")]
    Config(String),
}

impl AppError {
    /// 是否为输入校验错误
    pub fn is_validation(&self) -> bool {
        matches!(self, AppError::Validation(_))
    }

    /// 是否为存储错误
    pub fn is_storage(&self) -> bool {
        matches!(self, AppError::Storage(_))
    }

    /// 是否为平台拒绝
    pub fn is_platform_rejection(&self) -> bool {
        matches!(self, AppError::PlatformRejection(_))
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
