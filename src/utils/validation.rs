//! 输入验证工具函数
//!
//! 提醒间隔的输入校验，在调用通知服务之前完成

use crate::error::{AppError, Result};

/// 解析用户输入的小时数
///
/// 必须是有限的正数，否则返回 `AppError::Validation`
pub fn parse_positive_hours(input: &str) -> Result<f64> {
    let trimmed = input.trim();
    let hours = trimmed
        .parse::<f64>()
        .map_err(|_| AppError::Validation(format!("无法解析的小时数: {:?}", input)))?;

    if !hours.is_finite() || hours <= 0.0 {
        return Err(AppError::Validation(format!(
            "请输入正数小时数，当前为: {}",
            trimmed
        )));
    }
    Ok(hours)
}

/// 小时数转换为秒，四舍五入，最小为1秒
pub fn hours_to_interval_secs(hours: f64) -> u64 {
    (hours * 3600.0).round().max(1.0) as u64
}

/// 重复通知间隔上限（秒），约136年
pub const MAX_REPEAT_INTERVAL_SECS: u64 = u32::MAX as u64;

/// 校验重复通知间隔在平台下限与 `MAX_REPEAT_INTERVAL_SECS` 之间
///
/// 超出范围时直接拒绝，不做截断
pub fn validate_repeat_interval(seconds: u64, floor: Option<u64>) -> Result<()> {
    if seconds > MAX_REPEAT_INTERVAL_SECS {
        return Err(AppError::Validation(format!(
            "重复提醒间隔不能超过 {} 秒",
            MAX_REPEAT_INTERVAL_SECS
        )));
    }

    match floor {
        Some(min) if seconds < min => Err(AppError::Validation(format!(
            "重复提醒间隔至少为 {} 秒，当前为 {} 秒",
            min, seconds
        ))),
        _ => Ok(()),
    }
}
