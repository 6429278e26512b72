//! 通知服务错误类型
//!
//! 区分系统性推送失败、载荷无效与基础设施错误，
//! 便于上层根据错误类型决定告警或丢弃策略。

use push_shared::error::SharedError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("推送失败: 成功={success_count}, 失败={failure_count}, 原因={reason}")]
    PushFailed {
        success_count: usize,
        failure_count: usize,
        code: &'static str,
        reason: String,
    },

    #[error("推送请求反序列化失败: {0}")]
    DeserializationFailed(String),

    #[error(transparent)]
    Shared(#[from] SharedError),
}

impl NotificationError {
    /// 获取错误码
    pub fn code(&self) -> &'static str {
        match self {
            Self::PushFailed { code, .. } => *code,
            Self::DeserializationFailed(_) => "DESERIALIZATION_FAILED",
            Self::Shared(e) => e.code(),
        }
    }
}
