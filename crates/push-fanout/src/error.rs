//! 推送引擎错误类型
//!
//! 失败分两类：
//! - 收件人级错误：某个设备令牌投递失败（如令牌过期），累积进合并错误，只体现在失败计数里；
//! - 直接错误：网关调用本身失败（网络、配额、鉴权），整个批次作废，需要单独告警。
//!
//! 调用方需要按类型分支处理，因此二者以 `DispatchErrors` 中的可选对同时返回。

use std::fmt;

use thiserror::Error;
use tokio::task::JoinError;

// ---------------------------------------------------------------------------
// GatewayError — 推送网关返回的错误
// ---------------------------------------------------------------------------

/// 推送网关错误
///
/// 既可能出现在批量响应内部（针对单个令牌），也可能作为整次调用的失败返回。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    #[error("设备令牌未注册: {0}")]
    Unregistered(String),

    #[error("推送请求参数无效: {0}")]
    InvalidArgument(String),

    #[error("推送配额超限: {0}")]
    QuotaExceeded(String),

    #[error("推送网关鉴权失败: {0}")]
    Unauthenticated(String),

    #[error("推送网关不可用: {0}")]
    Unavailable(String),

    #[error("推送网关内部错误: {0}")]
    Internal(String),
}

impl GatewayError {
    /// 获取错误码
    pub fn code(&self) -> &'static str {
        match self {
            Self::Unregistered(_) => "UNREGISTERED",
            Self::InvalidArgument(_) => "INVALID_ARGUMENT",
            Self::QuotaExceeded(_) => "QUOTA_EXCEEDED",
            Self::Unauthenticated(_) => "UNAUTHENTICATED",
            Self::Unavailable(_) => "UNAVAILABLE",
            Self::Internal(_) => "INTERNAL",
        }
    }

    /// 令牌已失效（应用被卸载或令牌轮换），单播路径对此类错误不视为失败
    pub fn is_unregistered(&self) -> bool {
        matches!(self, Self::Unregistered(_))
    }
}

// ---------------------------------------------------------------------------
// RecipientError / CombinedError — 收件人级错误
// ---------------------------------------------------------------------------

/// 单个收件人的投递失败
///
/// `position` 是该令牌在本次提交的合格令牌列表中的下标，跨批次全局唯一。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("收件人 #{position} ({token}) 投递失败: {source}")]
pub struct RecipientError {
    pub position: usize,
    pub token: String,
    #[source]
    pub source: GatewayError,
}

/// 合并错误：一次派发中所有批次的收件人级错误
///
/// 顺序取决于批次完成顺序，不具备业务含义。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CombinedError {
    errors: Vec<RecipientError>,
}

impl CombinedError {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, error: RecipientError) {
        self.errors.push(error);
    }

    pub fn extend(&mut self, errors: impl IntoIterator<Item = RecipientError>) {
        self.errors.extend(errors);
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn errors(&self) -> &[RecipientError] {
        &self.errors
    }

    /// 没有任何收件人级错误时返回 None
    pub fn into_option(self) -> Option<Self> {
        if self.errors.is_empty() {
            None
        } else {
            Some(self)
        }
    }
}

impl fmt::Display for CombinedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} 个收件人投递失败", self.errors.len())?;
        for (i, error) in self.errors.iter().enumerate() {
            let sep = if i == 0 { ": " } else { "; " };
            write!(f, "{sep}{error}")?;
        }
        Ok(())
    }
}

impl std::error::Error for CombinedError {}

// ---------------------------------------------------------------------------
// DirectError — 系统性失败
// ---------------------------------------------------------------------------

/// 直接错误：网关调用或投递任务本身失败
#[derive(Debug, Error)]
pub enum DirectError {
    #[error("批次 {batch_index} 推送网关调用失败: {source}")]
    Gateway {
        batch_index: usize,
        #[source]
        source: GatewayError,
    },

    #[error("单播推送失败: {0}")]
    SingleSend(#[source] GatewayError),

    #[error("投递任务异常终止: {0}")]
    TaskAborted(#[from] JoinError),

    #[error("推送派发已被调用方取消")]
    Cancelled,
}

impl DirectError {
    /// 获取错误码
    pub fn code(&self) -> &'static str {
        match self {
            Self::Gateway { .. } => "GATEWAY_CALL_FAILED",
            Self::SingleSend(_) => "SINGLE_SEND_FAILED",
            Self::TaskAborted(_) => "TASK_ABORTED",
            Self::Cancelled => "CANCELLED",
        }
    }

    /// 底层网关错误（任务异常或取消时没有）
    pub fn gateway_error(&self) -> Option<&GatewayError> {
        match self {
            Self::Gateway { source, .. } | Self::SingleSend(source) => Some(source),
            Self::TaskAborted(_) | Self::Cancelled => None,
        }
    }
}

// ---------------------------------------------------------------------------
// DispatchErrors — 汇总错误
// ---------------------------------------------------------------------------

/// 一次派发的汇总错误
///
/// 只有 `direct` 存在时调用才算失败；只有 `combined` 时属于"成功但有部分损失"，
/// 交给调用方记录日志即可。
#[derive(Debug)]
pub struct DispatchErrors {
    pub direct: Option<DirectError>,
    pub combined: Option<CombinedError>,
}

impl DispatchErrors {
    /// 两者皆空时返回 None，表示完全成功
    pub fn new(direct: Option<DirectError>, combined: Option<CombinedError>) -> Option<Self> {
        let combined = combined.and_then(CombinedError::into_option);
        if direct.is_none() && combined.is_none() {
            return None;
        }
        Some(Self { direct, combined })
    }

    /// 是否应作为调用失败上抛
    pub fn is_call_failure(&self) -> bool {
        self.direct.is_some()
    }
}

impl fmt::Display for DispatchErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.direct, &self.combined) {
            (Some(direct), Some(combined)) => {
                write!(f, "{direct}（此前另有 {} 个收件人投递失败）", combined.len())
            }
            (Some(direct), None) => write!(f, "{direct}"),
            (None, Some(combined)) => write!(f, "{combined}"),
            (None, None) => write!(f, "推送派发成功"),
        }
    }
}

impl std::error::Error for DispatchErrors {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        if let Some(direct) = &self.direct {
            return Some(direct);
        }
        self.combined
            .as_ref()
            .map(|combined| combined as &(dyn std::error::Error + 'static))
    }
}
