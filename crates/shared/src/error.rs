//! 统一错误处理模块
//!
//! 定义配置加载与可观测性初始化阶段的共享错误类型，使用 thiserror 提供良好的错误信息。
//! 推送派发本身的错误在推送引擎中单独定义。

use thiserror::Error;

/// 共享错误类型
#[derive(Debug, Error)]
pub enum SharedError {
    // ==================== 配置错误 ====================
    #[error("配置加载失败: {0}")]
    Config(#[from] config::ConfigError),

    #[error("配置无效: {field} - {message}")]
    InvalidConfig { field: String, message: String },

    // ==================== 可观测性错误 ====================
    #[error("日志初始化失败: {0}")]
    Logging(String),

    #[error("指标导出初始化失败: {0}")]
    Metrics(String),
}

/// 错误结果类型别名
pub type Result<T> = std::result::Result<T, SharedError>;

impl SharedError {
    /// 获取错误码
    pub fn code(&self) -> &'static str {
        match self {
            Self::Config(_) => "CONFIG_ERROR",
            Self::InvalidConfig { .. } => "INVALID_CONFIG",
            Self::Logging(_) => "LOGGING_INIT_FAILED",
            Self::Metrics(_) => "METRICS_INIT_FAILED",
        }
    }
}
