//! 共享库
//!
//! 推送引擎与通知工作者共用的配置加载、错误类型和可观测性初始化代码。

pub mod config;
pub mod error;
pub mod observability;
