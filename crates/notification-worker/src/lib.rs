//! 通知工作者服务
//!
//! 推送引擎的调用方：把通知交给派发路由器扇出到设备，记录部分损失日志，
//! 上报成功/失败计数，只有系统性失败才作为错误返回。

pub mod error;
pub mod pusher;
