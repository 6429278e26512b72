//! Prometheus 指标模块
//!
//! 基于 metrics crate 和 metrics-exporter-prometheus 实现指标收集与导出。
//! 推送引擎本身不记录指标，由调用方根据派发结果调用这里的记录函数。

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use std::sync::OnceLock;
use tracing::{error, info};

use crate::config::ObservabilityConfig;
use crate::error::{Result, SharedError};

/// 全局 Prometheus handle，用于渲染指标
static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// 初始化 Prometheus 指标导出
///
/// 在指定端口启动 HTTP 监听供 Prometheus 抓取，必须在 tokio 运行时内调用。
/// 同一个 recorder 的 handle 保存到全局，`get_handle()` 可取得指标快照。
pub fn init(service_name: &str, config: &ObservabilityConfig) -> Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], config.metrics_port));

    let (recorder, exporter) = PrometheusBuilder::new()
        .with_http_listener(addr)
        .add_global_label("service", service_name)
        .build()
        .map_err(|e| SharedError::Metrics(e.to_string()))?;

    let handle = recorder.handle();
    metrics::set_global_recorder(recorder).map_err(|e| SharedError::Metrics(e.to_string()))?;
    let _ = PROMETHEUS_HANDLE.set(handle);

    tokio::spawn(async move {
        if let Err(e) = exporter.await {
            error!(error = ?e, "Metrics server exited");
        }
    });

    register_push_metrics();
    info!("Metrics server listening on {}", addr);

    Ok(())
}

/// 安装仅用于渲染的 recorder（不启动 HTTP 监听），返回全局 handle
pub fn install_recorder() -> Result<&'static PrometheusHandle> {
    if let Some(handle) = PROMETHEUS_HANDLE.get() {
        return Ok(handle);
    }
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| SharedError::Metrics(e.to_string()))?;
    register_push_metrics();
    Ok(PROMETHEUS_HANDLE.get_or_init(|| handle))
}

/// 获取全局 Prometheus handle（用于自定义渲染）
pub fn get_handle() -> Option<&'static PrometheusHandle> {
    PROMETHEUS_HANDLE.get()
}

/// 注册推送相关指标的描述
fn register_push_metrics() {
    metrics::describe_counter!(
        "push_recipients_total",
        "Total number of push recipients by delivery result"
    );
    metrics::describe_counter!(
        "push_dispatches_total",
        "Total number of push dispatch calls by status"
    );
    metrics::describe_histogram!(
        "push_dispatch_duration_seconds",
        "Push dispatch duration in seconds"
    );
}

// ============================================================================
// 便捷的指标记录函数
// ============================================================================

/// 记录一次推送的收件人成功/失败数
#[inline]
pub fn record_push_result(notification_type: &str, success: usize, failure: usize) {
    metrics::counter!(
        "push_recipients_total",
        "type" => notification_type.to_string(),
        "result" => "success"
    )
    .increment(success as u64);

    metrics::counter!(
        "push_recipients_total",
        "type" => notification_type.to_string(),
        "result" => "failure"
    )
    .increment(failure as u64);
}

/// 记录一次派发调用
///
/// status 取值：ok（全部成功）、partial（部分收件人失败）、failed（系统性失败）
#[inline]
pub fn record_push_dispatch(status: &str, duration_secs: f64) {
    metrics::counter!("push_dispatches_total", "status" => status.to_string()).increment(1);

    metrics::histogram!(
        "push_dispatch_duration_seconds",
        "status" => status.to_string()
    )
    .record(duration_secs);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_functions_do_not_panic() {
        // 即使没有初始化 recorder，这些函数也不应该 panic
        record_push_result("NOTIFICATION_TYPE_COMPOSED", 10, 2);
        record_push_dispatch("partial", 0.2);
    }

    #[tokio::test]
    async fn test_init_exposes_global_handle() {
        let config = ObservabilityConfig {
            metrics_enabled: true,
            metrics_port: 0,
            ..Default::default()
        };
        assert!(init("notification-worker", &config).is_ok());

        let handle = get_handle().expect("init 后应能取得全局 handle");
        record_push_result("NOTIFICATION_TYPE_COMPOSED", 3, 1);
        assert!(handle.render().contains("push_recipients_total"));
    }
}
