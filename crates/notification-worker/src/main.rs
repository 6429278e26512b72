//! 通知工作者入口
//!
//! 加载配置、初始化可观测性，基于模拟网关构建推送服务。
//! 从标准输入逐行读取 JSON 编码的推送请求，直到输入结束或收到退出信号。

use std::sync::Arc;

use notification_worker::pusher::NotificationPusher;
use push_fanout::LoggingGateway;
use push_shared::config::AppConfig;
use push_shared::observability;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

const SERVICE_NAME: &str = "notification-worker";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load(SERVICE_NAME)?;
    let _guard = observability::init(&config.service_name, &config.observability)?;

    info!(
        environment = %config.environment,
        production = config.is_production(),
        batch_size = config.push.batch_size,
        character_length_max = config.push.character_length_max,
        "Starting notification-worker..."
    );

    let pusher = NotificationPusher::new(Arc::new(LoggingGateway), &config.push)?;
    let shutdown = CancellationToken::new();

    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("收到退出信号，取消进行中的派发");
            signal_token.cancel();
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            _ = shutdown.cancelled() => break,
            line = lines.next_line() => line?,
        };
        let Some(line) = line else { break };
        if line.trim().is_empty() {
            continue;
        }

        if let Err(e) = pusher.push_payload(&shutdown, line.as_bytes()).await {
            error!(error = %e, error_code = e.code(), "处理推送请求失败");
        }
    }

    info!("notification-worker 已停止");
    Ok(())
}
