//! 通知推送服务
//!
//! 调用推送引擎完成扇出，并承担调用方职责：记录部分损失日志、上报指标、
//! 把系统性失败转换为错误返回。收件人级失败不会让调用失败。

use std::sync::Arc;
use std::time::Instant;

use push_fanout::{
    DirectError, DispatchRouter, GatewayError, Notification, NotificationMessage, PushGateway,
    PushReport, Recipient,
};
use push_shared::config::PushConfig;
use push_shared::observability::metrics::{record_push_dispatch, record_push_result};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::error::NotificationError;

/// 上游投递过来的推送请求
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushRequest {
    pub notification: Notification,
    pub message: NotificationMessage,
    pub recipients: Vec<Recipient>,
}

/// 推送摘要
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PushSummary {
    pub success_count: usize,
    pub failure_count: usize,
    /// 合并错误中的收件人级失败条数
    pub partial_failures: usize,
}

/// 通知推送服务
pub struct NotificationPusher {
    router: DispatchRouter,
}

impl NotificationPusher {
    pub fn new(
        gateway: Arc<dyn PushGateway>,
        config: &PushConfig,
    ) -> Result<Self, NotificationError> {
        Ok(Self {
            router: DispatchRouter::new(gateway, config)?,
        })
    }

    /// 处理一条 JSON 编码的推送请求
    pub async fn push_payload(
        &self,
        cancel: &CancellationToken,
        payload: &[u8],
    ) -> Result<PushSummary, NotificationError> {
        let request: PushRequest = serde_json::from_slice(payload)
            .map_err(|e| NotificationError::DeserializationFailed(e.to_string()))?;

        self.push(
            cancel,
            &request.notification,
            &request.message,
            &request.recipients,
        )
        .await
    }

    /// 推送通知给一组收件人
    pub async fn push(
        &self,
        cancel: &CancellationToken,
        notification: &Notification,
        message: &NotificationMessage,
        recipients: &[Recipient],
    ) -> Result<PushSummary, NotificationError> {
        let started = Instant::now();
        let report = self
            .router
            .push_notification_for_user(cancel, notification, message, recipients)
            .await;

        record_push_result(
            &notification.notification_type,
            report.success_count,
            report.failure_count,
        );
        record_push_dispatch(dispatch_status(&report), started.elapsed().as_secs_f64());

        let partial_failures = report.combined_error().map_or(0, |c| c.len());
        if let Some(combined) = report.combined_error() {
            warn!(
                notification_id = %notification.id,
                failed_recipients = combined.len(),
                error = %combined,
                "部分收件人推送失败"
            );
        }

        if let Some(errors) = report.call_error() {
            let code = report.direct_error().map_or("UNKNOWN", |d| d.code());
            let gateway_code = report
                .direct_error()
                .and_then(DirectError::gateway_error)
                .map_or("NONE", GatewayError::code);
            error!(
                notification_id = %notification.id,
                success_count = report.success_count,
                failure_count = report.failure_count,
                error_code = code,
                gateway_code,
                error = %errors,
                "推送发生系统性失败"
            );
            return Err(NotificationError::PushFailed {
                success_count: report.success_count,
                failure_count: report.failure_count,
                code,
                reason: errors.to_string(),
            });
        }

        info!(
            notification_id = %notification.id,
            success_count = report.success_count,
            failure_count = report.failure_count,
            "通知推送完成"
        );

        Ok(PushSummary {
            success_count: report.success_count,
            failure_count: report.failure_count,
            partial_failures,
        })
    }
}

fn dispatch_status(report: &PushReport) -> &'static str {
    if report.is_call_failure() {
        "failed"
    } else if report.errors.is_some() {
        "partial"
    } else {
        "ok"
    }
}
