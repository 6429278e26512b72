//! 推送网关抽象
//!
//! 通过 `PushGateway` trait 抽象网关能力，具体传输（TLS、HTTP/2、鉴权）由实现方负责。
//! 实现必须在结构上区分两类失败：单个令牌的投递失败放在 `BatchResponse` 里，
//! 调用本身的失败作为 `Err` 返回。

use async_trait::async_trait;
use tracing::info;
use uuid::Uuid;

use crate::error::GatewayError;
use crate::message::{MulticastMessage, SingleMessage};

/// 单个令牌的发送结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SendResponse {
    pub success: bool,
    /// 网关返回的消息标识，用于追踪投递状态
    pub message_id: Option<String>,
    pub error: Option<GatewayError>,
}

impl SendResponse {
    pub fn delivered(message_id: impl Into<String>) -> Self {
        Self {
            success: true,
            message_id: Some(message_id.into()),
            error: None,
        }
    }

    pub fn failed(error: GatewayError) -> Self {
        Self {
            success: false,
            message_id: None,
            error: Some(error),
        }
    }
}

/// 组播响应
///
/// `responses[i]` 对应请求中的 `tokens[i]`。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchResponse {
    pub success_count: usize,
    pub failure_count: usize,
    pub responses: Vec<SendResponse>,
}

impl BatchResponse {
    /// 由逐条结果计算计数
    pub fn from_responses(responses: Vec<SendResponse>) -> Self {
        let success_count = responses.iter().filter(|r| r.success).count();
        Self {
            success_count,
            failure_count: responses.len() - success_count,
            responses,
        }
    }
}

/// 推送网关能力
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PushGateway: Send + Sync {
    /// 单播发送，成功时返回消息标识
    async fn send(&self, message: &SingleMessage) -> Result<String, GatewayError>;

    /// 组播发送，令牌数不超过批次上限
    async fn send_multicast(
        &self,
        message: &MulticastMessage,
    ) -> Result<BatchResponse, GatewayError>;
}

// ---------------------------------------------------------------------------
// 模拟网关
// ---------------------------------------------------------------------------

/// 模拟推送网关
///
/// 只记录日志并报告全部成功，用于没有真实网关凭据的环境。
/// 接入 FCM / APNs 时实现同一 trait 即可替换。
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingGateway;

#[async_trait]
impl PushGateway for LoggingGateway {
    async fn send(&self, message: &SingleMessage) -> Result<String, GatewayError> {
        let message_id = Uuid::now_v7().to_string();

        info!(
            message_id = %message_id,
            silent = message.content.notification.is_none(),
            "模拟发送单播推送"
        );

        Ok(message_id)
    }

    async fn send_multicast(
        &self,
        message: &MulticastMessage,
    ) -> Result<BatchResponse, GatewayError> {
        info!(
            token_count = message.tokens.len(),
            silent = message.content.notification.is_none(),
            "模拟发送组播推送"
        );

        let responses = message
            .tokens
            .iter()
            .map(|_| SendResponse::delivered(Uuid::now_v7().to_string()))
            .collect();

        Ok(BatchResponse::from_responses(responses))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::PushContent;
    use std::collections::HashMap;

    fn make_content() -> PushContent {
        PushContent {
            notification: None,
            data: HashMap::from([("notification_id".to_string(), "notif-001".to_string())]),
        }
    }

    #[tokio::test]
    async fn test_logging_gateway_single_send() {
        let message = SingleMessage {
            token: "token-1".to_string(),
            content: make_content(),
        };

        let message_id = tokio_test::assert_ok!(LoggingGateway.send(&message).await);
        assert!(!message_id.is_empty());
    }

    #[tokio::test]
    async fn test_logging_gateway_multicast_reports_all_success() {
        let message = MulticastMessage {
            tokens: vec!["a".to_string(), "b".to_string(), "c".to_string()],
            content: make_content(),
        };

        let response = tokio_test::assert_ok!(LoggingGateway.send_multicast(&message).await);
        assert_eq!(response.success_count, 3);
        assert_eq!(response.failure_count, 0);
        assert!(response.responses.iter().all(|r| r.message_id.is_some()));
    }

    #[test]
    fn test_batch_response_counts() {
        let response = BatchResponse::from_responses(vec![
            SendResponse::delivered("m-1"),
            SendResponse::failed(GatewayError::Unregistered("b".to_string())),
            SendResponse::delivered("m-3"),
        ]);

        assert_eq!(response.success_count, 2);
        assert_eq!(response.failure_count, 1);
    }
}
