//! 派发路由
//!
//! 推送入口：筛选合格收件人后，单个令牌走单播，多个令牌走分批组播。

use std::sync::Arc;

use push_shared::config::PushConfig;
use push_shared::error::SharedError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::aggregate::PushReport;
use crate::batch::BatchPartitioner;
use crate::dispatcher::ConcurrentDispatcher;
use crate::error::{DirectError, DispatchErrors};
use crate::gateway::PushGateway;
use crate::message::MessageBuilder;
use crate::model::{Notification, NotificationMessage, Recipient, eligible_tokens};

/// 派发路由器
pub struct DispatchRouter {
    gateway: Arc<dyn PushGateway>,
    builder: MessageBuilder,
    dispatcher: ConcurrentDispatcher,
}

impl DispatchRouter {
    pub fn new(gateway: Arc<dyn PushGateway>, config: &PushConfig) -> Result<Self, SharedError> {
        config.validate()?;
        let partitioner = BatchPartitioner::new(config.batch_size)?;
        let dispatcher = ConcurrentDispatcher::new(
            Arc::clone(&gateway),
            partitioner,
            config.result_channel_capacity,
        );

        Ok(Self {
            gateway,
            builder: MessageBuilder::from_config(config),
            dispatcher,
        })
    }

    /// 向一组收件人推送通知
    ///
    /// 返回的报告中只有直接错误才表示调用失败；只有合并错误时调用视为成功，
    /// 由调用方记录部分损失。
    #[instrument(
        skip_all,
        fields(notification_id = %notification.id, recipient_count = recipients.len())
    )]
    pub async fn push_notification_for_user(
        &self,
        cancel: &CancellationToken,
        notification: &Notification,
        message: &NotificationMessage,
        recipients: &[Recipient],
    ) -> PushReport {
        let mut tokens = eligible_tokens(recipients);

        match tokens.len() {
            0 => {
                debug!("没有合格的收件人，跳过推送");
                PushReport::empty()
            }
            1 => {
                let token = tokens.swap_remove(0);
                self.push_single(cancel, notification, message, token).await
            }
            eligible => {
                info!(
                    eligible,
                    batch_count = self.dispatcher.partitioner().batch_count(eligible),
                    mute = notification.mute,
                    "分批组播推送"
                );
                let multicast = self.builder.build_multicast(notification, message, tokens);
                self.dispatcher.dispatch(cancel, multicast).await
            }
        }
    }

    async fn push_single(
        &self,
        cancel: &CancellationToken,
        notification: &Notification,
        message: &NotificationMessage,
        token: String,
    ) -> PushReport {
        if cancel.is_cancelled() {
            return single_failure(DirectError::Cancelled);
        }

        let single = self.builder.build_single(notification, message, token);

        match self.gateway.send(&single).await {
            Ok(message_id) => {
                debug!(message_id = %message_id, "单播推送成功");
                PushReport {
                    success_count: 1,
                    ..PushReport::empty()
                }
            }
            // 令牌未注册时沿用历史行为：不算失败，计为一次成功
            Err(err) if err.is_unregistered() => {
                warn!(error = %err, "设备令牌未注册，按成功计数");
                PushReport {
                    success_count: 1,
                    ..PushReport::empty()
                }
            }
            Err(err) => {
                error!(error = %err, error_code = err.code(), "单播推送失败");
                single_failure(DirectError::SingleSend(err))
            }
        }
    }
}

fn single_failure(direct: DirectError) -> PushReport {
    PushReport {
        success_count: 0,
        failure_count: 1,
        errors: DispatchErrors::new(Some(direct), None),
    }
}
