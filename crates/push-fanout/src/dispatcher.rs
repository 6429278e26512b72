//! 并发派发器
//!
//! 每个批次一个独立的投递任务，结果经共享通道汇入唯一的消费者（汇总器）。
//! 派发上下文从调用方的取消令牌派生：任一任务在调用网关时直接失败，就取消
//! 派发上下文，仍在等待发布结果的任务随之放弃发布。已经发出的网络请求无法撤回，
//! 因此系统性失败时部分已送达批次的结果会从计数中丢失，这是有意保留的快速失败语义。

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::aggregate::{BatchOutcome, PushReport, ResultAggregator};
use crate::batch::{BatchPartitioner, DispatchBatch};
use crate::error::DirectError;
use crate::gateway::PushGateway;
use crate::message::{MulticastMessage, PushContent};

/// 并发派发器
pub struct ConcurrentDispatcher {
    gateway: Arc<dyn PushGateway>,
    partitioner: BatchPartitioner,
    channel_capacity: usize,
}

impl ConcurrentDispatcher {
    pub fn new(
        gateway: Arc<dyn PushGateway>,
        partitioner: BatchPartitioner,
        channel_capacity: usize,
    ) -> Self {
        Self {
            gateway,
            partitioner,
            channel_capacity: channel_capacity.max(1),
        }
    }

    pub fn partitioner(&self) -> &BatchPartitioner {
        &self.partitioner
    }

    /// 按批次并发投递组播消息并汇总结果
    pub async fn dispatch(
        &self,
        cancel: &CancellationToken,
        message: MulticastMessage,
    ) -> PushReport {
        let MulticastMessage { tokens, content } = message;
        let submitted = tokens.len();
        let batches = self.partitioner.partition(&tokens);

        if batches.is_empty() {
            return PushReport::empty();
        }

        let mut aggregator = ResultAggregator::new(submitted);
        if cancel.is_cancelled() {
            aggregator.record_direct(DirectError::Cancelled);
            return aggregator.finish();
        }

        debug!(submitted, batch_count = batches.len(), "开始并发派发");

        let dispatch_token = cancel.child_token();
        let content = Arc::new(content);
        let (tx, mut rx) = mpsc::channel(self.channel_capacity);

        let mut deliveries = JoinSet::new();
        for batch in batches {
            deliveries.spawn(deliver_batch(
                Arc::clone(&self.gateway),
                Arc::clone(&content),
                batch,
                tx.clone(),
                dispatch_token.clone(),
            ));
        }
        // 只保留任务持有的发送端，全部任务结束后通道自然关闭
        drop(tx);

        let coordinator = tokio::spawn(join_deliveries(deliveries, dispatch_token));

        aggregator.drain(&mut rx).await;

        match coordinator.await {
            Ok(failures) => {
                for failure in failures {
                    aggregator.record_direct(failure);
                }
            }
            Err(e) => aggregator.record_direct(DirectError::TaskAborted(e)),
        }

        // 调用方中途取消且确有结果被丢弃时，同样修正失败计数
        if cancel.is_cancelled() && !aggregator.has_direct() && aggregator.has_missing_results()
        {
            aggregator.record_direct(DirectError::Cancelled);
        }

        aggregator.finish()
    }
}

/// 投递单个批次
///
/// 网关调用失败时取消派发上下文并返回直接错误；拿到响应后若上下文已取消则丢弃结果。
async fn deliver_batch(
    gateway: Arc<dyn PushGateway>,
    content: Arc<PushContent>,
    batch: DispatchBatch,
    results: mpsc::Sender<BatchOutcome>,
    cancel: CancellationToken,
) -> Result<(), DirectError> {
    let message = MulticastMessage {
        tokens: batch.tokens().to_vec(),
        content: content.as_ref().clone(),
    };

    debug!(
        batch_index = batch.index(),
        batch_size = batch.len(),
        "投递批次"
    );

    let response = match gateway.send_multicast(&message).await {
        Ok(response) => response,
        Err(source) => {
            error!(
                batch_index = batch.index(),
                batch_size = batch.len(),
                error = %source,
                error_code = source.code(),
                "推送网关调用失败，取消本次派发"
            );
            cancel.cancel();
            return Err(DirectError::Gateway {
                batch_index: batch.index(),
                source,
            });
        }
    };

    let outcome = BatchOutcome::from_response(&batch, response);
    let delivered = outcome.success_count;

    tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            warn!(
                batch_index = batch.index(),
                success_count = delivered,
                "派发已取消，丢弃已送达批次的结果"
            );
        }
        sent = results.send(outcome) => {
            if sent.is_err() {
                warn!(batch_index = batch.index(), "结果通道已关闭，批次结果未能发布");
            }
        }
    }

    Ok(())
}

/// 等待全部投递任务结束，收集任务级失败
async fn join_deliveries(
    mut deliveries: JoinSet<Result<(), DirectError>>,
    cancel: CancellationToken,
) -> Vec<DirectError> {
    let mut failures = Vec::new();
    while let Some(joined) = deliveries.join_next().await {
        match joined {
            Ok(Ok(())) => {}
            Ok(Err(e)) => failures.push(e),
            Err(e) => {
                error!(error = %e, "投递任务异常终止，取消本次派发");
                cancel.cancel();
                failures.push(DirectError::TaskAborted(e));
            }
        }
    }
    failures
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GatewayError;
    use crate::gateway::{BatchResponse, MockPushGateway, SendResponse};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn make_message(n: usize) -> MulticastMessage {
        MulticastMessage {
            tokens: (0..n).map(|i| format!("token-{i}")).collect(),
            content: PushContent {
                notification: None,
                data: HashMap::new(),
            },
        }
    }

    fn all_delivered(message: &MulticastMessage) -> BatchResponse {
        BatchResponse::from_responses(
            message
                .tokens
                .iter()
                .map(|t| SendResponse::delivered(format!("m-{t}")))
                .collect(),
        )
    }

    fn make_dispatcher(gateway: MockPushGateway, ceiling: usize) -> ConcurrentDispatcher {
        ConcurrentDispatcher::new(
            Arc::new(gateway),
            BatchPartitioner::new(ceiling).expect("合法上限"),
            1,
        )
    }

    #[tokio::test]
    async fn test_empty_tokens_no_gateway_call() {
        let mut gateway = MockPushGateway::new();
        gateway.expect_send_multicast().never();
        gateway.expect_send().never();

        let report = make_dispatcher(gateway, 500)
            .dispatch(&CancellationToken::new(), make_message(0))
            .await;

        assert_eq!(report.success_count, 0);
        assert_eq!(report.failure_count, 0);
        assert!(report.errors.is_none());
    }

    #[tokio::test]
    async fn test_one_call_per_batch_all_success() {
        let mut gateway = MockPushGateway::new();
        gateway
            .expect_send_multicast()
            .times(3)
            .returning(|message| {
                assert!(message.tokens.len() <= 500);
                Ok(all_delivered(message))
            });

        let report = make_dispatcher(gateway, 500)
            .dispatch(&CancellationToken::new(), make_message(1200))
            .await;

        assert_eq!(report.success_count, 1200);
        assert_eq!(report.failure_count, 0);
        assert!(report.errors.is_none());
    }

    #[tokio::test]
    async fn test_per_recipient_failures_not_escalated() {
        let mut gateway = MockPushGateway::new();
        gateway.expect_send_multicast().times(2).returning(|message| {
            Ok(BatchResponse::from_responses(
                message
                    .tokens
                    .iter()
                    .map(|t| SendResponse::failed(GatewayError::Unregistered(t.clone())))
                    .collect(),
            ))
        });

        let report = make_dispatcher(gateway, 3)
            .dispatch(&CancellationToken::new(), make_message(5))
            .await;

        assert_eq!(report.success_count, 0);
        assert_eq!(report.failure_count, 5);
        assert!(report.direct_error().is_none());
        assert!(report.call_error().is_none());

        let combined = report.combined_error().expect("应有合并错误");
        let mut positions: Vec<usize> = combined.errors().iter().map(|e| e.position).collect();
        positions.sort_unstable();
        assert_eq!(positions, vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_systemic_failure_counts_everything_failed() {
        let mut gateway = MockPushGateway::new();
        gateway
            .expect_send_multicast()
            .returning(|_| Err(GatewayError::Unavailable("connection refused".to_string())));

        let report = make_dispatcher(gateway, 500)
            .dispatch(&CancellationToken::new(), make_message(1100))
            .await;

        assert_eq!(report.success_count, 0);
        assert_eq!(report.failure_count, 1100);
        let call_error = report.call_error().expect("应上抛直接错误");
        assert!(matches!(
            call_error.direct,
            Some(DirectError::Gateway {
                source: GatewayError::Unavailable(_),
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_cancellation_drops_pending_results() {
        // 第 0 批立即失败，第 1 批稍后成功，其结果应因取消被丢弃
        let calls = Arc::new(AtomicUsize::new(0));
        let gateway = SlowAfterFirstFailure {
            calls: Arc::clone(&calls),
        };

        let dispatcher = ConcurrentDispatcher::new(
            Arc::new(gateway),
            BatchPartitioner::new(2).expect("合法上限"),
            1,
        );
        let report = dispatcher
            .dispatch(&CancellationToken::new(), make_message(4))
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(report.success_count, 0);
        assert_eq!(report.failure_count, 4);
        assert!(report.is_call_failure());
    }

    #[tokio::test]
    async fn test_cancelled_caller_context() {
        let mut gateway = MockPushGateway::new();
        gateway.expect_send_multicast().never();

        let cancel = CancellationToken::new();
        cancel.cancel();

        let report = make_dispatcher(gateway, 500)
            .dispatch(&cancel, make_message(3))
            .await;

        assert_eq!(report.success_count, 0);
        assert_eq!(report.failure_count, 3);
        assert!(matches!(report.direct_error(), Some(DirectError::Cancelled)));
    }

    #[tokio::test]
    async fn test_late_caller_cancel_after_full_delivery_is_success() {
        // 结果发布后调用方才取消，没有任何结果丢失
        let cancel = CancellationToken::new();
        let gateway = CancelsCallerAfterDelivery {
            caller: cancel.clone(),
        };

        let dispatcher =
            ConcurrentDispatcher::new(Arc::new(gateway), BatchPartitioner::default(), 1);
        let report = dispatcher.dispatch(&cancel, make_message(2)).await;
        cancel.cancelled().await;

        assert_eq!(report.success_count, 2);
        assert_eq!(report.failure_count, 0);
        assert!(report.errors.is_none());
        assert!(!report.is_call_failure());
    }

    /// 返回全部成功，并在稍后取消调用方的令牌
    struct CancelsCallerAfterDelivery {
        caller: CancellationToken,
    }

    #[async_trait::async_trait]
    impl PushGateway for CancelsCallerAfterDelivery {
        async fn send(
            &self,
            _message: &crate::message::SingleMessage,
        ) -> Result<String, GatewayError> {
            unreachable!("组播路径不会调用单播")
        }

        async fn send_multicast(
            &self,
            message: &MulticastMessage,
        ) -> Result<BatchResponse, GatewayError> {
            let caller = self.caller.clone();
            tokio::spawn(async move { caller.cancel() });
            Ok(all_delivered(message))
        }
    }

    /// 首个调用立即失败，其余调用延迟后成功
    struct SlowAfterFirstFailure {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait::async_trait]
    impl PushGateway for SlowAfterFirstFailure {
        async fn send(
            &self,
            _message: &crate::message::SingleMessage,
        ) -> Result<String, GatewayError> {
            unreachable!("组播路径不会调用单播")
        }

        async fn send_multicast(
            &self,
            message: &MulticastMessage,
        ) -> Result<BatchResponse, GatewayError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if message.tokens[0] == "token-0" {
                return Err(GatewayError::QuotaExceeded("project quota".to_string()));
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok(all_delivered(message))
        }
    }
}
