//! 结果汇总
//!
//! 把各批次结果合并为一次派发的总结果：累加成功/失败计数，合并收件人级错误，
//! 并在出现系统性失败时修正失败计数。

use tokio::sync::mpsc;
use tracing::warn;

use crate::batch::DispatchBatch;
use crate::error::{CombinedError, DirectError, DispatchErrors, GatewayError, RecipientError};
use crate::gateway::BatchResponse;

/// 单个批次的投递结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    pub batch_index: usize,
    pub success_count: usize,
    pub failure_count: usize,
    pub errors: Vec<RecipientError>,
}

impl BatchOutcome {
    /// 将网关响应与批次令牌逐一对应，失败条目带上全局位置和令牌
    ///
    /// 计数按逐条结果重新计算；缺少结果的令牌按失败计，多余的结果被忽略。
    pub fn from_response(batch: &DispatchBatch, response: BatchResponse) -> Self {
        if response.responses.len() != batch.len() {
            warn!(
                batch_index = batch.index(),
                batch_size = batch.len(),
                response_count = response.responses.len(),
                "网关响应条数与批次令牌数不一致"
            );
        }

        let mut responses = response.responses.into_iter();
        let mut success_count = 0;
        let mut errors = Vec::new();

        for (i, token) in batch.tokens().iter().enumerate() {
            let source = match responses.next() {
                Some(resp) if resp.success => {
                    success_count += 1;
                    continue;
                }
                Some(resp) => resp
                    .error
                    .unwrap_or_else(|| GatewayError::Internal("网关未返回失败原因".to_string())),
                None => GatewayError::Internal("网关未返回该令牌的结果".to_string()),
            };
            errors.push(RecipientError {
                position: batch.offset() + i,
                token: token.clone(),
                source,
            });
        }

        Self {
            batch_index: batch.index(),
            success_count,
            failure_count: errors.len(),
            errors,
        }
    }
}

/// 一次推送调用的总结果
///
/// `errors` 为 None 表示全部成功。只含合并错误时调用仍算成功，
/// 计数已经反映了部分损失。
#[derive(Debug, Default)]
pub struct PushReport {
    pub success_count: usize,
    pub failure_count: usize,
    pub errors: Option<DispatchErrors>,
}

impl PushReport {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn direct_error(&self) -> Option<&DirectError> {
        self.errors.as_ref().and_then(|e| e.direct.as_ref())
    }

    pub fn combined_error(&self) -> Option<&CombinedError> {
        self.errors.as_ref().and_then(|e| e.combined.as_ref())
    }

    /// 需要上抛给调用方的错误；只有直接错误时才存在
    pub fn call_error(&self) -> Option<&DispatchErrors> {
        self.errors.as_ref().filter(|e| e.is_call_failure())
    }

    pub fn is_call_failure(&self) -> bool {
        self.call_error().is_some()
    }
}

/// 结果汇总器
#[derive(Debug)]
pub struct ResultAggregator {
    submitted: usize,
    success_count: usize,
    failure_count: usize,
    combined: CombinedError,
    direct: Option<DirectError>,
}

impl ResultAggregator {
    /// `submitted` 为本次提交的合格令牌总数
    pub fn new(submitted: usize) -> Self {
        Self {
            submitted,
            success_count: 0,
            failure_count: 0,
            combined: CombinedError::new(),
            direct: None,
        }
    }

    pub fn absorb(&mut self, outcome: BatchOutcome) {
        self.success_count += outcome.success_count;
        self.failure_count += outcome.failure_count;
        self.combined.extend(outcome.errors);
    }

    /// 持续接收直到所有发送端关闭
    pub async fn drain(&mut self, results: &mut mpsc::Receiver<BatchOutcome>) {
        while let Some(outcome) = results.recv().await {
            self.absorb(outcome);
        }
    }

    /// 记录系统性失败，只保留第一个，其余写日志
    pub fn record_direct(&mut self, error: DirectError) {
        if let Some(first) = &self.direct {
            warn!(
                first = %first,
                error = %error,
                "派发中出现多个系统性失败，仅保留第一个"
            );
            return;
        }
        self.direct = Some(error);
    }

    pub fn has_direct(&self) -> bool {
        self.direct.is_some()
    }

    pub fn success_count(&self) -> usize {
        self.success_count
    }

    /// 已汇总的结果是否少于提交的令牌数
    pub fn has_missing_results(&self) -> bool {
        self.success_count + self.failure_count < self.submitted
    }

    /// 出现直接错误时，未计入成功的收件人一律按失败计
    pub fn finish(self) -> PushReport {
        let failure_count = if self.direct.is_some() {
            self.submitted.saturating_sub(self.success_count)
        } else {
            self.failure_count
        };

        PushReport {
            success_count: self.success_count,
            failure_count,
            errors: DispatchErrors::new(self.direct, Some(self.combined)),
        }
    }
}
