//! 批次划分
//!
//! 按输入顺序把合格令牌切成不超过上限的批次，最后一批可以不满。

use push_shared::config::GATEWAY_BATCH_LIMIT;
use push_shared::error::SharedError;

/// 批次上限的最大取值，即网关单次组播允许的令牌数
pub const MAX_BATCH_SIZE: usize = GATEWAY_BATCH_LIMIT;

/// 一个投递批次
///
/// `offset` 是首个令牌在整个合格令牌列表中的下标，用于还原收件人的全局位置。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchBatch {
    index: usize,
    offset: usize,
    tokens: Vec<String>,
}

impl DispatchBatch {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

/// 批次划分器
#[derive(Debug, Clone, Copy)]
pub struct BatchPartitioner {
    ceiling: usize,
}

impl BatchPartitioner {
    /// 上限必须在 1..=MAX_BATCH_SIZE 之间
    pub fn new(ceiling: usize) -> Result<Self, SharedError> {
        if ceiling == 0 || ceiling > MAX_BATCH_SIZE {
            return Err(SharedError::InvalidConfig {
                field: "push.batch_size".to_string(),
                message: format!("必须在 1..={MAX_BATCH_SIZE} 之间，实际为 {ceiling}"),
            });
        }
        Ok(Self { ceiling })
    }

    pub fn ceiling(&self) -> usize {
        self.ceiling
    }

    /// 给定令牌数将产生的批次数
    pub fn batch_count(&self, token_count: usize) -> usize {
        token_count.div_ceil(self.ceiling)
    }

    pub fn partition(&self, tokens: &[String]) -> Vec<DispatchBatch> {
        tokens
            .chunks(self.ceiling)
            .enumerate()
            .map(|(index, chunk)| DispatchBatch {
                index,
                offset: index * self.ceiling,
                tokens: chunk.to_vec(),
            })
            .collect()
    }
}

impl Default for BatchPartitioner {
    fn default() -> Self {
        Self {
            ceiling: MAX_BATCH_SIZE,
        }
    }
}
