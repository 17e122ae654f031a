//! Mock token 计数器，用于在不接入真实 tokenizer 的情况下测试 [`TokenCounter`] 的使用方。
//!
//! # 示例
//!
//! ```rust
//! use token_buffer_memory::testing::MockTokenCounter;
//! use token_buffer_memory::llm::tokens::TokenCounter;
//! use token_buffer_memory::llm::types::Message;
//!
//! let counter = MockTokenCounter::per_message(10).with_count(999);
//! let msgs = vec![Message::user("a"), Message::assistant("b")];
//!
//! assert_eq!(counter.count_tokens(&msgs).unwrap(), 999); // 先消费预设值
//! assert_eq!(counter.count_tokens(&msgs).unwrap(), 20);  // 之后按条数计费
//! assert_eq!(counter.call_count(), 2);
//! ```

use crate::error::{BufferError, MemoryError, Result};
use crate::llm::tokens::TokenCounter;
use crate::llm::types::Message;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// 预设计数结果（数值或错误）
enum MockCount {
    Count(usize),
    Err(BufferError),
}

/// 可脚本化的 Mock 计数器。
///
/// 优先按顺序返回预设结果；队列耗尽后按 `条数 × per_message` 计费。
/// 每次调用收到的消息序列都会被记录。
pub struct MockTokenCounter {
    per_message: usize,
    responses: Arc<Mutex<VecDeque<MockCount>>>,
    calls: Arc<Mutex<Vec<Vec<Message>>>>,
}

impl Default for MockTokenCounter {
    fn default() -> Self {
        Self::per_message(1)
    }
}

impl MockTokenCounter {
    /// 每条消息固定计 `cost` 个 token
    pub fn per_message(cost: usize) -> Self {
        Self {
            per_message: cost,
            responses: Arc::new(Mutex::new(VecDeque::new())),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// 追加一条预设计数
    pub fn with_count(self, count: usize) -> Self {
        self.responses
            .lock()
            .unwrap()
            .push_back(MockCount::Count(count));
        self
    }

    /// 批量追加预设计数
    pub fn with_counts(self, counts: impl IntoIterator<Item = usize>) -> Self {
        {
            let mut q = self.responses.lock().unwrap();
            for c in counts {
                q.push_back(MockCount::Count(c));
            }
        }
        self
    }

    /// 追加一条错误结果（用于测试错误透传）
    pub fn with_error(self, msg: impl Into<String>) -> Self {
        self.responses
            .lock()
            .unwrap()
            .push_back(MockCount::Err(MemoryError::TokenCount(msg.into()).into()));
        self
    }

    /// 已发生的调用总次数
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// 所有历史调用收到的消息序列（按时序排列）
    pub fn all_calls(&self) -> Vec<Vec<Message>> {
        self.calls.lock().unwrap().clone()
    }

    /// 最后一次调用收到的消息序列
    pub fn last_messages(&self) -> Option<Vec<Message>> {
        self.calls.lock().unwrap().last().cloned()
    }

    /// 剩余未消费的预设结果数量
    pub fn remaining(&self) -> usize {
        self.responses.lock().unwrap().len()
    }

    pub fn reset_calls(&self) {
        self.calls.lock().unwrap().clear();
    }
}

impl TokenCounter for MockTokenCounter {
    fn count_tokens(&self, messages: &[Message]) -> Result<usize> {
        self.calls.lock().unwrap().push(messages.to_vec());

        match self.responses.lock().unwrap().pop_front() {
            Some(MockCount::Count(n)) => Ok(n),
            Some(MockCount::Err(e)) => Err(e),
            None => Ok(messages.len() * self.per_message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BufferError;

    #[test]
    fn test_scripted_counts_then_fallback() {
        let counter = MockTokenCounter::per_message(5)
            .with_counts([7, 8])
            .with_error("boom");
        assert_eq!(counter.remaining(), 3);

        let msgs = vec![Message::user("a"), Message::assistant("b")];
        assert_eq!(counter.count_tokens(&msgs).unwrap(), 7);
        assert_eq!(counter.count_tokens(&msgs[1..]).unwrap(), 8);
        assert!(matches!(
            counter.count_tokens(&msgs).unwrap_err(),
            BufferError::Memory(MemoryError::TokenCount(_))
        ));
        assert_eq!(counter.remaining(), 0);
        assert_eq!(counter.count_tokens(&msgs).unwrap(), 10);

        assert_eq!(counter.call_count(), 4);
        assert_eq!(counter.all_calls()[1], vec![Message::assistant("b")]);
        assert_eq!(counter.last_messages(), Some(msgs));

        counter.reset_calls();
        assert_eq!(counter.call_count(), 0);
        assert_eq!(counter.last_messages(), None);
    }
}
