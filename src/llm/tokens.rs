//! Token 计数能力
//!
//! 缓冲区只依赖 [`TokenCounter`] 接口：给定一段完整的消息序列，返回其在模型上下文中
//! 占用的 token 数。计数作用于**整段序列**，实现方可以计入角色标记、分隔符等结构开销。
//!
//! | 类型 | 说明 |
//! |------|------|
//! | [`EstimatingTokenCounter`] | 按字符数估算，零依赖，适合离线场景 |
//! | [`FnTokenCounter`] | 用闭包接入任意 tokenizer |

use crate::error::Result;
use crate::llm::types::Message;

/// 消息序列的 token 计数接口
pub trait TokenCounter: Send + Sync {
    /// 计算整段消息序列的 token 数。对固定输入应当是确定的。
    fn count_tokens(&self, messages: &[Message]) -> Result<usize>;
}

/// 基于字符数的 token 估算器
///
/// - 每条消息：`ceil(字符数 / chars_per_token) + message_overhead`
/// - 非空序列额外加上 `reply_overhead`（回复引导标记）
/// - 空序列计为 0
#[derive(Debug, Clone)]
pub struct EstimatingTokenCounter {
    chars_per_token: usize,
    message_overhead: usize,
    reply_overhead: usize,
}

impl Default for EstimatingTokenCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl EstimatingTokenCounter {
    pub fn new() -> Self {
        Self {
            chars_per_token: 4,
            message_overhead: 4,
            reply_overhead: 3,
        }
    }

    /// 每个 token 对应的平均字符数（至少为 1）
    pub fn chars_per_token(mut self, chars: usize) -> Self {
        self.chars_per_token = chars.max(1);
        self
    }

    pub fn message_overhead(mut self, tokens: usize) -> Self {
        self.message_overhead = tokens;
        self
    }

    pub fn reply_overhead(mut self, tokens: usize) -> Self {
        self.reply_overhead = tokens;
        self
    }

    fn estimate_message(&self, message: &Message) -> usize {
        let chars = message.content.chars().count();
        chars.div_ceil(self.chars_per_token) + self.message_overhead
    }
}

impl TokenCounter for EstimatingTokenCounter {
    fn count_tokens(&self, messages: &[Message]) -> Result<usize> {
        if messages.is_empty() {
            return Ok(0);
        }
        let total: usize = messages.iter().map(|m| self.estimate_message(m)).sum();
        Ok(total + self.reply_overhead)
    }
}

/// 用闭包自定义计数逻辑的便捷包装
///
/// # 示例
///
/// ```rust
/// use token_buffer_memory::llm::tokens::{FnTokenCounter, TokenCounter};
/// use token_buffer_memory::llm::types::Message;
///
/// let counter = FnTokenCounter(|msgs: &[Message]| {
///     Ok(msgs.iter().map(|m| m.content.split_whitespace().count()).sum())
/// });
/// assert_eq!(counter.count_tokens(&[Message::user("a b c")]).unwrap(), 3);
/// ```
pub struct FnTokenCounter<F>(pub F)
where
    F: Fn(&[Message]) -> Result<usize> + Send + Sync;

impl<F> TokenCounter for FnTokenCounter<F>
where
    F: Fn(&[Message]) -> Result<usize> + Send + Sync,
{
    fn count_tokens(&self, messages: &[Message]) -> Result<usize> {
        (self.0)(messages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_sequence_costs_nothing() {
        let counter = EstimatingTokenCounter::new();
        assert_eq!(counter.count_tokens(&[]).unwrap(), 0);
    }

    #[test]
    fn test_estimate_includes_overheads() {
        let counter = EstimatingTokenCounter::new();
        // "hello world" = 11 字符 -> 3 token，+4 消息开销，+3 回复引导
        let cost = counter
            .count_tokens(&[Message::user("hello world")])
            .unwrap();
        assert_eq!(cost, 3 + 4 + 3);

        let two = counter
            .count_tokens(&[Message::user("hello world"), Message::assistant("hi")])
            .unwrap();
        assert_eq!(two, (3 + 4) + (1 + 4) + 3);
    }

    #[test]
    fn test_estimate_counts_chars_not_bytes() {
        let counter = EstimatingTokenCounter::new()
            .message_overhead(0)
            .reply_overhead(0);
        // 4 个汉字占 12 字节，但只算 4 个字符
        assert_eq!(counter.count_tokens(&[Message::user("你好世界")]).unwrap(), 1);
    }

    #[test]
    fn test_zero_chars_per_token_is_clamped() {
        let counter = EstimatingTokenCounter::new()
            .chars_per_token(0)
            .message_overhead(0)
            .reply_overhead(0);
        assert_eq!(counter.count_tokens(&[Message::user("abc")]).unwrap(), 3);
    }

    #[test]
    fn test_fn_counter_delegates() {
        let counter = FnTokenCounter(|msgs: &[Message]| Ok(msgs.len() * 10));
        let msgs = vec![Message::user("a"), Message::assistant("b")];
        assert_eq!(counter.count_tokens(&msgs).unwrap(), 20);
    }
}
