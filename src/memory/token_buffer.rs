//! 按 token 上限裁剪的对话缓冲区

use crate::config::BufferConfig;
use crate::error::{MemoryError, Result};
use crate::llm::tokens::TokenCounter;
use crate::llm::types::{Message, get_buffer_string};
use crate::memory::history::ChatHistory;
use crate::memory::{Memory, MemoryValue, Variables, prompt_input_key, value_to_text};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// 缓冲区返回形态，构造时由 `return_messages` 决定
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferFormat {
    /// 单个格式化字符串
    Text,
    /// 原始消息列表
    Messages,
}

impl From<bool> for BufferFormat {
    fn from(return_messages: bool) -> Self {
        if return_messages {
            BufferFormat::Messages
        } else {
            BufferFormat::Text
        }
    }
}

/// 带 token 上限的对话缓冲区。
///
/// 每次读取都会对**整段**剩余历史重新计数，超过 `max_token_limit` 时从共享存储头部逐条删除
/// 最早的消息，直到不超限或存储为空。被删除的消息不会保存到任何地方。
///
/// 注意：[`trimmed_messages`](Self::trimmed_messages) 以及所有基于它的读取方法都会**修改**
/// 传入的 [`ChatHistory`]，其他持有同一句柄的地方会看到裁剪后的结果。
pub struct TokenBufferMemory {
    history: Arc<dyn ChatHistory>,
    counter: Arc<dyn TokenCounter>,
    config: BufferConfig,
    format: BufferFormat,
}

impl TokenBufferMemory {
    /// 创建缓冲区，配置非法时返回错误
    pub fn new(
        history: Arc<dyn ChatHistory>,
        counter: Arc<dyn TokenCounter>,
        config: BufferConfig,
    ) -> Result<Self> {
        config.validate()?;
        let format = BufferFormat::from(config.return_messages);
        Ok(Self {
            history,
            counter,
            config,
            format,
        })
    }

    pub fn config(&self) -> &BufferConfig {
        &self.config
    }

    pub fn format(&self) -> BufferFormat {
        self.format
    }

    /// 底层共享存储的句柄
    pub fn history(&self) -> &Arc<dyn ChatHistory> {
        &self.history
    }

    /// 当前存储的 token 数（不裁剪）
    pub fn token_count(&self) -> Result<usize> {
        self.counter.count_tokens(&self.history.messages()?)
    }

    /// 裁剪并返回消息。
    ///
    /// 超限时从共享存储中删除最早的消息，每删一条都对剩余的整段序列重新计数。
    /// 计数器报错时直接返回错误，此前已删除的消息不会恢复。
    pub fn trimmed_messages(&self) -> Result<Vec<Message>> {
        let limit = self.config.max_token_limit;
        let mut buffer = self.history.messages()?;
        let mut tokens = self.counter.count_tokens(&buffer)?;
        let mut start = 0;

        while tokens > limit && start < buffer.len() {
            if self.history.pop_front()?.is_none() {
                // 存储已被其他持有者清空
                start = buffer.len();
                break;
            }
            start += 1;
            tokens = self.counter.count_tokens(&buffer[start..])?;
        }

        if start > 0 {
            debug!(
                removed = start,
                remaining = buffer.len() - start,
                tokens,
                limit,
                "✂️ 对话缓冲区已裁剪"
            );
        }

        Ok(buffer.split_off(start))
    }

    /// 裁剪后渲染为 `"<前缀>: <内容>"` 的多行字符串
    pub fn buffer_as_str(&self) -> Result<String> {
        let messages = self.trimmed_messages()?;
        Ok(get_buffer_string(
            &messages,
            &self.config.human_prefix,
            &self.config.ai_prefix,
        ))
    }

    /// 裁剪后的原始消息列表
    pub fn buffer_as_messages(&self) -> Result<Vec<Message>> {
        self.trimmed_messages()
    }

    /// 按构造时确定的形态返回缓冲区
    pub fn buffer(&self) -> Result<MemoryValue> {
        match self.format {
            BufferFormat::Messages => self.buffer_as_messages().map(MemoryValue::Messages),
            BufferFormat::Text => self.buffer_as_str().map(MemoryValue::Text),
        }
    }

    fn output_text(&self, outputs: &Variables) -> Result<String> {
        let value = match &self.config.output_key {
            Some(key) => outputs
                .get(key)
                .ok_or_else(|| MemoryError::MissingKey(key.clone()))?,
            None => {
                if outputs.len() != 1 {
                    let mut keys: Vec<String> = outputs.keys().cloned().collect();
                    keys.sort();
                    return Err(MemoryError::AmbiguousOutputKey(keys).into());
                }
                outputs
                    .values()
                    .next()
                    .ok_or_else(|| MemoryError::AmbiguousOutputKey(Vec::new()))?
            }
        };
        Ok(value_to_text(value))
    }

    fn input_text(&self, inputs: &Variables) -> Result<String> {
        let key = match &self.config.input_key {
            Some(key) => key.clone(),
            None => prompt_input_key(inputs, &self.memory_variables())?,
        };
        let value = inputs.get(&key).ok_or(MemoryError::MissingKey(key))?;
        Ok(value_to_text(value))
    }
}

impl Memory for TokenBufferMemory {
    fn memory_variables(&self) -> Vec<String> {
        vec![self.config.memory_key.clone()]
    }

    fn load_memory_variables(&self, _inputs: &Variables) -> Result<HashMap<String, MemoryValue>> {
        let mut vars = HashMap::new();
        vars.insert(self.config.memory_key.clone(), self.buffer()?);
        Ok(vars)
    }

    /// 写入一轮交互：先人类输入，后助手输出。只追加，不裁剪。
    fn save_context(&self, inputs: &Variables, outputs: &Variables) -> Result<()> {
        let input = self.input_text(inputs)?;
        let output = self.output_text(outputs)?;
        self.history.add_user_message(&input)?;
        self.history.add_ai_message(&output)?;
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        self.history.clear()
    }
}
