//! 记忆系统
//!
//! | 层次 | 实现 | 作用 |
//! |------|------|------|
//! | 对话存储 | [`ChatHistory`] / [`InMemoryChatHistory`] / [`FileChatHistory`] | 按时间顺序保存每个 turn |
//! | 记忆视图 | [`Memory`] / [`TokenBufferMemory`] | 读取时按 token 上限裁剪，返回给调用方 |
//!
//! ## 快速上手
//!
//! ```rust
//! use token_buffer_memory::config::BufferConfig;
//! use token_buffer_memory::llm::EstimatingTokenCounter;
//! use token_buffer_memory::memory::{ChatHistory, InMemoryChatHistory, Memory, TokenBufferMemory};
//! use std::collections::HashMap;
//! use std::sync::Arc;
//!
//! # fn main() -> token_buffer_memory::error::Result<()> {
//! let history = Arc::new(InMemoryChatHistory::new());
//! history.add_user_message("hi")?;
//! history.add_ai_message("hello")?;
//!
//! let memory = TokenBufferMemory::new(
//!     history.clone(),
//!     Arc::new(EstimatingTokenCounter::new()),
//!     BufferConfig::new(2000),
//! )?;
//!
//! let vars = memory.load_memory_variables(&HashMap::new())?;
//! assert_eq!(vars["history"].as_text(), Some("Human: hi\nAI: hello"));
//! # Ok(())
//! # }
//! ```

pub mod history;
pub mod token_buffer;

pub use history::{ChatHistory, FileChatHistory, InMemoryChatHistory};
pub use token_buffer::{BufferFormat, TokenBufferMemory};

use crate::error::{MemoryError, Result};
use crate::llm::types::Message;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// 调用方传入的变量映射（输入 / 输出）
pub type Variables = HashMap<String, Value>;

/// 记忆变量的取值：格式化字符串或消息列表
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MemoryValue {
    Text(String),
    Messages(Vec<Message>),
}

impl MemoryValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            MemoryValue::Text(s) => Some(s),
            MemoryValue::Messages(_) => None,
        }
    }

    pub fn as_messages(&self) -> Option<&[Message]> {
        match self {
            MemoryValue::Messages(m) => Some(m),
            MemoryValue::Text(_) => None,
        }
    }
}

/// 通用的"记忆变量"接口
///
/// 调用方（Prompt 组装层等）只需要知道记忆会产出哪些变量、如何读取、
/// 以及如何把一轮交互写回去。不同的缓冲策略可以实现同一个接口。
pub trait Memory: Send + Sync {
    /// 本记忆会产出的变量名
    fn memory_variables(&self) -> Vec<String>;

    /// 读取记忆变量。`inputs` 为调用方的输入变量，实现方可以忽略。
    fn load_memory_variables(&self, inputs: &Variables) -> Result<HashMap<String, MemoryValue>>;

    /// 将一轮交互（人类输入 + 助手输出）写入记忆
    fn save_context(&self, inputs: &Variables, outputs: &Variables) -> Result<()>;

    /// 清空记忆
    fn clear(&self) -> Result<()>;
}

/// 从输入变量中找出唯一的提示输入 key（排除记忆变量与 `stop`）
pub fn prompt_input_key(inputs: &Variables, memory_variables: &[String]) -> Result<String> {
    let mut candidates: Vec<String> = inputs
        .keys()
        .filter(|k| k.as_str() != "stop" && !memory_variables.contains(*k))
        .cloned()
        .collect();
    if candidates.len() != 1 {
        candidates.sort();
        return Err(MemoryError::AmbiguousInputKey(candidates).into());
    }
    Ok(candidates.remove(0))
}

/// 把变量值渲染为消息文本：字符串取原文，其余取 JSON 文本
pub(crate) fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
