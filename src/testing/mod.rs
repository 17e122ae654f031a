//! 测试基础设施
//!
//! 在不依赖真实 tokenizer 的情况下测试缓冲区与自定义 [`Memory`](crate::memory::Memory) 实现。
//!
//! | 类型 | 用途 |
//! |------|------|
//! | [`MockTokenCounter`] | 替代真实计数器：可预设计数 / 错误，并记录每次收到的消息序列 |
//!
//! 对话存储直接使用 [`InMemoryChatHistory`](crate::memory::InMemoryChatHistory) 即可，无需 Mock。
//!
//! ```rust
//! use token_buffer_memory::config::BufferConfig;
//! use token_buffer_memory::memory::{ChatHistory, InMemoryChatHistory, TokenBufferMemory};
//! use token_buffer_memory::testing::MockTokenCounter;
//! use std::sync::Arc;
//!
//! # fn main() -> token_buffer_memory::error::Result<()> {
//! let history = Arc::new(InMemoryChatHistory::new());
//! history.add_user_message("A")?;
//! history.add_ai_message("B")?;
//! history.add_user_message("C")?;
//!
//! let counter = Arc::new(MockTokenCounter::per_message(10));
//! let memory = TokenBufferMemory::new(history.clone(), counter.clone(), BufferConfig::new(25))?;
//!
//! let kept = memory.trimmed_messages()?;
//! assert_eq!(kept.len(), 2);
//! assert_eq!(counter.call_count(), 2);
//! # Ok(())
//! # }
//! ```

mod mock_counter;

pub use mock_counter::MockTokenCounter;
