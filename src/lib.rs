pub mod config;
pub mod error;
pub mod llm;
pub mod memory;
pub mod testing;

pub mod prelude {
    pub use crate::config::BufferConfig;
    pub use crate::error::Result;
    pub use crate::llm::{EstimatingTokenCounter, FnTokenCounter, Message, TokenCounter};
    pub use crate::memory::{
        BufferFormat, ChatHistory, FileChatHistory, InMemoryChatHistory, Memory, MemoryValue,
        TokenBufferMemory, Variables,
    };
}
