//! 对话消息类型与缓冲区字符串格式化

use serde::{Deserialize, Serialize};

pub const ROLE_USER: &str = "user";
pub const ROLE_ASSISTANT: &str = "assistant";
pub const ROLE_SYSTEM: &str = "system";
pub const ROLE_TOOL: &str = "tool";
pub const ROLE_FUNCTION: &str = "function";

/// 单条对话消息（一个 turn）
///
/// 缓冲区把消息视为不透明、有序、不可变的记录，只读取 `role` 与 `content`。
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct Message {
    /// 角色：`user` / `assistant` / `system` / `tool`，或任意自定义角色
    pub role: String,
    /// 文本内容
    #[serde(default)]
    pub content: String,
    /// 发言者名称（可选）
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub name: Option<String>,
}

impl Message {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
            name: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(ROLE_SYSTEM, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(ROLE_USER, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(ROLE_ASSISTANT, content)
    }

    pub fn tool(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: ROLE_TOOL.to_string(),
            content: content.into(),
            name: Some(name.into()),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// 是否为人类一侧的消息（`user` 或 `human`）
    pub fn is_human(&self) -> bool {
        matches!(self.role.as_str(), ROLE_USER | "human")
    }

    /// 是否为助手一侧的消息（`assistant` 或 `ai`）
    pub fn is_ai(&self) -> bool {
        matches!(self.role.as_str(), ROLE_ASSISTANT | "ai")
    }
}

/// 将消息列表渲染为 `"<前缀>: <内容>"` 形式，按时间顺序以换行拼接。
///
/// 角色到前缀的映射：
///
/// | role | 前缀 |
/// |------|------|
/// | `user` / `human` | `human_prefix` |
/// | `assistant` / `ai` | `ai_prefix` |
/// | `system` | `System` |
/// | `tool` | `Tool` |
/// | `function` | `Function` |
/// | 其他 | role 原文 |
pub fn get_buffer_string(messages: &[Message], human_prefix: &str, ai_prefix: &str) -> String {
    messages
        .iter()
        .map(|m| {
            let prefix = if m.is_human() {
                human_prefix
            } else if m.is_ai() {
                ai_prefix
            } else {
                match m.role.as_str() {
                    ROLE_SYSTEM => "System",
                    ROLE_TOOL => "Tool",
                    ROLE_FUNCTION => "Function",
                    other => other,
                }
            };
            format!("{}: {}", prefix, m.content)
        })
        .collect::<Vec<_>>()
        .join("\n")
}
