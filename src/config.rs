//! 缓冲区配置
//!
//! 可直接构造、从 YAML 文件加载，或从环境变量覆盖：
//!
//! ```text
//! TOKEN_BUFFER_HUMAN_PREFIX=Human
//! TOKEN_BUFFER_AI_PREFIX=AI
//! TOKEN_BUFFER_MEMORY_KEY=history
//! TOKEN_BUFFER_MAX_TOKEN_LIMIT=2000
//! TOKEN_BUFFER_RETURN_MESSAGES=false
//! TOKEN_BUFFER_INPUT_KEY=input
//! TOKEN_BUFFER_OUTPUT_KEY=output
//! ```

use crate::error::{ConfigError, Result};
use dotenv::dotenv;
use serde::{Deserialize, Serialize};

const ENV_PREFIX: &str = "TOKEN_BUFFER_";

/// [`TokenBufferMemory`](crate::memory::TokenBufferMemory) 的配置，构造后固定不变
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct BufferConfig {
    /// 人类消息的显示前缀
    pub human_prefix: String,
    /// 助手消息的显示前缀
    pub ai_prefix: String,
    /// 返回给调用方时使用的变量名
    pub memory_key: String,
    /// token 上限（必须为正）
    pub max_token_limit: usize,
    /// true 返回消息列表，false 返回格式化字符串
    pub return_messages: bool,
    /// `save_context` 读取输入时使用的 key，为空时自动推断
    pub input_key: Option<String>,
    /// `save_context` 读取输出时使用的 key，为空时要求输出只有一个 key
    pub output_key: Option<String>,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            human_prefix: "Human".to_string(),
            ai_prefix: "AI".to_string(),
            memory_key: "history".to_string(),
            max_token_limit: 2000,
            return_messages: false,
            input_key: None,
            output_key: None,
        }
    }
}

impl BufferConfig {
    pub fn new(max_token_limit: usize) -> Self {
        Self {
            max_token_limit,
            ..Self::default()
        }
    }

    pub fn human_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.human_prefix = prefix.into();
        self
    }

    pub fn ai_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.ai_prefix = prefix.into();
        self
    }

    pub fn memory_key(mut self, key: impl Into<String>) -> Self {
        self.memory_key = key.into();
        self
    }

    pub fn max_token_limit(mut self, limit: usize) -> Self {
        self.max_token_limit = limit;
        self
    }

    pub fn return_messages(mut self, enabled: bool) -> Self {
        self.return_messages = enabled;
        self
    }

    pub fn input_key(mut self, key: impl Into<String>) -> Self {
        self.input_key = Some(key.into());
        self
    }

    pub fn output_key(mut self, key: impl Into<String>) -> Self {
        self.output_key = Some(key.into());
        self
    }

    /// 从 YAML 文件加载，缺省字段使用默认值
    pub fn load(path: &str) -> Result<Self> {
        let file =
            std::fs::File::open(path).map_err(|_| ConfigError::FileNotFound(path.to_string()))?;
        let config: BufferConfig = serde_yaml::from_reader(file)?;
        config.validate()?;
        Ok(config)
    }

    /// 读取 `.env` 与 `TOKEN_BUFFER_*` 环境变量，覆盖默认配置
    pub fn from_env() -> Result<Self> {
        dotenv().ok();
        Self::default().merge_vars(std::env::vars())
    }

    /// 用 `TOKEN_BUFFER_*` 变量覆盖当前配置，未知变量报错
    pub fn merge_vars(mut self, vars: impl IntoIterator<Item = (String, String)>) -> Result<Self> {
        for (key, value) in vars {
            let Some(field) = key.strip_prefix(ENV_PREFIX) else {
                continue;
            };
            match field.to_lowercase().as_str() {
                "human_prefix" => self.human_prefix = value,
                "ai_prefix" => self.ai_prefix = value,
                "memory_key" => self.memory_key = value,
                "max_token_limit" => {
                    self.max_token_limit = value.trim().parse().map_err(|_| {
                        ConfigError::InvalidValue {
                            field: key.clone(),
                            message: format!("'{}' 不是有效的非负整数", value),
                        }
                    })?;
                }
                "return_messages" => {
                    self.return_messages = parse_bool(&value).ok_or_else(|| {
                        ConfigError::InvalidValue {
                            field: key.clone(),
                            message: format!("'{}' 不是有效的布尔值", value),
                        }
                    })?;
                }
                "input_key" => self.input_key = non_empty(value),
                "output_key" => self.output_key = non_empty(value),
                _ => {
                    return Err(ConfigError::InvalidValue {
                        field: key.clone(),
                        message: "未知的配置项".to_string(),
                    }
                    .into());
                }
            }
        }
        self.validate()?;
        Ok(self)
    }

    /// 校验配置：token 上限必须为正，memory_key 不能为空
    pub fn validate(&self) -> Result<()> {
        if self.max_token_limit == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_token_limit".to_string(),
                message: "必须为正整数".to_string(),
            }
            .into());
        }
        if self.memory_key.trim().is_empty() {
            return Err(ConfigError::MissingField("memory_key".to_string()).into());
        }
        Ok(())
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn non_empty(value: String) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BufferError;
    use std::io::Write;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults() {
        let config = BufferConfig::default();
        assert_eq!(config.human_prefix, "Human");
        assert_eq!(config.ai_prefix, "AI");
        assert_eq!(config.memory_key, "history");
        assert_eq!(config.max_token_limit, 2000);
        assert!(!config.return_messages);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_setters() {
        let config = BufferConfig::default()
            .max_token_limit(512)
            .human_prefix("User")
            .ai_prefix("Bot")
            .return_messages(true)
            .output_key("answer");
        assert_eq!(config.max_token_limit, 512);
        assert_eq!(config.human_prefix, "User");
        assert_eq!(config.ai_prefix, "Bot");
        assert!(config.return_messages);
        assert_eq!(config.output_key.as_deref(), Some("answer"));
        assert!(config.max_token_limit(0).validate().is_err());
    }

    #[test]
    fn test_zero_limit_rejected() {
        let err = BufferConfig::new(0).validate().unwrap_err();
        assert!(matches!(
            err,
            BufferError::Config(ConfigError::InvalidValue { ref field, .. }) if field == "max_token_limit"
        ));
    }

    #[test]
    fn test_blank_memory_key_rejected() {
        let err = BufferConfig::default().memory_key("  ").validate().unwrap_err();
        assert!(matches!(err, BufferError::Config(ConfigError::MissingField(_))));
    }

    #[test]
    fn test_load_yaml_with_partial_fields() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "max_token_limit: 64\nreturn_messages: true\nai_prefix: Bot").unwrap();

        let config = BufferConfig::load(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.max_token_limit, 64);
        assert!(config.return_messages);
        assert_eq!(config.ai_prefix, "Bot");
        assert_eq!(config.human_prefix, "Human");
    }

    #[test]
    fn test_load_missing_file() {
        let err = BufferConfig::load("/definitely/not/here.yaml").unwrap_err();
        assert!(matches!(err, BufferError::Config(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_merge_vars_overrides_and_ignores_foreign() {
        let config = BufferConfig::default()
            .merge_vars(vars(&[
                ("TOKEN_BUFFER_MAX_TOKEN_LIMIT", "128"),
                ("TOKEN_BUFFER_RETURN_MESSAGES", "yes"),
                ("TOKEN_BUFFER_MEMORY_KEY", "chat_history"),
                ("TOKEN_BUFFER_INPUT_KEY", "question"),
                ("PATH", "/usr/bin"),
            ]))
            .unwrap();
        assert_eq!(config.max_token_limit, 128);
        assert!(config.return_messages);
        assert_eq!(config.memory_key, "chat_history");
        assert_eq!(config.input_key.as_deref(), Some("question"));
        assert_eq!(config.output_key, None);
    }

    #[test]
    fn test_merge_vars_rejects_bad_values() {
        assert!(
            BufferConfig::default()
                .merge_vars(vars(&[("TOKEN_BUFFER_MAX_TOKEN_LIMIT", "lots")]))
                .is_err()
        );
        assert!(
            BufferConfig::default()
                .merge_vars(vars(&[("TOKEN_BUFFER_RETURN_MESSAGES", "maybe")]))
                .is_err()
        );
        assert!(
            BufferConfig::default()
                .merge_vars(vars(&[("TOKEN_BUFFER_COLOUR", "blue")]))
                .is_err()
        );
    }
}
