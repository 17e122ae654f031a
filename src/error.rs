use std::fmt;

/// token-buffer 项目的统一错误类型
#[derive(Debug)]
pub enum BufferError {
    /// 记忆 / 对话存储相关错误
    Memory(MemoryError),
    /// 配置错误
    Config(ConfigError),
    /// IO 错误
    Io(std::io::Error),
    /// 其他错误
    Other(String),
}

/// 记忆相关错误
#[derive(Debug)]
pub enum MemoryError {
    /// token 计数失败（由外部计数器抛出，原样透传）
    TokenCount(String),
    /// 无法唯一确定输入变量（候选 key 为 0 个或多个）
    AmbiguousInputKey(Vec<String>),
    /// 输出变量多于一个且未指定 output_key
    AmbiguousOutputKey(Vec<String>),
    /// 指定的 key 在映射中不存在
    MissingKey(String),
    /// 存储读写失败
    IoError(String),
    /// 序列化/反序列化错误
    SerializationError(String),
    /// 存储内部锁被毒化
    LockPoisoned,
}

/// 配置错误
#[derive(Debug)]
pub enum ConfigError {
    /// 配置文件未找到
    FileNotFound(String),
    /// 配置解析失败
    ParseFailed(String),
    /// 缺少必需的配置项
    MissingField(String),
    /// 配置值无效
    InvalidValue { field: String, message: String },
}

// 实现 Display trait
impl fmt::Display for BufferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BufferError::Memory(e) => write!(f, "Memory Error: {}", e),
            BufferError::Config(e) => write!(f, "Config Error: {}", e),
            BufferError::Io(e) => write!(f, "IO Error: {}", e),
            BufferError::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl fmt::Display for MemoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemoryError::TokenCount(msg) => write!(f, "Token counting failed: {}", msg),
            MemoryError::AmbiguousInputKey(keys) => {
                write!(f, "Expected exactly one input key, got {:?}", keys)
            }
            MemoryError::AmbiguousOutputKey(keys) => {
                write!(f, "Expected exactly one output key, got {:?}", keys)
            }
            MemoryError::MissingKey(key) => write!(f, "Key '{}' not found", key),
            MemoryError::IoError(msg) => write!(f, "Storage IO error: {}", msg),
            MemoryError::SerializationError(msg) => write!(f, "Serialization error: {}", msg),
            MemoryError::LockPoisoned => write!(f, "Transcript lock poisoned"),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::FileNotFound(path) => write!(f, "Config file not found: {}", path),
            ConfigError::ParseFailed(msg) => write!(f, "Failed to parse config: {}", msg),
            ConfigError::MissingField(field) => write!(f, "Missing config field: {}", field),
            ConfigError::InvalidValue { field, message } => {
                write!(f, "Invalid config value for '{}': {}", field, message)
            }
        }
    }
}

// 实现 std::error::Error trait
impl std::error::Error for BufferError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BufferError::Io(e) => Some(e),
            BufferError::Memory(e) => Some(e),
            BufferError::Config(e) => Some(e),
            BufferError::Other(_) => None,
        }
    }
}

impl std::error::Error for MemoryError {}
impl std::error::Error for ConfigError {}

// From 转换实现
impl From<std::io::Error> for BufferError {
    fn from(err: std::io::Error) -> Self {
        BufferError::Io(err)
    }
}

impl From<serde_json::Error> for BufferError {
    fn from(err: serde_json::Error) -> Self {
        BufferError::Memory(MemoryError::SerializationError(err.to_string()))
    }
}

impl From<serde_yaml::Error> for BufferError {
    fn from(err: serde_yaml::Error) -> Self {
        BufferError::Config(ConfigError::ParseFailed(err.to_string()))
    }
}

impl From<MemoryError> for BufferError {
    fn from(err: MemoryError) -> Self {
        BufferError::Memory(err)
    }
}

impl From<ConfigError> for BufferError {
    fn from(err: ConfigError) -> Self {
        BufferError::Config(err)
    }
}

// 便捷的 Result 类型别名
pub type Result<T> = std::result::Result<T, BufferError>;
