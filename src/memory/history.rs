//! 对话历史存储（ChatHistory）
//!
//! 保存会话中的每一个 turn，按时间顺序排列。写入发生在外部（或通过
//! [`Memory::save_context`](crate::memory::Memory::save_context)），缓冲区只在裁剪时从头部删除。
//!
//! 同一个 `Arc<dyn ChatHistory>` 句柄通常同时被写入方和
//! [`TokenBufferMemory`](crate::memory::TokenBufferMemory) 持有，
//! 因此裁剪是对共享存储的**原地删除**，而不是拷贝。
//!
//! ## 内置实现
//!
//! | 类型 | 说明 |
//! |------|------|
//! | [`InMemoryChatHistory`] | 进程内存，重启即清空，适合测试 |
//! | [`FileChatHistory`] | JSON 文件持久化，按 `session_id` 分组 |
//!
//! ## 快速上手
//!
//! ```rust,no_run
//! use token_buffer_memory::memory::history::{ChatHistory, FileChatHistory};
//! use std::sync::Arc;
//!
//! # fn example() -> token_buffer_memory::error::Result<()> {
//! let history = Arc::new(FileChatHistory::new("~/.token-buffer/history.json", "alice-1")?);
//! history.add_user_message("你好")?;
//! history.add_ai_message("你好！有什么可以帮你？")?;
//! # Ok(())
//! # }
//! ```

use crate::error::{MemoryError, Result};
use crate::llm::types::Message;
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

// ── ChatHistory trait ─────────────────────────────────────────────────────────

/// 有序、可变的对话历史存储接口
///
/// 所有方法都通过 `&self` 调用（内部可变性），以便多个持有者共享同一个句柄。
pub trait ChatHistory: Send + Sync {
    /// 按时间顺序返回全部消息
    fn messages(&self) -> Result<Vec<Message>>;

    /// 在末尾追加一条消息
    fn add_message(&self, message: Message) -> Result<()>;

    /// 删除并返回最早的一条消息（存储为空时返回 `None`）
    fn pop_front(&self) -> Result<Option<Message>>;

    /// 清空全部消息
    fn clear(&self) -> Result<()>;

    fn add_user_message(&self, content: &str) -> Result<()> {
        self.add_message(Message::user(content))
    }

    fn add_ai_message(&self, content: &str) -> Result<()> {
        self.add_message(Message::assistant(content))
    }

    fn len(&self) -> Result<usize> {
        Ok(self.messages()?.len())
    }

    fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

// ── InMemoryChatHistory ───────────────────────────────────────────────────────

/// 进程内存对话历史，重启后丢失
pub struct InMemoryChatHistory {
    messages: Mutex<VecDeque<Message>>,
}

impl Default for InMemoryChatHistory {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryChatHistory {
    pub fn new() -> Self {
        Self {
            messages: Mutex::new(VecDeque::new()),
        }
    }

    /// 以已有消息初始化
    pub fn with_messages(messages: impl IntoIterator<Item = Message>) -> Self {
        Self {
            messages: Mutex::new(messages.into_iter().collect()),
        }
    }
}

impl ChatHistory for InMemoryChatHistory {
    fn messages(&self) -> Result<Vec<Message>> {
        Ok(lock(&self.messages)?.iter().cloned().collect())
    }

    fn add_message(&self, message: Message) -> Result<()> {
        lock(&self.messages)?.push_back(message);
        Ok(())
    }

    fn pop_front(&self) -> Result<Option<Message>> {
        Ok(lock(&self.messages)?.pop_front())
    }

    fn clear(&self) -> Result<()> {
        lock(&self.messages)?.clear();
        Ok(())
    }

    fn len(&self) -> Result<usize> {
        Ok(lock(&self.messages)?.len())
    }
}

// ── FileChatHistory ───────────────────────────────────────────────────────────

type SessionMap = HashMap<String, VecDeque<Message>>;

/// 基于 JSON 文件的对话历史
///
/// 每次修改立即落盘，读取直接走内存缓存。同一文件可容纳多个会话：
///
/// ```json
/// {
///   "alice-1": [
///     { "role": "user", "content": "你好" },
///     { "role": "assistant", "content": "你好！" }
///   ]
/// }
/// ```
pub struct FileChatHistory {
    path: PathBuf,
    session_id: String,
    data: Mutex<SessionMap>,
}

impl FileChatHistory {
    /// 打开或创建历史文件，自动建父目录。文件损坏时记录警告并从空状态开始。
    pub fn new(path: impl AsRef<Path>, session_id: impl Into<String>) -> Result<Self> {
        let path = expand_tilde(path.as_ref());
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| MemoryError::IoError(format!("创建目录失败: {e}")))?;
            }
        }
        let data = read_sessions(&path)?;
        let session_id = session_id.into();
        info!(
            path = %path.display(),
            session_id = %session_id,
            sessions = data.len(),
            "🗂️ FileChatHistory 初始化"
        );
        Ok(Self {
            path,
            session_id,
            data: Mutex::new(data),
        })
    }

    /// 只读列出历史文件中的全部 session_id（已排序），文件不存在时返回空列表
    pub fn list_sessions(path: impl AsRef<Path>) -> Result<Vec<String>> {
        let mut ids: Vec<String> = read_sessions(&expand_tilde(path.as_ref()))?
            .into_keys()
            .collect();
        ids.sort();
        Ok(ids)
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 本句柄已知的全部 session_id（已排序），每次写入后与文件同步
    pub fn sessions(&self) -> Result<Vec<String>> {
        let mut ids: Vec<String> = lock(&self.data)?.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }

    /// 将本会话的新内容（`None` 表示删除）合并进磁盘上的最新文件后写回。
    ///
    /// 其他会话一律以磁盘为准，多个句柄共享同一文件时互不覆盖。
    /// 写入成功后才更新内存缓存，失败时缓存保持原状。
    fn commit(&self, data: &mut SessionMap, entry: Option<VecDeque<Message>>) -> Result<()> {
        let mut merged = read_sessions(&self.path)?;
        match entry {
            Some(messages) => {
                merged.insert(self.session_id.clone(), messages);
            }
            None => {
                merged.remove(&self.session_id);
            }
        }
        let json = serde_json::to_string_pretty(&merged)
            .map_err(|e| MemoryError::SerializationError(e.to_string()))?;
        std::fs::write(&self.path, json)
            .map_err(|e| MemoryError::IoError(format!("写入历史文件失败: {e}")))?;
        debug!(path = %self.path.display(), "💾 对话历史已持久化");
        *data = merged;
        Ok(())
    }
}

impl ChatHistory for FileChatHistory {
    fn messages(&self) -> Result<Vec<Message>> {
        Ok(lock(&self.data)?
            .get(&self.session_id)
            .map(|q| q.iter().cloned().collect())
            .unwrap_or_default())
    }

    fn add_message(&self, message: Message) -> Result<()> {
        let mut data = lock(&self.data)?;
        let mut session = data.get(&self.session_id).cloned().unwrap_or_default();
        session.push_back(message);
        self.commit(&mut data, Some(session))
    }

    fn pop_front(&self) -> Result<Option<Message>> {
        let mut data = lock(&self.data)?;
        let Some(mut session) = data.get(&self.session_id).cloned() else {
            return Ok(None);
        };
        let popped = session.pop_front();
        if popped.is_some() {
            self.commit(&mut data, Some(session))?;
        }
        Ok(popped)
    }

    fn clear(&self) -> Result<()> {
        let mut data = lock(&self.data)?;
        if data.contains_key(&self.session_id) {
            self.commit(&mut data, None)?;
            info!(session_id = %self.session_id, "🗑️ 会话历史已清空");
        }
        Ok(())
    }
}

// ── 私有工具函数 ──────────────────────────────────────────────────────────────

fn read_sessions(path: &Path) -> Result<SessionMap> {
    if !path.exists() {
        return Ok(HashMap::new());
    }
    let raw = std::fs::read_to_string(path)
        .map_err(|e| MemoryError::IoError(format!("读取历史文件失败: {e}")))?;
    Ok(serde_json::from_str(&raw).unwrap_or_else(|e| {
        warn!("历史文件解析失败，从空状态开始: {e}");
        HashMap::new()
    }))
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>> {
    mutex.lock().map_err(|_| MemoryError::LockPoisoned.into())
}

fn expand_tilde(path: &Path) -> PathBuf {
    let s = path.to_string_lossy();
    if let Some(rest) = s.strip_prefix("~/") {
        if let Some(home) = std::env::var("HOME")
            .ok()
            .or_else(|| std::env::var("USERPROFILE").ok())
        {
            return PathBuf::from(home).join(rest);
        }
    }
    path.to_path_buf()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_memory_fifo_order() -> Result<()> {
        let history = InMemoryChatHistory::new();
        history.add_user_message("one")?;
        history.add_ai_message("two")?;
        history.add_message(Message::system("three"))?;

        assert_eq!(history.len()?, 3);
        assert_eq!(history.pop_front()?, Some(Message::user("one")));
        assert_eq!(
            history.messages()?,
            vec![Message::assistant("two"), Message::system("three")]
        );
        Ok(())
    }

    #[test]
    fn test_in_memory_pop_empty() -> Result<()> {
        let history = InMemoryChatHistory::new();
        assert!(history.is_empty()?);
        assert_eq!(history.pop_front()?, None);
        Ok(())
    }

    #[test]
    fn test_in_memory_clear() -> Result<()> {
        let history = InMemoryChatHistory::with_messages(vec![Message::user("a")]);
        history.clear()?;
        assert!(history.messages()?.is_empty());
        Ok(())
    }

    #[test]
    fn test_file_history_survives_reopen() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("nested").join("history.json");

        {
            let history = FileChatHistory::new(&path, "s1")?;
            history.add_user_message("hi")?;
            history.add_ai_message("hello")?;
            history.add_user_message("bye")?;
            assert_eq!(history.pop_front()?, Some(Message::user("hi")));
        }

        let reopened = FileChatHistory::new(&path, "s1")?;
        assert_eq!(
            reopened.messages()?,
            vec![Message::assistant("hello"), Message::user("bye")]
        );
        Ok(())
    }

    #[test]
    fn test_file_history_isolates_sessions() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("history.json");

        let alice = FileChatHistory::new(&path, "alice")?;
        alice.add_user_message("from alice")?;

        let bob = FileChatHistory::new(&path, "bob")?;
        assert!(bob.messages()?.is_empty());
        bob.add_user_message("from bob")?;

        let reopened = FileChatHistory::new(&path, "alice")?;
        assert_eq!(reopened.sessions()?, vec!["alice", "bob"]);
        assert_eq!(reopened.messages()?, vec![Message::user("from alice")]);

        reopened.clear()?;
        let again = FileChatHistory::new(&path, "bob")?;
        assert_eq!(again.sessions()?, vec!["bob"]);
        Ok(())
    }

    #[test]
    fn test_file_history_corrupt_file_starts_empty() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("history.json");
        std::fs::write(&path, "not json")?;

        let history = FileChatHistory::new(&path, "s1")?;
        assert!(history.messages()?.is_empty());
        history.add_user_message("fresh")?;

        let reopened = FileChatHistory::new(&path, "s1")?;
        assert_eq!(reopened.messages()?, vec![Message::user("fresh")]);
        Ok(())
    }

    #[test]
    fn test_file_history_live_handles_do_not_overwrite_each_other() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("history.json");

        // 两个句柄都在任何写入之前打开
        let alice = FileChatHistory::new(&path, "alice")?;
        let bob = FileChatHistory::new(&path, "bob")?;

        alice.add_user_message("from alice")?;
        bob.add_user_message("from bob")?;
        bob.add_ai_message("hi bob")?;
        assert_eq!(bob.pop_front()?, Some(Message::user("from bob")));
        alice.add_ai_message("hi alice")?;

        let reopened = FileChatHistory::new(&path, "alice")?;
        assert_eq!(reopened.sessions()?, vec!["alice", "bob"]);
        assert_eq!(
            reopened.messages()?,
            vec![Message::user("from alice"), Message::assistant("hi alice")]
        );
        assert_eq!(
            FileChatHistory::new(&path, "bob")?.messages()?,
            vec![Message::assistant("hi bob")]
        );

        bob.clear()?;
        assert_eq!(FileChatHistory::list_sessions(&path)?, vec!["alice"]);
        assert_eq!(alice.messages()?.len(), 2);
        Ok(())
    }

    #[test]
    fn test_file_history_failed_write_keeps_cache() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let nested = dir.path().join("nested");
        let history = FileChatHistory::new(nested.join("history.json"), "s1")?;
        history.add_user_message("keep me")?;
        assert_eq!(history.path(), nested.join("history.json").as_path());

        std::fs::remove_dir_all(&nested)?;

        assert!(history.pop_front().is_err());
        assert!(history.add_ai_message("lost").is_err());
        assert!(history.clear().is_err());
        assert_eq!(history.messages()?, vec![Message::user("keep me")]);
        Ok(())
    }

    #[test]
    fn test_list_sessions_is_read_only() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let missing = dir.path().join("absent").join("history.json");

        assert!(FileChatHistory::list_sessions(&missing)?.is_empty());
        assert!(!missing.parent().map(Path::exists).unwrap_or(false));

        let path = dir.path().join("history.json");
        FileChatHistory::new(&path, "b")?.add_user_message("x")?;
        FileChatHistory::new(&path, "a")?.add_user_message("y")?;
        assert_eq!(FileChatHistory::list_sessions(&path)?, vec!["a", "b"]);
        Ok(())
    }
}
