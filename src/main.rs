//! token-buffer —— 查看 / 维护按 token 上限裁剪的对话历史
//!
//! ```bash
//! # 裁剪并打印某个会话的缓冲区
//! token-buffer show --session alice-1 --max-tokens 200
//!
//! # 交互模式：逐行录入对话，随时查看裁剪结果
//! token-buffer chat --session alice-1
//! ```

use clap::{Args, Parser, Subcommand};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::sync::Arc;
use token_buffer_memory::error::{BufferError, Result};
use token_buffer_memory::prelude::*;
use tracing::info;

#[derive(Parser)]
#[command(name = "token-buffer", version, about = "按 token 上限裁剪的对话缓冲区")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// 裁剪会话历史并打印缓冲区
    Show(BufferArgs),
    /// 交互式录入对话
    Chat(BufferArgs),
    /// 列出历史文件中的全部会话
    Sessions {
        #[arg(long, env = "TOKEN_BUFFER_FILE", default_value = "~/.token-buffer/history.json")]
        file: String,
    },
}

#[derive(Args)]
struct BufferArgs {
    /// 历史文件路径
    #[arg(long, env = "TOKEN_BUFFER_FILE", default_value = "~/.token-buffer/history.json")]
    file: String,
    /// 会话 ID，缺省时生成新的
    #[arg(long)]
    session: Option<String>,
    /// YAML 配置文件，缺省时读取 TOKEN_BUFFER_* 环境变量
    #[arg(long)]
    config: Option<String>,
    /// 覆盖 max_token_limit
    #[arg(long)]
    max_tokens: Option<usize>,
    /// 以 JSON 消息列表输出
    #[arg(long)]
    return_messages: bool,
}

impl BufferArgs {
    fn build(&self) -> Result<TokenBufferMemory> {
        let mut config = match &self.config {
            Some(path) => BufferConfig::load(path)?,
            None => BufferConfig::from_env()?,
        };
        if let Some(limit) = self.max_tokens {
            config.max_token_limit = limit;
        }
        if self.return_messages {
            config.return_messages = true;
        }

        let session = self
            .session
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let history = Arc::new(FileChatHistory::new(&self.file, session)?);
        info!(
            session_id = %history.session_id(),
            max_tokens = config.max_token_limit,
            "📚 加载对话缓冲区"
        );
        TokenBufferMemory::new(history, Arc::new(EstimatingTokenCounter::new()), config)
    }
}

fn main() {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "token_buffer_memory=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(Cli::parse()) {
        eprintln!("❌ {e}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Show(args) => show(&args.build()?),
        Command::Chat(args) => chat(&args.build()?),
        Command::Sessions { file } => {
            for id in FileChatHistory::list_sessions(&file)? {
                println!("{id}");
            }
            Ok(())
        }
    }
}

fn show(memory: &TokenBufferMemory) -> Result<()> {
    let before = memory.history().len()?;
    let buffer = memory.buffer()?;
    let after = memory.history().len()?;
    eprintln!("📊 {before} → {after} 条消息，~{} tokens", memory.token_count()?);
    print_buffer(&buffer)
}

fn print_buffer(buffer: &MemoryValue) -> Result<()> {
    match buffer {
        MemoryValue::Text(text) => println!("{text}"),
        MemoryValue::Messages(messages) => {
            println!("{}", serde_json::to_string_pretty(messages)?)
        }
    }
    Ok(())
}

const CHAT_HELP: &str = "直接输入 = 人类消息 | /ai <文本> = 助手消息 | /show | /tokens | /clear | /quit";

fn chat(memory: &TokenBufferMemory) -> Result<()> {
    let mut rl = DefaultEditor::new().map_err(|e| BufferError::Other(e.to_string()))?;
    println!("{CHAT_HELP}");

    loop {
        let line = match rl.readline("› ") {
            Ok(line) => line,
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
            Err(e) => return Err(BufferError::Other(e.to_string())),
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        rl.add_history_entry(line)
            .map_err(|e| BufferError::Other(e.to_string()))?;

        match line {
            "/quit" | "/exit" => break,
            "/show" => print_buffer(&memory.buffer()?)?,
            "/tokens" => println!(
                "{} 条消息，~{} / {} tokens",
                memory.history().len()?,
                memory.token_count()?,
                memory.config().max_token_limit
            ),
            "/clear" => {
                memory.clear()?;
                println!("🧹 已清空");
            }
            "/help" => println!("{CHAT_HELP}"),
            _ => match line.strip_prefix("/ai ") {
                Some(reply) => memory.history().add_ai_message(reply.trim())?,
                None => memory.history().add_user_message(line)?,
            },
        }
    }
    Ok(())
}
