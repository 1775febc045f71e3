use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};
use ollama_chat_core::{ChatError, ClientConfig};

/// Chat with a local Ollama server from the terminal.
#[derive(Parser, Debug)]
#[command(name = "ollama-chat", version, about)]
pub struct Cli {
    /// API base URL, e.g. http://localhost:11434/api (overrides OLLAMA_CHAT_BASE_URL)
    #[arg(long, global = true, value_name = "URL")]
    pub base_url: Option<String>,

    /// Overall request timeout in seconds
    #[arg(long, global = true, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Fail a stream after this many consecutive undecodable lines
    #[arg(long, global = true, value_name = "N")]
    pub max_skips: Option<usize>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List locally available models
    Models,
    /// Check whether the API is reachable
    Status,
    /// Send a single prompt and print the answer
    Ask(AskArgs),
    /// Interactive conversation
    Chat(ChatArgs),
}

#[derive(Args, Debug)]
pub struct AskArgs {
    #[command(flatten)]
    pub turn: TurnArgs,

    /// Prompt text; multiple words are joined with spaces
    #[arg(required = true, num_args = 1..)]
    pub prompt: Vec<String>,
}

impl AskArgs {
    pub fn prompt_text(&self) -> String {
        self.prompt.join(" ")
    }
}

#[derive(Args, Debug)]
pub struct ChatArgs {
    #[command(flatten)]
    pub turn: TurnArgs,
}

/// Options shared by commands that generate answers.
#[derive(Args, Debug, Clone)]
pub struct TurnArgs {
    /// Model to use; defaults to the first listed model
    #[arg(short, long)]
    pub model: Option<String>,

    /// How answers are printed
    #[arg(short, long, value_enum, default_value_t = OutputMode::Plain)]
    pub output: OutputMode,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputMode {
    /// Stream raw text as it arrives
    Plain,
    /// Render markdown with terminal colors once the answer is complete
    Ansi,
    /// Print the finished answer as HTML
    Html,
}

impl Cli {
    /// Environment configuration with command-line overrides applied.
    pub fn client_config(&self) -> Result<ClientConfig, ChatError> {
        let mut config = ClientConfig::from_env()?;
        if let Some(base_url) = &self.base_url {
            config = config.base_url(base_url.clone());
        }
        if let Some(secs) = self.timeout {
            config = config.request_timeout(Duration::from_secs(secs));
        }
        if let Some(limit) = self.max_skips {
            config = config.max_consecutive_skips(limit);
        }
        Ok(config)
    }
}
