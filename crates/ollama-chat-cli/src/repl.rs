use std::io::{self, BufRead as _, Write as _};

use ollama_chat_core::{ChatError, ChatSession, StreamOutcome};
use tokio::sync::mpsc;
use tracing::debug;

use crate::cli::OutputMode;
use crate::terminal::TerminalRenderer;

const HELP: &str = "\
commands:
  /models        list available models
  /model NAME    switch model
  /status        check the connection
  /clear         forget the conversation
  /quit          leave
end a line with \\ to continue on the next line; Ctrl-C stops an answer";

/// A line typed at the prompt.
#[derive(Debug, PartialEq, Eq)]
pub enum Input {
    Prompt(String),
    Models,
    Model(String),
    Status,
    Clear,
    Help,
    Quit,
    Unknown(String),
}

impl Input {
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        let Some(command) = line.strip_prefix('/') else {
            return Some(Self::Prompt(line.to_string()));
        };
        let (name, arg) = match command.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, arg.trim()),
            None => (command, ""),
        };
        Some(match name {
            "models" => Self::Models,
            "model" => Self::Model(arg.to_string()),
            "status" => Self::Status,
            "clear" => Self::Clear,
            "help" | "?" => Self::Help,
            "quit" | "exit" | "q" => Self::Quit,
            other => Self::Unknown(other.to_string()),
        })
    }
}

/// Sends one prompt, aborting the stream if Ctrl-C arrives meanwhile.
pub async fn send_interruptible<R>(
    session: &ChatSession,
    prompt: &str,
    renderer: &mut R,
) -> Result<StreamOutcome, ChatError>
where
    R: ollama_chat_core::Renderer + Send,
{
    let abort = session.abort_handle();
    let send = session.send_message(prompt, renderer);
    tokio::pin!(send);
    loop {
        tokio::select! {
            result = &mut send => return result,
            signal = tokio::signal::ctrl_c() => match signal {
                Ok(()) => {
                    debug!("interrupt received, aborting stream");
                    abort.abort();
                }
                Err(_) => return send.as_mut().await,
            },
        }
    }
}

pub async fn print_models(session: &ChatSession) -> Result<(), ChatError> {
    let models = session.load_models().await?;
    if models.is_empty() {
        println!("no models installed");
        return Ok(());
    }
    let current = session.current_model();
    for model in &models {
        let marker = if current.as_deref() == Some(model.name.as_str()) {
            "*"
        } else {
            " "
        };
        println!("{marker} {}", model.label());
    }
    Ok(())
}

/// Lines typed at the terminal.
///
/// Stdin is read by a plain thread rather than the runtime's blocking pool,
/// so a read that never completes does not hold up shutdown.
pub struct LineSource {
    rx: mpsc::Receiver<io::Result<String>>,
}

impl LineSource {
    pub fn stdin() -> io::Result<Self> {
        let (tx, rx) = mpsc::channel(1);
        std::thread::Builder::new()
            .name("stdin-reader".into())
            .spawn(move || {
                for line in io::stdin().lock().lines() {
                    let failed = line.is_err();
                    if tx.blocking_send(line).is_err() || failed {
                        break;
                    }
                }
            })?;
        Ok(Self { rx })
    }

    /// Reads one logical input, joining lines that end with a backslash.
    ///
    /// Returns `None` at end of input.
    async fn next_input(&mut self) -> io::Result<Option<String>> {
        let mut text = String::new();
        loop {
            let Some(line) = self.rx.recv().await else {
                return Ok((!text.is_empty()).then_some(text));
            };
            let line = line?;
            match line.strip_suffix('\\') {
                Some(head) => {
                    text.push_str(head);
                    text.push('\n');
                    prompt_marker("… ");
                }
                None => {
                    text.push_str(&line);
                    return Ok(Some(text));
                }
            }
        }
    }
}

fn prompt_marker(marker: &str) {
    print!("{marker}");
    let _ = std::io::stdout().flush();
}

/// Interactive conversation on stdin/stdout.
pub async fn run(session: &ChatSession, mode: OutputMode) -> anyhow::Result<()> {
    let mut lines = LineSource::stdin()?;
    let mut renderer = TerminalRenderer::stdio(mode);

    match session.current_model() {
        Some(model) => println!("chatting with {model}; /help for commands"),
        None => println!("no model selected; use /models and /model NAME"),
    }

    loop {
        prompt_marker("> ");
        let input = tokio::select! {
            read = lines.next_input() => read?,
            _ = tokio::signal::ctrl_c() => {
                println!();
                break;
            }
        };
        let Some(text) = input else {
            println!();
            break;
        };
        let Some(input) = Input::parse(&text) else {
            continue;
        };

        match input {
            Input::Prompt(prompt) => {
                renderer.reset();
                match send_interruptible(session, &prompt, &mut renderer).await {
                    Ok(_) => {}
                    Err(err) => eprintln!("⚠ {err}"),
                }
            }
            Input::Models => {
                if let Err(err) = print_models(session).await {
                    eprintln!("⚠ {err}");
                }
            }
            Input::Model(name) if name.is_empty() => match session.current_model() {
                Some(model) => println!("current model: {model}"),
                None => println!("no model selected"),
            },
            Input::Model(name) => {
                session.select_model(name.as_str());
                println!("switched to {name}");
            }
            Input::Status => {
                let status = session.check_connection().await;
                println!("{status}");
            }
            Input::Clear => {
                session.clear();
                println!("conversation cleared");
            }
            Input::Help => println!("{HELP}"),
            Input::Quit => break,
            Input::Unknown(name) => eprintln!("unknown command /{name}; /help lists commands"),
        }
    }
    Ok(())
}
