//! Process-wide `tracing` setup.

use std::io;
use std::path::{Path, PathBuf};

use once_cell::sync::OnceCell;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

static INIT: OnceCell<()> = OnceCell::new();

/// Where log records go.
#[derive(Clone, Debug, PartialEq, Eq)]
enum LogTarget {
    Disabled,
    /// Compact console output. Stderr keeps logs out of streamed answers.
    Stderr,
    /// One JSON object per line in the given file.
    JsonFile(PathBuf),
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct LogSettings {
    target: LogTarget,
    filter: String,
}

impl LogSettings {
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>, default_level: &str) -> Self {
        let enabled = lookup("OLLAMA_CHAT_OBSERVABILITY")
            .and_then(|value| parse_switch(&value))
            .unwrap_or(true);
        let target = if !enabled {
            LogTarget::Disabled
        } else if let Some(path) = lookup("OLLAMA_CHAT_JSON_LOG_PATH").filter(|p| !p.trim().is_empty()) {
            LogTarget::JsonFile(PathBuf::from(path.trim()))
        } else {
            LogTarget::Stderr
        };
        let filter = ["OLLAMA_CHAT_LOG_LEVEL", "RUST_LOG"]
            .into_iter()
            .filter_map(|key| lookup(key))
            .find(|candidate| EnvFilter::try_new(candidate).is_ok())
            .unwrap_or_else(|| default_level.to_string());
        Self { target, filter }
    }
}

fn parse_switch(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" | "enabled" => Some(true),
        "0" | "false" | "no" | "off" | "disabled" => Some(false),
        _ => None,
    }
}

/// Opens the JSON log file, creating missing parent directories.
fn json_writer(path: &Path) -> io::Result<RollingFileAppender> {
    let file_name = path
        .file_name()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "log path has no file name"))?;
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)?;
    RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(file_name.to_string_lossy().into_owned())
        .build(dir)
        .map_err(|e| io::Error::other(e.to_string()))
}

fn install_stderr(filter: EnvFilter) {
    let console = tracing_subscriber::fmt::layer()
        .compact()
        .with_target(false)
        .with_writer(io::stderr);
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .try_init();
}

/// Initialize logging once per process.
///
/// - `OLLAMA_CHAT_OBSERVABILITY`: `off`/`false`/`0` disables logging (default on).
/// - `OLLAMA_CHAT_LOG_LEVEL`, then `RUST_LOG`: filter directives; invalid values are ignored.
/// - `OLLAMA_CHAT_JSON_LOG_PATH`: write JSON lines to this file instead of stderr.
///
/// `default_level` applies when no valid filter is set. If the log file
/// cannot be opened, logs go to stderr and a warning names the path.
pub fn init_observability(default_level: &str) {
    INIT.get_or_init(|| {
        let settings = LogSettings::from_lookup(|key| std::env::var(key).ok(), default_level);
        let filter = EnvFilter::try_new(&settings.filter)
            .unwrap_or_else(|_| EnvFilter::new(default_level));
        match settings.target {
            LogTarget::Disabled => {}
            LogTarget::Stderr => install_stderr(filter),
            LogTarget::JsonFile(path) => match json_writer(&path) {
                Ok(writer) => {
                    let json = tracing_subscriber::fmt::layer()
                        .json()
                        .with_current_span(true)
                        .with_target(false)
                        .with_writer(writer);
                    let _ = tracing_subscriber::registry()
                        .with(filter)
                        .with(json)
                        .try_init();
                }
                Err(e) => {
                    install_stderr(filter);
                    tracing::warn!(path = %path.display(), error = %e, "cannot open JSON log file, logging to stderr");
                }
            },
        }
    });
}
