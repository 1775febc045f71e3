use std::time::Duration;

use crate::driver::StreamConsumer;
use crate::errors::ChatError;

const DEFAULT_BASE_URL: &str = "http://localhost:11434/api";

/// Configuration for the HTTP transport.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientConfig {
    /// API root that `/generate` and `/tags` are appended to.
    pub base_url: String,
    /// Timeout for establishing a connection.
    pub connect_timeout: Duration,
    /// Optional total request timeout.
    ///
    /// Unset by default: a generation may legitimately stream for minutes.
    pub request_timeout: Option<Duration>,
    /// Optional cap on consecutive malformed stream lines.
    pub max_consecutive_skips: Option<usize>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: None,
            max_consecutive_skips: None,
        }
    }
}

impl ClientConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a config from the process environment.
    ///
    /// - `OLLAMA_CHAT_BASE_URL`: API root (default `http://localhost:11434/api`).
    /// - `OLLAMA_CHAT_CONNECT_TIMEOUT_SECS`: connect timeout in seconds.
    /// - `OLLAMA_CHAT_REQUEST_TIMEOUT_SECS`: total request timeout in seconds.
    /// - `OLLAMA_CHAT_MAX_SKIPS`: consecutive malformed lines tolerated per stream.
    pub fn from_env() -> Result<Self, ChatError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ChatError> {
        let mut config = Self::default();
        if let Some(url) = lookup("OLLAMA_CHAT_BASE_URL").filter(|v| !v.trim().is_empty()) {
            config.base_url = url.trim().to_string();
        }
        if let Some(secs) = parse_var::<u64>(&lookup, "OLLAMA_CHAT_CONNECT_TIMEOUT_SECS")? {
            config.connect_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_var::<u64>(&lookup, "OLLAMA_CHAT_REQUEST_TIMEOUT_SECS")? {
            config.request_timeout = Some(Duration::from_secs(secs));
        }
        config.max_consecutive_skips = parse_var::<usize>(&lookup, "OLLAMA_CHAT_MAX_SKIPS")?;
        config.validate()?;
        Ok(config)
    }

    /// Overrides the API root.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    pub fn max_consecutive_skips(mut self, limit: usize) -> Self {
        self.max_consecutive_skips = Some(limit);
        self
    }

    /// Stream consumer carrying this config's skip limit.
    pub fn stream_consumer(&self) -> StreamConsumer {
        match self.max_consecutive_skips {
            Some(limit) => StreamConsumer::new().max_consecutive_skips(limit),
            None => StreamConsumer::new(),
        }
    }

    pub(crate) fn validate(&self) -> Result<(), ChatError> {
        let url = self.base_url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ChatError::Config(format!(
                "base url must start with http:// or https://, got {url:?}"
            )));
        }
        Ok(())
    }

    pub(crate) fn generate_url(&self) -> String {
        format!("{}/generate", self.base_url.trim_end_matches('/'))
    }

    pub(crate) fn tags_url(&self) -> String {
        format!("{}/tags", self.base_url.trim_end_matches('/'))
    }
}

fn parse_var<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<T>, ChatError>
where
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| ChatError::Config(format!("invalid {key}={raw:?}: {e}"))),
        _ => Ok(None),
    }
}
