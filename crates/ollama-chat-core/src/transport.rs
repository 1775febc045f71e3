use std::pin::Pin;

use bytes::Bytes;
use futures::TryStreamExt as _;
use tracing::{debug, warn};

use crate::config::ClientConfig;
use crate::errors::ChatError;
use crate::models::{ConnectionStatus, ModelInfo, TagsResponse};

/// Raw response body of a generate request, in transport-chosen chunks.
pub type ByteStream =
    Pin<Box<dyn futures::Stream<Item = Result<Bytes, ChatError>> + Send + 'static>>;

/// Body of `POST {base}/generate`. Streaming is always requested.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct StreamRequest {
    model: String,
    prompt: String,
    stream: bool,
}

impl StreamRequest {
    /// Creates a streaming request; a blank model name is rejected.
    pub fn new(model: impl Into<String>, prompt: impl Into<String>) -> Result<Self, ChatError> {
        let model = model.into();
        if model.trim().is_empty() {
            return Err(ChatError::EmptyModelSelection);
        }
        Ok(Self {
            model,
            prompt: prompt.into(),
            stream: true,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }
}

/// Outbound boundary to the text-generation API.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// Lists the locally available models.
    async fn list_models(&self) -> Result<Vec<ModelInfo>, ChatError>;

    /// Probes the API; never fails, only reports reachability.
    async fn check_connection(&self) -> ConnectionStatus {
        match self.list_models().await {
            Ok(_) => ConnectionStatus::Connected,
            Err(_) => ConnectionStatus::Disconnected,
        }
    }

    /// Sends the request and returns the body once a success status arrived.
    ///
    /// Non-success statuses are returned as `ChatError::Transport` before any
    /// body is handed out.
    async fn generate(&self, request: &StreamRequest) -> Result<ByteStream, ChatError>;
}

/// [`Transport`] over HTTP using reqwest.
pub struct HttpTransport {
    client: reqwest::Client,
    config: ClientConfig,
}

impl HttpTransport {
    /// Creates a transport from explicit configuration.
    pub fn new(config: ClientConfig) -> Result<Self, ChatError> {
        config.validate()?;
        let mut builder = reqwest::Client::builder().connect_timeout(config.connect_timeout);
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| ChatError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    /// Creates a transport using [`ClientConfig::from_env`].
    pub fn from_env() -> Result<Self, ChatError> {
        Self::new(ClientConfig::from_env()?)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }
}

async fn failure_body(response: reqwest::Response) -> String {
    response
        .text()
        .await
        .unwrap_or_else(|_| "<unreadable body>".to_string())
}

#[async_trait::async_trait]
impl Transport for HttpTransport {
    async fn list_models(&self) -> Result<Vec<ModelInfo>, ChatError> {
        let response = self
            .client
            .get(self.config.tags_url())
            .send()
            .await
            .map_err(|e| ChatError::transport(format!("model list request failed: {e}")))?;
        let status = response.status();
        if !status.is_success() {
            let body = failure_body(response).await;
            return Err(ChatError::status(
                status.as_u16(),
                format!("model list request failed with status {status}: {body}"),
            ));
        }
        let tags: TagsResponse = response
            .json()
            .await
            .map_err(|e| ChatError::Protocol(format!("invalid model list: {e}")))?;
        debug!(count = tags.models.len(), "loaded models");
        Ok(tags.models)
    }

    async fn check_connection(&self) -> ConnectionStatus {
        match self.client.get(self.config.tags_url()).send().await {
            Ok(response) if response.status().is_success() => ConnectionStatus::Connected,
            Ok(response) => {
                warn!(status = %response.status(), "connection check returned failure status");
                ConnectionStatus::Disconnected
            }
            Err(e) => {
                warn!(error = %e, "connection check failed");
                ConnectionStatus::Disconnected
            }
        }
    }

    async fn generate(&self, request: &StreamRequest) -> Result<ByteStream, ChatError> {
        debug!(model = %request.model(), prompt_chars = request.prompt().len(), "starting generate stream");
        let response = self
            .client
            .post(self.config.generate_url())
            .json(request)
            .send()
            .await
            .map_err(|e| ChatError::transport(format!("generate request failed: {e}")))?;
        let status = response.status();
        if !status.is_success() {
            let body = failure_body(response).await;
            return Err(ChatError::status(
                status.as_u16(),
                format!("generate request failed with status {status}: {body}"),
            ));
        }
        let body = response
            .bytes_stream()
            .map_err(|e| ChatError::transport(format!("generate stream read failed: {e}")));
        Ok(Box::pin(body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    #[test]
    fn request_serializes_with_stream_flag() {
        let request = StreamRequest::new("llama3.2", "Why is the sky blue?").expect("request");
        let body = serde_json::to_value(&request).expect("json");
        assert_eq!(
            body,
            serde_json::json!({"model":"llama3.2","prompt":"Why is the sky blue?","stream":true})
        );
    }

    #[test]
    fn blank_model_is_rejected() {
        assert_eq!(
            StreamRequest::new("  ", "hi"),
            Err(ChatError::EmptyModelSelection)
        );
    }

    #[test]
    fn http_transport_rejects_invalid_base_url() {
        let result = HttpTransport::new(ClientConfig::new().base_url("ftp://nope"));
        assert!(matches!(result, Err(ChatError::Config(_))));
    }

    struct ListOnly(Result<Vec<ModelInfo>, ChatError>);

    #[async_trait::async_trait]
    impl Transport for ListOnly {
        async fn list_models(&self) -> Result<Vec<ModelInfo>, ChatError> {
            self.0.clone()
        }

        async fn generate(&self, _request: &StreamRequest) -> Result<ByteStream, ChatError> {
            Ok(Box::pin(stream::empty()))
        }
    }

    #[tokio::test]
    async fn default_connection_check_follows_model_listing() {
        assert_eq!(
            ListOnly(Ok(vec![])).check_connection().await,
            ConnectionStatus::Connected
        );
        assert_eq!(
            ListOnly(Err(ChatError::transport("refused")))
                .check_connection()
                .await,
            ConnectionStatus::Disconnected
        );
    }
}
