/// Terminal failure of a stream that had already been started.
///
/// Delivered to the renderer through `Renderer::on_error` together with
/// whatever text was accumulated before the failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, serde::Serialize, serde::Deserialize)]
pub enum StreamFailure {
    /// Network failure, non-success status or a read error mid-stream.
    #[error("transport failure: {message}")]
    Transport {
        message: String,
        status_code: Option<u16>,
    },
    /// The caller aborted the stream.
    #[error("stream cancelled")]
    Cancelled,
}

impl StreamFailure {
    /// Creates a transport failure without an HTTP status.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            status_code: None,
        }
    }

    /// Returns the HTTP status associated with the failure, if any.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Transport { status_code, .. } => *status_code,
            Self::Cancelled => None,
        }
    }
}

/// Top-level error type for the chat client API.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChatError {
    /// Invalid client configuration.
    #[error("config error: {0}")]
    Config(String),
    /// The prompt was empty after trimming.
    #[error("prompt must not be empty")]
    EmptyPrompt,
    /// No model has been selected for the conversation.
    #[error("no model selected")]
    EmptyModelSelection,
    /// A stream is already active on this conversation.
    #[error("a response is already being generated")]
    ConcurrentRequestRejected,
    /// Request could not be sent or the server answered with a failure status.
    #[error("transport error: {message}")]
    Transport {
        message: String,
        status_code: Option<u16>,
    },
    /// The server answered with a body that does not match the API shape.
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl ChatError {
    pub(crate) fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            status_code: None,
        }
    }

    pub(crate) fn status(status: u16, message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            status_code: Some(status),
        }
    }

    /// Returns `true` for precondition violations rejected before any request.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            Self::EmptyPrompt | Self::EmptyModelSelection | Self::ConcurrentRequestRejected
        )
    }
}

impl From<&ChatError> for StreamFailure {
    fn from(value: &ChatError) -> Self {
        match value {
            ChatError::Transport {
                message,
                status_code,
            } => StreamFailure::Transport {
                message: message.clone(),
                status_code: *status_code,
            },
            other => StreamFailure::transport(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_error_keeps_status_when_converted() {
        let err = ChatError::status(503, "busy");
        let failure = StreamFailure::from(&err);
        assert_eq!(failure.status_code(), Some(503));
        assert!(failure.to_string().contains("busy"));
    }

    #[test]
    fn preconditions_are_classified() {
        assert!(ChatError::EmptyPrompt.is_precondition());
        assert!(ChatError::EmptyModelSelection.is_precondition());
        assert!(ChatError::ConcurrentRequestRejected.is_precondition());
        assert!(!ChatError::transport("down").is_precondition());
    }

    #[test]
    fn non_transport_errors_become_transport_failures() {
        let failure = StreamFailure::from(&ChatError::Protocol("bad tags".into()));
        assert!(
            matches!(failure, StreamFailure::Transport { message, status_code: None } if message.contains("bad tags"))
        );
    }
}
