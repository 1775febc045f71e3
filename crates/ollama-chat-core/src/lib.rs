//! Streaming chat core for a local text-generation HTTP API.
//!
//! The generate endpoint answers with newline-delimited JSON fragments. This
//! crate turns that body into cumulative text updates for a [`Renderer`]:
//! bytes are framed into lines by [`LineBuffer`], each line is decoded by
//! [`decode_fragment`], and [`StreamConsumer`] folds the fragments and signals
//! completion or failure. [`ChatSession`] ties it to an HTTP [`Transport`].
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use ollama_chat_core::prelude::*;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), ChatError> {
//! let session = ChatSession::new(Arc::new(HttpTransport::from_env()?));
//! session.load_models().await?;
//!
//! let mut renderer = RecordingRenderer::new();
//! let outcome = session.send_message("Why is the sky blue?", &mut renderer).await?;
//! println!("{}", outcome.text());
//! # Ok(())
//! # }
//! ```

/// Transport configuration loaded from code or the environment.
pub mod config;
/// Stream consumption driver, outcomes and cancellation.
pub mod driver;
/// Public error types.
pub mod errors;
/// Final-answer formatting.
pub mod format;
/// Decoding of single stream lines.
pub mod fragment;
pub mod line_buffer;
/// Model listing types and connection status.
pub mod models;
pub mod observability;
/// Common imports for typical usage.
pub mod prelude;
/// Renderer contract between the consumer and the display.
pub mod renderer;
/// Conversation context and message history.
pub mod session;
/// HTTP boundary to the generation API.
pub mod transport;

pub use config::ClientConfig;
pub use driver::{
    AbortHandle, AbortSignal, StreamConsumer, StreamOutcome, StreamPhase, abort_pair,
};
pub use errors::{ChatError, StreamFailure};
pub use format::{BasicFormatter, MarkdownFormatter, MessageFormatter};
pub use fragment::{FragmentDecode, GenerationStats, ResponseFragment, decode_fragment};
pub use line_buffer::LineBuffer;
pub use models::{ConnectionStatus, ModelInfo, format_size};
pub use observability::init_observability;
pub use renderer::{RecordingRenderer, RenderEvent, Renderer};
pub use session::{ChatMessage, ChatSession, Role};
pub use transport::{ByteStream, HttpTransport, StreamRequest, Transport};
