//! Common imports for typical client usage.
//!
//! Exports the types most callers need to open a session, stream an answer
//! and render it.
pub use crate::{
    AbortHandle, ChatError, ChatMessage, ChatSession, ClientConfig, ConnectionStatus,
    HttpTransport, ModelInfo, RecordingRenderer, Renderer, StreamFailure, StreamOutcome,
    Transport,
};
