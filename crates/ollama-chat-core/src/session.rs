use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::driver::{AbortHandle, StreamConsumer, StreamOutcome};
use crate::errors::{ChatError, StreamFailure};
use crate::models::{ConnectionStatus, ModelInfo};
use crate::renderer::Renderer;
use crate::transport::{StreamRequest, Transport};

/// Author of a conversation message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One entry of the in-memory conversation history.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ChatMessage {
    pub id: uuid::Uuid,
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
    /// Set when the stream failed before completing this answer.
    pub partial: bool,
}

impl ChatMessage {
    fn new(role: Role, content: impl Into<String>, partial: bool) -> Self {
        Self {
            id: uuid::Uuid::new_v4(),
            role,
            content: content.into(),
            created_at: Utc::now(),
            partial,
        }
    }
}

#[derive(Default)]
struct SessionState {
    model: Option<String>,
    messages: Vec<ChatMessage>,
}

/// Conversation context: selected model, history and the single-stream guard.
///
/// Construct one per conversation. History lives in memory only.
pub struct ChatSession {
    id: uuid::Uuid,
    transport: Arc<dyn Transport>,
    consumer: StreamConsumer,
    state: Mutex<SessionState>,
    generating: AtomicBool,
    abort: AbortHandle,
}

impl ChatSession {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            id: uuid::Uuid::new_v4(),
            transport,
            consumer: StreamConsumer::new(),
            state: Mutex::new(SessionState::default()),
            generating: AtomicBool::new(false),
            abort: AbortHandle::new(),
        }
    }

    /// Replaces the stream consumer (for example to set a skip limit).
    pub fn with_consumer(mut self, consumer: StreamConsumer) -> Self {
        self.consumer = consumer;
        self
    }

    pub fn id(&self) -> uuid::Uuid {
        self.id
    }

    fn state(&self) -> MutexGuard<'_, SessionState> {
        // the state holds plain data, a poisoned lock is still consistent
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Selects the model for subsequent messages; a blank name clears it.
    pub fn select_model(&self, model: impl Into<String>) {
        let model = model.into();
        let model = Some(model.trim().to_string()).filter(|m| !m.is_empty());
        debug!(session_id = %self.id, model = ?model, "model selected");
        self.state().model = model;
    }

    pub fn current_model(&self) -> Option<String> {
        self.state().model.clone()
    }

    /// Snapshot of the conversation so far.
    pub fn messages(&self) -> Vec<ChatMessage> {
        self.state().messages.clone()
    }

    /// Drops the in-memory history.
    pub fn clear(&self) {
        self.state().messages.clear();
    }

    /// Returns `true` while a stream is active.
    pub fn is_generating(&self) -> bool {
        self.generating.load(Ordering::SeqCst)
    }

    /// Handle that cancels the active stream, if any.
    pub fn abort_handle(&self) -> AbortHandle {
        self.abort.clone()
    }

    /// Lists the models and selects the first one when nothing is selected yet.
    pub async fn load_models(&self) -> Result<Vec<ModelInfo>, ChatError> {
        let models = self.transport.list_models().await?;
        if let Some(first) = models.first() {
            let mut state = self.state();
            if state.model.is_none() {
                state.model = Some(first.name.clone());
            }
        }
        Ok(models)
    }

    pub async fn check_connection(&self) -> ConnectionStatus {
        self.transport.check_connection().await
    }

    /// Sends one prompt and streams the answer into `renderer`.
    ///
    /// Precondition failures (blank prompt, no model, a stream already
    /// running) return `Err` before any request is made. Once a request has
    /// been attempted the result is always `Ok`; a failed stream is reported
    /// to the renderer and returned as `StreamOutcome::Failed` with the text
    /// received so far.
    pub async fn send_message<R>(
        &self,
        prompt: &str,
        renderer: &mut R,
    ) -> Result<StreamOutcome, ChatError>
    where
        R: Renderer + Send + ?Sized,
    {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(ChatError::EmptyPrompt);
        }
        let model = self.current_model().ok_or(ChatError::EmptyModelSelection)?;
        let request = StreamRequest::new(model, prompt)?;
        let _guard = GeneratingGuard::acquire(&self.generating)?;
        let mut signal = self.abort.signal();

        self.state()
            .messages
            .push(ChatMessage::new(Role::User, prompt, false));
        info!(session_id = %self.id, model = %request.model(), "sending message");

        let started = tokio::select! {
            biased;
            () = signal.triggered() => Err(StreamFailure::Cancelled),
            started = self.transport.generate(&request) => started.map_err(|e| StreamFailure::from(&e)),
        };
        let outcome = match started {
            Ok(body) => self.consumer.run(body, renderer, signal).await,
            Err(failure) => {
                debug!(session_id = %self.id, error = %failure, "stream did not start");
                renderer.on_error(&failure, "");
                StreamOutcome::Failed {
                    failure,
                    partial_text: String::new(),
                }
            }
        };

        let partial = !outcome.is_completed();
        if !(partial && outcome.text().is_empty()) {
            self.state().messages.push(ChatMessage::new(
                Role::Assistant,
                outcome.text(),
                partial,
            ));
        }
        Ok(outcome)
    }
}

/// Marks the session as generating for the guard's lifetime.
struct GeneratingGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> GeneratingGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Result<Self, ChatError> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| ChatError::ConcurrentRequestRejected)?;
        Ok(Self { flag })
    }
}

impl Drop for GeneratingGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::RecordingRenderer;
    use crate::transport::ByteStream;
    use bytes::Bytes;
    use futures::stream;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::Notify;

    enum FakeBehavior {
        Body(Vec<Result<&'static str, ChatError>>),
        StartError(ChatError),
        /// Emits one line, then waits on the gate.
        Gated(Arc<Notify>),
        /// Never answers the request.
        Stalled,
    }

    struct FakeTransport {
        models: Vec<ModelInfo>,
        behavior: FakeBehavior,
        calls: Arc<AtomicUsize>,
        last_request: Mutex<Option<StreamRequest>>,
    }

    impl FakeTransport {
        fn new(behavior: FakeBehavior) -> Self {
            Self {
                models: vec![ModelInfo::new("llama3.2", 2_000_000_000), ModelInfo::new("phi3", 1)],
                behavior,
                calls: Arc::new(AtomicUsize::new(0)),
                last_request: Mutex::new(None),
            }
        }
    }

    #[async_trait::async_trait]
    impl Transport for FakeTransport {
        async fn list_models(&self) -> Result<Vec<ModelInfo>, ChatError> {
            Ok(self.models.clone())
        }

        async fn generate(&self, request: &StreamRequest) -> Result<ByteStream, ChatError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_request.lock().expect("lock") = Some(request.clone());
            match &self.behavior {
                FakeBehavior::Body(items) => {
                    let items: Vec<Result<Bytes, ChatError>> = items
                        .iter()
                        .map(|item| item.clone().map(|text| Bytes::from_static(text.as_bytes())))
                        .collect();
                    Ok(Box::pin(stream::iter(items)))
                }
                FakeBehavior::StartError(err) => Err(err.clone()),
                FakeBehavior::Stalled => std::future::pending().await,
                FakeBehavior::Gated(gate) => {
                    let gate = gate.clone();
                    let first = stream::iter(vec![Ok::<_, ChatError>(Bytes::from_static(
                        b"{\"response\":\"wait\"}\n",
                    ))]);
                    let rest = stream::once(async move {
                        gate.notified().await;
                        Ok::<_, ChatError>(Bytes::from_static(b"{\"done\":true}\n"))
                    });
                    Ok(Box::pin(futures::StreamExt::chain(first, rest)))
                }
            }
        }
    }

    fn session_with(behavior: FakeBehavior) -> (ChatSession, Arc<AtomicUsize>) {
        let transport = FakeTransport::new(behavior);
        let calls = transport.calls.clone();
        (ChatSession::new(Arc::new(transport)), calls)
    }

    #[tokio::test]
    async fn completed_turn_records_both_messages() {
        let (session, calls) = session_with(FakeBehavior::Body(vec![
            Ok("{\"response\":\"Hi\"}\n{\"resp"),
            Ok("onse\":\" there\"}\n{\"done\":true}\n"),
        ]));
        session.select_model("llama3.2");
        let mut renderer = RecordingRenderer::new();
        let outcome = session
            .send_message("  hello  ", &mut renderer)
            .await
            .expect("send");

        assert!(outcome.is_completed());
        assert_eq!(renderer.final_text(), Some("Hi there"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let messages = session.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::User);
        assert_eq!(messages[0].content, "hello");
        assert_eq!(messages[1].role, Role::Assistant);
        assert_eq!(messages[1].content, "Hi there");
        assert!(!messages[1].partial);
        assert!(!session.is_generating());
    }

    #[tokio::test]
    async fn request_carries_selected_model_and_trimmed_prompt() {
        let transport = Arc::new(FakeTransport::new(FakeBehavior::Body(vec![])));
        let session = ChatSession::new(transport.clone());
        session.select_model("phi3");
        session
            .send_message(" why? ", &mut RecordingRenderer::new())
            .await
            .expect("send");
        let request = transport.last_request.lock().expect("lock").clone().expect("request");
        assert_eq!(request.model(), "phi3");
        assert_eq!(request.prompt(), "why?");
    }

    #[tokio::test]
    async fn blank_prompt_is_rejected_before_request() {
        let (session, calls) = session_with(FakeBehavior::Body(vec![]));
        session.select_model("llama3.2");
        let err = session
            .send_message("   ", &mut RecordingRenderer::new())
            .await
            .expect_err("blank prompt");
        assert_eq!(err, ChatError::EmptyPrompt);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(session.messages().is_empty());
    }

    #[tokio::test]
    async fn missing_model_is_rejected_before_request() {
        let (session, calls) = session_with(FakeBehavior::Body(vec![]));
        let err = session
            .send_message("hello", &mut RecordingRenderer::new())
            .await
            .expect_err("no model");
        assert_eq!(err, ChatError::EmptyModelSelection);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn start_failure_is_reported_to_renderer() {
        let (session, _) = session_with(FakeBehavior::StartError(ChatError::status(
            404,
            "model 'x' not found",
        )));
        session.select_model("x");
        let mut renderer = RecordingRenderer::new();
        let outcome = session.send_message("hi", &mut renderer).await.expect("send");
        assert_eq!(outcome.failure().and_then(StreamFailure::status_code), Some(404));
        assert_eq!(renderer.error().map(|(_, partial)| partial), Some(""));
        assert_eq!(renderer.final_count(), 0);
        assert_eq!(session.messages().len(), 1);
        assert!(!session.is_generating());
    }

    #[tokio::test]
    async fn mid_stream_failure_records_partial_answer() {
        let (session, _) = session_with(FakeBehavior::Body(vec![
            Ok("{\"response\":\"Hel\"}\n"),
            Err(ChatError::transport("connection reset")),
        ]));
        session.select_model("llama3.2");
        let mut renderer = RecordingRenderer::new();
        let outcome = session.send_message("hi", &mut renderer).await.expect("send");
        assert!(matches!(outcome.failure(), Some(StreamFailure::Transport { .. })));
        assert_eq!(renderer.error().map(|(_, partial)| partial), Some("Hel"));
        let last = session.messages().pop().expect("assistant message");
        assert_eq!(last.content, "Hel");
        assert!(last.partial);
    }

    #[tokio::test]
    async fn concurrent_send_is_rejected_and_abort_cancels() {
        let gate = Arc::new(Notify::new());
        let (session, calls) = session_with(FakeBehavior::Gated(gate.clone()));
        let session = Arc::new(session);
        session.select_model("llama3.2");

        let running = {
            let session = session.clone();
            tokio::spawn(async move {
                let mut renderer = RecordingRenderer::new();
                let outcome = session.send_message("first", &mut renderer).await;
                (outcome, renderer)
            })
        };
        while !session.is_generating() {
            tokio::task::yield_now().await;
        }

        let err = session
            .send_message("second", &mut RecordingRenderer::new())
            .await
            .expect_err("second send must be rejected");
        assert_eq!(err, ChatError::ConcurrentRequestRejected);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        session.abort_handle().abort();
        let (outcome, renderer) = running.await.expect("join");
        let outcome = outcome.expect("send");
        assert_eq!(outcome.failure(), Some(&StreamFailure::Cancelled));
        assert!(renderer.error().is_some());
        assert!(!session.is_generating());
    }

    #[tokio::test]
    async fn abort_while_waiting_for_response_cancels_start() {
        let (session, calls) = session_with(FakeBehavior::Stalled);
        let session = Arc::new(session);
        session.select_model("llama3.2");

        let running = {
            let session = session.clone();
            tokio::spawn(async move {
                let mut renderer = RecordingRenderer::new();
                let outcome = session.send_message("hi", &mut renderer).await;
                (outcome, renderer)
            })
        };
        while calls.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }

        session.abort_handle().abort();
        let (outcome, renderer) = running.await.expect("join");
        let outcome = outcome.expect("send");
        assert_eq!(outcome.failure(), Some(&StreamFailure::Cancelled));
        assert_eq!(renderer.error(), Some((&StreamFailure::Cancelled, "")));
        assert_eq!(session.messages().len(), 1);
        assert!(!session.is_generating());
    }

    #[tokio::test]
    async fn load_models_auto_selects_first() {
        let (session, _) = session_with(FakeBehavior::Body(vec![]));
        let models = session.load_models().await.expect("models");
        assert_eq!(models.len(), 2);
        assert_eq!(session.current_model().as_deref(), Some("llama3.2"));

        session.select_model("phi3");
        session.load_models().await.expect("models");
        assert_eq!(session.current_model().as_deref(), Some("phi3"));
    }

    #[tokio::test]
    async fn clear_drops_history() {
        let (session, _) = session_with(FakeBehavior::Body(vec![Ok("{\"response\":\"x\"}\n")]));
        session.select_model("llama3.2");
        session
            .send_message("hi", &mut RecordingRenderer::new())
            .await
            .expect("send");
        assert_eq!(session.messages().len(), 2);
        session.clear();
        assert!(session.messages().is_empty());
    }
}
