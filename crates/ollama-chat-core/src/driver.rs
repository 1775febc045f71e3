use std::fmt::Display;
use std::sync::Arc;

use futures::{Stream, StreamExt as _};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::errors::StreamFailure;
use crate::fragment::{FragmentDecode, GenerationStats, decode_fragment};
use crate::line_buffer::LineBuffer;
use crate::renderer::Renderer;

/// Handle used to request cancellation of an in-flight stream.
#[derive(Clone, Debug)]
pub struct AbortHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl AbortHandle {
    /// Creates a handle with no stream attached yet.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Requests cancellation.
    ///
    /// The active run ends with `StreamFailure::Cancelled` and keeps the text
    /// accumulated so far.
    pub fn abort(&self) {
        self.tx.send_replace(true);
    }

    /// Returns `true` once `abort` was called for the current signal.
    pub fn is_aborted(&self) -> bool {
        *self.tx.borrow()
    }

    /// Clears any earlier abort request and returns a fresh signal for the next run.
    pub fn signal(&self) -> AbortSignal {
        self.tx.send_replace(false);
        AbortSignal {
            rx: Some(self.tx.subscribe()),
        }
    }
}

impl Default for AbortHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// Receiving side of an [`AbortHandle`], consumed by one run.
#[derive(Debug)]
pub struct AbortSignal {
    rx: Option<watch::Receiver<bool>>,
}

impl AbortSignal {
    /// A signal that never fires.
    pub fn never() -> Self {
        Self { rx: None }
    }

    pub(crate) async fn triggered(&mut self) {
        loop {
            let Some(rx) = self.rx.as_mut() else {
                return std::future::pending().await;
            };
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                // every handle is gone, nobody can abort anymore
                self.rx = None;
            }
        }
    }
}

/// Creates a connected handle/signal pair for a single run.
pub fn abort_pair() -> (AbortHandle, AbortSignal) {
    let handle = AbortHandle::new();
    let signal = handle.signal();
    (handle, signal)
}

/// Lifecycle of one consumer run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamPhase {
    Idle,
    Streaming,
    Completed,
    Failed,
}

/// Terminal state of one run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StreamOutcome {
    /// The body ended or a `done` fragment arrived.
    Completed {
        text: String,
        stats: Option<GenerationStats>,
    },
    /// The transport failed or the run was cancelled; `partial_text` holds
    /// everything accumulated before that.
    Failed {
        failure: StreamFailure,
        partial_text: String,
    },
}

impl StreamOutcome {
    /// Accumulated text, complete or partial.
    pub fn text(&self) -> &str {
        match self {
            Self::Completed { text, .. } => text,
            Self::Failed { partial_text, .. } => partial_text,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }

    pub fn failure(&self) -> Option<&StreamFailure> {
        match self {
            Self::Completed { .. } => None,
            Self::Failed { failure, .. } => Some(failure),
        }
    }

    pub fn phase(&self) -> StreamPhase {
        match self {
            Self::Completed { .. } => StreamPhase::Completed,
            Self::Failed { .. } => StreamPhase::Failed,
        }
    }
}

/// Consumes a newline-delimited JSON response body and drives a [`Renderer`].
///
/// Every call to [`StreamConsumer::run`] owns its own line buffer and
/// accumulated text. Only one run may be active per conversation; the caller
/// must refuse to start another one while a run is in progress
/// (`ChatSession` does).
#[derive(Clone, Debug, Default)]
pub struct StreamConsumer {
    max_consecutive_skips: Option<usize>,
}

impl StreamConsumer {
    /// Creates a consumer that skips malformed lines without limit.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails the run once more than `limit` malformed lines arrive in a row.
    pub fn max_consecutive_skips(mut self, limit: usize) -> Self {
        self.max_consecutive_skips = Some(limit);
        self
    }

    pub fn skip_limit(&self) -> Option<usize> {
        self.max_consecutive_skips
    }

    /// Reads `body` to the end (or to a `done` fragment) and returns the outcome.
    ///
    /// The renderer receives one non-final update per appended delta, then
    /// either one final update or one error. The body is dropped before this
    /// returns on every path, releasing the underlying connection. No timeout
    /// is applied: a body that never ends keeps the run pending.
    pub async fn run<S, B, E, R>(
        &self,
        body: S,
        renderer: &mut R,
        mut abort: AbortSignal,
    ) -> StreamOutcome
    where
        S: Stream<Item = Result<B, E>>,
        B: AsRef<[u8]>,
        E: Display,
        R: Renderer + ?Sized,
    {
        let mut body = std::pin::pin!(body);
        let mut state = ConsumerState::new(self.max_consecutive_skips);
        state.enter(StreamPhase::Streaming);

        loop {
            tokio::select! {
                biased;
                () = abort.triggered() => {
                    return state.fail(StreamFailure::Cancelled, renderer);
                }
                next = body.next() => match next {
                    Some(Ok(chunk)) => match state.consume_chunk(chunk.as_ref(), renderer) {
                        Step::Continue => {}
                        Step::Done => break,
                        Step::Fail(failure) => return state.fail(failure, renderer),
                    },
                    Some(Err(e)) => {
                        let failure = StreamFailure::transport(format!("stream read failed: {e}"));
                        return state.fail(failure, renderer);
                    }
                    None => {
                        debug!("transport signalled end of body");
                        break;
                    }
                }
            }
        }

        state.complete(renderer)
    }
}

enum Step {
    Continue,
    Done,
    Fail(StreamFailure),
}

struct ConsumerState {
    phase: StreamPhase,
    buffer: LineBuffer,
    text: String,
    stats: Option<GenerationStats>,
    skip_limit: Option<usize>,
    consecutive_skips: usize,
    updates: u64,
}

impl ConsumerState {
    fn new(skip_limit: Option<usize>) -> Self {
        Self {
            phase: StreamPhase::Idle,
            buffer: LineBuffer::new(),
            text: String::new(),
            stats: None,
            skip_limit,
            consecutive_skips: 0,
            updates: 0,
        }
    }

    fn enter(&mut self, next: StreamPhase) {
        debug!(from = ?self.phase, to = ?next, "stream phase transition");
        self.phase = next;
    }

    /// Folds every line the chunk completed. A `done` fragment does not cut
    /// the chunk short; it only stops further reads from the body.
    fn consume_chunk<R: Renderer + ?Sized>(&mut self, chunk: &[u8], renderer: &mut R) -> Step {
        let mut done = false;
        for line in self.buffer.feed(chunk) {
            match self.fold_line(&line, renderer) {
                Step::Continue => {}
                Step::Done => done = true,
                fail @ Step::Fail(_) => return fail,
            }
        }
        if done { Step::Done } else { Step::Continue }
    }

    fn fold_line<R: Renderer + ?Sized>(&mut self, line: &str, renderer: &mut R) -> Step {
        if line.trim().is_empty() {
            return Step::Continue;
        }
        match decode_fragment(line) {
            FragmentDecode::Skip => {
                self.consecutive_skips += 1;
                if let Some(limit) = self.skip_limit
                    && self.consecutive_skips > limit
                {
                    return Step::Fail(StreamFailure::transport(format!(
                        "{} consecutive malformed stream lines",
                        self.consecutive_skips
                    )));
                }
                Step::Continue
            }
            FragmentDecode::Fragment(fragment) => {
                self.consecutive_skips = 0;
                if let Some(delta) = fragment.response.as_deref()
                    && !delta.is_empty()
                {
                    self.text.push_str(delta);
                    self.updates = self.updates.saturating_add(1);
                    renderer.on_update(&self.text, false);
                }
                if fragment.is_done() {
                    self.stats = fragment.stats();
                    return Step::Done;
                }
                Step::Continue
            }
        }
    }

    fn complete<R: Renderer + ?Sized>(mut self, renderer: &mut R) -> StreamOutcome {
        if let Some(line) = self.buffer.flush()
            && let Step::Fail(failure) = self.fold_line(&line, renderer)
        {
            return self.fail(failure, renderer);
        }
        self.enter(StreamPhase::Completed);
        info!(
            chars = self.text.len(),
            updates = self.updates,
            "stream completed"
        );
        renderer.on_update(&self.text, true);
        StreamOutcome::Completed {
            text: self.text,
            stats: self.stats,
        }
    }

    fn fail<R: Renderer + ?Sized>(mut self, failure: StreamFailure, renderer: &mut R) -> StreamOutcome {
        self.enter(StreamPhase::Failed);
        warn!(error = %failure, partial_chars = self.text.len(), "stream failed");
        renderer.on_error(&failure, &self.text);
        StreamOutcome::Failed {
            failure,
            partial_text: self.text,
        }
    }
}
