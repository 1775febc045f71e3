use crate::errors::StreamFailure;

/// Receiver of stream updates, implemented by whatever displays the conversation.
///
/// Updates always carry the full accumulated text, never only the delta, so a
/// renderer can redraw from scratch on every call.
pub trait Renderer {
    /// Called for every appended delta (`is_final == false`) and exactly once
    /// with `is_final == true` when the stream completes. Expensive formatting
    /// belongs to the final call only.
    fn on_update(&mut self, full_text: &str, is_final: bool);

    /// Called instead of the final update when the stream fails.
    fn on_error(&mut self, failure: &StreamFailure, partial_text: &str);
}

impl<R: Renderer + ?Sized> Renderer for &mut R {
    fn on_update(&mut self, full_text: &str, is_final: bool) {
        (**self).on_update(full_text, is_final);
    }

    fn on_error(&mut self, failure: &StreamFailure, partial_text: &str) {
        (**self).on_error(failure, partial_text);
    }
}

/// Event captured by [`RecordingRenderer`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RenderEvent {
    Update { text: String, is_final: bool },
    Error { failure: StreamFailure, partial_text: String },
}

/// Renderer that records every call, for headless callers and tests.
#[derive(Clone, Debug, Default)]
pub struct RecordingRenderer {
    pub events: Vec<RenderEvent>,
}

impl RecordingRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Full texts of the non-final updates, in order.
    pub fn incremental_texts(&self) -> Vec<&str> {
        self.events
            .iter()
            .filter_map(|event| match event {
                RenderEvent::Update {
                    text,
                    is_final: false,
                } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Text of the final update, if one was delivered.
    pub fn final_text(&self) -> Option<&str> {
        self.events.iter().find_map(|event| match event {
            RenderEvent::Update {
                text,
                is_final: true,
            } => Some(text.as_str()),
            _ => None,
        })
    }

    /// Number of final updates delivered.
    pub fn final_count(&self) -> usize {
        self.events
            .iter()
            .filter(|event| matches!(event, RenderEvent::Update { is_final: true, .. }))
            .count()
    }

    /// The error delivered, if any.
    pub fn error(&self) -> Option<(&StreamFailure, &str)> {
        self.events.iter().find_map(|event| match event {
            RenderEvent::Error {
                failure,
                partial_text,
            } => Some((failure, partial_text.as_str())),
            _ => None,
        })
    }
}

impl Renderer for RecordingRenderer {
    fn on_update(&mut self, full_text: &str, is_final: bool) {
        self.events.push(RenderEvent::Update {
            text: full_text.to_string(),
            is_final,
        });
    }

    fn on_error(&mut self, failure: &StreamFailure, partial_text: &str) {
        self.events.push(RenderEvent::Error {
            failure: failure.clone(),
            partial_text: partial_text.to_string(),
        });
    }
}
