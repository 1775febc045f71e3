//! Decoding of single NDJSON lines from the generate endpoint.
//!
//! Each line of the response body is one JSON object:
//! ```text
//! {"model":"llama3.2","response":"Hel","done":false}
//! {"model":"llama3.2","response":"lo","done":false}
//! {"model":"llama3.2","response":"","done":true,"done_reason":"stop","eval_count":2}
//! ```

use tracing::debug;

/// One decoded line of the streamed body. Unknown fields are ignored.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ResponseFragment {
    /// Text delta to append.
    #[serde(default)]
    pub response: Option<String>,
    /// Stream termination marker.
    #[serde(default)]
    pub done: Option<bool>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub done_reason: Option<String>,
    /// Number of generated tokens (final fragment only).
    #[serde(default)]
    pub eval_count: Option<u64>,
    /// Number of prompt tokens (final fragment only).
    #[serde(default)]
    pub prompt_eval_count: Option<u64>,
    /// Total generation time in nanoseconds (final fragment only).
    #[serde(default)]
    pub total_duration: Option<u64>,
}

impl ResponseFragment {
    /// Returns `true` when the fragment carries `done: true`.
    pub fn is_done(&self) -> bool {
        self.done.unwrap_or(false)
    }

    /// Returns the statistics carried by a terminating fragment.
    pub fn stats(&self) -> Option<GenerationStats> {
        if !self.is_done() {
            return None;
        }
        Some(GenerationStats {
            model: self.model.clone(),
            done_reason: self.done_reason.clone(),
            eval_count: self.eval_count,
            prompt_eval_count: self.prompt_eval_count,
            total_duration: self.total_duration,
        })
    }
}

/// Statistics reported by the server on the `done` fragment.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct GenerationStats {
    pub model: Option<String>,
    pub done_reason: Option<String>,
    pub eval_count: Option<u64>,
    pub prompt_eval_count: Option<u64>,
    pub total_duration: Option<u64>,
}

/// Result of decoding one line.
///
/// Malformed lines are an expected, recoverable condition (a split can hand
/// over a partial object), so they are `Skip` rather than an error.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FragmentDecode {
    Fragment(ResponseFragment),
    Skip,
}

/// Parses a line as a [`ResponseFragment`], or reports `Skip`.
pub fn decode_fragment(line: &str) -> FragmentDecode {
    // serde would also accept a JSON array for a struct; only objects are fragments
    if !line.trim_start().starts_with('{') {
        debug!(line_len = line.len(), "skipping non-object stream line");
        return FragmentDecode::Skip;
    }
    match serde_json::from_str::<ResponseFragment>(line) {
        Ok(fragment) => FragmentDecode::Fragment(fragment),
        Err(e) => {
            debug!(error = %e, line_len = line.len(), "skipping malformed stream line");
            FragmentDecode::Skip
        }
    }
}
