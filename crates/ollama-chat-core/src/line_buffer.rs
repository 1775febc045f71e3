//! Newline framing over arbitrarily split byte chunks.
//!
//! Transport chunks do not line up with lines, JSON objects or even UTF-8
//! characters. `LineBuffer` keeps the undecoded tail of an incomplete
//! multi-byte sequence plus the unterminated text after the last newline,
//! and hands out every complete line exactly once, in arrival order.

/// Accumulates decoded text across chunks and yields complete lines.
#[derive(Debug, Default)]
pub struct LineBuffer {
    /// Bytes of a UTF-8 sequence that is not complete yet.
    undecoded: Vec<u8>,
    /// Decoded text since the last newline.
    pending: String,
    /// Prefix of `pending` already known to contain no newline.
    scanned: usize,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a chunk and returns every line it terminated, without the `\n`.
    ///
    /// Lines are returned verbatim, so a CRLF stream yields lines ending in `\r`.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        self.undecoded.extend_from_slice(chunk);
        self.decode_available();
        self.drain_lines()
    }

    /// Returns the unterminated remainder at end of stream, if any.
    ///
    /// Held bytes of an incomplete character decode to U+FFFD. The buffer is
    /// empty afterwards, so a second call returns `None`.
    pub fn flush(&mut self) -> Option<String> {
        if !self.undecoded.is_empty() {
            let tail = std::mem::take(&mut self.undecoded);
            self.pending.push_str(&String::from_utf8_lossy(&tail));
        }
        self.scanned = 0;
        if self.pending.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.pending))
        }
    }

    /// Returns `true` when nothing is buffered.
    pub fn is_empty(&self) -> bool {
        self.undecoded.is_empty() && self.pending.is_empty()
    }

    fn decode_available(&mut self) {
        let mut consumed = 0;
        loop {
            let rest = &self.undecoded[consumed..];
            match std::str::from_utf8(rest) {
                Ok(text) => {
                    self.pending.push_str(text);
                    consumed = self.undecoded.len();
                    break;
                }
                Err(err) => {
                    let valid = err.valid_up_to();
                    self.pending.push_str(&String::from_utf8_lossy(&rest[..valid]));
                    consumed += valid;
                    match err.error_len() {
                        Some(len) => {
                            self.pending.push(char::REPLACEMENT_CHARACTER);
                            consumed += len;
                        }
                        // incomplete sequence at the end; wait for the next chunk
                        None => break,
                    }
                }
            }
        }
        self.undecoded.drain(..consumed);
    }

    fn drain_lines(&mut self) -> Vec<String> {
        let mut lines = Vec::new();
        let mut start = 0;
        let mut search_from = self.scanned;
        while let Some(offset) = self.pending[search_from..].find('\n') {
            let end = search_from + offset;
            lines.push(self.pending[start..end].to_string());
            start = end + 1;
            search_from = start;
        }
        self.pending.drain(..start);
        self.scanned = self.pending.len();
        lines
    }
}
