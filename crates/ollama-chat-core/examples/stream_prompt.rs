use std::io::Write as _;
use std::sync::Arc;

use ollama_chat_core::prelude::*;

/// Prints deltas as they arrive by tracking how much was already written.
struct StdoutRenderer {
    printed: usize,
}

impl Renderer for StdoutRenderer {
    fn on_update(&mut self, full_text: &str, is_final: bool) {
        if let Some(delta) = full_text.get(self.printed..) {
            print!("{delta}");
            let _ = std::io::stdout().flush();
        }
        self.printed = full_text.len();
        if is_final {
            println!();
        }
    }

    fn on_error(&mut self, failure: &StreamFailure, _partial_text: &str) {
        eprintln!("\nstream error: {failure}");
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), ChatError> {
    ollama_chat_core::init_observability("warn");
    let session = ChatSession::new(Arc::new(HttpTransport::from_env()?));
    session.load_models().await?;

    let outcome = session
        .send_message("Stream a short greeting.", &mut StdoutRenderer { printed: 0 })
        .await?;
    if let StreamOutcome::Completed { stats: Some(stats), .. } = outcome {
        eprintln!("generated {:?} tokens", stats.eval_count);
    }
    Ok(())
}
