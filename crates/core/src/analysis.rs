//! The guarded ask-the-model-and-relay operation.
//!
//! Every analysis trigger funnels through [`Analyzer`]: user questions from
//! the transcription topic, periodic frame candidates from the video pump,
//! and canvas snapshots from the `analyzeImage` RPC. The analyzer claims
//! the single-flight permit, resolves the prompt, asks the model relay, and
//! delivers the reply back into the room. A trigger that arrives while a
//! run is in flight is dropped.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::guard::{AnalysisGuard, InFlight};
use crate::output::RoomOutput;
use crate::protocol::{TRANSCRIPTION_TOPIC, TranscriptionPacket};
use crate::relay::ModelRelay;

/// Published to the user when the model relay fails.
pub const FALLBACK_MESSAGE: &str =
    "I'm having trouble analyzing your work. Please try again.";

/// Coordinates analysis runs against the model relay.
pub struct Analyzer {
    relay: Arc<dyn ModelRelay>,
    output: Arc<dyn RoomOutput>,
    guard: AnalysisGuard,
    canvas_prompt: String,
}

impl Analyzer {
    pub fn new(
        relay: Arc<dyn ModelRelay>,
        output: Arc<dyn RoomOutput>,
        canvas_prompt: impl Into<String>,
    ) -> Self {
        Self {
            relay,
            output,
            guard: AnalysisGuard::new(),
            canvas_prompt: canvas_prompt.into(),
        }
    }

    /// Records the latest user question without triggering anything.
    ///
    /// If the question cannot be analyzed right away, it stays pending and
    /// the next frame candidate picks it up.
    pub fn note_question(&self, text: &str) {
        self.guard.note_question(text);
    }

    pub fn guard(&self) -> &AnalysisGuard {
        &self.guard
    }

    /// Runs an analysis for an explicit prompt, unless one is already in
    /// flight. Returns the reply text on success.
    pub async fn try_run(&self, prompt: &str) -> Option<String> {
        let Some(permit) = self.guard.try_acquire() else {
            info!("analysis already in progress, skipping trigger");
            return None;
        };
        // This prompt supersedes whatever question was waiting.
        self.guard.take_pending();
        self.run(permit, prompt.to_owned()).await
    }

    /// Runs an analysis for a canvas look: a pending user question if one
    /// exists, otherwise the default canvas prompt when `forced`.
    ///
    /// An unforced call with no pending question does nothing.
    pub async fn try_run_canvas(&self, forced: bool) -> Option<String> {
        let Some(permit) = self.guard.try_acquire() else {
            info!("analysis already in progress, skipping canvas trigger");
            return None;
        };
        let prompt = match self.guard.take_pending() {
            Some(question) => question,
            None if forced => self.canvas_prompt.clone(),
            None => {
                debug!("canvas candidate with no pending question, discarding");
                return None;
            }
        };
        self.run(permit, prompt).await
    }

    async fn run(&self, permit: InFlight<'_>, prompt: String) -> Option<String> {
        info!(prompt = %preview(&prompt), "generating analysis");
        let outcome = match self.relay.generate(&prompt).await {
            Ok(reply) => {
                info!(reply = %preview(&reply), "analysis complete");
                self.publish_text(&reply).await;
                if let Err(e) = self.output.speak(&reply).await {
                    warn!(error = ?e, "voice output unavailable for this reply");
                }
                Some(reply)
            }
            Err(e) => {
                error!(error = ?e, "model relay failed");
                self.publish_text(FALLBACK_MESSAGE).await;
                None
            }
        };
        drop(permit);
        outcome
    }

    async fn publish_text(&self, text: &str) {
        let packet = TranscriptionPacket {
            text: text.to_owned(),
        };
        match serde_json::to_vec(&packet) {
            Ok(payload) => {
                if let Err(e) = self.output.publish(TRANSCRIPTION_TOPIC, payload).await {
                    error!(error = ?e, "failed to publish text message");
                }
            }
            Err(e) => error!(error = ?e, "failed to encode text packet"),
        }
    }
}

fn preview(text: &str) -> String {
    text.chars().take(50).collect()
}
