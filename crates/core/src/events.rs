//! The agent's event surface and dispatch.
//!
//! Room callbacks are funneled into one finite event set and handled by a
//! single `match`. A malformed payload is logged and dropped; the agent
//! keeps running.

use std::sync::Arc;

use tokio::sync::{oneshot, watch};
use tracing::{debug, info, warn};

use crate::analysis::Analyzer;
use crate::protocol::{self, AnalyzeImageReply, TRANSCRIPTION_TOPIC, TranscriptionPacket};

/// Everything the room can ask the agent to react to.
#[derive(Debug)]
pub enum AgentEvent {
    /// A packet arrived on a data topic.
    Data { topic: String, payload: Vec<u8> },
    /// The `analyzeImage` RPC was invoked; `reply` carries the JSON
    /// response body back to the caller.
    AnalyzeImage {
        request: String,
        reply: oneshot::Sender<String>,
    },
    /// The set of active speakers changed.
    SpeakingChanged { speaking: bool },
}

/// Dispatches [`AgentEvent`]s to the analyzer and the sampling state.
pub struct EventRouter {
    analyzer: Arc<Analyzer>,
    speaking_tx: watch::Sender<bool>,
}

impl EventRouter {
    /// Builds a router and the speaking-state receiver the frame pump
    /// watches.
    pub fn new(analyzer: Arc<Analyzer>) -> (Self, watch::Receiver<bool>) {
        let (speaking_tx, speaking_rx) = watch::channel(false);
        (
            Self {
                analyzer,
                speaking_tx,
            },
            speaking_rx,
        )
    }

    pub async fn handle(&self, event: AgentEvent) {
        match event {
            AgentEvent::Data { topic, payload } => self.on_data(&topic, &payload).await,
            AgentEvent::AnalyzeImage { request, reply } => {
                let response = self.on_analyze_image(&request).await;
                if reply.send(response).is_err() {
                    warn!("rpc caller went away before the reply was ready");
                }
            }
            AgentEvent::SpeakingChanged { speaking } => {
                debug!(speaking, "speaking state changed");
                self.speaking_tx.send_replace(speaking);
            }
        }
    }

    async fn on_data(&self, topic: &str, payload: &[u8]) {
        if topic != TRANSCRIPTION_TOPIC {
            debug!(topic, "ignoring data packet on unrelated topic");
            return;
        }
        match serde_json::from_slice::<TranscriptionPacket>(payload) {
            Ok(packet) => {
                info!(text = %packet.text, "received transcription");
                // Keep the question around in case this trigger is dropped;
                // the next frame candidate will pick it up.
                self.analyzer.note_question(&packet.text);
                self.analyzer.try_run(&packet.text).await;
            }
            Err(e) => warn!(error = ?e, "dropping malformed transcription packet"),
        }
    }

    async fn on_analyze_image(&self, request: &str) -> String {
        match protocol::parse_analyze_image(request) {
            Ok(image) => {
                debug!(bytes = image.len(), "decoded canvas snapshot");
                self.analyzer.try_run_canvas(true).await;
                AnalyzeImageReply::success("Image analysis complete").into_json()
            }
            Err(e) => {
                warn!(error = ?e, "rejecting analyzeImage request");
                AnalyzeImageReply::failure(e.to_string()).into_json()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::MockRoomOutput;
    use crate::relay::MockModelRelay;

    const CANVAS_PROMPT: &str = "Please analyze what I've written on the canvas.";

    fn quiet_output() -> MockRoomOutput {
        let mut output = MockRoomOutput::new();
        output.expect_publish().returning(|_, _| Ok(()));
        output.expect_speak().returning(|_| Ok(()));
        output
    }

    fn router_with(relay: MockModelRelay) -> (EventRouter, watch::Receiver<bool>) {
        let analyzer = Arc::new(Analyzer::new(
            Arc::new(relay),
            Arc::new(quiet_output()),
            CANVAS_PROMPT,
        ));
        EventRouter::new(analyzer)
    }

    #[tokio::test]
    async fn transcription_packet_triggers_analysis_with_its_text() {
        let mut relay = MockModelRelay::new();
        relay
            .expect_generate()
            .withf(|prompt| prompt == "what next?")
            .times(1)
            .returning(|_| Ok("keep going".to_owned()));

        let (router, _speaking) = router_with(relay);
        router
            .handle(AgentEvent::Data {
                topic: TRANSCRIPTION_TOPIC.to_owned(),
                payload: br#"{"text":"what next?"}"#.to_vec(),
            })
            .await;
    }

    #[tokio::test]
    async fn malformed_transcription_payload_is_dropped() {
        // The relay must never be called for garbage input.
        let (router, _speaking) = router_with(MockModelRelay::new());
        router
            .handle(AgentEvent::Data {
                topic: TRANSCRIPTION_TOPIC.to_owned(),
                payload: b"not json at all".to_vec(),
            })
            .await;
    }

    #[tokio::test]
    async fn data_on_other_topics_is_ignored() {
        let (router, _speaking) = router_with(MockModelRelay::new());
        router
            .handle(AgentEvent::Data {
                topic: "chat".to_owned(),
                payload: br#"{"text":"hello"}"#.to_vec(),
            })
            .await;
    }

    #[tokio::test]
    async fn analyze_image_without_payload_replies_with_an_error() {
        let (router, _speaking) = router_with(MockModelRelay::new());
        let (reply_tx, reply_rx) = oneshot::channel();

        router
            .handle(AgentEvent::AnalyzeImage {
                request: "{}".to_owned(),
                reply: reply_tx,
            })
            .await;

        let response = reply_rx.await.expect("reply sent");
        assert!(response.contains("error"));
        assert!(response.contains("No image data provided"));
    }

    #[tokio::test]
    async fn analyze_image_with_payload_uses_the_canvas_prompt() {
        let mut relay = MockModelRelay::new();
        relay
            .expect_generate()
            .withf(|prompt| prompt == CANVAS_PROMPT)
            .times(1)
            .returning(|_| Ok("I see a parabola.".to_owned()));

        let (router, _speaking) = router_with(relay);
        let (reply_tx, reply_rx) = oneshot::channel();

        router
            .handle(AgentEvent::AnalyzeImage {
                request: r#"{"imageData":"data:image/png;base64,aGVsbG8="}"#.to_owned(),
                reply: reply_tx,
            })
            .await;

        let response = reply_rx.await.expect("reply sent");
        assert_eq!(
            response,
            r#"{"status":"success","message":"Image analysis complete"}"#
        );
    }

    #[tokio::test]
    async fn pending_question_wins_over_the_canvas_prompt() {
        let mut relay = MockModelRelay::new();
        relay
            .expect_generate()
            .withf(|prompt| prompt == "is this right?")
            .times(1)
            .returning(|_| Ok("almost".to_owned()));

        let analyzer = Arc::new(Analyzer::new(
            Arc::new(relay),
            Arc::new(quiet_output()),
            CANVAS_PROMPT,
        ));
        analyzer.note_question("is this right?");
        let (router, _speaking) = EventRouter::new(analyzer);

        let (reply_tx, _reply_rx) = oneshot::channel();
        router
            .handle(AgentEvent::AnalyzeImage {
                request: r#"{"imageData":"aGVsbG8="}"#.to_owned(),
                reply: reply_tx,
            })
            .await;
    }

    #[tokio::test]
    async fn speaking_changes_reach_the_watch_channel() {
        let (router, speaking) = router_with(MockModelRelay::new());
        assert!(!*speaking.borrow());

        router
            .handle(AgentEvent::SpeakingChanged { speaking: true })
            .await;
        assert!(*speaking.borrow());

        router
            .handle(AgentEvent::SpeakingChanged { speaking: false })
            .await;
        assert!(!*speaking.borrow());
    }
}
