//! Room-backed implementation of the agent's delivery surface.

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use livekit::prelude::{DataPacket, Room};
use tracing::debug;

use tutor_core::RoomOutput;

use crate::speech::SpeechSynthesizer;

/// Publishes data packets and speech through a connected room.
pub struct LiveKitOutput {
    room: Arc<Room>,
    speech: Option<Arc<SpeechSynthesizer>>,
}

impl LiveKitOutput {
    pub fn new(room: Arc<Room>, speech: Option<Arc<SpeechSynthesizer>>) -> Self {
        Self { room, speech }
    }
}

#[async_trait]
impl RoomOutput for LiveKitOutput {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<()> {
        self.room
            .local_participant()
            .publish_data(DataPacket {
                payload,
                topic: Some(topic.to_owned()),
                reliable: true,
                ..Default::default()
            })
            .await
            .context("failed to publish a data packet")
    }

    async fn speak(&self, text: &str) -> Result<()> {
        match &self.speech {
            Some(speech) => speech.say(text).await,
            None => {
                debug!("voice output disabled, skipping speech");
                Ok(())
            }
        }
    }
}
