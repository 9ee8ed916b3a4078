//! Voice output: synthesized speech pushed into a published audio track.
//!
//! Replies are synthesized as raw PCM16 at the track's sample rate, so the
//! bytes go straight from the speech endpoint into audio frames with no
//! resampling. Voice is a side feature; any failure here is reported as a
//! warning by the caller and the session carries on text-only.

use anyhow::{Context, Result};
use async_openai::{
    Client,
    config::OpenAIConfig,
    types::{CreateSpeechRequestArgs, SpeechModel, SpeechResponseFormat, Voice},
};
use livekit::options::TrackPublishOptions;
use livekit::prelude::{LocalAudioTrack, LocalTrack, Room, TrackSource};
use livekit::webrtc::audio_frame::AudioFrame;
use livekit::webrtc::audio_source::{AudioSourceOptions, RtcAudioSource, native::NativeAudioSource};
use tracing::info;

use crate::config::Config;

const SAMPLE_RATE: u32 = 24_000;
const NUM_CHANNELS: u32 = 1;
/// 10 ms of mono audio at 24 kHz.
const FRAME_SAMPLES: usize = 240;
/// Capture queue depth in milliseconds.
const QUEUE_MS: u32 = 1000;

/// Synthesizes agent speech into a room audio track.
pub struct SpeechSynthesizer {
    client: Client<OpenAIConfig>,
    source: NativeAudioSource,
}

impl SpeechSynthesizer {
    /// Creates the synthesizer and publishes its audio track to the room.
    pub async fn publish(room: &Room, config: &Config) -> Result<Self> {
        let api_key = config
            .openai_api_key
            .as_ref()
            .context("OPENAI_API_KEY is required for voice output")?;
        let openai_config = OpenAIConfig::new().with_api_key(api_key);

        let source = NativeAudioSource::new(
            AudioSourceOptions::default(),
            SAMPLE_RATE,
            NUM_CHANNELS,
            QUEUE_MS,
        );
        let track =
            LocalAudioTrack::create_audio_track("agent-voice", RtcAudioSource::Native(source.clone()));
        room.local_participant()
            .publish_track(
                LocalTrack::Audio(track),
                TrackPublishOptions {
                    source: TrackSource::Microphone,
                    ..Default::default()
                },
            )
            .await
            .context("failed to publish the voice track")?;
        info!("voice track published");

        Ok(Self {
            client: Client::with_config(openai_config),
            source,
        })
    }

    /// Synthesizes `text` and streams the audio into the published track.
    pub async fn say(&self, text: &str) -> Result<()> {
        let request = CreateSpeechRequestArgs::default()
            .model(SpeechModel::Tts1)
            .voice(Voice::Alloy)
            .input(text)
            .response_format(SpeechResponseFormat::Pcm)
            .build()?;
        let audio = self
            .client
            .audio()
            .speech(request)
            .await
            .context("speech synthesis failed")?;

        let samples: Vec<i16> = audio
            .bytes
            .chunks_exact(2)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
            .collect();

        for chunk in samples.chunks(FRAME_SAMPLES) {
            let frame = AudioFrame {
                data: chunk.to_vec().into(),
                sample_rate: SAMPLE_RATE,
                num_channels: NUM_CHANNELS,
                samples_per_channel: chunk.len() as u32,
            };
            self.source
                .capture_frame(&frame)
                .await
                .context("failed to push an audio frame")?;
        }
        Ok(())
    }
}
