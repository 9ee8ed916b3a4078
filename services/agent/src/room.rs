//! Room gateway: connects, waits for a participant, and drives the agent.
//!
//! All room SDK plumbing lives here. Incoming room callbacks are translated
//! into the agent's event set and dispatched in one loop; each subscribed
//! video track gets its own frame pump that feeds the sampler.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow};
use futures::StreamExt;
use livekit::prelude::{RemoteTrack, RemoteVideoTrack, Room, RoomEvent, RoomOptions};
use livekit::rpc::RpcError;
use livekit::webrtc::video_stream::native::NativeVideoStream;
use livekit_api::access_token::{AccessToken, VideoGrants};
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, error, info, warn};

use tutor_core::protocol::{ANALYZE_IMAGE_METHOD, TRANSCRIPTION_TOPIC, AnalyzeImageReply,
    TranscriptionPacket};
use tutor_core::{AgentEvent, Analyzer, EventRouter, FrameDecision, FrameSampler, ModelRelay,
    SamplerConfig};

use crate::config::Config;
use crate::output::LiveKitOutput;
use crate::speech::SpeechSynthesizer;

/// Connects to the room and runs the agent until the room goes away.
pub async fn run(config: Arc<Config>, relay: Arc<dyn ModelRelay>) -> Result<()> {
    let token = mint_token(&config)?;

    info!(url = %config.livekit_url, room = %config.room_name, "connecting to room service");
    let (room, mut room_events) =
        Room::connect(&config.livekit_url, &token, RoomOptions::default())
            .await
            .context("failed to connect to the room service")?;
    let room = Arc::new(room);
    info!(room = %room.name(), "connected");

    // The front-end recognizes agents by participant metadata; the SDK
    // surface used here has no local metadata update, so go without it.
    warn!("participant metadata update unsupported, continuing without the agent marker");

    let speech = match SpeechSynthesizer::publish(&room, &config).await {
        Ok(speech) => Some(Arc::new(speech)),
        Err(e) => {
            warn!(error = ?e, "voice output unavailable, continuing text-only");
            None
        }
    };

    let output = Arc::new(LiveKitOutput::new(Arc::clone(&room), speech));
    let analyzer = Arc::new(Analyzer::new(
        relay,
        output.clone(),
        config.persona.canvas_prompt(),
    ));
    let (router, speaking_rx) = EventRouter::new(Arc::clone(&analyzer));
    let (agent_tx, mut agent_rx) = mpsc::channel::<AgentEvent>(32);

    if room.remote_participants().is_empty() {
        info!("waiting for a participant to join");
        loop {
            match room_events.recv().await {
                Some(RoomEvent::ParticipantConnected(participant)) => {
                    info!(identity = ?participant.identity(), "participant joined");
                    break;
                }
                Some(RoomEvent::Disconnected { reason }) => {
                    return Err(anyhow!(
                        "room disconnected while waiting for a participant: {reason:?}"
                    ));
                }
                Some(_) => {}
                None => return Err(anyhow!("room event stream closed during startup")),
            }
        }
    }

    register_analyze_image(&room, agent_tx.clone());
    send_greeting(&output, &config).await;

    let local_identity = room.local_participant().identity();
    let mut heartbeat = tokio::time::interval(Duration::from_secs(60));
    // The first tick fires immediately; swallow it so the heartbeat starts
    // one interval from now.
    heartbeat.tick().await;

    loop {
        tokio::select! {
            event = room_events.recv() => {
                let Some(event) = event else {
                    info!("room event stream closed");
                    break;
                };
                match event {
                    RoomEvent::TrackSubscribed { track, participant, .. } => match track {
                        RemoteTrack::Video(video) => {
                            info!(sid = ?video.sid(), identity = ?participant.identity(), "subscribed to video track");
                            tokio::spawn(pump_video_track(
                                video,
                                config.sampler,
                                Arc::clone(&analyzer),
                                speaking_rx.clone(),
                            ));
                        }
                        RemoteTrack::Audio(audio) => {
                            info!(sid = ?audio.sid(), "subscribed to audio track");
                        }
                    },
                    RoomEvent::TrackUnsubscribed { track, .. } => {
                        info!(sid = ?track.sid(), "track unsubscribed");
                    }
                    RoomEvent::DataReceived { payload, topic, .. } => {
                        router
                            .handle(AgentEvent::Data {
                                topic: topic.unwrap_or_default(),
                                payload: payload.to_vec(),
                            })
                            .await;
                    }
                    RoomEvent::ActiveSpeakersChanged { speakers } => {
                        let speaking = speakers
                            .iter()
                            .any(|participant| participant.identity() != local_identity);
                        router.handle(AgentEvent::SpeakingChanged { speaking }).await;
                    }
                    RoomEvent::ParticipantConnected(participant) => {
                        info!(identity = ?participant.identity(), "participant joined");
                    }
                    RoomEvent::ParticipantDisconnected(participant) => {
                        info!(identity = ?participant.identity(), "participant left");
                    }
                    RoomEvent::Disconnected { reason } => {
                        info!(?reason, "room disconnected");
                        break;
                    }
                    _ => {}
                }
            },
            Some(event) = agent_rx.recv() => router.handle(event).await,
            _ = heartbeat.tick() => info!("agent heartbeat, still running"),
        }
    }

    info!("agent session finished");
    Ok(())
}

fn mint_token(config: &Config) -> Result<String> {
    AccessToken::with_api_key(&config.livekit_api_key, &config.livekit_api_secret)
        .with_identity(&config.agent_identity)
        .with_name("Tutor Agent")
        .with_grants(VideoGrants {
            room_join: true,
            room: config.room_name.clone(),
            ..Default::default()
        })
        .to_jwt()
        .context("failed to mint a room access token")
}

/// Bridges the `analyzeImage` RPC into the agent's event channel.
///
/// The handler completes only after the analysis decision is made, so the
/// remote caller gets the real outcome in its response body.
fn register_analyze_image(room: &Room, agent_tx: mpsc::Sender<AgentEvent>) {
    room.local_participant().register_rpc_method(
        ANALYZE_IMAGE_METHOD.to_owned(),
        move |invocation| {
            let agent_tx = agent_tx.clone();
            Box::pin(async move {
                let (reply_tx, reply_rx) = oneshot::channel();
                let event = AgentEvent::AnalyzeImage {
                    request: invocation.payload,
                    reply: reply_tx,
                };
                if agent_tx.send(event).await.is_err() {
                    return Ok::<_, RpcError>(
                        AnalyzeImageReply::failure("agent is shutting down").into_json(),
                    );
                }
                match reply_rx.await {
                    Ok(response) => Ok(response),
                    Err(_) => {
                        Ok(AnalyzeImageReply::failure("analysis was interrupted").into_json())
                    }
                }
            })
        },
    );
}

async fn send_greeting(output: &LiveKitOutput, config: &Config) {
    use tutor_core::RoomOutput as _;

    let greeting = config.persona.greeting();
    let packet = TranscriptionPacket {
        text: greeting.to_owned(),
    };
    match serde_json::to_vec(&packet) {
        Ok(payload) => {
            if let Err(e) = output.publish(TRANSCRIPTION_TOPIC, payload).await {
                error!(error = ?e, "failed to publish the greeting");
            }
        }
        Err(e) => error!(error = ?e, "failed to encode the greeting"),
    }
    if let Err(e) = output.speak(greeting).await {
        warn!(error = ?e, "greeting not spoken");
    }
}

/// Consumes one video track, sampling frames and raising analysis
/// candidates. Ends when the underlying stream closes.
async fn pump_video_track(
    track: RemoteVideoTrack,
    config: SamplerConfig,
    analyzer: Arc<Analyzer>,
    speaking_rx: watch::Receiver<bool>,
) {
    let mut frames = NativeVideoStream::new(track.rtc_track());
    let mut sampler = FrameSampler::new(config);

    while let Some(_frame) = frames.next().await {
        sampler.set_speaking(*speaking_rx.borrow());
        match sampler.observe(Instant::now()) {
            FrameDecision::Discard | FrameDecision::Accepted => {}
            FrameDecision::Candidate { forced } => {
                debug!(frame = sampler.frame_count(), forced, "video frame candidate");
                analyzer.try_run_canvas(forced).await;
            }
        }
    }
    info!(sid = ?track.sid(), "video stream closed");
}
