//! Wire formats exchanged with the room's data channel and RPC surface.
//!
//! Everything on the wire is UTF-8 JSON: text packets published on the
//! transcription topic, and the request/response bodies of the
//! `analyzeImage` RPC method.

use anyhow::{Context, Result};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};

/// Topic carrying user questions in and agent replies out.
pub const TRANSCRIPTION_TOPIC: &str = "transcription";

/// Name of the RPC method the front-end invokes with a canvas snapshot.
pub const ANALYZE_IMAGE_METHOD: &str = "analyzeImage";

/// A text message on the transcription topic, in either direction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TranscriptionPacket {
    pub text: String,
}

/// Body of an `analyzeImage` RPC request.
#[derive(Debug, Deserialize)]
pub struct AnalyzeImageRequest {
    /// Canvas snapshot as a data URI or raw base64.
    #[serde(rename = "imageData")]
    pub image_data: Option<String>,
}

/// Body of an `analyzeImage` RPC response.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum AnalyzeImageReply {
    Done { status: String, message: String },
    Failed { error: String },
}

impl AnalyzeImageReply {
    pub fn success(message: impl Into<String>) -> Self {
        Self::Done {
            status: "success".to_owned(),
            message: message.into(),
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self::Failed {
            error: error.into(),
        }
    }

    /// Serializes the reply for the RPC transport.
    pub fn into_json(self) -> String {
        serde_json::to_string(&self)
            .unwrap_or_else(|_| r#"{"error":"internal serialization failure"}"#.to_owned())
    }
}

/// Parses an `analyzeImage` request body and decodes its image payload.
pub fn parse_analyze_image(request: &str) -> Result<Vec<u8>> {
    let request: AnalyzeImageRequest =
        serde_json::from_str(request).context("malformed analyzeImage request body")?;
    let data = request.image_data.context("No image data provided")?;
    decode_image_payload(&data)
}

/// Decodes a canvas snapshot sent as a data URI or as bare base64.
pub fn decode_image_payload(data: &str) -> Result<Vec<u8>> {
    // A data URI looks like "data:image/png;base64,AAAA..."; everything
    // before the first comma is the header.
    let encoded = match data.split_once(',') {
        Some((_, rest)) => rest,
        None => data,
    };
    BASE64
        .decode(encoded.trim())
        .context("image payload is not valid base64")
}
