//! Outbound seam toward the room.
//!
//! The agent talks back to the session two ways: a JSON packet on a named
//! data topic for the front-end to render, and synthesized speech. Both are
//! behind one trait so the analysis logic can be exercised without a live
//! room connection.

use anyhow::Result;
use async_trait::async_trait;

/// Delivery surface for agent replies.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RoomOutput: Send + Sync {
    /// Publishes raw bytes on a named data topic.
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<()>;

    /// Vocalizes a line of text. Implementations without a voice path may
    /// treat this as a no-op.
    async fn speak(&self, text: &str) -> Result<()>;
}
