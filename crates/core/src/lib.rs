//! Core logic for the room tutoring agent.
//!
//! This crate holds everything that can be reasoned about without a live
//! room connection: frame sampling, the single-flight analysis guard, the
//! model relay seam, wire formats, and event dispatch. The runnable service
//! supplies the room SDK plumbing and implements the seams defined here.

pub mod analysis;
pub mod events;
pub mod guard;
pub mod output;
pub mod persona;
pub mod protocol;
pub mod relay;
pub mod sampler;

pub use analysis::{Analyzer, FALLBACK_MESSAGE};
pub use events::{AgentEvent, EventRouter};
pub use output::RoomOutput;
pub use persona::Persona;
pub use relay::{ModelRelay, OpenAICompatibleRelay};
pub use sampler::{FrameDecision, FrameSampler, SamplerConfig};
