//! Tutor Agent Service Library
//!
//! This library contains the runnable half of the room tutoring agent:
//! environment configuration, the room gateway and its event loop, the
//! voice output path, and the room-backed implementation of the delivery
//! seam. The `agent` binary is a thin wrapper around this library.

pub mod config;
pub mod output;
pub mod room;
pub mod speech;
