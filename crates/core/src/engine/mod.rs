//! External bot engine integration
//!
//! Talks to an engine process over TCP, one newline-delimited JSON message
//! per line, and plays an engine-backed `Player` seat with it.

mod client;
mod wire;

pub use client::EngineClient;
pub use wire::EngineMessage;
