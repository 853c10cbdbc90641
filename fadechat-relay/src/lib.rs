//! `FadeChat` relay server library.
//!
//! Exposes the relay server for use in tests and embedding.
//! The relay accepts WebSocket connections that carry a room id and
//! password, and fans sealed packets out to the other members of the room.

pub mod config;
pub mod relay;
