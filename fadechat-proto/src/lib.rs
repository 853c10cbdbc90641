//! Shared protocol definitions for the `FadeChat` wire format.

pub mod codec;
pub mod message;
pub mod room;
