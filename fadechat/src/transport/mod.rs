//! Transport layer abstraction for `FadeChat`.
//!
//! Defines the [`Transport`] trait that all transport implementations must satisfy.
//! Concrete implementations:
//! - [`loopback::LoopbackTransport`]: in-process broadcast hub for testing
//! - [`relay::RelayTransport`]: WebSocket connection to a room relay

pub mod loopback;
pub mod relay;

use std::fmt;

/// Describes which kind of transport is in use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportType {
    /// Room relay over WebSocket.
    Relay,
    /// In-process loopback for testing.
    Loopback,
}

impl fmt::Display for TransportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Relay => write!(f, "Relay"),
            Self::Loopback => write!(f, "Loopback"),
        }
    }
}

/// Errors that can occur during transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The channel has been closed.
    #[error("connection closed")]
    ConnectionClosed,

    /// The operation timed out before completing.
    #[error("transport operation timed out")]
    Timeout,

    /// The relay refused the connection (unknown room, bad password, bad URL).
    #[error("connection rejected: {0}")]
    Rejected(String),

    /// An underlying I/O error occurred.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Async duplex channel carrying sealed packets.
///
/// The channel is unreliable as far as callers are concerned: frames may be
/// lost, duplicated, reordered, or echoed back to the sender. Reliability
/// is built on top by the chat session.
///
/// # Invariant
///
/// Packets passed to [`Transport::send`] MUST already be sealed. The
/// transport treats them as opaque text and never interprets them.
pub trait Transport: Send + Sync {
    /// Hand one sealed packet to the channel.
    ///
    /// Returns `Ok(())` once the packet has been handed off. This does NOT
    /// guarantee delivery.
    fn send(
        &self,
        packet: &str,
    ) -> impl std::future::Future<Output = Result<(), TransportError>> + Send;

    /// Receive the next raw packet from the channel.
    ///
    /// Blocks asynchronously until a frame arrives. The returned text is
    /// untrusted and may be garbage.
    fn recv(&self) -> impl std::future::Future<Output = Result<String, TransportError>> + Send;

    /// Whether the channel is still open.
    fn is_connected(&self) -> bool;

    /// Return the type of this transport.
    fn transport_type(&self) -> TransportType;
}
