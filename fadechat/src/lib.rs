//! `FadeChat`: encrypted, self-destructing chat over an untrusted relay.
//!
//! The relay only ever sees sealed packets. Messages disappear from both
//! screens after a fixed lifetime, and a sender learns that a message was
//! read only when the recipient actually had it on screen.

pub mod app;
pub mod chat;
pub mod config;
pub mod crypto;
pub mod net;
pub mod transport;
pub mod ui;
