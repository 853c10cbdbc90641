//! Tests for the `net` coordinator that connects the TUI to a session.
//!
//! These tests validate:
//! - `spawn_net` joins a relay room and returns working channel handles
//! - `NetCommand::SendMessage` on one client shows up as `NetEvent::Show`
//!   on the other
//! - a `NetCommand::Visible` report turns into `NetEvent::Read` for the
//!   reader and `NetEvent::Delivered` for the sender
//! - lines are removed by the session task's own timers
//! - connection failures are returned as errors, not panics

use std::time::Duration;

use fadechat::chat::{DisplayHandle, Origin, SessionConfig};
use fadechat::crypto::aead::AesGcmSession;
use fadechat::crypto::keys::DerivationScheme;
use fadechat::net::{self, NetCommand, NetConfig, NetEvent, NetHandle};
use fadechat::transport::TransportError;
use fadechat::transport::loopback::LoopbackHub;
use fadechat::transport::relay::ConnectOptions;

/// Start the relay server in-process and return a ws:// URL.
async fn start_relay() -> String {
    let (addr, _handle) = fadechat_relay::relay::start_server("127.0.0.1:0")
        .await
        .expect("failed to start relay server");
    format!("ws://{addr}/ws")
}

fn make_config(relay_url: &str, chat_id: &str, password: &str, lifetime: Duration) -> NetConfig {
    NetConfig {
        relay_url: relay_url.to_string(),
        chat_id: chat_id.to_string(),
        password: password.to_string(),
        key: DerivationScheme::Sha256
            .derive_key(password.as_bytes())
            .unwrap(),
        connect: ConnectOptions {
            timeout: Duration::from_secs(2),
            ..ConnectOptions::default()
        },
        session: SessionConfig {
            message_lifetime: lifetime,
            ..SessionConfig::default()
        },
        channel_capacity: 16,
    }
}

/// Wait for the first event matching `pred`, skipping the rest.
async fn wait_for(handle: &mut NetHandle, pred: impl Fn(&NetEvent) -> bool) -> NetEvent {
    tokio::time::timeout(Duration::from_secs(3), async {
        loop {
            let event = handle.events.recv().await.expect("event channel closed");
            if pred(&event) {
                return event;
            }
        }
    })
    .await
    .expect("timed out waiting for event")
}

fn shown(event: &NetEvent, origin: Origin) -> Option<DisplayHandle> {
    match event {
        NetEvent::Show { handle, line } if line.origin == origin => Some(*handle),
        _ => None,
    }
}

#[tokio::test]
async fn spawn_net_reports_relay_connection() {
    let url = start_relay().await;
    let mut alice = net::spawn_net(make_config(&url, "room1", "secret1", Duration::from_secs(10)))
        .await
        .unwrap();

    let event = wait_for(&mut alice, |e| matches!(e, NetEvent::ConnectionStatus { .. })).await;
    assert_eq!(
        event,
        NetEvent::ConnectionStatus {
            connected: true,
            transport_type: "Relay".to_string(),
        }
    );
}

#[tokio::test]
async fn send_show_read_deliver_remove() {
    let url = start_relay().await;
    let lifetime = Duration::from_millis(600);
    let mut alice = net::spawn_net(make_config(&url, "room1", "secret1", lifetime))
        .await
        .unwrap();
    let mut bob = net::spawn_net(make_config(&url, "room1", "secret1", lifetime))
        .await
        .unwrap();
    // Give the relay a moment to register both members.
    tokio::time::sleep(Duration::from_millis(100)).await;

    alice
        .commands
        .send(NetCommand::SendMessage {
            text: "hello bob".to_string(),
        })
        .await
        .unwrap();

    let mine = wait_for(&mut alice, |e| shown(e, Origin::Local).is_some()).await;
    let mine = shown(&mine, Origin::Local).unwrap();

    let theirs = wait_for(&mut bob, |e| shown(e, Origin::Remote).is_some()).await;
    if let NetEvent::Show { line, .. } = &theirs {
        assert_eq!(line.to_string(), "Other user: hello bob");
    }
    let theirs = shown(&theirs, Origin::Remote).unwrap();

    bob.commands
        .send(NetCommand::Visible(vec![theirs]))
        .await
        .unwrap();

    assert_eq!(
        wait_for(&mut bob, |e| matches!(e, NetEvent::Read(_))).await,
        NetEvent::Read(theirs)
    );
    assert_eq!(
        wait_for(&mut alice, |e| matches!(e, NetEvent::Delivered(_))).await,
        NetEvent::Delivered(mine)
    );

    // Both copies self-destruct without further input.
    assert_eq!(
        wait_for(&mut bob, |e| matches!(e, NetEvent::Remove(_))).await,
        NetEvent::Remove(theirs)
    );
    assert_eq!(
        wait_for(&mut alice, |e| matches!(e, NetEvent::Remove(_))).await,
        NetEvent::Remove(mine)
    );

    alice.commands.send(NetCommand::Shutdown).await.unwrap();
    let stats = alice.task.await.unwrap();
    assert_eq!(stats.sent, 1);
    assert_eq!(stats.acknowledged, 1);
    assert_eq!(stats.expired, 0);
}

#[tokio::test]
async fn unread_message_expires_for_sender() {
    let hub = LoopbackHub::new();
    let key = DerivationScheme::Sha256.derive_key(b"secret1").unwrap();
    let config = SessionConfig {
        message_lifetime: Duration::from_millis(200),
        ..SessionConfig::default()
    };
    let mut alice = net::spawn_session(
        hub.join().await,
        AesGcmSession::new(&key),
        config.clone(),
        16,
    );
    let _bob = net::spawn_session(hub.join().await, AesGcmSession::new(&key), config, 16);

    alice
        .commands
        .send(NetCommand::SendMessage {
            text: "anyone?".to_string(),
        })
        .await
        .unwrap();

    let mine = wait_for(&mut alice, |e| shown(e, Origin::Local).is_some()).await;
    let mine = shown(&mine, Origin::Local).unwrap();
    assert_eq!(
        wait_for(&mut alice, |e| matches!(e, NetEvent::Remove(_))).await,
        NetEvent::Remove(mine)
    );
    let stats = wait_for(&mut alice, |e| matches!(e, NetEvent::Stats(s) if s.expired == 1)).await;
    assert!(matches!(stats, NetEvent::Stats(_)));
}

#[tokio::test]
async fn shutdown_takes_lines_down() {
    let hub = LoopbackHub::new();
    let key = DerivationScheme::Sha256.derive_key(b"secret1").unwrap();
    let mut alice = net::spawn_session(
        hub.join().await,
        AesGcmSession::new(&key),
        SessionConfig::default(),
        16,
    );

    alice
        .commands
        .send(NetCommand::SendMessage {
            text: "bye".to_string(),
        })
        .await
        .unwrap();
    let mine = wait_for(&mut alice, |e| shown(e, Origin::Local).is_some()).await;
    let mine = shown(&mine, Origin::Local).unwrap();

    alice.commands.send(NetCommand::Shutdown).await.unwrap();
    assert_eq!(
        wait_for(&mut alice, |e| matches!(e, NetEvent::Remove(_))).await,
        NetEvent::Remove(mine)
    );
}

#[tokio::test]
async fn wrong_password_fails_to_spawn() {
    let url = start_relay().await;
    let result = net::spawn_net(make_config(&url, "room1", "wrong", Duration::from_secs(10))).await;
    assert!(matches!(result, Err(TransportError::Rejected(_))));
}

#[tokio::test]
async fn unreachable_relay_fails_to_spawn() {
    let result = net::spawn_net(make_config(
        "ws://127.0.0.1:1/ws",
        "room1",
        "secret1",
        Duration::from_secs(10),
    ))
    .await;
    assert!(result.is_err());
}
