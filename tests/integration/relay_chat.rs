//! Chat sessions over the real WebSocket relay.
//!
//! Starts `fadechat-relay` in-process on an ephemeral port and connects
//! `RelayTransport`s to it:
//!
//! - two members of a room exchange a message and its read receipt
//! - the relay refuses a wrong password before any frame flows
//! - rooms are isolated from each other
//! - a relay that echoes frames back does not confuse the sender

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use fadechat::chat::{
    ChatSession, DeliveryState, DropReason, InboundOutcome, MemoryPresenter, SessionConfig,
};
use fadechat::crypto::aead::AesGcmSession;
use fadechat::crypto::keys::DerivationScheme;
use fadechat::transport::relay::{ConnectOptions, RelayTransport};
use fadechat::transport::{Transport, TransportError};
use fadechat_relay::relay::{RelayState, start_server_with_state};

type Session = ChatSession<AesGcmSession, RelayTransport, MemoryPresenter>;

async fn start_relay(state: RelayState) -> (String, Arc<RelayState>) {
    let state = Arc::new(state);
    let (addr, _handle) = start_server_with_state("127.0.0.1:0", Arc::clone(&state))
        .await
        .expect("failed to start relay server");
    (format!("ws://{addr}/ws"), state)
}

/// Wait until the relay has registered `n` members in `room`.
async fn wait_for_members(state: &RelayState, room: &str, n: usize) {
    for _ in 0..100 {
        if state.member_count(room).await == n {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("relay never saw {n} members in {room}");
}

async fn connect(url: &str, room: &str, password: &str) -> RelayTransport {
    RelayTransport::connect(url, room, password, ConnectOptions::default())
        .await
        .expect("connect failed")
}

fn session(transport: RelayTransport, password: &str) -> Session {
    let key = DerivationScheme::Sha256
        .derive_key(password.as_bytes())
        .unwrap();
    ChatSession::new(
        AesGcmSession::new(&key),
        Arc::new(transport),
        MemoryPresenter::new(),
        SessionConfig::default(),
    )
}

async fn pump(session: &mut Session, now: Instant) -> InboundOutcome {
    let transport = session.transport();
    let packet = tokio::time::timeout(Duration::from_secs(2), transport.recv())
        .await
        .expect("no packet arrived")
        .unwrap();
    session.handle_inbound(&packet, now).unwrap()
}

#[tokio::test]
async fn message_and_receipt_cross_the_relay() {
    let (url, state) = start_relay(RelayState::default()).await;
    let mut alice = session(connect(&url, "room1", "secret1").await, "secret1");
    let mut bob = session(connect(&url, "room1", "secret1").await, "secret1");
    wait_for_members(&state, "room1", 2).await;
    let now = Instant::now();

    let id = alice.send_text("over the wire", now).await.unwrap().unwrap();

    let InboundOutcome::Displayed { id: got, handle } = pump(&mut bob, now).await else {
        panic!("bob did not display the message");
    };
    assert_eq!(got, id);
    assert_eq!(
        bob.presenter().rendered(),
        vec!["Other user: over the wire".to_string()]
    );

    bob.mark_visible(handle).await.unwrap();
    assert_eq!(
        pump(&mut alice, now).await,
        InboundOutcome::Acknowledged(id.clone())
    );
    assert_eq!(alice.delivery_state(&id), Some(DeliveryState::Acknowledged));
}

#[tokio::test]
async fn wrong_password_is_refused_at_handshake() {
    let (url, state) = start_relay(RelayState::default()).await;

    let result = RelayTransport::connect(&url, "room1", "not-it", ConnectOptions::default()).await;
    match result {
        Err(TransportError::Rejected(reason)) => assert!(reason.contains("401"), "{reason}"),
        Err(other) => panic!("expected Rejected, got {other}"),
        Ok(_) => panic!("wrong password was accepted"),
    }
    assert_eq!(state.member_count("room1").await, 0);
}

#[tokio::test]
async fn rooms_do_not_hear_each_other() {
    let (url, state) = start_relay(RelayState::default()).await;
    let mut room1 = session(connect(&url, "room1", "secret1").await, "secret1");
    let room2 = session(connect(&url, "room2", "secret2").await, "secret2");
    wait_for_members(&state, "room1", 1).await;
    wait_for_members(&state, "room2", 1).await;

    room1.send_text("room1 only", Instant::now()).await.unwrap();

    let transport = room2.transport();
    let heard = tokio::time::timeout(Duration::from_millis(200), transport.recv()).await;
    assert!(heard.is_err(), "room2 received room1 traffic");
}

#[tokio::test]
async fn echoing_relay_is_tolerated() {
    let (url, state) = start_relay(RelayState::default().with_echo_to_sender(true)).await;
    let mut alice = session(connect(&url, "room1", "secret1").await, "secret1");
    let mut bob = session(connect(&url, "room1", "secret1").await, "secret1");
    wait_for_members(&state, "room1", 2).await;
    let now = Instant::now();

    alice.send_text("hello?", now).await.unwrap();
    assert_eq!(
        pump(&mut alice, now).await,
        InboundOutcome::Dropped(DropReason::SelfEcho)
    );
    assert_eq!(alice.presenter().lines().len(), 1);
    assert!(matches!(
        pump(&mut bob, now).await,
        InboundOutcome::Displayed { .. }
    ));
}

#[tokio::test]
async fn relay_shutdown_surfaces_as_closed_transport() {
    let (url, state) = start_relay(RelayState::default()).await;
    let alice = session(connect(&url, "room1", "secret1").await, "secret1");
    wait_for_members(&state, "room1", 1).await;

    state.close_all_connections().await;

    let transport = alice.transport();
    let result = tokio::time::timeout(Duration::from_secs(2), transport.recv())
        .await
        .expect("close was not noticed");
    assert!(matches!(result, Err(TransportError::ConnectionClosed)));
}
