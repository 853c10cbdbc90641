//! End-to-end session behaviour over an in-process relay.
//!
//! Two or three `ChatSession`s share a `LoopbackHub`. Time is passed in
//! explicitly, so the self-destruct and read-receipt races are replayed
//! deterministically:
//!
//! - A sends, B sees, B acknowledges once, A marks delivered.
//! - Both sides take the line down after the message lifetime.
//! - An ACK that arrives after expiry changes nothing, and an expiry that
//!   comes after the ACK never fires.
//! - Relays that echo or duplicate frames do not produce extra lines or ACKs.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use fadechat::chat::{
    ChatSession, DeliveryState, DisplayHandle, DropReason, InboundOutcome, MemoryPresenter,
    SessionConfig,
};
use fadechat::crypto::aead::AesGcmSession;
use fadechat::crypto::keys::DerivationScheme;
use fadechat::transport::Transport;
use fadechat::transport::loopback::{HubOptions, LoopbackHub, LoopbackTransport};
use fadechat_proto::message::{ClientId, MessageId};

type Session = ChatSession<AesGcmSession, LoopbackTransport, MemoryPresenter>;

const LIFETIME: Duration = Duration::from_secs(10);

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn crypto() -> AesGcmSession {
    let key = DerivationScheme::Sha256.derive_key(b"secret1").unwrap();
    AesGcmSession::new(&key)
}

async fn join(hub: &LoopbackHub, name: &str) -> Session {
    ChatSession::with_client_id(
        crypto(),
        Arc::new(hub.join().await),
        MemoryPresenter::new(),
        SessionConfig::default(),
        ClientId::from(name),
    )
}

/// Receive the next packet for `session` and hand it over at `now`.
async fn pump(session: &mut Session, now: Instant) -> InboundOutcome {
    let transport = session.transport();
    let packet = tokio::time::timeout(Duration::from_secs(1), transport.recv())
        .await
        .expect("no packet arrived")
        .unwrap();
    session.handle_inbound(&packet, now).unwrap()
}

async fn assert_quiet(session: &Session) {
    let transport = session.transport();
    let r = tokio::time::timeout(Duration::from_millis(30), transport.recv()).await;
    assert!(r.is_err(), "unexpected packet: {r:?}");
}

fn displayed(outcome: InboundOutcome) -> (MessageId, DisplayHandle) {
    match outcome {
        InboundOutcome::Displayed { id, handle } => (id, handle),
        other => panic!("expected Displayed, got {other:?}"),
    }
}

// ---------------------------------------------------------------------------
// The basic exchange
// ---------------------------------------------------------------------------

#[tokio::test]
async fn message_is_read_acknowledged_and_destroyed_on_both_sides() {
    let hub = LoopbackHub::new();
    let mut alice = join(&hub, "alice").await;
    let mut bob = join(&hub, "bob").await;
    let t0 = Instant::now();

    let id = alice.send_text("hello", t0).await.unwrap().unwrap();
    assert_eq!(alice.presenter().rendered(), vec!["You: hello".to_string()]);

    let (got, handle) = displayed(pump(&mut bob, t0 + Duration::from_millis(100)).await);
    assert_eq!(got, id);
    assert_eq!(bob.presenter().rendered(), vec!["Other user: hello".to_string()]);

    // Bob scrolls it into view at t0+2s.
    assert_eq!(bob.mark_visible(handle).await.unwrap(), Some(id.clone()));

    let ack_at = t0 + Duration::from_secs(2);
    assert_eq!(
        pump(&mut alice, ack_at).await,
        InboundOutcome::Acknowledged(id.clone())
    );
    assert_eq!(alice.delivery_state(&id), Some(DeliveryState::Acknowledged));
    assert!(alice.presenter().find(&id).unwrap().delivered);

    // Bob's copy goes lifetime after it arrived.
    assert_eq!(bob.fire_timers(t0 + Duration::from_millis(100) + LIFETIME), 1);
    assert!(bob.presenter().lines().is_empty());

    // Alice's copy goes lifetime after the ACK, not after the send.
    assert_eq!(alice.fire_timers(t0 + LIFETIME), 0);
    assert_eq!(alice.fire_timers(ack_at + LIFETIME), 1);
    assert!(alice.presenter().lines().is_empty());
    assert_eq!(alice.stats().expired, 0);
    assert_eq!(alice.stats().acknowledged, 1);
}

#[tokio::test]
async fn conversation_runs_both_ways() {
    let hub = LoopbackHub::new();
    let mut alice = join(&hub, "alice").await;
    let mut bob = join(&hub, "bob").await;
    let now = Instant::now();

    alice.send_text("ping", now).await.unwrap();
    displayed(pump(&mut bob, now).await);
    bob.send_text("pong", now).await.unwrap();
    displayed(pump(&mut alice, now).await);

    assert_eq!(
        alice.presenter().rendered(),
        vec!["You: ping".to_string(), "Other user: pong".to_string()]
    );
    assert_eq!(
        bob.presenter().rendered(),
        vec!["Other user: ping".to_string(), "You: pong".to_string()]
    );
}

// ---------------------------------------------------------------------------
// Read receipts
// ---------------------------------------------------------------------------

#[tokio::test]
async fn ack_is_sent_exactly_once_however_often_it_is_seen() {
    let hub = LoopbackHub::new();
    let mut alice = join(&hub, "alice").await;
    let mut bob = join(&hub, "bob").await;
    let now = Instant::now();

    alice.send_text("look", now).await.unwrap();
    let (_, handle) = displayed(pump(&mut bob, now).await);

    let mut acks = 0;
    for _ in 0..20 {
        if bob.mark_visible(handle).await.unwrap().is_some() {
            acks += 1;
        }
    }
    assert_eq!(acks, 1);

    pump(&mut alice, now).await;
    assert_quiet(&alice).await;
}

#[tokio::test]
async fn unseen_message_sends_no_ack_and_sender_sees_expiry() {
    let hub = LoopbackHub::new();
    let mut alice = join(&hub, "alice").await;
    let mut bob = join(&hub, "bob").await;
    let t0 = Instant::now();

    let id = alice.send_text("never read", t0).await.unwrap().unwrap();
    let (_, handle) = displayed(pump(&mut bob, t0).await);

    // Bob never reports visibility; both copies self-destruct.
    assert_eq!(bob.fire_timers(t0 + LIFETIME), 1);
    assert_eq!(bob.mark_visible(handle).await.unwrap(), None);
    assert_quiet(&alice).await;

    assert_eq!(alice.fire_timers(t0 + LIFETIME), 1);
    assert_eq!(alice.delivery_state(&id), None);
    assert_eq!(alice.stats().expired, 1);
}

// ---------------------------------------------------------------------------
// First writer wins
// ---------------------------------------------------------------------------

#[tokio::test]
async fn late_ack_after_expiry_is_ignored() {
    let hub = LoopbackHub::new();
    let mut alice = join(&hub, "alice").await;
    let mut bob = join(&hub, "bob").await;
    let t0 = Instant::now();

    let id = alice.send_text("too slow", t0).await.unwrap().unwrap();
    let (_, handle) = displayed(pump(&mut bob, t0).await);
    bob.mark_visible(handle).await.unwrap();

    // Expiry is processed before the ACK reaches Alice.
    assert_eq!(alice.fire_timers(t0 + LIFETIME), 1);
    assert!(alice.presenter().lines().is_empty());

    assert_eq!(
        pump(&mut alice, t0 + LIFETIME + Duration::from_millis(5)).await,
        InboundOutcome::Dropped(DropReason::UnmatchedAck)
    );
    assert_eq!(alice.delivery_state(&id), None);
    assert!(alice.presenter().lines().is_empty());
    assert_eq!(alice.stats().acknowledged, 0);
    assert_eq!(alice.next_deadline(), None);
}

#[tokio::test]
async fn ack_after_unswept_expiry_still_loses() {
    let hub = LoopbackHub::new();
    let mut alice = join(&hub, "alice").await;
    let mut bob = join(&hub, "bob").await;
    let t0 = Instant::now();

    let id = alice.send_text("slow sweep", t0).await.unwrap().unwrap();
    let (_, handle) = displayed(pump(&mut bob, t0).await);
    bob.mark_visible(handle).await.unwrap();

    // No timer has run yet, but the lifetime is long over.
    let late = t0 + LIFETIME + Duration::from_secs(5);
    assert_eq!(
        pump(&mut alice, late).await,
        InboundOutcome::Dropped(DropReason::UnmatchedAck)
    );
    assert_eq!(alice.delivery_state(&id), Some(DeliveryState::Expired));
    assert_eq!(alice.stats().acknowledged, 0);
    assert!(!alice.presenter().lines()[0].delivered);
    assert_eq!(alice.next_deadline(), Some(t0 + LIFETIME));

    assert_eq!(alice.fire_timers(late), 1);
    assert!(alice.presenter().lines().is_empty());
    assert_eq!(alice.stats().expired, 1);
}

#[tokio::test]
async fn ack_just_before_expiry_cancels_it() {
    let hub = LoopbackHub::new();
    let mut alice = join(&hub, "alice").await;
    let mut bob = join(&hub, "bob").await;
    let t0 = Instant::now();

    let id = alice.send_text("just in time", t0).await.unwrap().unwrap();
    let (_, handle) = displayed(pump(&mut bob, t0).await);
    bob.mark_visible(handle).await.unwrap();

    let ack_at = t0 + LIFETIME - Duration::from_millis(1);
    assert_eq!(
        pump(&mut alice, ack_at).await,
        InboundOutcome::Acknowledged(id.clone())
    );

    // The original expiry would have fired here.
    assert_eq!(alice.fire_timers(t0 + LIFETIME), 0);
    assert_eq!(alice.delivery_state(&id), Some(DeliveryState::Acknowledged));

    assert_eq!(alice.fire_timers(ack_at + LIFETIME), 1);
    assert_eq!(alice.stats().expired, 0);
}

// ---------------------------------------------------------------------------
// Misbehaving relays and foreign traffic
// ---------------------------------------------------------------------------

#[tokio::test]
async fn echoing_relay_does_not_duplicate_own_lines() {
    let hub = LoopbackHub::with_options(HubOptions {
        echo_to_sender: true,
        ..HubOptions::default()
    });
    let mut alice = join(&hub, "alice").await;
    let mut bob = join(&hub, "bob").await;
    let now = Instant::now();

    let id = alice.send_text("echo?", now).await.unwrap().unwrap();
    assert_eq!(
        pump(&mut alice, now).await,
        InboundOutcome::Dropped(DropReason::SelfEcho)
    );
    assert_eq!(alice.presenter().lines().len(), 1);

    let (_, handle) = displayed(pump(&mut bob, now).await);
    bob.mark_visible(handle).await.unwrap();

    // Bob hears his own ACK back and ignores it; Alice accepts it.
    assert_eq!(
        pump(&mut bob, now).await,
        InboundOutcome::Dropped(DropReason::SelfEcho)
    );
    assert_eq!(
        pump(&mut alice, now).await,
        InboundOutcome::Acknowledged(id)
    );
}

#[tokio::test]
async fn duplicating_relay_yields_one_line_and_one_ack() {
    let hub = LoopbackHub::with_options(HubOptions {
        duplicate: true,
        ..HubOptions::default()
    });
    let mut alice = join(&hub, "alice").await;
    let mut bob = join(&hub, "bob").await;
    let now = Instant::now();

    let id = alice.send_text("twice", now).await.unwrap().unwrap();
    let (_, handle) = displayed(pump(&mut bob, now).await);
    assert_eq!(
        pump(&mut bob, now).await,
        InboundOutcome::Dropped(DropReason::Duplicate)
    );
    assert_eq!(bob.presenter().lines().len(), 1);

    bob.mark_visible(handle).await.unwrap();
    assert_eq!(
        pump(&mut alice, now).await,
        InboundOutcome::Acknowledged(id)
    );
    assert_eq!(
        pump(&mut alice, now).await,
        InboundOutcome::Dropped(DropReason::UnmatchedAck)
    );
    assert_eq!(alice.stats().acknowledged, 1);
}

#[tokio::test]
async fn first_reader_in_a_group_acknowledges() {
    let hub = LoopbackHub::new();
    let mut alice = join(&hub, "alice").await;
    let mut bob = join(&hub, "bob").await;
    let mut carol = join(&hub, "carol").await;
    let now = Instant::now();

    let id = alice.send_text("all of you", now).await.unwrap().unwrap();
    let (_, bob_handle) = displayed(pump(&mut bob, now).await);
    let (_, carol_handle) = displayed(pump(&mut carol, now).await);

    carol.mark_visible(carol_handle).await.unwrap();
    // Bob hears Carol's ACK; it is not for anything he sent.
    assert_eq!(
        pump(&mut bob, now).await,
        InboundOutcome::Dropped(DropReason::UnmatchedAck)
    );
    bob.mark_visible(bob_handle).await.unwrap();
    assert_eq!(
        pump(&mut carol, now).await,
        InboundOutcome::Dropped(DropReason::UnmatchedAck)
    );

    assert_eq!(
        pump(&mut alice, now).await,
        InboundOutcome::Acknowledged(id.clone())
    );
    assert_eq!(
        pump(&mut alice, now).await,
        InboundOutcome::Dropped(DropReason::UnmatchedAck)
    );
    assert_eq!(alice.delivery_state(&id), Some(DeliveryState::Acknowledged));
}

#[tokio::test]
async fn foreign_room_traffic_is_dropped() {
    let hub = LoopbackHub::new();
    let mut alice = join(&hub, "alice").await;
    let mallory_key = DerivationScheme::Sha256.derive_key(b"secret2").unwrap();
    let mut mallory: Session = ChatSession::with_client_id(
        AesGcmSession::new(&mallory_key),
        Arc::new(hub.join().await),
        MemoryPresenter::new(),
        SessionConfig::default(),
        ClientId::from("mallory"),
    );
    let now = Instant::now();

    mallory.send_text("can you read this?", now).await.unwrap();
    assert_eq!(
        pump(&mut alice, now).await,
        InboundOutcome::Dropped(DropReason::AuthenticationFailure)
    );

    hub.inject("not even base64 !!").await.unwrap();
    assert_eq!(
        pump(&mut alice, now).await,
        InboundOutcome::Dropped(DropReason::MalformedPacket)
    );

    // Still healthy afterwards.
    alice.send_text("still here", now).await.unwrap();
    assert_eq!(alice.presenter().lines().len(), 1);
    assert_eq!(alice.stats().dropped, 2);
}
