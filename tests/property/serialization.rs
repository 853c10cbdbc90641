//! Property-based serialization tests for the envelope codec.
//!
//! Uses proptest to verify:
//! 1. Any `MESSAGE` or `ACK` envelope survives encode → decode.
//! 2. Arbitrary extra fields in a record never change what decodes.
//! 3. Random bytes never cause a panic in `decode` (returns `Err` gracefully).

use fadechat_proto::codec;
use fadechat_proto::message::*;
use proptest::prelude::*;

// --- Strategies for protocol types ---

/// Strategy for generating arbitrary `MessageId` values.
fn arb_message_id() -> impl Strategy<Value = MessageId> {
    prop_oneof![
        Just(()).prop_map(|()| MessageId::new()),
        ".{0,64}".prop_map(MessageId::from),
    ]
}

/// Strategy for generating arbitrary `ClientId` values.
fn arb_client_id() -> impl Strategy<Value = ClientId> {
    prop_oneof![
        Just(()).prop_map(|()| ClientId::new()),
        ".{0,64}".prop_map(ClientId::from),
    ]
}

/// Strategy for generating arbitrary `Envelope` values.
fn arb_envelope() -> impl Strategy<Value = Envelope> {
    prop_oneof![
        (arb_message_id(), arb_client_id(), any::<String>())
            .prop_map(|(id, sender, text)| Envelope::message(id, sender, text)),
        (arb_message_id(), arb_client_id()).prop_map(|(id, sender)| Envelope::ack(id, sender)),
    ]
}

// --- Property tests ---

proptest! {
    /// Any Envelope survives an encode → decode round-trip.
    #[test]
    fn envelope_round_trip(envelope in arb_envelope()) {
        let bytes = codec::encode(&envelope).expect("encode should succeed");
        let decoded = codec::decode(&bytes).expect("decode should succeed");
        prop_assert_eq!(envelope, decoded);
    }

    /// Unknown extra fields are ignored on decode.
    #[test]
    fn extra_fields_are_ignored(
        envelope in arb_envelope(),
        key in "x[a-z]{1,12}",
        value in any::<String>(),
    ) {
        let bytes = codec::encode(&envelope).expect("encode should succeed");
        let mut record: serde_json::Value =
            serde_json::from_slice(&bytes).expect("encoded form is JSON");
        record
            .as_object_mut()
            .expect("encoded form is an object")
            .insert(key, serde_json::Value::String(value));
        let widened = serde_json::to_vec(&record).expect("re-serialize");

        let decoded = codec::decode(&widened).expect("decode should succeed");
        prop_assert_eq!(envelope, decoded);
    }

    /// Random bytes never cause a panic when decoded; decoding returns an error.
    #[test]
    fn random_bytes_decode_no_panic(bytes in prop::collection::vec(any::<u8>(), 0..512)) {
        let _ = codec::decode(&bytes);
    }

    /// Any `type` tag other than MESSAGE / ACK is rejected.
    #[test]
    fn unknown_type_tags_are_rejected(tag in "[A-Za-z_]{1,16}") {
        prop_assume!(tag != "MESSAGE" && tag != "ACK");
        let record = serde_json::json!({
            "type": tag,
            "id": "m1",
            "senderId": "alice",
            "text": "hello",
        });
        let bytes = serde_json::to_vec(&record).expect("serialize");
        prop_assert!(matches!(
            codec::decode(&bytes),
            Err(codec::CodecError::MalformedEnvelope(_))
        ));
    }
}
