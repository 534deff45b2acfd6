use super::*;

// =============================================================
// Inbound decoding
// =============================================================

#[test]
fn decode_chat_message_with_numeric_id_and_temp_id() {
    let frame = decode_inbound(
        r#"{"type":"chat_message","id":42,"message":"hi","username":"alice","timestamp":"2024-01-01T00:00:00Z","temp_id":"t1"}"#,
    )
    .expect("chat frame should decode");
    assert_eq!(
        frame,
        Inbound::ChatMessage {
            id: ServerId::Number(42),
            message: "hi".into(),
            username: "alice".into(),
            timestamp: "2024-01-01T00:00:00Z".into(),
            temp_id: Some(TempId::from("t1")),
        }
    );
}

#[test]
fn decode_chat_message_accepts_string_id_without_temp_id() {
    let frame = decode_inbound(
        r#"{"type":"chat_message","id":"m-7","message":"yo","username":"bob","timestamp":"2024-01-01T00:00:00Z"}"#,
    )
    .expect("chat frame should decode");
    let Inbound::ChatMessage { id, temp_id, .. } = frame else {
        panic!("expected chat message");
    };
    assert_eq!(id, ServerId::Text("m-7".into()));
    assert!(temp_id.is_none());
}

#[test]
fn decode_typing_frame() {
    let frame = decode_inbound(r#"{"type":"typing","typing":true,"username":"bob"}"#).expect("typing");
    assert_eq!(frame, Inbound::Typing { typing: true, username: "bob".into() });
}

#[test]
fn decode_error_frame_with_and_without_temp_id() {
    let tagged = decode_inbound(r#"{"type":"error","error":"too long","temp_id":"t9"}"#).expect("error");
    assert_eq!(tagged, Inbound::Error { error: "too long".into(), temp_id: Some(TempId::from("t9")) });

    let generic = decode_inbound(r#"{"type":"error","error":"Malformed JSON"}"#).expect("error");
    assert_eq!(generic, Inbound::Error { error: "Malformed JSON".into(), temp_id: None });
}

#[test]
fn decode_unknown_type_falls_back_to_unknown() {
    let frame = decode_inbound(r#"{"type":"presence","users":["a"]}"#).expect("unknown type is not an error");
    assert_eq!(frame, Inbound::Unknown);
}

#[test]
fn decode_rejects_untyped_legacy_payload() {
    let err = decode_inbound(r#"{"message":"hi","username":"alice"}"#).expect_err("no type tag");
    assert!(matches!(err, ProtocolError::Json(_)));
}

#[test]
fn decode_rejects_malformed_json_and_missing_fields() {
    assert!(decode_inbound("{not json").is_err());
    assert!(decode_inbound(r#"{"type":"chat_message","message":"hi"}"#).is_err());
    assert!(decode_inbound(r#"{"type":"typing","typing":"yes","username":"a"}"#).is_err());
}

// =============================================================
// Outbound encoding
// =============================================================

#[test]
fn encode_chat_message_frame() {
    let text = encode_outbound(&Outbound::ChatMessage { message: "hello".into(), temp_id: TempId::from("t1") });
    let value: serde_json::Value = serde_json::from_str(&text).expect("json");
    assert_eq!(value, serde_json::json!({"type": "chat_message", "message": "hello", "temp_id": "t1"}));
}

#[test]
fn encode_typing_frame() {
    let text = encode_outbound(&Outbound::Typing { typing: false });
    let value: serde_json::Value = serde_json::from_str(&text).expect("json");
    assert_eq!(value, serde_json::json!({"type": "typing", "typing": false}));
}

#[test]
fn server_id_display() {
    assert_eq!(ServerId::Number(42).to_string(), "42");
    assert_eq!(ServerId::Text("abc".into()).to_string(), "abc");
}
