//! Unit tests for the wire message types.

use droid_session_probe::rpc::wire::{
    methods, Notification, Request, Response, ASSISTANT_TEXT_DELTA, SESSION_NOTIFICATION_METHOD,
};
use serde_json::json;

#[test]
fn request_new_fills_protocol_constants() {
    let request = Request::new("1", methods::INITIALIZE_SESSION, json!({}));
    assert_eq!(request.jsonrpc, "2.0");
    assert_eq!(request.factory_api_version, "1.0.0");
    assert_eq!(request.kind, "request");
    assert_eq!(request.id, "1");
    assert_eq!(request.method, "droid.initialize_session");
}

#[test]
fn request_serialises_with_wire_field_names() {
    let request = Request::new("2", methods::LOAD_SESSION, json!({"sessionId": "s-9"}));
    let value = serde_json::to_value(&request).expect("serialises");
    let object = value.as_object().expect("object");

    assert!(object.contains_key("factoryApiVersion"));
    assert!(object.contains_key("type"));
    assert!(
        !object.contains_key("kind"),
        "rust field name must not leak onto the wire"
    );
    assert_eq!(value["params"]["sessionId"], "s-9");
}

#[test]
fn response_parses_missing_optional_fields() {
    let response: Response = serde_json::from_str(r#"{"type":"response"}"#).expect("parses");
    assert!(response.id.is_none());
    assert!(response.result.is_none());
    assert!(response.error.is_none());
}

#[test]
fn response_error_message_defaults_to_empty() {
    let response: Response =
        serde_json::from_str(r#"{"type":"response","id":"4","error":{"code":-32000}}"#)
            .expect("parses");
    let error = response.error.expect("error present");
    assert_eq!(error.code, Some(-32000));
    assert_eq!(error.message, "");
}

#[test]
fn text_delta_accessor_extracts_fragment() {
    let notification: Notification = serde_json::from_value(json!({
        "type": "notification",
        "method": SESSION_NOTIFICATION_METHOD,
        "params": { "notification": { "type": ASSISTANT_TEXT_DELTA, "textDelta": "chunk" } }
    }))
    .expect("parses");
    assert_eq!(notification.text_delta(), Some("chunk"));
}

#[test]
fn text_delta_accessor_rejects_other_event_types() {
    let notification: Notification = serde_json::from_value(json!({
        "type": "notification",
        "method": SESSION_NOTIFICATION_METHOD,
        "params": { "notification": { "type": "session_settings_changed" } }
    }))
    .expect("parses");
    assert_eq!(notification.text_delta(), None);
}

#[test]
fn text_delta_accessor_rejects_other_methods() {
    let notification: Notification = serde_json::from_value(json!({
        "type": "notification",
        "method": "droid.debug_log",
        "params": { "notification": { "type": ASSISTANT_TEXT_DELTA, "textDelta": "x" } }
    }))
    .expect("parses");
    assert_eq!(notification.text_delta(), None);
}

#[test]
fn notification_without_nested_event_parses() {
    let notification: Notification = serde_json::from_value(json!({
        "type": "notification",
        "method": SESSION_NOTIFICATION_METHOD,
        "params": {}
    }))
    .expect("parses");
    assert_eq!(notification.text_delta(), None);
}
