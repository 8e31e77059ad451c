//! Typed message shapes for the droid stream-jsonrpc wire format.
//!
//! Three message shapes travel over the agent's stdio, one JSON object per
//! line, discriminated by the `type` field:
//!
//! - request: `{"jsonrpc":"2.0","factoryApiVersion":"1.0.0","type":"request","id":"1","method":"droid.…","params":{…}}`
//! - response: `{"type":"response","id":"1"|null,"result":{…}}` or the same
//!   envelope with an `error` descriptor instead of `result`.
//! - notification: `{"type":"notification","method":"droid.session_notification","params":{"notification":{"type":"…",…}}}`

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// JSON-RPC version tag carried on every outbound request.
pub const JSONRPC_VERSION: &str = "2.0";

/// Factory API version tag carried on every outbound request.
pub const FACTORY_API_VERSION: &str = "1.0.0";

/// Method name of the session event notification stream.
pub const SESSION_NOTIFICATION_METHOD: &str = "droid.session_notification";

/// Event type carrying one incremental fragment of assistant text.
pub const ASSISTANT_TEXT_DELTA: &str = "assistant_text_delta";

/// Request method names understood by the droid agent.
pub mod methods {
    /// Create a new conversational session.
    pub const INITIALIZE_SESSION: &str = "droid.initialize_session";
    /// Append a user message to the active session.
    pub const ADD_USER_MESSAGE: &str = "droid.add_user_message";
    /// Attach to an existing session by identifier.
    pub const LOAD_SESSION: &str = "droid.load_session";
}

// ── Outbound ──────────────────────────────────────────────────────────────────

/// One outbound request. Immutable once sent.
///
/// The caller-chosen `id` must be unique among in-flight requests on a given
/// transport; reusing an id before its response arrives is undefined.
#[derive(Debug, Clone, Serialize)]
pub struct Request {
    /// Always [`JSONRPC_VERSION`].
    pub jsonrpc: &'static str,
    /// Always [`FACTORY_API_VERSION`].
    #[serde(rename = "factoryApiVersion")]
    pub factory_api_version: &'static str,
    /// Wire discriminator, always `"request"`.
    #[serde(rename = "type")]
    pub kind: &'static str,
    /// Caller-chosen correlation identifier.
    pub id: String,
    /// Method name (see [`methods`]).
    pub method: String,
    /// Method-specific parameter mapping.
    pub params: Value,
}

impl Request {
    /// Build a request with the protocol version tags filled in.
    #[must_use]
    pub fn new(id: impl Into<String>, method: impl Into<String>, params: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            factory_api_version: FACTORY_API_VERSION,
            kind: "request",
            id: id.into(),
            method: method.into(),
            params,
        }
    }
}

// ── Inbound ───────────────────────────────────────────────────────────────────

/// Error descriptor attached to a failed response.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteError {
    /// Numeric error code, when the agent supplies one.
    #[serde(default)]
    pub code: Option<i64>,
    /// Human-readable error text; may be empty on a misbehaving agent.
    #[serde(default)]
    pub message: String,
}

/// One inbound response, consumed exactly once by the waiter for its `id`.
///
/// `id: None` covers both a JSON `null` id and a missing id field; some
/// transport-level errors are reported that way and carry only `error`.
#[derive(Debug, Clone, Deserialize)]
pub struct Response {
    /// Identifier echoing a request's `id`, or `None` for unmatched errors.
    #[serde(default)]
    pub id: Option<String>,
    /// Result mapping on success.
    #[serde(default)]
    pub result: Option<Value>,
    /// Error descriptor on failure.
    #[serde(default)]
    pub error: Option<RemoteError>,
}

/// One inbound notification; broadcast, never correlated to a request.
#[derive(Debug, Clone, Deserialize)]
pub struct Notification {
    /// Notification method name.
    pub method: String,
    /// Method-specific payload wrapper.
    #[serde(default)]
    pub params: NotificationParams,
}

/// Parameter wrapper around the nested session event payload.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NotificationParams {
    /// The nested event, when present.
    #[serde(default)]
    pub notification: Option<SessionEvent>,
}

/// The nested event payload of a session notification.
///
/// Unknown event types decode fine (extra fields are ignored); only the
/// discriminator and the text fragment are of interest to the harness.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionEvent {
    /// Event-type discriminator (e.g. [`ASSISTANT_TEXT_DELTA`]).
    #[serde(rename = "type", default)]
    pub kind: String,
    /// Incremental assistant text fragment, for delta events.
    #[serde(rename = "textDelta", default)]
    pub text_delta: Option<String>,
}

impl Notification {
    /// The assistant text fragment, if this is a text-delta session event.
    ///
    /// Returns `None` for any other method, event type, or a delta event
    /// missing its fragment field.
    #[must_use]
    pub fn text_delta(&self) -> Option<&str> {
        if self.method != SESSION_NOTIFICATION_METHOD {
            return None;
        }
        self.params
            .notification
            .as_ref()
            .filter(|event| event.kind == ASSISTANT_TEXT_DELTA)
            .and_then(|event| event.text_delta.as_deref())
    }
}

/// Discriminated inbound message.
#[derive(Debug, Clone)]
pub enum Message {
    /// A response to some outstanding request.
    Response(Response),
    /// A broadcast session notification.
    Notification(Notification),
}
