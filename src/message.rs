//! Wire envelopes and the request-id counter.
//!
//! Three shapes travel over the transport:
//!
//! - request: `{ "id": 3, "func": "getContext", "args": [...] }`
//! - response: `{ "id": 3, "args": [err, result, ...] }` (optionally `"isPartialResponse": true`)
//! - event: `{ "func": "themeChange", "args": [...] }`
//!
//! `id` without `func` is a response, `func` marks a named request or event.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Correlation id. Starts at 0 for every session and only goes up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub u64);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageRequest {
    pub id: MessageId,
    pub func: String,
    #[serde(default)]
    pub args: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageResponse {
    pub id: MessageId,
    #[serde(default)]
    pub args: Vec<Value>,
    #[serde(
        rename = "isPartialResponse",
        default,
        skip_serializing_if = "std::ops::Not::not"
    )]
    pub is_partial_response: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventMessage {
    pub func: String,
    #[serde(default)]
    pub args: Vec<Value>,
}

/// Anything the bridge puts on the wire.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Envelope {
    Request(MessageRequest),
    Response(MessageResponse),
    Event(EventMessage),
}

impl Envelope {
    pub fn to_value(&self) -> Value {
        // Envelopes are plain maps of JSON values; serialization cannot fail.
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn func(&self) -> Option<&str> {
        match self {
            Envelope::Request(r) => Some(&r.func),
            Envelope::Event(e) => Some(&e.func),
            Envelope::Response(_) => None,
        }
    }
}

/// Assigns ids and builds envelopes.
#[derive(Debug, Default)]
pub struct MessageCodec {
    next_id: u64,
}

impl MessageCodec {
    pub fn new() -> Self {
        Self::default()
    }

    /// The id the next request will get.
    pub fn peek_next_id(&self) -> MessageId {
        MessageId(self.next_id)
    }

    pub fn encode_request(&mut self, func: impl Into<String>, args: Vec<Value>) -> MessageRequest {
        let id = MessageId(self.next_id);
        self.next_id += 1;
        MessageRequest {
            id,
            func: func.into(),
            args,
        }
    }

    pub fn encode_response(id: MessageId, args: Vec<Value>, is_partial_response: bool) -> MessageResponse {
        MessageResponse {
            id,
            args,
            is_partial_response,
        }
    }

    pub fn encode_event(func: impl Into<String>, args: Vec<Value>) -> EventMessage {
        EventMessage {
            func: func.into(),
            args,
        }
    }
}

/// What an inbound payload turned out to be.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Request(MessageRequest),
    Response(MessageResponse),
    Event(EventMessage),
}

fn args_of(map: &Map<String, Value>) -> Option<Vec<Value>> {
    match map.get("args") {
        None | Some(Value::Null) => Some(Vec::new()),
        Some(Value::Array(a)) => Some(a.clone()),
        Some(_) => None,
    }
}

/// Classify a raw payload. Returns `None` for anything that is not a
/// well-formed envelope; callers drop those silently.
pub fn decode(data: &Value) -> Option<Inbound> {
    let map = data.as_object()?;
    let args = args_of(map)?;
    let id = match map.get("id") {
        None | Some(Value::Null) => None,
        Some(v) => Some(MessageId(v.as_u64()?)),
    };
    let func = match map.get("func") {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s.clone()),
        Some(_) => return None,
    };

    match (id, func) {
        (Some(id), Some(func)) => Some(Inbound::Request(MessageRequest { id, func, args })),
        (Some(id), None) => {
            let is_partial_response = map
                .get("isPartialResponse")
                .and_then(Value::as_bool)
                .unwrap_or(false);
            Some(Inbound::Response(MessageResponse {
                id,
                args,
                is_partial_response,
            }))
        }
        (None, Some(func)) => Some(Inbound::Event(EventMessage { func, args })),
        (None, None) => None,
    }
}

/// Parse a JSON string (frameless path) and classify it.
pub fn decode_str(raw: &str) -> Option<Inbound> {
    let value: Value = serde_json::from_str(raw).ok()?;
    decode(&value)
}
