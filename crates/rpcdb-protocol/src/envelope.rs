//! Request and response envelopes.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use serde_json::{Map, Value};

/// Correlation id linking a request to its response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(pub u64);

impl RequestId {
    /// Returns the numeric value of the id.
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for RequestId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

/// An outbound request.
///
/// `params` is already-serialized JSON text and is written to the wire
/// verbatim; everything else goes through the serializer so method names with
/// quotes or control characters are escaped correctly.
#[derive(Debug, Clone, Serialize)]
pub struct RequestEnvelope<'a> {
    /// Correlation id
    pub id: RequestId,
    /// Remote method name
    pub method: &'a str,
    /// Positional parameters, omitted when the method takes none
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<&'a RawValue>,
}

impl<'a> RequestEnvelope<'a> {
    /// Creates a request envelope.
    pub fn new(id: RequestId, method: &'a str, params: Option<&'a RawValue>) -> Self {
        Self { id, method, params }
    }

    /// Serializes the envelope into the text frame sent on the wire.
    pub fn to_text(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Error object carried by a failed response.
///
/// Deserialization never fails: servers send `{"message": ..., ...}` objects
/// with codes of any type, or a bare string, and every shape must still reach
/// the waiting caller as an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Value")]
pub struct ServerError {
    /// Human readable message reported by the server
    pub message: String,
    /// Error code, numeric or not, when the server sends one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<Value>,
    /// Any additional fields the server attached
    #[serde(flatten)]
    pub data: Map<String, Value>,
}

impl ServerError {
    /// Creates an error object with only a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
            data: Map::new(),
        }
    }
}

impl From<Value> for ServerError {
    fn from(value: Value) -> Self {
        match value {
            Value::String(message) => Self::new(message),
            Value::Object(mut members) => {
                let code = members.remove("code");
                let message = match members.remove("message") {
                    Some(Value::String(message)) => message,
                    Some(other) => other.to_string(),
                    // No message member: the object itself is the best description
                    None => Value::Object(members.clone()).to_string(),
                };
                Self {
                    message,
                    code,
                    data: members,
                }
            }
            other => Self::new(other.to_string()),
        }
    }
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.code {
            Some(Value::String(code)) => write!(f, "{} (code {})", self.message, code),
            Some(code) => write!(f, "{} (code {})", self.message, code),
            None => f.write_str(&self.message),
        }
    }
}

/// An inbound response frame.
///
/// The id is kept as a raw JSON value so that frames with missing or
/// non-numeric ids still parse and can be reported as orphans rather than as
/// malformed input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    /// Correlation id as sent by the server
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    /// Result value of a successful call
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Error object of a failed call
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ServerError>,
}

impl ResponseEnvelope {
    /// Parses an inbound text frame.
    ///
    /// Only fails when the frame is not a JSON object, i.e. when no id can be
    /// recovered from it. Unknown members are ignored and the `error` member
    /// is accepted in any shape.
    pub fn parse(text: &str) -> serde_json::Result<Self> {
        let value: Value = serde_json::from_str(text)?;
        if !value.is_object() {
            return Err(serde::de::Error::custom("response frame is not a JSON object"));
        }
        serde_json::from_value(value)
    }

    /// Creates a successful response.
    pub fn success(id: RequestId, result: Value) -> Self {
        Self {
            id: Some(Value::from(id.get())),
            result: Some(result),
            error: None,
        }
    }

    /// Creates a failed response.
    pub fn failure(id: RequestId, error: ServerError) -> Self {
        Self {
            id: Some(Value::from(id.get())),
            result: None,
            error: Some(error),
        }
    }

    /// Returns the correlation id if the frame carries a numeric one.
    ///
    /// Ids encoded as decimal strings are accepted as well.
    pub fn request_id(&self) -> Option<RequestId> {
        let id = self.id.as_ref()?;
        id.as_u64()
            .or_else(|| id.as_str().and_then(|s| s.parse().ok()))
            .map(RequestId)
    }

    /// Returns `true` if the server reported an error.
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}
