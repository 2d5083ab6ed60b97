//! Log messages and request encoding.
//!
//! A [`LogMessage`] is either plain text or a structured record. Encoding turns
//! it, together with a resolved URL, into an [`EncodedRequest`] that the
//! delivery loop sends unchanged on every attempt.

use crate::{Error, Result};
use bytes::Bytes;
use http::{HeaderValue, Method};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use url::Url;

/// Content type for plain text messages.
pub const TEXT_CONTENT_TYPE: &str = "text/plain";

/// Content type for structured records.
///
/// The body is JSON, but the ingestion endpoint expects this label for it.
pub const RECORD_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// A single log submission.
///
/// # Examples
///
/// ```
/// use logship::LogMessage;
/// use serde_json::json;
///
/// let text = LogMessage::from("user signed in");
/// assert!(matches!(text, LogMessage::Text(_)));
///
/// let record = LogMessage::record(&json!({ "level": "error", "msg": "boom" })).unwrap();
/// assert!(matches!(record, LogMessage::Record(_)));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum LogMessage {
    /// A plain text line, sent verbatim.
    Text(String),

    /// A key/value record, sent as a JSON object.
    Record(Map<String, Value>),
}

impl LogMessage {
    /// Builds a structured record from any value that serializes to a JSON object.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Encoding`] if serialization fails (for example a map
    /// with non-string keys) or the value is not an object.
    pub fn record<T>(value: &T) -> Result<Self>
    where
        T: Serialize + ?Sized,
    {
        match serde_json::to_value(value).map_err(|e| Error::Encoding(e.to_string()))? {
            Value::Object(map) => Ok(LogMessage::Record(map)),
            other => Err(Error::Encoding(format!(
                "a log record must serialize to a JSON object, got {}",
                json_kind(&other)
            ))),
        }
    }

    /// Returns `true` for empty text or a record without fields.
    pub fn is_empty(&self) -> bool {
        match self {
            LogMessage::Text(text) => text.is_empty(),
            LogMessage::Record(map) => map.is_empty(),
        }
    }

    /// Returns the content type the message is sent with.
    pub fn content_type(&self) -> &'static str {
        match self {
            LogMessage::Text(_) => TEXT_CONTENT_TYPE,
            LogMessage::Record(_) => RECORD_CONTENT_TYPE,
        }
    }

    /// Encodes the message into an outbound `POST` request to `url`.
    ///
    /// The caller is expected to have run [`validate`] first.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Encoding`] if a record cannot be written as JSON.
    pub fn encode(&self, url: Url) -> Result<EncodedRequest> {
        let body = match self {
            LogMessage::Text(text) => Bytes::copy_from_slice(text.as_bytes()),
            LogMessage::Record(map) => serde_json::to_vec(map)
                .map(Bytes::from)
                .map_err(|e| Error::Encoding(e.to_string()))?,
        };

        Ok(EncodedRequest {
            method: Method::POST,
            url,
            content_type: HeaderValue::from_static(self.content_type()),
            body,
        })
    }
}

impl From<&str> for LogMessage {
    fn from(text: &str) -> Self {
        LogMessage::Text(text.to_string())
    }
}

impl From<String> for LogMessage {
    fn from(text: String) -> Self {
        LogMessage::Text(text)
    }
}

impl From<Map<String, Value>> for LogMessage {
    fn from(map: Map<String, Value>) -> Self {
        LogMessage::Record(map)
    }
}

impl From<HashMap<String, Value>> for LogMessage {
    fn from(map: HashMap<String, Value>) -> Self {
        LogMessage::Record(map.into_iter().collect())
    }
}

impl From<BTreeMap<String, Value>> for LogMessage {
    fn from(map: BTreeMap<String, Value>) -> Self {
        LogMessage::Record(map.into_iter().collect())
    }
}

/// Checks the preconditions shared by every send: a message and a token.
///
/// Empty text counts as a missing message. A record without fields is still
/// a JSON object and is sent as `{}`.
///
/// # Errors
///
/// Returns [`Error::Validation`] describing the first violated precondition.
pub fn validate(message: &LogMessage, token: Option<&str>) -> Result<()> {
    if matches!(message, LogMessage::Text(text) if text.is_empty()) {
        return Err(Error::Validation("log message must not be empty".to_string()));
    }
    validate_token(token)
}

/// Checks that a non-empty token is configured.
///
/// # Errors
///
/// Returns [`Error::Validation`] if the token is absent or empty.
pub fn validate_token(token: Option<&str>) -> Result<()> {
    match token {
        Some(token) if !token.is_empty() => Ok(()),
        _ => Err(Error::Validation(
            "no token configured; set one before sending".to_string(),
        )),
    }
}

/// An outbound request, built once and replayed byte-for-byte on retries.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedRequest {
    /// Always `POST`.
    pub method: Method,

    /// The resolved destination URL.
    pub url: Url,

    /// The `Content-Type` header value.
    pub content_type: HeaderValue,

    /// The request body.
    pub body: Bytes,
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
