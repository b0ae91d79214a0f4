//! Decoding of raw response bodies into result models or typed errors.

use bytes::Bytes;
use serde_json::Value;

use crate::client::{ClientError, ErrorDetails};

/// Status, body and request id of a completed HTTP exchange.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub body: Bytes,
    pub request_id: Option<String>,
}

impl RawResponse {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            body: body.into(),
            request_id: None,
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Result models that can be built from a decoded response envelope.
///
/// Construction must fail with [`ClientError::Parse`] when mandatory fields
/// are missing; there is no partially-built result.
pub trait FromEnvelope: Sized {
    fn from_envelope(value: Value) -> Result<Self, ClientError>;
}

impl FromEnvelope for Value {
    fn from_envelope(value: Value) -> Result<Self, ClientError> {
        Ok(value)
    }
}

/// Decode a response into `T`.
///
/// Non-JSON bodies become [`ClientError::Parse`] (or [`ClientError::Transport`]
/// for non-2xx statuses), bodies with an `error`, `errors` or `message` key
/// become [`ClientError::Api`].
pub fn parse<T: FromEnvelope>(raw: &RawResponse) -> Result<T, ClientError> {
    let value = decode(raw)?;
    T::from_envelope(value).map_err(|e| e.with_request_id(raw.request_id.clone()))
}

/// Classify a response that is already known to be a failure.
pub fn error_from(raw: &RawResponse) -> ClientError {
    match decode(raw) {
        Err(err) => err,
        Ok(_) => ClientError::transport(format!("HTTP {}", raw.status), Some(raw.status))
            .with_request_id(raw.request_id.clone()),
    }
}

fn decode(raw: &RawResponse) -> Result<Value, ClientError> {
    let value: Value = match serde_json::from_slice(&raw.body) {
        Ok(value) => value,
        Err(e) => {
            let err = if raw.is_success() {
                ClientError::parse(
                    format!("response body is not valid JSON: {}", e),
                    Some(raw.status),
                )
            } else {
                ClientError::transport(
                    format!("HTTP {}: {}", raw.status, String::from_utf8_lossy(&raw.body).trim()),
                    Some(raw.status),
                )
            };
            return Err(err.with_request_id(raw.request_id.clone()));
        }
    };

    if let Some(err) = api_error(&value, Some(raw.status)) {
        return Err(err.with_request_id(raw.request_id.clone()));
    }

    if !raw.is_success() {
        return Err(
            ClientError::transport(format!("HTTP {}", raw.status), Some(raw.status))
                .with_request_id(raw.request_id.clone()),
        );
    }

    Ok(value)
}

/// Build an API error if the body carries one.
pub fn api_error(value: &Value, status: Option<u16>) -> Option<ClientError> {
    let object = value.as_object()?;
    let (key, payload) = ["error", "errors", "message"]
        .into_iter()
        .find_map(|key| object.get(key).map(|v| (key, v)))?;

    if payload.is_null() {
        return None;
    }

    let mut details = ErrorDetails {
        code: status,
        ..ErrorDetails::default()
    };
    if key != "message" {
        if let Some(inner) = payload.as_object() {
            details.kind = inner.get("type").and_then(scalar_string);
            details.param = inner.get("param").and_then(scalar_string);
            details.api_code = inner.get("code").and_then(scalar_string);
        }
    }

    Some(ClientError::api(error_message(payload), details))
}

fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn error_message(payload: &Value) -> String {
    match payload {
        Value::String(s) => s.clone(),
        Value::Object(map) => match map.get("message") {
            Some(Value::String(s)) => s.clone(),
            _ => payload.to_string(),
        },
        Value::Array(entries) => itertools::join(entries.iter().map(error_message), "; "),
        other => other.to_string(),
    }
}
