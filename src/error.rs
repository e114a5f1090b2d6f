//! Error types for the blog client.
//!
//! Every failure degrades to an anonymous or error-displayed state; nothing
//! here is fatal to the process.

use std::collections::BTreeMap;
use std::fmt;

use reqwest::StatusCode;
use thiserror::Error;

pub type ClientResult<T> = Result<T, ClientError>;

/// A malformed access token. Treated as "not logged in".
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("token is not a three-part JWT")]
    Malformed,

    #[error("token payload is not valid base64: {0}")]
    Base64(String),

    #[error("token payload is not valid JSON: {0}")]
    Json(String),

    #[error("token payload carries no user id")]
    MissingSubject,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("session database error: {0}")]
    Sled(#[from] sled::Error),

    #[error("stored value for {key} is not UTF-8")]
    Encoding { key: &'static str },
}

/// Per-field validation messages, shown inline next to each form field.
///
/// Messages that do not belong to a single field are filed under
/// [`FieldErrors::NON_FIELD`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub const NON_FIELD: &'static str = "non_field_errors";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.entry(field.into()).or_default().push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> &[String] {
        self.0.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    /// First message for a field, as rendered under the input.
    pub fn first(&self, field: &str) -> Option<&str> {
        self.get(field).first().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Turn into `Err(ClientError::Validation)` when any message was recorded.
    pub fn into_result(self) -> ClientResult<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(ClientError::Validation(self))
        }
    }

    /// Parse a server 400 body.
    ///
    /// Accepts `{"field": ["msg", ...]}`, `{"field": "msg"}`, `{"error": "msg"}`
    /// and `{"detail": "msg"}`. Anything else becomes a single non-field message.
    pub fn from_body(body: &str) -> Self {
        let mut errors = Self::new();
        match serde_json::from_str::<serde_json::Value>(body) {
            Ok(serde_json::Value::Object(map)) => {
                for (key, value) in map {
                    let field = match key.as_str() {
                        "error" | "detail" => Self::NON_FIELD.to_string(),
                        _ => key,
                    };
                    match value {
                        serde_json::Value::String(msg) => errors.add(field, msg),
                        serde_json::Value::Array(items) => {
                            for item in items {
                                match item {
                                    serde_json::Value::String(msg) => errors.add(field.clone(), msg),
                                    other => errors.add(field.clone(), other.to_string()),
                                }
                            }
                        }
                        other => errors.add(field, other.to_string()),
                    }
                }
            }
            Ok(serde_json::Value::Array(items)) => {
                for item in items {
                    match item {
                        serde_json::Value::String(msg) => errors.add(Self::NON_FIELD, msg),
                        other => errors.add(Self::NON_FIELD, other.to_string()),
                    }
                }
            }
            _ => {
                if !body.trim().is_empty() {
                    errors.add(Self::NON_FIELD, body.trim());
                }
            }
        }
        errors
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, messages) in &self.0 {
            for message in messages {
                if !first {
                    f.write_str("; ")?;
                }
                first = false;
                write!(f, "{field}: {message}")?;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid access token: {0}")]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("network error: {0}")]
    Network(#[source] reqwest::Error),

    #[error("request was not authorized")]
    Unauthorized,

    /// Refresh failed; the stored session has already been cleared.
    #[error("session expired, please log in again")]
    SessionExpired,

    #[error("server responded {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("validation failed: {0}")]
    Validation(FieldErrors),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(String),
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ClientError::Status {
                status: err.status().unwrap_or(StatusCode::OK),
                body: err.to_string(),
            }
        } else {
            ClientError::Network(err)
        }
    }
}

impl From<sled::Error> for ClientError {
    fn from(err: sled::Error) -> Self {
        ClientError::Store(StoreError::Sled(err))
    }
}

impl ClientError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ClientError::Unauthorized | ClientError::SessionExpired)
    }

    /// Text shown to the user. Field errors are rendered inline elsewhere.
    pub fn user_message(&self) -> String {
        match self {
            ClientError::Validation(errors) => errors.to_string(),
            ClientError::SessionExpired => "Your session has expired. Please log in again.".into(),
            ClientError::Unauthorized => "You are not allowed to do that.".into(),
            ClientError::NotFound(what) => format!("{what} not found."),
            _ => "Something went wrong. Please try again.".into(),
        }
    }
}
