//! Error taxonomy for the API layer.
//!
//! `from_status` classifies HTTP failures; the backend reports failures as a
//! JSON body whose `message` field is either a string or an array of strings
//! (validation errors), and `extract_message` pulls that out so the session
//! layer can surface it verbatim.

use serde::Deserialize;
use thiserror::Error;

use crate::auth::credentials::StoreError;

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("storage error: {0}")]
    Storage(#[from] StoreError),

    #[error("network error: {0}")]
    Network(reqwest::Error),

    #[error("request timed out")]
    Timeout,

    #[error("unauthorized - credential rejected by server")]
    Unauthorized,

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("request failed with status {status}{}", fmt_detail(.message))]
    Unknown {
        status: u16,
        message: Option<String>,
    },
}

fn fmt_detail(message: &Option<String>) -> String {
    match message {
        Some(m) => format!(": {m}"),
        None => String::new(),
    }
}

/// Error body shape used by the backend; `message` is a plain string for
/// generic failures and an array of strings for field validation.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: MessageField,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum MessageField {
    One(String),
    Many(Vec<String>),
}

impl ApiError {
    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let message = extract_message(body);
        let raw_detail = || {
            if body.trim().is_empty() {
                None
            } else {
                Some(truncate_body(body))
            }
        };
        match status.as_u16() {
            401 => ApiError::Unauthorized,
            400 => match message {
                Some(m) => ApiError::Validation(m),
                None => ApiError::Unknown {
                    status: 400,
                    message: raw_detail(),
                },
            },
            _ => ApiError::Unknown {
                status: status.as_u16(),
                message: message.or_else(raw_detail),
            },
        }
    }

    /// The human-readable message the server attached, if any.
    pub fn server_message(&self) -> Option<&str> {
        match self {
            ApiError::Validation(m) => Some(m),
            ApiError::Unknown {
                message: Some(m), ..
            } => Some(m),
            _ => None,
        }
    }

    /// Whether retrying could plausibly change the outcome.
    pub fn is_transient(&self) -> bool {
        matches!(self, ApiError::Network(_) | ApiError::Timeout)
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ApiError::Timeout
        } else {
            ApiError::Network(e)
        }
    }
}

/// Pull the `message` field out of an error body, joining validation arrays.
fn extract_message(body: &str) -> Option<String> {
    let parsed: ErrorBody = serde_json::from_str(body).ok()?;
    match parsed.message {
        MessageField::One(m) if !m.is_empty() => Some(m),
        MessageField::Many(ms) if !ms.is_empty() => Some(ms.join(", ")),
        _ => None,
    }
}

/// Truncate a response body to avoid carrying excessive data in errors
fn truncate_body(body: &str) -> String {
    if body.len() <= MAX_ERROR_BODY_LENGTH {
        body.to_string()
    } else {
        format!(
            "{}... (truncated, {} total bytes)",
            &body[..MAX_ERROR_BODY_LENGTH],
            body.len()
        )
    }
}
