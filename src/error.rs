//! Crate-level error taxonomy.
//!
//! | Variant | Meaning | HTTP |
//! |---|---|---|
//! | `Protocol` | bad frame or message from a device; connection-fatal | 500 |
//! | `NotFound` | unknown device identifier | 404 |
//! | `Transport` | write/read failure on an established socket | 500 |
//! | `BadRequest` | missing or malformed query parameter | 400 |
//!
//! A failing parameter source is not an error here: the registry falls back
//! to an empty description.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::net::FrameError;
use crate::protocol::CodecError;

#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("protocol error: {0}")]
    Protocol(String),
    #[error("No such UI: {0}")]
    NotFound(String),
    #[error("Send failed: {0}")]
    Transport(#[source] std::io::Error),
    #[error("{0}")]
    BadRequest(String),
}

impl BridgeError {
    pub fn status(&self) -> StatusCode {
        match self {
            BridgeError::NotFound(_) => StatusCode::NOT_FOUND,
            BridgeError::BadRequest(_) => StatusCode::BAD_REQUEST,
            BridgeError::Protocol(_) | BridgeError::Transport(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<FrameError> for BridgeError {
    fn from(err: FrameError) -> Self {
        match err {
            FrameError::Io(e) => BridgeError::Transport(e),
            FrameError::Closed => BridgeError::Transport(std::io::ErrorKind::NotConnected.into()),
            too_large @ FrameError::TooLarge { .. } => BridgeError::Protocol(too_large.to_string()),
        }
    }
}

impl From<CodecError> for BridgeError {
    fn from(err: CodecError) -> Self {
        BridgeError::Protocol(err.to_string())
    }
}

impl IntoResponse for BridgeError {
    fn into_response(self) -> Response {
        (self.status(), self.to_string()).into_response()
    }
}
