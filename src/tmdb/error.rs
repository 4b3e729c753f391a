//! Failure classification for upstream requests.

use thiserror::Error;

use crate::retry::Retryable;

/// Error returned by catalogue fetches.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
  /// HTTP 4xx. The request itself is wrong; retrying will not help.
  #[error("Request rejected ({status}): {message}")]
  Network { status: u16, message: String },

  /// HTTP 5xx
  #[error("Server error ({status}): {message}")]
  Server { status: u16, message: String },

  /// Connection refused, DNS failure, timeout and other transport failures
  #[error("No connection: {0}")]
  NoConnection(String),

  /// Unparseable or empty response, or any other uncategorized failure
  #[error("Unknown error: {0}")]
  Unknown(String),
}

/// Payload-free discriminant of [`FetchError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
  Network,
  Server,
  NoConnection,
  Unknown,
}

impl FetchError {
  /// Classify a non-success HTTP status.
  pub fn from_status(status: u16, message: impl Into<String>) -> Self {
    let message = message.into();
    match status {
      400..=499 => FetchError::Network { status, message },
      500..=599 => FetchError::Server { status, message },
      _ => FetchError::Unknown(format!("Unexpected HTTP status {}: {}", status, message)),
    }
  }

  /// Classify a failure raised by the HTTP client before a status was received.
  pub fn from_transport(err: reqwest::Error) -> Self {
    if err.is_timeout() || err.is_connect() || err.is_request() || err.is_body() {
      FetchError::NoConnection(err.to_string())
    } else {
      FetchError::Unknown(err.to_string())
    }
  }

  pub fn kind(&self) -> ErrorKind {
    match self {
      FetchError::Network { .. } => ErrorKind::Network,
      FetchError::Server { .. } => ErrorKind::Server,
      FetchError::NoConnection(_) => ErrorKind::NoConnection,
      FetchError::Unknown(_) => ErrorKind::Unknown,
    }
  }
}

impl Retryable for FetchError {
  fn is_retryable(&self) -> bool {
    matches!(self.kind(), ErrorKind::Server | ErrorKind::NoConnection)
  }
}
