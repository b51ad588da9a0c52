//! Classified errors crossing from the transport into the sync layer.

use thiserror::Error;

/// Errors surfaced by the synchronization layer.
///
/// Transport failures are classified once, at the HTTP boundary, so callers only ever
/// match on what the failure means for them (retry, re-authenticate, show verbatim).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SyncError {
  /// The request did not complete within the configured timeout.
  #[error("request timed out")]
  Timeout,

  /// Connection refused, reset, or otherwise lost before a response arrived.
  #[error("connection error: {0}")]
  Connection(String),

  /// The server answered with a 5xx status.
  #[error("server error ({status}): {}", message.as_deref().unwrap_or("no details"))]
  Server { status: u16, message: Option<String> },

  /// The credential was rejected (401). Never retried.
  #[error("unauthorized: {}", message.as_deref().unwrap_or("session expired"))]
  Unauthorized { message: Option<String> },

  /// Any other 4xx. Never retried.
  #[error("request rejected ({status}): {}", message.as_deref().unwrap_or("no details"))]
  Rejected { status: u16, message: Option<String> },

  /// The response body did not have the expected shape.
  #[error("malformed response: {0}")]
  Decode(String),

  /// An authenticated call was attempted without an active session.
  #[error("authentication required")]
  AuthRequired,

  /// Local persistence failed.
  #[error("storage error: {0}")]
  Storage(String),

  /// Input rejected before any request was made.
  #[error("invalid input: {0}")]
  InvalidInput(String),
}

impl SyncError {
  /// Classify a non-success HTTP status into the matching variant.
  pub fn from_status(status: u16, message: Option<String>) -> Self {
    match status {
      401 => Self::Unauthorized { message },
      500..=599 => Self::Server { status, message },
      _ => Self::Rejected { status, message },
    }
  }

  /// Whether the request executor may try again.
  pub fn is_retryable(&self) -> bool {
    matches!(
      self,
      Self::Timeout | Self::Connection(_) | Self::Server { .. }
    )
  }

  /// Whether this failure should end the current session.
  pub fn is_auth_failure(&self) -> bool {
    matches!(self, Self::Unauthorized { .. })
  }

  /// Message suitable for display: the server's own message when it sent one.
  pub fn user_message(&self, fallback: &str) -> String {
    match self {
      Self::Server {
        message: Some(m), ..
      }
      | Self::Rejected {
        message: Some(m), ..
      }
      | Self::Unauthorized { message: Some(m) } => m.clone(),
      Self::AuthRequired => "Please log in to perform this action.".to_string(),
      Self::InvalidInput(m) => m.clone(),
      _ => fallback.to_string(),
    }
  }
}

impl From<color_eyre::Report> for SyncError {
  fn from(report: color_eyre::Report) -> Self {
    Self::Storage(report.to_string())
  }
}

pub type SyncResult<T> = Result<T, SyncError>;
