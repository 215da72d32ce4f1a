//! Typed errors for the catalog client and the persistent store.

use std::time::Duration;
use thiserror::Error;

/// Failure of a catalog request.
///
/// Failures are values: the cache engine stores them on the entry and hands
/// clones to every caller that joined the same in-flight fetch.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HttpError {
  /// The server answered with a non-2xx status
  #[error("request failed with status {status}: {message}")]
  Status { status: u16, message: String },

  /// Connection, TLS or transport failure
  #[error("network error: {0}")]
  Network(String),

  /// No response within the configured limit
  #[error("request timed out after {0:?}")]
  Timeout(Duration),

  /// The body was not the JSON shape we expected
  #[error("invalid response body: {0}")]
  Parse(String),

  #[error("invalid request url: {0}")]
  InvalidUrl(String),

  /// The task driving the request went away before producing a result
  #[error("request was aborted before completing")]
  Aborted,
}

impl HttpError {
  /// HTTP status code, if the server produced one.
  pub fn status(&self) -> Option<u16> {
    match self {
      HttpError::Status { status, .. } => Some(*status),
      _ => None,
    }
  }
}

/// Failure inside the persistent key-value store.
///
/// These never reach the UI; `PersistentStore` logs and swallows them.
#[derive(Error, Debug)]
pub enum StorageError {
  #[error("failed to serialize value for {key}: {source}")]
  Serialize {
    key: String,
    #[source]
    source: serde_json::Error,
  },

  #[error("stored value for {key} is not valid JSON: {source}")]
  Parse {
    key: String,
    #[source]
    source: serde_json::Error,
  },

  #[error("storage backend error: {0}")]
  Backend(String),
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_http_error_display() {
    let err = HttpError::Status {
      status: 401,
      message: "Invalid API key".to_string(),
    };
    assert_eq!(
      err.to_string(),
      "request failed with status 401: Invalid API key"
    );
    assert_eq!(err.status(), Some(401));

    let err = HttpError::Timeout(Duration::from_secs(3));
    assert_eq!(err.to_string(), "request timed out after 3s");
    assert_eq!(err.status(), None);
  }

  #[test]
  fn test_storage_error_display() {
    let source = serde_json::from_str::<u8>("nope").unwrap_err();
    let err = StorageError::Parse {
      key: "tmdb_favorites".to_string(),
      source,
    };
    assert!(err
      .to_string()
      .starts_with("stored value for tmdb_favorites is not valid JSON"));
  }
}
