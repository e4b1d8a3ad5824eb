//! Error type for `orgsync-directory`.

use orgsync_core::Transient;
use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] orgsync_core::Error),

  #[error("http error: {0}")]
  Http(#[from] reqwest::Error),

  #[error("{method} {url} returned {status}")]
  Status {
    method: &'static str,
    url:    String,
    status: StatusCode,
  },

  /// `GET /hierarchy` answered with something other than a request id.
  #[error("invalid hierarchy request id {body:?}: {source}")]
  RequestId {
    body:   String,
    #[source]
    source: uuid::Error,
  },

  #[error("invalid header value: {0}")]
  Header(#[from] reqwest::header::InvalidHeaderValue),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
  pub fn status(&self) -> Option<StatusCode> {
    match self {
      Error::Status { status, .. } => Some(*status),
      Error::Http(e) => e.status(),
      _ => None,
    }
  }
}

impl Transient for Error {
  fn is_transient(&self) -> bool {
    match self {
      Error::Http(e) => e.is_connect() || e.is_timeout(),
      Error::Status { status, .. } => matches!(
        *status,
        StatusCode::BAD_GATEWAY
          | StatusCode::SERVICE_UNAVAILABLE
          | StatusCode::GATEWAY_TIMEOUT
      ),
      _ => false,
    }
  }
}
