//! Error type for `orgsync-registry`.

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

  #[error("graphql errors: {0}")]
  GraphQl(String),

  #[error("graphql response missing data")]
  MissingData,

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  /// The registry returned several distinct owners for one object.
  #[error("object {0} has more than one owner")]
  AmbiguousOwner(uuid::Uuid),

  #[error("expected exactly one organisation, found {0}")]
  Organisation(usize),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

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
