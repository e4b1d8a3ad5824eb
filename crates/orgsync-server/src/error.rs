//! Error type for the exporter and its HTTP surface.

use std::error::Error as StdError;

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use orgsync_core::Transient;
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] orgsync_core::Error),

  #[error("registry error: {source}")]
  Registry {
    #[source]
    source:    Box<dyn StdError + Send + Sync>,
    transient: bool,
  },

  #[error("directory error: {source}")]
  Directory {
    #[source]
    source:    Box<dyn StdError + Send + Sync>,
    transient: bool,
  },

  /// Nothing was read below the root. Deleting now would empty the
  /// directory service.
  #[error("no org units found below {0}; refusing to continue")]
  NoOrgUnits(Uuid),

  #[error("no users found; refusing to continue")]
  NoUsers,

  #[error("hierarchy snapshot {0} was not ready in time")]
  HierarchyTimeout(Uuid),

  #[error("unknown event kind {0:?}")]
  UnknownEvent(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
  pub fn registry<E>(err: E) -> Self
  where
    E: StdError + Transient + Send + Sync + 'static,
  {
    let transient = err.is_transient();
    Error::Registry { source: Box::new(err), transient }
  }

  pub fn directory<E>(err: E) -> Self
  where
    E: StdError + Transient + Send + Sync + 'static,
  {
    let transient = err.is_transient();
    Error::Directory { source: Box::new(err), transient }
  }
}

impl Transient for Error {
  fn is_transient(&self) -> bool {
    match self {
      Error::Registry { transient, .. } | Error::Directory { transient, .. } => {
        *transient
      }
      // A snapshot that never became ready is retried like a lost connection.
      Error::HierarchyTimeout(_) => true,
      _ => false,
    }
  }
}

impl IntoResponse for Error {
  fn into_response(self) -> Response {
    let status = match &self {
      Error::UnknownEvent(_) => StatusCode::NOT_FOUND,
      Error::NoOrgUnits(_) | Error::NoUsers => StatusCode::CONFLICT,
      Error::Registry { transient: true, .. }
      | Error::Directory { transient: true, .. }
      | Error::HierarchyTimeout(_) => StatusCode::SERVICE_UNAVAILABLE,
      _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(json!({ "error": self.to_string() }))).into_response()
  }
}
