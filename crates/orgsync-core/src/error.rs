//! Error types for `orgsync-core`.

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum Error {
  #[error("org unit not found: {0}")]
  OrgUnitNotFound(Uuid),

  #[error("employee not found: {0}")]
  EmployeeNotFound(Uuid),

  /// More than one substitute-identity account is tied to the same
  /// engagement of a person.
  #[error("ambiguous substitute identity for {person} (engagement {engagement:?})")]
  AmbiguousIdentity {
    person:     Uuid,
    engagement: Option<Uuid>,
  },

  #[error("user {0} has no positions")]
  NoPositions(Uuid),

  /// A substitute identifier read from an IT-account is not a UUID.
  #[error("invalid identifier {value:?}: {source}")]
  InvalidIdentifier {
    value:  String,
    #[source]
    source: uuid::Error,
  },

  #[error("invalid settings: {0}")]
  InvalidSettings(String),

  #[error("no template field named {0:?}")]
  UnknownTemplateField(String),

  #[error("template for {field} does not parse: {source}")]
  TemplateSyntax {
    field:  String,
    #[source]
    source: minijinja::Error,
  },

  #[error("template for {field} failed to render: {source}")]
  TemplateRender {
    field:  String,
    #[source]
    source: minijinja::Error,
  },

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Classifies collaborator errors that are worth retrying.
///
/// Implemented by the registry and directory backends so the sync driver can
/// decide whether an outer retry makes sense without knowing the transport.
pub trait Transient {
  /// `true` for connection-level failures (refused, reset, timed out).
  fn is_transient(&self) -> bool;
}

impl Transient for Error {
  fn is_transient(&self) -> bool {
    false
  }
}
