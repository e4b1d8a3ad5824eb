//! Immutable export settings.
//!
//! Deserialised once at process start (see the server binary), validated with
//! [`Settings::validate`], then shared behind an `Arc` by every component.

use std::{collections::BTreeMap, fmt};

use serde::Deserialize;
use uuid::Uuid;

use crate::{Error, Result, template};

/// Strings are never truncated below this length, so identifier-shaped
/// fields always survive intact.
pub const MIN_TRUNCATE_LENGTH: usize = 36;

// ─── Collaborator endpoints ──────────────────────────────────────────────────

/// Where the source registry lives.
#[derive(Clone, Deserialize)]
pub struct RegistrySettings {
  #[serde(default = "default_registry_url")]
  pub url:          String,
  /// Bearer token sent with every registry request, if set.
  #[serde(default)]
  pub token:        Option<String>,
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs: u64,
  /// Check the registry's TLS certificate.
  #[serde(default = "default_true")]
  pub verify_tls:   bool,
}

impl Default for RegistrySettings {
  fn default() -> Self {
    Self {
      url:          default_registry_url(),
      token:        None,
      timeout_secs: default_timeout_secs(),
      verify_tls:   true,
    }
  }
}

impl fmt::Debug for RegistrySettings {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("RegistrySettings")
      .field("url", &self.url)
      .field("token", &self.token.as_ref().map(|_| "<redacted>"))
      .field("timeout_secs", &self.timeout_secs)
      .field("verify_tls", &self.verify_tls)
      .finish()
  }
}

/// Where the directory service lives. The URL `stub` selects a backend that
/// only logs what it would have sent.
#[derive(Debug, Clone, Deserialize)]
pub struct DirectorySettings {
  #[serde(default = "default_directory_url")]
  pub url:          String,
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs: u64,
  #[serde(default = "default_true")]
  pub verify_tls:   bool,
}

impl Default for DirectorySettings {
  fn default() -> Self {
    Self {
      url:          default_directory_url(),
      timeout_secs: default_timeout_secs(),
      verify_tls:   true,
    }
  }
}

impl DirectorySettings {
  pub fn is_stub(&self) -> bool {
    self.url == "stub"
  }
}

// ─── Settings ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
  /// Municipality number, sent as the `CVR` header to the directory service.
  pub municipality:  String,
  /// The root of the exported tree. Never deleted from the directory service.
  pub top_unit_uuid: Uuid,

  #[serde(default)]
  pub registry:  RegistrySettings,
  #[serde(default)]
  pub directory: DirectorySettings,

  /// Export national ID numbers on persons.
  #[serde(default)]
  pub xfer_cpr: bool,
  /// Delete orphan org units on full sync.
  #[serde(default)]
  pub autowash: bool,

  // Address-type priority lists.
  #[serde(default)]
  pub phone_scope_classes:    Vec<Uuid>,
  #[serde(default)]
  pub landline_scope_classes: Vec<Uuid>,
  #[serde(default)]
  pub email_scope_classes:    Vec<Uuid>,

  // Relevance.
  #[serde(default)]
  pub ignored_unit_levels:    Vec<Uuid>,
  #[serde(default)]
  pub ignored_unit_types:     Vec<Uuid>,
  /// Units excluded together with everything below them.
  #[serde(default)]
  pub filter_orgunit_uuid:    Vec<Uuid>,
  #[serde(default)]
  pub filter_hierarchy_names: Vec<String>,

  #[serde(default)]
  pub sync_managers:         bool,
  #[serde(default = "default_true")]
  pub enable_kle:            bool,
  #[serde(default)]
  pub use_contact_for_tasks: bool,

  /// Address-type names tried, in order, for a user's work address.
  #[serde(default)]
  pub employee_engagement_address: Vec<String>,

  /// IT-system names whose account user-key replaces the registry identifier,
  /// highest priority first.
  #[serde(default)]
  pub uuid_from_it_systems: Vec<String>,
  /// IT-system names whose account user-key is the username, highest
  /// priority first.
  #[serde(default = "default_user_key_it_systems")]
  pub user_key_it_systems:  Vec<String>,
  /// Users without a username account are not exported.
  #[serde(default)]
  pub filter_users_by_it_system: bool,

  #[serde(default)]
  pub use_extension_field_as_job_function: bool,

  #[serde(default = "default_truncate_length")]
  pub truncate_length:    usize,
  /// Upper bound on concurrent registry reads during a full sync.
  #[serde(default = "default_concurrency")]
  pub concurrency:        usize,
  /// Page size of the employee listing; 0 fetches everything in one request.
  #[serde(default = "default_employee_page_size")]
  pub employee_page_size: usize,

  /// Jinja templates keyed by the user field they replace, see
  /// [`template`].
  #[serde(default)]
  pub templates: BTreeMap<String, String>,
}

impl Settings {
  /// Minimal settings for the given municipality and root; everything else
  /// takes its default.
  pub fn new(municipality: impl Into<String>, top_unit_uuid: Uuid) -> Self {
    Self {
      municipality: municipality.into(),
      top_unit_uuid,
      registry: RegistrySettings::default(),
      directory: DirectorySettings::default(),
      xfer_cpr: false,
      autowash: false,
      phone_scope_classes: Vec::new(),
      landline_scope_classes: Vec::new(),
      email_scope_classes: Vec::new(),
      ignored_unit_levels: Vec::new(),
      ignored_unit_types: Vec::new(),
      filter_orgunit_uuid: Vec::new(),
      filter_hierarchy_names: Vec::new(),
      sync_managers: false,
      enable_kle: true,
      use_contact_for_tasks: false,
      employee_engagement_address: Vec::new(),
      uuid_from_it_systems: Vec::new(),
      user_key_it_systems: default_user_key_it_systems(),
      filter_users_by_it_system: false,
      use_extension_field_as_job_function: false,
      truncate_length: default_truncate_length(),
      concurrency: default_concurrency(),
      employee_page_size: default_employee_page_size(),
      templates: BTreeMap::new(),
    }
  }

  /// Reject settings that would make the exporter misbehave at runtime.
  pub fn validate(&self) -> Result<()> {
    if self.municipality.trim().is_empty() {
      return Err(Error::InvalidSettings("municipality must be set".into()));
    }
    if self.top_unit_uuid.is_nil() {
      return Err(Error::InvalidSettings("top_unit_uuid must not be nil".into()));
    }
    if self.concurrency == 0 {
      return Err(Error::InvalidSettings("concurrency must be at least 1".into()));
    }
    if self.registry.url.is_empty() || self.directory.url.is_empty() {
      return Err(Error::InvalidSettings(
        "registry.url and directory.url must be set".into(),
      ));
    }
    if self.filter_orgunit_uuid.contains(&self.top_unit_uuid) {
      return Err(Error::InvalidSettings(
        "top_unit_uuid cannot be listed in filter_orgunit_uuid".into(),
      ));
    }
    template::validate(&self.templates)

  }

  /// Length strings are cut to, never below [`MIN_TRUNCATE_LENGTH`].
  pub fn effective_truncate_length(&self) -> usize {
    self.truncate_length.max(MIN_TRUNCATE_LENGTH)
  }

  /// Whether identifiers are substituted from IT-accounts at all.
  pub fn substitutes_identity(&self) -> bool {
    !self.uuid_from_it_systems.is_empty()
  }
}

fn default_registry_url() -> String {
  "http://mo:5000".to_string()
}

fn default_directory_url() -> String {
  "http://os2sync:5000/api".to_string()
}

fn default_timeout_secs() -> u64 {
  30
}

fn default_true() -> bool {
  true
}

fn default_user_key_it_systems() -> Vec<String> {
  vec!["Active Directory".to_string()]
}

fn default_truncate_length() -> usize {
  200
}

fn default_concurrency() -> usize {
  5
}

fn default_employee_page_size() -> usize {
  1_000
}
