//! Backends for the directory service.
//!
//! [`Directory::from_settings`] picks the HTTP client or, when the configured
//! URL is `stub`, a backend that only logs.

mod client;
mod stub;

pub mod error;

pub use client::{CLIENT_NAME, DirectoryClient};
pub use error::{Error, Result};
pub use stub::StubDirectory;

use orgsync_core::{
  directory::DirectoryService,
  settings::Settings,
  target::{Hierarchy, OrgUnit, User},
};
use uuid::Uuid;

/// The directory backend chosen at startup.
#[derive(Clone)]
pub enum Directory {
  Http(DirectoryClient),
  Stub(StubDirectory),
}

impl Directory {
  pub fn from_settings(settings: &Settings) -> Result<Self> {
    if settings.directory.is_stub() {
      tracing::warn!("directory service is stubbed; nothing will be written");
      return Ok(Directory::Stub(StubDirectory));
    }
    Ok(Directory::Http(DirectoryClient::new(
      &settings.directory,
      &settings.municipality,
    )?))
  }
}

impl DirectoryService for Directory {
  type Error = Error;

  async fn get_org_unit(&self, uuid: Uuid) -> Result<Option<OrgUnit>> {
    match self {
      Directory::Http(c) => c.get_org_unit(uuid).await,
      Directory::Stub(s) => s.get_org_unit(uuid).await,
    }
  }

  async fn post_org_unit<'a>(&'a self, unit: &'a OrgUnit) -> Result<()> {
    match self {
      Directory::Http(c) => c.post_org_unit(unit).await,
      Directory::Stub(s) => s.post_org_unit(unit).await,
    }
  }

  async fn delete_org_unit(&self, uuid: Uuid) -> Result<()> {
    match self {
      Directory::Http(c) => c.delete_org_unit(uuid).await,
      Directory::Stub(s) => s.delete_org_unit(uuid).await,
    }
  }

  async fn post_user<'a>(&'a self, user: &'a User) -> Result<()> {
    match self {
      Directory::Http(c) => c.post_user(user).await,
      Directory::Stub(s) => s.post_user(user).await,
    }
  }

  async fn delete_user(&self, uuid: Uuid) -> Result<()> {
    match self {
      Directory::Http(c) => c.delete_user(uuid).await,
      Directory::Stub(s) => s.delete_user(uuid).await,
    }
  }

  async fn trigger_hierarchy(&self) -> Result<Uuid> {
    match self {
      Directory::Http(c) => c.trigger_hierarchy().await,
      Directory::Stub(s) => s.trigger_hierarchy().await,
    }
  }

  async fn get_hierarchy(&self, request: Uuid) -> Result<Option<Hierarchy>> {
    match self {
      Directory::Http(c) => c.get_hierarchy(request).await,
      Directory::Stub(s) => s.get_hierarchy(request).await,
    }
  }
}
