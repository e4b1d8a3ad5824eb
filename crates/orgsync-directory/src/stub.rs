//! A directory backend that only logs what it would have sent.
//!
//! Selected with `directory.url = "stub"` for dry runs against a live
//! registry.

use orgsync_core::{
  directory::DirectoryService,
  target::{Hierarchy, OrgUnit, User},
};
use uuid::Uuid;

use crate::Result;

#[derive(Debug, Clone, Copy, Default)]
pub struct StubDirectory;

impl DirectoryService for StubDirectory {
  type Error = crate::Error;

  async fn get_org_unit(&self, uuid: Uuid) -> Result<Option<OrgUnit>> {
    tracing::info!(%uuid, "stub: GET org unit");
    Ok(None)
  }

  async fn post_org_unit<'a>(&'a self, unit: &'a OrgUnit) -> Result<()> {
    tracing::info!(uuid = %unit.uuid, body = %serde_json::to_string(unit)?, "stub: POST org unit");
    Ok(())
  }

  async fn delete_org_unit(&self, uuid: Uuid) -> Result<()> {
    tracing::info!(%uuid, "stub: DELETE org unit");
    Ok(())
  }

  async fn post_user<'a>(&'a self, user: &'a User) -> Result<()> {
    tracing::info!(uuid = %user.uuid, body = %serde_json::to_string(user)?, "stub: POST user");
    Ok(())
  }

  async fn delete_user(&self, uuid: Uuid) -> Result<()> {
    tracing::info!(%uuid, "stub: DELETE user");
    Ok(())
  }

  async fn trigger_hierarchy(&self) -> Result<Uuid> {
    let request = Uuid::new_v4();
    tracing::info!(%request, "stub: GET hierarchy");
    Ok(request)
  }

  /// The stub holds nothing, so nothing is ever orphaned.
  async fn get_hierarchy(&self, request: Uuid) -> Result<Option<Hierarchy>> {
    tracing::info!(%request, "stub: GET hierarchy snapshot");
    Ok(Some(Hierarchy::default()))
  }
}
