//! The `Exporter`: writes what the [`Reader`] produces to the directory
//! service, either for the whole organisation or one entity at a time.

use std::{sync::Arc, time::Duration};

use orgsync_core::{
  Settings,
  directory::DirectoryService,
  registry::Registry,
  target::{Hierarchy, OrgUnit, User},
};
use tokio::time::Instant;
use uuid::Uuid;

use crate::{Error, Result, reader::Reader, retry::RetryPolicy};

/// Retry and polling intervals of a full sync.
#[derive(Debug, Clone)]
pub struct Timing {
  /// Outer retry of the whole run on transient failures.
  pub retry:         RetryPolicy,
  pub poll_interval: Duration,
  /// How long to wait for the hierarchy snapshot before giving up.
  pub poll_timeout:  Duration,
}

impl Default for Timing {
  fn default() -> Self {
    Self {
      retry:         RetryPolicy::default(),
      poll_interval: Duration::from_secs(5),
      poll_timeout:  Duration::from_secs(10 * 60),
    }
  }
}

/// Counts from one full sync, for the closing log line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
  pub org_units:         usize,
  pub deleted_org_units: usize,
  pub users:             usize,
  pub deleted_users:     usize,
}

pub struct Exporter<R, D> {
  reader:    Reader<R>,
  directory: Arc<D>,
  timing:    Timing,
}

impl<R, D> Exporter<R, D>
where
  R: Registry + 'static,
  D: DirectoryService + 'static,
{
  pub fn new(reader: Reader<R>, directory: Arc<D>) -> Self {
    Self { reader, directory, timing: Timing::default() }
  }

  pub fn with_timing(mut self, timing: Timing) -> Self {
    self.timing = timing;
    self
  }

  pub fn reader(&self) -> &Reader<R> {
    &self.reader
  }

  pub fn directory(&self) -> &D {
    &self.directory
  }

  pub fn settings(&self) -> &Settings {
    self.reader.settings()
  }

  // ─── Directory writes ──────────────────────────────────────────────────────

  /// Create or update a unit, keeping the fields only the directory service
  /// knows.
  pub async fn upsert_org_unit(&self, mut unit: OrgUnit) -> Result<()> {
    let current = self
      .directory
      .get_org_unit(unit.uuid)
      .await
      .map_err(Error::directory)?;
    match current {
      Some(current) => {
        unit.merge_from(current);
        tracing::info!(uuid = %unit.uuid, "updating org unit");
      }
      None => tracing::info!(uuid = %unit.uuid, "creating org unit"),
    }
    self
      .directory
      .post_org_unit(&unit)
      .await
      .map_err(Error::directory)
  }

  /// Delete a unit. The root is never deleted.
  pub async fn delete_org_unit(&self, uuid: Uuid) -> Result<()> {
    if uuid == self.settings().top_unit_uuid {
      tracing::error!(%uuid, "refusing to delete the top unit");
      return Ok(());
    }
    tracing::info!(%uuid, "deleting org unit");
    self
      .directory
      .delete_org_unit(uuid)
      .await
      .map_err(Error::directory)
  }

  pub async fn post_user(&self, user: &User) -> Result<()> {
    tracing::info!(uuid = %user.uuid, "syncing user");
    self.directory.post_user(user).await.map_err(Error::directory)
  }

  pub async fn delete_user(&self, uuid: Uuid) -> Result<()> {
    tracing::info!(%uuid, "deleting user");
    self.directory.delete_user(uuid).await.map_err(Error::directory)
  }

  // ─── Full sync ─────────────────────────────────────────────────────────────

  /// Poll until the snapshot requested with `request` is ready.
  async fn await_hierarchy(&self, request: Uuid) -> Result<Hierarchy> {
    let deadline = Instant::now() + self.timing.poll_timeout;
    loop {
      match self.directory.get_hierarchy(request).await {
        Ok(Some(hierarchy)) => return Ok(hierarchy),
        Ok(None) => tracing::debug!(%request, "hierarchy snapshot not ready"),
        Err(err) => tracing::warn!(%request, %err, "hierarchy snapshot fetch failed"),
      }
      if Instant::now() + self.timing.poll_interval > deadline {
        return Err(Error::HierarchyTimeout(request));
      }
      tokio::time::sleep(self.timing.poll_interval).await;
    }
  }

  /// One pass over the whole organisation. Units are written before users
  /// and deletions come last, after both reads came back non-empty.
  pub async fn full_sync(&self) -> Result<SyncReport> {
    let mut report = SyncReport::default();
    let request = self
      .directory
      .trigger_hierarchy()
      .await
      .map_err(Error::directory)?;

    let units = self.reader.read_all_org_units().await?;
    if units.is_empty() {
      return Err(Error::NoOrgUnits(self.settings().top_unit_uuid));
    }
    for unit in units.values() {
      self.upsert_org_unit(unit.clone()).await?;
    }
    report.org_units = units.len();

    let users = self.reader.read_all_users().await?;
    if users.is_empty() {
      return Err(Error::NoUsers);
    }
    for user in users.values() {
      self.post_user(user).await?;
    }
    report.users = users.len();

    let existing = self.await_hierarchy(request).await?;

    let orphans: Vec<Uuid> = existing
      .users
      .iter()
      .filter(|uuid| !users.contains_key(*uuid))
      .copied()
      .collect();
    tracing::info!(count = orphans.len(), "users to delete");
    for uuid in orphans {
      self.delete_user(uuid).await?;
      report.deleted_users += 1;
    }

    if self.settings().autowash {
      let orphans: Vec<Uuid> = existing
        .org_units
        .iter()
        .filter(|uuid| !units.contains_key(*uuid))
        .copied()
        .collect();
      tracing::info!(count = orphans.len(), "org units to delete");
      for uuid in orphans {
        self.delete_org_unit(uuid).await?;
        report.deleted_org_units += 1;
      }
    }

    Ok(report)
  }

  /// [`full_sync`](Self::full_sync) with the effective configuration logged
  /// and transient failures retried.
  pub async fn run_full_sync(&self) -> Result<SyncReport> {
    tracing::info!(settings = ?self.settings(), "full sync starting");
    let report = self
      .timing
      .retry
      .execute("full sync", || self.full_sync())
      .await?;
    tracing::info!(
      org_units = report.org_units,
      deleted_org_units = report.deleted_org_units,
      users = report.users,
      deleted_users = report.deleted_users,
      "full sync done"
    );
    Ok(report)
  }
}
