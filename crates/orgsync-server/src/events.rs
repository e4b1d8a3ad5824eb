//! Incremental handlers: one registry change, one owner re-synced.
//!
//! Every handler resolves the changed object to the unit or person that owns
//! it, re-reads that owner and writes or deletes exactly its directory
//! entries. Handlers are idempotent, so replaying an event is harmless.

use chrono::Utc;
use orgsync_core::{
  directory::DirectoryService, identity, mapping::UserOutcome, registry::Registry,
};
use tracing::Instrument as _;
use uuid::Uuid;

use crate::{
  Error, Result,
  reader::UnitState,
  sync::Exporter,
};

/// The kinds of registry change the exporter reacts to.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumString, strum::EnumIter,
)]
#[strum(serialize_all = "snake_case")]
pub enum EventKind {
  OrgUnit,
  Person,
  Address,
  #[strum(serialize = "ituser")]
  ItUser,
  Manager,
  Engagement,
  Kle,
}

impl EventKind {
  pub fn parse(kind: &str) -> Result<Self> {
    kind.parse().map_err(|_| Error::UnknownEvent(kind.to_string()))
  }
}

/// What happened to one unit during a single-entity sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitSync {
  /// The registry does not know the unit; nothing was written.
  Missing,
  Deleted,
  /// Posted under this directory identifier.
  Upserted(Uuid),
}

impl<R, D> Exporter<R, D>
where
  R: Registry + 'static,
  D: DirectoryService + 'static,
{
  /// Dispatch one event.
  pub async fn handle(&self, kind: EventKind, uuid: Uuid) -> Result<()> {
    let span = tracing::info_span!("event", %kind, %uuid);
    async {
      match kind {
        EventKind::OrgUnit => self.on_org_unit(uuid).await,
        EventKind::Person => self.sync_person(uuid).await.map(|_| ()),
        EventKind::Address => self.on_address(uuid).await,
        EventKind::ItUser => self.on_it_account(uuid).await,
        EventKind::Manager => self.on_manager(uuid).await,
        EventKind::Engagement => self.on_engagement(uuid).await,
        EventKind::Kle => self.on_kle(uuid).await,
      }
    }
    .instrument(span)
    .await
  }

  // ─── Owners ────────────────────────────────────────────────────────────────

  /// Upsert or delete one unit according to the registry.
  pub async fn sync_org_unit(&self, uuid: Uuid) -> Result<UnitSync> {
    match self.reader().read_org_unit(uuid).await? {
      UnitState::Missing => {
        tracing::info!(%uuid, "org unit not found in registry");
        Ok(UnitSync::Missing)
      }
      UnitState::Excluded(_) | UnitState::Invalid => {
        self.delete_org_unit(uuid).await?;
        Ok(UnitSync::Deleted)
      }
      UnitState::Mapped(unit) => {
        let id = unit.uuid;
        self.upsert_org_unit(*unit).await?;
        Ok(UnitSync::Upserted(id))
      }
    }
  }

  /// Sync a unit reached through one of its objects. Units outside the
  /// exported tree are left alone; `None` when it was skipped.
  async fn sync_owning_unit(&self, unit: Uuid) -> Result<Option<UnitSync>> {
    if !self.reader().is_relevant(unit).await? {
      tracing::debug!(%unit, "owning org unit is not exported, skipping");
      return Ok(None);
    }
    self.sync_org_unit(unit).await.map(Some)
  }

  /// Write every user the person maps to and delete the rest. Returns the
  /// identifiers that were posted.
  pub async fn sync_person(&self, person: Uuid) -> Result<Vec<Uuid>> {
    let Some(outcomes) = self.reader().read_user(person).await? else {
      tracing::info!(%person, "person not found in registry");
      self.delete_user(person).await?;
      return Ok(Vec::new());
    };

    let mut posted = Vec::new();
    let mut deleted = Vec::new();
    for outcome in outcomes {
      match outcome {
        UserOutcome::Upsert(user) => {
          self.post_user(&user).await?;
          posted.push(user.uuid);
        }
        UserOutcome::Delete(uuid) => {
          if !deleted.contains(&uuid) {
            self.delete_user(uuid).await?;
            deleted.push(uuid);
          }
        }
      }
    }
    if posted.is_empty() && !deleted.contains(&person) {
      self.delete_user(person).await?;
    }
    Ok(posted)
  }

  // ─── Handlers ──────────────────────────────────────────────────────────────

  async fn on_org_unit(&self, uuid: Uuid) -> Result<()> {
    if self.sync_org_unit(uuid).await? == UnitSync::Missing {
      self.delete_org_unit(uuid).await?;
    }

    let persons = self
      .reader()
      .registry()
      .unit_employees(uuid)
      .await
      .map_err(Error::registry)?;
    tracing::info!(%uuid, count = persons.len(), "re-syncing employees of org unit");
    for person in persons {
      self.sync_person(person).await?;
    }
    Ok(())
  }

  async fn on_address(&self, uuid: Uuid) -> Result<()> {
    let owners = self
      .reader()
      .registry()
      .find_address_owner(uuid)
      .await
      .map_err(Error::registry)?;
    let Some(owners) = owners else {
      tracing::debug!(%uuid, "address not found");
      return Ok(());
    };

    if let Some(unit) = owners.org_unit {
      self.sync_owning_unit(unit).await?;
    } else if let Some(person) = owners.person {
      self.sync_person(person).await?;
    } else {
      tracing::warn!(%uuid, "address has no owner");
    }
    Ok(())
  }

  async fn on_it_account(&self, uuid: Uuid) -> Result<()> {
    let registry = self.reader().registry();
    let owners = registry
      .find_it_account_owner(uuid)
      .await
      .map_err(Error::registry)?;
    let Some(owners) = owners else {
      tracing::debug!(%uuid, "it account not found");
      return Ok(());
    };

    if self.settings().substitutes_identity() {
      let systems = &self.settings().uuid_from_it_systems;
      let registrations = registry
        .it_account_registrations(uuid)
        .await
        .map_err(Error::registry)?;
      let stale = identity::terminated_substitute_ids(&registrations, systems, Utc::now());
      for unit in stale.org_units {
        tracing::info!(%unit, "deleting org unit of terminated account");
        self.delete_org_unit(unit).await?;
      }
      for user in stale.users {
        tracing::info!(%user, "deleting user of terminated account");
        self.delete_user(user).await?;
      }
    }

    if let Some(unit) = owners.org_unit {
      // A unit now represented under a substitute identity must not also
      // remain under its registry identifier.
      if let Some(UnitSync::Upserted(id)) = self.sync_owning_unit(unit).await?
        && id != unit
      {
        self.delete_org_unit(unit).await?;
      }
    } else if let Some(person) = owners.person {
      let posted = self.sync_person(person).await?;
      if !posted.is_empty() && !posted.contains(&person) {
        self.delete_user(person).await?;
      }
    } else {
      tracing::warn!(%uuid, "it account has no owner");
    }
    Ok(())
  }

  async fn on_manager(&self, uuid: Uuid) -> Result<()> {
    let unit = self
      .reader()
      .registry()
      .find_manager_unit(uuid)
      .await
      .map_err(Error::registry)?;
    match unit {
      Some(unit) => self.sync_owning_unit(unit).await.map(|_| ()),
      None => {
        tracing::debug!(%uuid, "manager not found");
        Ok(())
      }
    }
  }

  async fn on_engagement(&self, uuid: Uuid) -> Result<()> {
    let person = self
      .reader()
      .registry()
      .find_engagement_person(uuid)
      .await
      .map_err(Error::registry)?;
    match person {
      Some(person) => self.sync_person(person).await.map(|_| ()),
      None => {
        tracing::debug!(%uuid, "engagement not found");
        Ok(())
      }
    }
  }

  async fn on_kle(&self, uuid: Uuid) -> Result<()> {
    let unit = self
      .reader()
      .registry()
      .find_kle_unit(uuid)
      .await
      .map_err(Error::registry)?;
    match unit {
      Some(unit) => self.sync_owning_unit(unit).await.map(|_| ()),
      None => {
        tracing::debug!(%uuid, "kle not found");
        Ok(())
      }
    }
  }
}
