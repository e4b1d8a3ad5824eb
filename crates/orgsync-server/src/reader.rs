//! Reads the registry and turns it into directory entities.
//!
//! Full reads fan out over a buffered stream, so at most
//! `settings.concurrency` registry requests are in flight and results come
//! back in enumeration order.

use std::{collections::BTreeMap, sync::Arc};

use futures::{StreamExt as _, TryStreamExt as _, stream};
use orgsync_core::{
  Settings,
  identity::{self, AccountGroup},
  mapping::{self, UserOutcome},
  registry::Registry,
  relevance::{Exclusion, RelevanceContext},
  source::Employee,
  target::{OrgUnit, User},
};
use uuid::Uuid;

use crate::{Error, Result};

/// What the registry says about one unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitState {
  /// The registry does not know the unit.
  Missing,
  /// The unit exists but is outside the exported tree.
  Excluded(Exclusion),
  /// The unit carries a substitute identity that cannot be used.
  Invalid,
  Mapped(Box<OrgUnit>),
}

pub struct Reader<R> {
  registry:     Arc<R>,
  settings:     Arc<Settings>,
  ctx:          Arc<RelevanceContext>,
  organisation: Uuid,
}

impl<R> Clone for Reader<R> {
  fn clone(&self) -> Self {
    Self {
      registry:     Arc::clone(&self.registry),
      settings:     Arc::clone(&self.settings),
      ctx:          Arc::clone(&self.ctx),
      organisation: self.organisation,
    }
  }
}

impl<R> Reader<R>
where
  R: Registry + 'static,
{
  /// `organisation` is fetched once at startup by the caller.
  pub fn new(registry: Arc<R>, settings: Arc<Settings>, organisation: Uuid) -> Self {
    let ctx = Arc::new(RelevanceContext::from(settings.as_ref()));
    Self { registry, settings, ctx, organisation }
  }

  pub fn registry(&self) -> &R {
    &self.registry
  }

  pub fn settings(&self) -> &Settings {
    &self.settings
  }

  pub fn context(&self) -> &RelevanceContext {
    &self.ctx
  }

  // ─── Org units ─────────────────────────────────────────────────────────────

  /// Whether `unit` belongs to the exported tree. The root is answered
  /// without a registry round trip.
  pub async fn is_relevant(&self, unit: Uuid) -> Result<bool> {
    if self.ctx.is_root(unit) {
      return Ok(true);
    }
    let scope = self
      .registry
      .read_unit_scope(unit)
      .await
      .map_err(Error::registry)?;
    Ok(scope.is_some_and(|s| self.ctx.is_relevant(&s)))
  }

  pub async fn read_org_unit(&self, uuid: Uuid) -> Result<UnitState> {
    let Some(source) = self
      .registry
      .read_org_unit(uuid)
      .await
      .map_err(Error::registry)?
    else {
      return Ok(UnitState::Missing);
    };

    if let Err(reason) = self.ctx.check(&source.scope) {
      tracing::debug!(%uuid, %reason, "org unit not exported");
      return Ok(UnitState::Excluded(reason));
    }

    match mapping::map_org_unit(&source, &self.settings) {
      Ok(unit) => Ok(UnitState::Mapped(Box::new(unit))),
      Err(err @ orgsync_core::Error::InvalidIdentifier { .. }) => {
        tracing::warn!(%uuid, %err, "org unit has an unusable substitute identity");
        Ok(UnitState::Invalid)
      }
      Err(err) => Err(err.into()),
    }
  }

  /// Every exported unit, keyed by its directory identifier.
  pub async fn read_all_org_units(&self) -> Result<BTreeMap<Uuid, OrgUnit>> {
    let root = self.settings.top_unit_uuid;
    let mut uuids = vec![root];
    uuids.extend(
      self
        .registry
        .org_unit_uuids(root)
        .await
        .map_err(Error::registry)?,
    );
    tracing::info!(count = uuids.len(), "org units found in registry");

    let reader = self.clone();
    let states: Vec<UnitState> = stream::iter(uuids)
      .map(move |uuid| {
        let reader = reader.clone();
        async move { reader.read_org_unit(uuid).await }
      })
      .buffered(self.settings.concurrency)
      .try_collect()
      .await?;

    let mut units = BTreeMap::new();
    for state in states {
      if let UnitState::Mapped(unit) = state {
        if units.contains_key(&unit.uuid) {
          tracing::error!(uuid = %unit.uuid, "duplicate org unit identifier, keeping the first");
          continue;
        }
        units.insert(unit.uuid, *unit);
      }
    }
    tracing::info!(count = units.len(), "org units to export");
    Ok(units)
  }

  // ─── Users ─────────────────────────────────────────────────────────────────

  /// Every person in the organisation, sorted.
  pub async fn employee_uuids(&self) -> Result<Vec<Uuid>> {
    let limit = self.settings.employee_page_size;
    let mut start = 0;
    let mut uuids = Vec::new();
    loop {
      let page = self
        .registry
        .employee_page(self.organisation, limit, start)
        .await
        .map_err(Error::registry)?;
      uuids.extend(page.items);
      if limit == 0 {
        break;
      }
      start = page.offset + limit;
      if start >= page.total {
        break;
      }
    }
    uuids.sort();
    uuids.dedup();
    Ok(uuids)
  }

  /// The directory users one person maps to. `None` when the registry does
  /// not know the person.
  pub async fn read_user(&self, person: Uuid) -> Result<Option<Vec<UserOutcome>>> {
    let Some(employee) = self
      .registry
      .read_employee(person)
      .await
      .map_err(Error::registry)?
    else {
      return Ok(None);
    };

    let groups = match identity::group_accounts_by_engagement(
      person,
      &employee.it_accounts,
      &self.settings.uuid_from_it_systems,
      &self.settings.user_key_it_systems,
    ) {
      Ok(groups) => groups,
      Err(err) => {
        tracing::warn!(%person, %err, "falling back to one user for the person");
        vec![AccountGroup::fallback()]
      }
    };

    let mut outcomes = Vec::with_capacity(groups.len());
    for group in &groups {
      let work_address = self.work_address(&employee, group).await?;
      match mapping::map_user(&employee, group, &self.ctx, &self.settings, work_address) {
        Ok(outcome) => outcomes.push(outcome),
        Err(
          err @ (orgsync_core::Error::TemplateSyntax { .. }
          | orgsync_core::Error::TemplateRender { .. }),
        ) => return Err(err.into()),
        Err(err) => {
          tracing::warn!(%person, %err, "cannot map user, removing it");
          outcomes.push(UserOutcome::Delete(person));
        }
      }
    }
    Ok(Some(outcomes))
  }

  async fn work_address(
    &self,
    employee: &Employee,
    group: &AccountGroup,
  ) -> Result<Option<String>> {
    let names = &self.settings.employee_engagement_address;
    if names.is_empty() {
      return Ok(None);
    }
    let engagements = mapping::group_engagements(
      employee,
      group,
      &self.ctx,
      self.settings.use_extension_field_as_job_function,
    );
    let Some(unit) = mapping::work_address_unit(employee.uuid, &engagements) else {
      return Ok(None);
    };
    let addresses = self
      .registry
      .read_unit_addresses(unit)
      .await
      .map_err(Error::registry)?;
    Ok(mapping::work_address(&addresses, names))
  }

  /// Every exported user, keyed by its directory identifier. When two
  /// persons claim the same identifier the first in sorted person order wins.
  pub async fn read_all_users(&self) -> Result<BTreeMap<Uuid, User>> {
    let persons = self.employee_uuids().await?;
    tracing::info!(count = persons.len(), "persons found in registry");

    let reader = self.clone();
    let per_person: Vec<Option<Vec<UserOutcome>>> = stream::iter(persons)
      .map(move |person| {
        let reader = reader.clone();
        async move { reader.read_user(person).await }
      })
      .buffered(self.settings.concurrency)
      .try_collect()
      .await?;

    let mut users = BTreeMap::new();
    for outcome in per_person.into_iter().flatten().flatten() {
      let UserOutcome::Upsert(user) = outcome else {
        continue;
      };
      if users.contains_key(&user.uuid) {
        tracing::error!(uuid = %user.uuid, "duplicate user identifier, keeping the first");
        continue;
      }
      users.insert(user.uuid, *user);
    }
    tracing::info!(count = users.len(), "users to export");
    Ok(users)
  }
}
