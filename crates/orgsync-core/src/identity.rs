//! Identity substitution.
//!
//! When an entity has an account in one of the configured substitute-identity
//! systems, the directory service knows it by that account's user-key instead
//! of the registry's own identifier. This module picks those identifiers,
//! groups a person's accounts per engagement, and finds identifiers left
//! behind by terminated accounts.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
  Error, Result,
  source::{ItAccount, Registration, UnitScope},
  target::{OrgUnit, Position},
};

// ─── Substitution ────────────────────────────────────────────────────────────

fn priority(systems: &[String], name: &str) -> Option<usize> {
  systems.iter().position(|s| s == name)
}

/// The user-key of the highest-priority account among `systems`, if any.
pub fn substitute_key<'a>(
  accounts: &'a [ItAccount],
  systems: &[String],
) -> Option<&'a str> {
  accounts
    .iter()
    .filter_map(|a| priority(systems, &a.system_name).map(|p| (p, a)))
    .min_by_key(|(p, _)| *p)
    .map(|(_, a)| a.user_key.as_str())
}

/// The identifier the directory service should use: the highest-priority
/// substitute key, or `native` when there is none.
pub fn substitute_id(
  accounts: &[ItAccount],
  native: Uuid,
  systems: &[String],
) -> Result<Uuid> {
  match substitute_key(accounts, systems) {
    Some(key) => parse_key(key),
    None => Ok(native),
  }
}

pub fn parse_key(key: &str) -> Result<Uuid> {
  Uuid::parse_str(key.trim()).map_err(|source| Error::InvalidIdentifier {
    value: key.to_string(),
    source,
  })
}

/// Replace a mapped unit's own identifier and its parent reference with
/// their substitutes.
pub fn overwrite_unit_uuids(
  unit: &mut OrgUnit,
  own_accounts: &[ItAccount],
  parent_accounts: &[ItAccount],
  systems: &[String],
) -> Result<()> {
  unit.uuid = substitute_id(own_accounts, unit.uuid, systems)?;
  if let Some(parent) = unit.parent_org_unit_uuid {
    unit.parent_org_unit_uuid =
      Some(substitute_id(parent_accounts, parent, systems)?);
  }
  Ok(())
}

/// Replace every position's org-unit reference with the unit's substitute.
/// `units` supplies the IT-accounts of the referenced units.
pub fn overwrite_position_uuids(
  positions: &mut [Position],
  units: &[UnitScope],
  systems: &[String],
) -> Result<()> {
  for position in positions {
    let accounts = units
      .iter()
      .find(|u| u.uuid == position.org_unit_uuid)
      .map(|u| u.it_accounts.as_slice())
      .unwrap_or_default();
    position.org_unit_uuid =
      substitute_id(accounts, position.org_unit_uuid, systems)?;
  }
  Ok(())
}

// ─── Engagement grouping ─────────────────────────────────────────────────────

/// The identities one directory user is built from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountGroup {
  /// Restricts the user to this engagement; `None` uses all of them.
  pub engagement:    Option<Uuid>,
  pub substitute_id: Option<String>,
  pub username:      Option<String>,
}

impl AccountGroup {
  /// The single ungrouped identity used when a person has no relevant
  /// accounts.
  pub fn fallback() -> Self {
    Self::default()
  }
}

/// Group a person's accounts by the engagement they are tied to.
///
/// Only accounts in `substitute_systems` or `username_systems` are
/// considered. Each group has at most one substitute key; two different keys
/// on the same engagement is [`Error::AmbiguousIdentity`]. With no relevant
/// accounts a single [`AccountGroup::fallback`] is returned.
pub fn group_accounts_by_engagement(
  person: Uuid,
  accounts: &[ItAccount],
  substitute_systems: &[String],
  username_systems: &[String],
) -> Result<Vec<AccountGroup>> {
  let mut groups: BTreeMap<Option<Uuid>, Vec<&ItAccount>> = BTreeMap::new();
  for account in accounts {
    let relevant = substitute_systems.contains(&account.system_name)
      || username_systems.contains(&account.system_name);
    if relevant {
      groups.entry(account.engagement).or_default().push(account);
    }
  }

  if groups.is_empty() {
    return Ok(vec![AccountGroup::fallback()]);
  }

  groups
    .into_iter()
    .map(|(engagement, members)| {
      let keys: BTreeSet<&str> = members
        .iter()
        .filter(|a| substitute_systems.contains(&a.system_name))
        .map(|a| a.user_key.as_str())
        .collect();
      if keys.len() > 1 {
        return Err(Error::AmbiguousIdentity { person, engagement });
      }

      let username = members
        .iter()
        .filter_map(|a| priority(username_systems, &a.system_name).map(|p| (p, a)))
        .min_by_key(|(p, _)| *p)
        .map(|(_, a)| a.user_key.clone());

      Ok(AccountGroup {
        engagement,
        substitute_id: keys.into_iter().next().map(str::to_string),
        username,
      })
    })
    .collect()
}

// ─── Terminated accounts ─────────────────────────────────────────────────────

/// Directory identifiers that belonged to terminated accounts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaleIdentities {
  pub users:     BTreeSet<Uuid>,
  pub org_units: BTreeSet<Uuid>,
}

impl StaleIdentities {
  pub fn is_empty(&self) -> bool {
    self.users.is_empty() && self.org_units.is_empty()
  }
}

pub fn is_terminated(
  valid_to: Option<DateTime<chrono::FixedOffset>>,
  now: DateTime<Utc>,
) -> bool {
  valid_to.is_some_and(|to| to <= now)
}

/// Keys from ended registrations in `systems` that are not still active in
/// another registration. Keys that are not UUIDs are skipped.
pub fn terminated_substitute_ids(
  registrations: &[Registration],
  systems: &[String],
  now: DateTime<Utc>,
) -> StaleIdentities {
  let relevant: Vec<&Registration> = registrations
    .iter()
    .filter(|r| systems.contains(&r.system_name))
    .collect();

  let active: HashSet<&str> = relevant
    .iter()
    .filter(|r| !is_terminated(r.valid_to, now))
    .map(|r| r.user_key.as_str())
    .collect();

  let mut stale = StaleIdentities::default();
  for registration in relevant {
    if !is_terminated(registration.valid_to, now)
      || active.contains(registration.user_key.as_str())
    {
      continue;
    }
    let Ok(uuid) = Uuid::parse_str(registration.user_key.trim()) else {
      tracing::debug!(
        user_key = %registration.user_key,
        "terminated account key is not a uuid, skipping"
      );
      continue;
    };
    if registration.person.is_some() {
      stale.users.insert(uuid);
    }
    if registration.org_unit.is_some() {
      stale.org_units.insert(uuid);
    }
  }
  stale
}
