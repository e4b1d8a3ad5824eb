//! Wire shapes of registry responses and their conversion into
//! `orgsync_core::source` records.

use std::collections::BTreeSet;

use chrono::{DateTime, FixedOffset};
use orgsync_core::source::{
  Address, AddressScope, AddressType, Employee, EmployeePage, Engagement,
  ItAccount, Kle, Manager, ManagerPerson, Owners, Registration, SourceOrgUnit,
  UnitScope,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{Error, Result};

// ─── Envelopes ───────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct GraphQlResponse<T> {
  pub data:   Option<T>,
  pub errors: Option<Vec<GraphQlError>>,
}

#[derive(Debug, Deserialize)]
pub struct GraphQlError {
  pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct Objects<T> {
  pub objects: Vec<T>,
}

#[derive(Debug, Deserialize)]
pub struct Current<T> {
  pub current: Option<T>,
}

#[derive(Debug, Deserialize)]
pub struct Validities<T> {
  pub validities: Vec<T>,
}

#[derive(Debug, Deserialize)]
pub struct PageInfo {
  pub next_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Paged<T> {
  pub objects:   Vec<T>,
  pub page_info: PageInfo,
}

#[derive(Debug, Deserialize)]
pub struct OrgUnits<T> {
  pub org_units: T,
}

#[derive(Debug, Deserialize)]
pub struct Employees<T> {
  pub employees: T,
}

#[derive(Debug, Deserialize)]
pub struct Addresses<T> {
  pub addresses: T,
}

#[derive(Debug, Deserialize)]
pub struct ItUsers<T> {
  pub itusers: T,
}

#[derive(Debug, Deserialize)]
pub struct Managers<T> {
  pub managers: T,
}

#[derive(Debug, Deserialize)]
pub struct Engagements<T> {
  pub engagements: T,
}

#[derive(Debug, Deserialize)]
pub struct Kles<T> {
  pub kles: T,
}

impl<T> Objects<Current<T>> {
  /// The current value of the single object, if any.
  pub fn into_current(self) -> Option<T> {
    self.objects.into_iter().next().and_then(|o| o.current)
  }

  pub fn into_all_current(self) -> Vec<T> {
    self.objects.into_iter().filter_map(|o| o.current).collect()
  }
}

// ─── Records ─────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct UuidRef {
  pub uuid: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct NameRef {
  pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct RawItSystem {
  pub uuid: Option<Uuid>,
  pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct RawItUser {
  pub user_key:        String,
  pub engagement_uuid: Option<Uuid>,
  pub itsystem:        RawItSystem,
}

impl From<RawItUser> for ItAccount {
  fn from(raw: RawItUser) -> Self {
    ItAccount {
      user_key:    raw.user_key.trim().to_string(),
      system_name: raw.itsystem.name.trim().to_string(),
      system_uuid: raw.itsystem.uuid,
      engagement:  raw.engagement_uuid,
    }
  }
}

fn accounts(raw: Vec<RawItUser>) -> Vec<ItAccount> {
  raw.into_iter().map(ItAccount::from).collect()
}

#[derive(Debug, Deserialize)]
pub struct RawVisibility {
  pub scope: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RawAddressType {
  pub uuid:     Uuid,
  #[serde(default)]
  pub user_key: String,
  #[serde(default)]
  pub name:     String,
  pub scope:    Option<AddressScope>,
}

#[derive(Debug, Deserialize)]
pub struct RawAddress {
  pub name:            Option<String>,
  pub engagement_uuid: Option<Uuid>,
  pub visibility:      Option<RawVisibility>,
  pub address_type:    RawAddressType,
}

/// Addresses without a value are dropped.
pub fn addresses(raw: Vec<RawAddress>) -> Vec<Address> {
  raw
    .into_iter()
    .filter_map(|a| {
      Some(Address {
        value:        a.name?,
        address_type: AddressType {
          uuid:     a.address_type.uuid,
          user_key: a.address_type.user_key,
          name:     a.address_type.name,
          scope:    a.address_type.scope,
        },
        visibility:   a.visibility.and_then(|v| v.scope),
        engagement:   a.engagement_uuid,
      })
    })
    .collect()
}

#[derive(Debug, Deserialize)]
pub struct RawParent {
  pub uuid:    Uuid,
  #[serde(default)]
  pub itusers: Vec<RawItUser>,
}

#[derive(Debug, Deserialize)]
pub struct RawScope {
  pub uuid:                     Uuid,
  pub parent:                   Option<RawParent>,
  #[serde(default)]
  pub ancestors:                Vec<UuidRef>,
  pub unit_type:                Option<UuidRef>,
  pub org_unit_level:           Option<UuidRef>,
  pub org_unit_hierarchy_model: Option<NameRef>,
  #[serde(default)]
  pub itusers:                  Vec<RawItUser>,
}

impl RawScope {
  /// Split off the parent's accounts, which only org-unit mapping needs.
  fn split(self) -> (UnitScope, Vec<ItAccount>) {
    let (parent, parent_accounts) = match self.parent {
      Some(p) => (Some(p.uuid), accounts(p.itusers)),
      None => (None, Vec::new()),
    };
    let scope = UnitScope {
      uuid: self.uuid,
      parent,
      ancestors: self.ancestors.into_iter().map(|a| a.uuid).collect(),
      unit_type: self.unit_type.map(|t| t.uuid),
      unit_level: self.org_unit_level.map(|l| l.uuid),
      hierarchy: self.org_unit_hierarchy_model.map(|h| h.name),
      it_accounts: accounts(self.itusers),
    };
    (scope, parent_accounts)
  }
}

impl From<RawScope> for UnitScope {
  fn from(raw: RawScope) -> Self {
    raw.split().0
  }
}

#[derive(Debug, Deserialize)]
pub struct RawManagerPerson {
  pub uuid:    Uuid,
  #[serde(default)]
  pub itusers: Vec<RawItUser>,
}

#[derive(Debug, Deserialize)]
pub struct RawManager {
  pub person: Option<Vec<RawManagerPerson>>,
}

#[derive(Debug, Deserialize)]
pub struct RawKle {
  pub kle_number: Vec<UuidRef>,
  #[serde(default)]
  pub kle_aspect: Vec<NameRef>,
}

#[derive(Debug, Deserialize)]
pub struct RawOrgUnit {
  #[serde(flatten)]
  pub scope:     RawScope,
  pub name:      String,
  #[serde(default)]
  pub addresses: Vec<RawAddress>,
  #[serde(default)]
  pub managers:  Vec<RawManager>,
  #[serde(default)]
  pub kles:      Vec<RawKle>,
}

impl From<RawOrgUnit> for SourceOrgUnit {
  fn from(raw: RawOrgUnit) -> Self {
    let (scope, parent_it_accounts) = raw.scope.split();
    let managers = raw
      .managers
      .into_iter()
      .map(|m| Manager {
        person: m.person.and_then(|p| p.into_iter().next()).map(|p| {
          ManagerPerson { uuid: p.uuid, it_accounts: accounts(p.itusers) }
        }),
      })
      .collect();
    let kles = raw
      .kles
      .into_iter()
      .flat_map(|k| {
        let aspects: Vec<Option<String>> = if k.kle_aspect.is_empty() {
          vec![None]
        } else {
          k.kle_aspect.into_iter().map(|a| Some(a.name)).collect()
        };
        k.kle_number.into_iter().flat_map(move |n| {
          aspects
            .clone()
            .into_iter()
            .map(move |aspect| Kle { number: n.uuid, aspect })
        })
      })
      .collect();

    SourceOrgUnit {
      scope,
      name: raw.name,
      parent_it_accounts,
      addresses: addresses(raw.addresses),
      managers,
      kles,
    }
  }
}

#[derive(Debug, Deserialize)]
pub struct RawEngagement {
  pub uuid:         Uuid,
  pub extension_3:  Option<String>,
  #[serde(default)]
  pub is_primary:   Option<bool>,
  pub job_function: Option<NameRef>,
  #[serde(default)]
  pub org_unit:     Vec<RawScope>,
}

#[derive(Debug, Deserialize)]
pub struct RawEmployee {
  pub uuid:        Uuid,
  pub name:        String,
  pub nickname:    Option<String>,
  pub cpr_number:  Option<String>,
  #[serde(default)]
  pub addresses:   Vec<RawAddress>,
  #[serde(default)]
  pub engagements: Vec<RawEngagement>,
  #[serde(default)]
  pub itusers:     Vec<RawItUser>,
}

fn non_empty(value: Option<String>) -> Option<String> {
  value.filter(|v| !v.trim().is_empty())
}

impl From<RawEmployee> for Employee {
  fn from(raw: RawEmployee) -> Self {
    let engagements = raw
      .engagements
      .into_iter()
      .filter_map(|e| {
        let unit = e.org_unit.into_iter().next()?;
        Some(Engagement {
          uuid:         e.uuid,
          job_function: e.job_function.map(|j| j.name).unwrap_or_default(),
          extension_3:  non_empty(e.extension_3),
          is_primary:   e.is_primary.unwrap_or(false),
          unit:         unit.into(),
        })
      })
      .collect();

    Employee {
      uuid: raw.uuid,
      name: raw.name,
      nickname: non_empty(raw.nickname),
      cpr: non_empty(raw.cpr_number),
      addresses: addresses(raw.addresses),
      engagements,
      it_accounts: accounts(raw.itusers),
    }
  }
}

#[derive(Debug, Deserialize)]
pub struct RawValidity {
  pub to: Option<DateTime<FixedOffset>>,
}

#[derive(Debug, Deserialize)]
pub struct RawRegistration {
  pub user_key:      String,
  pub itsystem:      NameRef,
  pub validity:      RawValidity,
  pub employee_uuid: Option<Uuid>,
  pub org_unit_uuid: Option<Uuid>,
}

impl From<RawRegistration> for Registration {
  fn from(raw: RawRegistration) -> Self {
    Registration {
      user_key:    raw.user_key.trim().to_string(),
      system_name: raw.itsystem.name.trim().to_string(),
      valid_to:    raw.validity.to,
      person:      raw.employee_uuid,
      org_unit:    raw.org_unit_uuid,
    }
  }
}

#[derive(Debug, Deserialize)]
pub struct RawOwner {
  #[serde(default)]
  pub org_unit_uuid: Option<Uuid>,
  #[serde(default)]
  pub employee_uuid: Option<Uuid>,
}

/// The owners across every validity of one object. `None` when the object
/// does not exist.
pub fn owners(object: Uuid, raw: Objects<Validities<RawOwner>>) -> Result<Option<Owners>> {
  let Some(first) = raw.objects.into_iter().next() else {
    return Ok(None);
  };
  let units: BTreeSet<Uuid> =
    first.validities.iter().filter_map(|v| v.org_unit_uuid).collect();
  let persons: BTreeSet<Uuid> =
    first.validities.iter().filter_map(|v| v.employee_uuid).collect();
  if units.len() > 1 || persons.len() > 1 {
    return Err(Error::AmbiguousOwner(object));
  }
  Ok(Some(Owners {
    org_unit: units.into_iter().next(),
    person:   persons.into_iter().next(),
  }))
}

// ─── REST ────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct RawEmployeePage {
  pub items:  Vec<UuidRef>,
  pub offset: usize,
  pub total:  usize,
}

impl From<RawEmployeePage> for EmployeePage {
  fn from(raw: RawEmployeePage) -> Self {
    EmployeePage {
      items:  raw.items.into_iter().map(|i| i.uuid).collect(),
      offset: raw.offset,
      total:  raw.total,
    }
  }
}
