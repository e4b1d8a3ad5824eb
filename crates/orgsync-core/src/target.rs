//! Entities as the directory service accepts them.
//!
//! Field names follow the service's JSON contract (PascalCase, with a few
//! all-caps acronyms).

use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Org unit ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct OrgUnit {
  pub uuid:                 Uuid,
  pub short_key:            Option<String>,
  pub name:                 Option<String>,
  pub parent_org_unit_uuid: Option<Uuid>,
  pub payout_unit_uuid:     Option<Uuid>,
  pub manager_uuid:         Option<Uuid>,
  pub phone_number:         Option<String>,
  pub email:                Option<String>,
  pub location:             Option<String>,
  #[serde(rename = "LOSShortName")]
  pub los_short_name:       Option<String>,
  #[serde(rename = "LOSId")]
  pub los_id:               Option<String>,
  pub dtr_id:               Option<String>,
  pub contact_open_hours:   Option<String>,
  pub email_remarks:        Option<String>,
  pub contact:              Option<String>,
  pub post_return:          Option<String>,
  pub phone_open_hours:     Option<String>,
  pub ean:                  Option<String>,
  pub url:                  Option<String>,
  pub landline:             Option<String>,
  pub post:                 Option<String>,
  pub post_secondary:       Option<String>,
  #[serde(rename = "FOA")]
  pub foa:                  Option<String>,
  #[serde(rename = "PNR")]
  pub pnr:                  Option<String>,
  #[serde(rename = "SOR")]
  pub sor:                  Option<String>,
  #[serde(default, deserialize_with = "null_as_default")]
  pub tasks:                BTreeSet<Uuid>,
  #[serde(default, deserialize_with = "null_as_default")]
  pub it_systems:           BTreeSet<Uuid>,
  #[serde(default, deserialize_with = "null_as_default")]
  pub contact_for_tasks:    BTreeSet<Uuid>,
  #[serde(default, deserialize_with = "null_as_default")]
  pub contact_places:       BTreeSet<Uuid>,
}

impl OrgUnit {
  pub fn new(uuid: Uuid, name: impl Into<String>) -> Self {
    Self { uuid, name: Some(name.into()), ..Self::default() }
  }

  /// Carry over values the registry cannot supply from the representation
  /// currently held by the directory service.
  ///
  /// `LOSShortName` is always taken from `current`; the other service-owned
  /// fields only when this unit leaves them empty.
  pub fn merge_from(&mut self, current: OrgUnit) {
    self.los_short_name = current.los_short_name;
    if self.tasks.is_empty() {
      self.tasks = current.tasks;
    }
    if is_blank(&self.short_key) {
      self.short_key = current.short_key;
    }
    if self.payout_unit_uuid.is_none() {
      self.payout_unit_uuid = current.payout_unit_uuid;
    }
    if self.contact_places.is_empty() {
      self.contact_places = current.contact_places;
    }
    if is_blank(&self.contact_open_hours) {
      self.contact_open_hours = current.contact_open_hours;
    }
    if is_blank(&self.sor) {
      self.sor = current.sor;
    }
  }
}

fn is_blank(value: &Option<String>) -> bool {
  value.as_deref().is_none_or(str::is_empty)
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
  D: Deserializer<'de>,
  T: Default + Deserialize<'de>,
{
  Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

// ─── User ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Person {
  pub name: String,
  pub cpr:  Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Position {
  /// Job-function title.
  pub name:          String,
  pub org_unit_uuid: Uuid,
  pub start_date:    Option<NaiveDate>,
  pub stop_date:     Option<NaiveDate>,
}

impl Position {
  pub fn new(name: impl Into<String>, org_unit_uuid: Uuid) -> Self {
    Self {
      name: name.into(),
      org_unit_uuid,
      start_date: None,
      stop_date: None,
    }
  }
}

/// A directory user. Always holds at least one position; a person without
/// positions is represented by deleting the user instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct User {
  pub uuid:         Uuid,
  pub short_key:    Option<String>,
  pub user_id:      String,
  pub person:       Person,
  positions:        Vec<Position>,
  pub phone_number: Option<String>,
  pub landline:     Option<String>,
  pub email:        Option<String>,
  #[serde(rename = "RacfID")]
  pub racf_id:      Option<String>,
  pub location:     Option<String>,
  #[serde(rename = "FMKID")]
  pub fmk_id:       Option<String>,
}

impl User {
  /// Fails with [`Error::NoPositions`] when `positions` is empty.
  pub fn new(
    uuid: Uuid,
    user_id: impl Into<String>,
    person: Person,
    positions: Vec<Position>,
  ) -> Result<Self> {
    if positions.is_empty() {
      return Err(Error::NoPositions(uuid));
    }
    Ok(Self {
      uuid,
      short_key: None,
      user_id: user_id.into(),
      person,
      positions,
      phone_number: None,
      landline: None,
      email: None,
      racf_id: None,
      location: None,
      fmk_id: None,
    })
  }

  pub fn positions(&self) -> &[Position] {
    &self.positions
  }

  /// Mutable access to the positions; the slice cannot be emptied.
  pub fn positions_mut(&mut self) -> &mut [Position] {
    &mut self.positions
  }
}

// ─── Hierarchy snapshot ──────────────────────────────────────────────────────

/// Identifiers currently held by the directory service.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Hierarchy {
  pub org_units: BTreeSet<Uuid>,
  pub users:     BTreeSet<Uuid>,
}
