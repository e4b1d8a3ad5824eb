//! Decides whether an org unit belongs in the export.
//!
//! A unit is relevant when it is the root, or when it sits below the root, is
//! not excluded (explicitly, through an excluded ancestor, or by level or
//! type), and either no hierarchy allow-list is configured, its hierarchy is
//! on the list, or it carries an account in one of the substitute-identity
//! systems.

use std::collections::HashSet;

use uuid::Uuid;

use crate::{Settings, source::UnitScope};

/// Why a unit was left out. Only used for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum Exclusion {
  NoParent,
  OutsideRoot,
  ExcludedUnit,
  ExcludedAncestor,
  IgnoredLevel,
  IgnoredType,
  OutsideHierarchy,
}

#[derive(Debug, Clone, Default)]
pub struct RelevanceContext {
  pub root:               Uuid,
  pub hierarchy_names:    Vec<String>,
  pub ignored_levels:     HashSet<Uuid>,
  pub ignored_types:      HashSet<Uuid>,
  pub excluded_units:     HashSet<Uuid>,
  /// Systems whose accounts pull a unit in regardless of hierarchy.
  pub substitute_systems: Vec<String>,
}

impl From<&Settings> for RelevanceContext {
  fn from(settings: &Settings) -> Self {
    Self {
      root:               settings.top_unit_uuid,
      hierarchy_names:    settings.filter_hierarchy_names.clone(),
      ignored_levels:     settings.ignored_unit_levels.iter().copied().collect(),
      ignored_types:      settings.ignored_unit_types.iter().copied().collect(),
      excluded_units:     settings.filter_orgunit_uuid.iter().copied().collect(),
      substitute_systems: settings.uuid_from_it_systems.clone(),
    }
  }
}

impl RelevanceContext {
  pub fn is_root(&self, uuid: Uuid) -> bool {
    uuid == self.root
  }

  pub fn is_relevant(&self, unit: &UnitScope) -> bool {
    self.check(unit).is_ok()
  }

  /// Same as [`is_relevant`](Self::is_relevant) but says which rule failed.
  pub fn check(&self, unit: &UnitScope) -> Result<(), Exclusion> {
    if self.is_root(unit.uuid) {
      return Ok(());
    }
    if unit.parent.is_none() {
      return Err(Exclusion::NoParent);
    }
    if !unit.ancestors.contains(&self.root) {
      return Err(Exclusion::OutsideRoot);
    }

    if self.excluded_units.contains(&unit.uuid) {
      return Err(Exclusion::ExcludedUnit);
    }
    if unit.ancestors.iter().any(|a| self.excluded_units.contains(a)) {
      return Err(Exclusion::ExcludedAncestor);
    }
    if unit.unit_level.is_some_and(|l| self.ignored_levels.contains(&l)) {
      return Err(Exclusion::IgnoredLevel);
    }
    if unit.unit_type.is_some_and(|t| self.ignored_types.contains(&t)) {
      return Err(Exclusion::IgnoredType);
    }

    if self.hierarchy_names.is_empty() || self.has_substitute_account(unit) {
      return Ok(());
    }
    match &unit.hierarchy {
      Some(name) if self.hierarchy_names.contains(name) => Ok(()),
      _ => Err(Exclusion::OutsideHierarchy),
    }
  }

  fn has_substitute_account(&self, unit: &UnitScope) -> bool {
    unit
      .it_accounts
      .iter()
      .any(|a| self.substitute_systems.contains(&a.system_name))
  }
}
