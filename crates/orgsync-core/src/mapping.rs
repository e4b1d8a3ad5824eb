//! Turns registry records into directory entities.
//!
//! Everything here is pure. Relevance of the unit being mapped is the
//! caller's concern; relevance of the units a person's engagements point at
//! is applied here.

use std::collections::BTreeSet;

use uuid::Uuid;

use crate::{
  Result, Settings,
  identity::{self, AccountGroup},
  relevance::RelevanceContext,
  sanitize::Sanitize,
  source::{
    Address, AddressScope, Employee, Engagement, Kle, Manager, ManagerPerson,
    SourceOrgUnit,
  },
  target::{OrgUnit, Person, Position, User},
  template,
};

const ASPECT_PERFORMING: &str = "Udførende";
const ASPECT_RESPONSIBLE: &str = "Ansvarlig";

// ─── Address selection ───────────────────────────────────────────────────────

/// Pick one value among `candidates`.
///
/// Only public candidates whose type is listed in `priority` are considered;
/// the one whose type comes first in the list wins, and on equal rank the
/// first encountered candidate is kept.
pub fn pick_address<'a, I>(candidates: I, priority: &[Uuid]) -> Option<&'a str>
where
  I: IntoIterator<Item = &'a Address>,
{
  candidates
    .into_iter()
    .filter(|a| a.is_public())
    .filter_map(|a| {
      priority
        .iter()
        .position(|p| *p == a.address_type.uuid)
        .map(|rank| (rank, a))
    })
    .min_by_key(|(rank, _)| *rank)
    .map(|(_, a)| a.value.as_str())
}

/// Contact values of a directory user.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserContact {
  pub phone:    Option<String>,
  pub landline: Option<String>,
  pub email:    Option<String>,
}

/// Split a person's addresses into landline, email and phone candidates and
/// pick one of each.
pub fn user_contact<'a, I>(addresses: I, settings: &Settings) -> UserContact
where
  I: IntoIterator<Item = &'a Address>,
{
  let mut landlines = Vec::new();
  let mut emails = Vec::new();
  let mut phones = Vec::new();
  for address in addresses {
    if settings.landline_scope_classes.contains(&address.address_type.uuid) {
      landlines.push(address);
    } else {
      match address.scope() {
        Some(AddressScope::Email) => emails.push(address),
        Some(AddressScope::Phone) => phones.push(address),
        _ => {}
      }
    }
  }

  UserContact {
    phone:    pick_address(phones, &settings.phone_scope_classes).map(String::from),
    landline: pick_address(landlines, &settings.landline_scope_classes)
      .map(String::from),
    email:    pick_address(emails, &settings.email_scope_classes).map(String::from),
  }
}

/// Set a unit's address fields from its addresses.
///
/// Email, phone and landline go through [`pick_address`] when their priority
/// list is configured; every other field takes the last matching address in
/// registry order.
pub fn apply_unit_addresses(unit: &mut OrgUnit, addresses: &[Address], settings: &Settings) {
  fn last<'a>(slot: &mut Option<String>, candidates: impl IntoIterator<Item = &'a Address>) {
    if let Some(a) = candidates.into_iter().last() {
      *slot = Some(a.value.clone());
    }
  }

  fn pick<'a>(
    slot: &mut Option<String>,
    candidates: Vec<&'a Address>,
    priority: &[Uuid],
  ) {
    if priority.is_empty() {
      last(slot, candidates);
    } else if let Some(value) = pick_address(candidates, priority) {
      *slot = Some(value.to_string());
    }
  }

  let scoped = |scope: AddressScope| {
    addresses.iter().filter(move |a| a.scope() == Some(scope))
  };
  let keyed = |scope: AddressScope, key: &'static str| {
    scoped(scope).filter(move |a| a.address_type.user_key == key)
  };

  let (landlines, phones): (Vec<&Address>, Vec<&Address>) = scoped(AddressScope::Phone)
    .partition(|a| settings.landline_scope_classes.contains(&a.address_type.uuid));

  pick(&mut unit.email, scoped(AddressScope::Email).collect(), &settings.email_scope_classes);
  pick(&mut unit.phone_number, phones, &settings.phone_scope_classes);
  pick(&mut unit.landline, landlines, &settings.landline_scope_classes);

  last(&mut unit.ean, scoped(AddressScope::Ean));
  last(&mut unit.pnr, scoped(AddressScope::Pnumber));
  last(&mut unit.location, keyed(AddressScope::Dar, "Location"));
  last(&mut unit.contact, keyed(AddressScope::Dar, "Contact"));
  last(
    &mut unit.post,
    scoped(AddressScope::Dar)
      .filter(|a| !matches!(a.address_type.user_key.as_str(), "Location" | "Contact")),
  );
  last(&mut unit.contact_open_hours, keyed(AddressScope::Text, "ContactOpenHours"));
  last(&mut unit.dtr_id, keyed(AddressScope::Text, "DtrId"));
}

/// The first address, in `names` order, whose type name is listed.
pub fn work_address(addresses: &[Address], names: &[String]) -> Option<String> {
  addresses
    .iter()
    .filter_map(|a| {
      names
        .iter()
        .position(|n| *n == a.address_type.name)
        .map(|rank| (rank, a))
    })
    .min_by_key(|(rank, _)| *rank)
    .map(|(_, a)| a.value.clone())
}

// ─── Tasks and managers ──────────────────────────────────────────────────────

/// Task classifications of a unit as `(Tasks, ContactForTasks)`.
///
/// Without `split` every classification is a task. With it, performing
/// classifications are tasks, responsible ones are contact-for-tasks and the
/// rest are dropped.
pub fn kle_to_tasks(kles: &[Kle], split: bool) -> (BTreeSet<Uuid>, BTreeSet<Uuid>) {
  if !split {
    return (kles.iter().map(|k| k.number).collect(), BTreeSet::new());
  }
  let with_aspect = |aspect: &str| {
    kles
      .iter()
      .filter(|k| k.aspect.as_deref() == Some(aspect))
      .map(|k| k.number)
      .collect::<BTreeSet<_>>()
  };
  (with_aspect(ASPECT_PERFORMING), with_aspect(ASPECT_RESPONSIBLE))
}

/// The person holding the unit's manager role, if any.
pub fn manager_person(unit: Uuid, managers: &[Manager]) -> Option<&ManagerPerson> {
  if managers.len() > 1 {
    tracing::warn!(%unit, count = managers.len(), "unit has several managers, using the first");
  }
  managers.first().and_then(|m| m.person.as_ref())
}

// ─── Org units ───────────────────────────────────────────────────────────────

/// Build the directory representation of a unit.
pub fn map_org_unit(source: &SourceOrgUnit, settings: &Settings) -> Result<OrgUnit> {
  let uuid = source.uuid();
  let mut unit = OrgUnit::new(uuid, source.name.clone());

  // The root is the top of the directory tree.
  unit.parent_org_unit_uuid = if uuid == settings.top_unit_uuid {
    None
  } else {
    source.scope.parent
  };

  unit.it_systems = source
    .scope
    .it_accounts
    .iter()
    .filter(|a| !settings.uuid_from_it_systems.contains(&a.system_name))
    .filter_map(|a| a.system_uuid)
    .collect();

  apply_unit_addresses(&mut unit, &source.addresses, settings);

  if settings.sync_managers
    && let Some(person) = manager_person(uuid, &source.managers)
  {
    unit.manager_uuid = Some(identity::substitute_id(
      &person.it_accounts,
      person.uuid,
      &settings.uuid_from_it_systems,
    )?);
  }

  if settings.enable_kle {
    let (tasks, contact_for_tasks) = kle_to_tasks(&source.kles, settings.use_contact_for_tasks);
    unit.tasks = tasks;
    unit.contact_for_tasks = contact_for_tasks;
  }

  if settings.substitutes_identity() {
    identity::overwrite_unit_uuids(
      &mut unit,
      &source.scope.it_accounts,
      &source.parent_it_accounts,
      &settings.uuid_from_it_systems,
    )?;
  }

  unit.sanitize(settings.effective_truncate_length());
  Ok(unit)
}

// ─── Users ───────────────────────────────────────────────────────────────────

/// What to do with one directory user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserOutcome {
  Upsert(Box<User>),
  Delete(Uuid),
}

impl UserOutcome {
  pub fn uuid(&self) -> Uuid {
    match self {
      UserOutcome::Upsert(user) => user.uuid,
      UserOutcome::Delete(uuid) => *uuid,
    }
  }
}

/// The engagements a user built from `group` is made of: restricted to the
/// group's engagement if it has one, and to relevant units, sorted by title
/// and engagement identifier.
pub fn group_engagements<'a>(
  employee: &'a Employee,
  group: &AccountGroup,
  ctx: &RelevanceContext,
  use_extension: bool,
) -> Vec<&'a Engagement> {
  let mut engagements: Vec<&Engagement> = employee
    .engagements
    .iter()
    .filter(|e| group.engagement.is_none_or(|g| g == e.uuid))
    .filter(|e| ctx.is_relevant(&e.unit))
    .collect();
  engagements.sort_by(|a, b| {
    (job_title(a, use_extension), a.uuid).cmp(&(job_title(b, use_extension), b.uuid))
  });
  engagements
}

fn job_title(engagement: &Engagement, use_extension: bool) -> &str {
  match engagement.extension_3.as_deref() {
    Some(ext) if use_extension && !ext.trim().is_empty() => ext,
    _ => &engagement.job_function,
  }
}

/// Positions for the given engagements, in the order given.
pub fn engagements_to_positions(engagements: &[&Engagement], use_extension: bool) -> Vec<Position> {
  engagements
    .iter()
    .map(|e| Position::new(job_title(e, use_extension), e.unit.uuid))
    .collect()
}

/// The unit whose addresses provide the work address: the primary
/// engagement's unit, or the first engagement's when no single primary
/// exists.
pub fn work_address_unit(person: Uuid, engagements: &[&Engagement]) -> Option<Uuid> {
  let mut primaries = engagements.iter().filter(|e| e.is_primary);
  match (primaries.next(), primaries.next()) {
    (Some(primary), None) => Some(primary.unit.uuid),
    _ => {
      tracing::warn!(%person, "no unique primary engagement, using first position");
      engagements.first().map(|e| e.unit.uuid)
    }
  }
}

/// Build the directory user for one account group of an employee.
///
/// `work_address` is the already-resolved location, if configured. A
/// configured `person.name` or `user.user_id` template replaces the default
/// value of that field.
pub fn map_user(
  employee: &Employee,
  group: &AccountGroup,
  ctx: &RelevanceContext,
  settings: &Settings,
  work_address: Option<String>,
) -> Result<UserOutcome> {
  let uuid = match group.substitute_id.as_deref().map(identity::parse_key) {
    None => employee.uuid,
    Some(Ok(uuid)) => uuid,
    Some(Err(err)) => {
      tracing::warn!(person = %employee.uuid, %err, "unusable substitute identity");
      return Ok(UserOutcome::Delete(employee.uuid));
    }
  };

  if settings.filter_users_by_it_system && group.username.is_none() {
    return Ok(UserOutcome::Delete(uuid));
  }

  let use_extension = settings.use_extension_field_as_job_function;
  let engagements = group_engagements(employee, group, ctx, use_extension);
  let mut positions = engagements_to_positions(&engagements, use_extension);
  if positions.is_empty() {
    return Ok(UserOutcome::Delete(uuid));
  }
  if settings.substitutes_identity() {
    let units: Vec<_> = engagements.iter().map(|e| e.unit.clone()).collect();
    identity::overwrite_position_uuids(&mut positions, &units, &settings.uuid_from_it_systems)?;
  }

  let fields = template::TemplateContext::new(employee, group.username.as_deref());
  let name = match template::render(&settings.templates, template::PERSON_NAME, &fields)? {
    Some(name) => name,
    None => match employee.nickname.as_deref() {
      Some(nick) if !nick.trim().is_empty() => nick.to_string(),
      _ => employee.name.clone(),
    },
  };
  let person = Person {
    name,
    cpr: employee.cpr.clone().filter(|_| settings.xfer_cpr),
  };
  let user_id = match template::render(&settings.templates, template::USER_ID, &fields)? {
    Some(user_id) => user_id,
    None => group
      .username
      .clone()
      .unwrap_or_else(|| employee.uuid.to_string()),
  };

  let mut user = User::new(uuid, user_id, person, positions)?;

  let addresses = employee
    .addresses
    .iter()
    .filter(|a| group.engagement.is_none() || a.engagement == group.engagement);
  let contact = user_contact(addresses, settings);
  user.phone_number = contact.phone;
  user.landline = contact.landline;
  user.email = contact.email;
  user.location = work_address;

  user.sanitize(settings.effective_truncate_length());
  Ok(UserOutcome::Upsert(Box::new(user)))
}
