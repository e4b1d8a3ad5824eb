//! Reconciler, event and router tests against in-memory fakes of both
//! collaborators.

use std::{
  collections::{BTreeMap, HashMap},
  sync::{
    Arc, Mutex,
    atomic::{AtomicU32, Ordering},
  },
  time::Duration,
};

use axum::{
  body::Body,
  http::{Method, Request, StatusCode},
};
use chrono::{TimeDelta, Utc};
use orgsync_core::{
  Settings, Transient,
  directory::DirectoryService,
  registry::Registry,
  source::{
    Address, Employee, EmployeePage, Engagement, ItAccount, Owners, Registration,
    SourceOrgUnit, UnitScope,
  },
  target::{Hierarchy, OrgUnit, User},
};
use serde_json::{Value, json};
use tower::ServiceExt as _;
use uuid::Uuid;

use crate::{
  AppState, Error, EventKind, Exporter, Reader, RetryPolicy, ServerConfig, Timing,
  UnitSync, router,
};

const ROOT: Uuid = Uuid::from_u128(0x100);
const ORGANISATION: Uuid = Uuid::from_u128(0x1);
const OUTSIDE: Uuid = Uuid::from_u128(0x999);
const SUBSTITUTE_SYSTEM: &str = "FK-ORG UUID";

// ─── Fakes ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
#[error("fake collaborator failure (transient = {0})")]
struct FakeError(bool);

impl Transient for FakeError {
  fn is_transient(&self) -> bool {
    self.0
  }
}

#[derive(Default)]
struct FakeRegistry {
  units:            BTreeMap<Uuid, SourceOrgUnit>,
  employees:        BTreeMap<Uuid, Employee>,
  address_owners:   HashMap<Uuid, Owners>,
  account_owners:   HashMap<Uuid, Owners>,
  registrations:    HashMap<Uuid, Vec<Registration>>,
  managers:         HashMap<Uuid, Uuid>,
  engagements:      HashMap<Uuid, Uuid>,
  kles:             HashMap<Uuid, Uuid>,
  /// Transient failures left before unit enumeration succeeds.
  flaky_listings:   AtomicU32,
  page_requests:    Mutex<Vec<(usize, usize)>>,
  scope_reads:      AtomicU32,
}

impl FakeRegistry {
  fn add_unit(&mut self, unit: SourceOrgUnit) {
    self.units.insert(unit.uuid(), unit);
  }

  fn add_employee(&mut self, employee: Employee) {
    self.employees.insert(employee.uuid, employee);
  }
}

impl Registry for FakeRegistry {
  type Error = FakeError;

  async fn organisation_uuid(&self) -> Result<Uuid, FakeError> {
    Ok(ORGANISATION)
  }

  async fn org_unit_uuids(&self, root: Uuid) -> Result<Vec<Uuid>, FakeError> {
    let left = self.flaky_listings.load(Ordering::SeqCst);
    if left > 0 {
      self.flaky_listings.store(left - 1, Ordering::SeqCst);
      return Err(FakeError(true));
    }
    Ok(
      self
        .units
        .values()
        .filter(|u| u.scope.ancestors.contains(&root))
        .map(SourceOrgUnit::uuid)
        .collect(),
    )
  }

  async fn employee_page(
    &self,
    organisation: Uuid,
    limit: usize,
    start: usize,
  ) -> Result<EmployeePage, FakeError> {
    assert_eq!(organisation, ORGANISATION);
    self.page_requests.lock().unwrap().push((limit, start));
    let all: Vec<Uuid> = self.employees.keys().copied().collect();
    let items = if limit == 0 {
      all.clone()
    } else {
      all.iter().skip(start).take(limit).copied().collect()
    };
    Ok(EmployeePage { items, offset: start, total: all.len() })
  }

  async fn read_unit_scope(&self, uuid: Uuid) -> Result<Option<UnitScope>, FakeError> {
    self.scope_reads.fetch_add(1, Ordering::SeqCst);
    Ok(self.units.get(&uuid).map(|u| u.scope.clone()))
  }

  async fn read_org_unit(&self, uuid: Uuid) -> Result<Option<SourceOrgUnit>, FakeError> {
    Ok(self.units.get(&uuid).cloned())
  }

  async fn read_employee(&self, uuid: Uuid) -> Result<Option<Employee>, FakeError> {
    Ok(self.employees.get(&uuid).cloned())
  }

  async fn read_unit_addresses(&self, uuid: Uuid) -> Result<Vec<Address>, FakeError> {
    Ok(self.units.get(&uuid).map(|u| u.addresses.clone()).unwrap_or_default())
  }

  async fn unit_employees(&self, unit: Uuid) -> Result<Vec<Uuid>, FakeError> {
    Ok(
      self
        .employees
        .values()
        .filter(|e| e.engagements.iter().any(|g| g.unit.uuid == unit))
        .map(|e| e.uuid)
        .collect(),
    )
  }

  async fn it_account_registrations(
    &self,
    uuid: Uuid,
  ) -> Result<Vec<Registration>, FakeError> {
    Ok(self.registrations.get(&uuid).cloned().unwrap_or_default())
  }

  async fn find_address_owner(&self, uuid: Uuid) -> Result<Option<Owners>, FakeError> {
    Ok(self.address_owners.get(&uuid).copied())
  }

  async fn find_it_account_owner(&self, uuid: Uuid) -> Result<Option<Owners>, FakeError> {
    Ok(self.account_owners.get(&uuid).copied())
  }

  async fn find_manager_unit(&self, uuid: Uuid) -> Result<Option<Uuid>, FakeError> {
    Ok(self.managers.get(&uuid).copied())
  }

  async fn find_engagement_person(&self, uuid: Uuid) -> Result<Option<Uuid>, FakeError> {
    Ok(self.engagements.get(&uuid).copied())
  }

  async fn find_kle_unit(&self, uuid: Uuid) -> Result<Option<Uuid>, FakeError> {
    Ok(self.kles.get(&uuid).copied())
  }
}

/// Holds what a directory service would hold and records every delete.
#[derive(Default)]
struct FakeDirectory {
  units:             Mutex<BTreeMap<Uuid, OrgUnit>>,
  users:             Mutex<BTreeMap<Uuid, User>>,
  deleted_units:     Mutex<Vec<Uuid>>,
  deleted_users:     Mutex<Vec<Uuid>>,
  snapshot:          Mutex<Option<Hierarchy>>,
  /// Hierarchy polls answered with "not ready"; `u32::MAX` means never ready.
  polls_until_ready: AtomicU32,
  /// Identifiers already present before the run, as users.
  existing_users:    Mutex<Vec<Uuid>>,
  triggers:          AtomicU32,
}

impl FakeDirectory {
  fn with_unit(self, unit: OrgUnit) -> Self {
    self.units.lock().unwrap().insert(unit.uuid, unit);
    self
  }

  fn with_user(self, uuid: Uuid) -> Self {
    self.existing_users.lock().unwrap().push(uuid);
    self
  }

  fn unit(&self, uuid: Uuid) -> Option<OrgUnit> {
    self.units.lock().unwrap().get(&uuid).cloned()
  }

  fn user(&self, uuid: Uuid) -> Option<User> {
    self.users.lock().unwrap().get(&uuid).cloned()
  }

  fn user_ids(&self) -> Vec<Uuid> {
    self.users.lock().unwrap().keys().copied().collect()
  }

  fn deleted_units(&self) -> Vec<Uuid> {
    self.deleted_units.lock().unwrap().clone()
  }

  fn deleted_users(&self) -> Vec<Uuid> {
    self.deleted_users.lock().unwrap().clone()
  }
}

impl DirectoryService for FakeDirectory {
  type Error = FakeError;

  async fn get_org_unit(&self, uuid: Uuid) -> Result<Option<OrgUnit>, FakeError> {
    Ok(self.unit(uuid))
  }

  async fn post_org_unit<'a>(&'a self, unit: &'a OrgUnit) -> Result<(), FakeError> {
    self.units.lock().unwrap().insert(unit.uuid, unit.clone());
    Ok(())
  }

  async fn delete_org_unit(&self, uuid: Uuid) -> Result<(), FakeError> {
    self.units.lock().unwrap().remove(&uuid);
    self.deleted_units.lock().unwrap().push(uuid);
    Ok(())
  }

  async fn post_user<'a>(&'a self, user: &'a User) -> Result<(), FakeError> {
    self.users.lock().unwrap().insert(user.uuid, user.clone());
    Ok(())
  }

  async fn delete_user(&self, uuid: Uuid) -> Result<(), FakeError> {
    self.users.lock().unwrap().remove(&uuid);
    self.deleted_users.lock().unwrap().push(uuid);
    Ok(())
  }

  async fn trigger_hierarchy(&self) -> Result<Uuid, FakeError> {
    self.triggers.fetch_add(1, Ordering::SeqCst);
    let mut users: Vec<Uuid> = self.existing_users.lock().unwrap().clone();
    users.extend(self.user_ids());
    *self.snapshot.lock().unwrap() = Some(Hierarchy {
      org_units: self.units.lock().unwrap().keys().copied().collect(),
      users:     users.into_iter().collect(),
    });
    Ok(Uuid::new_v4())
  }

  async fn get_hierarchy(&self, _request: Uuid) -> Result<Option<Hierarchy>, FakeError> {
    let left = self.polls_until_ready.load(Ordering::SeqCst);
    if left > 0 {
      if left != u32::MAX {
        self.polls_until_ready.store(left - 1, Ordering::SeqCst);
      }
      return Ok(None);
    }
    Ok(self.snapshot.lock().unwrap().clone())
  }
}

// ─── Builders ─────────────────────────────────────────────────────────────────

fn root_unit() -> SourceOrgUnit {
  source_unit(ROOT, Some(OUTSIDE), vec![OUTSIDE], "Kommune")
}

fn child_unit(uuid: Uuid, name: &str) -> SourceOrgUnit {
  source_unit(uuid, Some(ROOT), vec![ROOT], name)
}

fn source_unit(
  uuid: Uuid,
  parent: Option<Uuid>,
  ancestors: Vec<Uuid>,
  name: &str,
) -> SourceOrgUnit {
  SourceOrgUnit {
    scope:              UnitScope { uuid, parent, ancestors, ..UnitScope::default() },
    name:               name.to_string(),
    parent_it_accounts: Vec::new(),
    addresses:          Vec::new(),
    managers:           Vec::new(),
    kles:               Vec::new(),
  }
}

fn employee(uuid: Uuid, name: &str, units: &[&SourceOrgUnit]) -> Employee {
  Employee {
    uuid,
    name: name.to_string(),
    nickname: None,
    cpr: None,
    addresses: Vec::new(),
    engagements: units
      .iter()
      .map(|u| Engagement {
        uuid:         Uuid::new_v4(),
        job_function: "Sagsbehandler".to_string(),
        extension_3:  None,
        is_primary:   true,
        unit:         u.scope.clone(),
      })
      .collect(),
    it_accounts: Vec::new(),
  }
}

fn substitute_account(key: Uuid) -> ItAccount {
  ItAccount {
    user_key:    key.to_string(),
    system_name: SUBSTITUTE_SYSTEM.to_string(),
    system_uuid: None,
    engagement:  None,
  }
}

fn settings() -> Settings {
  Settings::new("12345678", ROOT)
}

fn quick_timing() -> Timing {
  Timing {
    retry:         RetryPolicy::new(3, Duration::ZERO),
    poll_interval: Duration::from_millis(1),
    poll_timeout:  Duration::from_secs(5),
  }
}

fn exporter(
  registry: FakeRegistry,
  directory: FakeDirectory,
  settings: Settings,
) -> (Exporter<FakeRegistry, FakeDirectory>, Arc<FakeRegistry>, Arc<FakeDirectory>) {
  let registry = Arc::new(registry);
  let directory = Arc::new(directory);
  let reader = Reader::new(Arc::clone(&registry), Arc::new(settings), ORGANISATION);
  let exporter = Exporter::new(reader, Arc::clone(&directory)).with_timing(quick_timing());
  (exporter, registry, directory)
}

/// Root, one department and one employee in it.
fn small_organisation() -> (FakeRegistry, Uuid, Uuid) {
  let department = Uuid::from_u128(0x200);
  let person = Uuid::from_u128(0x300);
  let mut registry = FakeRegistry::default();
  let unit = child_unit(department, "Borgerservice");
  registry.add_employee(employee(person, "Anna Jensen", &[&unit]));
  registry.add_unit(root_unit());
  registry.add_unit(unit);
  (registry, department, person)
}

// ─── Full sync ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn full_sync_without_units_aborts_before_deleting() {
  let stale_unit = Uuid::from_u128(0x500);
  let stale_user = Uuid::from_u128(0x501);
  let directory = FakeDirectory::default()
    .with_unit(OrgUnit::new(stale_unit, "Gammel"))
    .with_user(stale_user);
  let mut s = settings();
  s.autowash = true;
  let (exporter, _, directory) = exporter(FakeRegistry::default(), directory, s);

  let err = exporter.full_sync().await.unwrap_err();

  assert!(matches!(err, Error::NoOrgUnits(root) if root == ROOT));
  assert!(directory.deleted_units().is_empty());
  assert!(directory.deleted_users().is_empty());
}

#[tokio::test]
async fn full_sync_without_users_keeps_existing_users() {
  let stale_user = Uuid::from_u128(0x501);
  let mut registry = FakeRegistry::default();
  registry.add_unit(root_unit());
  let directory = FakeDirectory::default().with_user(stale_user);
  let (exporter, _, directory) = exporter(registry, directory, settings());

  let err = exporter.full_sync().await.unwrap_err();

  assert!(matches!(err, Error::NoUsers));
  assert!(directory.deleted_users().is_empty());
  assert!(directory.unit(ROOT).is_some());
}

#[tokio::test]
async fn full_sync_writes_units_and_users() {
  let (registry, department, person) = small_organisation();
  let (exporter, _, directory) = exporter(registry, FakeDirectory::default(), settings());

  let report = exporter.full_sync().await.unwrap();

  assert_eq!(report.org_units, 2);
  assert_eq!(report.users, 1);
  let root = directory.unit(ROOT).unwrap();
  assert_eq!(root.parent_org_unit_uuid, None);
  let unit = directory.unit(department).unwrap();
  assert_eq!(unit.name.as_deref(), Some("Borgerservice"));
  assert_eq!(unit.parent_org_unit_uuid, Some(ROOT));
  let user = directory.user(person).unwrap();
  assert_eq!(user.user_id, person.to_string());
  assert_eq!(user.positions()[0].org_unit_uuid, department);
}

#[tokio::test]
async fn full_sync_keeps_service_owned_fields() {
  let (registry, department, _) = small_organisation();
  let mut current = OrgUnit::new(department, "Old name");
  current.sor = Some("SOR-42".to_string());
  current.los_short_name = Some("BS".to_string());
  let directory = FakeDirectory::default().with_unit(current);
  let (exporter, _, directory) = exporter(registry, directory, settings());

  exporter.full_sync().await.unwrap();

  let unit = directory.unit(department).unwrap();
  assert_eq!(unit.name.as_deref(), Some("Borgerservice"));
  assert_eq!(unit.sor.as_deref(), Some("SOR-42"));
  assert_eq!(unit.los_short_name.as_deref(), Some("BS"));
}

#[tokio::test]
async fn autowash_deletes_orphan_units() {
  let orphan = Uuid::from_u128(0x600);
  let (registry, _, _) = small_organisation();
  let directory = FakeDirectory::default().with_unit(OrgUnit::new(orphan, "Nedlagt"));
  let mut s = settings();
  s.autowash = true;
  let (exporter, _, directory) = exporter(registry, directory, s);

  let report = exporter.full_sync().await.unwrap();

  assert_eq!(directory.deleted_units(), vec![orphan]);
  assert_eq!(report.deleted_org_units, 1);
}

#[tokio::test]
async fn orphan_units_stay_without_autowash() {
  let orphan = Uuid::from_u128(0x600);
  let (registry, _, _) = small_organisation();
  let directory = FakeDirectory::default().with_unit(OrgUnit::new(orphan, "Nedlagt"));
  let (exporter, _, directory) = exporter(registry, directory, settings());

  exporter.full_sync().await.unwrap();

  assert!(directory.deleted_units().is_empty());
  assert!(directory.unit(orphan).is_some());
}

#[tokio::test]
async fn orphan_users_are_deleted() {
  let orphan = Uuid::from_u128(0x700);
  let (registry, _, person) = small_organisation();
  let directory = FakeDirectory::default().with_user(orphan);
  let (exporter, _, directory) = exporter(registry, directory, settings());

  let report = exporter.full_sync().await.unwrap();

  assert_eq!(directory.deleted_users(), vec![orphan]);
  assert_eq!(report.deleted_users, 1);
  assert!(directory.user(person).is_some());
}

#[tokio::test]
async fn top_unit_is_never_deleted() {
  let (exporter, _, directory) =
    exporter(FakeRegistry::default(), FakeDirectory::default(), settings());

  exporter.delete_org_unit(ROOT).await.unwrap();

  assert!(directory.deleted_units().is_empty());
}

#[tokio::test]
async fn duplicate_substitute_identity_keeps_first_person() {
  let shared = Uuid::from_u128(0xabc);
  let (first, second) = (Uuid::from_u128(0x301), Uuid::from_u128(0x302));
  let mut registry = FakeRegistry::default();
  let unit = child_unit(Uuid::from_u128(0x200), "Borgerservice");
  let mut a = employee(first, "Første", &[&unit]);
  a.it_accounts.push(substitute_account(shared));
  let mut b = employee(second, "Anden", &[&unit]);
  b.it_accounts.push(substitute_account(shared));
  registry.add_employee(b);
  registry.add_employee(a);
  registry.add_unit(root_unit());
  registry.add_unit(unit);
  let mut s = settings();
  s.uuid_from_it_systems = vec![SUBSTITUTE_SYSTEM.to_string()];
  let (exporter, _, directory) = exporter(registry, FakeDirectory::default(), s);

  let report = exporter.full_sync().await.unwrap();

  assert_eq!(report.users, 1);
  assert_eq!(directory.user_ids(), vec![shared]);
  assert_eq!(directory.user(shared).unwrap().person.name, "Første");
}

#[tokio::test]
async fn employees_are_read_page_by_page() {
  let mut registry = FakeRegistry::default();
  let unit = child_unit(Uuid::from_u128(0x200), "Borgerservice");
  for n in 0..5u128 {
    registry.add_employee(employee(Uuid::from_u128(0x300 + n), "Ansat", &[&unit]));
  }
  registry.add_unit(unit);
  let mut s = settings();
  s.employee_page_size = 2;
  let (exporter, registry, _) = exporter(registry, FakeDirectory::default(), s);

  let uuids = exporter.reader().employee_uuids().await.unwrap();

  assert_eq!(uuids.len(), 5);
  assert_eq!(*registry.page_requests.lock().unwrap(), vec![(2, 0), (2, 2), (2, 4)]);
}

#[tokio::test]
async fn page_size_zero_reads_everything_at_once() {
  let (registry, _, _) = small_organisation();
  let mut s = settings();
  s.employee_page_size = 0;
  let (exporter, registry, _) = exporter(registry, FakeDirectory::default(), s);

  let uuids = exporter.reader().employee_uuids().await.unwrap();

  assert_eq!(uuids.len(), 1);
  assert_eq!(*registry.page_requests.lock().unwrap(), vec![(0, 0)]);
}

#[tokio::test]
async fn full_sync_waits_for_the_hierarchy_snapshot() {
  let (registry, _, _) = small_organisation();
  let directory = FakeDirectory::default();
  directory.polls_until_ready.store(3, Ordering::SeqCst);
  let (exporter, _, directory) = exporter(registry, directory, settings());

  exporter.full_sync().await.unwrap();

  assert_eq!(directory.polls_until_ready.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn hierarchy_that_never_arrives_times_out_before_deleting() {
  let orphan = Uuid::from_u128(0x700);
  let (registry, _, _) = small_organisation();
  let directory = FakeDirectory::default().with_user(orphan);
  directory.polls_until_ready.store(u32::MAX, Ordering::SeqCst);
  let registry = Arc::new(registry);
  let directory = Arc::new(directory);
  let reader = Reader::new(Arc::clone(&registry), Arc::new(settings()), ORGANISATION);
  let exporter = Exporter::new(reader, Arc::clone(&directory)).with_timing(Timing {
    poll_timeout: Duration::ZERO,
    ..quick_timing()
  });

  let err = exporter.full_sync().await.unwrap_err();

  assert!(matches!(err, Error::HierarchyTimeout(_)));
  assert!(directory.deleted_users().is_empty());
}

#[tokio::test]
async fn run_full_sync_retries_transient_registry_failures() {
  let (registry, _, person) = small_organisation();
  registry.flaky_listings.store(2, Ordering::SeqCst);
  let (exporter, _, directory) = exporter(registry, FakeDirectory::default(), settings());

  exporter.run_full_sync().await.unwrap();

  assert!(directory.user(person).is_some());
}

#[tokio::test]
async fn run_full_sync_gives_up_after_the_last_attempt() {
  let (registry, _, _) = small_organisation();
  registry.flaky_listings.store(10, Ordering::SeqCst);
  let (exporter, registry, _) = exporter(registry, FakeDirectory::default(), settings());

  let err = exporter.run_full_sync().await.unwrap_err();

  assert!(matches!(err, Error::Registry { transient: true, .. }));
  assert_eq!(registry.flaky_listings.load(Ordering::SeqCst), 7);
}

#[tokio::test]
async fn run_full_sync_requests_a_new_snapshot_after_a_timeout() {
  let orphan = Uuid::from_u128(0x700);
  let (registry, _, person) = small_organisation();
  let directory = FakeDirectory::default().with_user(orphan);
  directory.polls_until_ready.store(1, Ordering::SeqCst);
  let (exporter, _, directory) = exporter(registry, directory, settings());
  let exporter = exporter.with_timing(Timing { poll_timeout: Duration::ZERO, ..quick_timing() });

  exporter.run_full_sync().await.unwrap();

  assert_eq!(directory.triggers.load(Ordering::SeqCst), 2);
  assert_eq!(directory.deleted_users(), vec![orphan]);
  assert!(directory.user(person).is_some());
}

#[tokio::test]
async fn run_full_sync_stops_retrying_a_snapshot_that_never_arrives() {
  let (registry, _, _) = small_organisation();
  let directory = FakeDirectory::default();
  directory.polls_until_ready.store(u32::MAX, Ordering::SeqCst);
  let (exporter, _, directory) = exporter(registry, directory, settings());
  let exporter = exporter.with_timing(Timing { poll_timeout: Duration::ZERO, ..quick_timing() });

  let err = exporter.run_full_sync().await.unwrap_err();

  assert!(matches!(err, Error::HierarchyTimeout(_)));
  assert_eq!(directory.triggers.load(Ordering::SeqCst), 3);
  assert!(directory.deleted_users().is_empty());
}

#[tokio::test]
async fn broken_name_template_aborts_before_deleting() {
  let orphan = Uuid::from_u128(0x700);
  let (registry, _, person) = small_organisation();
  let mut s = settings();
  s.templates.insert("person.name".into(), "{{ unknown_variable }}".into());
  let directory = FakeDirectory::default().with_user(orphan);
  let (exporter, _, directory) = exporter(registry, directory, s);

  let err = exporter.full_sync().await.unwrap_err();

  assert!(matches!(err, Error::Core(orgsync_core::Error::TemplateRender { .. })));
  assert!(directory.user(person).is_none());
  assert!(directory.deleted_users().is_empty());
}

// ─── Relevance ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn root_is_relevant_without_asking_the_registry() {
  let (registry, department, _) = small_organisation();
  let (exporter, registry, _) = exporter(registry, FakeDirectory::default(), settings());

  assert!(exporter.reader().is_relevant(ROOT).await.unwrap());
  assert_eq!(registry.scope_reads.load(Ordering::SeqCst), 0);

  assert!(exporter.reader().is_relevant(department).await.unwrap());
  assert_eq!(registry.scope_reads.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn units_outside_the_tree_are_not_relevant() {
  let stray = Uuid::from_u128(0x201);
  let (mut registry, department, _) = small_organisation();
  registry.add_unit(source_unit(stray, Some(OUTSIDE), vec![OUTSIDE], "Andet"));
  let mut s = settings();
  s.filter_orgunit_uuid = vec![department];
  let (exporter, _, _) = exporter(registry, FakeDirectory::default(), s);

  assert!(!exporter.reader().is_relevant(stray).await.unwrap());
  assert!(!exporter.reader().is_relevant(department).await.unwrap());
  assert!(!exporter.reader().is_relevant(Uuid::from_u128(0x202)).await.unwrap());
}

#[tokio::test]
async fn events_on_irrelevant_units_leave_the_directory_alone() {
  let stray = Uuid::from_u128(0x201);
  let (manager, kle, address) =
    (Uuid::from_u128(0xe02), Uuid::from_u128(0xe03), Uuid::from_u128(0xd01));
  let (mut registry, department, _) = small_organisation();
  registry.add_unit(source_unit(stray, Some(OUTSIDE), vec![OUTSIDE], "Andet"));
  registry.managers.insert(manager, department);
  registry.kles.insert(kle, stray);
  registry
    .address_owners
    .insert(address, Owners { org_unit: Some(department), person: None });
  let mut s = settings();
  s.filter_orgunit_uuid = vec![department];
  let (exporter, registry, directory) = exporter(registry, FakeDirectory::default(), s);

  exporter.handle(EventKind::Manager, manager).await.unwrap();
  exporter.handle(EventKind::Kle, kle).await.unwrap();
  exporter.handle(EventKind::Address, address).await.unwrap();

  assert!(directory.unit(department).is_none());
  assert!(directory.unit(stray).is_none());
  assert!(directory.deleted_units().is_empty());
  assert_eq!(registry.scope_reads.load(Ordering::SeqCst), 3);
}

// ─── Events ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn unknown_person_is_deleted() {
  let ghost = Uuid::from_u128(0x800);
  let (exporter, _, directory) =
    exporter(FakeRegistry::default(), FakeDirectory::default(), settings());

  exporter.handle(EventKind::Person, ghost).await.unwrap();

  assert_eq!(directory.deleted_users(), vec![ghost]);
}

#[tokio::test]
async fn person_without_relevant_engagements_is_deleted_once() {
  let person = Uuid::from_u128(0x301);
  let mut registry = FakeRegistry::default();
  let elsewhere = source_unit(Uuid::from_u128(0x900), Some(OUTSIDE), vec![OUTSIDE], "Andet");
  registry.add_employee(employee(person, "Bo", &[&elsewhere]));
  let (exporter, _, directory) = exporter(registry, FakeDirectory::default(), settings());

  let posted = exporter.sync_person(person).await.unwrap();

  assert!(posted.is_empty());
  assert_eq!(directory.deleted_users(), vec![person]);
}

#[tokio::test]
async fn terminated_account_removes_old_identity() {
  let person = Uuid::from_u128(0x301);
  let account = Uuid::from_u128(0xa01);
  let (old_key, new_key) = (Uuid::from_u128(0xb01), Uuid::from_u128(0xb02));
  let unit = child_unit(Uuid::from_u128(0x200), "Borgerservice");
  let mut anna = employee(person, "Anna", &[&unit]);
  anna.it_accounts.push(substitute_account(new_key));

  let mut registry = FakeRegistry::default();
  registry.add_employee(anna);
  registry.add_unit(unit);
  registry
    .account_owners
    .insert(account, Owners { org_unit: None, person: Some(person) });
  let registration = |key: Uuid, valid_to| Registration {
    user_key: key.to_string(),
    system_name: SUBSTITUTE_SYSTEM.to_string(),
    valid_to,
    person: Some(person),
    org_unit: None,
  };
  registry.registrations.insert(
    account,
    vec![
      registration(old_key, Some((Utc::now() - TimeDelta::days(1)).fixed_offset())),
      registration(new_key, None),
    ],
  );
  let mut s = settings();
  s.uuid_from_it_systems = vec![SUBSTITUTE_SYSTEM.to_string()];
  let (exporter, _, directory) = exporter(registry, FakeDirectory::default(), s);

  exporter.handle(EventKind::ItUser, account).await.unwrap();

  assert_eq!(directory.user_ids(), vec![new_key]);
  assert_eq!(directory.deleted_users(), vec![old_key, person]);
}

#[tokio::test]
async fn unit_with_substitute_identity_replaces_native_entry() {
  let account = Uuid::from_u128(0xa02);
  let department = Uuid::from_u128(0x200);
  let substitute = Uuid::from_u128(0xc01);
  let mut unit = child_unit(department, "Borgerservice");
  unit.scope.it_accounts.push(substitute_account(substitute));
  let mut registry = FakeRegistry::default();
  registry.add_unit(root_unit());
  registry.add_unit(unit);
  registry
    .account_owners
    .insert(account, Owners { org_unit: Some(department), person: None });
  let mut s = settings();
  s.uuid_from_it_systems = vec![SUBSTITUTE_SYSTEM.to_string()];
  let (exporter, _, directory) = exporter(registry, FakeDirectory::default(), s);

  exporter.handle(EventKind::ItUser, account).await.unwrap();

  assert!(directory.unit(substitute).is_some());
  assert_eq!(directory.deleted_units(), vec![department]);
}

#[tokio::test]
async fn org_unit_event_resyncs_its_employees() {
  let department = Uuid::from_u128(0x200);
  let (anna, bo) = (Uuid::from_u128(0x301), Uuid::from_u128(0x302));
  let unit = child_unit(department, "Borgerservice");
  let mut registry = FakeRegistry::default();
  registry.add_employee(employee(anna, "Anna", &[&unit]));
  registry.add_employee(employee(bo, "Bo", &[&unit]));
  registry.add_unit(root_unit());
  registry.add_unit(unit);
  let (exporter, _, directory) = exporter(registry, FakeDirectory::default(), settings());

  exporter.handle(EventKind::OrgUnit, department).await.unwrap();

  assert!(directory.unit(department).is_some());
  assert_eq!(directory.user_ids(), vec![anna, bo]);
}

#[tokio::test]
async fn missing_org_unit_event_deletes_the_unit() {
  let gone = Uuid::from_u128(0x201);
  let (exporter, _, directory) =
    exporter(FakeRegistry::default(), FakeDirectory::default(), settings());

  exporter.handle(EventKind::OrgUnit, gone).await.unwrap();

  assert_eq!(directory.deleted_units(), vec![gone]);
}

#[tokio::test]
async fn excluded_org_unit_is_deleted() {
  let department = Uuid::from_u128(0x200);
  let mut registry = FakeRegistry::default();
  registry.add_unit(child_unit(department, "Borgerservice"));
  let mut s = settings();
  s.filter_orgunit_uuid = vec![department];
  let (exporter, _, directory) = exporter(registry, FakeDirectory::default(), s);

  let outcome = exporter.sync_org_unit(department).await.unwrap();

  assert_eq!(outcome, UnitSync::Deleted);
  assert_eq!(directory.deleted_units(), vec![department]);
}

#[tokio::test]
async fn address_event_resyncs_owning_unit() {
  let address = Uuid::from_u128(0xd01);
  let (mut registry, department, _) = small_organisation();
  registry
    .address_owners
    .insert(address, Owners { org_unit: Some(department), person: None });
  let (exporter, _, directory) = exporter(registry, FakeDirectory::default(), settings());

  exporter.handle(EventKind::Address, address).await.unwrap();

  assert!(directory.unit(department).is_some());
  assert!(directory.user_ids().is_empty());
}

#[tokio::test]
async fn engagement_and_manager_events_resolve_their_owner() {
  let (engagement, manager) = (Uuid::from_u128(0xe01), Uuid::from_u128(0xe02));
  let (mut registry, department, person) = small_organisation();
  registry.engagements.insert(engagement, person);
  registry.managers.insert(manager, department);
  let (exporter, _, directory) = exporter(registry, FakeDirectory::default(), settings());

  exporter.handle(EventKind::Engagement, engagement).await.unwrap();
  exporter.handle(EventKind::Manager, manager).await.unwrap();

  assert!(directory.user(person).is_some());
  assert!(directory.unit(department).is_some());
}

#[tokio::test]
async fn events_for_unknown_objects_change_nothing() {
  let (exporter, _, directory) =
    exporter(FakeRegistry::default(), FakeDirectory::default(), settings());

  for kind in [EventKind::Address, EventKind::ItUser, EventKind::Manager, EventKind::Kle] {
    exporter.handle(kind, Uuid::new_v4()).await.unwrap();
  }

  assert!(directory.deleted_units().is_empty());
  assert!(directory.deleted_users().is_empty());
}

// ─── Router ───────────────────────────────────────────────────────────────────

fn make_state(registry: FakeRegistry) -> AppState<FakeRegistry, FakeDirectory> {
  let (exporter, _, _) = exporter(registry, FakeDirectory::default(), settings());
  AppState {
    exporter: Arc::new(exporter),
    config:   Arc::new(ServerConfig {
      host:     "127.0.0.1".to_string(),
      port:     8000,
      settings: settings(),
    }),
  }
}

async fn oneshot_raw(
  state: AppState<FakeRegistry, FakeDirectory>,
  method: Method,
  uri: &str,
) -> (StatusCode, Value) {
  let req = Request::builder()
    .method(method)
    .uri(uri)
    .body(Body::empty())
    .unwrap();
  let resp = router(state).oneshot(req).await.unwrap();
  let status = resp.status();
  let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
    .await
    .unwrap();
  let body = if bytes.is_empty() {
    Value::Null
  } else {
    serde_json::from_slice(&bytes).unwrap()
  };
  (status, body)
}

#[tokio::test]
async fn index_names_the_service() {
  let (status, body) = oneshot_raw(make_state(FakeRegistry::default()), Method::GET, "/").await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body, json!({ "name": "orgsync" }));
}

#[tokio::test]
async fn trigger_accepts_full_sync() {
  let (status, body) =
    oneshot_raw(make_state(FakeRegistry::default()), Method::POST, "/trigger").await;
  assert_eq!(status, StatusCode::ACCEPTED);
  assert_eq!(body, json!({ "triggered": "OK" }));
}

#[tokio::test]
async fn trigger_org_unit_reports_missing_unit() {
  let uri = format!("/trigger/orgunit/{}", Uuid::new_v4());
  let (status, body) = oneshot_raw(make_state(FakeRegistry::default()), Method::POST, &uri).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body, json!("Org unit not found"));
}

#[tokio::test]
async fn trigger_user_answers_ok() {
  let (registry, _, person) = small_organisation();
  let uri = format!("/trigger/user/{person}");
  let (status, body) = oneshot_raw(make_state(registry), Method::POST, &uri).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body, json!("OK"));
}

#[tokio::test]
async fn event_endpoint_answers_no_content() {
  let uri = format!("/events/person/{}", Uuid::new_v4());
  let (status, body) = oneshot_raw(make_state(FakeRegistry::default()), Method::POST, &uri).await;
  assert_eq!(status, StatusCode::NO_CONTENT);
  assert_eq!(body, Value::Null);
}

#[tokio::test]
async fn unknown_event_kind_is_not_found() {
  let uri = format!("/events/facet/{}", Uuid::new_v4());
  let (status, body) = oneshot_raw(make_state(FakeRegistry::default()), Method::POST, &uri).await;
  assert_eq!(status, StatusCode::NOT_FOUND);
  assert!(body["error"].as_str().unwrap().contains("facet"));
}
