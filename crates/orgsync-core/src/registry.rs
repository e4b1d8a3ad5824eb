//! The `Registry` trait: read access to the source registry.
//!
//! Implemented by `orgsync-registry` over HTTP and by in-memory fakes in
//! tests. Single-entity lookups return `Ok(None)` when nothing matches.

use std::future::Future;

use uuid::Uuid;

use crate::{
  Transient,
  source::{
    Address, Employee, EmployeePage, Owners, Registration, SourceOrgUnit,
    UnitScope,
  },
};

pub trait Registry: Send + Sync {
  type Error: std::error::Error + Transient + Send + Sync + 'static;

  // ── Enumeration ───────────────────────────────────────────────────────

  /// The registry's organisation identifier. Fetched once at startup.
  fn organisation_uuid(
    &self,
  ) -> impl Future<Output = Result<Uuid, Self::Error>> + Send + '_;

  /// Every unit strictly below `root`.
  fn org_unit_uuids(
    &self,
    root: Uuid,
  ) -> impl Future<Output = Result<Vec<Uuid>, Self::Error>> + Send + '_;

  /// One page of the employee listing. `limit == 0` asks for all employees.
  fn employee_page(
    &self,
    organisation: Uuid,
    limit: usize,
    start: usize,
  ) -> impl Future<Output = Result<EmployeePage, Self::Error>> + Send + '_;

  // ── Entities ──────────────────────────────────────────────────────────

  /// Ancestors, classes and IT-accounts of a unit, in one query.
  fn read_unit_scope(
    &self,
    uuid: Uuid,
  ) -> impl Future<Output = Result<Option<UnitScope>, Self::Error>> + Send + '_;

  fn read_org_unit(
    &self,
    uuid: Uuid,
  ) -> impl Future<Output = Result<Option<SourceOrgUnit>, Self::Error>> + Send + '_;

  fn read_employee(
    &self,
    uuid: Uuid,
  ) -> impl Future<Output = Result<Option<Employee>, Self::Error>> + Send + '_;

  fn read_unit_addresses(
    &self,
    uuid: Uuid,
  ) -> impl Future<Output = Result<Vec<Address>, Self::Error>> + Send + '_;

  /// Persons with an engagement in the unit.
  fn unit_employees(
    &self,
    unit: Uuid,
  ) -> impl Future<Output = Result<Vec<Uuid>, Self::Error>> + Send + '_;

  /// Every registration, past and present, of one IT-account.
  fn it_account_registrations(
    &self,
    uuid: Uuid,
  ) -> impl Future<Output = Result<Vec<Registration>, Self::Error>> + Send + '_;

  // ── Owner lookups ─────────────────────────────────────────────────────

  fn find_address_owner(
    &self,
    uuid: Uuid,
  ) -> impl Future<Output = Result<Option<Owners>, Self::Error>> + Send + '_;

  fn find_it_account_owner(
    &self,
    uuid: Uuid,
  ) -> impl Future<Output = Result<Option<Owners>, Self::Error>> + Send + '_;

  fn find_manager_unit(
    &self,
    uuid: Uuid,
  ) -> impl Future<Output = Result<Option<Uuid>, Self::Error>> + Send + '_;

  fn find_engagement_person(
    &self,
    uuid: Uuid,
  ) -> impl Future<Output = Result<Option<Uuid>, Self::Error>> + Send + '_;

  fn find_kle_unit(
    &self,
    uuid: Uuid,
  ) -> impl Future<Output = Result<Option<Uuid>, Self::Error>> + Send + '_;
}
