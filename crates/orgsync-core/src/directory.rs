//! The `DirectoryService` trait: the directory service's HTTP contract.
//!
//! Implementations are thin: a 404 on read is `Ok(None)`, a 404 on delete is
//! success. Merge-forward and the root-deletion guard live in the sync driver,
//! not here.

use std::future::Future;

use uuid::Uuid;

use crate::{
  Transient,
  target::{Hierarchy, OrgUnit, User},
};

pub trait DirectoryService: Send + Sync {
  type Error: std::error::Error + Transient + Send + Sync + 'static;

  /// `GET /orgUnit/{uuid}`. `None` when the unit does not exist yet.
  fn get_org_unit(
    &self,
    uuid: Uuid,
  ) -> impl Future<Output = Result<Option<OrgUnit>, Self::Error>> + Send + '_;

  /// `POST /orgUnit/` with the full unit body.
  fn post_org_unit<'a>(
    &'a self,
    unit: &'a OrgUnit,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// `DELETE /orgUnit/{uuid}`.
  fn delete_org_unit(
    &self,
    uuid: Uuid,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// `POST /user`.
  fn post_user<'a>(
    &'a self,
    user: &'a User,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// `DELETE /user/{uuid}`.
  fn delete_user(
    &self,
    uuid: Uuid,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// `GET /hierarchy`: ask the service to snapshot what it holds. Returns the
  /// request id to poll with.
  fn trigger_hierarchy(
    &self,
  ) -> impl Future<Output = Result<Uuid, Self::Error>> + Send + '_;

  /// `GET /hierarchy/{request}`. `None` while the snapshot is not ready.
  fn get_hierarchy(
    &self,
    request: Uuid,
  ) -> impl Future<Output = Result<Option<Hierarchy>, Self::Error>> + Send + '_;
}
