//! `RegistryClient`: the [`Registry`] implementation over HTTP.

use std::time::Duration;

use orgsync_core::{
  registry::Registry,
  settings::RegistrySettings,
  source::{
    Address, Employee, EmployeePage, Owners, Registration, SourceOrgUnit,
    UnitScope,
  },
};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use uuid::Uuid;

use crate::{
  Error, Result,
  decode::{
    Addresses, Current, Employees, Engagements, GraphQlResponse, ItUsers,
    Kles, Managers, Objects, OrgUnits, Paged, RawAddress, RawEmployee,
    RawEmployeePage, RawOrgUnit, RawOwner, RawRegistration, RawScope,
    UuidRef, Validities, addresses, owners,
  },
  queries,
};

/// Path of the versioned GraphQL endpoint, relative to the base URL.
const GRAPHQL_PATH: &str = "/graphql/v22";

/// Units fetched per request when walking the tree.
const UNIT_PAGE_SIZE: usize = 500;

/// HTTP client for the source registry.
///
/// Cheap to clone; the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct RegistryClient {
  client:   Client,
  base_url: String,
  token:    Option<String>,
}

impl RegistryClient {
  pub fn new(settings: &RegistrySettings) -> Result<Self> {
    let client = Client::builder()
      .timeout(Duration::from_secs(settings.timeout_secs))
      .danger_accept_invalid_certs(!settings.verify_tls)
      .build()?;
    Ok(Self {
      client,
      base_url: settings.url.trim_end_matches('/').to_string(),
      token: settings.token.clone(),
    })
  }

  fn url(&self, path: &str) -> String {
    format!("{}{}", self.base_url, path)
  }

  fn auth(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
    match &self.token {
      Some(token) => req.bearer_auth(token),
      None => req,
    }
  }

  /// Run one GraphQL document and return its `data`.
  async fn graphql<T: DeserializeOwned>(
    &self,
    query: &'static str,
    variables: Value,
  ) -> Result<T> {
    let url = self.url(GRAPHQL_PATH);
    let resp = self
      .auth(self.client.post(&url))
      .json(&json!({ "query": query, "variables": variables }))
      .send()
      .await?;

    let status = resp.status();
    if !status.is_success() {
      return Err(Error::Status { method: "POST", url, status });
    }

    let body: GraphQlResponse<T> = resp.json().await?;
    if let Some(errors) = body.errors.filter(|e| !e.is_empty()) {
      let messages: Vec<String> = errors.into_iter().map(|e| e.message).collect();
      return Err(Error::GraphQl(messages.join("; ")));
    }
    body.data.ok_or(Error::MissingData)
  }

  async fn rest<T: DeserializeOwned>(
    &self,
    path: &str,
    query: &[(&str, String)],
  ) -> Result<T> {
    let url = self.url(path);
    let resp = self
      .auth(self.client.get(&url))
      .query(query)
      .send()
      .await?;

    let status = resp.status();
    if !status.is_success() {
      return Err(Error::Status { method: "GET", url, status });
    }
    Ok(resp.json().await?)
  }
}

impl Registry for RegistryClient {
  type Error = Error;

  async fn organisation_uuid(&self) -> Result<Uuid> {
    let orgs: Vec<UuidRef> = self.rest("/service/o/", &[]).await?;
    match orgs.as_slice() {
      [org] => Ok(org.uuid),
      _ => Err(Error::Organisation(orgs.len())),
    }
  }

  async fn org_unit_uuids(&self, root: Uuid) -> Result<Vec<Uuid>> {
    let mut uuids = Vec::new();
    let mut cursor: Option<String> = None;
    loop {
      let page: OrgUnits<Paged<UuidRef>> = self
        .graphql(
          queries::ORG_UNITS_BELOW,
          json!({ "root": root, "limit": UNIT_PAGE_SIZE, "cursor": cursor }),
        )
        .await?;
      uuids.extend(page.org_units.objects.into_iter().map(|o| o.uuid));
      match page.org_units.page_info.next_cursor {
        Some(next) => cursor = Some(next),
        None => break,
      }
    }
    tracing::debug!(%root, count = uuids.len(), "enumerated org units");
    Ok(uuids)
  }

  async fn employee_page(
    &self,
    organisation: Uuid,
    limit: usize,
    start: usize,
  ) -> Result<EmployeePage> {
    let page: RawEmployeePage = self
      .rest(
        &format!("/service/o/{organisation}/e/"),
        &[("limit", limit.to_string()), ("start", start.to_string())],
      )
      .await?;
    Ok(page.into())
  }

  async fn read_unit_scope(&self, uuid: Uuid) -> Result<Option<UnitScope>> {
    let data: OrgUnits<Objects<Current<RawScope>>> = self
      .graphql(queries::READ_UNIT_SCOPE, json!({ "uuid": uuid }))
      .await?;
    Ok(data.org_units.into_current().map(UnitScope::from))
  }

  async fn read_org_unit(&self, uuid: Uuid) -> Result<Option<SourceOrgUnit>> {
    let data: OrgUnits<Objects<Current<RawOrgUnit>>> = self
      .graphql(queries::READ_ORG_UNIT, json!({ "uuid": uuid }))
      .await?;
    Ok(data.org_units.into_current().map(SourceOrgUnit::from))
  }

  async fn read_employee(&self, uuid: Uuid) -> Result<Option<Employee>> {
    let data: Employees<Objects<Current<RawEmployee>>> = self
      .graphql(queries::READ_EMPLOYEE, json!({ "uuid": uuid }))
      .await?;
    Ok(data.employees.into_current().map(Employee::from))
  }

  async fn read_unit_addresses(&self, uuid: Uuid) -> Result<Vec<Address>> {
    let data: Addresses<Objects<Current<RawAddress>>> = self
      .graphql(queries::READ_UNIT_ADDRESSES, json!({ "uuid": uuid }))
      .await?;
    Ok(addresses(data.addresses.into_all_current()))
  }

  async fn unit_employees(&self, unit: Uuid) -> Result<Vec<Uuid>> {
    #[derive(serde::Deserialize)]
    struct EmployeeRef {
      employee_uuid: Uuid,
    }

    let data: Engagements<Objects<Current<EmployeeRef>>> = self
      .graphql(queries::UNIT_EMPLOYEES, json!({ "uuid": unit }))
      .await?;
    let mut persons: Vec<Uuid> = data
      .engagements
      .into_all_current()
      .into_iter()
      .map(|e| e.employee_uuid)
      .collect();
    persons.sort();
    persons.dedup();
    Ok(persons)
  }

  async fn it_account_registrations(&self, uuid: Uuid) -> Result<Vec<Registration>> {
    let data: ItUsers<Objects<Validities<RawRegistration>>> = self
      .graphql(queries::ITUSER_REGISTRATIONS, json!({ "uuid": uuid }))
      .await?;
    Ok(
      data
        .itusers
        .objects
        .into_iter()
        .flat_map(|o| o.validities)
        .map(Registration::from)
        .collect(),
    )
  }

  async fn find_address_owner(&self, uuid: Uuid) -> Result<Option<Owners>> {
    let data: Addresses<Objects<Validities<RawOwner>>> = self
      .graphql(queries::ADDRESS_OWNER, json!({ "uuid": uuid }))
      .await?;
    owners(uuid, data.addresses)
  }

  async fn find_it_account_owner(&self, uuid: Uuid) -> Result<Option<Owners>> {
    let data: ItUsers<Objects<Validities<RawOwner>>> = self
      .graphql(queries::ITUSER_OWNER, json!({ "uuid": uuid }))
      .await?;
    owners(uuid, data.itusers)
  }

  async fn find_manager_unit(&self, uuid: Uuid) -> Result<Option<Uuid>> {
    let data: Managers<Objects<Validities<RawOwner>>> = self
      .graphql(queries::MANAGER_UNIT, json!({ "uuid": uuid }))
      .await?;
    Ok(owners(uuid, data.managers)?.and_then(|o| o.org_unit))
  }

  async fn find_engagement_person(&self, uuid: Uuid) -> Result<Option<Uuid>> {
    let data: Engagements<Objects<Validities<RawOwner>>> = self
      .graphql(queries::ENGAGEMENT_PERSON, json!({ "uuid": uuid }))
      .await?;
    Ok(owners(uuid, data.engagements)?.and_then(|o| o.person))
  }

  async fn find_kle_unit(&self, uuid: Uuid) -> Result<Option<Uuid>> {
    let data: Kles<Objects<Validities<RawOwner>>> = self
      .graphql(queries::KLE_UNIT, json!({ "uuid": uuid }))
      .await?;
    Ok(owners(uuid, data.kles)?.and_then(|o| o.org_unit))
  }
}
