//! `DirectoryClient`: the directory service over HTTP.

use std::time::Duration;

use orgsync_core::{
  directory::DirectoryService,
  settings::DirectorySettings,
  target::{Hierarchy, OrgUnit, User},
};
use reqwest::{
  Client, Response, StatusCode,
  header::{HeaderMap, HeaderName, HeaderValue, USER_AGENT},
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{Error, Result};

/// Sent as `User-Agent` on every request.
pub const CLIENT_NAME: &str = concat!("orgsync/", env!("CARGO_PKG_VERSION"));

/// Municipality number header.
const CVR: HeaderName = HeaderName::from_static("cvr");

// ─── Wire shapes ─────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct HierarchyEnvelope {
  #[serde(rename = "Result")]
  result: Option<HierarchyBody>,
}

#[derive(Debug, Deserialize)]
struct HierarchyBody {
  #[serde(rename = "OUs", default)]
  org_units: Vec<Entry>,
  #[serde(rename = "Users", default)]
  users:     Vec<Entry>,
}

#[derive(Debug, Deserialize)]
struct Entry {
  #[serde(rename = "Uuid")]
  uuid: Uuid,
}

impl From<HierarchyBody> for Hierarchy {
  fn from(body: HierarchyBody) -> Self {
    Hierarchy {
      org_units: body.org_units.into_iter().map(|e| e.uuid).collect(),
      users:     body.users.into_iter().map(|e| e.uuid).collect(),
    }
  }
}

// ─── Client ──────────────────────────────────────────────────────────────────

/// HTTP client for the directory service.
///
/// Every request carries the municipality as the `CVR` header.
#[derive(Clone)]
pub struct DirectoryClient {
  client:   Client,
  base_url: String,
}

impl DirectoryClient {
  pub fn new(settings: &DirectorySettings, municipality: &str) -> Result<Self> {
    let mut headers = HeaderMap::new();
    headers.insert(CVR, HeaderValue::from_str(municipality)?);
    headers.insert(USER_AGENT, HeaderValue::from_static(CLIENT_NAME));

    let client = Client::builder()
      .timeout(Duration::from_secs(settings.timeout_secs))
      .danger_accept_invalid_certs(!settings.verify_tls)
      .default_headers(headers)
      .build()?;
    Ok(Self {
      client,
      base_url: settings.url.trim_end_matches('/').to_string(),
    })
  }

  fn url(&self, path: &str) -> String {
    format!("{}{}", self.base_url, path)
  }

  fn check(method: &'static str, url: String, resp: &Response) -> Result<()> {
    let status = resp.status();
    if status.is_success() {
      Ok(())
    } else {
      Err(Error::Status { method, url, status })
    }
  }

  async fn delete(&self, path: &str) -> Result<()> {
    let url = self.url(path);
    let resp = self.client.delete(&url).send().await?;
    if resp.status() == StatusCode::NOT_FOUND {
      tracing::warn!(%url, "delete target not found");
      return Ok(());
    }
    Self::check("DELETE", url, &resp)
  }

  async fn post<T: serde::Serialize + ?Sized>(&self, path: &str, body: &T) -> Result<()> {
    let url = self.url(path);
    let resp = self.client.post(&url).json(body).send().await?;
    Self::check("POST", url, &resp)
  }
}

impl DirectoryService for DirectoryClient {
  type Error = Error;

  async fn get_org_unit(&self, uuid: Uuid) -> Result<Option<OrgUnit>> {
    let url = self.url(&format!("/orgUnit/{uuid}"));
    let resp = self.client.get(&url).send().await?;
    if resp.status() == StatusCode::NOT_FOUND {
      return Ok(None);
    }
    Self::check("GET", url, &resp)?;
    Ok(Some(resp.json().await?))
  }

  async fn post_org_unit<'a>(&'a self, unit: &'a OrgUnit) -> Result<()> {
    tracing::debug!(uuid = %unit.uuid, "posting org unit");
    self.post("/orgUnit/", unit).await
  }

  async fn delete_org_unit(&self, uuid: Uuid) -> Result<()> {
    self.delete(&format!("/orgUnit/{uuid}")).await
  }

  async fn post_user<'a>(&'a self, user: &'a User) -> Result<()> {
    tracing::debug!(uuid = %user.uuid, "posting user");
    self.post("/user", user).await
  }

  async fn delete_user(&self, uuid: Uuid) -> Result<()> {
    self.delete(&format!("/user/{uuid}")).await
  }

  async fn trigger_hierarchy(&self) -> Result<Uuid> {
    let url = self.url("/hierarchy");
    let resp = self.client.get(&url).send().await?;
    Self::check("GET", url, &resp)?;
    let body = resp.text().await?;
    match Uuid::parse_str(body.trim().trim_matches('"')) {
      Ok(request) => Ok(request),
      Err(source) => Err(Error::RequestId { body, source }),
    }
  }

  async fn get_hierarchy(&self, request: Uuid) -> Result<Option<Hierarchy>> {
    let url = self.url(&format!("/hierarchy/{request}"));
    let resp = self.client.get(&url).send().await?;
    Self::check("GET", url, &resp)?;
    let envelope: HierarchyEnvelope = resp.json().await?;
    Ok(envelope.result.map(Hierarchy::from))
  }
}
