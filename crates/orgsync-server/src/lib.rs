//! Export driver and HTTP surface.
//!
//! The [`Exporter`] reconciles the directory service with the registry, either
//! in one full pass or per changed entity. The axum [`router`] exposes both:
//! trigger endpoints for operators and `/events/{kind}/{uuid}` for the event
//! router that relays registry changes.

pub mod error;
pub mod events;
pub mod reader;
pub mod retry;
pub mod sync;

#[cfg(test)]
mod tests;

use std::sync::Arc;

use axum::{
  Json, Router,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
  routing::{get, post},
};
use orgsync_core::{Settings, directory::DirectoryService, registry::Registry};
use serde::Deserialize;
use serde_json::{Value, json};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

pub use error::{Error, Result};
pub use events::{EventKind, UnitSync};
pub use reader::{Reader, UnitState};
pub use retry::RetryPolicy;
pub use sync::{Exporter, SyncReport, Timing};

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime configuration, deserialised from `config.toml` and `ORGSYNC__*`.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:     String,
  #[serde(default = "default_port")]
  pub port:     u16,
  pub settings: Settings,
}

fn default_host() -> String {
  "0.0.0.0".to_string()
}

fn default_port() -> u16 {
  8000
}

// ─── Application state ────────────────────────────────────────────────────────

pub struct AppState<R, D> {
  pub exporter: Arc<Exporter<R, D>>,
  pub config:   Arc<ServerConfig>,
}

impl<R, D> Clone for AppState<R, D> {
  fn clone(&self) -> Self {
    Self {
      exporter: Arc::clone(&self.exporter),
      config:   Arc::clone(&self.config),
    }
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

pub fn router<R, D>(state: AppState<R, D>) -> Router
where
  R: Registry + 'static,
  D: DirectoryService + 'static,
{
  Router::new()
    .route("/",                       get(index))
    .route("/trigger",                post(trigger_full::<R, D>))
    .route("/trigger/user/{uuid}",    post(trigger_user::<R, D>))
    .route("/trigger/orgunit/{uuid}", post(trigger_org_unit::<R, D>))
    .route("/events/{kind}/{uuid}",   post(event::<R, D>))
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}

// ─── Handlers ─────────────────────────────────────────────────────────────────

async fn index() -> Json<Value> {
  Json(json!({ "name": "orgsync" }))
}

/// Start a full sync in the background and answer immediately.
async fn trigger_full<R, D>(State(state): State<AppState<R, D>>) -> impl IntoResponse
where
  R: Registry + 'static,
  D: DirectoryService + 'static,
{
  let exporter = Arc::clone(&state.exporter);
  tokio::spawn(async move {
    if let Err(err) = exporter.run_full_sync().await {
      tracing::error!(%err, "full sync failed");
    }
  });
  (StatusCode::ACCEPTED, Json(json!({ "triggered": "OK" })))
}

async fn trigger_user<R, D>(
  State(state): State<AppState<R, D>>,
  Path(uuid): Path<Uuid>,
) -> Result<Json<&'static str>>
where
  R: Registry + 'static,
  D: DirectoryService + 'static,
{
  state.exporter.sync_person(uuid).await?;
  Ok(Json("OK"))
}

async fn trigger_org_unit<R, D>(
  State(state): State<AppState<R, D>>,
  Path(uuid): Path<Uuid>,
) -> Result<Json<&'static str>>
where
  R: Registry + 'static,
  D: DirectoryService + 'static,
{
  match state.exporter.sync_org_unit(uuid).await? {
    UnitSync::Missing => Ok(Json("Org unit not found")),
    _ => Ok(Json("OK")),
  }
}

async fn event<R, D>(
  State(state): State<AppState<R, D>>,
  Path((kind, uuid)): Path<(String, Uuid)>,
) -> Result<StatusCode>
where
  R: Registry + 'static,
  D: DirectoryService + 'static,
{
  let kind = EventKind::parse(&kind)?;
  state.exporter.handle(kind, uuid).await?;
  Ok(StatusCode::NO_CONTENT)
}
