//! orgsync binary.
//!
//! Reads `config.toml` (or the path given with `--config`) layered under
//! `ORGSYNC__*` environment variables, then either serves the trigger and
//! event endpoints or, with `--once`, runs a single full sync and exits.
//!
//! ```text
//! ORGSYNC__SETTINGS__MUNICIPALITY=12345678 \
//! ORGSYNC__SETTINGS__TOP_UNIT_UUID=... \
//! ORGSYNC__SETTINGS__UUID_FROM_IT_SYSTEMS=FK-ORG UUID,AD \
//!   orgsync --once
//! ```

use std::{path::PathBuf, sync::Arc};

use anyhow::Context as _;
use clap::Parser;
use orgsync_core::registry::Registry as _;
use orgsync_directory::Directory;
use orgsync_registry::RegistryClient;
use orgsync_server::{AppState, Exporter, Reader, RetryPolicy, ServerConfig};
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

/// Settings read as comma-separated lists from the environment.
const LIST_KEYS: &[&str] = &[
  "settings.phone_scope_classes",
  "settings.landline_scope_classes",
  "settings.email_scope_classes",
  "settings.ignored_unit_levels",
  "settings.ignored_unit_types",
  "settings.filter_orgunit_uuid",
  "settings.filter_hierarchy_names",
  "settings.employee_engagement_address",
  "settings.uuid_from_it_systems",
  "settings.user_key_it_systems",
];

#[derive(Parser)]
#[command(author, version, about = "Organisation export to the directory service")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  /// Run one full sync and exit instead of serving.
  #[arg(long)]
  once: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  let environment = LIST_KEYS.iter().fold(
    config::Environment::with_prefix("ORGSYNC")
      .prefix_separator("__")
      .separator("__")
      .list_separator(",")
      .try_parsing(true),
    |env, key| env.with_list_parse_key(key),
  );
  let server_cfg: ServerConfig = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(environment)
    .build()
    .context("failed to read configuration")?
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;

  server_cfg
    .settings
    .validate()
    .context("invalid settings")?;
  let settings = Arc::new(server_cfg.settings.clone());

  let registry = Arc::new(
    RegistryClient::new(&settings.registry).context("failed to build registry client")?,
  );
  let organisation = RetryPolicy::default()
    .execute("organisation lookup", || registry.organisation_uuid())
    .await
    .context("failed to look up the registry organisation")?;
  tracing::info!(%organisation, "registry organisation found");

  let directory = Arc::new(
    Directory::from_settings(&settings).context("failed to build directory client")?,
  );
  let reader = Reader::new(registry, Arc::clone(&settings), organisation);
  let exporter = Arc::new(Exporter::new(reader, directory));

  if cli.once {
    exporter.run_full_sync().await.context("full sync failed")?;
    return Ok(());
  }

  let state = AppState { exporter, config: Arc::new(server_cfg.clone()) };
  let app = orgsync_server::router(state);
  let address = format!("{}:{}", server_cfg.host, server_cfg.port);

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}
