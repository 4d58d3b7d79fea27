//! quickdesk-server binary.
//!
//! Reads `config.toml` (or the path specified with `--config`) layered under
//! `QUICKDESK_*` environment variables, opens the SQLite store, and serves
//! the helpdesk API over HTTP.
//!
//! # First administrator
//!
//! Register an account through the API, then grant it the admin role:
//!
//! ```text
//! quickdesk-server --promote-admin you@example.com
//! ```

use std::{path::PathBuf, time::Duration};

use anyhow::Context as _;
use clap::Parser;
use quickdesk_api::{AppState, TokenKeys};
use quickdesk_server::{DiskAttachments, Environment, ServerConfig};
use quickdesk_store_sqlite::SqliteStore;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "QuickDesk helpdesk server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  /// Grant the admin role to the account with this email and exit.
  #[arg(long, value_name = "EMAIL")]
  promote_admin: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  // Initialise tracing.
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  // Load configuration.
  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(
      config::Environment::with_prefix("QUICKDESK")
        .try_parsing(true)
        .list_separator(",")
        .with_list_parse_key("seed_categories"),
    )
    .build()
    .context("failed to read config file")?;

  let server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;

  // Open SQLite store.
  let store = SqliteStore::open(&server_cfg.store_path)
    .await
    .with_context(|| format!("failed to open store at {:?}", server_cfg.store_path))?
    .with_deadline(Duration::from_millis(server_cfg.storage_timeout_ms));

  // Helper mode: promote an account and exit.
  if let Some(email) = cli.promote_admin {
    let user = quickdesk_server::promote_admin(&store, &email).await?;
    println!("{} <{}> is now an admin", user.name, user.email);
    return Ok(());
  }

  quickdesk_server::seed_categories(&store, &server_cfg.seed_categories).await?;

  tokio::fs::create_dir_all(&server_cfg.uploads_dir)
    .await
    .with_context(|| format!("failed to create {:?}", server_cfg.uploads_dir))?;

  let tokens = TokenKeys::new(
    &server_cfg.token_secret,
    chrono::Duration::hours(server_cfg.token_ttl_hours),
  )
  .context("invalid token_secret")?;

  if server_cfg.environment == Environment::Development {
    tracing::warn!("development mode: internal error detail is sent to clients");
  }

  // Build application state.
  let state = AppState::new(
    store,
    DiskAttachments::new(&server_cfg.uploads_dir),
    tokens,
  );

  let app = quickdesk_server::app(state, &server_cfg);
  let address = format!("{}:{}", server_cfg.host, server_cfg.port);

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}
