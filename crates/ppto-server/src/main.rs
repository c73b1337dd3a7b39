//! ppto-server binary.
//!
//! Reads `config.toml` (or the path specified with `--config`) layered with
//! `PPTO_*` environment variables, opens the SQLite store, and serves the JSON
//! API under `/api`.
//!
//! # Password hash generation
//!
//! To print an argon2 PHC string for a password:
//!
//! ```
//! cargo run -p ppto-server -- --hash-password
//! ```

use std::path::PathBuf;

use anyhow::Context as _;
use axum::Router;
use clap::Parser;
use ppto_api::{AppState, api_router};
use ppto_server::ServerConfig;
use ppto_store_sqlite::SqliteStore;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Municipal budget-execution tracker")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  /// Print the argon2 hash for a password entered on stdin and exit.
  #[arg(long)]
  hash_password: bool,
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

  if cli.hash_password {
    let password = read_password()?;
    let hash = ppto_core::credential::hash_password(&password)
      .map_err(|e| anyhow::anyhow!("argon2 error: {e}"))?;
    println!("{hash}");
    return Ok(());
  }

  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(config::Environment::with_prefix("PPTO"))
    .build()
    .context("failed to read config file")?;

  let server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;

  let database_path = server_cfg
    .prepare_database_path()
    .context("failed to create data directory")?;
  let store = SqliteStore::open(&database_path)
    .await
    .with_context(|| format!("failed to open database at {database_path:?}"))?;

  let state = AppState::new(store, server_cfg.api_config());
  let app = Router::new().nest("/api", api_router(state));
  let address = server_cfg.address();

  tracing::info!(
    database = %database_path.display(),
    trust_directory_users = server_cfg.trust_directory_users,
    "Listening on http://{address}/api"
  );
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}

/// Read a password from stdin.
fn read_password() -> anyhow::Result<String> {
  use std::io::{self, BufRead, Write};
  print!("Password: ");
  io::stdout().flush().ok();
  let mut line = String::new();
  io::stdin().lock().read_line(&mut line)?;
  let password = line.trim_end_matches(['\n', '\r']).to_string();
  anyhow::ensure!(!password.is_empty(), "password must not be empty");
  Ok(password)
}
