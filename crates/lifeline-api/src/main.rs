//! lifeline-server binary.
//!
//! Reads `config.toml` (or the path specified with `--config`) and
//! `LIFELINE_*` environment variables, opens the SQLite store, and serves the
//! JSON API over HTTP.
//!
//! # Provisioning an account
//!
//! ```
//! cargo run -p lifeline-api --bin lifeline-server -- --create-user "Ada"
//! ```

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::Context as _;
use clap::Parser;
use lifeline_api::ServerConfig;
use lifeline_core::{interval::CheckInInterval, user::NewUser};
use lifeline_store_sqlite::SqliteStore;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Lifeline API server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  /// Create an account with this name, print its id and QR code, and exit.
  #[arg(long, value_name = "NAME")]
  create_user: Option<String>,
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

  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(config::Environment::with_prefix("LIFELINE"))
    .build()
    .context("failed to read config file")?;

  let server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;

  let store_path = expand_tilde(&server_cfg.store_path);
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;

  if let Some(name) = cli.create_user {
    let interval = CheckInInterval::new(server_cfg.default_interval_secs)
      .context("invalid default_interval_secs")?;
    let user = store
      .create_user(NewUser { check_in_interval: interval, ..NewUser::new(name) })
      .await
      .context("failed to create user")?;
    println!("user_id    {}", user.user_id);
    println!("qr_code_id {}", user.qr_code_id);
    return Ok(());
  }

  let app = lifeline_api::api_router(Arc::new(store)).layer(TraceLayer::new_for_http());
  let address = format!("{}:{}", server_cfg.host, server_cfg.port);

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
