//! `lifeline`: command-line client for a Lifeline server.
//!
//! # Usage
//!
//! ```
//! lifeline --url http://localhost:8080 --user <uuid> status
//! lifeline --config ~/.config/lifeline/config.toml watch
//! ```

mod client;
mod display;

use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use client::HttpRemote;
use lifeline_core::{contact::Roles, interval::CheckInInterval};
use lifeline_sync::{LocalAuth, Session, SessionConfig};
use serde::Deserialize;
use tokio::sync::broadcast::error::RecvError;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

type CliSession = Session<HttpRemote, LocalAuth>;

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "lifeline", about = "Check in and look after your contacts")]
struct Args {
  /// Path to a TOML config file (url, user_id, poll_interval_secs).
  #[arg(short, long, value_name = "FILE")]
  config: Option<std::path::PathBuf>,

  /// Base URL of the Lifeline server (default: http://localhost:8080).
  #[arg(long, env = "LIFELINE_URL")]
  url: Option<String>,

  /// The account to act as.
  #[arg(long, env = "LIFELINE_USER_ID")]
  user: Option<Uuid>,

  /// How often `watch` polls the server, in seconds.
  #[arg(long, env = "LIFELINE_POLL_INTERVAL_SECS")]
  poll_interval_secs: Option<u64>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Show check-in status, pending pings and lapsed dependents.
  Status,
  /// Check in now.
  CheckIn,
  /// Set the check-in interval.
  Interval { minutes: i64 },
  /// List contacts.
  Contacts,
  /// Add a contact by QR code.
  Add {
    qr_code:   Uuid,
    /// The contact is notified about you.
    #[arg(long)]
    responder: bool,
    /// You look after the contact and may ping them.
    #[arg(long)]
    dependent: bool,
  },
  /// Change a contact's roles.
  Roles {
    peer:      Uuid,
    #[arg(long)]
    responder: bool,
    #[arg(long)]
    dependent: bool,
  },
  /// Remove a contact in both directions.
  Remove { peer: Uuid },
  /// Ask a dependent to check in.
  Ping { peer: Uuid },
  /// Cancel a ping you sent.
  ClearPing { peer: Uuid },
  /// Answer an incoming ping.
  Respond {
    #[arg(required_unless_present = "all")]
    peer: Option<Uuid>,
    /// Answer every pending ping.
    #[arg(long, conflicts_with = "peer")]
    all:  bool,
  },
  /// Raise or lower your manual alert.
  Alert { state: Toggle },
  /// Follow changes and print events until interrupted.
  Watch,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Toggle {
  On,
  Off,
}

// ─── Config file ──────────────────────────────────────────────────────────────

/// Shape of the optional TOML config file.
#[derive(Deserialize, Default)]
struct ConfigFile {
  #[serde(default)]
  url:                String,
  #[serde(default)]
  user_id:            Option<Uuid>,
  #[serde(default)]
  poll_interval_secs: Option<u64>,
}

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .from_env_lossy(),
    )
    .with_writer(std::io::stderr)
    .init();

  let args = Args::parse();

  let file_cfg: ConfigFile = if let Some(path) = &args.config {
    let raw = std::fs::read_to_string(path)
      .with_context(|| format!("reading config file {}", path.display()))?;
    toml::from_str(&raw).context("parsing config file")?
  } else {
    ConfigFile::default()
  };

  // CLI flags override config file, which overrides defaults.
  let base_url = args
    .url
    .or_else(|| (!file_cfg.url.is_empty()).then(|| file_cfg.url.clone()))
    .unwrap_or_else(|| "http://localhost:8080".to_string());
  let user_id = args
    .user
    .or(file_cfg.user_id)
    .context("no user id; pass --user or set user_id in the config file")?;
  let poll_secs = args.poll_interval_secs.or(file_cfg.poll_interval_secs).unwrap_or(5);

  let remote = HttpRemote::new(base_url, Duration::from_secs(poll_secs.max(1)))
    .context("failed to build HTTP client")?;
  let session = Session::new(
    Arc::new(remote),
    Arc::new(LocalAuth::signed_in(user_id)),
    SessionConfig { expiry_poll_secs: poll_secs.max(1), ..SessionConfig::default() },
  );

  session.load_self().await.context("loading your account")?;
  session.load_contacts().await.context("loading contacts")?;

  run(&session, args.command).await
}

async fn run(session: &CliSession, command: Command) -> Result<()> {
  match command {
    Command::Status => display::status(session),
    Command::CheckIn => {
      session.check_in().await.context("check-in failed")?;
      display::status(session);
    }
    Command::Interval { minutes } => {
      let interval = CheckInInterval::from_minutes(minutes)?;
      session.update_check_in_interval(interval).await.context("updating interval")?;
      display::status(session);
    }
    Command::Contacts => display::contacts(session),
    Command::Add { qr_code, responder, dependent } => {
      let roles = Roles::new(responder, dependent)?;
      let contact = session.add_contact(qr_code, roles).await.context("adding contact")?;
      println!("added {} ({})", contact.name, contact.peer_id);
    }
    Command::Roles { peer, responder, dependent } => {
      session.update_roles(peer, responder, dependent).await.context("updating roles")?;
      display::contacts(session);
    }
    Command::Remove { peer } => {
      session.remove_contact(peer).await.context("removing contact")?;
    }
    Command::Ping { peer } => {
      session.ping_dependent(peer).await.context("ping failed")?;
    }
    Command::ClearPing { peer } => {
      session.clear_ping(peer).await.context("clearing ping")?;
    }
    Command::Respond { peer, all } => {
      match peer {
        Some(peer) if !all => session.respond_to_ping(peer).await,
        _ => session.respond_to_all_pings().await,
      }
      .context("responding to ping")?;
      println!("pending pings: {}", session.pending_pings_count());
    }
    Command::Alert { state } => {
      session
        .set_manual_alert(matches!(state, Toggle::On))
        .await
        .context("updating manual alert")?;
      display::status(session);
    }
    Command::Watch => watch(session).await?,
  }
  Ok(())
}

async fn watch(session: &CliSession) -> Result<()> {
  let mut events = session.events();
  session.start_streams()?;
  display::status(session);

  loop {
    tokio::select! {
      _ = tokio::signal::ctrl_c() => break,
      event = events.recv() => match event {
        Ok(event) => println!("{}", display::event(session, &event)),
        Err(RecvError::Lagged(n)) => tracing::warn!(skipped = n, "event consumer lagged"),
        Err(RecvError::Closed) => break,
      },
    }
  }

  session.stop_streams().await;
  Ok(())
}
