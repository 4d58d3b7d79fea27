//! `quickdesk`: command-line client for a QuickDesk server.
//!
//! # Usage
//!
//! ```text
//! quickdesk login --email ada@example.com --password secret1
//! export QUICKDESK_TOKEN=...
//! quickdesk tickets --status open --search vpn
//! quickdesk new "VPN drops" "Every ten minutes" --category 3 --attach shot.png
//! quickdesk --config ~/.config/quickdesk/config.toml show 12
//! ```

mod client;
mod forms;
mod render;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use client::{ApiClient, ClientError, TicketQuery};
use forms::{LoginForm, RegisterForm, TicketForm};
use quickdesk_core::{
  category::CategoryId,
  ticket::{TicketId, TicketStatus},
  user::{Role, UserId},
  vote::VoteValue,
};
use serde::Deserialize;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "quickdesk", about = "Command-line client for the QuickDesk helpdesk")]
struct Args {
  /// Path to a TOML config file (url, token).
  #[arg(short, long, value_name = "FILE")]
  config: Option<PathBuf>,

  /// Base URL of the QuickDesk server (default: http://localhost:3000).
  #[arg(long, env = "QUICKDESK_URL")]
  url: Option<String>,

  /// Bearer token from `quickdesk login`.
  #[arg(long, env = "QUICKDESK_TOKEN", hide_env_values = true)]
  token: Option<String>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Create an account.
  Register {
    #[arg(long)]
    name:     String,
    #[arg(long)]
    email:    String,
    #[arg(long, env = "QUICKDESK_PASSWORD", hide_env_values = true)]
    password: String,
    /// Repeat the password.
    #[arg(long)]
    confirm:  String,
  },
  /// Sign in and print a token to use with `--token`.
  Login {
    #[arg(long)]
    email:    String,
    #[arg(long, env = "QUICKDESK_PASSWORD", hide_env_values = true)]
    password: String,
  },
  /// Show the signed-in account.
  Me,
  /// Change a user's role (admin only).
  SetRole { user_id: UserId, role: Role },
  /// List categories.
  Categories,
  /// Add a category (admin only).
  AddCategory { name: String },
  /// List tickets, most recently updated first.
  Tickets {
    #[arg(long)]
    status:   Option<TicketStatus>,
    #[arg(long, short)]
    search:   Option<String>,
    #[arg(long)]
    category: Option<CategoryId>,
    /// Only tickets you opened.
    #[arg(long)]
    mine:     bool,
    #[arg(long)]
    limit:    Option<usize>,
    #[arg(long)]
    offset:   Option<usize>,
  },
  /// Show one ticket with its comments.
  Show { id: TicketId },
  /// Open a ticket.
  New {
    subject:     String,
    description: String,
    #[arg(long)]
    category:    CategoryId,
    /// File to attach.
    #[arg(long, value_name = "FILE")]
    attach:      Option<PathBuf>,
  },
  /// Move a ticket to another status.
  Status { id: TicketId, status: TicketStatus },
  /// Assign a ticket to a user, or clear the assignee.
  Assign {
    id: TicketId,
    #[arg(long, conflicts_with = "unassign", required_unless_present = "unassign")]
    to: Option<UserId>,
    #[arg(long)]
    unassign: bool,
  },
  /// Delete a ticket (admin only).
  Delete { id: TicketId },
  /// Vote a ticket up or down.
  Vote { id: TicketId, direction: Direction },
  /// Comment on a ticket.
  Comment { id: TicketId, message: String },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Direction {
  Up,
  Down,
}

impl From<Direction> for VoteValue {
  fn from(d: Direction) -> Self {
    match d {
      Direction::Up => VoteValue::Up,
      Direction::Down => VoteValue::Down,
    }
  }
}

// ─── Config file ──────────────────────────────────────────────────────────────

/// Shape of the optional TOML config file.
#[derive(Deserialize, Default)]
struct ConfigFile {
  #[serde(default)]
  url:   String,
  #[serde(default)]
  token: String,
}

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_writer(std::io::stderr)
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .from_env_lossy(),
    )
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
    .unwrap_or_else(|| "http://localhost:3000".to_string());
  let token = args
    .token
    .or_else(|| (!file_cfg.token.is_empty()).then(|| file_cfg.token.clone()));

  let client = ApiClient::new(base_url, token)?;
  let result = run(&client, args.command).await;

  let unauthorized = result
    .as_ref()
    .err()
    .and_then(|e| e.downcast_ref::<ClientError>())
    .is_some_and(|e| e.status() == Some(401));
  if unauthorized {
    eprintln!("hint: sign in with `quickdesk login` and pass the token with --token or QUICKDESK_TOKEN");
  }
  result
}

async fn run(client: &ApiClient, command: Command) -> Result<()> {
  match command {
    Command::Register { name, email, password, confirm } => {
      let form = RegisterForm { name, email, password, confirm };
      form.check().map_err(anyhow::Error::msg)?;
      let user = client.register(&form).await?;
      println!("Registration successful.\n{}", render::user(&user));
    }
    Command::Login { email, password } => {
      let form = LoginForm { email, password };
      form.check().map_err(anyhow::Error::msg)?;
      let session = client.login(&form.email, &form.password).await?;
      eprintln!(
        "Signed in as {} (token expires {})",
        render::user(&session.user),
        session.expires_at.format("%Y-%m-%d %H:%M UTC"),
      );
      println!("{}", session.token);
    }
    Command::Me => println!("{}", render::user(&client.me().await?)),
    Command::SetRole { user_id, role } => {
      println!("{}", render::user(&client.set_role(user_id, role).await?));
    }
    Command::Categories => print!("{}", render::categories(&client.categories().await?)),
    Command::AddCategory { name } => {
      let category = client.create_category(&name).await?;
      println!("Created category #{} {}", category.id, category.name);
    }
    Command::Tickets { status, search, category, mine, limit, offset } => {
      let query = TicketQuery { status, search, category_id: category, mine, limit, offset };
      print!("{}", render::ticket_list(&client.list_tickets(&query).await?));
    }
    Command::Show { id } => {
      let (detail, comments) = tokio::try_join!(client.get_ticket(id), client.comments(id))?;
      print!("{}", render::ticket_detail(&detail));
      println!("\n── Comments ──");
      print!("{}", render::comments(&comments));
    }
    Command::New { subject, description, category, attach } => {
      let form = TicketForm { subject, description, category_id: category, attachment: attach };
      form.check().map_err(anyhow::Error::msg)?;
      let ticket = client.create_ticket(&form).await?;
      println!("Opened ticket #{}", ticket.id);
    }
    Command::Status { id, status } => {
      let ticket = client.update_status(id, status).await?;
      println!("Ticket #{} is now {}", ticket.id, ticket.status);
    }
    Command::Assign { id, to, unassign } => {
      let assignee = if unassign { None } else { to };
      let ticket = client.assign(id, assignee).await?;
      match ticket.assigned_to {
        Some(user_id) => println!("Ticket #{} assigned to user #{user_id}", ticket.id),
        None => println!("Ticket #{} is unassigned", ticket.id),
      }
    }
    Command::Delete { id } => {
      client.delete_ticket(id).await?;
      println!("Deleted ticket #{id}");
    }
    Command::Vote { id, direction } => {
      let outcome = client.vote(id, direction.into()).await?;
      println!("Ticket #{id} now has {:+} votes", outcome.vote_count);
    }
    Command::Comment { id, message } => {
      forms::check_comment(&message).map_err(anyhow::Error::msg)?;
      client.add_comment(id, &message).await?;
      println!("Comment added to ticket #{id}");
    }
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use clap::CommandFactory;

  use super::*;

  #[test]
  fn cli_definition_is_consistent() { Args::command().debug_assert(); }

  #[test]
  fn status_and_role_parse_from_snake_case() {
    let args = Args::parse_from(["quickdesk", "status", "4", "in_progress"]);
    assert!(matches!(
      args.command,
      Command::Status { id: 4, status: TicketStatus::InProgress }
    ));
    let args = Args::parse_from(["quickdesk", "set-role", "2", "agent"]);
    assert!(matches!(args.command, Command::SetRole { user_id: 2, role: Role::Agent }));
  }

  #[test]
  fn assign_needs_a_target_or_unassign() {
    assert!(Args::try_parse_from(["quickdesk", "assign", "4"]).is_err());
    assert!(Args::try_parse_from(["quickdesk", "assign", "4", "--to", "2", "--unassign"]).is_err());
    let args = Args::parse_from(["quickdesk", "assign", "4", "--unassign"]);
    assert!(matches!(args.command, Command::Assign { to: None, unassign: true, .. }));
  }
}
