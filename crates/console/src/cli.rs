use crate::state::AppState;
use crate::views::{Choice, EquipmentFilter, EquipmentView, LogbookFilter, LogbookView, UserFilter, UsersView};
use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use sensicity_auth::{LoginRequest, Session};
use sensicity_models::{ConformityStatus, EntryStatus, EquipmentStatus, EquipmentType, Priority, UserStatus};
use std::io::Write;

/// Sensicity fleet administration console
#[derive(Debug, Parser)]
#[command(
    name = "sensicity",
    about = "Video-surveillance fleet administration",
    long_about = "Video-surveillance fleet administration.\n\n\
        Each invocation is a separate process: DATABASE_URL must name a PostgreSQL \
        database, since the session saved by `login` is restored from it by later commands."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Sign in and remember the session locally
    Login {
        #[arg(short, long, env = "SENSICITY_EMAIL")]
        email: String,

        #[arg(short, long, env = "SENSICITY_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Forget the local session
    Logout,

    /// Show the signed-in user and their permissions
    Whoami,

    /// Exit non-zero unless every listed permission is held
    Check {
        #[arg(required = true)]
        permissions: Vec<String>,
    },

    /// Equipment inventory
    #[command(subcommand)]
    Equipment(EquipmentCommand),

    /// Incident and event logbook
    #[command(subcommand)]
    Logbook(LogbookCommand),

    /// User administration
    #[command(subcommand)]
    Users(UsersCommand),
}

#[derive(Debug, Subcommand)]
pub enum EquipmentCommand {
    List {
        #[arg(short, long, default_value = "")]
        search: String,

        #[arg(long = "type", default_value = "all")]
        equipment_type: Choice<EquipmentType>,

        #[arg(long, default_value = "all")]
        status: Choice<EquipmentStatus>,

        #[arg(long, default_value = "all")]
        conformity: Choice<ConformityStatus>,
    },
}

#[derive(Debug, Subcommand)]
pub enum LogbookCommand {
    List {
        #[arg(short, long, default_value = "")]
        search: String,

        #[arg(long, default_value = "all")]
        priority: Choice<Priority>,

        #[arg(long, default_value = "all")]
        status: Choice<EntryStatus>,
    },
}

#[derive(Debug, Subcommand)]
pub enum UsersCommand {
    List {
        #[arg(short, long, default_value = "")]
        search: String,

        #[arg(long, default_value = "all")]
        status: Choice<UserStatus>,
    },
}

/// Run one command against `state`, writing human-readable output to `out`.
pub async fn run(command: Command, state: &AppState, out: &mut impl Write) -> anyhow::Result<()> {
    match command {
        Command::Login { email, password } => {
            let session = state.auth.login(LoginRequest::new(email, password)).await?;
            writeln!(
                out,
                "Signed in as {} ({} permissions)",
                session.user().email,
                session.permissions().len()
            )?;
        }
        Command::Logout => match state.auth.restore().await? {
            Some(session) => {
                let email = session.user().email.clone();
                state.auth.logout(session).await?;
                writeln!(out, "Signed out {}", email)?;
            }
            None => writeln!(out, "Not signed in")?,
        },
        Command::Whoami => {
            let session = current_session(state).await?;
            let user = session.user();
            writeln!(out, "{} {} <{}>", user.first_name, user.last_name, user.email)?;
            for permission in session.permissions().iter() {
                writeln!(out, "  {}", permission)?;
            }
        }
        Command::Check { permissions } => {
            let session = current_session(state).await?;
            let names: Vec<&str> = permissions.iter().map(String::as_str).collect();
            let missing: Vec<&str> = names
                .iter()
                .copied()
                .filter(|p| !session.has_permission(p))
                .collect();
            if !missing.is_empty() {
                bail!("missing permissions: {}", missing.join(", "));
            }
            writeln!(out, "ok")?;
        }
        Command::Equipment(EquipmentCommand::List {
            search,
            equipment_type,
            status,
            conformity,
        }) => {
            let session = current_session(state).await?;
            let mut view = state.equipment_view();
            view.load(&session).await?;
            let filter = EquipmentFilter {
                search,
                equipment_type,
                status,
                conformity,
            };
            let items = view.filtered(&filter);
            for item in &items {
                writeln!(
                    out,
                    "{}  {:<32} {:<8} {:<14} {}",
                    item.id, item.name, item.equipment_type, item.status, item.conformity_status
                )?;
            }
            let stats = EquipmentView::stats(items.iter().copied());
            writeln!(out, "{} equipment", stats.total)?;
        }
        Command::Logbook(LogbookCommand::List {
            search,
            priority,
            status,
        }) => {
            let session = current_session(state).await?;
            let mut view = state.logbook_view();
            view.load(&session).await?;
            let filter = LogbookFilter {
                search,
                priority,
                status,
                ..Default::default()
            };
            let entries = view.filtered(&filter);
            for entry in &entries {
                writeln!(
                    out,
                    "#{:<6} {}  {:<8} {:<20} {}",
                    entry.id,
                    entry.timestamp.format("%Y-%m-%d %H:%M"),
                    entry.priority,
                    entry.status,
                    entry.description
                )?;
            }
            let stats = LogbookView::stats(entries.iter().copied());
            writeln!(
                out,
                "{} entries, {} critical, {} in progress, {} closed",
                stats.total, stats.critical, stats.in_progress, stats.closed
            )?;
        }
        Command::Users(UsersCommand::List { search, status }) => {
            let session = current_session(state).await?;
            let mut view = state.users_view();
            view.load(&session).await?;
            let filter = UserFilter {
                search,
                status,
                ..Default::default()
            };
            let users = view.filtered(&filter);
            for user in &users {
                writeln!(
                    out,
                    "{:<36} {:<32} {:<10} {}",
                    user.profile.email,
                    format!("{} {}", user.profile.first_name, user.profile.last_name),
                    user.profile.status,
                    user.role.as_ref().map_or("-", |r| r.name.as_str())
                )?;
            }
            writeln!(out, "{} users", UsersView::stats(users.iter().copied()).total)?;
        }
    }

    Ok(())
}

async fn current_session(state: &AppState) -> anyhow::Result<Session> {
    state
        .auth
        .restore()
        .await
        .context("failed to restore session")?
        .context("not signed in; run `sensicity login` first")
}
