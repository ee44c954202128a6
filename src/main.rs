//! BJDMS console
//!
//! A terminal front end over the client core: sign in, browse the
//! jurisdiction tree, inspect committees and follow live notifications.

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use bjdms_client::auth::{SessionState, SignedOutReason};
use bjdms_client::config::Config;
use bjdms_client::detail::DetailPhase;
use bjdms_client::errors::{ClientError, ClientResult};
use bjdms_client::models::{
    AddCommitteeMemberRequest, JoinRequestFilter, JurisdictionLevel, JurisdictionNode,
    LogActivityRequest, RecordTransactionRequest,
};
use bjdms_client::toast::{Toast, ToastLevel};
use bjdms_client::tree::{Affordance, TreeRow};
use bjdms_client::Dashboard;

#[derive(Parser)]
#[command(name = "bjdms", version, about = "BJDMS organisational dashboard console")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Sign in with phone number and password
    Login { phone: String, password: String },
    /// Sign out locally and on the server
    Logout,
    /// Show the signed-in user
    Whoami,
    /// Dashboard summary
    Pulse,
    /// Print the jurisdiction tree, expanding the given nodes
    Tree {
        #[arg(short, long)]
        expand: Vec<String>,
    },
    /// Active committee and roster of a jurisdiction
    Committee { jurisdiction_id: String },
    /// List notifications
    Notifications {
        /// Keep the push channel open and print new notifications
        #[arg(short, long)]
        follow: bool,
    },
    /// Mark a notification as read
    Read { id: String },
    /// List join requests
    JoinRequests {
        #[arg(long)]
        status: Option<String>,
        #[arg(long)]
        jurisdiction: Option<String>,
    },
    /// Approve a join request
    Approve { id: String },
    /// Reject a join request
    Reject {
        id: String,
        #[arg(short, long)]
        reason: String,
    },
    /// Recent activities
    Activities {
        #[arg(long)]
        jurisdiction: Option<String>,
    },
    /// Finance statement of a jurisdiction
    Statement {
        jurisdiction_id: String,
        #[arg(long, default_value_t = 1)]
        page: u32,
    },
    /// Record an activity for a jurisdiction
    LogActivity {
        jurisdiction_id: String,
        title: String,
        #[arg(long)]
        category: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long)]
        committee: Option<String>,
        /// RFC 3339 timestamp; defaults to now
        #[arg(long)]
        date: Option<DateTime<Utc>>,
    },
    /// Assign a user to a committee position
    AddMember {
        committee_id: String,
        user_id: String,
        #[arg(long)]
        position: i32,
    },
    /// Record a finance transaction
    Record {
        jurisdiction_id: String,
        #[arg(value_parser = ["income", "expense"])]
        kind: String,
        amount: f64,
        #[arg(long)]
        category: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long, default_value = "")]
        reference: String,
    },
    /// Free-text search
    Search { query: String },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Load configuration
    let config = Config::from_env()?;

    // Initialize logging
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    tracing::debug!("API base: {}", config.api_url);
    tracing::debug!("Storage path: {:?}", config.storage_path);

    let dashboard = Dashboard::open(config).await?;
    let outcome = run(&dashboard, cli.command).await;
    dashboard.shutdown();

    match outcome {
        Err(ClientError::SessionExpired) => {
            eprintln!("Session expired. Run `bjdms login` to sign in again.");
            std::process::exit(2);
        }
        Err(ClientError::Unauthenticated) => {
            eprintln!("Not signed in. Run `bjdms login` first.");
            std::process::exit(2);
        }
        Err(e) => {
            eprintln!("Error [{}]: {}", e.error_code(), e);
            if e.is_transient() {
                eprintln!("The server may be busy or unreachable; try again shortly.");
                std::process::exit(75);
            }
            std::process::exit(1);
        }
        Ok(()) => Ok(()),
    }
}

async fn run(dashboard: &Dashboard, command: Command) -> ClientResult<()> {
    if let Command::Login { phone, password } = &command {
        let session = dashboard
            .session
            .login(&dashboard.api, phone, password)
            .await?;
        println!("Signed in as {} ({})", session.display_name, session.role);
        return Ok(());
    }

    if let Command::Logout = command {
        if dashboard.session.current().is_some() {
            if let Err(e) = dashboard.api.server_logout().await {
                tracing::warn!("Server-side logout failed: {}", e);
            }
        }
        dashboard.session.logout().await?;
        println!("Signed out");
        return Ok(());
    }

    let session = dashboard.session.require_session()?;

    // Every command below returns None only when the server rejected the token.
    let outcome = match command {
        Command::Login { .. } | Command::Logout => Some(()),
        Command::Whoami => dashboard.api.current_user().await?.map(|user| {
            println!("{} <{}>", user.full_name, user.phone);
            println!("id:   {}", user.id);
            println!("role: {}", user.role.unwrap_or(session.role));
        }),
        Command::Pulse => dashboard
            .api
            .pulse()
            .await?
            .map(|pulse| print_json(&pulse)),
        Command::Tree { expand } => {
            show_tree(dashboard, &expand).await?;
            Some(())
        }
        Command::Committee { jurisdiction_id } => {
            show_committee(dashboard, &jurisdiction_id).await?;
            Some(())
        }
        Command::Notifications { follow } => {
            show_notifications(dashboard, follow).await?;
            Some(())
        }
        Command::Read { id } => dashboard
            .api
            .mark_notification_read(&id)
            .await?
            .then(|| println!("Marked {} as read", id)),
        Command::JoinRequests {
            status,
            jurisdiction,
        } => {
            let filter = JoinRequestFilter {
                status,
                jurisdiction_id: jurisdiction,
            };
            dashboard.api.list_join_requests(&filter).await?.map(|requests| {
                for r in requests {
                    println!(
                        "{}  {:<10} {}  {}  {}",
                        r.id,
                        r.status,
                        r.full_name,
                        r.phone,
                        r.jurisdiction_name.unwrap_or(r.jurisdiction_id)
                    );
                }
            })
        }
        Command::Approve { id } => dashboard
            .api
            .approve_join_request(&id)
            .await?
            .then(|| println!("Approved {}", id)),
        Command::Reject { id, reason } => dashboard
            .api
            .reject_join_request(&id, &reason)
            .await?
            .then(|| println!("Rejected {}", id)),
        Command::Activities { jurisdiction } => dashboard
            .api
            .list_activities(jurisdiction.as_deref())
            .await?
            .map(|activities| {
                for a in activities {
                    println!(
                        "{}  [{}] {}",
                        a.activity_date.format("%Y-%m-%d"),
                        a.category,
                        a.title
                    );
                }
            }),
        Command::Statement {
            jurisdiction_id,
            page,
        } => dashboard
            .api
            .finance_statement(&jurisdiction_id, page)
            .await?
            .map(|statement| {
                if let Some(b) = statement.balance {
                    println!(
                        "Income {:.2}  Expense {:.2}  Balance {:.2}",
                        b.total_income, b.total_expense, b.current_balance
                    );
                }
                for t in statement.transactions {
                    println!(
                        "{}  {:<7} {:>12.2}  {}",
                        t.transaction_date.format("%Y-%m-%d"),
                        t.kind,
                        t.amount,
                        t.description
                    );
                }
            }),
        Command::LogActivity {
            jurisdiction_id,
            title,
            category,
            description,
            committee,
            date,
        } => {
            let request = LogActivityRequest {
                jurisdiction_id,
                committee_id: committee,
                title,
                description,
                category,
                activity_date: date.unwrap_or_else(Utc::now),
            };
            dashboard
                .api
                .log_activity(&request)
                .await?
                .map(|a| println!("Logged activity {} ({})", a.id, a.title))
        }
        Command::AddMember {
            committee_id,
            user_id,
            position,
        } => {
            let request = AddCommitteeMemberRequest {
                user_id,
                position_id: position,
            };
            dashboard
                .api
                .add_committee_member(&committee_id, &request)
                .await?
                .map(|m| println!("Added {} as {} ({})", m.user_name, m.position_name, m.id))
        }
        Command::Record {
            jurisdiction_id,
            kind,
            amount,
            category,
            description,
            reference,
        } => {
            let request = RecordTransactionRequest {
                jurisdiction_id,
                category_id: category,
                kind,
                amount,
                description,
                reference_no: reference,
                transaction_date: Utc::now(),
            };
            dashboard
                .api
                .record_transaction(&request)
                .await?
                .map(|t| println!("Recorded {} {:.2} ({})", t.kind, t.amount, t.id))
        }
        Command::Search { query } => dashboard
            .api
            .search(&query)
            .await?
            .map(|results| print_json(&results)),
    };

    match outcome {
        Some(()) => Ok(()),
        None => Err(signed_out_error(dashboard)),
    }
}

async fn show_tree(dashboard: &Dashboard, expand: &[String]) -> ClientResult<()> {
    let page = dashboard.committees_page();
    page.tree.load_roots().await?;
    for id in expand {
        page.tree.toggle_expand(id).await?;
    }
    for row in page.tree.rows() {
        print_row(&row);
    }
    ensure_signed_in(dashboard)
}

async fn show_committee(dashboard: &Dashboard, jurisdiction_id: &str) -> ClientResult<()> {
    let page = dashboard.committees_page();
    page.tree.load_roots().await?;

    // The console addresses jurisdictions by id, which may sit below the roots.
    let node = match page.tree.select(jurisdiction_id) {
        Some(node) => node,
        None => JurisdictionNode {
            id: jurisdiction_id.to_string(),
            name: jurisdiction_id.to_string(),
            level: JurisdictionLevel::Other(String::new()),
            parent_id: None,
            name_bn: None,
            children: None,
        },
    };
    page.detail.select(node).await?;
    ensure_signed_in(dashboard)?;

    let detail = page.detail.snapshot();
    if detail.phase != DetailPhase::Loaded {
        return Ok(());
    }
    match &detail.committee {
        None => println!("No active committee"),
        Some(c) => {
            println!("Committee {} ({}, {})", c.id, c.committee_type, c.status.as_str());
            for m in detail.leadership() {
                println!("  * {:<24} {}", m.position_name, m.user_name);
            }
            for m in detail.members.iter().filter(|m| !m.is_leadership()) {
                println!("    {:<24} {}", m.position_name, m.user_name);
            }
        }
    }
    Ok(())
}

async fn show_notifications(dashboard: &Dashboard, follow: bool) -> ClientResult<()> {
    let center = &dashboard.notifications;
    let mut toasts = dashboard.toasts.subscribe();
    center.start().await?;
    ensure_signed_in(dashboard)?;

    let snapshot = center.snapshot();
    println!("{} unread", snapshot.unread);
    for n in &snapshot.items {
        let marker = if n.is_read { ' ' } else { '*' };
        println!(
            "{} {}  {}: {}",
            marker,
            n.created_at.format("%Y-%m-%d %H:%M"),
            n.title,
            n.message
        );
    }

    if !follow {
        center.stop();
        return Ok(());
    }

    let mut session = dashboard.session.subscribe();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = session.changed() => {
                if changed.is_err() || !session.borrow().is_authenticated() {
                    break;
                }
            }
            toast = toasts.recv() => match toast {
                Ok(toast) => print_toast(&toast),
                Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!("Skipped {} notifications", n);
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            },
        }
    }
    center.stop();
    ensure_signed_in(dashboard)
}

fn print_row(row: &TreeRow) {
    let marker = match row.affordance {
        Affordance::Collapsed => "+",
        Affordance::Expanded => "-",
        Affordance::Loading => "~",
        Affordance::Leaf => " ",
    };
    let error = row
        .last_error
        .as_deref()
        .map(|e| format!("  (failed: {})", e))
        .unwrap_or_default();
    println!(
        "{}{} {} [{}] {}{}",
        "  ".repeat(row.depth),
        marker,
        row.name,
        row.level.as_str(),
        row.id,
        error
    );
}

fn print_toast(toast: &Toast) {
    let prefix = match toast.level {
        ToastLevel::Info => "»",
        ToastLevel::Error => "!",
    };
    match &toast.description {
        Some(d) => println!("{} {}: {}", prefix, toast.title, d),
        None => println!("{} {}", prefix, toast.title),
    }
}

fn print_json(value: &serde_json::Value) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{}", s),
        Err(_) => println!("{}", value),
    }
}

/// Surface a 401 that happened while a background component was fetching.
fn ensure_signed_in(dashboard: &Dashboard) -> ClientResult<()> {
    match dashboard.session.state() {
        SessionState::Authenticated(_) => Ok(()),
        _ => Err(signed_out_error(dashboard)),
    }
}

fn signed_out_error(dashboard: &Dashboard) -> ClientError {
    match dashboard.session.state() {
        SessionState::Anonymous(SignedOutReason::Expired) => ClientError::SessionExpired,
        _ => ClientError::Unauthenticated,
    }
}
